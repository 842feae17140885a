//! JavaScript snippets evaluated inside the page.
//!
//! Selectors and values are embedded as JSON string literals so quotes and
//! backslashes in configured selectors cannot break out of the script.

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Hides the most common headless/automation fingerprints.
///
/// Installed on every new document of a fresh context.
pub const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    window.chrome = window.chrome || { runtime: {} };
"#;

/// Evaluates to `"absent"`, `"hidden"` or `"visible"` for the first match.
pub fn element_state(selector: &str) -> String {
    format!(
        r#"
        (() => {{
            const el = document.querySelector({sel});
            if (!el) return 'absent';
            const style = window.getComputedStyle(el);
            if (style.display === 'none' || style.visibility === 'hidden') return 'hidden';
            const rect = el.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0 ? 'visible' : 'hidden';
        }})()
        "#,
        sel = js_string(selector)
    )
}

/// Evaluates to `{ ready, resources }`; the resource count stops growing once
/// the network goes quiet.
pub fn document_activity() -> &'static str {
    r#"
    (() => ({
        ready: document.readyState === 'complete',
        resources: performance.getEntriesByType('resource').length
    }))()
    "#
}

/// Evaluates to the HTTP status of the main document, or `null` when the
/// browser does not expose it.
pub fn navigation_status() -> &'static str {
    r#"
    (() => {
        const nav = performance.getEntriesByType('navigation')[0];
        return nav && nav.responseStatus ? nav.responseStatus : null;
    })()
    "#
}

/// Scrolls the first match to the top. Evaluates to `false` if nothing matched.
pub fn scroll_to_top(selector: &str) -> String {
    format!(
        r#"
        (() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            el.scrollTop = 0;
            el.dispatchEvent(new Event('scroll', {{ bubbles: true }}));
            return true;
        }})()
        "#,
        sel = js_string(selector)
    )
}

/// Replaces an input's value through `insertText` so framework listeners
/// (React, Vue) see a real edit. Evaluates to `false` if nothing matched.
pub fn fill_field(selector: &str, value: &str) -> String {
    format!(
        r#"
        (() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            el.focus();
            if (typeof el.select === 'function') el.select();
            if (!document.execCommand('insertText', false, {val})) {{
                const setter = Object.getOwnPropertyDescriptor(
                    Object.getPrototypeOf(el), 'value'
                );
                if (setter && setter.set) setter.set.call(el, {val}); else el.value = {val};
            }}
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()
        "#,
        sel = js_string(selector),
        val = js_string(value)
    )
}
