//! CSS selector table for the target site.
//!
//! Defaults match Rocket.Chat's Fuselage markup; override any entry in the
//! `[selectors]` section to point the crawler at a different site.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    // Login page
    pub username_field: String,
    pub password_field: String,
    pub login_button: String,
    pub login_error: String,
    pub login_success: String,

    // Channel list
    pub channel_list: String,
    pub channel_item: String,
    pub channel_name: String,
    /// Descendant anchor consulted when the item itself has no reference
    pub channel_link: String,
    pub channel_reference_attribute: String,

    // Channel view
    pub room_header: String,
    pub message_container: String,
    pub message_item: String,
    pub message_id_attribute: String,
    pub message_sender: String,
    pub message_body: String,
    pub message_timestamp: String,
    pub timestamp_attribute: String,
    pub loading_indicator: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            username_field: r#"input[name="usernameOrEmail"]"#.to_string(),
            password_field: r#"input[name="password"]"#.to_string(),
            login_button: r#"button[type="submit"]"#.to_string(),
            login_error: r#".rcx-toastbar--error, div[role="alert"]"#.to_string(),
            login_success: ".rcx-sidebar".to_string(),

            channel_list: ".rcx-sidebar".to_string(),
            channel_item: "a.rcx-sidebar-item".to_string(),
            channel_name: ".rcx-sidebar-item__title".to_string(),
            channel_link: "a[href]".to_string(),
            channel_reference_attribute: "href".to_string(),

            room_header: "h1.rcx-css-15uaxsl".to_string(),
            message_container: ".messages-box .rc-scrollbars-view".to_string(),
            message_item: r#"div.rcx-message[role="listitem"]"#.to_string(),
            message_id_attribute: "id".to_string(),
            message_sender: r#".rcx-message-header__name[data-qa-type="username"]"#
                .to_string(),
            message_body: "div.rcx-message-body".to_string(),
            message_timestamp: ".rcx-message-header__time".to_string(),
            timestamp_attribute: "title".to_string(),
            loading_indicator: ".rcx-loading, .loading-animation".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let selectors: SelectorConfig = toml::from_str(
            r#"
message_item = "li.message"
"#,
        )
        .unwrap();
        assert_eq!(selectors.message_item, "li.message");
        assert_eq!(selectors.message_id_attribute, "id");
        assert_eq!(selectors.login_success, ".rcx-sidebar");
    }
}
