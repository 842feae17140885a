use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Browser launch and page defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Pass --no-sandbox, needed inside most containers (default: true)
    pub no_sandbox: bool,

    /// Hide common automation fingerprints (default: true)
    pub stealth: bool,

    /// Accept self-signed or otherwise invalid certificates (default: true)
    pub ignore_https_errors: bool,

    /// Viewport width in pixels (default: 1280)
    pub viewport_width: u32,

    /// Viewport height in pixels (default: 800)
    pub viewport_height: u32,

    /// Timeout for a single DevTools request in seconds (default: 30)
    pub request_timeout_secs: u64,

    /// Chrome/Chromium binary, auto-detected when unset
    pub executable: Option<PathBuf>,

    /// Extra command line switches for the browser process
    pub extra_args: Vec<String>,

    /// User agent string to use
    pub user_agent: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            no_sandbox: true,
            stealth: true,
            ignore_https_errors: true,
            viewport_width: 1280,
            viewport_height: 800,
            request_timeout_secs: 30,
            executable: None,
            extra_args: Vec::new(),
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
        }
    }
}

impl BrowserSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Command line switches derived from the settings, extra args last.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = vec![
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-software-rasterizer".to_string(),
        ];
        if self.stealth {
            args.push("--disable-blink-features=AutomationControlled".to_string());
        }
        if self.ignore_https_errors {
            args.push("--ignore-certificate-errors".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}
