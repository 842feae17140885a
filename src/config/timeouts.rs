use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounds for every wait the crawler performs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Page navigation in seconds (default: 60)
    pub navigation_secs: u64,

    /// Quiet period that counts as "network idle" in milliseconds (default: 500)
    pub network_idle_ms: u64,

    /// Waiting for a form field to accept input in seconds (default: 30)
    pub form_fill_secs: u64,

    /// Waiting for the submit button in seconds (default: 30)
    pub click_secs: u64,

    /// Waiting for the login success or error marker in seconds (default: 45)
    pub login_outcome_secs: u64,

    /// Waiting for the channel list in seconds (default: 30)
    pub channel_list_secs: u64,

    /// Waiting for the message container in seconds (default: 30)
    pub message_container_secs: u64,

    /// Waiting for message items on each pass in seconds (default: 10)
    pub message_wait_secs: u64,

    /// Waiting for the room header in seconds (default: 10)
    pub room_header_secs: u64,

    /// Waiting for the loading indicator to show up in milliseconds (default: 1500)
    pub loading_appear_ms: u64,

    /// Waiting for the loading indicator to go away in seconds (default: 15)
    pub loading_disappear_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_secs: 60,
            network_idle_ms: 500,
            form_fill_secs: 30,
            click_secs: 30,
            login_outcome_secs: 45,
            channel_list_secs: 30,
            message_container_secs: 30,
            message_wait_secs: 10,
            room_header_secs: 10,
            loading_appear_ms: 1500,
            loading_disappear_secs: 15,
        }
    }
}

impl TimeoutConfig {
    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }

    pub fn form_fill(&self) -> Duration {
        Duration::from_secs(self.form_fill_secs)
    }

    pub fn click(&self) -> Duration {
        Duration::from_secs(self.click_secs)
    }

    pub fn login_outcome(&self) -> Duration {
        Duration::from_secs(self.login_outcome_secs)
    }

    pub fn channel_list(&self) -> Duration {
        Duration::from_secs(self.channel_list_secs)
    }

    pub fn message_container(&self) -> Duration {
        Duration::from_secs(self.message_container_secs)
    }

    pub fn message_wait(&self) -> Duration {
        Duration::from_secs(self.message_wait_secs)
    }

    pub fn room_header(&self) -> Duration {
        Duration::from_secs(self.room_header_secs)
    }

    pub fn loading_appear(&self) -> Duration {
        Duration::from_millis(self.loading_appear_ms)
    }

    pub fn loading_disappear(&self) -> Duration {
        Duration::from_secs(self.loading_disappear_secs)
    }
}
