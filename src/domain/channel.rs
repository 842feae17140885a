use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::Result;

/// A room/channel the authenticated user can navigate to.
///
/// Two channels are the same channel when their targets match; display
/// names are allowed to collide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    /// Absolute URL of the channel view.
    #[serde(rename = "id")]
    pub target: String,
}

impl Channel {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }

    /// Build a channel from a raw href, joining relative references against `base`.
    pub fn resolve(name: &str, reference: &str, base: &Url) -> Result<Self> {
        let target = base.join(reference.trim())?;
        Ok(Self::new(name.trim(), target.to_string()))
    }

    /// Parse a `NAME=URL` pair as accepted on the command line.
    pub fn parse_pair(s: &str) -> std::result::Result<Self, String> {
        let (name, target) = s
            .split_once('=')
            .ok_or_else(|| format!("Invalid channel '{}'. Use NAME=URL", s))?;
        let target = Url::parse(target.trim())
            .map_err(|e| format!("Invalid channel URL '{}': {}", target, e))?;
        Ok(Self::new(name.trim(), target.to_string()))
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.target
        } else {
            &self.name
        }
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl Eq for Channel {}

impl std::hash::Hash for Channel {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.target.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://chat.example.com/home").unwrap()
    }

    #[test]
    fn test_resolve_absolute_path() {
        let channel = Channel::resolve("general", "/channel/general", &base()).unwrap();
        assert_eq!(channel.target, "https://chat.example.com/channel/general");
    }

    #[test]
    fn test_resolve_relative_path() {
        let channel = Channel::resolve("dev", "channel/dev", &base()).unwrap();
        assert_eq!(channel.target, "https://chat.example.com/channel/dev");
    }

    #[test]
    fn test_resolve_keeps_absolute_url() {
        let channel =
            Channel::resolve("ext", "https://other.example.org/group/ext", &base()).unwrap();
        assert_eq!(channel.target, "https://other.example.org/group/ext");
    }

    #[test]
    fn test_resolve_trims_name() {
        let channel = Channel::resolve("  random \n", "/channel/random", &base()).unwrap();
        assert_eq!(channel.name, "random");
    }

    #[test]
    fn test_equality_by_target_only() {
        let a = Channel::new("general", "https://chat.example.com/channel/a");
        let b = Channel::new("general", "https://chat.example.com/channel/b");
        let c = Channel::new("renamed", "https://chat.example.com/channel/a");
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_parse_pair() {
        let channel = Channel::parse_pair("general=https://chat.example.com/channel/general").unwrap();
        assert_eq!(channel.name, "general");
        assert_eq!(channel.target, "https://chat.example.com/channel/general");

        assert!(Channel::parse_pair("no-separator").is_err());
        assert!(Channel::parse_pair("general=/relative").is_err());
    }

    #[test]
    fn test_serializes_target_as_id() {
        let channel = Channel::new("general", "https://chat.example.com/channel/general");
        let json = serde_json::to_value(&channel).unwrap();
        assert_eq!(json["id"], "https://chat.example.com/channel/general");
        assert_eq!(json["name"], "general");
    }
}
