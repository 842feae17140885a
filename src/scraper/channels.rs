use std::collections::HashSet;

use url::Url;

use crate::app::Result;
use crate::browser::{Element, Page, WaitState};
use crate::config::{Config, SelectorConfig, TimeoutConfig};
use crate::domain::Channel;
use crate::progress::ProgressReporter;

/// Lists the channels visible in the signed-in sidebar.
pub struct ChannelEnumerator {
    selectors: SelectorConfig,
    timeouts: TimeoutConfig,
}

impl ChannelEnumerator {
    pub fn new(selectors: SelectorConfig, timeouts: TimeoutConfig) -> Self {
        Self {
            selectors,
            timeouts,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.selectors.clone(), config.timeouts.clone())
    }

    /// Channels in sidebar order, deduplicated by target.
    ///
    /// A sidebar that never shows up yields an empty list with a warning.
    /// Items missing a name or a reference are skipped one diagnostic each.
    pub async fn enumerate(
        &self,
        page: &dyn Page,
        progress: &ProgressReporter,
    ) -> Result<Vec<Channel>> {
        progress.info("Looking for channel list...");
        if let Err(e) = page
            .wait_for_selector(
                &self.selectors.channel_list,
                WaitState::Visible,
                self.timeouts.channel_list(),
            )
            .await
        {
            if e.is_timeout() {
                progress.warn(format!(
                    "Channel list ({}) did not appear.",
                    self.selectors.channel_list
                ));
                return Ok(Vec::new());
            }
            return Err(e);
        }

        let origin = Url::parse(&page.current_url().await?)?.join("/")?;
        let items = page.query_selector_all(&self.selectors.channel_item).await?;
        progress.dev(format!("Found {} potential channel elements.", items.len()));

        let mut seen = HashSet::new();
        let mut channels = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let position = index + 1;
            let (name, reference) = match self.read_item(item.as_ref()).await {
                Ok(pair) => pair,
                Err(e) => {
                    progress.warn(format!("Channel item {} could not be read: {}", position, e));
                    continue;
                }
            };

            let (name, reference) = match (name, reference) {
                (Some(name), Some(reference)) => (name, reference),
                (None, _) => {
                    progress.warn(format!("Channel item {} skipped: no name.", position));
                    continue;
                }
                (Some(name), None) => {
                    progress.warn(format!(
                        "Channel item {} ('{}') skipped: no link.",
                        position, name
                    ));
                    continue;
                }
            };

            let channel = match Channel::resolve(&name, &reference, &origin) {
                Ok(channel) => channel,
                Err(e) => {
                    progress.warn(format!(
                        "Channel item {} ('{}') has an unusable link '{}': {}",
                        position, name, reference, e
                    ));
                    continue;
                }
            };

            if seen.insert(channel.target.clone()) {
                progress.dev(format!("Found channel: {} ({})", channel.name, channel.target));
                channels.push(channel);
            }
        }

        if channels.is_empty() {
            progress.warn("Could not find any channels. Check the channel selectors.");
        } else {
            progress.info(format!("Successfully enumerated {} channels.", channels.len()));
        }
        Ok(channels)
    }

    async fn read_item(&self, item: &dyn Element) -> Result<(Option<String>, Option<String>)> {
        let name = match item.query_selector(&self.selectors.channel_name).await? {
            Some(label) => non_empty(label.inner_text().await?),
            None => None,
        };

        let attribute = &self.selectors.channel_reference_attribute;
        let mut reference = non_empty(item.attribute(attribute).await?);
        if reference.is_none() {
            if let Some(link) = item.query_selector(&self.selectors.channel_link).await? {
                reference = non_empty(link.attribute(attribute).await?);
            }
        }

        Ok((name, reference))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::CrawlerError;
    use crate::browser::fake::{FakeDom, FakeElement, FakePage};
    use crate::progress::{self, EventKind, ProgressEvent};

    const HOME: &str = "https://chat.example.com/home";

    fn item(name: &str, href: Option<&str>) -> FakeElement {
        let s = SelectorConfig::default();
        let mut el = FakeElement::new().child(&s.channel_name, FakeElement::new().text(name));
        if let Some(href) = href {
            el = el.attr(&s.channel_reference_attribute, href);
        }
        el
    }

    fn sidebar(items: Vec<FakeElement>) -> FakeDom {
        let s = SelectorConfig::default();
        let mut dom = FakeDom::new()
            .visible(&s.channel_list)
            .elements(&s.channel_item, items);
        dom.url = HOME.to_string();
        dom
    }

    async fn run(dom: FakeDom) -> (Result<Vec<Channel>>, Vec<ProgressEvent>) {
        let page = FakePage::new(dom);
        let enumerator = ChannelEnumerator::new(SelectorConfig::default(), TimeoutConfig::default());
        let (reporter, mut stream) = progress::channel("enumerate-test", 256);
        let result = enumerator.enumerate(&page, &reporter).await;
        reporter.end_stream("done");
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        (result, events)
    }

    fn warnings(events: &[ProgressEvent]) -> usize {
        events.iter().filter(|e| e.kind == EventKind::Warn).count()
    }

    #[tokio::test]
    async fn test_skips_item_without_reference() {
        let dom = sidebar(vec![
            item("general", Some("/channel/general")),
            item("random", Some("/channel/random")),
            item("orphan", None),
            item("dev", Some("/group/dev")),
            item("alice", Some("/direct/alice")),
        ]);

        let (result, events) = run(dom).await;
        let channels = result.unwrap();

        let names: Vec<_> = channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["general", "random", "dev", "alice"]);
        assert_eq!(channels[2].target, "https://chat.example.com/group/dev");
        assert_eq!(warnings(&events), 1);
    }

    #[tokio::test]
    async fn test_reference_falls_back_to_inner_link() {
        let s = SelectorConfig::default();
        let nested = FakeElement::new()
            .child(&s.channel_name, FakeElement::new().text(" support "))
            .child(
                &s.channel_link,
                FakeElement::new().attr(&s.channel_reference_attribute, "channel/support"),
            );

        let (result, _) = run(sidebar(vec![nested])).await;
        let channels = result.unwrap();

        assert_eq!(
            channels,
            vec![Channel::new("support", "https://chat.example.com/channel/support")]
        );
        assert_eq!(channels[0].name, "support");
    }

    #[tokio::test]
    async fn test_duplicates_keep_first_occurrence() {
        let dom = sidebar(vec![
            item("general", Some("/channel/general")),
            item("General (pinned)", Some("https://chat.example.com/channel/general")),
            item("random", Some("/channel/random")),
        ]);

        let (result, events) = run(dom).await;
        let channels = result.unwrap();

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "general");
        assert_eq!(warnings(&events), 0);
    }

    #[tokio::test]
    async fn test_missing_sidebar_is_empty_not_error() {
        let mut dom = FakeDom::new();
        dom.url = HOME.to_string();

        let (result, events) = run(dom).await;

        assert!(result.unwrap().is_empty());
        assert!(warnings(&events) >= 1);
    }

    #[tokio::test]
    async fn test_unreadable_item_is_skipped() {
        let dom = sidebar(vec![
            FakeElement::new().broken(),
            item("general", Some("/channel/general")),
        ]);

        let (result, events) = run(dom).await;

        assert_eq!(result.unwrap().len(), 1);
        assert_eq!(warnings(&events), 1);
    }

    #[tokio::test]
    async fn test_unparseable_page_url() {
        let s = SelectorConfig::default();
        let dom = FakeDom::new().visible(&s.channel_list);

        let (result, _) = run(dom).await;

        assert!(matches!(result, Err(CrawlerError::InvalidUrl(_))));
    }
}
