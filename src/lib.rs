//! # kumocrawler
//!
//! Logs into a team chat site with a headless browser, lists the channels
//! the account can see, and scrapes their message history back to a
//! chosen depth.
//!
//! ## Architecture
//!
//! ```text
//! BrowserSession → Authenticator → ChannelEnumerator → MessageScraper → ResultStore
//!                          └──────────── ProgressReporter ────────────┘
//! ```
//!
//! Each request runs as a background task owned by the
//! [`TaskOrchestrator`](task::TaskOrchestrator) and reports through a
//! stream of JSON events that always ends with `end_stream`.
//!
//! ## Quick Start
//!
//! ```bash
//! export KUMO_PASSWORD=...
//!
//! # List channels
//! kumocrawler channels --url https://chat.example.com --username alice
//!
//! # Scrape the last three months of two channels
//! kumocrawler scrape --url https://chat.example.com --username alice \
//!     --channel general=https://chat.example.com/channel/general \
//!     --channel dev=https://chat.example.com/channel/dev --depth 3months
//!
//! # Save the results
//! kumocrawler export <task-id>
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together config,
/// browser session, result store and task orchestrator.
pub mod app;

/// Headless browser capability.
///
/// - [`BrowserSession`](browser::BrowserSession): lazily started shared engine
/// - [`Page`](browser::Page) / [`Element`](browser::Element): what the scraper drives
pub mod browser;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/kumocrawler/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`Channel`](domain::Channel): a navigable room
/// - [`Message`](domain::Message): one scraped message
/// - [`DepthPolicy`](domain::DepthPolicy): how far back to scrape
pub mod domain;

/// Task progress events and their single-consumer stream.
pub mod progress;

/// Login, channel enumeration and message scraping.
pub mod scraper;

/// SQLite persistence of scrape results.
pub mod store;

/// Background tasks and the orchestrator that runs them.
pub mod task;
