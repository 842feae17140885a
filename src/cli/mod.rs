pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{Channel, DepthPolicy};
use crate::scraper::ScrapeConfig;

#[derive(Parser)]
#[command(name = "kumocrawler")]
#[command(about = "Scrape channel history from a team chat site", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/kumocrawler/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headful: bool,

    /// Pacing of scrolls and form input, overriding the config file
    #[arg(long, global = true, value_enum)]
    pub pace: Option<Pace>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Short pauses for responsive sites
    Fast,
    /// More patience for slow sites and long histories
    Thorough,
}

impl Pace {
    pub fn apply(self, scrape: ScrapeConfig) -> ScrapeConfig {
        match self {
            Pace::Fast => scrape.fast(),
            Pace::Thorough => scrape.thorough(),
        }
    }
}

/// Where to sign in and as whom
#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Login page of the chat site
    #[arg(long)]
    pub url: String,

    #[arg(long)]
    pub username: String,

    /// Environment variable holding the password
    #[arg(long, default_value = "KUMO_PASSWORD")]
    pub password_env: String,

    /// Read the password from the first line of stdin instead
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and list the available channels
    Channels {
        #[command(flatten)]
        login: LoginArgs,
    },
    /// Log in and scrape message history from channels
    Scrape {
        #[command(flatten)]
        login: LoginArgs,

        /// Channel to scrape as NAME=URL (repeatable)
        #[arg(long = "channel", required = true, value_parser = Channel::parse_pair)]
        channels: Vec<Channel>,

        /// How far back to go: all, 3months, 30d, 2w, 12h
        #[arg(long, default_value = "all", value_parser = DepthPolicy::parse)]
        depth: DepthPolicy,
    },
    /// Write a task's results as a JSON file
    Export {
        task_id: String,

        /// Output path (default: kumocrawler_scrape_<id>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List stored scrape results
    Results,
    /// Delete a task's stored results
    Delete { task_id: String },
}
