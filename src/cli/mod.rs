//! Command-line interface for TopicScout.

mod commands;

use clap::{Parser, Subcommand};

/// TopicScout - YouTube topic research
/// Search videos, summarize them, and track what a topic is doing over time
#[derive(Parser)]
#[command(name = "topicscout")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API with scheduled maintenance
    #[command(alias = "daemon", alias = "web")]
    Serve,

    /// Search YouTube and summarize the results
    #[command(alias = "s")]
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,

        /// Number of results to fetch (1-50, default from config)
        #[arg(long, short = 'n')]
        max_results: Option<u32>,
    },

    /// Show recent searches
    #[command(alias = "h")]
    History {
        /// Number of entries to show
        #[arg(default_value = "10")]
        limit: u64,
    },

    /// Write a report for a recorded search
    Export {
        /// Search id from `history`
        search_id: i64,
        /// Report format: text or json
        #[arg(long, default_value = "text")]
        format: String,
        /// Output file (defaults to a generated name in the current directory)
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Prune old data, compact the index and sweep the response cache
    #[command(alias = "maintenance")]
    Optimize,

    /// Show stored video and search counts
    Stats,

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
