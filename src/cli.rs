//! CLI definitions for Waymark.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Waymark CLI.
#[derive(Parser)]
#[command(name = "waymark")]
#[command(about = "In-page guidance tooling: selectors, URL patterns and the guidance API")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.waymark/config.toml)
    #[arg(short, long, global = true, env = "WAYMARK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Check whether a URL pattern matches a URL
    Match {
        /// Guidance URL pattern (`*`, `/path/*`, `https://host/*`, ...)
        pattern: String,

        /// Page URL
        url: String,
    },

    /// Show or edit the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Validate the configuration and the stored API token
    Validate {
        /// Only check the configuration file, skip the API round trip
        #[arg(long)]
        offline: bool,
    },

    /// List the guidance that applies to a page
    Guidance {
        /// Page URL
        url: String,

        /// Tooltip language (default: api.lang)
        #[arg(long)]
        lang: Option<String>,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Store the guidance API token
    SetToken {
        /// Bearer token; empty clears it
        token: String,
    },

    /// Store the guidance API base URL
    SetUrl {
        /// Base URL, e.g. https://api.waymark.dev
        url: String,
    },
}
