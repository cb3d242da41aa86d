//! Command-line interface definition

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Install and switch between Pebble SDK versions
#[derive(Parser, Debug)]
#[command(name = "pebble-sdk", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// List installed SDKs
    List {
        /// Also list SDKs available on the current channel
        #[arg(long)]
        remote: bool,
    },

    /// Install an SDK by version, URL or local archive
    Install {
        /// Version name, http(s) URL or path to a bundle
        target: String,
    },

    /// Remove an installed SDK
    Uninstall { version: String },

    /// Make an installed SDK current
    Activate { version: String },

    /// Show or set the release channel
    Channel {
        /// New channel name
        name: Option<String>,
    },

    /// Link a local firmware build as the tintin SDK
    LinkLegacy {
        /// Firmware checkout containing a wscript
        path: PathBuf,
    },
}
