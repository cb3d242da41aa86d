//! Pebble SDK manager
//!
//! Installs, activates and removes versioned Pebble SDK bundles and their
//! native toolchains.
//!
//! ## Architecture
//!
//! - `pebble-sdk-core`: persisted configuration and shared errors
//! - `pebble-sdk-manager`: registry, installer, toolchain and catalog
//! - this crate: the clap command line and the command objects it drives

#![warn(clippy::all)]

pub mod cli;
pub mod commands;

pub use pebble_sdk_core as core;
pub use pebble_sdk_manager as manager;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
