//! Pebble SDK Core - configuration and shared types
//! 
//! This crate holds what every part of the SDK manager needs to agree on:
//! the persisted application configuration (including the key-value
//! settings table) and the shared error type.

pub mod config;
pub mod error;

pub use config::{AppConfig, SdkConfig, CHANNEL_KEY};
pub use error::{CoreError, Result};

/// Tool version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "pebble-sdk";
