//! # tuneport common library
//!
//! Shared code for the tuneport crates:
//! - Error type and result alias
//! - TOML configuration (loading, path resolution, atomic write)
//! - Resolver tuning settings
//! - Progress events (EventBus)

pub mod config;
pub mod error;
pub mod events;

pub use config::{ResolverSettings, TomlConfig};
pub use error::{Error, Result};
pub use events::{EventBus, ResolveEvent};
