//! Core types, configuration, and error handling for histograph.
//!
//! This crate provides the shared foundation used by all other histograph crates:
//! - [`HistographError`]: unified error type using `thiserror`
//! - [`HistographConfig`]: configuration loaded from `.histograph.toml`
//! - [`OutputFormat`] for CLI rendering

mod config;
mod error;
mod types;

pub use config::{AnalyticsConfig, HistographConfig, MiningConfig, ProgressCadence, VcsConfig};
pub use error::{HistographError, SourceReadKind};
pub use types::OutputFormat;

/// A convenience `Result` type for histograph operations.
pub type Result<T> = std::result::Result<T, HistographError>;
