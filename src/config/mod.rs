//! Configuration loading and validation for the sync store.
//!
//! Settings are loaded from multiple sources in order of precedence:
//! 1. Environment variables (highest)
//! 2. Environment-specific file (e.g., `development.toml`)
//! 3. Default file (`default.toml`)
//!
//! # Example
//!
//! ```ignore
//! use evm_sync_store::config::Settings;
//!
//! let settings = Settings::load("development")?;
//! println!("Database URL: {}", settings.database.url);
//! ```

mod settings;

pub use settings::{DatabaseSettings, LoggingSettings, ReorgSettings, Settings};
