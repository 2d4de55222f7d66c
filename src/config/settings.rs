//! Settings for the sync store, loaded the way the rest of this codebase's
//! configuration layer works: programmatic defaults, then a default file,
//! then an environment-specific file, then `STORE__`-prefixed environment
//! variables, each overriding the last.

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;

/// Root settings structure for the sync store.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Database connection settings.
    pub database: DatabaseSettings,
    /// Reorg-retention advisory settings.
    pub reorg: ReorgSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from defaults, `config/default.toml`,
    /// `config/{environment}.toml`, then `STORE__`-prefixed environment
    /// variables, in ascending precedence.
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns [`crate::error::StoreError::Config`] if any source fails to
    /// parse.
    pub fn load(environment: &str) -> Result<Self> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            .set_default("database.url", "postgres://localhost/sync_store")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_ms", 5_000)?
            .set_default("database.idle_timeout_ms", 600_000)?
            .set_default("reorg.block_retention", 512)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("STORE")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load settings from a single explicit file, bypassing the environment
    /// layering of [`Self::load`]. Useful for tests.
    ///
    /// # Errors
    /// Returns [`crate::error::StoreError::Config`] if the file cannot be
    /// read or parsed.
    pub fn from_file(path: &str) -> Result<Self> {
        Ok(Config::builder()
            .add_source(File::with_name(path))
            .build()?
            .try_deserialize()?)
    }

    /// Basic structural validation beyond what deserialization already
    /// enforces.
    ///
    /// # Errors
    /// Returns a list of human-readable validation messages.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.url.is_empty() {
            errors.push("database.url cannot be empty".into());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be non-zero".into());
        }
        if self.database.min_connections > self.database.max_connections {
            errors.push("database.min_connections cannot exceed max_connections".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// `PostgreSQL` connection pool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Postgres connection string.
    pub url: String,
    /// Maximum pool size.
    pub max_connections: u32,
    /// Minimum pool size kept warm.
    pub min_connections: u32,
    /// Milliseconds to wait for a new connection before failing.
    pub connect_timeout_ms: u64,
    /// Milliseconds an idle connection is kept before being closed.
    pub idle_timeout_ms: u64,
}

impl DatabaseSettings {
    /// `connect_timeout_ms` as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// `idle_timeout_ms` as a [`Duration`].
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Advisory settings for reorg/retention policy. The store never auto-prunes
/// confirmed data; these inform a caller's own retention choices.
#[derive(Debug, Clone, Deserialize)]
pub struct ReorgSettings {
    /// Number of confirmed blocks of history a caller typically keeps before
    /// pruning is considered safe.
    pub block_retention: u64,
}

/// Logging settings. The store only emits `tracing` spans/events; it is the
/// runner's job to install a subscriber.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level to emit (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format (`pretty`, `json`, `compact`).
    pub format: String,
}
