//! Error types for the sync store.
//!
//! The store exposes a single flat error enum. There is no domain/business
//! layer and no HTTP surface here — those belong to the runner that embeds
//! this crate — so there is just one [`StoreError`] rather than a layered
//! `DomainError`/`InfraError`/`AppError`/`ApiError` stack.
//!
//! `NotFound` is deliberately absent: readers return `Option`/empty `Vec`,
//! never an error, for missing rows.

use thiserror::Error;

/// Errors produced by the sync store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A forward migration failed to apply. Fatal at startup.
    #[error("migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A value could not be represented in the fixed-width encoded-text column.
    #[error("value cannot be encoded in {width} digits: {digits} digits required")]
    EncodeOverflow {
        /// The fixed column width.
        width: usize,
        /// The number of digits the value actually needed.
        digits: usize,
    },

    /// A row violated a uniqueness or foreign-key invariant despite
    /// ignore-on-conflict semantics. Indicates corruption; never retried.
    #[error("storage conflict: {0}")]
    StorageConflict(String),

    /// The underlying transactional engine aborted the transaction.
    /// Safe for the caller to retry.
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// Database driver error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
