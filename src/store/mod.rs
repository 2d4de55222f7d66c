//! Data persistence layer: the sole adapter for [`crate::ports::SyncStore`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        PostgresSyncStore                         │
//! │   blocks · transactions · logs · log_filters · factories ·       │
//! │   log_filter_intervals · factory_log_filter_intervals ·          │
//! │   rpc_request_results                                            │
//! │                               │                                  │
//! │                               ▼                                  │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │                SQLx Connection Pool (Postgres)             │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use evm_sync_store::store::PostgresSyncStore;
//! use sqlx::postgres::PgPoolOptions;
//!
//! let pool = PgPoolOptions::new()
//!     .max_connections(10)
//!     .connect("postgres://localhost/sync_store")
//!     .await?;
//!
//! let store = PostgresSyncStore::new(pool);
//! store.migrate_up().await?;
//! ```
//!
//! # Migrations
//!
//! Migrations are located in `migrations/` and run via `sqlx::migrate!`.

mod postgres;

pub use postgres::PostgresSyncStore;

// Re-export for callers building their own pool.
pub use sqlx::postgres::PgPool;
