//! Port definitions for dependency injection and testability.
//!
//! Following hexagonal architecture, [`crate::store::PostgresSyncStore`]
//! implements the [`SyncStore`] trait defined here; tests and downstream
//! callers depend on the trait, not the concrete adapter.
//!
//! ```text
//! ┌──────────────────────────┐
//! │         Runner           │
//! │  depends on SyncStore    │
//! └─────────────┬────────────┘
//!               ▼
//! ┌──────────────────────────┐
//! │    PostgresSyncStore     │
//! │   (implements SyncStore) │
//! └──────────────────────────┘
//! ```

mod store;

pub use store::SyncStore;
