//! The sync store's port: the programmatic interface a runner depends on.
//! [`crate::store::PostgresSyncStore`] is the only adapter.

use async_trait::async_trait;

use crate::error::Result;
use crate::fragment::{FactoryCriteria, LogFilterCriteria};
use crate::interval::Interval;
use crate::types::primitives::BlockNumber;
use crate::types::{Block, ChildAddressPage, Factory, Log, LogEventPage, LogEventsQuery, Transaction};

/// Transactional writer/reader for blocks, transactions, logs, filter
/// intervals, and the RPC request cache.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Apply all pending forward migrations.
    ///
    /// # Errors
    /// Returns [`crate::error::StoreError::MigrationFailed`] if a migration
    /// cannot be applied.
    async fn migrate_up(&self) -> Result<()>;

    /// Release the database handle. Idempotent.
    ///
    /// # Errors
    /// Returns an error if the underlying pool fails to close cleanly.
    async fn kill(&self) -> Result<()>;

    /// Insert a block, its transactions, and its logs for a confirmed filter
    /// range, then merge `interval` into every fragment of `criteria`.
    /// Idempotent: repeated ingestion of the same rows is a no-op.
    ///
    /// # Errors
    /// Returns an error if the transaction cannot be committed.
    async fn insert_log_filter_interval(
        &self,
        chain_id: u64,
        criteria: &LogFilterCriteria,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
        interval: Interval,
    ) -> Result<()>;

    /// Insert logs discovered while scanning a factory-emitter contract.
    /// Raw insert only — no interval is recorded.
    ///
    /// # Errors
    /// Returns an error if the transaction cannot be committed.
    async fn insert_factory_child_address_logs(&self, logs: &[Log]) -> Result<()>;

    /// Insert a block, its transactions, and its logs for a confirmed factory
    /// range, then merge `interval` into every fragment of `factory`.
    ///
    /// # Errors
    /// Returns an error if the transaction cannot be committed.
    async fn insert_factory_log_filter_interval(
        &self,
        chain_id: u64,
        factory: &FactoryCriteria,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
        interval: Interval,
    ) -> Result<()>;

    /// Insert a block, its transactions, and its logs speculatively, with no
    /// interval recorded (coverage is recorded in bulk at confirmation via
    /// [`Self::insert_realtime_interval`]).
    ///
    /// # Errors
    /// Returns an error if the transaction cannot be committed.
    async fn insert_realtime_block(
        &self,
        chain_id: u64,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
    ) -> Result<()>;

    /// For each fragment of every filter and factory, record `interval` via
    /// the merge procedure. Factories are also recorded as a log filter keyed
    /// on `(address, eventSelector)` so factory-emitter coverage is reused.
    ///
    /// # Errors
    /// Returns an error if the transaction cannot be committed.
    async fn insert_realtime_interval(
        &self,
        chain_id: u64,
        log_filters: &[LogFilterCriteria],
        factories: &[FactoryCriteria],
        interval: Interval,
    ) -> Result<()>;

    /// Confirmed coverage of `criteria`: the intersection of its fragments'
    /// unioned intervals.
    ///
    /// # Errors
    /// Returns an error if the underlying query fails.
    async fn get_log_filter_intervals(
        &self,
        chain_id: u64,
        criteria: &LogFilterCriteria,
    ) -> Result<Vec<Interval>>;

    /// Confirmed coverage of `factory`, analogous to
    /// [`Self::get_log_filter_intervals`].
    ///
    /// # Errors
    /// Returns an error if the underlying query fails.
    async fn get_factory_log_filter_intervals(
        &self,
        chain_id: u64,
        factory: &FactoryCriteria,
    ) -> Result<Vec<Interval>>;

    /// One page of derived child addresses for `factory`'s emitter logs with
    /// `blockNumber <= up_to_block`, ordered ascending by `blockNumber`.
    /// `cursor` is the last-seen `blockNumber`, or `None` to start from the
    /// beginning.
    ///
    /// # Errors
    /// Returns an error if the underlying query fails.
    async fn get_factory_child_addresses(
        &self,
        chain_id: u64,
        factory: &Factory,
        up_to_block: BlockNumber,
        page_size: u32,
        cursor: Option<BlockNumber>,
    ) -> Result<ChildAddressPage>;

    /// One page of fully-joined, ordered events matching `query`, resuming
    /// after `cursor` if given.
    ///
    /// # Errors
    /// Returns an error if the underlying query fails.
    async fn get_log_events(
        &self,
        query: &LogEventsQuery,
        cursor: Option<crate::types::EventCursor>,
    ) -> Result<LogEventPage>;

    /// Upsert a memoized contract-read result, overwriting `result` on
    /// conflict of `(chainId, blockNumber, request)`.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    async fn insert_rpc_request_result(
        &self,
        chain_id: u64,
        block_number: BlockNumber,
        request: &str,
        result: &str,
    ) -> Result<()>;

    /// Look up a memoized contract-read result.
    ///
    /// # Errors
    /// Returns an error if the underlying query fails.
    async fn get_rpc_request_result(
        &self,
        chain_id: u64,
        block_number: BlockNumber,
        request: &str,
    ) -> Result<Option<String>>;

    /// Delete/clamp all speculative data for `chain_id` with `blockNumber >
    /// from_block`. Never partial: either all steps succeed or the
    /// transaction is rolled back.
    ///
    /// # Errors
    /// Returns an error if the transaction cannot be committed.
    async fn delete_realtime_data(&self, chain_id: u64, from_block: BlockNumber) -> Result<()>;
}
