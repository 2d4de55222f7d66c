//! `PostgreSQL` implementation of the sync store using SQLx.
//!
//! # Type conversions
//!
//! Every bigint-valued entity field is stored as fixed-width padded `TEXT`
//! and decoded back through [`crate::encoding`] on read. Chain ids and
//! indexes use signed Postgres integer columns; casts from the domain's
//! unsigned types are safe because chain ids, log indexes and transaction
//! indexes never approach `i64::MAX`/`i32::MAX`.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::too_many_lines,
    clippy::too_many_arguments
)]

use async_trait::async_trait;
use sqlx::error::DatabaseError;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder, postgres::PgPool};
use tracing::{debug, instrument, warn};

use crate::error::{Result, StoreError};
use crate::fragment::{
    ChildAddressLocation, FactoryCriteria, FactoryFragment, LogFilterCriteria, LogFilterFragment,
    ValueSet, build_factory_fragments, build_log_filter_fragments,
};
use crate::interval::{Interval, interval_intersection_many, interval_union};
use crate::ports::SyncStore;
use crate::types::primitives::InvalidHash;
use crate::types::{
    Address, Block, BlockNumber, ChildAddressPage, Event, EventCount, EventCursor, Factory,
    FactoryRequest, Hash, Log, LogEventPage, LogEventsQuery, LogFilterRequest, PageMetadata,
    Timestamp, Transaction, TransactionKind, U256Text,
};

// ═══════════════════════════════════════════════════════════════════════════════
// POSTGRES SYNC STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// `PostgreSQL`-backed implementation of [`SyncStore`].
#[derive(Debug, Clone)]
pub struct PostgresSyncStore {
    pool: PgPool,
}

impl PostgresSyncStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Count matching logs grouped by `(eventSourceName, topic0)`, over the
    /// same predicate as `getLogEvents` but without the `includeEventSelectors`
    /// clause.
    async fn fetch_event_counts(
        &self,
        query: &LogEventsQuery,
        requests: &[AnyRequest<'_>],
    ) -> Result<Vec<EventCount>> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT event_source_name, topic0, COUNT(*) AS count FROM (SELECT ");
        push_event_source_case(&mut qb, requests, false);
        qb.push(
            " AS event_source_name, l.topic0 AS topic0 FROM logs l \
             JOIN blocks b ON b.hash = l.block_hash AND b.chain_id = l.chain_id \
             WHERE b.timestamp >= ",
        );
        qb.push_bind(query.from_timestamp.encode());
        qb.push(" AND b.timestamp <= ");
        qb.push_bind(query.to_timestamp.encode());
        qb.push(" AND (");
        for (i, req) in requests.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            push_predicate(&mut qb, req, false);
        }
        qb.push(")) matched WHERE event_source_name IS NOT NULL GROUP BY event_source_name, topic0");

        let rows: Vec<(String, Option<String>, i64)> =
            qb.build_query_as().fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|(name, topic0, count)| {
                Ok(EventCount {
                    event_source_name: name,
                    event_selector: topic0
                        .map(|s| Hash::from_hex(&s))
                        .transpose()
                        .map_err(|e: InvalidHash| StoreError::StorageConflict(e.to_string()))?,
                    count,
                })
            })
            .collect()
    }
}

fn parse_address(s: &str) -> Result<Address> {
    Address::from_hex(s).map_err(|e| StoreError::StorageConflict(e.to_string()))
}

fn parse_hash(s: &str) -> Result<Hash> {
    Hash::from_hex(s).map_err(|e| StoreError::StorageConflict(e.to_string()))
}

fn transaction_kind_from_tag(tag: &str) -> TransactionKind {
    match tag {
        "legacy" => TransactionKind::Legacy,
        "eip2930" => TransactionKind::Eip2930,
        "eip1559" => TransactionKind::Eip1559,
        "deposit" => TransactionKind::Deposit,
        other => TransactionKind::Unknown(other.to_string()),
    }
}

fn transaction_kind_tag(kind: &TransactionKind) -> &str {
    match kind {
        TransactionKind::Legacy => "legacy",
        TransactionKind::Eip2930 => "eip2930",
        TransactionKind::Eip1559 => "eip1559",
        TransactionKind::Deposit => "deposit",
        TransactionKind::Unknown(tag) => tag,
    }
}

/// SQL for the low 20 bytes of a 32-byte word stored as a `"0x" + 64 hex
/// chars` text column, optionally offset `word_byte_offset` bytes into a
/// longer hex blob (used for `data`; zero for a bare topic column). Matches
/// the EVM ABI convention of left-padding a 20-byte address to 32 bytes,
/// which is how both topics and `data`-encoded addresses are laid out.
fn low20_substring(column: &str, word_byte_offset: u32) -> String {
    format!(
        "('0x' || substring({column} from {} for 40))",
        3 + 2 * (word_byte_offset + 12)
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// RAW INSERTS
// ═══════════════════════════════════════════════════════════════════════════════

async fn insert_block(conn: &mut PgConnection, block: &Block) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO blocks (
            hash, chain_id, number, timestamp, parent_hash, base_fee_per_gas,
            difficulty, extra_data, gas_limit, gas_used, logs_bloom, miner,
            mix_hash, nonce, receipts_root, sha3_uncles, size, state_root,
            total_difficulty, transactions_root
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20)
        ON CONFLICT (hash) DO NOTHING
        ",
    )
    .bind(block.hash.to_hex())
    .bind(block.chain_id as i64)
    .bind(block.number.encode())
    .bind(block.timestamp.encode())
    .bind(block.parent_hash.to_hex())
    .bind(block.base_fee_per_gas.map(U256Text::encode).transpose()?)
    .bind(block.difficulty.encode()?)
    .bind(&block.extra_data)
    .bind(block.gas_limit.encode()?)
    .bind(block.gas_used.encode()?)
    .bind(&block.logs_bloom)
    .bind(block.miner.to_hex())
    .bind(block.mix_hash.to_hex())
    .bind(&block.nonce)
    .bind(block.receipts_root.to_hex())
    .bind(block.sha3_uncles.to_hex())
    .bind(block.size.encode()?)
    .bind(block.state_root.to_hex())
    .bind(block.total_difficulty.encode()?)
    .bind(block.transactions_root.to_hex())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_transactions(conn: &mut PgConnection, transactions: &[Transaction]) -> Result<()> {
    for tx in transactions {
        sqlx::query(
            r"
            INSERT INTO transactions (
                hash, chain_id, block_hash, block_number, transaction_index,
                from_address, to_address, value, input, gas, gas_price,
                max_fee_per_gas, max_priority_fee_per_gas, nonce, r, s, v,
                kind, access_list
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)
            ON CONFLICT (hash) DO NOTHING
            ",
        )
        .bind(tx.hash.to_hex())
        .bind(tx.chain_id as i64)
        .bind(tx.block_hash.to_hex())
        .bind(tx.block_number.encode())
        .bind(tx.transaction_index as i32)
        .bind(tx.from.to_hex())
        .bind(tx.to.map(Address::to_hex))
        .bind(tx.value.encode()?)
        .bind(&tx.input)
        .bind(tx.gas.encode()?)
        .bind(tx.gas_price.map(U256Text::encode).transpose()?)
        .bind(tx.max_fee_per_gas.map(U256Text::encode).transpose()?)
        .bind(tx.max_priority_fee_per_gas.map(U256Text::encode).transpose()?)
        .bind(tx.nonce as i64)
        .bind(tx.r.encode()?)
        .bind(tx.s.encode()?)
        .bind(tx.v.encode()?)
        .bind(transaction_kind_tag(&tx.kind))
        .bind(&tx.access_list)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_logs(conn: &mut PgConnection, logs: &[Log]) -> Result<()> {
    for log in logs {
        sqlx::query(
            r"
            INSERT INTO logs (
                id, chain_id, address, block_hash, block_number, data,
                log_index, topic0, topic1, topic2, topic3, transaction_hash,
                transaction_index
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(&log.id)
        .bind(log.chain_id as i64)
        .bind(log.address.to_hex())
        .bind(log.block_hash.to_hex())
        .bind(log.block_number.encode())
        .bind(&log.data)
        .bind(log.log_index as i32)
        .bind(log.topic0.map(Hash::to_hex))
        .bind(log.topic1.map(Hash::to_hex))
        .bind(log.topic2.map(Hash::to_hex))
        .bind(log.topic3.map(Hash::to_hex))
        .bind(log.transaction_hash.to_hex())
        .bind(log.transaction_index as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn upsert_log_filter(conn: &mut PgConnection, fragment: &LogFilterFragment) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO log_filters (id, chain_id, address, topic0, topic1, topic2, topic3)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO NOTHING
        ",
    )
    .bind(&fragment.id)
    .bind(fragment.chain_id as i64)
    .bind(fragment.address.map(Address::to_hex))
    .bind(fragment.topics[0].map(Hash::to_hex))
    .bind(fragment.topics[1].map(Hash::to_hex))
    .bind(fragment.topics[2].map(Hash::to_hex))
    .bind(fragment.topics[3].map(Hash::to_hex))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Postgres SQLSTATE codes for conditions the caller can retry past:
/// `serialization_failure` (`40001`) and `deadlock_detected` (`40P01`).
const RETRYABLE_SQLSTATES: [&str; 2] = ["40001", "40P01"];

/// Commit `tx`, translating a retryable Postgres abort into
/// [`StoreError::TransactionAborted`] so the caller can distinguish it from a
/// generic database error and retry the whole transaction.
async fn commit_transaction(tx: sqlx::Transaction<'_, Postgres>) -> Result<()> {
    match tx.commit().await {
        Ok(()) => Ok(()),
        Err(sqlx::Error::Database(db_err)) => {
            if db_err.code().is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref())) {
                Err(StoreError::TransactionAborted(db_err.to_string()))
            } else {
                Err(StoreError::Database(sqlx::Error::Database(db_err)))
            }
        }
        Err(err) => Err(err.into()),
    }
}

async fn upsert_factory(conn: &mut PgConnection, fragment: &FactoryFragment) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO factories
            (id, chain_id, address, event_selector, child_address_location, topic0, topic1, topic2, topic3)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO NOTHING
        ",
    )
    .bind(&fragment.id)
    .bind(fragment.chain_id as i64)
    .bind(fragment.address.to_hex())
    .bind(fragment.event_selector.to_hex())
    .bind(fragment.child_address_location.to_string())
    .bind(fragment.topics[0].map(Hash::to_hex))
    .bind(fragment.topics[1].map(Hash::to_hex))
    .bind(fragment.topics[2].map(Hash::to_hex))
    .bind(fragment.topics[3].map(Hash::to_hex))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// The interval-merge procedure: delete every existing interval row
/// for `fragment_id`, union it with `new_interval` (if any), and reinsert
/// the merged rows. Runs against whatever connection it is given — callers
/// are responsible for wrapping it in a transaction.
async fn merge_interval(
    conn: &mut PgConnection,
    table: &str,
    fk_column: &str,
    fragment_id: &str,
    new_interval: Option<Interval>,
) -> Result<Vec<Interval>> {
    let existing: Vec<(String, String)> = sqlx::query_as(&format!(
        "DELETE FROM {table} WHERE {fk_column} = $1 RETURNING start_block, end_block"
    ))
    .bind(fragment_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut intervals = Vec::with_capacity(existing.len() + 1);
    for (start, end) in existing {
        intervals.push(Interval::new(
            BlockNumber::decode(&start)?,
            BlockNumber::decode(&end)?,
        ));
    }
    if let Some(iv) = new_interval {
        intervals.push(iv);
    }

    let merged = interval_union(&intervals);
    for iv in &merged {
        sqlx::query(&format!(
            "INSERT INTO {table} ({fk_column}, start_block, end_block) VALUES ($1, $2, $3)"
        ))
        .bind(fragment_id)
        .bind(iv.start.encode())
        .bind(iv.end.encode())
        .execute(&mut *conn)
        .await?;
    }
    Ok(merged)
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT ITERATOR PREDICATE BUILDING
// ═══════════════════════════════════════════════════════════════════════════════

enum AnyRequest<'a> {
    Log(&'a LogFilterRequest),
    Factory(&'a FactoryRequest),
}

impl AnyRequest<'_> {
    fn event_source_name(&self) -> &str {
        match self {
            Self::Log(r) => &r.event_source_name,
            Self::Factory(r) => &r.event_source_name,
        }
    }

    fn chain_id(&self) -> u64 {
        match self {
            Self::Log(r) => r.chain_id,
            Self::Factory(r) => r.chain_id,
        }
    }

    fn from_block(&self) -> Option<BlockNumber> {
        match self {
            Self::Log(r) => r.from_block,
            Self::Factory(r) => r.from_block,
        }
    }

    fn to_block(&self) -> Option<BlockNumber> {
        match self {
            Self::Log(r) => r.to_block,
            Self::Factory(r) => r.to_block,
        }
    }

    fn include_event_selectors(&self) -> Option<&[Hash]> {
        match self {
            Self::Log(r) => r.include_event_selectors.as_deref(),
            Self::Factory(r) => r.include_event_selectors.as_deref(),
        }
    }
}

/// Append one request's full match predicate, parenthesized, to `qb`.
/// `include_selectors` controls whether the `includeEventSelectors` clause is
/// part of the predicate (on for event rows, off for the counts preamble).
fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, req: &AnyRequest<'_>, include_selectors: bool) {
    qb.push("(l.chain_id = ");
    qb.push_bind(req.chain_id() as i64);

    if let Some(from_block) = req.from_block() {
        qb.push(" AND l.block_number >= ");
        qb.push_bind(from_block.encode());
    }
    if let Some(to_block) = req.to_block() {
        qb.push(" AND l.block_number <= ");
        qb.push_bind(to_block.encode());
    }

    match req {
        AnyRequest::Log(log_req) => {
            if let Some(address_set) = &log_req.criteria.address {
                let values: Vec<String> = address_set.values().into_iter().map(Address::to_hex).collect();
                qb.push(" AND l.address = ANY(");
                qb.push_bind(values);
                qb.push(")");
            }
            for (i, topic_slot) in log_req.criteria.topics.iter().enumerate() {
                if let Some(topic_set) = topic_slot {
                    let values: Vec<String> = topic_set.values().into_iter().map(Hash::to_hex).collect();
                    qb.push(format!(" AND l.topic{i} = ANY("));
                    qb.push_bind(values);
                    qb.push(")");
                }
            }
        }
        AnyRequest::Factory(factory_req) => {
            let derived_expr = match factory_req.factory.child_address_location {
                ChildAddressLocation::Topic(n) => low20_substring(&format!("el.topic{n}"), 0),
                ChildAddressLocation::Offset(k) => low20_substring("el.data", k),
            };
            let emitter_addresses: Vec<String> = factory_req
                .factory
                .address
                .values()
                .into_iter()
                .map(Address::to_hex)
                .collect();
            qb.push(" AND EXISTS (SELECT 1 FROM logs el WHERE el.chain_id = ");
            qb.push_bind(factory_req.chain_id as i64);
            qb.push(" AND el.address = ANY(");
            qb.push_bind(emitter_addresses);
            qb.push(") AND el.topic0 = ");
            qb.push_bind(factory_req.factory.event_selector.to_hex());
            qb.push(" AND el.block_number <= l.block_number AND ");
            qb.push(derived_expr);
            qb.push(" = l.address)");

            for (i, topic_slot) in factory_req.factory.topics.iter().enumerate() {
                if let Some(topic_set) = topic_slot {
                    let values: Vec<String> = topic_set.values().into_iter().map(Hash::to_hex).collect();
                    qb.push(format!(" AND l.topic{i} = ANY("));
                    qb.push_bind(values);
                    qb.push(")");
                }
            }
        }
    }

    if include_selectors {
        if let Some(selectors) = req.include_event_selectors() {
            let values: Vec<String> = selectors.iter().map(|h| h.to_hex()).collect();
            qb.push(" AND l.topic0 = ANY(");
            qb.push_bind(values);
            qb.push(")");
        }
    }

    qb.push(")");
}

/// Append `(CASE WHEN pred1 THEN 'name1' WHEN pred2 THEN 'name2' ... END)`.
/// The first matching request wins, which both tags a row with a single
/// `eventSourceName` and collapses a log matched by several requests to one
/// output row (invariant 7: each matching log appears exactly once).
fn push_event_source_case(qb: &mut QueryBuilder<'_, Postgres>, requests: &[AnyRequest<'_>], include_selectors: bool) {
    qb.push("(CASE");
    for req in requests {
        qb.push(" WHEN ");
        push_predicate(qb, req, include_selectors);
        qb.push(" THEN ");
        qb.push_bind(req.event_source_name().to_string());
    }
    qb.push(" END)");
}

#[derive(Debug, FromRow)]
struct EventRow {
    event_source_name: String,
    log_id: String,
    log_chain_id: i64,
    log_address: String,
    log_block_hash: String,
    log_block_number: String,
    log_data: String,
    log_log_index: i32,
    log_topic0: Option<String>,
    log_topic1: Option<String>,
    log_topic2: Option<String>,
    log_topic3: Option<String>,
    log_transaction_hash: String,
    log_transaction_index: i32,
    block_hash_col: String,
    block_chain_id: i64,
    block_number: String,
    block_timestamp: String,
    block_parent_hash: String,
    block_base_fee_per_gas: Option<String>,
    block_difficulty: String,
    block_extra_data: String,
    block_gas_limit: String,
    block_gas_used: String,
    block_logs_bloom: String,
    block_miner: String,
    block_mix_hash: String,
    block_nonce: String,
    block_receipts_root: String,
    block_sha3_uncles: String,
    block_size: String,
    block_state_root: String,
    block_total_difficulty: String,
    block_transactions_root: String,
    tx_hash: String,
    tx_chain_id: i64,
    tx_block_hash: String,
    tx_block_number: String,
    tx_transaction_index: i32,
    tx_from_address: String,
    tx_to_address: Option<String>,
    tx_value: String,
    tx_input: String,
    tx_gas: String,
    tx_gas_price: Option<String>,
    tx_max_fee_per_gas: Option<String>,
    tx_max_priority_fee_per_gas: Option<String>,
    tx_nonce: i64,
    tx_r: String,
    tx_s: String,
    tx_v: String,
    tx_kind: String,
    tx_access_list: Option<String>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self> {
        let log = Log {
            id: row.log_id,
            chain_id: row.log_chain_id as u64,
            address: parse_address(&row.log_address)?,
            block_hash: parse_hash(&row.log_block_hash)?,
            block_number: BlockNumber::decode(&row.log_block_number)?,
            data: row.log_data,
            log_index: row.log_log_index as u32,
            topic0: row.log_topic0.map(|s| parse_hash(&s)).transpose()?,
            topic1: row.log_topic1.map(|s| parse_hash(&s)).transpose()?,
            topic2: row.log_topic2.map(|s| parse_hash(&s)).transpose()?,
            topic3: row.log_topic3.map(|s| parse_hash(&s)).transpose()?,
            transaction_hash: parse_hash(&row.log_transaction_hash)?,
            transaction_index: row.log_transaction_index as u32,
        };

        let block = Block {
            chain_id: row.block_chain_id as u64,
            hash: parse_hash(&row.block_hash_col)?,
            number: BlockNumber::decode(&row.block_number)?,
            timestamp: Timestamp::decode(&row.block_timestamp)?,
            parent_hash: parse_hash(&row.block_parent_hash)?,
            base_fee_per_gas: row
                .block_base_fee_per_gas
                .map(|s| U256Text::decode(&s))
                .transpose()?,
            difficulty: U256Text::decode(&row.block_difficulty)?,
            extra_data: row.block_extra_data,
            gas_limit: U256Text::decode(&row.block_gas_limit)?,
            gas_used: U256Text::decode(&row.block_gas_used)?,
            logs_bloom: row.block_logs_bloom,
            miner: parse_address(&row.block_miner)?,
            mix_hash: parse_hash(&row.block_mix_hash)?,
            nonce: row.block_nonce,
            receipts_root: parse_hash(&row.block_receipts_root)?,
            sha3_uncles: parse_hash(&row.block_sha3_uncles)?,
            size: U256Text::decode(&row.block_size)?,
            state_root: parse_hash(&row.block_state_root)?,
            total_difficulty: U256Text::decode(&row.block_total_difficulty)?,
            transactions_root: parse_hash(&row.block_transactions_root)?,
        };

        let transaction = Transaction {
            chain_id: row.tx_chain_id as u64,
            hash: parse_hash(&row.tx_hash)?,
            block_hash: parse_hash(&row.tx_block_hash)?,
            block_number: BlockNumber::decode(&row.tx_block_number)?,
            transaction_index: row.tx_transaction_index as u32,
            from: parse_address(&row.tx_from_address)?,
            to: row.tx_to_address.map(|s| parse_address(&s)).transpose()?,
            value: U256Text::decode(&row.tx_value)?,
            input: row.tx_input,
            gas: U256Text::decode(&row.tx_gas)?,
            nonce: row.tx_nonce as u64,
            r: U256Text::decode(&row.tx_r)?,
            s: U256Text::decode(&row.tx_s)?,
            v: U256Text::decode(&row.tx_v)?,
            kind: transaction_kind_from_tag(&row.tx_kind),
            gas_price: row.tx_gas_price.map(|s| U256Text::decode(&s)).transpose()?,
            max_fee_per_gas: row
                .tx_max_fee_per_gas
                .map(|s| U256Text::decode(&s))
                .transpose()?,
            max_priority_fee_per_gas: row
                .tx_max_priority_fee_per_gas
                .map(|s| U256Text::decode(&s))
                .transpose()?,
            access_list: row.tx_access_list,
        };

        Ok(Self {
            event_source_name: row.event_source_name,
            chain_id: row.log_chain_id as u64,
            log,
            block,
            transaction,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SYNC STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl SyncStore for PostgresSyncStore {
    #[instrument(skip(self))]
    async fn migrate_up(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(StoreError::MigrationFailed)?;
        debug!("Migrations applied");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn kill(&self) -> Result<()> {
        self.pool.close().await;
        debug!("Pool closed");
        Ok(())
    }

    #[instrument(skip(self, criteria, block, transactions, logs), fields(chain_id, block = %block.number))]
    async fn insert_log_filter_interval(
        &self,
        chain_id: u64,
        criteria: &LogFilterCriteria,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
        interval: Interval,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_block(&mut tx, block).await?;
        insert_transactions(&mut tx, transactions).await?;
        insert_logs(&mut tx, logs).await?;

        for fragment in build_log_filter_fragments(chain_id, criteria) {
            upsert_log_filter(&mut tx, &fragment).await?;
            merge_interval(
                &mut tx,
                "log_filter_intervals",
                "log_filter_id",
                &fragment.id,
                Some(interval),
            )
            .await?;
        }

        commit_transaction(tx).await?;
        debug!("Log filter interval ingested");
        Ok(())
    }

    #[instrument(skip(self, logs), fields(count = logs.len()))]
    async fn insert_factory_child_address_logs(&self, logs: &[Log]) -> Result<()> {
        if logs.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        insert_logs(&mut tx, logs).await?;
        commit_transaction(tx).await?;
        debug!("Factory child-address logs ingested");
        Ok(())
    }

    #[instrument(skip(self, factory, block, transactions, logs), fields(chain_id))]
    async fn insert_factory_log_filter_interval(
        &self,
        chain_id: u64,
        factory: &FactoryCriteria,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
        interval: Interval,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_block(&mut tx, block).await?;
        insert_transactions(&mut tx, transactions).await?;
        insert_logs(&mut tx, logs).await?;

        for fragment in build_factory_fragments(chain_id, factory) {
            upsert_factory(&mut tx, &fragment).await?;
            merge_interval(
                &mut tx,
                "factory_log_filter_intervals",
                "factory_id",
                &fragment.id,
                Some(interval),
            )
            .await?;
        }

        commit_transaction(tx).await?;
        debug!("Factory log filter interval ingested");
        Ok(())
    }

    #[instrument(skip(self, block, transactions, logs), fields(chain_id, block = %block.number))]
    async fn insert_realtime_block(
        &self,
        chain_id: u64,
        block: &Block,
        transactions: &[Transaction],
        logs: &[Log],
    ) -> Result<()> {
        debug_assert_eq!(chain_id, block.chain_id);
        let mut tx = self.pool.begin().await?;
        insert_block(&mut tx, block).await?;
        insert_transactions(&mut tx, transactions).await?;
        insert_logs(&mut tx, logs).await?;
        commit_transaction(tx).await?;
        debug!("Realtime block ingested");
        Ok(())
    }

    #[instrument(skip(self, log_filters, factories), fields(chain_id))]
    async fn insert_realtime_interval(
        &self,
        chain_id: u64,
        log_filters: &[LogFilterCriteria],
        factories: &[FactoryCriteria],
        interval: Interval,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for criteria in log_filters {
            for fragment in build_log_filter_fragments(chain_id, criteria) {
                upsert_log_filter(&mut tx, &fragment).await?;
                merge_interval(
                    &mut tx,
                    "log_filter_intervals",
                    "log_filter_id",
                    &fragment.id,
                    Some(interval),
                )
                .await?;
            }
        }

        for factory in factories {
            for fragment in build_factory_fragments(chain_id, factory) {
                upsert_factory(&mut tx, &fragment).await?;
                merge_interval(
                    &mut tx,
                    "factory_log_filter_intervals",
                    "factory_id",
                    &fragment.id,
                    Some(interval),
                )
                .await?;

                // Also record the emitter's own coverage as a plain log
                // filter keyed on (address, eventSelector), so a later
                // logFilter request against the same emitter can reuse it.
                let as_log_filter = LogFilterCriteria {
                    address: Some(ValueSet::One(fragment.address)),
                    topics: [
                        Some(ValueSet::One(fragment.event_selector)),
                        None,
                        None,
                        None,
                    ],
                };
                for log_fragment in build_log_filter_fragments(chain_id, &as_log_filter) {
                    upsert_log_filter(&mut tx, &log_fragment).await?;
                    merge_interval(
                        &mut tx,
                        "log_filter_intervals",
                        "log_filter_id",
                        &log_fragment.id,
                        Some(interval),
                    )
                    .await?;
                }
            }
        }

        commit_transaction(tx).await?;
        debug!("Realtime interval ingested");
        Ok(())
    }

    #[instrument(skip(self, criteria), fields(chain_id))]
    async fn get_log_filter_intervals(
        &self,
        chain_id: u64,
        criteria: &LogFilterCriteria,
    ) -> Result<Vec<Interval>> {
        let mut tx = self.pool.begin().await?;
        let mut lists = Vec::new();
        for fragment in build_log_filter_fragments(chain_id, criteria) {
            upsert_log_filter(&mut tx, &fragment).await?;
            let merged = merge_interval(
                &mut tx,
                "log_filter_intervals",
                "log_filter_id",
                &fragment.id,
                None,
            )
            .await?;
            lists.push(merged);
        }
        commit_transaction(tx).await?;
        Ok(interval_intersection_many(&lists))
    }

    #[instrument(skip(self, factory), fields(chain_id))]
    async fn get_factory_log_filter_intervals(
        &self,
        chain_id: u64,
        factory: &FactoryCriteria,
    ) -> Result<Vec<Interval>> {
        let mut tx = self.pool.begin().await?;
        let mut lists = Vec::new();
        for fragment in build_factory_fragments(chain_id, factory) {
            upsert_factory(&mut tx, &fragment).await?;
            let merged = merge_interval(
                &mut tx,
                "factory_log_filter_intervals",
                "factory_id",
                &fragment.id,
                None,
            )
            .await?;
            lists.push(merged);
        }
        commit_transaction(tx).await?;
        Ok(interval_intersection_many(&lists))
    }

    #[instrument(skip(self, factory), fields(chain_id, up_to_block = %up_to_block))]
    async fn get_factory_child_addresses(
        &self,
        chain_id: u64,
        factory: &Factory,
        up_to_block: BlockNumber,
        page_size: u32,
        cursor: Option<BlockNumber>,
    ) -> Result<ChildAddressPage> {
        let derived_expr = match factory.child_address_location {
            ChildAddressLocation::Topic(n) => low20_substring(&format!("topic{n}"), 0),
            ChildAddressLocation::Offset(k) => low20_substring("data", k),
        };

        let sql = format!(
            r"
            SELECT {derived_expr} AS child_address, block_number
            FROM logs
            WHERE chain_id = $1
              AND address = $2
              AND topic0 = $3
              AND block_number <= $4
              AND ($5::text IS NULL OR block_number > $5::text)
            ORDER BY block_number ASC
            LIMIT $6
            "
        );

        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(chain_id as i64)
            .bind(factory.address.to_hex())
            .bind(factory.event_selector.to_hex())
            .bind(up_to_block.encode())
            .bind(cursor.map(BlockNumber::encode))
            .bind(i64::from(page_size))
            .fetch_all(&self.pool)
            .await?;

        let mut addresses = Vec::with_capacity(rows.len());
        let mut last_block = None;
        for (address_hex, block_text) in rows {
            addresses.push(parse_address(&address_hex)?);
            last_block = Some(BlockNumber::decode(&block_text)?);
        }

        Ok(ChildAddressPage {
            addresses,
            cursor: last_block,
        })
    }

    #[instrument(skip(self, query, cursor), fields(page_size = query.page_size))]
    async fn get_log_events(
        &self,
        query: &LogEventsQuery,
        cursor: Option<EventCursor>,
    ) -> Result<LogEventPage> {
        let requests: Vec<AnyRequest<'_>> = query
            .log_filters
            .iter()
            .map(AnyRequest::Log)
            .chain(query.factories.iter().map(AnyRequest::Factory))
            .collect();

        if requests.is_empty() {
            return Ok(LogEventPage {
                events: Vec::new(),
                metadata: PageMetadata {
                    page_ends_at_timestamp: query.to_timestamp,
                    counts: Vec::new(),
                },
            });
        }

        let counts = self.fetch_event_counts(query, &requests).await?;

        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT ");
        push_event_source_case(&mut qb, &requests, true);
        qb.push(
            r" AS event_source_name,
            l.id AS log_id, l.chain_id AS log_chain_id, l.address AS log_address,
            l.block_hash AS log_block_hash, l.block_number AS log_block_number,
            l.data AS log_data, l.log_index AS log_log_index,
            l.topic0 AS log_topic0, l.topic1 AS log_topic1, l.topic2 AS log_topic2, l.topic3 AS log_topic3,
            l.transaction_hash AS log_transaction_hash, l.transaction_index AS log_transaction_index,
            b.hash AS block_hash_col, b.chain_id AS block_chain_id, b.number AS block_number,
            b.timestamp AS block_timestamp, b.parent_hash AS block_parent_hash,
            b.base_fee_per_gas AS block_base_fee_per_gas, b.difficulty AS block_difficulty,
            b.extra_data AS block_extra_data, b.gas_limit AS block_gas_limit, b.gas_used AS block_gas_used,
            b.logs_bloom AS block_logs_bloom, b.miner AS block_miner, b.mix_hash AS block_mix_hash,
            b.nonce AS block_nonce, b.receipts_root AS block_receipts_root, b.sha3_uncles AS block_sha3_uncles,
            b.size AS block_size, b.state_root AS block_state_root, b.total_difficulty AS block_total_difficulty,
            b.transactions_root AS block_transactions_root,
            t.hash AS tx_hash, t.chain_id AS tx_chain_id, t.block_hash AS tx_block_hash,
            t.block_number AS tx_block_number, t.transaction_index AS tx_transaction_index,
            t.from_address AS tx_from_address, t.to_address AS tx_to_address, t.value AS tx_value,
            t.input AS tx_input, t.gas AS tx_gas, t.gas_price AS tx_gas_price,
            t.max_fee_per_gas AS tx_max_fee_per_gas, t.max_priority_fee_per_gas AS tx_max_priority_fee_per_gas,
            t.nonce AS tx_nonce, t.r AS tx_r, t.s AS tx_s, t.v AS tx_v, t.kind AS tx_kind,
            t.access_list AS tx_access_list
            FROM logs l
            JOIN blocks b ON b.hash = l.block_hash AND b.chain_id = l.chain_id
            JOIN transactions t ON t.hash = l.transaction_hash AND t.chain_id = l.chain_id
            WHERE b.timestamp >= ",
        );
        qb.push_bind(query.from_timestamp.encode());
        qb.push(" AND b.timestamp <= ");
        qb.push_bind(query.to_timestamp.encode());
        qb.push(" AND (");
        for (i, req) in requests.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            push_predicate(&mut qb, req, true);
        }
        qb.push(")");

        if let Some(cursor) = cursor {
            qb.push(" AND (b.timestamp, l.chain_id, b.number, l.log_index) > (");
            qb.push_bind(cursor.timestamp.encode());
            qb.push(", ");
            qb.push_bind(cursor.chain_id as i64);
            qb.push(", ");
            qb.push_bind(cursor.block_number.encode());
            qb.push(", ");
            qb.push_bind(cursor.log_index as i32);
            qb.push(")");
        }

        qb.push(" ORDER BY b.timestamp ASC, l.chain_id ASC, b.number ASC, l.log_index ASC LIMIT ");
        qb.push_bind(i64::from(query.page_size));

        let rows: Vec<EventRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(Event::try_from(row)?);
        }

        let page_ends_at_timestamp = events
            .last()
            .map_or(query.to_timestamp, |e: &Event| e.block.timestamp);

        Ok(LogEventPage {
            events,
            metadata: PageMetadata {
                page_ends_at_timestamp,
                counts,
            },
        })
    }

    #[instrument(skip(self, request, result), fields(chain_id, block = %block_number))]
    async fn insert_rpc_request_result(
        &self,
        chain_id: u64,
        block_number: BlockNumber,
        request: &str,
        result: &str,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO rpc_request_results (chain_id, block_number, request, result)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (chain_id, block_number, request) DO UPDATE SET result = EXCLUDED.result
            ",
        )
        .bind(chain_id as i64)
        .bind(block_number.encode())
        .bind(request)
        .bind(result)
        .execute(&self.pool)
        .await?;
        debug!("RPC request result upserted");
        Ok(())
    }

    #[instrument(skip(self, request), fields(chain_id, block = %block_number))]
    async fn get_rpc_request_result(
        &self,
        chain_id: u64,
        block_number: BlockNumber,
        request: &str,
    ) -> Result<Option<String>> {
        let result: Option<String> = sqlx::query_scalar(
            "SELECT result FROM rpc_request_results WHERE chain_id = $1 AND block_number = $2 AND request = $3",
        )
        .bind(chain_id as i64)
        .bind(block_number.encode())
        .bind(request)
        .fetch_optional(&self.pool)
        .await?;
        Ok(result)
    }

    #[instrument(skip(self), fields(chain_id, from_block = %from_block))]
    async fn delete_realtime_data(&self, chain_id: u64, from_block: BlockNumber) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let chain_id = chain_id as i64;
        let from_block = from_block.encode();

        sqlx::query("DELETE FROM blocks WHERE chain_id = $1 AND number > $2")
            .bind(chain_id)
            .bind(&from_block)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM transactions WHERE chain_id = $1 AND block_number > $2")
            .bind(chain_id)
            .bind(&from_block)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM logs WHERE chain_id = $1 AND block_number > $2")
            .bind(chain_id)
            .bind(&from_block)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM rpc_request_results WHERE chain_id = $1 AND block_number > $2")
            .bind(chain_id)
            .bind(&from_block)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            DELETE FROM log_filter_intervals li
            USING log_filters f
            WHERE li.log_filter_id = f.id AND f.chain_id = $1 AND li.start_block > $2
            ",
        )
        .bind(chain_id)
        .bind(&from_block)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE log_filter_intervals li
            SET end_block = $2
            FROM log_filters f
            WHERE li.log_filter_id = f.id AND f.chain_id = $1 AND li.end_block > $2
            ",
        )
        .bind(chain_id)
        .bind(&from_block)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            DELETE FROM factory_log_filter_intervals fi
            USING factories f
            WHERE fi.factory_id = f.id AND f.chain_id = $1 AND fi.start_block > $2
            ",
        )
        .bind(chain_id)
        .bind(&from_block)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE factory_log_filter_intervals fi
            SET end_block = $2
            FROM factories f
            WHERE fi.factory_id = f.id AND f.chain_id = $1 AND fi.end_block > $2
            ",
        )
        .bind(chain_id)
        .bind(&from_block)
        .execute(&mut *tx)
        .await?;

        commit_transaction(tx).await?;
        warn!("Realtime data truncated");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
