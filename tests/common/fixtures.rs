//! Test fixtures for integration tests.
//!
//! Uses rstest for pytest-style fixtures.

use sqlx::PgPool;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;

use evm_sync_store::ports::SyncStore;
use evm_sync_store::store::PostgresSyncStore;

use super::containers::{SyncStorePostgres, build_connection_string};

/// A test database instance with pool and container.
///
/// The container is kept alive as long as this struct exists.
/// When dropped, the container is automatically stopped.
pub struct TestDb {
    /// The connection pool to the test database.
    pub pool: PgPool,
    /// The `PostgresSyncStore` wrapping the pool.
    pub store: PostgresSyncStore,
    /// The container (kept alive for the duration of the test).
    _container: ContainerAsync<SyncStorePostgres>,
}

impl TestDb {
    /// Create a new test database with a fresh `PostgreSQL` container.
    ///
    /// This will:
    /// 1. Start a `PostgreSQL` container
    /// 2. Connect to it
    /// 3. Run all migrations
    ///
    /// # Panics
    ///
    /// Panics if container startup, connection, or migrations fail.
    pub async fn new() -> Self {
        let container = SyncStorePostgres::default()
            .start()
            .await
            .expect("Failed to start Postgres container");

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        let connection_string = build_connection_string(&host.to_string(), port);

        let pool = connect_with_retries(&connection_string, 30)
            .await
            .expect("Failed to connect to database");

        let store = PostgresSyncStore::new(pool.clone());
        store.migrate_up().await.expect("Failed to run migrations");

        Self {
            pool,
            store,
            _container: container,
        }
    }
}

/// Connect to the database with retries.
///
/// The container can take a moment to be fully ready even after the
/// "ready to accept connections" message appears.
async fn connect_with_retries(url: &str, max_attempts: u32) -> Result<PgPool, sqlx::Error> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match PgPool::connect(url).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => return Ok(pool),
                Err(e) if attempts < max_attempts => {
                    tracing::debug!("Connection verify failed (attempt {attempts}): {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e),
            },
            Err(e) if attempts < max_attempts => {
                tracing::debug!("Connection failed (attempt {attempts}): {e}");
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fixtures for blocks.
pub mod block_fixtures {
    use alloy::primitives::U256;

    use evm_sync_store::types::entities::Block;
    use evm_sync_store::types::primitives::{Address, BlockNumber, Hash, Timestamp};

    /// A deterministic 32-byte hash from a single repeated byte.
    #[must_use]
    pub fn hash(n: u8) -> Hash {
        #[allow(clippy::unwrap_used)]
        Hash::from_hex(&format!("0x{}", hex::encode([n; 32]))).unwrap()
    }

    /// A deterministic 20-byte address from a single repeated byte.
    #[must_use]
    pub fn address(n: u8) -> Address {
        #[allow(clippy::unwrap_used)]
        Address::from_hex(&format!("0x{}", hex::encode([n; 20]))).unwrap()
    }

    /// Build a sample block at `(chain_id, number, timestamp)`, keyed by a
    /// hash derived from `number` so distinct numbers never collide.
    #[must_use]
    pub fn sample_block(chain_id: u64, number: u64, timestamp: u64) -> Block {
        #[allow(clippy::cast_possible_truncation)]
        let tag = number as u8;
        Block {
            chain_id,
            hash: hash(tag),
            number: BlockNumber::new(number),
            timestamp: Timestamp::new(timestamp),
            parent_hash: hash(tag.wrapping_sub(1)),
            base_fee_per_gas: Some(U256::from(1_000_000_000u64).into()),
            difficulty: U256::ZERO.into(),
            extra_data: "0x".to_string(),
            gas_limit: U256::from(30_000_000u64).into(),
            gas_used: U256::from(21_000u64).into(),
            logs_bloom: format!("0x{}", "00".repeat(256)),
            miner: address(0xaa),
            mix_hash: hash(0xbb),
            nonce: "0x0000000000000000".to_string(),
            receipts_root: hash(0xcc),
            sha3_uncles: hash(0xdd),
            size: U256::from(1_000u64).into(),
            state_root: hash(0xee),
            total_difficulty: U256::ZERO.into(),
            transactions_root: hash(0xff),
        }
    }
}

/// Fixtures for transactions.
pub mod transaction_fixtures {
    use alloy::primitives::U256;

    use evm_sync_store::types::entities::{Block, Transaction, TransactionKind};
    use evm_sync_store::types::primitives::Address;

    use super::block_fixtures::{address, hash};

    /// Build a sample transaction belonging to `block`.
    #[must_use]
    pub fn sample_transaction(block: &Block, index: u32) -> Transaction {
        #[allow(clippy::cast_possible_truncation)]
        let tag = index as u8;
        Transaction {
            chain_id: block.chain_id,
            hash: hash(0x10_u8.wrapping_add(tag)),
            block_hash: block.hash,
            block_number: block.number,
            transaction_index: index,
            from: address(0x20_u8.wrapping_add(tag)),
            to: Some(address(0x30_u8.wrapping_add(tag))),
            value: U256::ZERO.into(),
            input: "0x".to_string(),
            gas: U256::from(21_000u64).into(),
            nonce: u64::from(index),
            r: U256::from(1u64).into(),
            s: U256::from(1u64).into(),
            v: U256::from(27u64).into(),
            kind: TransactionKind::Eip1559,
            gas_price: None,
            max_fee_per_gas: Some(U256::from(2_000_000_000u64).into()),
            max_priority_fee_per_gas: Some(U256::from(1_000_000_000u64).into()),
            access_list: None,
        }
    }

    /// Re-exported address helper for tests composing their own logs.
    #[must_use]
    pub fn actor(n: u8) -> Address {
        address(n)
    }
}

/// Fixtures for logs.
pub mod log_fixtures {
    use evm_sync_store::types::entities::{Log, Transaction};
    use evm_sync_store::types::primitives::{Address, Hash};

    use super::block_fixtures::hash;

    /// Build a sample log emitted by `address`, within `transaction`, with up
    /// to four topics packed densely from `topic0`.
    #[must_use]
    pub fn sample_log(address: Address, transaction: &Transaction, log_index: u32, topics: &[Hash]) -> Log {
        let mut slots: [Option<Hash>; 4] = [None; 4];
        for (slot, topic) in slots.iter_mut().zip(topics) {
            *slot = Some(*topic);
        }
        Log {
            id: Log::make_id(transaction.block_hash, log_index),
            chain_id: transaction.chain_id,
            address,
            block_hash: transaction.block_hash,
            block_number: transaction.block_number,
            data: "0x".to_string(),
            log_index,
            topic0: slots[0],
            topic1: slots[1],
            topic2: slots[2],
            topic3: slots[3],
            transaction_hash: transaction.hash,
            transaction_index: transaction.transaction_index,
        }
    }

    /// A 20-byte address left-padded into a 32-byte word, as an EVM event
    /// topic would encode it.
    #[must_use]
    pub fn address_topic(addr: Address) -> Hash {
        #[allow(clippy::unwrap_used)]
        Hash::from_hex(&format!("0x{}{}", "00".repeat(12), hex::encode(addr.as_slice()))).unwrap()
    }

    /// Re-exported for tests that only need a bare topic hash.
    #[must_use]
    pub fn topic(n: u8) -> Hash {
        hash(n)
    }
}
