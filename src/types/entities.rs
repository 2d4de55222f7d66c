//! Persisted entities: blocks, transactions, logs, filter intervals,
//! factories, and the RPC request cache.

use serde::{Deserialize, Serialize};

use super::primitives::{Address, BlockNumber, Hash, Timestamp, U256Text};
use crate::fragment::ChildAddressLocation;

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK
// ═══════════════════════════════════════════════════════════════════════════════

/// A block header. Key: `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Chain this block belongs to.
    pub chain_id: u64,
    /// Block hash (unique key).
    pub hash: Hash,
    /// Block number.
    pub number: BlockNumber,
    /// Unix timestamp the block was produced.
    pub timestamp: Timestamp,
    /// Parent block's hash.
    pub parent_hash: Hash,
    /// EIP-1559 base fee, if the chain supports it.
    pub base_fee_per_gas: Option<U256Text>,
    /// Mining/validator difficulty.
    pub difficulty: U256Text,
    /// Extra data field.
    pub extra_data: String,
    /// Gas limit for the block.
    pub gas_limit: U256Text,
    /// Gas actually used by the block's transactions.
    pub gas_used: U256Text,
    /// Bloom filter over the block's logs.
    pub logs_bloom: String,
    /// Block producer's address.
    pub miner: Address,
    /// Proof-of-work mix hash (pre-merge chains).
    pub mix_hash: Hash,
    /// Proof-of-work nonce.
    pub nonce: String,
    /// Root hash of the receipts trie.
    pub receipts_root: Hash,
    /// Root hash of the ommers/uncles list.
    pub sha3_uncles: Hash,
    /// Block size in bytes.
    pub size: U256Text,
    /// Root hash of the state trie after this block.
    pub state_root: Hash,
    /// Cumulative chain difficulty through this block.
    pub total_difficulty: U256Text,
    /// Root hash of the transactions trie.
    pub transactions_root: Hash,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Transaction-type-specific fields, modeled as a tagged variant so that an
/// unrecognized `type` retains only the raw tag string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransactionKind {
    /// Pre-EIP-2718 transaction: no access list, no priority fee.
    Legacy,
    /// EIP-2930: carries an access list alongside a legacy gas price.
    Eip2930,
    /// EIP-1559: carries `maxFeePerGas`/`maxPriorityFeePerGas` in place of a
    /// single gas price.
    Eip1559,
    /// L2 deposit transaction (no signature, no nonce in the usual sense).
    Deposit,
    /// A `type` tag this crate does not recognize; only the raw value is kept.
    Unknown(String),
}

/// A transaction. Key: `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Chain this transaction was submitted to.
    pub chain_id: u64,
    /// Transaction hash (unique key).
    pub hash: Hash,
    /// Hash of the enclosing block.
    pub block_hash: Hash,
    /// Number of the enclosing block.
    pub block_number: BlockNumber,
    /// Index of this transaction within its block.
    pub transaction_index: u32,
    /// Sender address.
    pub from: Address,
    /// Recipient address, or `None` for a contract-creation transaction.
    pub to: Option<Address>,
    /// Value transferred, in wei.
    pub value: U256Text,
    /// Call data / contract-creation bytecode.
    pub input: String,
    /// Gas limit supplied by the sender.
    pub gas: U256Text,
    /// Account nonce.
    pub nonce: u64,
    /// ECDSA signature `r` component.
    pub r: U256Text,
    /// ECDSA signature `s` component.
    pub s: U256Text,
    /// ECDSA signature `v`/recovery id.
    pub v: U256Text,
    /// Transaction-type-specific fields.
    pub kind: TransactionKind,
    /// Legacy/EIP-2930 gas price, if applicable.
    pub gas_price: Option<U256Text>,
    /// EIP-1559 max total fee per gas, if applicable.
    pub max_fee_per_gas: Option<U256Text>,
    /// EIP-1559 max priority fee per gas, if applicable.
    pub max_priority_fee_per_gas: Option<U256Text>,
    /// RLP-encoded access list, if applicable (EIP-2930/1559).
    pub access_list: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// A log emitted by a contract call. Key: synthetic `id` (`blockHash-logIndex`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Synthetic primary key: `"{blockHash}-{logIndex}"`.
    pub id: String,
    /// Chain this log was emitted on.
    pub chain_id: u64,
    /// Address of the emitting contract.
    pub address: Address,
    /// Hash of the enclosing block.
    pub block_hash: Hash,
    /// Number of the enclosing block.
    pub block_number: BlockNumber,
    /// ABI-encoded, non-indexed event data.
    pub data: String,
    /// Index of this log within its block.
    pub log_index: u32,
    /// Event selector (first indexed topic), if any.
    pub topic0: Option<Hash>,
    /// Second indexed topic, if any.
    pub topic1: Option<Hash>,
    /// Third indexed topic, if any.
    pub topic2: Option<Hash>,
    /// Fourth indexed topic, if any.
    pub topic3: Option<Hash>,
    /// Hash of the emitting transaction.
    pub transaction_hash: Hash,
    /// Index of the emitting transaction within its block.
    pub transaction_index: u32,
}

impl Log {
    /// Build the synthetic key `"{blockHash}-{logIndex}"`.
    #[must_use]
    pub fn make_id(block_hash: Hash, log_index: u32) -> String {
        format!("{}-{}", block_hash.to_hex(), log_index)
    }

    /// Non-null topics packed into their positional prefix (`topics` is
    /// never sparse — trailing nulls are dropped, not embedded).
    #[must_use]
    pub fn topics(&self) -> Vec<Hash> {
        [self.topic0, self.topic1, self.topic2, self.topic3]
            .into_iter()
            .take_while(Option::is_some)
            .flatten()
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOG FILTER / INTERVAL
// ═══════════════════════════════════════════════════════════════════════════════

/// A fully-bound log-filter fragment as persisted in `logFilters`. Mirrors
/// [`crate::fragment::LogFilterFragment`] but is the row shape, not the
/// builder's output type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Deterministic content-addressed id.
    pub id: String,
    /// Chain this fragment applies to.
    pub chain_id: u64,
    /// Bound address, or `None`.
    pub address: Option<Address>,
    /// Bound `topic0`, or `None`.
    pub topic0: Option<Hash>,
    /// Bound `topic1`, or `None`.
    pub topic1: Option<Hash>,
    /// Bound `topic2`, or `None`.
    pub topic2: Option<Hash>,
    /// Bound `topic3`, or `None`.
    pub topic3: Option<Hash>,
}

/// A closed interval of confirmed coverage for a [`LogFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilterInterval {
    /// Id of the fragment this interval covers.
    pub log_filter_id: String,
    /// Inclusive lower bound.
    pub start_block: BlockNumber,
    /// Inclusive upper bound.
    pub end_block: BlockNumber,
}

// ═══════════════════════════════════════════════════════════════════════════════
// FACTORY / INTERVAL
// ═══════════════════════════════════════════════════════════════════════════════

/// A fully-bound factory fragment as persisted in `factories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factory {
    /// Deterministic content-addressed id.
    pub id: String,
    /// Chain this fragment applies to.
    pub chain_id: u64,
    /// The factory contract emitting child-creation events.
    pub address: Address,
    /// The log's `topic0` identifying the child-creation event.
    pub event_selector: Hash,
    /// Where to extract the child address from a matching log.
    pub child_address_location: ChildAddressLocation,
    /// Bound `topic0` a matched child log must carry, or `None`.
    pub topic0: Option<Hash>,
    /// Bound `topic1` a matched child log must carry, or `None`.
    pub topic1: Option<Hash>,
    /// Bound `topic2` a matched child log must carry, or `None`.
    pub topic2: Option<Hash>,
    /// Bound `topic3` a matched child log must carry, or `None`.
    pub topic3: Option<Hash>,
}

/// A closed interval of confirmed coverage for a [`Factory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryLogFilterInterval {
    /// Id of the factory fragment this interval covers.
    pub factory_id: String,
    /// Inclusive lower bound.
    pub start_block: BlockNumber,
    /// Inclusive upper bound.
    pub end_block: BlockNumber,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RPC REQUEST CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// A memoized contract-read result. Key: `(chainId, blockNumber, request)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequestResult {
    /// Chain the request was made against.
    pub chain_id: u64,
    /// Block number the request was evaluated at.
    pub block_number: BlockNumber,
    /// Opaque request key, typically a hash of the RPC payload.
    pub request: String,
    /// Opaque result payload.
    pub result: String,
}
