//! Shapes produced by the event iterator: the joined `Event`, its
//! cursor, and per-page metadata.

use serde::{Deserialize, Serialize};

use super::entities::{Block, Log, Transaction};
use super::primitives::{BlockNumber, Hash, Timestamp};
use crate::fragment::{FactoryCriteria, LogFilterCriteria};

/// A fully-joined, decoded event: a log together with its enclosing block and
/// transaction, tagged with the caller-supplied source name it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Caller-supplied label of the filter or factory that matched this log.
    pub event_source_name: String,
    /// The chain the log was emitted on.
    pub chain_id: u64,
    /// The matching log.
    pub log: Log,
    /// The log's enclosing block.
    pub block: Block,
    /// The log's emitting transaction.
    pub transaction: Transaction,
}

impl Event {
    /// The total-order sort key used by the iterator's cursor:
    /// `(block.timestamp, log.chainId, block.number, log.logIndex)`.
    #[must_use]
    pub fn sort_key(&self) -> EventCursor {
        EventCursor {
            timestamp: self.block.timestamp,
            chain_id: self.chain_id,
            block_number: self.block.number,
            log_index: self.log.log_index,
        }
    }
}

/// The `(timestamp, chainId, blockNumber, logIndex)` tuple the event
/// iterator orders and paginates on. `Ord` implements the lexicographic
/// comparison `(t,c,b,l) > (T,C,B,L)` by field order — never simple
/// `timestamp > T`, which would lose ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventCursor {
    /// Block timestamp.
    pub timestamp: Timestamp,
    /// Chain id (breaks ties between chains sharing a timestamp).
    pub chain_id: u64,
    /// Block number.
    pub block_number: BlockNumber,
    /// Log index within the block.
    pub log_index: u32,
}

/// One `logFilter`-shaped request within a [`LogEventsQuery`].
#[derive(Debug, Clone)]
pub struct LogFilterRequest {
    /// Label applied to every event this request matches.
    pub event_source_name: String,
    /// Chain this request applies to.
    pub chain_id: u64,
    /// The filter criteria.
    pub criteria: LogFilterCriteria,
    /// Inclusive lower block bound, if any.
    pub from_block: Option<BlockNumber>,
    /// Inclusive upper block bound, if any.
    pub to_block: Option<BlockNumber>,
    /// If set, only logs whose `topic0` is in this set match.
    pub include_event_selectors: Option<Vec<Hash>>,
}

/// One factory-shaped request within a [`LogEventsQuery`].
#[derive(Debug, Clone)]
pub struct FactoryRequest {
    /// Label applied to every event this request matches.
    pub event_source_name: String,
    /// Chain this request applies to.
    pub chain_id: u64,
    /// The factory criteria.
    pub factory: FactoryCriteria,
    /// Inclusive lower block bound, if any.
    pub from_block: Option<BlockNumber>,
    /// Inclusive upper block bound, if any.
    pub to_block: Option<BlockNumber>,
    /// If set, only logs whose `topic0` is in this set match.
    pub include_event_selectors: Option<Vec<Hash>>,
}

/// Parameters to `getLogEvents`: a time window, a set of filter and
/// factory requests (an event matches if any request matches it), and a page
/// size.
#[derive(Debug, Clone)]
pub struct LogEventsQuery {
    /// Inclusive lower timestamp bound.
    pub from_timestamp: Timestamp,
    /// Inclusive upper timestamp bound.
    pub to_timestamp: Timestamp,
    /// Plain log-filter requests.
    pub log_filters: Vec<LogFilterRequest>,
    /// Factory-child-address requests.
    pub factories: Vec<FactoryRequest>,
    /// Maximum rows per page.
    pub page_size: u32,
}

/// Constant-across-pages count of matching logs, grouped by
/// `(eventSourceName, topic0)`, computed without the `includeEventSelectors`
/// clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCount {
    /// The event source name this count belongs to.
    pub event_source_name: String,
    /// The `topic0` this count belongs to, if the matching logs have one.
    pub event_selector: Option<Hash>,
    /// Number of matching logs.
    pub count: i64,
}

/// Metadata attached to every page of a `getLogEvents` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// The last row's `block.timestamp`, or `toTimestamp` if the page is
    /// empty.
    pub page_ends_at_timestamp: Timestamp,
    /// Constant across all pages of one call.
    pub counts: Vec<EventCount>,
}

/// One page yielded by `getLogEvents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEventPage {
    /// Events on this page, strictly ascending by [`EventCursor`].
    pub events: Vec<Event>,
    /// Page metadata.
    pub metadata: PageMetadata,
}

impl LogEventPage {
    /// Whether the caller should request another page: the iterator
    /// terminates when a page returns fewer than `pageSize` rows.
    #[must_use]
    pub fn is_last_page(&self, page_size: u32) -> bool {
        self.events.len() < page_size as usize
    }

    /// The cursor to resume from for the next page, if any events were
    /// returned.
    #[must_use]
    pub fn next_cursor(&self) -> Option<EventCursor> {
        self.events.last().map(Event::sort_key)
    }
}

/// One page yielded by `getFactoryChildAddresses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildAddressPage {
    /// Derived child addresses, ordered by ascending `blockNumber`.
    pub addresses: Vec<super::primitives::Address>,
    /// Cursor to resume from: the last-seen `blockNumber`.
    pub cursor: Option<BlockNumber>,
}

impl ChildAddressPage {
    /// Whether the caller should request another page.
    #[must_use]
    pub fn is_last_page(&self, page_size: u32) -> bool {
        self.addresses.len() < page_size as usize
    }
}
