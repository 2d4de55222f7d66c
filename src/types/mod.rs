//! Domain types for the sync store.
//!
//! - [`primitives`] — validated newtypes (`Address`, `Hash`, `BlockNumber`,
//!   `Timestamp`, `U256Text`)
//! - [`entities`] — persisted rows (`Block`, `Transaction`, `Log`,
//!   `LogFilter`, `Factory`, `RpcRequestResult`, …)
//! - [`event`] — the event iterator's joined `Event` and page shapes

pub mod entities;
pub mod event;
pub mod primitives;

pub use entities::{
    Block, Factory, FactoryLogFilterInterval, Log, LogFilter, LogFilterInterval,
    RpcRequestResult, Transaction, TransactionKind,
};
pub use event::{
    ChildAddressPage, Event, EventCount, EventCursor, FactoryRequest, LogEventPage,
    LogEventsQuery, LogFilterRequest, PageMetadata,
};
pub use primitives::{Address, BlockNumber, Hash, Timestamp, U256Text};
