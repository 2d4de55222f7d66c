//! Cartesian expansion of a `LogFilterCriteria`/factory criterion into the
//! fully-bound single-value fragments the sync store indexes on.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::types::primitives::{Address, Hash};

/// One value, or a set of alternative values, at a filter slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSet<T> {
    /// A single bound value.
    One(T),
    /// Any of several alternative values.
    Many(Vec<T>),
}

impl<T: Clone> ValueSet<T> {
    /// Expand into the concrete alternative values this slot admits.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v.clone()],
            Self::Many(vs) => vs.clone(),
        }
    }
}

/// A user-supplied log filter: each slot is either absent (`None`), a single
/// bound value, or a set of alternatives.
#[derive(Debug, Clone, Default)]
pub struct LogFilterCriteria {
    /// Address slot.
    pub address: Option<ValueSet<Address>>,
    /// Up to four topic slots (`topic0..topic3`).
    pub topics: [Option<ValueSet<Hash>>; 4],
}

/// A fully-bound fragment of a [`LogFilterCriteria`]: the unit of interval
/// bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilterFragment {
    /// Deterministic content-addressed id of `(chainId, address, topic0..3)`.
    pub id: String,
    /// Chain this fragment applies to.
    pub chain_id: u64,
    /// Bound address, or `None` if the filter did not constrain it.
    pub address: Option<Address>,
    /// Bound topics at each position, or `None` where unconstrained.
    pub topics: [Option<Hash>; 4],
}

/// Expand a [`LogFilterCriteria`] into the cartesian product of its fragments.
///
/// A singleton `ValueSet::Many(vec![a])` produces exactly the same fragment
/// (up to `id`) as `ValueSet::One(a)` — both degrade to a single bound value.
#[must_use]
pub fn build_log_filter_fragments(chain_id: u64, criteria: &LogFilterCriteria) -> Vec<LogFilterFragment> {
    let addresses: Vec<Option<Address>> = match &criteria.address {
        None => vec![None],
        Some(set) => set.values().into_iter().map(Some).collect(),
    };

    let topic_options: Vec<Vec<Option<Hash>>> = criteria
        .topics
        .iter()
        .map(|slot| match slot {
            None => vec![None],
            Some(set) => set.values().into_iter().map(Some).collect(),
        })
        .collect();

    let mut fragments = Vec::new();
    for address in &addresses {
        for t0 in &topic_options[0] {
            for t1 in &topic_options[1] {
                for t2 in &topic_options[2] {
                    for t3 in &topic_options[3] {
                        let topics = [*t0, *t1, *t2, *t3];
                        let id = log_filter_fragment_id(chain_id, *address, &topics);
                        fragments.push(LogFilterFragment {
                            id,
                            chain_id,
                            address: *address,
                            topics,
                        });
                    }
                }
            }
        }
    }
    fragments
}

/// Canonical content-addressed id for a `(chainId, address, topic0..3)`
/// tuple — the key of `logFilters`.
#[must_use]
pub fn log_filter_fragment_id(chain_id: u64, address: Option<Address>, topics: &[Option<Hash>; 4]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chain_id.to_le_bytes());
    hasher.update([u8::from(address.is_some())]);
    if let Some(addr) = address {
        hasher.update(addr.as_slice());
    }
    for topic in topics {
        hasher.update([u8::from(topic.is_some())]);
        if let Some(t) = topic {
            hasher.update(t.into_inner().as_slice());
        }
    }
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// Where a factory's child address is extracted from within a matching log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildAddressLocation {
    /// The low 20 bytes of `topicN` (N ∈ 1..3).
    Topic(u8),
    /// 20 bytes starting at byte `K` into `data`.
    Offset(u32),
}

impl ChildAddressLocation {
    fn tag(self) -> String {
        match self {
            Self::Topic(n) => format!("topic{n}"),
            Self::Offset(k) => format!("offset{k}"),
        }
    }

    /// Parse the persisted tag (`"topicN"` or `"offsetK"`) back into a
    /// [`ChildAddressLocation`]. Inverse of [`Self::tag`].
    #[must_use]
    pub fn parse_tag(tag: &str) -> Option<Self> {
        if let Some(n) = tag.strip_prefix("topic") {
            return n.parse().ok().map(Self::Topic);
        }
        if let Some(k) = tag.strip_prefix("offset") {
            return k.parse().ok().map(Self::Offset);
        }
        None
    }
}

impl fmt::Display for ChildAddressLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A user-supplied factory criterion: every fragment derived from it shares
/// the same bound `address`, `eventSelector`, and `childAddressLocation`; the
/// topic slots additionally constrain the matched child log itself, the same
/// way [`LogFilterCriteria::topics`] constrains a plain filter's matches.
#[derive(Debug, Clone)]
pub struct FactoryCriteria {
    /// Address slot — the factory contract(s) emitting child-creation events.
    pub address: ValueSet<Address>,
    /// The log's `topic0` identifying the child-creation event.
    pub event_selector: Hash,
    /// Where to extract the child address from a matching log.
    pub child_address_location: ChildAddressLocation,
    /// Up to four topic slots the matched child log must satisfy.
    pub topics: [Option<ValueSet<Hash>>; 4],
}

/// A fully-bound factory fragment. Unlike [`LogFilterFragment`], `address`
/// and `eventSelector` are always bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryFragment {
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
    /// Bound topics the matched child log must carry, or `None` where
    /// unconstrained, at each position.
    pub topics: [Option<Hash>; 4],
}

/// Expand a [`FactoryCriteria`] into the cartesian product of its fragments.
/// `eventSelector` and `childAddressLocation` are always bound; `address` and
/// each topic slot may each carry multiple alternatives.
#[must_use]
pub fn build_factory_fragments(chain_id: u64, criteria: &FactoryCriteria) -> Vec<FactoryFragment> {
    let topic_options: Vec<Vec<Option<Hash>>> = criteria
        .topics
        .iter()
        .map(|slot| match slot {
            None => vec![None],
            Some(set) => set.values().into_iter().map(Some).collect(),
        })
        .collect();

    let mut fragments = Vec::new();
    for address in criteria.address.values() {
        for t0 in &topic_options[0] {
            for t1 in &topic_options[1] {
                for t2 in &topic_options[2] {
                    for t3 in &topic_options[3] {
                        let topics = [*t0, *t1, *t2, *t3];
                        let id = factory_fragment_id(
                            chain_id,
                            address,
                            criteria.event_selector,
                            criteria.child_address_location,
                            &topics,
                        );
                        fragments.push(FactoryFragment {
                            id,
                            chain_id,
                            address,
                            event_selector: criteria.event_selector,
                            child_address_location: criteria.child_address_location,
                            topics,
                        });
                    }
                }
            }
        }
    }
    fragments
}

/// Canonical content-addressed id for a factory fragment — the key of
/// `factories`.
#[must_use]
pub fn factory_fragment_id(
    chain_id: u64,
    address: Address,
    event_selector: Hash,
    child_address_location: ChildAddressLocation,
    topics: &[Option<Hash>; 4],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chain_id.to_le_bytes());
    hasher.update(address.as_slice());
    hasher.update(event_selector.into_inner().as_slice());
    hasher.update(child_address_location.tag().as_bytes());
    for topic in topics {
        hasher.update([u8::from(topic.is_some())]);
        if let Some(t) = topic {
            hasher.update(t.into_inner().as_slice());
        }
    }
    format!("0x{}", hex::encode(hasher.finalize()))
}
