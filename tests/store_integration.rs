//! Integration tests for `PostgresSyncStore` against a real `PostgreSQL`.
//!
//! These tests run against a real `PostgreSQL` instance in Docker. They
//! verify that the sync store's ingestion, interval bookkeeping, and event
//! iterator behave correctly against the actual schema.

mod common;

use common::fixtures::{TestDb, block_fixtures, log_fixtures, transaction_fixtures};

use evm_sync_store::fragment::{ChildAddressLocation, FactoryCriteria, LogFilterCriteria, ValueSet};
use evm_sync_store::interval::Interval;
use evm_sync_store::ports::SyncStore;
use evm_sync_store::types::entities::Factory;
use evm_sync_store::types::primitives::{BlockNumber, Timestamp};
use evm_sync_store::types::{FactoryRequest, LogEventsQuery, LogFilterRequest};

// ═══════════════════════════════════════════════════════════════════════════════
// LOG FILTER INTERVALS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn log_filter_interval_round_trips() {
    let db = TestDb::new().await;

    let block = block_fixtures::sample_block(1, 100, 1_000);
    let tx = transaction_fixtures::sample_transaction(&block, 0);
    let log = log_fixtures::sample_log(
        transaction_fixtures::actor(0x40),
        &tx,
        0,
        &[log_fixtures::topic(0xaa)],
    );

    let criteria = LogFilterCriteria {
        address: Some(ValueSet::One(log.address)),
        topics: [Some(ValueSet::One(log_fixtures::topic(0xaa))), None, None, None],
    };

    db.store
        .insert_log_filter_interval(
            1,
            &criteria,
            &block,
            &[tx.clone()],
            &[log.clone()],
            Interval::new(BlockNumber::new(100), BlockNumber::new(100)),
        )
        .await
        .unwrap();

    let intervals = db.store.get_log_filter_intervals(1, &criteria).await.unwrap();
    assert_eq!(intervals, vec![Interval::new(BlockNumber::new(100), BlockNumber::new(100))]);
}

#[tokio::test]
async fn adjacent_log_filter_intervals_merge() {
    let db = TestDb::new().await;

    let criteria = LogFilterCriteria {
        address: Some(ValueSet::One(transaction_fixtures::actor(0x50))),
        topics: [None, None, None, None],
    };

    for number in [100, 101] {
        let block = block_fixtures::sample_block(1, number, number * 10);
        let tx = transaction_fixtures::sample_transaction(&block, 0);
        let log = log_fixtures::sample_log(transaction_fixtures::actor(0x50), &tx, 0, &[]);
        db.store
            .insert_log_filter_interval(
                1,
                &criteria,
                &block,
                &[tx],
                &[log],
                Interval::new(BlockNumber::new(number), BlockNumber::new(number)),
            )
            .await
            .unwrap();
    }

    let intervals = db.store.get_log_filter_intervals(1, &criteria).await.unwrap();
    assert_eq!(intervals, vec![Interval::new(BlockNumber::new(100), BlockNumber::new(101))]);
}

#[tokio::test]
async fn cross_fragment_coverage_is_intersected() {
    let db = TestDb::new().await;

    let topic_a = log_fixtures::topic(0x01);
    let topic_b = log_fixtures::topic(0x02);

    let criteria = LogFilterCriteria {
        address: None,
        topics: [Some(ValueSet::Many(vec![topic_a, topic_b])), None, None, None],
    };

    let fragment_a = LogFilterCriteria {
        address: None,
        topics: [Some(ValueSet::One(topic_a)), None, None, None],
    };
    let fragment_b = LogFilterCriteria {
        address: None,
        topics: [Some(ValueSet::One(topic_b)), None, None, None],
    };

    let block = block_fixtures::sample_block(1, 150, 1_500);
    let tx = transaction_fixtures::sample_transaction(&block, 0);
    let log = log_fixtures::sample_log(transaction_fixtures::actor(0x55), &tx, 0, &[topic_a]);

    // Only fragment-A gets coverage [150,150]; fragment-B is never recorded.
    db.store
        .insert_log_filter_interval(
            1,
            &fragment_a,
            &block,
            &[tx],
            &[log],
            Interval::new(BlockNumber::new(150), BlockNumber::new(150)),
        )
        .await
        .unwrap();

    assert!(db.store.get_log_filter_intervals(1, &criteria).await.unwrap().is_empty());

    // Now also record fragment-B over the same range; the intersection
    // becomes non-empty.
    let block2 = block_fixtures::sample_block(1, 151, 1_510);
    let tx2 = transaction_fixtures::sample_transaction(&block2, 0);
    let log2 = log_fixtures::sample_log(transaction_fixtures::actor(0x55), &tx2, 0, &[topic_b]);
    db.store
        .insert_log_filter_interval(
            1,
            &fragment_b,
            &block2,
            &[tx2],
            &[log2],
            Interval::new(BlockNumber::new(150), BlockNumber::new(150)),
        )
        .await
        .unwrap();

    let intervals = db.store.get_log_filter_intervals(1, &criteria).await.unwrap();
    assert_eq!(intervals, vec![Interval::new(BlockNumber::new(150), BlockNumber::new(150))]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// FACTORY CHILD ADDRESSES
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn factory_child_addresses_derive_from_topic() {
    let db = TestDb::new().await;

    let factory_address = transaction_fixtures::actor(0x60);
    let child = transaction_fixtures::actor(0x70);
    let event_selector = log_fixtures::topic(0xbb);

    let block = block_fixtures::sample_block(1, 200, 2_000);
    let tx = transaction_fixtures::sample_transaction(&block, 0);
    let emitter_log = log_fixtures::sample_log(
        factory_address,
        &tx,
        0,
        &[event_selector, log_fixtures::address_topic(child)],
    );

    let criteria = FactoryCriteria {
        address: ValueSet::One(factory_address),
        event_selector,
        child_address_location: ChildAddressLocation::Topic(1),
        topics: [None, None, None, None],
    };

    db.store
        .insert_factory_log_filter_interval(
            1,
            &criteria,
            &block,
            &[tx],
            &[emitter_log],
            Interval::new(BlockNumber::new(200), BlockNumber::new(200)),
        )
        .await
        .unwrap();

    let factory = Factory {
        id: "doesn't matter for this query".to_string(),
        chain_id: 1,
        address: factory_address,
        event_selector,
        child_address_location: ChildAddressLocation::Topic(1),
        topic0: None,
        topic1: None,
        topic2: None,
        topic3: None,
    };

    let page = db
        .store
        .get_factory_child_addresses(1, &factory, BlockNumber::new(200), 10, None)
        .await
        .unwrap();

    assert_eq!(page.addresses, vec![child]);
    assert!(page.is_last_page(10));
}

#[tokio::test]
async fn factory_child_addresses_derive_from_data_offset() {
    let db = TestDb::new().await;

    let factory_address = transaction_fixtures::actor(0x61);
    let child = transaction_fixtures::actor(0x71);
    let event_selector = log_fixtures::topic(0xb2);

    let block = block_fixtures::sample_block(1, 210, 2_100);
    let tx = transaction_fixtures::sample_transaction(&block, 0);
    let mut emitter_log = log_fixtures::sample_log(factory_address, &tx, 0, &[event_selector]);
    // Word 0 of `data`, low 20 bytes, holds the child address.
    emitter_log.data = format!("0x{}{}", "00".repeat(12), hex::encode(child.as_slice()));

    let criteria = FactoryCriteria {
        address: ValueSet::One(factory_address),
        event_selector,
        child_address_location: ChildAddressLocation::Offset(0),
        topics: [None, None, None, None],
    };

    db.store
        .insert_factory_log_filter_interval(
            1,
            &criteria,
            &block,
            &[tx],
            &[emitter_log],
            Interval::new(BlockNumber::new(210), BlockNumber::new(210)),
        )
        .await
        .unwrap();

    let factory = Factory {
        id: "doesn't matter for this query".to_string(),
        chain_id: 1,
        address: factory_address,
        event_selector,
        child_address_location: ChildAddressLocation::Offset(0),
        topic0: None,
        topic1: None,
        topic2: None,
        topic3: None,
    };

    let page = db
        .store
        .get_factory_child_addresses(1, &factory, BlockNumber::new(210), 10, None)
        .await
        .unwrap();

    assert_eq!(page.addresses, vec![child]);
    assert!(page.is_last_page(10));
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT ITERATOR
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn log_events_are_paginated_in_total_order() {
    let db = TestDb::new().await;

    let emitter = transaction_fixtures::actor(0x80);
    let selector = log_fixtures::topic(0xcc);

    let criteria = LogFilterCriteria {
        address: Some(ValueSet::One(emitter)),
        topics: [Some(ValueSet::One(selector)), None, None, None],
    };

    for number in [300u64, 301, 302] {
        let block = block_fixtures::sample_block(1, number, number);
        let tx = transaction_fixtures::sample_transaction(&block, 0);
        let log = log_fixtures::sample_log(emitter, &tx, 0, &[selector]);
        db.store
            .insert_log_filter_interval(
                1,
                &criteria,
                &block,
                &[tx],
                &[log],
                Interval::new(BlockNumber::new(number), BlockNumber::new(number)),
            )
            .await
            .unwrap();
    }

    let request = LogFilterRequest {
        event_source_name: "Transfer".to_string(),
        chain_id: 1,
        criteria,
        from_block: None,
        to_block: None,
        include_event_selectors: None,
    };

    let query = LogEventsQuery {
        from_timestamp: Timestamp::new(0),
        to_timestamp: Timestamp::new(u64::MAX),
        log_filters: vec![request],
        factories: vec![],
        page_size: 2,
    };

    let first_page = db.store.get_log_events(&query, None).await.unwrap();
    assert_eq!(first_page.events.len(), 2);
    assert!(!first_page.is_last_page(2));
    assert_eq!(first_page.metadata.counts[0].count, 3);

    let cursor = first_page.next_cursor().unwrap();
    let second_page = db.store.get_log_events(&query, Some(cursor)).await.unwrap();
    assert_eq!(second_page.events.len(), 1);
    assert!(second_page.is_last_page(2));

    // No overlap between pages.
    assert_ne!(first_page.events[0].log.id, second_page.events[0].log.id);
    assert_ne!(first_page.events[1].log.id, second_page.events[0].log.id);
}

#[tokio::test]
async fn page_counts_cover_every_matched_selector_and_stay_stable_across_pages() {
    let db = TestDb::new().await;

    let emitter = transaction_fixtures::actor(0x85);
    let selector_x = log_fixtures::topic(0xe1);
    let selector_y = log_fixtures::topic(0xe2);

    let criteria = LogFilterCriteria {
        address: Some(ValueSet::One(emitter)),
        topics: [Some(ValueSet::Many(vec![selector_x, selector_y])), None, None, None],
    };

    // Three logs with selector X, two with selector Y, interleaved across blocks.
    let selectors = [selector_x, selector_x, selector_y, selector_x, selector_y];
    for (i, selector) in selectors.into_iter().enumerate() {
        let number = 500 + i as u64;
        let block = block_fixtures::sample_block(1, number, number);
        let tx = transaction_fixtures::sample_transaction(&block, 0);
        let log = log_fixtures::sample_log(emitter, &tx, 0, &[selector]);
        db.store
            .insert_log_filter_interval(
                1,
                &criteria,
                &block,
                &[tx],
                &[log],
                Interval::new(BlockNumber::new(number), BlockNumber::new(number)),
            )
            .await
            .unwrap();
    }

    let request = LogFilterRequest {
        event_source_name: "Transfer".to_string(),
        chain_id: 1,
        criteria,
        from_block: None,
        to_block: None,
        include_event_selectors: None,
    };

    let query = LogEventsQuery {
        from_timestamp: Timestamp::new(0),
        to_timestamp: Timestamp::new(u64::MAX),
        log_filters: vec![request],
        factories: vec![],
        page_size: 2,
    };

    let assert_counts = |counts: &[evm_sync_store::types::EventCount]| {
        let mut sorted: Vec<(Option<_>, i64)> = counts.iter().map(|c| (c.event_selector, c.count)).collect();
        sorted.sort_by_key(|(selector, _)| selector.map(|h| h.to_hex()));
        assert_eq!(sorted, vec![(Some(selector_x), 3), (Some(selector_y), 2)]);
    };

    let first_page = db.store.get_log_events(&query, None).await.unwrap();
    assert_counts(&first_page.metadata.counts);

    let cursor = first_page.next_cursor().unwrap();
    let second_page = db.store.get_log_events(&query, Some(cursor)).await.unwrap();
    assert_counts(&second_page.metadata.counts);
}

#[tokio::test]
async fn cursor_pagination_splits_same_block_logs_by_log_index() {
    let db = TestDb::new().await;

    let emitter = transaction_fixtures::actor(0x86);
    let selector = log_fixtures::topic(0xe5);

    let criteria = LogFilterCriteria {
        address: Some(ValueSet::One(emitter)),
        topics: [Some(ValueSet::One(selector)), None, None, None],
    };

    // Two logs sharing the exact same (timestamp, chainId, blockNumber) but
    // with different logIndex. A cursor built from `timestamp > lastSeen`
    // alone would skip the second log or repeat the first; only a tuple
    // cursor on `(timestamp, chainId, blockNumber, logIndex)` splits them
    // correctly across pages.
    let block = block_fixtures::sample_block(1, 700, 7_000);
    let tx = transaction_fixtures::sample_transaction(&block, 0);
    let log0 = log_fixtures::sample_log(emitter, &tx, 0, &[selector]);
    let log1 = log_fixtures::sample_log(emitter, &tx, 1, &[selector]);

    db.store
        .insert_log_filter_interval(
            1,
            &criteria,
            &block,
            &[tx],
            &[log0.clone(), log1.clone()],
            Interval::new(BlockNumber::new(700), BlockNumber::new(700)),
        )
        .await
        .unwrap();

    let request = LogFilterRequest {
        event_source_name: "Transfer".to_string(),
        chain_id: 1,
        criteria,
        from_block: None,
        to_block: None,
        include_event_selectors: None,
    };

    let query = LogEventsQuery {
        from_timestamp: Timestamp::new(0),
        to_timestamp: Timestamp::new(u64::MAX),
        log_filters: vec![request],
        factories: vec![],
        page_size: 1,
    };

    let first_page = db.store.get_log_events(&query, None).await.unwrap();
    assert_eq!(first_page.events.len(), 1);
    assert!(!first_page.is_last_page(1));
    assert_eq!(first_page.events[0].log.id, log0.id);

    let cursor = first_page.next_cursor().unwrap();
    let second_page = db.store.get_log_events(&query, Some(cursor)).await.unwrap();
    assert_eq!(second_page.events.len(), 1);
    assert!(second_page.is_last_page(1));
    assert_eq!(second_page.events[0].log.id, log1.id);
}

#[tokio::test]
async fn log_matched_by_filter_and_factory_appears_once() {
    let db = TestDb::new().await;

    let emitter = transaction_fixtures::actor(0x90);
    let selector = log_fixtures::topic(0xdd);

    let block = block_fixtures::sample_block(1, 400, 4_000);
    let tx = transaction_fixtures::sample_transaction(&block, 0);
    // The factory's derived child address is the row's own address, so the
    // same log qualifies as a hit for both the plain filter and the factory.
    let log = log_fixtures::sample_log(emitter, &tx, 0, &[selector, log_fixtures::address_topic(emitter)]);

    let log_criteria = LogFilterCriteria {
        address: Some(ValueSet::One(emitter)),
        topics: [Some(ValueSet::One(selector)), None, None, None],
    };
    let factory_criteria = FactoryCriteria {
        address: ValueSet::One(emitter),
        event_selector: selector,
        child_address_location: ChildAddressLocation::Topic(1),
        topics: [None, None, None, None],
    };

    db.store
        .insert_log_filter_interval(
            1,
            &log_criteria,
            &block,
            &[tx.clone()],
            &[log.clone()],
            Interval::new(BlockNumber::new(400), BlockNumber::new(400)),
        )
        .await
        .unwrap();
    db.store
        .insert_factory_log_filter_interval(
            1,
            &factory_criteria,
            &block,
            &[tx],
            &[log],
            Interval::new(BlockNumber::new(400), BlockNumber::new(400)),
        )
        .await
        .unwrap();

    let query = LogEventsQuery {
        from_timestamp: Timestamp::new(0),
        to_timestamp: Timestamp::new(u64::MAX),
        log_filters: vec![LogFilterRequest {
            event_source_name: "AsFilter".to_string(),
            chain_id: 1,
            criteria: log_criteria,
            from_block: None,
            to_block: None,
            include_event_selectors: None,
        }],
        factories: vec![FactoryRequest {
            event_source_name: "AsFactory".to_string(),
            chain_id: 1,
            factory: factory_criteria,
            from_block: None,
            to_block: None,
            include_event_selectors: None,
        }],
        page_size: 10,
    };

    let page = db.store.get_log_events(&query, None).await.unwrap();
    assert_eq!(page.events.len(), 1);
    assert_eq!(page.events[0].event_source_name, "AsFilter");
}

// ═══════════════════════════════════════════════════════════════════════════════
// RPC REQUEST CACHE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn rpc_request_result_is_upserted() {
    let db = TestDb::new().await;

    db.store
        .insert_rpc_request_result(1, BlockNumber::new(500), "totalSupply()", "0x01")
        .await
        .unwrap();

    let result = db
        .store
        .get_rpc_request_result(1, BlockNumber::new(500), "totalSupply()")
        .await
        .unwrap();
    assert_eq!(result, Some("0x01".to_string()));

    db.store
        .insert_rpc_request_result(1, BlockNumber::new(500), "totalSupply()", "0x02")
        .await
        .unwrap();

    let updated = db
        .store
        .get_rpc_request_result(1, BlockNumber::new(500), "totalSupply()")
        .await
        .unwrap();
    assert_eq!(updated, Some("0x02".to_string()));
}

// ═══════════════════════════════════════════════════════════════════════════════
// REALTIME DATA AND REORGS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn delete_realtime_data_clamps_intervals_and_removes_rows() {
    let db = TestDb::new().await;

    let criteria = LogFilterCriteria {
        address: Some(ValueSet::One(transaction_fixtures::actor(0xb0))),
        topics: [None, None, None, None],
    };

    for number in [600u64, 601, 602] {
        let block = block_fixtures::sample_block(1, number, number);
        let tx = transaction_fixtures::sample_transaction(&block, 0);
        let log = log_fixtures::sample_log(transaction_fixtures::actor(0xb0), &tx, 0, &[]);
        db.store
            .insert_realtime_block(1, &block, &[tx], &[log])
            .await
            .unwrap();
    }
    db.store
        .insert_realtime_interval(
            1,
            &[criteria.clone()],
            &[],
            Interval::new(BlockNumber::new(600), BlockNumber::new(602)),
        )
        .await
        .unwrap();

    db.store
        .delete_realtime_data(1, BlockNumber::new(600))
        .await
        .unwrap();

    let threshold = BlockNumber::new(600).encode();
    let remaining_blocks: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blocks WHERE chain_id = 1 AND number > $1")
        .bind(&threshold)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(remaining_blocks.0, 0);

    let intervals = db.store.get_log_filter_intervals(1, &criteria).await.unwrap();
    assert_eq!(intervals, vec![Interval::new(BlockNumber::new(600), BlockNumber::new(600))]);
}
