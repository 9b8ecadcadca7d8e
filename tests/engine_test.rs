//! Engine production properties

mod common;

use chrono::{TimeZone, Utc};
use common::CountingSink;
use dynamo::dynamo::engine::{DataEngine, HourlyRangeEngine, QuantityEngine};
use dynamo::dynamo::sink::DataSink;
use dynamo::dynamo::record::{FieldValue, GameEventFactory};
use std::sync::Arc;

#[tokio::test]
async fn test_quantity_engine_delivers_exact_count() {
    let sink = Arc::new(CountingSink::new());
    let mut engine = QuantityEngine::new(
        Arc::new(GameEventFactory::new()),
        Arc::clone(&sink) as Arc<dyn DataSink>,
    )
    .with_quantity(10_000)
    .with_threads(8);

    engine.produce().await.unwrap();

    assert_eq!(sink.count(), 10_000);
}

#[tokio::test]
async fn test_quantity_engine_zero_records() {
    let sink = Arc::new(CountingSink::new());
    let mut engine = QuantityEngine::new(
        Arc::new(GameEventFactory::new()),
        Arc::clone(&sink) as Arc<dyn DataSink>,
    )
    .with_quantity(0);

    engine.produce().await.unwrap();

    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn test_hourly_range_bounds_and_buckets() {
    let start = Utc.with_ymd_and_hms(2021, 6, 14, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2021, 6, 14, 3, 0, 0).unwrap();
    let hours = 3u64;
    let (lower, upper) = (2u64, 5u64);

    let sink = Arc::new(CountingSink::new());
    let mut engine = HourlyRangeEngine::new(
        Arc::new(GameEventFactory::new()),
        Arc::clone(&sink) as Arc<dyn DataSink>,
    )
    .with_quantity_range(lower, upper)
    .with_date_range(start, end)
    .with_threads(2);

    engine.produce().await.unwrap();

    let total = sink.count();
    assert!(total >= hours * lower, "total {} below lower bound", total);
    assert!(
        total <= hours * (upper - 1),
        "total {} above upper bound",
        total
    );

    let buckets = [
        start,
        start + chrono::Duration::hours(1),
        start + chrono::Duration::hours(2),
    ];
    for (partition, record) in sink.captured() {
        let timestamp = match record.get("timestamp") {
            Some(FieldValue::Timestamp(ts)) => *ts,
            other => panic!("record missing bucket timestamp: {:?}", other),
        };
        assert!(buckets.contains(&timestamp), "stray bucket {}", timestamp);

        let expected_partition = timestamp.format("%Y/%m/%d/%H00").to_string();
        assert_eq!(partition.as_deref(), Some(expected_partition.as_str()));
    }
}

#[tokio::test]
async fn test_hourly_range_partitions_are_date_paths() {
    let start = Utc.with_ymd_and_hms(2021, 6, 14, 13, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2021, 6, 14, 14, 0, 0).unwrap();

    let sink = Arc::new(CountingSink::new());
    let mut engine = HourlyRangeEngine::new(
        Arc::new(GameEventFactory::new()),
        Arc::clone(&sink) as Arc<dyn DataSink>,
    )
    .with_quantity_range(1, 3)
    .with_date_range(start, end);

    engine.produce().await.unwrap();

    for (partition, _) in sink.captured() {
        assert_eq!(partition.as_deref(), Some("2021/06/14/1300"));
    }
}
