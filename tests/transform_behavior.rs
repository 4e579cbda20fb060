//! Behavior tests for the validator/transformer.
//!
//! These verify the transform contract the downstream store relies on:
//! empty input is an error, invalid rows are excluded and reported, and
//! every surviving row satisfies the schema.

use marketpipe_core::transform::{transform_ohlc, transform_snapshot, TransformError};
use marketpipe_core::{AssetId, RawBar, ValidationError};
use marketpipe_tests::snapshot_record;

#[test]
fn when_input_is_empty_transform_raises_no_data() {
    // Given/When: An empty extraction reaches the transform step
    let result = transform_snapshot(&[]);

    // Then: It surfaces as an upstream anomaly, never an empty table
    assert!(matches!(result, Err(TransformError::NoData)));
}

#[test]
fn when_one_of_three_records_lacks_a_price_two_rows_survive_and_one_is_reported() {
    // Given: Three raw records, one missing its required current_price
    let mut broken = snapshot_record("ethereum", Some(2), 3_500.0);
    broken
        .as_object_mut()
        .expect("record is an object")
        .remove("current_price");
    let raw = vec![
        snapshot_record("bitcoin", Some(1), 65_000.0),
        broken,
        snapshot_record("cardano", Some(9), 0.45),
    ];

    // When: The batch is transformed
    let batch = transform_snapshot(&raw).expect("one bad row never aborts the batch");

    // Then: Two validated rows, one reported failure with its payload
    assert_eq!(batch.rows.len(), 2);
    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.rejected[0].index, 1);
    assert!(batch.rejected[0].payload.contains("ethereum"));
}

#[test]
fn every_output_row_satisfies_the_snapshot_schema() {
    // Given: A mixed batch with valid and invalid rows
    let mut negative = snapshot_record("badcoin", Some(7), 1.0);
    negative["current_price"] = serde_json::json!(-5.0);
    let raw = vec![
        snapshot_record("bitcoin", Some(1), 65_000.0),
        snapshot_record("unranked", None, 0.02),
        negative,
    ];

    // When
    let batch = transform_snapshot(&raw).expect("batch survives");

    // Then: Output cardinality is input minus invalid rows, and every
    // survivor has the required non-null fields with price >= 0
    assert_eq!(batch.rows.len(), raw.len() - batch.rejected.len());
    for row in &batch.rows {
        assert!(!row.asset_id.as_str().is_empty());
        assert!(!row.symbol.is_empty());
        assert!(!row.name.is_empty());
        assert!(row.current_price >= 0.0);
        assert!(row.market_cap.is_finite());
    }
}

#[test]
fn row_order_independent_fields_are_projected_and_stamped_once() {
    let raw = vec![
        snapshot_record("bitcoin", Some(1), 65_000.0),
        snapshot_record("solana", Some(5), 170.0),
        snapshot_record("dogecoin", Some(11), 0.12),
    ];

    let batch = transform_snapshot(&raw).expect("valid batch");

    // One batch, one collection instant.
    assert!(batch
        .rows
        .iter()
        .all(|row| row.collected_at == batch.collected_at));
}

#[test]
fn when_ohlc_input_is_empty_transform_raises_no_data() {
    assert!(matches!(transform_ohlc(&[]), Err(TransformError::NoData)));
}

#[test]
fn ohlc_rows_with_inverted_ranges_are_rejected_individually() {
    let asset = AssetId::parse("bitcoin").expect("valid id");
    let raw = vec![
        RawBar {
            asset_id: asset.clone(),
            timestamp_ms: 1_704_067_200_000,
            open: 100.0,
            high: 90.0,
            low: 110.0,
            close: 95.0,
        },
        RawBar {
            asset_id: asset,
            timestamp_ms: 1_704_070_800_000,
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
        },
    ];

    let batch = transform_ohlc(&raw).expect("batch survives");

    assert_eq!(batch.rows.len(), 1);
    assert_eq!(batch.rejected.len(), 1);
    assert!(matches!(
        batch.rejected[0].reason,
        ValidationError::InvalidBarRange
    ));
}
