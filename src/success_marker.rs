//! Success-marker protocol.
//!
//! A sentinel object at `{prefix}/__SUCCESS__` asserts that every object
//! intended for that prefix has been written. Its body is the write time in
//! lexicographically sortable form; its metadata accumulates the aggregators
//! that have contributed to the prefix over time.

use crate::datetime::dt_to_lexicographic_prefix;
use crate::object_store::ObjectStore;
use crate::types::{DataAccessError, ObjectMetadata, ObjectTags, Result};
use chrono::Utc;
use tracing::info;

pub const SUCCESS_MARKER_FILENAME: &str = "__SUCCESS__";

/// Marker metadata key: comma-joined aggregator ids, append-only.
pub const AGGREGATORS_METADATA_KEY: &str = "aggregators";

/// Marker metadata key: comma-joined write timestamps, parallel to
/// [`AGGREGATORS_METADATA_KEY`].
pub const AGGREGATORS_DT_METADATA_KEY: &str = "aggregators_dt";

pub fn success_marker_key(prefix: &str) -> String {
    format!("{prefix}/{SUCCESS_MARKER_FILENAME}")
}

/// Write or overwrite the success marker at a prefix.
pub async fn store_success_marker(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    metadata: &ObjectMetadata,
) -> Result<()> {
    let key = success_marker_key(prefix);
    info!("Uploading success marker {key} to bucket {bucket}");
    let body = dt_to_lexicographic_prefix(Utc::now());
    store
        .put(bucket, &key, &body, metadata, &ObjectTags::new(), true)
        .await
}

/// Read the success marker at a prefix, failing with `SuccessMarkerMissing`
/// when absent.
pub async fn read_success_marker(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<(String, ObjectMetadata, ObjectTags)> {
    let key = success_marker_key(prefix);
    info!("Downloading success marker {key} from bucket {bucket}");
    store.get(bucket, &key).await.map_err(|e| match e {
        DataAccessError::ObjectNotFound { bucket, .. } => {
            DataAccessError::SuccessMarkerMissing {
                bucket,
                prefix: prefix.to_string(),
            }
        }
        other => other,
    })
}

pub async fn success_marker_exists(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<bool> {
    store.exists(bucket, &success_marker_key(prefix)).await
}

/// Append an aggregator id and its write timestamp to marker metadata.
///
/// The two fields are comma-joined audit lists; repeated aggregator ids are
/// kept, not deduplicated.
pub fn append_aggregator(metadata: &mut ObjectMetadata, aggregator_id: &str, aggregation_dt: &str) {
    for (key, value) in [
        (AGGREGATORS_METADATA_KEY, aggregator_id),
        (AGGREGATORS_DT_METADATA_KEY, aggregation_dt),
    ] {
        let entry = metadata.entry(key.to_string()).or_default();
        if entry.is_empty() {
            entry.push_str(value);
        } else {
            entry.push(',');
            entry.push_str(value);
        }
    }
}
