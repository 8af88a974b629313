//! Wire codec for WAL records and series snapshots.
//!
//! Messages are encoded with `prost` as length-delimited, tag-numbered
//! fields, so new fields can be added without breaking old readers and
//! unknown tags are skipped on decode. Byte-exactness across versions is
//! not guaranteed, only round-trip fidelity.

use prost::Message;

use crate::labels::{Label, LabelSet};

/// A label name/value pair as it appears on the wire.
#[derive(Clone, PartialEq, Message)]
pub struct LabelPair {
    /// Label name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Label value.
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Declares the creation of a previously unseen series.
#[derive(Clone, PartialEq, Message)]
pub struct SeriesDeclaration {
    /// Fingerprint of the label set.
    #[prost(uint64, tag = "1")]
    pub fingerprint: u64,
    /// The label set, in sorted order.
    #[prost(message, repeated, tag = "2")]
    pub labels: Vec<LabelPair>,
}

/// A single sample for an already-declared series.
#[derive(Clone, PartialEq, Message)]
pub struct RecordSample {
    /// Fingerprint of the owning series.
    #[prost(uint64, tag = "1")]
    pub fingerprint: u64,
    /// Sample timestamp in unix milliseconds.
    #[prost(int64, tag = "2")]
    pub timestamp_ms: i64,
    /// Sample value.
    #[prost(double, tag = "3")]
    pub value: f64,
}

/// The unit appended to the sample log for every ingestion batch.
///
/// Immutable once appended.
#[derive(Clone, PartialEq, Message)]
pub struct WalRecord {
    /// Tenant the batch belongs to.
    #[prost(string, tag = "1")]
    pub tenant_id: String,
    /// Label-set declarations for series first seen in this batch.
    #[prost(message, repeated, tag = "2")]
    pub series: Vec<SeriesDeclaration>,
    /// Samples in this batch.
    #[prost(message, repeated, tag = "3")]
    pub samples: Vec<RecordSample>,
}

/// An opaque compressed block of samples for one series.
#[derive(Clone, PartialEq, Message)]
pub struct WireChunk {
    /// Timestamp of the first sample in the block, unix milliseconds.
    #[prost(int64, tag = "1")]
    pub first_time_ms: i64,
    /// Timestamp of the last sample in the block, unix milliseconds.
    #[prost(int64, tag = "2")]
    pub last_time_ms: i64,
    /// Encoding tag; see [`crate::chunk`].
    #[prost(uint32, tag = "3")]
    pub encoding: u32,
    /// Encoded sample payload.
    #[prost(bytes = "vec", tag = "4")]
    pub data: Vec<u8>,
}

/// One live series captured during a checkpoint pass.
#[derive(Clone, PartialEq, Message)]
pub struct SeriesSnapshot {
    /// Owning tenant.
    #[prost(string, tag = "1")]
    pub tenant_id: String,
    /// Fingerprint of the series.
    #[prost(uint64, tag = "2")]
    pub fingerprint: u64,
    /// The series' label set.
    #[prost(message, repeated, tag = "3")]
    pub labels: Vec<LabelPair>,
    /// The series' chunks at the moment of capture.
    #[prost(message, repeated, tag = "4")]
    pub chunks: Vec<WireChunk>,
}

impl From<&LabelSet> for Vec<LabelPair> {
    fn from(set: &LabelSet) -> Self {
        set.pairs()
            .iter()
            .map(|l| LabelPair {
                name: l.name.clone(),
                value: l.value.clone(),
            })
            .collect()
    }
}

impl From<&[LabelPair]> for LabelSet {
    fn from(pairs: &[LabelPair]) -> Self {
        LabelSet::from_pairs(
            pairs
                .iter()
                .map(|p| Label::new(p.name.clone(), p.value.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> WalRecord {
        WalRecord {
            tenant_id: "tenant-1".into(),
            series: vec![SeriesDeclaration {
                fingerprint: 42,
                labels: vec![
                    LabelPair {
                        name: "env".into(),
                        value: "prod".into(),
                    },
                    LabelPair {
                        name: "job".into(),
                        value: "api".into(),
                    },
                ],
            }],
            samples: vec![
                RecordSample {
                    fingerprint: 42,
                    timestamp_ms: 1_000,
                    value: 1.5,
                },
                RecordSample {
                    fingerprint: 42,
                    timestamp_ms: 2_000,
                    value: 2.5,
                },
            ],
        }
    }

    #[test]
    fn test_record_round_trip() {
        let record = sample_record();
        let bytes = record.encode_to_vec();
        let decoded = WalRecord::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let snapshot = SeriesSnapshot {
            tenant_id: "tenant-1".into(),
            fingerprint: 42,
            labels: vec![LabelPair {
                name: "job".into(),
                value: "api".into(),
            }],
            chunks: vec![WireChunk {
                first_time_ms: 0,
                last_time_ms: 1_000,
                encoding: 0,
                data: vec![1, 2, 3, 4],
            }],
        };
        let bytes = snapshot.encode_to_vec();
        let decoded = SeriesSnapshot::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_unknown_tag_ignored() {
        // Simulate a newer writer: append an unknown varint field (tag 15)
        // after a valid record. Old readers must skip it.
        let mut bytes = sample_record().encode_to_vec();
        bytes.extend_from_slice(&[0x78, 0x07]); // field 15, wire type 0, value 7
        let decoded = WalRecord::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, sample_record());
    }

    #[test]
    fn test_label_set_conversion_round_trip() {
        let set: LabelSet = [("job".to_string(), "api".to_string())]
            .into_iter()
            .collect();
        let pairs: Vec<LabelPair> = (&set).into();
        let back: LabelSet = pairs.as_slice().into();
        assert_eq!(back, set);
    }
}
