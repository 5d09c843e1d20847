//! Checkpoint records.
//!
//! A checkpoint record is the persisted, write-once result of a work unit.
//! The presence of a record — whatever its status — means the unit is DONE
//! and is never recomputed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::payload::QueryPayload;
use crate::unit::{WorkUnitKey, WorkUnitKind};

/// Terminal status of a completed work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    /// The generation service returned a valid payload.
    #[default]
    Ok,
    /// The service refused the content; the payload is the fixed placeholder.
    Blocked,
}

/// Reference to a segment child embedded in an episode record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRef {
    pub segment_index: u32,
    pub file_name: String,
    pub status: CheckpointStatus,
}

/// Persisted result for one work unit.
///
/// Segment and episode records carry `episode_id` (and segments a
/// `segment_index`); series records carry neither. Episode records embed
/// their ordered segment children, series records their ordered episode ids
/// and the deduplicated release dates — all derived by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub series_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<u32>,

    #[serde(default)]
    pub release_date: Option<NaiveDate>,

    /// Logical dataset path of the derived video file. Denormalized; may be
    /// backfilled on records written before the path rule existed.
    #[serde(default)]
    pub file_name: String,

    #[serde(default)]
    pub status: CheckpointStatus,

    pub query: QueryPayload,

    /// Episode records only: segment children ordered by index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentRef>>,

    /// Series records only: episode ids in canonical order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_order: Option<Vec<String>>,

    /// Series records only: sorted unique release dates of the children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_dates: Option<Vec<NaiveDate>>,
}

impl CheckpointRecord {
    /// The work-unit key this record belongs to.
    pub fn key(&self) -> WorkUnitKey {
        match (self.episode_id.as_ref(), self.segment_index) {
            (Some(ep), Some(idx)) => WorkUnitKey::segment(&self.series_name, ep, idx),
            (Some(ep), None) => WorkUnitKey::episode(&self.series_name, ep),
            (None, _) => WorkUnitKey::series(&self.series_name),
        }
    }

    pub fn kind(&self) -> WorkUnitKind {
        self.key().kind
    }

    /// Backfill the derived file name if a legacy record is missing it.
    /// Returns true when the record was changed.
    pub fn ensure_file_name(&mut self) -> bool {
        if self.file_name.is_empty() {
            self.file_name = self.key().file_name();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_record() -> CheckpointRecord {
        CheckpointRecord {
            series_name: "High Card".into(),
            episode_id: Some("14".into()),
            segment_index: Some(2),
            release_date: None,
            file_name: String::new(),
            status: CheckpointStatus::Ok,
            query: QueryPayload::default(),
            segments: None,
            episode_order: None,
            release_dates: None,
        }
    }

    #[test]
    fn key_round_trips_through_record_fields() {
        let rec = segment_record();
        assert_eq!(rec.key(), WorkUnitKey::segment("High Card", "14", 2));
        assert_eq!(rec.kind(), WorkUnitKind::Segment);
    }

    #[test]
    fn ensure_file_name_backfills_only_when_missing() {
        let mut rec = segment_record();
        assert!(rec.ensure_file_name());
        assert_eq!(rec.file_name, "videos/High_Card/segment_High_Card_14_seg2.mp4");
        assert!(!rec.ensure_file_name());
    }

    #[test]
    fn status_defaults_to_ok_on_legacy_records() {
        let legacy = r#"{"series_name":"High Card","episode_id":"1","query":{}}"#;
        let rec: CheckpointRecord = serde_json::from_str(legacy).unwrap();
        assert_eq!(rec.status, CheckpointStatus::Ok);
        assert_eq!(rec.kind(), WorkUnitKind::Episode);
    }
}
