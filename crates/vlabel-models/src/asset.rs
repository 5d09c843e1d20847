//! Source video assets.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One source video as loaded from the dataset index.
///
/// Assets are read-only to the pipeline: ingestion produces them once at
/// startup and nothing mutates them afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Series the episode belongs to (display name, unsanitized).
    pub series_name: String,
    /// Episode identifier within the series. Usually numeric, but not always.
    pub episode_id: String,
    /// Local path to the source video file.
    pub video_path: PathBuf,
    /// Release date, when the dataset knows it.
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    /// Duration in seconds, when the dataset index carries it.
    /// Absent durations are probed from the file at run time.
    #[serde(default)]
    pub duration: Option<f64>,
}

impl Asset {
    /// Short human-readable label used in logs.
    pub fn label(&self) -> String {
        format!("{} ep {}", self.series_name, self.episode_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_index_row_without_optional_fields() {
        let row = r#"{"series_name":"High Card","episode_id":"3","video_path":"/data/hc_3.mp4"}"#;
        let asset: Asset = serde_json::from_str(row).unwrap();
        assert_eq!(asset.episode_id, "3");
        assert!(asset.release_date.is_none());
        assert!(asset.duration.is_none());
    }

    #[test]
    fn deserializes_release_date() {
        let row = r#"{"series_name":"High Card","episode_id":"3","video_path":"/data/hc_3.mp4","release_date":"2024-01-08"}"#;
        let asset: Asset = serde_json::from_str(row).unwrap();
        assert_eq!(
            asset.release_date,
            Some(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap())
        );
    }
}
