//! Work-unit identity.
//!
//! A work unit is the atomic thing submitted to the generation service: one
//! segment window, one whole episode, or one whole series. Its key is the
//! cache identity and must be stable across reruns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Aggregation level of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkUnitKind {
    Segment,
    Episode,
    Series,
}

impl WorkUnitKind {
    /// File-stem prefix for records of this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            WorkUnitKind::Segment => "segment",
            WorkUnitKind::Episode => "episode",
            WorkUnitKind::Series => "series",
        }
    }

    /// The named string-array fields the generation service must populate
    /// for this level.
    pub fn query_fields(&self) -> &'static [&'static str] {
        match self {
            WorkUnitKind::Segment => &[
                "visual_saliency",
                "character_emotion",
                "action_behavior",
                "dialogue",
                "symbolic_scene",
            ],
            WorkUnitKind::Episode => &[
                "main_plot",
                "turning_point",
                "relationship_change",
                "episode_mood",
                "notable_scene",
            ],
            WorkUnitKind::Series => &[
                "narrative_arc",
                "character_appearance",
                "character_development",
                "theme",
                "visual_emotional_impression",
            ],
        }
    }
}

impl fmt::Display for WorkUnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Identity of one work unit: `(kind, series, episode, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnitKey {
    pub kind: WorkUnitKind,
    pub series: String,
    pub episode: Option<String>,
    pub index: Option<u32>,
}

impl WorkUnitKey {
    pub fn segment(series: impl Into<String>, episode: impl Into<String>, index: u32) -> Self {
        Self {
            kind: WorkUnitKind::Segment,
            series: series.into(),
            episode: Some(episode.into()),
            index: Some(index),
        }
    }

    pub fn episode(series: impl Into<String>, episode: impl Into<String>) -> Self {
        Self {
            kind: WorkUnitKind::Episode,
            series: series.into(),
            episode: Some(episode.into()),
            index: None,
        }
    }

    pub fn series(series: impl Into<String>) -> Self {
        Self {
            kind: WorkUnitKind::Series,
            series: series.into(),
            episode: None,
            index: None,
        }
    }

    /// Deterministic file stem for this unit's persisted record and clip.
    pub fn storage_stem(&self) -> String {
        let safe = sanitize_name(&self.series);
        match self.kind {
            WorkUnitKind::Segment => format!(
                "segment_{}_{}_seg{}",
                safe,
                self.episode.as_deref().unwrap_or_default(),
                self.index.unwrap_or_default()
            ),
            WorkUnitKind::Episode => format!(
                "episode_{}_{}",
                safe,
                self.episode.as_deref().unwrap_or_default()
            ),
            WorkUnitKind::Series => format!("series_{safe}"),
        }
    }

    /// Logical dataset path for this unit's derived video file.
    pub fn file_name(&self) -> String {
        let safe = sanitize_name(&self.series);
        match self.kind {
            WorkUnitKind::Segment | WorkUnitKind::Episode => {
                format!("videos/{}/{}.mp4", safe, self.storage_stem())
            }
            WorkUnitKind::Series => format!("videos/{}.mp4", self.storage_stem()),
        }
    }

    /// Context string for journal entries and logs.
    pub fn context(&self) -> String {
        match self.kind {
            WorkUnitKind::Segment => format!(
                "segment {} ep {} seg {}",
                self.series,
                self.episode.as_deref().unwrap_or_default(),
                self.index.unwrap_or_default()
            ),
            WorkUnitKind::Episode => format!(
                "episode {} ep {}",
                self.series,
                self.episode.as_deref().unwrap_or_default()
            ),
            WorkUnitKind::Series => format!("series {}", self.series),
        }
    }
}

impl fmt::Display for WorkUnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_stem())
    }
}

/// Map a series name onto a filesystem- and URL-safe token.
///
/// Spaces and path separators become underscores; everything else is kept
/// so non-ASCII titles stay recognizable.
pub fn sanitize_name(name: &str) -> String {
    name.replace([' ', '/'], "_")
}

/// Sort key for episode identifiers: numeric ids order numerically,
/// non-numeric ids sort lexically after all numeric ones.
pub fn episode_sort_key(episode_id: &str) -> (u8, u64, String) {
    match episode_id.trim().parse::<u64>() {
        Ok(n) => (0, n, String::new()),
        Err(_) => (1, 0, episode_id.to_string()),
    }
}
