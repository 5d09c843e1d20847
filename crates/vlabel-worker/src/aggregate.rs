//! Hierarchical aggregation of checkpoint records.
//!
//! Pure functions: the same children always produce the same derived
//! fields, so records can be rebuilt idempotently from the store.

use chrono::NaiveDate;

use vlabel_models::{
    episode_sort_key, Asset, CheckpointRecord, CheckpointStatus, QueryPayload, SegmentRef,
    WorkUnitKey,
};

/// Collect, deduplicate and sort the non-absent release dates of a set of
/// children. Returns the sorted unique dates and the earliest one.
pub fn derive_release_dates<I>(dates: I) -> (Vec<NaiveDate>, Option<NaiveDate>)
where
    I: IntoIterator<Item = Option<NaiveDate>>,
{
    let mut collected: Vec<NaiveDate> = dates.into_iter().flatten().collect();
    collected.sort();
    collected.dedup();
    let earliest = collected.first().copied();
    (collected, earliest)
}

/// Build a segment record.
pub fn segment_record(
    asset: &Asset,
    index: u32,
    status: CheckpointStatus,
    query: QueryPayload,
) -> CheckpointRecord {
    let key = WorkUnitKey::segment(&asset.series_name, &asset.episode_id, index);
    CheckpointRecord {
        series_name: asset.series_name.clone(),
        episode_id: Some(asset.episode_id.clone()),
        segment_index: Some(index),
        release_date: asset.release_date,
        file_name: key.file_name(),
        status,
        query,
        segments: None,
        episode_order: None,
        release_dates: None,
    }
}

/// Build an episode record from the episode's own generation result plus its
/// segment children, ordered by segment index. Abandoned segments are simply
/// absent from the children and are omitted.
pub fn episode_record(
    asset: &Asset,
    status: CheckpointStatus,
    query: QueryPayload,
    mut segments: Vec<CheckpointRecord>,
) -> CheckpointRecord {
    segments.sort_by_key(|rec| rec.segment_index.unwrap_or(u32::MAX));
    let children = segments
        .iter()
        .map(|rec| SegmentRef {
            segment_index: rec.segment_index.unwrap_or_default(),
            file_name: rec.file_name.clone(),
            status: rec.status,
        })
        .collect();

    let key = WorkUnitKey::episode(&asset.series_name, &asset.episode_id);
    CheckpointRecord {
        series_name: asset.series_name.clone(),
        episode_id: Some(asset.episode_id.clone()),
        segment_index: None,
        release_date: asset.release_date,
        file_name: key.file_name(),
        status,
        query,
        segments: Some(children),
        episode_order: None,
        release_dates: None,
    }
}

/// Build a series record from the series-level generation result plus its
/// episode children.
///
/// Episodes are ordered by numeric episode id; non-numeric ids sort lexically
/// after the numeric ones. The representative release date is the earliest of
/// the children's, absent when none carry one.
pub fn series_record(
    series_name: &str,
    status: CheckpointStatus,
    query: QueryPayload,
    episodes: &[CheckpointRecord],
) -> CheckpointRecord {
    let mut ordered: Vec<&CheckpointRecord> = episodes.iter().collect();
    ordered.sort_by_key(|rec| episode_sort_key(rec.episode_id.as_deref().unwrap_or("")));

    let episode_order = ordered
        .iter()
        .filter_map(|rec| rec.episode_id.clone())
        .collect();
    let (release_dates, earliest) =
        derive_release_dates(ordered.iter().map(|rec| rec.release_date));

    let key = WorkUnitKey::series(series_name);
    CheckpointRecord {
        series_name: series_name.to_string(),
        episode_id: None,
        segment_index: None,
        release_date: earliest,
        file_name: key.file_name(),
        status,
        query,
        segments: None,
        episode_order: Some(episode_order),
        release_dates: Some(release_dates),
    }
}
