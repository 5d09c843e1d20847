//! Per-unit pipelines: segment, whole-episode and series work units.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use vlabel_hub::HubClient;
use vlabel_models::{Asset, CheckpointRecord, CheckpointStatus, QueryPayload, WorkUnitKey};
use vlabel_store::{CheckpointStore, ErrorJournal};

use crate::aggregate;
use crate::config::WorkerConfig;
use crate::planner::{plan_windows, Window};
use crate::retry::{Attempted, RetryController};
use crate::service::QueryService;
use crate::stats::RunStats;

/// Everything a worker task needs, shared across the run.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub store: Arc<CheckpointStore>,
    pub journal: Arc<ErrorJournal>,
    pub retry: RetryController,
    pub service: Arc<dyn QueryService>,
    pub hub: Option<Arc<HubClient>>,
    pub stats: Arc<RunStats>,
    pub shutdown: watch::Receiver<bool>,
}

impl PipelineContext {
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Full per-episode pipeline: every segment window in index order, then the
/// whole-episode unit. Runs sequentially within one worker task.
pub async fn process_episode(ctx: &PipelineContext, asset: &Asset) {
    let duration = match asset.duration {
        Some(duration) => duration,
        None => match vlabel_media::probe_duration(&asset.video_path).await {
            Ok(duration) => duration,
            Err(e) => {
                error!(asset = %asset.label(), error = %e, "Cannot probe duration");
                ctx.journal
                    .record(&format!("episode {}", asset.label()), &e.to_string())
                    .await;
                ctx.stats.record_failed();
                return;
            }
        },
    };

    let windows = plan_windows(duration, ctx.config.window_length, ctx.config.window_overlap);
    debug!(asset = %asset.label(), windows = windows.len(), "Planned segment windows");

    for (index, window) in windows.iter().enumerate() {
        if ctx.is_shutdown() {
            info!(asset = %asset.label(), "Shutdown observed, stopping episode task");
            return;
        }
        process_segment(ctx, asset, index as u32, *window).await;
    }

    if ctx.is_shutdown() {
        return;
    }
    process_whole_episode(ctx, asset, windows.len() as u32).await;
}

/// One segment work unit.
async fn process_segment(ctx: &PipelineContext, asset: &Asset, index: u32, window: Window) {
    let key = WorkUnitKey::segment(&asset.series_name, &asset.episode_id, index);
    if ctx.store.exists(&key) {
        debug!(key = %key, "Checkpoint hit, skipping");
        ctx.stats.record_cached();
        return;
    }

    let clip = ctx.store.media_path(&key);
    if let Err(e) =
        vlabel_media::cut_window(&asset.video_path, window.start, window.end, &clip).await
    {
        error!(key = %key, error = %e, "Cannot cut window clip");
        ctx.journal.record(&key.context(), &e.to_string()).await;
        ctx.stats.record_failed();
        return;
    }

    let record = match annotate_with_retry(ctx, &key, &clip).await {
        Attempted::Completed(query) => {
            aggregate::segment_record(asset, index, CheckpointStatus::Ok, query)
        }
        Attempted::Blocked => aggregate::segment_record(
            asset,
            index,
            CheckpointStatus::Blocked,
            QueryPayload::blocked_placeholder(key.kind),
        ),
        Attempted::Abandoned => {
            ctx.stats.record_failed();
            return;
        }
    };

    persist_and_upload(ctx, &key, record, &clip, &ctx.config.segment_repo).await;
}

/// The whole-episode work unit, aggregating its cached segment children.
async fn process_whole_episode(ctx: &PipelineContext, asset: &Asset, planned_segments: u32) {
    let key = WorkUnitKey::episode(&asset.series_name, &asset.episode_id);
    if ctx.store.exists(&key) {
        debug!(key = %key, "Checkpoint hit, skipping");
        ctx.stats.record_cached();
        return;
    }

    let mut segments = Vec::new();
    for index in 0..planned_segments {
        let segment_key = WorkUnitKey::segment(&asset.series_name, &asset.episode_id, index);
        match ctx.store.get(&segment_key) {
            Ok(Some(record)) => segments.push(record),
            // Abandoned segments are simply absent from the aggregate.
            Ok(None) => {}
            Err(e) => {
                warn!(key = %segment_key, error = %e, "Unreadable segment record, omitting");
            }
        }
    }

    let record = match annotate_with_retry(ctx, &key, &asset.video_path).await {
        Attempted::Completed(query) => {
            aggregate::episode_record(asset, CheckpointStatus::Ok, query, segments)
        }
        Attempted::Blocked => aggregate::episode_record(
            asset,
            CheckpointStatus::Blocked,
            QueryPayload::blocked_placeholder(key.kind),
            segments,
        ),
        Attempted::Abandoned => {
            ctx.stats.record_failed();
            return;
        }
    };

    persist_and_upload(ctx, &key, record, &asset.video_path, &ctx.config.episode_repo).await;
}

/// The series work unit. Runs only after the per-series barrier, so every
/// episode task has finished (or been abandoned) by the time this reads the
/// children from the store.
pub async fn process_series(ctx: &PipelineContext, series_name: &str, assets: &[Asset]) {
    let key = WorkUnitKey::series(series_name);
    if ctx.store.exists(&key) {
        debug!(key = %key, "Checkpoint hit, skipping");
        ctx.stats.record_cached();
        return;
    }
    if ctx.is_shutdown() {
        return;
    }

    let mut episodes = Vec::new();
    for asset in assets {
        let episode_key = WorkUnitKey::episode(series_name, &asset.episode_id);
        match ctx.store.get(&episode_key) {
            Ok(Some(record)) => episodes.push(record),
            Ok(None) => {}
            Err(e) => {
                warn!(key = %episode_key, error = %e, "Unreadable episode record, omitting");
            }
        }
    }

    let series_video = ctx.store.media_path(&key);
    let sources: Vec<&Path> = assets.iter().map(|a| a.video_path.as_path()).collect();
    if let Err(e) = vlabel_media::concat_files(&sources, &series_video).await {
        error!(key = %key, error = %e, "Cannot concatenate series video");
        ctx.journal.record(&key.context(), &e.to_string()).await;
        ctx.stats.record_failed();
        return;
    }

    let low_fps = series_video.with_file_name(format!("{}_lowfps.mp4", key.storage_stem()));
    if let Err(e) = vlabel_media::downsample_fps(&series_video, &low_fps).await {
        error!(key = %key, error = %e, "Cannot downsample series video");
        ctx.journal.record(&key.context(), &e.to_string()).await;
        ctx.stats.record_failed();
        return;
    }

    let record = match annotate_with_retry(ctx, &key, &low_fps).await {
        Attempted::Completed(query) => {
            aggregate::series_record(series_name, CheckpointStatus::Ok, query, &episodes)
        }
        Attempted::Blocked => aggregate::series_record(
            series_name,
            CheckpointStatus::Blocked,
            QueryPayload::blocked_placeholder(key.kind),
            &episodes,
        ),
        Attempted::Abandoned => {
            ctx.stats.record_failed();
            return;
        }
    };

    persist_and_upload(ctx, &key, record, &series_video, &ctx.config.series_repo).await;
}

/// Run the generation call for a unit under the retry controller, drawing a
/// fresh credential per attempt.
async fn annotate_with_retry(
    ctx: &PipelineContext,
    key: &WorkUnitKey,
    video: &Path,
) -> Attempted<QueryPayload> {
    let service = Arc::clone(&ctx.service);
    let kind = key.kind;
    let video = video.to_path_buf();

    ctx.retry
        .execute(&key.context(), move |api_key| {
            let service = Arc::clone(&service);
            let video = video.clone();
            async move { service.annotate(&api_key, &video, kind).await }
        })
        .await
}

/// Publish the record write-once, then upload the derived media file.
///
/// Losing the same-key race is not an error: the persisted record wins and
/// this result is discarded. Upload failures are non-critical — the record
/// stands and the next manifest publication repeats the upload path.
async fn persist_and_upload(
    ctx: &PipelineContext,
    key: &WorkUnitKey,
    record: CheckpointRecord,
    media: &Path,
    repo: &str,
) {
    match ctx.store.put(key, &record) {
        Ok(()) => match record.status {
            CheckpointStatus::Ok => ctx.stats.record_completed(),
            CheckpointStatus::Blocked => ctx.stats.record_blocked(),
        },
        Err(e) if e.is_already_exists() => {
            debug!(key = %key, "Lost same-key write race, keeping the existing record");
            ctx.stats.record_cached();
            return;
        }
        Err(e) => {
            error!(key = %key, error = %e, "Cannot persist record");
            ctx.journal.record(&key.context(), &e.to_string()).await;
            ctx.stats.record_failed();
            return;
        }
    }

    info!(key = %key, status = ?record.status, "Work unit done");

    if let Some(hub) = &ctx.hub {
        if let Err(e) = hub.upload_file(repo, media, &record.file_name).await {
            warn!(
                key = %key,
                repo = repo,
                error = %e,
                "Media upload failed (non-critical), will be retried on the next run"
            );
        }
    }
}
