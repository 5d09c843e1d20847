//! End-to-end pipeline tests against a real checkpoint store and a scripted
//! generation service.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use vlabel_gemini::{GeminiError, KeyRotator};
use vlabel_models::{
    Asset, CheckpointStatus, QueryPayload, WorkUnitKey, WorkUnitKind, BLOCKED_PLACEHOLDER,
};
use vlabel_store::{CheckpointStore, ErrorJournal};
use vlabel_worker::{
    Orchestrator, PipelineContext, PipelineResult, QueryService, RetryController, RetryPolicy,
    RunStats, WorkerConfig,
};

#[derive(Clone, Copy)]
enum Script {
    Succeed,
    Blocked,
    PermissionDenied,
}

struct ScriptedService {
    calls: AtomicU32,
    script: Script,
}

impl ScriptedService {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            script,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn payload_for(kind: WorkUnitKind) -> QueryPayload {
    let map: BTreeMap<String, Vec<String>> = kind
        .query_fields()
        .iter()
        .map(|f| ((*f).to_string(), vec!["q1".into(), "q2".into(), "q3".into()]))
        .collect();
    QueryPayload(map)
}

#[async_trait]
impl QueryService for ScriptedService {
    async fn annotate(
        &self,
        _api_key: &str,
        _video: &Path,
        kind: WorkUnitKind,
    ) -> PipelineResult<QueryPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Succeed => Ok(payload_for(kind)),
            Script::Blocked => Err(GeminiError::Blocked("SAFETY".into()).into()),
            Script::PermissionDenied => Err(GeminiError::Service {
                status: 403,
                rpc_status: "PERMISSION_DENIED".into(),
                message: "caller lacks permission".into(),
            }
            .into()),
        }
    }
}

struct Harness {
    ctx: Arc<PipelineContext>,
    service: Arc<ScriptedService>,
    journal: Arc<ErrorJournal>,
    _shutdown_tx: tokio::sync::watch::Sender<bool>,
}

fn harness(cache_dir: &Path, script: Script) -> Harness {
    let config = WorkerConfig {
        cache_dir: cache_dir.to_path_buf(),
        publish: false,
        episode_workers: 2,
        retry: RetryPolicy {
            transient_delay: std::time::Duration::from_millis(1),
            throttle_base: std::time::Duration::from_millis(1),
            ..RetryPolicy::default()
        },
        ..WorkerConfig::default()
    };

    let store = Arc::new(CheckpointStore::open(cache_dir).unwrap());
    let journal = Arc::new(ErrorJournal::in_dir(cache_dir));
    let rotator = Arc::new(KeyRotator::new(vec!["k1".into(), "k2".into()]).unwrap());
    let retry = RetryController::new(config.retry.clone(), rotator, Arc::clone(&journal));
    let service = ScriptedService::new(script);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let ctx = Arc::new(PipelineContext {
        config,
        store,
        journal: Arc::clone(&journal),
        retry,
        service: Arc::clone(&service) as Arc<dyn QueryService>,
        hub: None,
        stats: Arc::new(RunStats::default()),
        shutdown: shutdown_rx,
    });

    Harness {
        ctx,
        service,
        journal,
        _shutdown_tx: shutdown_tx,
    }
}

fn asset(series: &str, episode: &str, duration: f64) -> Asset {
    Asset {
        series_name: series.into(),
        episode_id: episode.into(),
        video_path: format!("/videos/{series}_{episode}.mp4").into(),
        release_date: None,
        duration: Some(duration),
    }
}

/// Pre-cut the media files the pipeline would otherwise produce with ffmpeg,
/// so the existence checks short-circuit and no external tool is needed.
fn seed_media(store: &CheckpointStore, series: &str, episodes: &[(&str, usize)]) {
    for (episode, segment_count) in episodes {
        for index in 0..*segment_count {
            let key = WorkUnitKey::segment(series, *episode, index as u32);
            let clip = store.media_path(&key);
            std::fs::create_dir_all(clip.parent().unwrap()).unwrap();
            std::fs::write(&clip, b"clip").unwrap();
        }
    }
    let series_key = WorkUnitKey::series(series);
    let series_video = store.media_path(&series_key);
    std::fs::create_dir_all(series_video.parent().unwrap()).unwrap();
    std::fs::write(&series_video, b"series").unwrap();
    let low_fps =
        series_video.with_file_name(format!("{}_lowfps.mp4", series_key.storage_stem()));
    std::fs::write(&low_fps, b"series-low").unwrap();
}

#[tokio::test]
async fn second_run_is_served_entirely_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    // Two episodes of 125s: three segment windows each, plus the episode
    // unit, plus one series unit = 9 work units.
    let assets = vec![asset("S", "1", 125.0), asset("S", "2", 125.0)];
    let groups = vec![("S".to_string(), assets)];

    let first = harness(dir.path(), Script::Succeed);
    seed_media(&first.ctx.store, "S", &[("1", 3), ("2", 3)]);

    let stats = Orchestrator::new(Arc::clone(&first.ctx))
        .run(groups.clone())
        .await;
    assert_eq!(first.service.calls(), 9);
    assert_eq!(stats.completed, 9);
    assert_eq!(stats.failed, 0);
    assert!(first.journal.is_empty());

    // Same store, fresh everything else: not a single generation call.
    let second = harness(dir.path(), Script::Succeed);
    let stats = Orchestrator::new(Arc::clone(&second.ctx)).run(groups).await;
    assert_eq!(second.service.calls(), 0);
    assert_eq!(stats.cached, 9);
    assert_eq!(stats.completed, 0);
}

#[tokio::test]
async fn series_record_aggregates_its_children() {
    let dir = tempfile::tempdir().unwrap();
    let assets = vec![asset("S", "2", 50.0), asset("S", "10", 50.0)];
    let groups = vec![("S".to_string(), assets)];

    let h = harness(dir.path(), Script::Succeed);
    seed_media(&h.ctx.store, "S", &[("2", 1), ("10", 1)]);
    Orchestrator::new(Arc::clone(&h.ctx)).run(groups).await;

    let series = h
        .ctx
        .store
        .get(&WorkUnitKey::series("S"))
        .unwrap()
        .unwrap();
    // Numeric ordering, not lexical: 2 before 10.
    assert_eq!(
        series.episode_order.as_deref().unwrap(),
        ["2".to_string(), "10".into()]
    );

    let episode = h
        .ctx
        .store
        .get(&WorkUnitKey::episode("S", "2"))
        .unwrap()
        .unwrap();
    let children = episode.segments.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].segment_index, 0);
}

#[tokio::test]
async fn blocked_content_is_recorded_as_done_with_a_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    // 50s episode: a single full-asset window.
    let groups = vec![("S".to_string(), vec![asset("S", "1", 50.0)])];

    let h = harness(dir.path(), Script::Blocked);
    seed_media(&h.ctx.store, "S", &[("1", 1)]);
    let stats = Orchestrator::new(Arc::clone(&h.ctx)).run(groups.clone()).await;

    // Segment, episode and series units all blocked — and all DONE.
    assert_eq!(stats.blocked, 3);
    assert_eq!(stats.failed, 0);
    assert!(h.journal.is_empty());

    let segment = h
        .ctx
        .store
        .get(&WorkUnitKey::segment("S", "1", 0))
        .unwrap()
        .unwrap();
    assert_eq!(segment.status, CheckpointStatus::Blocked);
    assert_eq!(
        segment.query.0["dialogue"],
        vec![BLOCKED_PLACEHOLDER.to_string(); 3]
    );

    // Blocked means done: a rerun must not retry these units.
    let rerun = harness(dir.path(), Script::Blocked);
    let stats = Orchestrator::new(Arc::clone(&rerun.ctx)).run(groups).await;
    assert_eq!(rerun.service.calls(), 0);
    assert_eq!(stats.cached, 3);
}

#[tokio::test]
async fn fatal_failures_journal_every_unit_without_aborting_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let groups = vec![("S".to_string(), vec![asset("S", "1", 50.0)])];

    let h = harness(dir.path(), Script::PermissionDenied);
    seed_media(&h.ctx.store, "S", &[("1", 1)]);
    let stats = Orchestrator::new(Arc::clone(&h.ctx)).run(groups).await;

    // One attempt per unit, no retries, no records, one journal entry each.
    assert_eq!(h.service.calls(), 3);
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.completed, 0);
    assert_eq!(h.journal.len(), 3);

    for kind in [WorkUnitKind::Segment, WorkUnitKind::Episode, WorkUnitKind::Series] {
        assert!(h.ctx.store.list(kind).unwrap().is_empty());
    }
}

#[tokio::test]
async fn abandoned_episodes_do_not_block_the_series_barrier() {
    // Episode "1" has no pre-cut clip and a bogus source, so its segment
    // fails at the cut step; the series step must still run and aggregate
    // whatever children exist.
    let dir = tempfile::tempdir().unwrap();
    let groups = vec![(
        "S".to_string(),
        vec![asset("S", "1", 50.0), asset("S", "2", 50.0)],
    )];

    let h = harness(dir.path(), Script::Succeed);
    seed_media(&h.ctx.store, "S", &[("2", 1)]);
    let stats = Orchestrator::new(Arc::clone(&h.ctx)).run(groups).await;

    // Episode 1's segment cut failed (journaled); its episode unit still ran
    // against the source path the scripted service ignores.
    assert!(stats.failed >= 1);
    assert!(h.journal.len() >= 1);

    let series = h
        .ctx
        .store
        .get(&WorkUnitKey::series("S"))
        .unwrap()
        .unwrap();
    assert_eq!(series.status, CheckpointStatus::Ok);
}
