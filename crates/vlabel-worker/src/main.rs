//! Annotation pipeline worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vlabel_gemini::KeyRotator;
use vlabel_hub::HubClient;
use vlabel_store::{CheckpointStore, ErrorJournal};
use vlabel_worker::{
    ingest, GeminiAnnotator, Orchestrator, PipelineContext, RetryController, WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting vlabel-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    let rotator = match KeyRotator::from_env_value(
        &std::env::var("GEMINI_API_KEY").unwrap_or_default(),
    ) {
        Ok(rotator) => Arc::new(rotator),
        Err(e) => {
            error!("GEMINI_API_KEY: {}", e);
            std::process::exit(2);
        }
    };
    info!("Using {} API keys", rotator.len());

    let hub = if config.publish {
        match std::env::var("HF_TOKEN") {
            Ok(token) if !token.is_empty() => Some(Arc::new(HubClient::new(token))),
            _ => {
                error!("HF_TOKEN not set (set VLABEL_PUBLISH=false to run without uploads)");
                std::process::exit(2);
            }
        }
    } else {
        None
    };

    let store = match CheckpointStore::open(&config.cache_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Cannot open checkpoint store: {}", e);
            std::process::exit(2);
        }
    };
    let journal = Arc::new(ErrorJournal::in_dir(&config.cache_dir));

    let assets = match ingest::load_assets(&config.asset_index) {
        Ok(assets) => assets,
        Err(e) => {
            error!("Cannot load asset index: {}", e);
            std::process::exit(2);
        }
    };
    let mut groups = ingest::group_by_series(assets);
    if let Some(max_series) = config.max_series {
        groups.truncate(max_series);
    }
    info!(
        series = groups.len(),
        episodes = groups.iter().map(|(_, eps)| eps.len()).sum::<usize>(),
        "Loaded asset index"
    );

    if let Some(hub) = &hub {
        for repo in [&config.segment_repo, &config.episode_repo, &config.series_repo] {
            if let Err(e) = hub.ensure_dataset(repo).await {
                warn!(repo = %repo, error = %e, "Cannot ensure dataset repo");
            }
        }
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal, finishing in-flight units");
        let _ = shutdown_tx.send(true);
    });

    let service = Arc::new(GeminiAnnotator::new(&config));
    let retry = RetryController::new(
        config.retry.clone(),
        Arc::clone(&rotator),
        Arc::clone(&journal),
    );

    let ctx = Arc::new(PipelineContext {
        config,
        store,
        journal: Arc::clone(&journal),
        retry,
        service,
        hub,
        stats: Arc::new(Default::default()),
        shutdown: shutdown_rx,
    });

    let stats = Orchestrator::new(Arc::clone(&ctx)).run(groups).await;
    info!(%stats, "Run finished");

    if !journal.is_empty() {
        info!(
            entries = journal.len(),
            journal = %journal.path().display(),
            "Some units failed permanently; see the journal for follow-up"
        );
    }

    // Partial failure is the expected steady state of a long labeling run;
    // only startup errors exit non-zero.
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vlabel=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
