//! Delete every file uploaded to the generation service, across all keys.
//!
//! The service keeps uploaded videos for a while and each key has a storage
//! quota; run this between campaigns to reclaim it.

use futures::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vlabel_gemini::{GeminiClient, KeyRotator};

/// Concurrent deletions per key.
const DELETE_PARALLELISM: usize = 8;

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::from_default_env().add_directive("vlabel=info".parse().unwrap()))
        .init();

    let rotator = match KeyRotator::from_env_value(
        &std::env::var("GEMINI_API_KEY").unwrap_or_default(),
    ) {
        Ok(rotator) => rotator,
        Err(e) => {
            error!("GEMINI_API_KEY: {}", e);
            std::process::exit(2);
        }
    };

    for (key_index, api_key) in rotator.keys().iter().enumerate() {
        let client = GeminiClient::new(api_key.clone());

        let files = match client.list_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!(key = key_index, error = %e, "Cannot list files for key");
                continue;
            }
        };

        if files.is_empty() {
            info!(key = key_index, "No files to delete");
            continue;
        }
        info!(key = key_index, count = files.len(), "Deleting uploaded files");

        futures::stream::iter(files)
            .for_each_concurrent(DELETE_PARALLELISM, |file| {
                let client = &client;
                async move {
                    match client.delete_file(&file.name).await {
                        Ok(()) => info!(file = %file.name, "Deleted"),
                        Err(e) => warn!(file = %file.name, error = %e, "Delete failed"),
                    }
                }
            })
            .await;
    }

    info!("Remote purge complete");
}
