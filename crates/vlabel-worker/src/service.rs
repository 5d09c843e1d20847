//! Generation-service seam.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use vlabel_gemini::GeminiClient;
use vlabel_models::{QueryPayload, WorkUnitKind};

use crate::config::WorkerConfig;
use crate::error::PipelineResult;

/// One round trip to the generation service for a work unit's video.
///
/// The pipeline only ever talks to the service through this trait, with a
/// per-attempt API key supplied by the retry controller.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn annotate(
        &self,
        api_key: &str,
        video: &Path,
        kind: WorkUnitKind,
    ) -> PipelineResult<QueryPayload>;
}

/// Production annotator: upload the video under the attempt's key, wait for
/// remote processing, then run the level's structured generation call.
pub struct GeminiAnnotator {
    model: String,
    base_url: Option<String>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl GeminiAnnotator {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            model: config.model.clone(),
            base_url: None,
            poll_interval: config.upload_poll_interval,
            poll_timeout: config.upload_poll_timeout,
        }
    }

    /// Point at a non-default endpoint (tests, regional deployments).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

#[async_trait]
impl QueryService for GeminiAnnotator {
    async fn annotate(
        &self,
        api_key: &str,
        video: &Path,
        kind: WorkUnitKind,
    ) -> PipelineResult<QueryPayload> {
        let mut client = GeminiClient::new(api_key)
            .with_model(self.model.as_str())
            .with_polling(self.poll_interval, self.poll_timeout);
        if let Some(base_url) = &self.base_url {
            client = client.with_base_url(base_url.as_str());
        }

        let file_uri = client.upload_video(video).await?;
        Ok(client.generate(&file_uri, kind).await?)
    }
}
