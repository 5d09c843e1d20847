//! Gemini API client.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use vlabel_models::{QueryPayload, WorkUnitKind};

use crate::error::{GeminiError, GeminiResult};
use crate::schema;
use crate::types::{
    Content, FileData, FileListResponse, FileMeta, GenerateRequest, GenerateResponse,
    GenerationConfig, Part, UploadResponse, VideoMetadata,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Candidate finish reasons that mean the service refused the content.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "IMAGE_SAFETY"];

/// Client bound to a single API key.
///
/// The orchestrator constructs one per attempt with a freshly rotated key,
/// so a throttled key is never reused on the very next attempt.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(300),
        }
    }

    /// Override the service endpoint (tests, regional endpoints).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    /// Upload a video and wait until the service has processed it.
    ///
    /// Returns the file URI to reference from a generation call. File names
    /// with non-ASCII characters are first copied to an ASCII-named temp
    /// file; the upload endpoint rejects them otherwise.
    pub async fn upload_video(&self, path: &Path) -> GeminiResult<String> {
        let (upload_path, _ascii_guard) = ascii_upload_path(path)?;

        debug!(path = %upload_path.display(), "Uploading video");
        let bytes = tokio::fs::read(&upload_path)
            .await
            .map_err(|e| GeminiError::UploadFailed(format!("read {}: {e}", upload_path.display())))?;

        let display_name = upload_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let metadata = serde_json::json!({ "file": { "display_name": display_name } });

        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .map_err(|e| GeminiError::UploadFailed(e.to_string()))?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .mime_str("video/mp4")
                    .map_err(|e| GeminiError::UploadFailed(e.to_string()))?,
            );

        let url = format!(
            "{}/upload/v1beta/files?key={}&uploadType=multipart",
            self.base_url, self.api_key
        );
        let response = self.http.post(&url).multipart(form).send().await?;
        let response = check_status(response).await?;
        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::invalid_response(format!("upload response: {e}")))?;

        self.await_active(uploaded.file).await
    }

    /// Poll the file until it leaves PROCESSING, bounded by the poll timeout.
    async fn await_active(&self, mut file: FileMeta) -> GeminiResult<String> {
        let deadline = tokio::time::Instant::now() + self.poll_timeout;

        while file.is_processing() {
            if tokio::time::Instant::now() >= deadline {
                return Err(GeminiError::FileProcessing(format!(
                    "{} still processing after {:?}",
                    file.name, self.poll_timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;

            let url = format!("{}/v1beta/{}?key={}", self.base_url, file.name, self.api_key);
            let response = self.http.get(&url).send().await?;
            let response = check_status(response).await?;
            file = response
                .json()
                .await
                .map_err(|e| GeminiError::invalid_response(format!("file status: {e}")))?;
        }

        if file.is_failed() {
            return Err(GeminiError::FileProcessing(format!(
                "{} failed remote processing",
                file.name
            )));
        }

        file.uri
            .clone()
            .ok_or_else(|| GeminiError::invalid_response(format!("{}: no uri", file.name)))
    }

    /// Run one structured generation call for a processed file.
    pub async fn generate(&self, file_uri: &str, kind: WorkUnitKind) -> GeminiResult<QueryPayload> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        file_data: Some(FileData {
                            file_uri: file_uri.to_string(),
                        }),
                        video_metadata: Some(VideoMetadata {
                            fps: schema::video_fps(kind),
                        }),
                        ..Default::default()
                    },
                    Part {
                        text: Some(schema::instruction(kind).to_string()),
                        ..Default::default()
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema::response_schema(kind),
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let response = self.http.post(&url).json(&request).send().await?;
        let response = check_status(response).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::invalid_response(format!("generate response: {e}")))?;

        self.extract_payload(body, kind)
    }

    fn extract_payload(
        &self,
        body: GenerateResponse,
        kind: WorkUnitKind,
    ) -> GeminiResult<QueryPayload> {
        if let Some(feedback) = &body.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                info!(reason = %reason, "Prompt blocked by the service");
                return Err(GeminiError::Blocked(reason.clone()));
            }
        }

        let candidate = body
            .candidates
            .first()
            .ok_or_else(|| GeminiError::invalid_response("no candidates"))?;

        if let Some(reason) = &candidate.finish_reason {
            if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) {
                info!(reason = %reason, "Candidate blocked by the service");
                return Err(GeminiError::Blocked(reason.clone()));
            }
        }

        let text = candidate
            .content
            .as_ref()
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .ok_or_else(|| GeminiError::invalid_response("no content in candidate"))?;

        let payload: QueryPayload = serde_json::from_str(strip_fences(text))
            .map_err(|e| GeminiError::invalid_response(format!("payload JSON: {e}")))?;
        payload
            .validate(kind)
            .map_err(|e| GeminiError::invalid_response(e.to_string()))?;
        Ok(payload)
    }

    /// List every file uploaded under this key.
    pub async fn list_files(&self) -> GeminiResult<Vec<FileMeta>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/v1beta/files?key={}&pageSize=100",
                self.base_url, self.api_key
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={token}"));
            }

            let response = self.http.get(&url).send().await?;
            let response = check_status(response).await?;
            let page: FileListResponse = response
                .json()
                .await
                .map_err(|e| GeminiError::invalid_response(format!("file list: {e}")))?;

            files.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }

    /// Delete one uploaded file.
    pub async fn delete_file(&self, name: &str) -> GeminiResult<()> {
        let url = format!("{}/v1beta/{}?key={}", self.base_url, name, self.api_key);
        let response = self.http.delete(&url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Decode a non-2xx response into a classified service error.
async fn check_status(response: reqwest::Response) -> GeminiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GeminiError::from_response(status.as_u16(), &body))
}

/// Strip the markdown code fences some responses wrap their JSON in.
fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// If the file name is not pure ASCII, copy to an ASCII-named temp file and
/// return that path plus a guard keeping the copy alive for the upload.
fn ascii_upload_path(path: &Path) -> GeminiResult<(std::path::PathBuf, Option<tempfile::NamedTempFile>)> {
    let ascii = path
        .file_name()
        .map(|n| n.to_string_lossy().is_ascii())
        .unwrap_or(false);
    if ascii {
        return Ok((path.to_path_buf(), None));
    }

    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let tmp = tempfile::Builder::new()
        .prefix("upload_")
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| GeminiError::UploadFailed(e.to_string()))?;
    std::fs::copy(path, tmp.path())
        .map_err(|e| GeminiError::UploadFailed(format!("ascii copy: {e}")))?;
    warn!(
        original = %path.display(),
        copy = %tmp.path().display(),
        "Non-ASCII file name, uploading a temp copy"
    );
    Ok((tmp.path().to_path_buf(), Some(tmp)))
}
