//! Hub REST client.

use std::path::Path;

use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{HubError, HubResult};

const DEFAULT_BASE_URL: &str = "https://huggingface.co";

/// Dataset-repo client with bearer-token auth.
#[derive(Clone)]
pub struct HubClient {
    http: Client,
    token: String,
    base_url: String,
}

#[derive(Serialize)]
struct CreateRepoRequest<'a> {
    #[serde(rename = "type")]
    repo_type: &'a str,
    name: &'a str,
    private: bool,
}

impl HubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the host endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a dataset repo if it does not already exist.
    pub async fn ensure_dataset(&self, repo_id: &str) -> HubResult<()> {
        let url = format!("{}/api/repos/create", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&CreateRepoRequest {
                repo_type: "dataset",
                name: repo_id,
                private: false,
            })
            .send()
            .await?;

        let status = response.status();
        // 409: the repo already exists, which is the steady state on reruns.
        if status.is_success() || status.as_u16() == 409 {
            debug!(repo = repo_id, "Dataset repo ready");
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(HubError::request_failed(status.as_u16(), message))
    }

    /// Upload one local file to a logical path in the repo.
    ///
    /// Re-uploading the same content to the same path is a no-op commit on
    /// the host side, so this is safe to repeat.
    pub async fn upload_file(
        &self,
        repo_id: &str,
        local: &Path,
        path_in_repo: &str,
    ) -> HubResult<()> {
        let bytes = tokio::fs::read(local).await?;
        let summary = format!("Upload {path_in_repo}");
        self.commit(repo_id, &summary, &[(path_in_repo, bytes.as_slice())])
            .await?;
        info!(repo = repo_id, path = path_in_repo, "Uploaded file");
        Ok(())
    }

    /// Replace a manifest file with new content.
    pub async fn replace_manifest(
        &self,
        repo_id: &str,
        path_in_repo: &str,
        content: &str,
    ) -> HubResult<()> {
        let summary = format!("Update {path_in_repo}");
        self.commit(repo_id, &summary, &[(path_in_repo, content.as_bytes())])
            .await?;
        info!(repo = repo_id, path = path_in_repo, "Replaced manifest");
        Ok(())
    }

    /// Single-commit upload via the NDJSON commit endpoint.
    async fn commit(
        &self,
        repo_id: &str,
        summary: &str,
        files: &[(&str, &[u8])],
    ) -> HubResult<()> {
        let mut body = String::new();
        body.push_str(
            &serde_json::json!({
                "key": "header",
                "value": { "summary": summary }
            })
            .to_string(),
        );
        body.push('\n');
        for (path, bytes) in files.iter().copied() {
            body.push_str(
                &serde_json::json!({
                    "key": "file",
                    "value": {
                        "path": path,
                        "content": base64::engine::general_purpose::STANDARD.encode(bytes),
                        "encoding": "base64"
                    }
                })
                .to_string(),
            );
            body.push('\n');
        }

        let url = format!("{}/api/datasets/{}/commit/main", self.base_url, repo_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("content-type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HubError::request_failed(status.as_u16(), message));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn ensure_dataset_tolerates_existing_repo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/repos/create"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let client = HubClient::new("token").with_base_url(server.uri());
        client.ensure_dataset("org/queries").await.unwrap();
    }

    #[tokio::test]
    async fn ensure_dataset_surfaces_auth_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/repos/create"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let client = HubClient::new("token").with_base_url(server.uri());
        let err = client.ensure_dataset("org/queries").await.unwrap_err();
        assert!(matches!(err, HubError::RequestFailed { status: 401, .. }));
    }

    #[tokio::test]
    async fn upload_commits_base64_content_to_the_repo() {
        let server = MockServer::start().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"clip-bytes");
        Mock::given(method("POST"))
            .and(path("/api/datasets/org/queries/commit/main"))
            .and(header("content-type", "application/x-ndjson"))
            .and(body_string_contains("videos/S/segment_S_1_seg0.mp4"))
            .and(body_string_contains(&encoded))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("seg0.mp4");
        std::fs::write(&local, b"clip-bytes").unwrap();

        let client = HubClient::new("token").with_base_url(server.uri());
        client
            .upload_file("org/queries", &local, "videos/S/segment_S_1_seg0.mp4")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn replace_manifest_sends_one_commit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/datasets/org/queries/commit/main"))
            .and(body_string_contains("metadata.jsonl"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HubClient::new("token").with_base_url(server.uri());
        client
            .replace_manifest("org/queries", "metadata.jsonl", "{\"a\":1}\n")
            .await
            .unwrap();
    }
}
