//! Manifest publication.

use tracing::{debug, info};

use vlabel_hub::HubClient;
use vlabel_models::WorkUnitKind;

use crate::error::PipelineResult;
use crate::process::PipelineContext;

/// Manifest file name inside each dataset repo.
pub const MANIFEST_NAME: &str = "metadata.jsonl";

/// Republish the manifests of all three levels from the store.
pub async fn publish_all(ctx: &PipelineContext) -> PipelineResult<()> {
    let Some(hub) = &ctx.hub else {
        debug!("Publishing disabled, skipping manifests");
        return Ok(());
    };

    for (kind, repo) in [
        (WorkUnitKind::Segment, ctx.config.segment_repo.as_str()),
        (WorkUnitKind::Episode, ctx.config.episode_repo.as_str()),
        (WorkUnitKind::Series, ctx.config.series_repo.as_str()),
    ] {
        publish_level(ctx, hub, kind, repo).await?;
    }
    Ok(())
}

/// Render one level's records as line-delimited JSON and replace the remote
/// manifest. Records missing their derived file name are backfilled in the
/// store first, so the manifest and the persisted state agree.
pub async fn publish_level(
    ctx: &PipelineContext,
    hub: &HubClient,
    kind: WorkUnitKind,
    repo: &str,
) -> PipelineResult<()> {
    let mut records = ctx.store.list(kind)?;
    if records.is_empty() {
        debug!(kind = %kind, "No records yet, skipping manifest");
        return Ok(());
    }

    for record in &mut records {
        if record.file_name.is_empty() {
            let key = record.key();
            ctx.store.backfill(&key, |rec| {
                rec.ensure_file_name();
            })?;
            record.ensure_file_name();
        }
    }

    let mut manifest = String::new();
    for record in &records {
        manifest.push_str(&serde_json::to_string(record)?);
        manifest.push('\n');
    }

    hub.replace_manifest(repo, MANIFEST_NAME, &manifest).await?;
    info!(kind = %kind, rows = records.len(), repo = repo, "Manifest updated");
    Ok(())
}
