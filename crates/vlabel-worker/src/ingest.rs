//! Asset index ingestion.
//!
//! The dataset side of ingestion is external; this loader only parses the
//! JSONL index it produces and groups episodes by series, preserving the
//! index's episode order within each series and the first-seen order of the
//! series themselves.

use std::path::Path;

use vlabel_models::Asset;

use crate::error::{PipelineError, PipelineResult};

/// Load all assets from a JSONL index file. Blank lines are skipped; a
/// malformed line is a startup error, not something to paper over mid-run.
pub fn load_assets(path: &Path) -> PipelineResult<Vec<Asset>> {
    let data = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::config(format!("asset index {}: {e}", path.display()))
    })?;

    let mut assets = Vec::new();
    for (lineno, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let asset: Asset = serde_json::from_str(line).map_err(|e| {
            PipelineError::config(format!(
                "asset index {} line {}: {e}",
                path.display(),
                lineno + 1
            ))
        })?;
        assets.push(asset);
    }
    Ok(assets)
}

/// Group assets by series, keeping first-seen series order.
pub fn group_by_series(assets: Vec<Asset>) -> Vec<(String, Vec<Asset>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<Asset>> =
        std::collections::HashMap::new();

    for asset in assets {
        if !groups.contains_key(&asset.series_name) {
            order.push(asset.series_name.clone());
        }
        groups.entry(asset.series_name.clone()).or_default().push(asset);
    }

    order
        .into_iter()
        .map(|series| {
            let episodes = groups.remove(&series).unwrap_or_default();
            (series, episodes)
        })
        .collect()
}
