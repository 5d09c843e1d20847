//! Clip cutting, concatenation and downsampling.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Cut a time window out of a source video, re-encoding to H.264/AAC.
///
/// Skips the cut when the output already exists and is non-empty; the output
/// path is deterministic in the inputs, so an existing file is authoritative.
pub async fn cut_window(
    source: &Path,
    start_secs: f64,
    end_secs: f64,
    output: &Path,
) -> MediaResult<()> {
    if output_is_present(output) {
        debug!(output = %output.display(), "Window clip already cut, skipping");
        return Ok(());
    }

    if !source.exists() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!(
        source = %source.display(),
        start = start_secs,
        end = end_secs,
        output = %output.display(),
        "Cutting window clip"
    );

    let result = Command::new("ffmpeg")
        .args([
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-ss",
            &format!("{start_secs:.3}"),
            "-i",
        ])
        .arg(source)
        .args([
            "-t",
            &format!("{:.3}", end_secs - start_secs),
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-c:a",
            "aac",
            "-movflags",
            "+faststart",
        ])
        .arg(output)
        .output()
        .await
        .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to run ffmpeg: {e}"), None))?;

    check_ffmpeg_result(&result, output, "window cut")
}

/// Concatenate source files in order into one output, stream-copying.
///
/// Writes the concat demuxer list next to the output so reruns can inspect
/// what was joined.
pub async fn concat_files(sources: &[&Path], output: &Path) -> MediaResult<()> {
    if output_is_present(output) {
        debug!(output = %output.display(), "Concatenated file already exists, skipping");
        return Ok(());
    }

    if sources.is_empty() {
        return Err(MediaError::InvalidVideo("nothing to concatenate".into()));
    }
    for source in sources {
        if !source.exists() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }
    }
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let list_path = output.with_extension("txt");
    let mut list = String::new();
    for source in sources {
        // Concat demuxer syntax; single quotes in paths are escaped its way.
        let canonical = source
            .canonicalize()
            .unwrap_or_else(|_| source.to_path_buf());
        let escaped = canonical.display().to_string().replace('\'', "'\\''");
        list.push_str(&format!("file '{escaped}'\n"));
    }
    std::fs::write(&list_path, list)?;

    info!(
        inputs = sources.len(),
        output = %output.display(),
        "Concatenating episode files"
    );

    let result = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
        .arg(&list_path)
        .args(["-c", "copy"])
        .arg(output)
        .output()
        .await
        .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to run ffmpeg: {e}"), None))?;

    check_ffmpeg_result(&result, output, "concat")
}

/// Re-encode a video at 0.2 fps with audio stripped.
///
/// Used to shrink a whole-series video below the generation service's upload
/// ceiling before submitting it.
pub async fn downsample_fps(source: &Path, output: &Path) -> MediaResult<()> {
    if output_is_present(output) {
        debug!(output = %output.display(), "Downsampled file already exists, skipping");
        return Ok(());
    }

    if !source.exists() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    info!(
        source = %source.display(),
        output = %output.display(),
        "Downsampling to 0.2 fps"
    );

    let result = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
        .arg(source)
        .args([
            "-vf",
            "fps=0.2",
            "-an",
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
        ])
        .arg(output)
        .output()
        .await
        .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to run ffmpeg: {e}"), None))?;

    check_ffmpeg_result(&result, output, "fps downsample")
}

fn output_is_present(output: &Path) -> bool {
    std::fs::metadata(output).map(|m| m.len() > 0).unwrap_or(false)
}

fn check_ffmpeg_result(
    result: &std::process::Output,
    output: &Path,
    what: &str,
) -> MediaResult<()> {
    if !result.status.success() {
        return Err(MediaError::ffmpeg_failed(
            format!("{what} failed with {}", result.status),
            Some(String::from_utf8_lossy(&result.stderr).into_owned()),
        ));
    }
    if !output_is_present(output) {
        return Err(MediaError::ffmpeg_failed(
            format!("{what} completed but produced no output"),
            None,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn existing_output_short_circuits_without_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("seg0.mp4");
        let mut f = std::fs::File::create(&out).unwrap();
        f.write_all(b"already cut").unwrap();

        // Source does not exist; the existence check must win before any
        // source validation or ffmpeg spawn.
        cut_window(Path::new("/nonexistent.mp4"), 0.0, 60.0, &out)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_concat_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("series.mp4");
        let err = concat_files(&[], &out).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }

    #[tokio::test]
    async fn missing_concat_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("series.mp4");
        let missing = dir.path().join("ep1.mp4");
        let err = concat_files(&[missing.as_path()], &out).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
