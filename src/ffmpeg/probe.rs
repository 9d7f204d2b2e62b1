//! ffprobe wrappers for duration, frame rate, and image dimensions.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

pub fn probe_duration_seconds(path: &Path) -> Result<f64> {
    if !path.is_file() {
        return Ok(0.0);
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .with_context(|| format!("Failed to run ffprobe for {}", path.display()))?;

    if !output.status.success() {
        anyhow::bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    let duration: f64 = duration_str
        .trim()
        .parse()
        .context("Failed to parse ffprobe duration as f64")?;

    Ok(duration)
}

pub fn probe_fps(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=r_frame_rate",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .with_context(|| format!("Failed to probe frame rate for {}", path.display()))?;

    if !output.status.success() {
        anyhow::bail!(
            "ffprobe exited with status {:?} while probing {}",
            output.status.code(),
            path.display()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_frame_rate(stdout.trim())
        .with_context(|| format!("Unable to parse frame rate for {}", path.display()))
}

/// ffprobe reports `r_frame_rate` as a rational like `24000/1001`.
fn parse_frame_rate(value: &str) -> Result<f64> {
    if let Some((numerator, denominator)) = value.split_once('/') {
        let numerator: f64 = numerator.trim().parse()?;
        let denominator: f64 = denominator.trim().parse()?;
        if denominator == 0.0 {
            anyhow::bail!("zero denominator in frame rate {value:?}");
        }
        return Ok(numerator / denominator);
    }

    Ok(value.trim().parse()?)
}

/// Width and height of an image file, read directly from the file header.
pub fn image_dimensions(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path)
        .with_context(|| format!("reading image dimensions of {}", path.display()))
}

/// Callout cards are rasterized at 2x and composited at half size; this is
/// the size the overlay math must use.
pub fn image_overlay_size(path: &Path) -> Result<(u32, u32)> {
    let (width, height) = image_dimensions(path)?;
    Ok((width / 2, height / 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rational_frame_rates() {
        assert_eq!(parse_frame_rate("24/1").unwrap(), 24.0);
        let ntsc = parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
    }

    #[test]
    fn parses_plain_frame_rates() {
        assert_eq!(parse_frame_rate("25").unwrap(), 25.0);
    }

    #[test]
    fn rejects_zero_denominator() {
        assert!(parse_frame_rate("24/0").is_err());
    }

    #[test]
    fn missing_file_has_zero_duration() {
        let duration = probe_duration_seconds(Path::new("/nonexistent.mp4")).unwrap();
        assert_eq!(duration, 0.0);
    }
}
