//! Timing arithmetic for the export pipeline.
//!
//! Everything here is a pure function over explicit inputs. Clips are
//! normalized to a fixed 24 fps before any offset bookkeeping, so the
//! crossfade math stays consistent when source clips vary in frame rate.

use anyhow::{Result, bail};
use serde::Deserialize;

/// The fixed output frame rate of every rendered clip.
pub const TARGET_FPS: f64 = 24.0;

/// A config value that is either a number of seconds or a `HH:MM:SS`
/// timecode string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Timecode {
    Seconds(f64),
    Text(String),
}

impl Timecode {
    pub fn resolve(&self) -> Result<f64> {
        match self {
            Timecode::Seconds(seconds) => Ok(*seconds),
            Timecode::Text(text) => parse_timecode(text),
        }
    }
}

/// Parse `SS`, `MM:SS`, or `HH:MM:SS` (seconds may be fractional) into
/// seconds.
pub fn parse_timecode(input: &str) -> Result<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        bail!("empty timecode");
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        bail!("invalid timecode {trimmed:?}");
    }

    let mut fields = [0.0f64; 3];
    let offset = 3 - parts.len();
    for (slot, part) in fields[offset..].iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid timecode component {part:?} in {trimmed:?}"))?;
    }

    let [hours, minutes, seconds] = fields;
    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// A clip's duration re-expressed at [`TARGET_FPS`]. Retiming a clip to a
/// new frame rate stretches its wall-clock length by `native / target`.
pub fn normalized_duration(duration: f64, native_fps: f64) -> f64 {
    duration * (native_fps / TARGET_FPS)
}

/// Crossfade junction offsets for an ordered clip list.
///
/// Walking `[intro, segments.., outro]`, each junction's `xfade` starts at
/// the running sum of the preceding clips' normalized durations minus one
/// crossfade per junction already passed. For durations `[10, 10, 10]` and
/// a 1s crossfade the offsets are `[9, 18]`.
pub fn accumulate_offsets(durations: &[f64], crossfade: f64) -> Vec<f64> {
    let mut offsets = Vec::with_capacity(durations.len().saturating_sub(1));
    let mut offset = 0.0;

    for duration in durations.iter().take(durations.len().saturating_sub(1)) {
        offset += duration - crossfade;
        offsets.push(offset);
    }

    offsets
}

/// Clamp a requested callout duration into the host segment, leaving a
/// 0.2s guard before the segment end, then round down to the nearest half
/// second so the overlay never outlives its clip.
pub fn clamp_callout_duration(requested: f64, content_duration: f64) -> f64 {
    let ceiling = (content_duration - 0.2).max(0.0);
    let clamped = requested.clamp(0.0, ceiling);
    (clamped / 0.5).floor() * 0.5
}

/// One linear fade of the backtrack volume envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeWindow {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

impl FadeWindow {
    /// A fade window of `duration` seconds straddling `boundary`: 75% of
    /// the fade happens before the boundary, 25% after it.
    pub fn straddling(boundary: f64, duration: f64) -> Self {
        Self {
            start: boundary - duration * 0.75,
            end: boundary + duration * 0.25,
            duration,
        }
    }
}

pub const BACKTRACK_FADE_IN_DURATION: f64 = 1.0;
pub const BACKTRACK_FADE_OUT_DURATION: f64 = 1.5;

/// The two fade windows of the backtrack envelope: the duck at the
/// intro/first-segment boundary and the fade-to-zero at the last-segment/
/// outro boundary. Both boundaries are fps-normalized timestamps.
pub fn backtrack_fade_windows(intro_end: f64, segments_end: f64) -> (FadeWindow, FadeWindow) {
    (
        FadeWindow::straddling(intro_end, BACKTRACK_FADE_IN_DURATION),
        FadeWindow::straddling(segments_end, BACKTRACK_FADE_OUT_DURATION),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn parses_plain_seconds() {
        assert_close(parse_timecode("90").unwrap(), 90.0);
        assert_close(parse_timecode("2.5").unwrap(), 2.5);
    }

    #[test]
    fn parses_minute_and_hour_timecodes() {
        assert_close(parse_timecode("1:30").unwrap(), 90.0);
        assert_close(parse_timecode("01:02:03").unwrap(), 3723.0);
    }

    #[test]
    fn rejects_malformed_timecodes() {
        assert!(parse_timecode("").is_err());
        assert!(parse_timecode("1:2:3:4").is_err());
        assert!(parse_timecode("abc").is_err());
    }

    #[test]
    fn timecode_value_resolves_both_forms() {
        let numeric: Timecode = serde_yaml::from_str("12.5").unwrap();
        assert_close(numeric.resolve().unwrap(), 12.5);

        let text: Timecode = serde_yaml::from_str("\"00:01:05\"").unwrap();
        assert_close(text.resolve().unwrap(), 65.0);
    }

    #[test]
    fn normalization_scales_by_fps_ratio() {
        assert_close(normalized_duration(10.0, 24.0), 10.0);
        assert_close(normalized_duration(10.0, 30.0), 12.5);
        assert_close(normalized_duration(10.0, 12.0), 5.0);
    }

    #[test]
    fn offsets_accumulate_minus_one_crossfade_per_junction() {
        let offsets = accumulate_offsets(&[10.0, 10.0, 10.0], 1.0);
        assert_eq!(offsets.len(), 2);
        assert_close(offsets[0], 9.0);
        assert_close(offsets[1], 18.0);
    }

    #[test]
    fn offsets_for_two_clips_have_a_single_junction() {
        let offsets = accumulate_offsets(&[4.0, 6.0], 0.5);
        assert_eq!(offsets.len(), 1);
        assert_close(offsets[0], 3.5);
    }

    #[test]
    fn clamp_rounds_down_to_half_seconds() {
        assert_close(clamp_callout_duration(5.3, 10.0), 5.0);
        assert_close(clamp_callout_duration(5.5, 10.0), 5.5);
    }

    #[test]
    fn clamp_respects_the_segment_guard() {
        // 20s requested in a 3s segment: ceiling 2.8, floored to 2.5.
        assert_close(clamp_callout_duration(20.0, 3.0), 2.5);
    }

    #[test]
    fn clamp_never_goes_negative() {
        assert_close(clamp_callout_duration(5.0, 0.1), 0.0);
        assert_close(clamp_callout_duration(-2.0, 10.0), 0.0);
    }

    #[test]
    fn fade_windows_straddle_their_boundaries() {
        let (fade_in, fade_out) = backtrack_fade_windows(12.0, 100.0);
        assert_close(fade_in.start, 11.25);
        assert_close(fade_in.end, 12.25);
        assert_close(fade_out.start, 100.0 - 1.125);
        assert_close(fade_out.end, 100.0 + 0.375);
    }
}
