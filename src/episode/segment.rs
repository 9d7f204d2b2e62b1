//! Segment model and discovery.
//!
//! Every content file under `content/` whose name starts with a digit run
//! becomes one segment; the digits are the ordering prefix and the key for
//! every derived artifact path. Discovery order on disk is irrelevant:
//! segments are sorted by numeric prefix.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};

use crate::content;
use crate::ui;

pub struct Segment {
    /// Digit run exactly as it appears in the filename (`007`).
    pub prefix: String,
    /// Numeric value of the prefix, the ordering key.
    pub order: u64,
    pub content_path: PathBuf,
    episode_root: PathBuf,
    output_dir: PathBuf,
    script_path: OnceLock<PathBuf>,
    video_path: OnceLock<PathBuf>,
    callouts_path: OnceLock<PathBuf>,
    segment_path: OnceLock<PathBuf>,
    output_voiceover_path: OnceLock<PathBuf>,
}

impl Segment {
    pub fn new(content_path: PathBuf, episode_root: &Path, output_dir: &Path) -> Option<Self> {
        let name = content_path.file_name()?.to_string_lossy().into_owned();
        let prefix: String = name.chars().take_while(char::is_ascii_digit).collect();
        let order: u64 = prefix.parse().ok()?;

        Some(Self {
            prefix,
            order,
            content_path,
            episode_root: episode_root.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            script_path: OnceLock::new(),
            video_path: OnceLock::new(),
            callouts_path: OnceLock::new(),
            segment_path: OnceLock::new(),
            output_voiceover_path: OnceLock::new(),
        })
    }

    pub fn file_name(&self) -> String {
        self.content_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn content_extension(&self) -> String {
        self.content_path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Voiceover script text for this segment.
    pub fn script_path(&self) -> &Path {
        self.script_path.get_or_init(|| {
            self.episode_root
                .join("scripts")
                .join(format!("{}.txt", self.prefix))
        })
    }

    /// Callout sidecar under the episode root.
    pub fn callouts_path(&self) -> &Path {
        self.callouts_path.get_or_init(|| {
            self.episode_root
                .join("callouts")
                .join(format!("{}.yml", self.prefix))
        })
    }

    /// Normalized (24 fps) video artifact.
    pub fn video_path(&self) -> &Path {
        self.video_path.get_or_init(|| {
            self.output_dir
                .join("videos")
                .join(format!("{}.mp4", self.prefix))
        })
    }

    /// Final merged audio+video artifact for this segment.
    pub fn segment_path(&self) -> &Path {
        self.segment_path.get_or_init(|| {
            self.output_dir
                .join("segments")
                .join(format!("{}.mp4", self.prefix))
        })
    }

    /// Loudness-normalized voiceover consumed by the merge.
    pub fn output_voiceover_path(&self) -> &Path {
        self.output_voiceover_path.get_or_init(|| {
            self.output_dir
                .join("voiceovers")
                .join(format!("{}.flac", self.prefix))
        })
    }

    /// Rendered callout card for per-segment callout index `index`.
    pub fn callout_image_path(&self, index: usize) -> PathBuf {
        self.output_dir
            .join("callouts")
            .join(format!("{}-{}.png", self.prefix, index))
    }

    /// The raw voiceover file to normalize: a pre-recorded (or previously
    /// synthesized) take under `voiceovers/` if one exists, otherwise the
    /// default synthesis target. Deliberately not memoized: a TTS engine
    /// may drop a file with a different audio extension next to it.
    pub fn voiceover_source_path(&self) -> PathBuf {
        let dir = self.episode_root.join("voiceovers");
        for ext in content::AUDIO {
            let candidate = dir.join(format!("{}.{}", self.prefix, ext));
            if candidate.is_file() {
                return candidate;
            }
        }
        dir.join(format!("{}.mp3", self.prefix))
    }
}

/// Discover and order the episode's segments. Two content files sharing a
/// prefix is a config mistake; the last one discovered wins and a warning
/// names the loser.
pub fn discover(episode_root: &Path, output_dir: &Path) -> Result<Vec<Segment>> {
    let content_dir = episode_root.join("content");
    let mut by_order: BTreeMap<u64, Segment> = BTreeMap::new();

    for ext in content::all() {
        let pattern = format!("{}/**/*.{}", content_dir.display(), ext);
        let entries = glob::glob(&pattern)
            .with_context(|| format!("invalid content glob {pattern:?}"))?;

        for entry in entries {
            let path = entry.context("walking content directory")?;
            let Some(segment) = Segment::new(path, episode_root, output_dir) else {
                continue;
            };

            if let Some(previous) = by_order.insert(segment.order, segment) {
                ui::warn(
                    "discover",
                    format!(
                        "duplicate segment prefix {}: ignoring {}",
                        previous.prefix,
                        previous.file_name(),
                    ),
                );
            }
        }
    }

    Ok(by_order.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn segments_sort_by_numeric_prefix_not_listing_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("content/002-b.mp4"));
        touch(&root.join("content/001-a.mp4"));
        touch(&root.join("content/010-c.mp4"));

        let segments = discover(root, &root.join("out")).unwrap();
        let prefixes: Vec<&str> = segments.iter().map(|s| s.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["001", "002", "010"]);
    }

    #[test]
    fn discovery_spans_content_types_and_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("content/001-intro.mp4"));
        touch(&root.join("content/002-diagram.png"));
        touch(&root.join("content/nested/003-demo.tape"));
        touch(&root.join("content/notes.txt"));

        let segments = discover(root, &root.join("out")).unwrap();
        assert_eq!(segments.len(), 3);
    }

    #[test]
    fn files_without_a_digit_prefix_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("content/cover.png"));
        touch(&root.join("content/001-a.mp4"));

        let segments = discover(root, &root.join("out")).unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn duplicate_prefixes_keep_the_last_discovered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("content/001-a.mp4"));
        touch(&root.join("content/001-b.mp4"));

        let segments = discover(root, &root.join("out")).unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn derived_paths_are_keyed_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let out = root.join("out");
        touch(&root.join("content/007-demo.mp4"));

        let segments = discover(root, &out).unwrap();
        let segment = &segments[0];

        assert_eq!(segment.script_path(), root.join("scripts/007.txt"));
        assert_eq!(segment.callouts_path(), root.join("callouts/007.yml"));
        assert_eq!(segment.video_path(), out.join("videos/007.mp4"));
        assert_eq!(segment.segment_path(), out.join("segments/007.mp4"));
        assert_eq!(
            segment.output_voiceover_path(),
            out.join("voiceovers/007.flac")
        );
        assert_eq!(segment.callout_image_path(1), out.join("callouts/007-1.png"));
    }

    #[test]
    fn prerecorded_voiceover_overrides_the_synthesis_target() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("content/004-a.mp4"));
        touch(&root.join("voiceovers/004.wav"));

        let segments = discover(root, &root.join("out")).unwrap();
        assert_eq!(
            segments[0].voiceover_source_path(),
            root.join("voiceovers/004.wav")
        );
    }
}
