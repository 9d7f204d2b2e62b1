//! Resource lookup and sound resolution.
//!
//! Config values name sounds, images, and fonts by relative path; the
//! [`PathLookup`] resolves them against the project's ordered resource
//! search directories. A missing logical entry is an [`EntryNotFound`]
//! error, distinct from an OS-level missing file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use serde::Deserialize;
use thiserror::Error;

use crate::content;
use crate::exec;

#[derive(Debug, Error)]
#[error("no file entry found for {0:?}")]
pub struct EntryNotFound(pub String);

/// Ordered search-path lookup over the configured resource directories.
#[derive(Debug, Clone)]
pub struct PathLookup {
    dirs: Vec<PathBuf>,
}

impl PathLookup {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Return the first existing candidate for `path` across the search
    /// directories.
    pub fn search(&self, path: impl AsRef<Path>) -> Result<PathBuf, EntryNotFound> {
        let path = path.as_ref();
        for dir in &self.dirs {
            let candidate = dir.join(path);
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        Err(EntryNotFound(path.display().to_string()))
    }

}

/// A sound reference as written in YAML: a bare path, a path with volume,
/// or `false` to disable it explicitly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SoundConfig {
    Disabled(bool),
    Path(String),
    Detailed {
        path: Option<String>,
        #[serde(default = "default_volume")]
        volume: f64,
    },
}

fn default_volume() -> f64 {
    1.0
}

/// A resolved, always-playable audio reference. Unconfigured or disabled
/// sounds resolve to the silent placeholder so downstream filter-graph
/// code never special-cases "no sound".
#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    pub path: PathBuf,
    pub volume: f64,
}

impl Sound {
    pub fn resolve(
        config: Option<&SoundConfig>,
        source: &PathLookup,
        silent: &Path,
    ) -> Result<Self> {
        let (raw_path, volume) = match config {
            None | Some(SoundConfig::Disabled(_)) => {
                return Ok(Self {
                    path: silent.to_path_buf(),
                    volume: 1.0,
                });
            }
            Some(SoundConfig::Path(path)) => (path.clone(), 1.0),
            Some(SoundConfig::Detailed { path, volume }) => match path {
                Some(path) => (path.clone(), *volume),
                None => {
                    return Ok(Self {
                        path: silent.to_path_buf(),
                        volume: *volume,
                    });
                }
            },
        };

        let requested = PathBuf::from(&raw_path);
        let path = if requested.is_absolute() || requested.is_file() {
            requested
        } else {
            let candidate = source.search(&requested)?;
            if candidate.is_dir() {
                sample_audio_file(&candidate)?
            } else {
                candidate
            }
        };

        Ok(Self { path, volume })
    }
}

/// Pick one audio file from a sound directory at random.
fn sample_audio_file(dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading sound directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| content::AUDIO.contains(&ext.to_lowercase().as_str()))
        })
        .collect();
    candidates.sort();

    candidates
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| EntryNotFound(dir.display().to_string()).into())
}

/// Placeholder assets every export depends on: a silent audio track and a
/// fully transparent image. Materialized once into the output directory
/// instead of being shipped as bundled files.
#[derive(Debug, Clone)]
pub struct PlaceholderAssets {
    pub silent_sound: PathBuf,
    pub transparent_image: PathBuf,
}

impl PlaceholderAssets {
    pub fn materialize(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating asset directory {}", dir.display()))?;

        let silent_sound = dir.join("silence.flac");
        if !silent_sound.is_file() {
            let args: Vec<String> = [
                "-f",
                "lavfi",
                "-i",
                "anullsrc=r=44100:cl=mono",
                "-t",
                "1",
                "-c:a",
                "flac",
                "-y",
            ]
            .iter()
            .map(|s| s.to_string())
            .chain([silent_sound.display().to_string()])
            .collect();
            exec::run_command("ffmpeg", &args, None)
                .context("generating silent placeholder track")?;
        }

        let transparent_image = dir.join("transparent.png");
        if !transparent_image.is_file() {
            let canvas = image::RgbaImage::new(16, 16);
            canvas
                .save(&transparent_image)
                .context("writing transparent placeholder image")?;
        }

        Ok(Self {
            silent_sound,
            transparent_image,
        })
    }
}
