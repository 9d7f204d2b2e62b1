//! Project and episode configuration.
//!
//! Two YAML files feed an export: the project's `castkit.yml` and the
//! episode's `config.yml`. Both deserialize into explicit structs with
//! documented defaults; merging is field-by-field, with episode values
//! overriding project values. Style and TTS presets are validated at load
//! time so every configuration error surfaces before the pipeline starts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::assets::SoundConfig;
use crate::callout::CalloutStyle;
use crate::layout::{Anchor, Spacing};
use crate::timing::Timecode;
use crate::tts::TtsPreset;

pub const PROJECT_CONFIG_BASENAME: &str = "castkit.yml";
pub const EPISODE_CONFIG_BASENAME: &str = "config.yml";

/// A scene coordinate in config: the literal string `center` or a pixel
/// offset.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CoordConfig {
    Pixels(i64),
    Keyword(CenterKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CenterKeyword {
    Center,
}

impl Default for CoordConfig {
    fn default() -> Self {
        CoordConfig::Keyword(CenterKeyword::Center)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogoConfig {
    pub path: String,
    #[serde(default = "default_logo_width")]
    pub width: u32,
    #[serde(default)]
    pub x: CoordConfig,
    #[serde(default)]
    pub y: CoordConfig,
}

fn default_logo_width() -> u32 {
    350
}

#[derive(Debug, Clone, Deserialize)]
pub struct TitleConfig {
    #[serde(default)]
    pub x: CoordConfig,
    #[serde(default)]
    pub y: CoordConfig,
    #[serde(default = "default_title_size")]
    pub size: u32,
    #[serde(default = "default_title_color")]
    pub color: String,
    pub font_path: String,
}

fn default_title_size() -> u32 {
    72
}

fn default_title_color() -> String {
    "white".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntroConfig {
    pub duration: f64,
    /// A color (`black`, `#101010`) or a background image path.
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default = "default_fade")]
    pub fade_in: f64,
    #[serde(default = "default_fade")]
    pub fade_out: f64,
    #[serde(default)]
    pub logo: Option<LogoConfig>,
    #[serde(default)]
    pub title: Option<TitleConfig>,
    #[serde(default)]
    pub sound: Option<SoundConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutroConfig {
    pub duration: f64,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default = "default_fade")]
    pub fade_in: f64,
    #[serde(default = "default_fade")]
    pub fade_out: f64,
    pub logo: LogoConfig,
    #[serde(default)]
    pub sound: Option<SoundConfig>,
}

fn default_fade() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentSceneConfig {
    #[serde(default = "default_crossfade")]
    pub crossfade_duration: Timecode,
}

fn default_crossfade() -> Timecode {
    Timecode::Seconds(0.5)
}

impl Default for SegmentSceneConfig {
    fn default() -> Self {
        Self {
            crossfade_duration: default_crossfade(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenesConfig {
    #[serde(default)]
    pub intro: Option<IntroConfig>,
    #[serde(default)]
    pub outro: Option<OutroConfig>,
    #[serde(default)]
    pub segment: Option<SegmentSceneConfig>,
}

/// Watermark settings: a bare path, or a map with placement overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WatermarkConfig {
    Path(String),
    Detailed {
        #[serde(default)]
        path: Option<String>,
        #[serde(default = "default_watermark_margin")]
        margin: Spacing,
        #[serde(default = "Anchor::bottom_right")]
        anchor: Anchor,
        #[serde(default = "default_watermark_opacity")]
        opacity: f64,
    },
}

fn default_watermark_margin() -> Spacing {
    Spacing::uniform(100)
}

fn default_watermark_opacity() -> f64 {
    0.1
}

/// Watermark with defaults applied.
#[derive(Debug, Clone)]
pub struct Watermark {
    pub path: Option<String>,
    pub margin: Spacing,
    pub anchor: Anchor,
    pub opacity: f64,
}

impl Watermark {
    pub fn from_config(config: Option<&WatermarkConfig>) -> Self {
        match config {
            None => Self {
                path: None,
                margin: default_watermark_margin(),
                anchor: Anchor::bottom_right(),
                opacity: default_watermark_opacity(),
            },
            Some(WatermarkConfig::Path(path)) => Self {
                path: Some(path.clone()),
                margin: default_watermark_margin(),
                anchor: Anchor::bottom_right(),
                opacity: default_watermark_opacity(),
            },
            Some(WatermarkConfig::Detailed {
                path,
                margin,
                anchor,
                opacity,
            }) => Self {
                path: path.clone(),
                margin: *margin,
                anchor: *anchor,
                opacity: *opacity,
            },
        }
    }
}

pub type DemotapeOptions = BTreeMap<String, serde_yaml::Value>;

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_resources_dir")]
    pub resources_dir: Vec<String>,
    #[serde(default)]
    pub scenes: ScenesConfig,
    #[serde(default)]
    pub callout_styles: std::collections::HashMap<String, CalloutStyle>,
    #[serde(default)]
    pub tts: Vec<TtsPreset>,
    #[serde(default)]
    pub backtrack: Option<SoundConfig>,
    #[serde(default)]
    pub watermark: Option<WatermarkConfig>,
    #[serde(default)]
    pub demotape: Option<DemotapeOptions>,
}

fn default_output_dir() -> String {
    "exports/{episode_dirname}".to_string()
}

fn default_resources_dir() -> Vec<String> {
    vec!["resources".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeConfig {
    pub title: String,
    #[serde(default)]
    pub scenes: ScenesConfig,
    #[serde(default)]
    pub callout_styles: std::collections::HashMap<String, CalloutStyle>,
    #[serde(default)]
    pub tts: Vec<TtsPreset>,
    #[serde(default)]
    pub backtrack: Option<SoundConfig>,
    #[serde(default)]
    pub watermark: Option<WatermarkConfig>,
    #[serde(default)]
    pub demotape: Option<DemotapeOptions>,
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        bail!("Config file not found: {}", path.display());
    }
    let body = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_yaml::from_str(&body)
        .with_context(|| format!("parsing config file {}", path.display()))
}

impl ProjectConfig {
    pub fn load_file(path: &Path) -> Result<Self> {
        let config: Self = load_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, style) in &self.callout_styles {
            style.validate(name)?;
        }
        for preset in &self.tts {
            preset.validate()?;
        }
        Ok(())
    }
}

impl EpisodeConfig {
    pub fn load_file(path: &Path) -> Result<Self> {
        let config: Self = load_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, style) in &self.callout_styles {
            style.validate(name)?;
        }
        for preset in &self.tts {
            preset.validate()?;
        }
        Ok(())
    }
}

/// The merged view the orchestrator works from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub intro: Option<IntroConfig>,
    pub outro: Option<OutroConfig>,
    pub crossfade_duration: f64,
    pub callout_styles: std::collections::HashMap<String, CalloutStyle>,
    /// Episode presets first, then project presets.
    pub tts: Vec<TtsPreset>,
    pub backtrack: Option<SoundConfig>,
    pub watermark: Watermark,
    pub demotape: DemotapeOptions,
}

impl Settings {
    pub fn merge(project: &ProjectConfig, episode: &EpisodeConfig) -> Result<Self> {
        let intro = episode
            .scenes
            .intro
            .clone()
            .or_else(|| project.scenes.intro.clone());
        let outro = episode
            .scenes
            .outro
            .clone()
            .or_else(|| project.scenes.outro.clone());
        let segment = episode
            .scenes
            .segment
            .clone()
            .or_else(|| project.scenes.segment.clone())
            .unwrap_or_default();
        let crossfade_duration = segment
            .crossfade_duration
            .resolve()
            .context("resolving crossfade_duration")?;

        let mut callout_styles = project.callout_styles.clone();
        callout_styles.extend(episode.callout_styles.clone());

        let mut tts = episode.tts.clone();
        tts.extend(project.tts.clone());

        let watermark = Watermark::from_config(
            episode.watermark.as_ref().or(project.watermark.as_ref()),
        );

        let mut demotape = project.demotape.clone().unwrap_or_default();
        demotape.extend(episode.demotape.clone().unwrap_or_default());

        Ok(Self {
            intro,
            outro,
            crossfade_duration,
            callout_styles,
            tts,
            backtrack: episode
                .backtrack
                .clone()
                .or_else(|| project.backtrack.clone()),
            watermark,
            demotape,
        })
    }
}

/// Expand a configured resource directory: `~`, a `{episode_dir}`
/// placeholder, and relative paths anchored at the working directory.
pub fn expand_resource_dir(raw: &str, episode_dir: &Path) -> PathBuf {
    let substituted = raw.replace("{episode_dir}", &episode_dir.display().to_string());
    let expanded = shellexpand::tilde(&substituted);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    }
}

/// Resolve the output directory template against the episode directory
/// name.
pub fn expand_output_dir(template: &str, episode_dirname: &str) -> PathBuf {
    PathBuf::from(template.replace("{episode_dirname}", episode_dirname))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT_YAML: &str = r##"
output_dir: "renders/{episode_dirname}"
resources_dir:
  - resources
  - "~/media/shared"
scenes:
  intro:
    duration: 5
    background: "#101010"
  outro:
    duration: 4
    logo:
      path: images/logo.png
  segment:
    crossfade_duration: 1
callout_styles:
  note:
    background_color: "#FFFFFF"
    anchor: [center, bottom]
    margin: [0, 0, 60, 0]
    in_transition:
      sound: sounds/pop.wav
    out_transition: {}
tts:
  - engine: espeak
    id: local
backtrack: music/theme.mp3
watermark:
  path: images/watermark.png
  opacity: 0.2
"##;

    const EPISODE_YAML: &str = r#"
title: "Writing a Parser"
scenes:
  segment:
    crossfade_duration: "0:02"
tts:
  - engine: eleven_labs
    id: narrator
    voice_id: abc123
"#;

    #[test]
    fn project_config_parses_and_validates() {
        let config: ProjectConfig = serde_yaml::from_str(PROJECT_YAML).unwrap();
        config.validate().unwrap();
        assert_eq!(config.resources_dir.len(), 2);
        assert!(config.callout_styles.contains_key("note"));
    }

    #[test]
    fn merged_settings_prefer_episode_values() {
        let project: ProjectConfig = serde_yaml::from_str(PROJECT_YAML).unwrap();
        let episode: EpisodeConfig = serde_yaml::from_str(EPISODE_YAML).unwrap();

        let settings = Settings::merge(&project, &episode).unwrap();
        // Episode crossfade "0:02" wins over the project's 1s.
        assert_eq!(settings.crossfade_duration, 2.0);
        // Episode TTS presets come first in the merged list.
        assert_eq!(settings.tts.len(), 2);
        assert_eq!(settings.tts[0].id.as_deref(), Some("narrator"));
        // Scenes without an episode override fall through to the project.
        assert!(settings.intro.is_some());
        assert_eq!(settings.watermark.opacity, 0.2);
    }

    #[test]
    fn watermark_defaults_apply_without_config() {
        let watermark = Watermark::from_config(None);
        assert!(watermark.path.is_none());
        assert_eq!(watermark.margin, Spacing::uniform(100));
        assert_eq!(watermark.opacity, 0.1);
    }

    #[test]
    fn invalid_callout_style_fails_at_load() {
        let yaml = r#"
callout_styles:
  broken:
    anchor: [center, bottom]
    in_transition: {}
    out_transition: {}
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn output_dir_template_substitutes_the_episode_name() {
        assert_eq!(
            expand_output_dir("renders/{episode_dirname}", "010-parsing"),
            PathBuf::from("renders/010-parsing")
        );
    }
}
