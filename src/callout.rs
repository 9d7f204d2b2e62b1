//! Callouts: timed overlay cards rendered once per export and composited
//! onto their segment by the merge compiler.
//!
//! A segment's sidecar (`callouts/<prefix>.yml`) lists `{type, starts_at,
//! duration}` entries; `type` keys into the episode's style presets. Style
//! identifiers form a closed set resolved at load time, so an unknown
//! style is a configuration error long before any rendering starts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::assets::{PathLookup, Sound, SoundConfig};
use crate::exec::{self, CommandOutput, ShellError};
use crate::ffmpeg::compiler::AnimationKind;
use crate::ffmpeg::probe;
use crate::layout::{Anchor, Spacing};
use crate::timing::Timecode;

const MAGICK: &str = "magick";

/// One sidecar entry, as authored.
#[derive(Debug, Clone, Deserialize)]
pub struct CalloutSpec {
    #[serde(rename = "type")]
    pub style_name: String,
    pub starts_at: Timecode,
    pub duration: Timecode,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Load a segment's callout sidecar; a missing file means no callouts.
pub fn load_sidecar(path: &Path) -> Result<Vec<CalloutSpec>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let body = fs::read_to_string(path)
        .with_context(|| format!("reading callout sidecar {}", path.display()))?;
    serde_yaml::from_str(&body)
        .with_context(|| format!("parsing callout sidecar {}", path.display()))
}

/// Renderer selection for a style preset. Closed set: anything else in
/// config fails deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleKind {
    #[default]
    Default,
    FileCopy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextStyle {
    pub color: String,
    pub size: u32,
    pub font_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionConfig {
    #[serde(default = "default_transition_duration")]
    pub duration: f64,
    #[serde(default)]
    pub animation: AnimationKind,
    #[serde(default)]
    pub sound: Option<SoundConfig>,
}

fn default_transition_duration() -> f64 {
    0.2
}

/// A transition with its sound resolved to a playable file.
#[derive(Debug, Clone)]
pub struct Transition {
    pub duration: f64,
    pub animation: AnimationKind,
    pub sound: Sound,
}

impl TransitionConfig {
    pub fn resolve(&self, source: &PathLookup, silent: &Path) -> Result<Transition> {
        if self.duration < 0.0 {
            bail!("transition duration must not be negative");
        }
        Ok(Transition {
            duration: self.duration,
            animation: self.animation,
            sound: Sound::resolve(self.sound.as_ref(), source, silent)?,
        })
    }
}

/// A callout style preset from config.
#[derive(Debug, Clone, Deserialize)]
pub struct CalloutStyle {
    #[serde(default)]
    pub style: StyleKind,
    pub anchor: Anchor,
    #[serde(default)]
    pub margin: Spacing,
    pub in_transition: TransitionConfig,
    pub out_transition: TransitionConfig,
    #[serde(default = "default_card_width")]
    pub width: u32,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default = "default_shadow_color")]
    pub shadow_color: String,
    #[serde(default = "default_padding")]
    pub padding: Spacing,
    #[serde(default)]
    pub title_style: Option<TextStyle>,
    #[serde(default)]
    pub body_style: Option<TextStyle>,
    /// Source image for [`StyleKind::FileCopy`].
    #[serde(default)]
    pub file_path: Option<String>,
}

fn default_card_width() -> u32 {
    600
}

fn default_shadow_color() -> String {
    "#00000066".to_string()
}

fn default_padding() -> Spacing {
    Spacing::uniform(20)
}

impl CalloutStyle {
    /// Structural validation, run when config is loaded so every style
    /// failure surfaces before a single subprocess starts.
    pub fn validate(&self, name: &str) -> Result<()> {
        match self.style {
            StyleKind::Default => {
                if self.background_color.is_none() {
                    bail!("callout style {name:?} needs a background_color");
                }
            }
            StyleKind::FileCopy => {
                if self.file_path.is_none() {
                    bail!("callout style {name:?} needs a file_path");
                }
            }
        }
        Ok(())
    }
}

/// Renders callout cards at 2x resolution through the external image
/// compositor.
pub struct CalloutRenderer<'a> {
    source: &'a PathLookup,
}

impl<'a> CalloutRenderer<'a> {
    pub fn new(source: &'a PathLookup) -> Self {
        Self { source }
    }

    pub fn render(
        &self,
        style: &CalloutStyle,
        spec: &CalloutSpec,
        output_path: &Path,
        log_path: &Path,
    ) -> Result<()> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        match style.style {
            StyleKind::Default => self.render_card(style, spec, output_path, log_path),
            StyleKind::FileCopy => {
                let file_path = style
                    .file_path
                    .as_ref()
                    .expect("validated file_copy style");
                let resolved = self.source.search(file_path)?;
                fs::copy(&resolved, output_path).with_context(|| {
                    format!(
                        "copying {} to {}",
                        resolved.display(),
                        output_path.display()
                    )
                })?;
                Ok(())
            }
        }
    }

    /// Default card: drop-shadowed rectangle with optional title and body
    /// captions stacked inside the padding.
    fn render_card(
        &self,
        style: &CalloutStyle,
        spec: &CalloutSpec,
        output_path: &Path,
        log_path: &Path,
    ) -> Result<()> {
        let shadow_offset: i64 = 20;
        let padding = style.padding;
        let text_width = (i64::from(style.width) - padding.horizontal()).max(1) as u32;

        let title = self.render_text_image(
            spec.title.as_deref(),
            style.title_style.as_ref(),
            text_width,
            log_path,
        )?;
        let body = self.render_text_image(
            spec.body.as_deref(),
            style.body_style.as_ref(),
            text_width,
            log_path,
        )?;

        let title_height = title.as_ref().map_or(0, |t| i64::from(t.height));
        let body_height = body.as_ref().map_or(0, |b| i64::from(b.height));
        let text_gap = match (&title, &style.title_style) {
            (Some(_), Some(text_style)) => (f64::from(text_style.size) * 0.5).round() as i64,
            _ => 0,
        };

        let background_color = style
            .background_color
            .as_deref()
            .expect("validated default style");
        let image_width = i64::from(style.width);
        let image_height = padding.top + padding.bottom + title_height + text_gap + body_height
            + shadow_offset;
        let text_x = shadow_offset + padding.left;

        let mut args: Vec<String> = vec![
            "-size".into(),
            format!("{image_width}x{image_height}"),
            "xc:none".into(),
            "-fill".into(),
            style.shadow_color.clone(),
            "-draw".into(),
            format!(
                "rectangle 0,{shadow_offset},{},{image_height}",
                image_width - shadow_offset
            ),
            "-fill".into(),
            background_color.to_string(),
            "-draw".into(),
            format!(
                "rectangle {shadow_offset},0,{image_width},{}",
                image_height - shadow_offset
            ),
        ];

        if let Some(title) = &title {
            args.push(title.file.path().display().to_string());
            args.push("-geometry".into());
            args.push(format!("+{text_x}+{}", padding.top));
            args.push("-composite".into());
        }

        if let Some(body) = &body {
            args.push(body.file.path().display().to_string());
            args.push("-geometry".into());
            args.push(format!("+{text_x}+{}", padding.top + title_height + text_gap));
            args.push("-composite".into());
        }

        args.push(format!("PNG:{}", output_path.display()));

        run_compositor(&args, log_path)?;
        Ok(())
    }

    /// Rasterize one text block. Returns `None` for empty text so layout
    /// collapses naturally.
    fn render_text_image(
        &self,
        text: Option<&str>,
        text_style: Option<&TextStyle>,
        width: u32,
        log_path: &Path,
    ) -> Result<Option<TextImage>> {
        let text = match text {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(None),
        };
        let Some(text_style) = text_style else {
            bail!("callout has text {text:?} but its style defines no text style");
        };

        let font_path = self
            .source
            .search(&text_style.font_path)
            .unwrap_or_else(|_| text_style.font_path.clone());

        let file = tempfile::Builder::new()
            .prefix("callout-text-")
            .suffix(".png")
            .tempfile()
            .context("creating caption scratch file")?;

        let args: Vec<String> = vec![
            "-size".into(),
            format!("{width}x"),
            "-background".into(),
            "none".into(),
            "-fill".into(),
            text_style.color.clone(),
            "-font".into(),
            font_path.display().to_string(),
            "-pointsize".into(),
            text_style.size.to_string(),
            format!("caption:{}", escape_caption(text)),
            format!("PNG:{}", file.path().display()),
        ];

        run_compositor(&args, log_path)?;

        let (_, height) = probe::image_dimensions(file.path())?;
        Ok(Some(TextImage { file, height }))
    }
}

struct TextImage {
    file: NamedTempFile,
    height: u32,
}

fn escape_caption(text: &str) -> String {
    text.replace('\'', "\\'")
}

/// The compositor occasionally loses a race against its own scratch files
/// and reports a missing file on the first attempt; one retry is allowed
/// for exactly that case.
fn run_compositor(args: &[String], log_path: &Path) -> Result<CommandOutput> {
    match exec::run_command(MAGICK, args, Some(log_path)) {
        Err(err) if is_transient_missing_file(&err) => {
            exec::run_command(MAGICK, args, Some(log_path)).map_err(Into::into)
        }
        other => other.map_err(Into::into),
    }
}

fn is_transient_missing_file(err: &ShellError) -> bool {
    match err {
        ShellError::ExitStatus { stderr, .. } => {
            stderr.contains("No such file or directory") || stderr.contains("unable to open image")
        }
        ShellError::Spawn { .. } => false,
    }
}
