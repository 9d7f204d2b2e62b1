//! Text-to-speech engines.
//!
//! Engine identifiers are a closed set; each preset in config names one
//! and the first enabled, available engine wins. Availability probes check
//! only command presence or API-key presence, never touching the network.

pub mod eleven_labs;
pub mod espeak;
pub mod say;

use std::path::Path;

use anyhow::{Result, bail};
use serde::Deserialize;

pub use eleven_labs::ElevenLabsEngine;
pub use espeak::EspeakEngine;
pub use say::SayEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Say,
    Espeak,
    ElevenLabs,
}

/// One TTS preset as configured. Episode presets precede project presets;
/// a preset must be enabled, match the optional `--tts-preset` filter, and
/// probe available to be picked.
#[derive(Debug, Clone, Deserialize)]
pub struct TtsPreset {
    pub engine: EngineKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub rate: Option<u32>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub voice_settings: Option<serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl TtsPreset {
    pub fn validate(&self) -> Result<()> {
        if self.engine == EngineKind::ElevenLabs && self.voice_id.is_none() {
            bail!("eleven_labs TTS preset needs a voice_id");
        }
        Ok(())
    }
}

/// A voiceover synthesis request. Adjacent segments' script text is passed
/// through so engines that model prosody across sentences can use it.
pub struct VoiceoverRequest<'a> {
    pub text: &'a str,
    pub previous_text: Option<&'a str>,
    pub next_text: Option<&'a str>,
    pub output_path: &'a Path,
    pub log_path: Option<&'a Path>,
}

pub trait TtsEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Capability probe: command on PATH or credential present. No other
    /// I/O side effects.
    fn available(&self) -> bool;

    fn generate(&self, request: &VoiceoverRequest) -> Result<()>;
}

/// Construct the engine a preset names.
pub fn build_engine(preset: &TtsPreset, api_key: Option<&str>) -> Box<dyn TtsEngine> {
    match preset.engine {
        EngineKind::Say => Box::new(SayEngine::new(preset)),
        EngineKind::Espeak => Box::new(EspeakEngine::new(preset)),
        EngineKind::ElevenLabs => Box::new(ElevenLabsEngine::new(preset, api_key)),
    }
}

/// Pick the first enabled, matching, available engine from the ordered
/// preset list. `None` means voiceover is disabled for this export.
pub fn select_engine(
    presets: &[TtsPreset],
    api_key: Option<&str>,
    preset_filter: Option<&str>,
) -> Option<Box<dyn TtsEngine>> {
    presets
        .iter()
        .filter(|preset| preset.enabled)
        .filter(|preset| match preset_filter {
            Some(filter) if !filter.is_empty() => preset.id.as_deref() == Some(filter),
            _ => true,
        })
        .map(|preset| build_engine(preset, api_key))
        .find(|engine| engine.available())
}
