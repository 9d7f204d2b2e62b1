//! eSpeak engine.

use anyhow::Result;

use crate::exec;

use super::{TtsEngine, TtsPreset, VoiceoverRequest};

pub struct EspeakEngine {
    voice: Option<String>,
    rate: Option<u32>,
}

impl EspeakEngine {
    pub fn new(preset: &TtsPreset) -> Self {
        Self {
            voice: preset.voice.clone(),
            rate: preset.rate,
        }
    }
}

impl TtsEngine for EspeakEngine {
    fn name(&self) -> &'static str {
        "espeak"
    }

    fn available(&self) -> bool {
        exec::command_exists("espeak")
    }

    fn generate(&self, request: &VoiceoverRequest) -> Result<()> {
        let output = request.output_path.with_extension("wav");

        let mut args: Vec<String> = Vec::new();
        if let Some(voice) = &self.voice {
            args.push("-v".into());
            args.push(voice.clone());
        }
        if let Some(rate) = self.rate {
            args.push("-s".into());
            args.push(rate.to_string());
        }
        args.push("-w".into());
        args.push(output.display().to_string());
        args.push(request.text.to_string());

        exec::run_command("espeak", &args, request.log_path)?;
        Ok(())
    }
}
