//! macOS `say` engine.

use anyhow::Result;

use crate::exec;

use super::{TtsEngine, TtsPreset, VoiceoverRequest};

pub struct SayEngine {
    voice: Option<String>,
    rate: Option<u32>,
}

impl SayEngine {
    pub fn new(preset: &TtsPreset) -> Self {
        Self {
            voice: preset.voice.clone(),
            rate: preset.rate,
        }
    }
}

impl TtsEngine for SayEngine {
    fn name(&self) -> &'static str {
        "say"
    }

    fn available(&self) -> bool {
        exec::command_exists("say")
    }

    fn generate(&self, request: &VoiceoverRequest) -> Result<()> {
        // `say` only writes AIFF; the loudness normalizer picks the file
        // up by extension afterwards.
        let output = request.output_path.with_extension("aiff");

        let mut args: Vec<String> = Vec::new();
        if let Some(voice) = &self.voice {
            args.push("-v".into());
            args.push(voice.clone());
        }
        if let Some(rate) = self.rate {
            args.push("-r".into());
            args.push(rate.to_string());
        }
        args.push("-o".into());
        args.push(output.display().to_string());
        args.push(request.text.to_string());

        exec::run_command("say", &args, request.log_path)?;
        Ok(())
    }
}
