//! ElevenLabs HTTP engine.
//!
//! The request payload (and any failure body) lands in the per-task log
//! file; the API key is redacted from it after the call on every path.

use std::fs;

use anyhow::{Context, Result, bail};
use serde_json::json;

use crate::exec::logfile::redact_file;

use super::{TtsEngine, TtsPreset, VoiceoverRequest};

const API_BASE: &str = "https://api.elevenlabs.io/v1/text-to-speech";

pub struct ElevenLabsEngine {
    api_key: Option<String>,
    voice_id: Option<String>,
    model_id: Option<String>,
    voice_settings: Option<serde_json::Value>,
}

impl ElevenLabsEngine {
    pub fn new(preset: &TtsPreset, api_key: Option<&str>) -> Self {
        Self {
            api_key: api_key.map(str::to_string),
            voice_id: preset.voice_id.clone(),
            model_id: preset.model_id.clone(),
            voice_settings: preset.voice_settings.clone(),
        }
    }

    fn request_body(&self, request: &VoiceoverRequest) -> serde_json::Value {
        let mut body = json!({ "text": request.text });
        if let Some(model_id) = &self.model_id {
            body["model_id"] = json!(model_id);
        }
        if let Some(settings) = &self.voice_settings {
            body["voice_settings"] = settings.clone();
        }
        if let Some(previous) = request.previous_text {
            body["previous_text"] = json!(previous);
        }
        if let Some(next) = request.next_text {
            body["next_text"] = json!(next);
        }
        body
    }

    fn perform(&self, request: &VoiceoverRequest, api_key: &str) -> Result<()> {
        let voice_id = self
            .voice_id
            .as_deref()
            .context("eleven_labs preset has no voice_id")?;
        let body = self.request_body(request);

        if let Some(log_path) = request.log_path {
            if let Some(parent) = log_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = fs::write(log_path, serde_json::to_string_pretty(&body)?);
        }

        let client = reqwest::blocking::Client::new();
        let response = client
            .post(format!("{API_BASE}/{voice_id}"))
            .header("content-type", "application/json")
            .header("xi-api-key", api_key)
            .header(
                "user-agent",
                format!("castkit/{}", env!("CARGO_PKG_VERSION")),
            )
            .json(&body)
            .send()
            .context("sending ElevenLabs request")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            if let Some(log_path) = request.log_path {
                let _ = fs::write(log_path, format!("status: {status}\n\n{detail}"));
            }
            bail!("ElevenLabs request failed with status {status}");
        }

        let audio = response.bytes().context("reading ElevenLabs response")?;
        fs::write(request.output_path, &audio).with_context(|| {
            format!("writing voiceover to {}", request.output_path.display())
        })?;

        Ok(())
    }
}

impl TtsEngine for ElevenLabsEngine {
    fn name(&self) -> &'static str {
        "eleven_labs"
    }

    fn available(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    fn generate(&self, request: &VoiceoverRequest) -> Result<()> {
        let api_key = self
            .api_key
            .clone()
            .context("eleven_labs engine selected without an API key")?;

        let result = self.perform(request, &api_key);

        // The log may embed the key in a failure body; scrub it whether
        // the call succeeded or not.
        let redacted = match request.log_path {
            Some(log_path) => redact_file(log_path, &api_key),
            None => Ok(()),
        };

        result?;
        redacted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn engine() -> ElevenLabsEngine {
        ElevenLabsEngine {
            api_key: Some("sk-test-123".into()),
            voice_id: Some("narrator".into()),
            model_id: Some("eleven_multilingual_v2".into()),
            voice_settings: Some(json!({"stability": 0.6})),
        }
    }

    #[test]
    fn request_body_includes_prosody_context() {
        let request = VoiceoverRequest {
            text: "Second segment.",
            previous_text: Some("First segment."),
            next_text: None,
            output_path: Path::new("out.mp3"),
            log_path: None,
        };

        let body = engine().request_body(&request);
        assert_eq!(body["text"], "Second segment.");
        assert_eq!(body["previous_text"], "First segment.");
        assert_eq!(body["model_id"], "eleven_multilingual_v2");
        assert_eq!(body["voice_settings"]["stability"], 0.6);
        assert!(body.get("next_text").is_none());
    }

    #[test]
    fn availability_requires_a_nonempty_key() {
        assert!(engine().available());

        let mut keyless = engine();
        keyless.api_key = None;
        assert!(!keyless.available());

        keyless.api_key = Some(String::new());
        assert!(!keyless.available());
    }
}
