//! Per-unit content exporters: they turn one content file into the
//! normalized 24 fps clip the merge stages consume.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::DemotapeOptions;
use crate::exec;
use crate::ffmpeg::probe;
use crate::ffmpeg::{LOSSLESS_VIDEO, push_args};
use crate::timing::Timecode;

const FPS_TOLERANCE: f64 = 0.02;

/// Video content: sources already at ~24 fps are copied untouched,
/// anything else is retimed.
pub struct VideoExporter<'a> {
    pub input_path: &'a Path,
    pub log_path: Option<&'a Path>,
}

impl VideoExporter<'_> {
    pub fn right_fps(path: &Path) -> Result<bool> {
        let fps = probe::probe_fps(path)?;
        Ok((24.0 - fps).abs() <= FPS_TOLERANCE)
    }

    pub fn export(&self, output_path: &Path) -> Result<()> {
        if Self::right_fps(self.input_path)? {
            fs::copy(self.input_path, output_path).with_context(|| {
                format!(
                    "copying {} to {}",
                    self.input_path.display(),
                    output_path.display()
                )
            })?;
            return Ok(());
        }

        let mut args: Vec<String> = vec!["-i".into(), self.input_path.display().to_string()];
        push_args(&mut args, &["-r", "24", "-c:v", "libx264", "-y"]);
        args.push(output_path.display().to_string());

        exec::run_command("ffmpeg", &args, self.log_path)?;
        Ok(())
    }
}

/// Still-image content, letterboxed onto the 1920x1080 canvas.
pub struct ImageExporter<'a> {
    pub image_path: &'a Path,
    pub log_path: Option<&'a Path>,
}

impl ImageExporter<'_> {
    pub fn export(&self, output_path: &Path) -> Result<()> {
        let mut args: Vec<String> = vec!["-i".into(), self.image_path.display().to_string()];
        push_args(&mut args, &["-vf"]);
        args.push(
            "scale=1920:1080:force_original_aspect_ratio=decrease,\
             pad=1920:1080:(ow-iw)/2:(oh-ih)/2:black"
                .to_string(),
        );
        push_args(&mut args, &["-r", "24"]);
        push_args(&mut args, LOSSLESS_VIDEO);
        push_args(&mut args, &["-y"]);
        args.push(output_path.display().to_string());

        exec::run_command("ffmpeg", &args, self.log_path)?;
        Ok(())
    }
}

/// Terminal-recording content, rendered by the external `demotape` tool.
pub struct DemotapeExporter<'a> {
    pub demotape_path: &'a Path,
    pub options: &'a DemotapeOptions,
    pub log_path: Option<&'a Path>,
}

/// Options whose values are durations and accept timecode strings.
const DURATION_ATTRIBUTES: &[&str] = &["typing_speed", "loop_delay", "run_enter_delay", "run_sleep"];

impl DemotapeExporter<'_> {
    pub fn export(&self, output_path: &Path) -> Result<()> {
        let mut args: Vec<String> = vec![
            "run".into(),
            self.demotape_path.display().to_string(),
        ];
        args.extend(options_to_args(self.options)?);
        push_args(
            &mut args,
            &[
                "--width", "1920", "--height", "1080", "--fps", "24", "--overwrite",
                "--output-path",
            ],
        );
        args.push(output_path.display().to_string());

        exec::run_command("demotape", &args, self.log_path)?;
        Ok(())
    }
}

fn options_to_args(options: &DemotapeOptions) -> Result<Vec<String>> {
    let mut args = Vec::new();

    for (key, value) in options {
        let rendered = if DURATION_ATTRIBUTES.contains(&key.as_str()) {
            let timecode: Timecode = serde_yaml::from_value(value.clone())
                .with_context(|| format!("demotape option {key:?} is not a duration"))?;
            timecode.resolve()?.to_string()
        } else {
            yaml_scalar_to_string(value)
        };

        args.push(format!("--{}", key.replace('_', "-")));
        args.push(rendered);
    }

    Ok(args)
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotape_options_become_kebab_case_flags() {
        let mut options = DemotapeOptions::new();
        options.insert("font_size".into(), serde_yaml::Value::Number(28.into()));
        options.insert(
            "shell".into(),
            serde_yaml::Value::String("fish".into()),
        );

        let args = options_to_args(&options).unwrap();
        assert_eq!(args, vec!["--font-size", "28", "--shell", "fish"]);
    }

    #[test]
    fn demotape_duration_options_accept_timecodes() {
        let mut options = DemotapeOptions::new();
        options.insert(
            "run_sleep".into(),
            serde_yaml::Value::String("0:02".into()),
        );

        let args = options_to_args(&options).unwrap();
        assert_eq!(args, vec!["--run-sleep", "2"]);
    }
}
