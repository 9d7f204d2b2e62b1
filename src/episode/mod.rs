//! Episode export orchestration.
//!
//! Drives the full pipeline: clean and recreate the output directory,
//! export the intro/outro scenes, fan out per-segment work (voiceover
//! synthesis, video normalization, callout rendering), merge each segment,
//! then concatenate everything into the final episode file. Any stage
//! error aborts the export; partial artifacts stay on disk for the next
//! run to reuse.

pub mod scene;
pub mod segment;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::json;

use crate::assets::{PathLookup, PlaceholderAssets, Sound, SoundConfig};
use crate::callout::{self, CalloutRenderer, CalloutSpec, CalloutStyle};
use crate::config::{
    self, CenterKeyword, CoordConfig, EpisodeConfig, IntroConfig, OutroConfig, ProjectConfig,
    Settings,
};
use crate::exec::ExternalCommand;
use crate::exec::logfile::Logfile;
use crate::ffmpeg::compiler::episode::{
    BacktrackSpec, ClipInfo, FinalMergeInput, WatermarkSpec, compile_final_merge,
};
use crate::ffmpeg::compiler::scene::{
    Coord, IntroScene, LogoSpec, OutroScene, SceneBackground, TitleSpec, compile_intro,
    compile_outro,
};
use crate::ffmpeg::compiler::segment::{SegmentMergeInput, compile_segment_merge};
use crate::ffmpeg::compiler::ResolvedCallout;
use crate::ffmpeg::probe;
use crate::layout;
use crate::runner::ParallelRunner;
use crate::timing;
use crate::tts::{self, TtsEngine, VoiceoverRequest};
use crate::ui::{self, Spinner};

use self::scene::{DemotapeExporter, ImageExporter, VideoExporter};
use self::segment::Segment;

use crate::content;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub episode_dir: PathBuf,
    pub project_config_path: PathBuf,
    pub output_dir: Option<String>,
    pub overwrite: bool,
    pub match_segment: Option<String>,
    pub tts_api_key: Option<String>,
    pub tts_preset: Option<String>,
}

pub struct EpisodeExporter {
    episode_title: String,
    settings: Settings,
    options: ExportOptions,
    root_dir: PathBuf,
    project_root_dir: PathBuf,
    output_dir: PathBuf,
    logfile: Logfile,
    source: PathLookup,
    spinner: Spinner,
    match_regex: Regex,
    tts_engine: Option<Box<dyn TtsEngine>>,
    segments: Vec<Segment>,
    assets: Option<PlaceholderAssets>,
}

struct CalloutJob {
    prefix: String,
    index: usize,
    image_path: PathBuf,
    spec: CalloutSpec,
    style: CalloutStyle,
}

impl EpisodeExporter {
    pub fn new(options: ExportOptions) -> Result<Self> {
        let project_config_path = std::path::absolute(&options.project_config_path)
            .context("resolving project config path")?;
        let project = ProjectConfig::load_file(&project_config_path)?;
        let project_root_dir = project_config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let root_dir =
            std::path::absolute(&options.episode_dir).context("resolving episode directory")?;
        let episode =
            EpisodeConfig::load_file(&root_dir.join(config::EPISODE_CONFIG_BASENAME))?;
        let settings = Settings::merge(&project, &episode)?;

        let episode_dirname = root_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("episode directory has no name")?;
        let output_template = options
            .output_dir
            .clone()
            .unwrap_or_else(|| project.output_dir.clone());
        let output_dir =
            std::path::absolute(config::expand_output_dir(&output_template, &episode_dirname))
                .context("resolving output directory")?;

        let resource_dirs = project
            .resources_dir
            .iter()
            .map(|dir| config::expand_resource_dir(dir, &root_dir))
            .collect();
        let source = PathLookup::new(resource_dirs);

        let match_regex = Regex::new(options.match_segment.as_deref().unwrap_or(".*"))
            .context("invalid --match-segment pattern")?;

        let tts_engine = tts::select_engine(
            &settings.tts,
            options.tts_api_key.as_deref(),
            options.tts_preset.as_deref(),
        );

        let segments = segment::discover(&root_dir, &output_dir)?;
        let logfile = Logfile::new(output_dir.join("logs"));

        Ok(Self {
            episode_title: episode.title.clone(),
            settings,
            options,
            root_dir,
            project_root_dir,
            output_dir,
            logfile,
            source,
            spinner: Spinner::new(),
            match_regex,
            tts_engine,
            segments,
            assets: None,
        })
    }

    pub fn export(&mut self) -> Result<()> {
        let started = Instant::now();

        self.cleanup_output_dir()?;
        self.prelude()?;
        self.create_output_dirs()?;
        self.export_scenes()?;
        self.export_voiceovers()?;
        self.export_videos()?;
        self.export_callouts()?;
        self.merge_segment_clips()?;
        self.merge_final()?;

        self.spinner.stop();
        ui::status(
            "info",
            format!(
                "Exported episode in {}",
                ui::format_elapsed(started.elapsed().as_secs_f64())
            ),
        );
        Ok(())
    }

    fn tts_available(&self) -> bool {
        self.tts_engine.is_some()
    }

    fn filtered_segments(&self) -> Vec<&Segment> {
        self.segments
            .iter()
            .filter(|segment| self.match_regex.is_match(&segment.file_name()))
            .collect()
    }

    fn assets(&self) -> Result<&PlaceholderAssets> {
        self.assets
            .as_ref()
            .context("output directories have not been created yet")
    }

    fn intro_path(&self) -> PathBuf {
        self.output_dir.join("scenes/intro.mp4")
    }

    fn outro_path(&self) -> PathBuf {
        self.output_dir.join("scenes/outro.mp4")
    }

    fn output_video_path(&self) -> PathBuf {
        let name = self
            .root_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "episode".to_string());
        self.output_dir.join(format!("{name}.mp4"))
    }

    fn log_elapsed(&self, message: &str, elapsed: f64) {
        ui::status(
            "info",
            format!("{message} in {}", ui::format_elapsed(elapsed)),
        );
    }

    // --- stages -----------------------------------------------------------

    fn cleanup_output_dir(&self) -> Result<()> {
        let logs = self.output_dir.join("logs");
        if logs.is_dir() {
            for entry in fs::read_dir(&logs)? {
                let path = entry?.path();
                if path.is_file() {
                    fs::remove_file(&path)
                        .with_context(|| format!("removing stale log {}", path.display()))?;
                }
            }
        }
        Ok(())
    }

    fn prelude(&self) -> Result<()> {
        let style_names: Vec<&String> = self.settings.callout_styles.keys().collect();
        self.logfile.json_log(
            "config",
            &json!({
                "generated_at": chrono::Local::now().to_rfc3339(),
                "pwd": std::env::current_dir().ok(),
                "title": self.episode_title,
                "episode_dir": self.root_dir,
                "output_dir": self.output_dir,
                "overwrite": self.options.overwrite,
                "match_segment": self.options.match_segment,
                "tts_preset": self.options.tts_preset,
                "tts_engine": self.tts_engine.as_ref().map(|engine| engine.name()),
                "callout_styles": style_names,
                "crossfade_duration": self.settings.crossfade_duration,
            }),
        )?;

        ui::status(
            "info",
            format!("Project root dir: {}", self.project_root_dir.display()),
        );
        ui::status(
            "info",
            format!("Episode root dir: {}", self.root_dir.display()),
        );

        if !self.tts_available() {
            ui::warn("info", "Voiceover is currently disabled");
        }

        let filtered_count = self.filtered_segments().len();
        let count = self.segments.len();
        let message = match (&self.options.match_segment, filtered_count == count) {
            (Some(pattern), true) => {
                format!("Matching all {count} segments with {pattern}")
            }
            (Some(pattern), false) => {
                format!("Matching {filtered_count} out of {count} segments with {pattern}")
            }
            (None, _) => format!("Matching all {count} segments"),
        };
        ui::status("info", message);

        Ok(())
    }

    fn create_output_dirs(&mut self) -> Result<()> {
        for dir in ["segments", "scenes", "logs", "voiceovers", "callouts", "videos"] {
            let path = self.output_dir.join(dir);
            fs::create_dir_all(&path)
                .with_context(|| format!("creating output directory {}", path.display()))?;
        }

        self.assets = Some(PlaceholderAssets::materialize(
            &self.output_dir.join("resources"),
        )?);
        Ok(())
    }

    fn export_scenes(&self) -> Result<()> {
        let intro_config = self
            .settings
            .intro
            .as_ref()
            .context("scenes.intro is not configured")?;
        let outro_config = self
            .settings
            .outro
            .as_ref()
            .context("scenes.outro is not configured")?;

        let intro = self.resolve_intro(intro_config)?;
        let outro = self.resolve_outro(outro_config)?;
        let jobs: Vec<(&str, ExternalCommand)> = vec![
            ("intro", compile_intro(&intro, &self.intro_path())),
            ("outro", compile_outro(&outro, &self.outro_path())),
        ];

        let elapsed = ParallelRunner::new(&self.spinner, "Exporting scenes ({progress}/{count})")
            .run(&jobs, |(tag, command), _| {
                let log_path = self.logfile.create(tag);
                command.run(Some(&log_path))?;
                Ok(())
            })?;

        self.log_elapsed("Exported scenes", elapsed);
        Ok(())
    }

    fn export_voiceovers(&self) -> Result<()> {
        let filtered = self.filtered_segments();
        let elapsed =
            ParallelRunner::new(&self.spinner, "Exporting voiceovers ({progress}/{count})")
                .run(&filtered, |segment, _| self.export_voiceover(segment))?;

        self.log_elapsed("Generated voiceovers", elapsed);
        Ok(())
    }

    fn export_videos(&self) -> Result<()> {
        let filtered = self.filtered_segments();
        let elapsed = ParallelRunner::new(&self.spinner, "Exporting videos ({progress}/{count})")
            .run(&filtered, |segment, _| self.export_video(segment))?;

        self.log_elapsed("Exported videos", elapsed);
        Ok(())
    }

    fn export_callouts(&self) -> Result<()> {
        let mut jobs: Vec<CalloutJob> = Vec::new();
        for segment in self.filtered_segments() {
            let specs = callout::load_sidecar(segment.callouts_path())?;
            for (index, spec) in specs.into_iter().enumerate() {
                let style = self.callout_style(&spec.style_name)?.clone();
                jobs.push(CalloutJob {
                    prefix: segment.prefix.clone(),
                    index,
                    image_path: segment.callout_image_path(index),
                    spec,
                    style,
                });
            }
        }

        let renderer = CalloutRenderer::new(&self.source);
        let elapsed =
            ParallelRunner::new(&self.spinner, "Exporting callouts ({progress}/{count})").run(
                &jobs,
                |job, _| {
                    if job.image_path.is_file() && !self.options.overwrite {
                        return Ok(());
                    }
                    let log_path = self
                        .logfile
                        .create(&format!("{}-callout-{}", job.prefix, job.index));
                    renderer.render(&job.style, &job.spec, &job.image_path, &log_path)
                },
            )?;

        self.log_elapsed("Created callouts", elapsed);
        Ok(())
    }

    fn merge_segment_clips(&self) -> Result<()> {
        let filtered = self.filtered_segments();
        let elapsed =
            ParallelRunner::new(&self.spinner, "Merging audio and video ({progress}/{count})")
                .run(&filtered, |segment, _| self.merge_segment(segment))?;

        self.log_elapsed("Created segments", elapsed);
        Ok(())
    }

    fn merge_final(&self) -> Result<()> {
        self.spinner.update("Merging segments into final episode…");
        let started = Instant::now();
        let assets = self.assets()?;

        let mut clip_paths = vec![self.intro_path()];
        clip_paths.extend(self.merged_segment_paths()?);
        clip_paths.push(self.outro_path());

        let clips: Vec<ClipInfo> = clip_paths
            .iter()
            .map(|path| {
                Ok(ClipInfo {
                    path: path.clone(),
                    duration: probe::probe_duration_seconds(path)?,
                    fps: probe::probe_fps(path)?,
                })
            })
            .collect::<Result<_>>()?;

        let watermark = &self.settings.watermark;
        let watermark_path = match &watermark.path {
            Some(path) => self.source.search(path)?,
            None => assets.transparent_image.clone(),
        };
        let (width, height) = probe::image_overlay_size(&watermark_path)?;
        let (x, y) =
            layout::calculate_base_position(watermark.anchor, watermark.margin, width, height);

        let backtrack = Sound::resolve(
            self.settings.backtrack.as_ref(),
            &self.source,
            &assets.silent_sound,
        )?;
        let ducked_volume = if self.tts_available() {
            0.15 * (1.0 / backtrack.volume)
        } else {
            1.0
        };

        let output_video_path = self.output_video_path();
        let input = FinalMergeInput {
            clips: &clips,
            watermark: WatermarkSpec {
                path: watermark_path,
                x,
                y,
                opacity: watermark.opacity,
            },
            backtrack: BacktrackSpec {
                path: backtrack.path,
                full_volume: backtrack.volume,
                ducked_volume,
            },
            crossfade_duration: self.settings.crossfade_duration,
            output_path: &output_video_path,
        };

        let command = compile_final_merge(&input)?;
        command.run(Some(&self.logfile.create("final-video")))?;

        self.spinner.stop();
        self.log_elapsed("Merged videos", started.elapsed().as_secs_f64());
        ui::status(
            "info",
            format!("Exported video to {}", output_video_path.display()),
        );
        Ok(())
    }

    // --- per-segment workers ----------------------------------------------

    fn export_voiceover(&self, segment: &Segment) -> Result<()> {
        let output = segment.output_voiceover_path();
        if output.is_file() && !self.options.overwrite {
            return Ok(());
        }

        self.create_voiceover(segment)?;
        self.normalize_voiceover(segment)
    }

    fn create_voiceover(&self, segment: &Segment) -> Result<()> {
        let target = segment.voiceover_source_path();
        if target.is_file() && !self.options.overwrite {
            return Ok(());
        }
        if !segment.script_path().is_file() {
            return Ok(());
        }
        let Some(engine) = &self.tts_engine else {
            return Ok(());
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let text = fs::read_to_string(segment.script_path())
            .with_context(|| format!("reading script {}", segment.script_path().display()))?;
        let (previous_text, next_text) = self.adjacent_scripts(segment);
        let log_path = self
            .logfile
            .create(&format!("{}-voiceover", segment.prefix));

        engine.generate(&VoiceoverRequest {
            text: &text,
            previous_text: previous_text.as_deref(),
            next_text: next_text.as_deref(),
            output_path: &target,
            log_path: Some(&log_path),
        })
    }

    /// Loudness-normalize whatever voiceover source this segment has: a
    /// synthesized or pre-recorded take, or the silent placeholder when
    /// voiceover is disabled or missing.
    fn normalize_voiceover(&self, segment: &Segment) -> Result<()> {
        let source = segment.voiceover_source_path();
        let source = if source.is_file() {
            source
        } else {
            self.assets()?.silent_sound.clone()
        };

        let log_path = self
            .logfile
            .create(&format!("{}-normalize", segment.prefix));
        let args: Vec<String> = [
            source.display().to_string(),
            "-f".into(),
            "-o".into(),
            segment.output_voiceover_path().display().to_string(),
        ]
        .into_iter()
        .chain(
            ["-nt", "ebu", "-t", "-18", "-c:a", "flac", "-ac", "1", "-ar", "44100"]
                .iter()
                .map(|s| s.to_string()),
        )
        .collect();

        crate::exec::run_command("ffmpeg-normalize", &args, Some(&log_path))?;
        Ok(())
    }

    fn export_video(&self, segment: &Segment) -> Result<()> {
        let output = segment.video_path();
        if output.is_file() && !self.options.overwrite {
            return Ok(());
        }

        let log_path = self
            .logfile
            .create(&format!("{}-export-video", segment.prefix));
        let extension = segment.content_extension();

        if content::is_video(&extension) {
            VideoExporter {
                input_path: &segment.content_path,
                log_path: Some(&log_path),
            }
            .export(output)
        } else if content::is_image(&extension) {
            ImageExporter {
                image_path: &segment.content_path,
                log_path: Some(&log_path),
            }
            .export(output)
        } else if content::is_demotape(&extension) {
            DemotapeExporter {
                demotape_path: &segment.content_path,
                options: &self.settings.demotape,
                log_path: Some(&log_path),
            }
            .export(output)
        } else {
            bail!("Unsupported content type: {extension:?}")
        }
    }

    fn merge_segment(&self, segment: &Segment) -> Result<()> {
        let video_duration = probe::probe_duration_seconds(segment.video_path())?;
        let audio_duration = probe::probe_duration_seconds(segment.output_voiceover_path())?;
        let content_duration = video_duration.max(audio_duration);

        let specs = callout::load_sidecar(segment.callouts_path())?;
        let mut callouts: Vec<ResolvedCallout> = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| self.resolve_callout(segment, index, spec, content_duration))
            .collect::<Result<_>>()?;
        // A clamp against a very short segment can leave nothing to show.
        callouts.retain(|callout| callout.duration > 0.0);

        let input = SegmentMergeInput {
            video_path: segment.video_path(),
            voiceover_path: segment.output_voiceover_path(),
            output_path: segment.segment_path(),
            video_duration,
            audio_duration,
            crossfade_duration: self.settings.crossfade_duration,
            callouts: &callouts,
        };

        let log_path = self.logfile.create(&format!("{}-merge", segment.prefix));
        compile_segment_merge(&input).run(Some(&log_path))?;
        Ok(())
    }

    fn resolve_callout(
        &self,
        segment: &Segment,
        index: usize,
        spec: &CalloutSpec,
        content_duration: f64,
    ) -> Result<ResolvedCallout> {
        let style = self.callout_style(&spec.style_name)?;
        let starts_at = spec.starts_at.resolve()?;
        let requested = spec.duration.resolve()?;
        let duration = timing::clamp_callout_duration(requested, content_duration);

        let image_path = segment.callout_image_path(index);
        let (width, height) = probe::image_overlay_size(&image_path)?;
        let (x, y) = layout::calculate_base_position(style.anchor, style.margin, width, height);

        let silent = &self.assets()?.silent_sound;
        let in_transition = style.in_transition.resolve(&self.source, silent)?;
        let out_transition = style.out_transition.resolve(&self.source, silent)?;

        Ok(ResolvedCallout {
            image_path,
            width,
            height,
            starts_at,
            duration,
            x,
            y,
            animation: in_transition.animation,
            animation_duration: in_transition.duration,
            in_sound: in_transition.sound,
            out_sound: out_transition.sound,
        })
    }

    // --- resolution helpers -----------------------------------------------

    fn callout_style(&self, name: &str) -> Result<&CalloutStyle> {
        self.settings
            .callout_styles
            .get(name)
            .with_context(|| format!("callout style {name:?} is not defined"))
    }

    /// Script text of the neighboring segments, for TTS prosody context.
    fn adjacent_scripts(&self, segment: &Segment) -> (Option<String>, Option<String>) {
        let position = self
            .segments
            .iter()
            .position(|candidate| candidate.order == segment.order);
        let Some(position) = position else {
            return (None, None);
        };

        let read = |candidate: Option<&Segment>| {
            candidate.and_then(|segment| fs::read_to_string(segment.script_path()).ok())
        };

        let previous = read(position.checked_sub(1).and_then(|i| self.segments.get(i)));
        let next = read(self.segments.get(position + 1));
        (previous, next)
    }

    fn resolve_background(&self, raw: Option<&str>) -> SceneBackground {
        match raw {
            None => SceneBackground::Color("black".to_string()),
            Some(value) if value.starts_with('#') => SceneBackground::Color(value.to_string()),
            Some(value) => match self.source.search(value) {
                Ok(path) => SceneBackground::Image(path),
                // Not a resource file: treat it as a named color.
                Err(_) => SceneBackground::Color(value.to_string()),
            },
        }
    }

    fn resolve_coord(coord: CoordConfig) -> Coord {
        match coord {
            CoordConfig::Keyword(CenterKeyword::Center) => Coord::Center,
            CoordConfig::Pixels(value) => Coord::Pixels(value),
        }
    }

    fn resolve_logo(&self, config: &config::LogoConfig) -> Result<LogoSpec> {
        Ok(LogoSpec {
            path: self.source.search(&config.path)?,
            width: config.width,
            x: Self::resolve_coord(config.x),
            y: Self::resolve_coord(config.y),
        })
    }

    fn resolve_scene_sound(&self, config: Option<&SoundConfig>) -> Result<Option<Sound>> {
        match config {
            None | Some(SoundConfig::Disabled(_)) => Ok(None),
            Some(sound) => {
                let silent = &self.assets()?.silent_sound;
                Ok(Some(Sound::resolve(Some(sound), &self.source, silent)?))
            }
        }
    }

    fn resolve_intro(&self, config: &IntroConfig) -> Result<IntroScene> {
        let title = config
            .title
            .as_ref()
            .map(|title| {
                Ok::<_, anyhow::Error>(TitleSpec {
                    text: self.episode_title.clone(),
                    x: Self::resolve_coord(title.x),
                    y: Self::resolve_coord(title.y),
                    size: title.size,
                    color: title.color.clone(),
                    font_path: self
                        .source
                        .search(&title.font_path)
                        .unwrap_or_else(|_| PathBuf::from(&title.font_path)),
                })
            })
            .transpose()?;

        Ok(IntroScene {
            duration: config.duration,
            background: self.resolve_background(config.background.as_deref()),
            fade_in: config.fade_in,
            fade_out: config.fade_out,
            logo: config
                .logo
                .as_ref()
                .map(|logo| self.resolve_logo(logo))
                .transpose()?,
            title,
            sound: self.resolve_scene_sound(config.sound.as_ref())?,
        })
    }

    fn resolve_outro(&self, config: &OutroConfig) -> Result<OutroScene> {
        Ok(OutroScene {
            duration: config.duration,
            background: self.resolve_background(config.background.as_deref()),
            fade_in: config.fade_in,
            fade_out: config.fade_out,
            logo: self.resolve_logo(&config.logo)?,
            sound: self.resolve_scene_sound(config.sound.as_ref())?,
        })
    }

    /// Every merged segment clip present in the output directory, in
    /// ascending prefix order. Segments excluded by the current filter
    /// still concatenate if a previous run produced them.
    fn merged_segment_paths(&self) -> Result<Vec<PathBuf>> {
        let dir = self.output_dir.join("segments");
        let mut paths: Vec<(u64, PathBuf)> = Vec::new();

        for entry in fs::read_dir(&dir)
            .with_context(|| format!("reading segments directory {}", dir.display()))?
        {
            let path = entry?.path();
            let is_clip = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
            if !is_clip {
                continue;
            }

            let order = path
                .file_stem()
                .and_then(|stem| stem.to_string_lossy().parse::<u64>().ok());
            if let Some(order) = order {
                paths.push((order, path));
            }
        }

        paths.sort_by_key(|(order, _)| *order);
        Ok(paths.into_iter().map(|(_, path)| path).collect())
    }
}
