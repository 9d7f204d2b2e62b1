//! Episode-level final merge command.
//!
//! Consumes the ordered clip list `[intro, segments.., outro]` (each clip
//! already audio/video merged), the watermark, and the backtrack, and
//! emits the single ffmpeg invocation that crossfades everything into the
//! final episode file.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::exec::ExternalCommand;
use crate::ffmpeg::{
    DELIVERY_AUDIO, FilterChain, LOSSLESS_VIDEO, delay_ms, format_time, push_args,
};
use crate::timing::{self, TARGET_FPS};

/// A probed clip entering the final merge.
#[derive(Debug, Clone)]
pub struct ClipInfo {
    pub path: PathBuf,
    pub duration: f64,
    pub fps: f64,
}

impl ClipInfo {
    /// Wall-clock duration once the clip is retimed to the target rate.
    pub fn adjusted_duration(&self) -> f64 {
        timing::normalized_duration(self.duration, self.fps)
    }
}

#[derive(Debug, Clone)]
pub struct WatermarkSpec {
    pub path: PathBuf,
    pub x: i64,
    pub y: i64,
    pub opacity: f64,
}

#[derive(Debug, Clone)]
pub struct BacktrackSpec {
    pub path: PathBuf,
    pub full_volume: f64,
    /// Gain while narration plays; the envelope fades between the two.
    pub ducked_volume: f64,
}

pub struct FinalMergeInput<'a> {
    /// Ordered as intro, content segments ascending by prefix, outro.
    pub clips: &'a [ClipInfo],
    pub watermark: WatermarkSpec,
    pub backtrack: BacktrackSpec,
    pub crossfade_duration: f64,
    pub output_path: &'a Path,
}

struct MergeTiming {
    intro_adjusted: f64,
    total_video_duration: f64,
    watermark_start: f64,
    watermark_end: f64,
}

impl MergeTiming {
    fn compute(clips: &[ClipInfo], crossfade: f64) -> Self {
        let intro_adjusted = clips[0].adjusted_duration();
        let outro_adjusted = clips[clips.len() - 1].adjusted_duration();
        let total_segments_duration: f64 = clips[1..clips.len() - 1]
            .iter()
            .map(|clip| clip.adjusted_duration() - crossfade)
            .sum();

        let total_video_duration =
            intro_adjusted + total_segments_duration + outro_adjusted - crossfade * 2.0;
        let watermark_start = intro_adjusted - crossfade;
        let watermark_end = watermark_start + total_segments_duration;

        Self {
            intro_adjusted,
            total_video_duration,
            watermark_start,
            watermark_end,
        }
    }
}

pub fn compile_final_merge(input: &FinalMergeInput) -> Result<ExternalCommand> {
    if input.clips.len() < 2 {
        bail!(
            "final merge needs at least an intro and an outro, got {} clip(s)",
            input.clips.len()
        );
    }

    let crossfade = input.crossfade_duration;
    let timing = MergeTiming::compute(input.clips, crossfade);

    let mut args: Vec<String> = Vec::new();
    for clip in input.clips {
        push_args(&mut args, &["-i"]);
        args.push(clip.path.display().to_string());
    }

    // Looped watermark still, then the backtrack, after every clip.
    push_args(&mut args, &["-loop", "1", "-t"]);
    args.push(format_time(timing.total_video_duration));
    push_args(&mut args, &["-i"]);
    args.push(input.watermark.path.display().to_string());
    push_args(&mut args, &["-i"]);
    args.push(input.backtrack.path.display().to_string());

    let watermark_stream = input.clips.len();
    let backtrack_stream = input.clips.len() + 1;

    let mut video_filters = FilterChain::new();
    let mut audio_filters = FilterChain::new();

    let last = input.clips.len() - 1;
    let mut offset = 0.0;

    for (index, clip) in input.clips.iter().enumerate() {
        let adjusted = clip.adjusted_duration();
        let prev_label = if index == 1 {
            "v0".to_string()
        } else {
            format!("vx{}", index.saturating_sub(2))
        };

        video_filters.push(format!(
            "[{index}:v]fps={TARGET_FPS},setpts=PTS-STARTPTS[v{index}]"
        ));

        if index == 0 {
            audio_filters.push(format!("[{index}:a]asetpts=PTS-STARTPTS[a{index}]"));
            offset = adjusted - crossfade;
        } else if index == last {
            // The watermark rides on the clip feeding the final crossfade,
            // enabled over exactly the segment region.
            let watermarked = format!("{prev_label}_watermarked");
            video_filters.push(format!(
                "[{watermark_stream}:v]scale=iw*0.5:ih*0.5,format=rgba,\
                 colorchannelmixer=aa={}[watermark]",
                format_time(input.watermark.opacity),
            ));
            video_filters.push(format!(
                "[{prev_label}][watermark]overlay={x}:{y}:\
                 enable='between(t,{start},{end})'[{watermarked}]",
                x = input.watermark.x,
                y = input.watermark.y,
                start = format_time(timing.watermark_start),
                end = format_time(timing.watermark_end),
            ));

            // Clone-pad the preceding clip so the outro crossfade has
            // material to blend into.
            let pad_duration = offset + crossfade;
            let padded = format!("{prev_label}_padded");
            video_filters.push(format!(
                "[{watermarked}]tpad=stop_mode=clone:stop_duration={}[{padded}]",
                format_time(pad_duration),
            ));
            video_filters.push(format!(
                "[{padded}][v{index}]xfade=transition=fade:duration={}:offset={}[vfinal]",
                format_time(crossfade),
                format_time(offset),
            ));

            let delay = delay_ms(offset);
            audio_filters.push(format!("[{index}:a]adelay={delay}|{delay}[a{index}]"));
        } else {
            video_filters.push(format!(
                "[{prev_label}][v{index}]xfade=transition=fade:duration={}:offset={}[vx{}]",
                format_time(crossfade),
                format_time(offset),
                index - 1,
            ));

            let delay = delay_ms(offset);
            audio_filters.push(format!("[{index}:a]adelay={delay}|{delay}[a{index}]"));
            offset += adjusted - crossfade;
        }
    }

    let audio_inputs: String = (0..input.clips.len()).map(|i| format!("[a{i}]")).collect();
    audio_filters.push(format!(
        "{audio_inputs}amix=inputs={}:duration=longest:normalize=0[mixed]",
        input.clips.len(),
    ));

    audio_filters.push(backtrack_envelope_filter(
        backtrack_stream,
        &input.backtrack,
        timing.intro_adjusted,
        timing.watermark_end,
    ));
    audio_filters
        .push("[mixed][backtrack_faded]amix=inputs=2:duration=first:normalize=0[afinal]".into());

    args.push("-filter_complex".to_string());
    args.push(format!("{};{}", video_filters.join(), audio_filters.join()));

    push_args(&mut args, &["-map", "[vfinal]", "-map", "[afinal]"]);
    push_args(&mut args, LOSSLESS_VIDEO);
    push_args(&mut args, DELIVERY_AUDIO);
    push_args(&mut args, &["-y"]);
    args.push(input.output_path.display().to_string());

    Ok(ExternalCommand::new("ffmpeg", args))
}

/// Piecewise-linear volume envelope evaluated per output frame: full
/// volume through the intro, a duck across the intro boundary, the ducked
/// bed under narration, and a fade to silence into the outro.
fn backtrack_envelope_filter(
    stream: usize,
    backtrack: &BacktrackSpec,
    intro_end: f64,
    segments_end: f64,
) -> String {
    let (fade_in, fade_out) = timing::backtrack_fade_windows(intro_end, segments_end);
    let full = format_time(backtrack.full_volume);
    let ducked = format_time(backtrack.ducked_volume);

    format!(
        "[{stream}:a]volume='if(lt(t,{fis}),{full},\
         if(lt(t,{fie}),{full}-({full}-{ducked})*(t-{fis})/{fid},\
         if(lt(t,{fos}),{ducked},\
         if(lt(t,{foe}),{ducked}*({foe}-t)/{fod},0))))':eval=frame[backtrack_faded]",
        fis = format_time(fade_in.start),
        fie = format_time(fade_in.end),
        fid = format_time(fade_in.duration),
        fos = format_time(fade_out.start),
        foe = format_time(fade_out.end),
        fod = format_time(fade_out.duration),
    )
}
