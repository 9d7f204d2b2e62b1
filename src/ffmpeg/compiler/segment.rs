//! Per-segment audio/video merge command.
//!
//! Takes the normalized segment video and voiceover plus the resolved
//! callouts, and emits the single ffmpeg invocation that pads the video
//! tail for the upcoming crossfade, overlays every callout with its
//! animation, and mixes voiceover and transition sounds into one track.

use std::path::Path;

use crate::exec::ExternalCommand;
use crate::ffmpeg::compiler::animation::{self, AnimationInput};
use crate::ffmpeg::compiler::{AnimationKind, ResolvedCallout};
use crate::ffmpeg::{FilterChain, LOSSLESS_AUDIO, LOSSLESS_VIDEO, delay_ms, format_time, push_args};

const AUDIO_SAMPLE_RATE: f64 = 44_100.0;

pub struct SegmentMergeInput<'a> {
    pub video_path: &'a Path,
    pub voiceover_path: &'a Path,
    pub output_path: &'a Path,
    pub video_duration: f64,
    pub audio_duration: f64,
    pub crossfade_duration: f64,
    pub callouts: &'a [ResolvedCallout],
}

impl SegmentMergeInput<'_> {
    /// Content runs as long as the longer of video and voiceover; the
    /// final artifact is extended by one crossfade of headroom.
    pub fn final_duration(&self) -> f64 {
        self.video_duration.max(self.audio_duration) + self.crossfade_duration
    }
}

pub fn compile_segment_merge(input: &SegmentMergeInput) -> ExternalCommand {
    let final_duration = input.final_duration();
    let video_pad_duration = final_duration - input.video_duration;
    let audio_pad_samples = ((final_duration - input.audio_duration) * AUDIO_SAMPLE_RATE) as i64;

    let mut args: Vec<String> = Vec::new();
    push_args(&mut args, &["-i"]);
    args.push(input.video_path.display().to_string());
    push_args(&mut args, &["-i"]);
    args.push(input.voiceover_path.display().to_string());

    let mut filters = FilterChain::new();
    filters.push(format!(
        "[0:v]tpad=stop_mode=clone:stop_duration={}[v0]",
        format_time(video_pad_duration)
    ));

    // The voiceover seeds the audio mix; each callout adds two more
    // delayed branches (entrance and exit sounds).
    let mut audio_mix_inputs = vec!["[1:a]".to_string()];

    for (index, callout) in input.callouts.iter().enumerate() {
        // Each callout occupies three consecutive input streams:
        // looped card image, in-sound, out-sound.
        let callout_stream = 2 + index * 3;
        let in_stream = callout_stream + 1;
        let out_stream = callout_stream + 2;

        push_args(&mut args, &["-loop", "1", "-t"]);
        args.push(format_time(callout.duration));
        push_args(&mut args, &["-i"]);
        args.push(callout.image_path.display().to_string());
        push_args(&mut args, &["-i"]);
        args.push(callout.in_sound.path.display().to_string());
        push_args(&mut args, &["-i"]);
        args.push(callout.out_sound.path.display().to_string());

        let input_label = format!("v{index}");
        let output_label = format!("v{}", index + 1);

        let animation_input = AnimationInput {
            callout_stream,
            input_label: &input_label,
            output_label: &output_label,
            index,
            starts_at: callout.starts_at,
            ends_at: callout.ends_at(),
            x: callout.x,
            y: callout.y,
            animation_duration: callout.animation_duration,
            video_duration: input.video_duration,
            width: callout.width,
            height: callout.height,
        };

        let chain = match callout.animation {
            AnimationKind::Fade => animation::fade(&animation_input),
            AnimationKind::Slide => animation::slide(&animation_input),
        };
        filters.extend(chain.video);

        let in_delay = delay_ms(callout.starts_at);
        let out_delay = delay_ms(chain.out_sound_start);
        filters.push(format!(
            "[{in_stream}:a]volume={},adelay={in_delay}|{in_delay}[in_{index}]",
            format_time(callout.in_sound.volume),
        ));
        filters.push(format!(
            "[{out_stream}:a]volume={},adelay={out_delay}|{out_delay}[out_{index}]",
            format_time(callout.out_sound.volume),
        ));

        audio_mix_inputs.push(format!("[in_{index}]"));
        audio_mix_inputs.push(format!("[out_{index}]"));
    }

    filters.push(format!(
        "{}amix=inputs={}:duration=longest:normalize=0[mixed_audio]",
        audio_mix_inputs.concat(),
        audio_mix_inputs.len(),
    ));
    filters.push(format!(
        "[mixed_audio]aresample=async=1,apad=pad_len={audio_pad_samples}[a]"
    ));

    args.push("-filter_complex".to_string());
    args.push(filters.join());

    push_args(&mut args, &["-map"]);
    args.push(format!("[v{}]", input.callouts.len()));
    push_args(&mut args, &["-map", "[a]"]);
    push_args(&mut args, LOSSLESS_AUDIO);
    push_args(&mut args, LOSSLESS_VIDEO);
    push_args(&mut args, &["-y"]);
    args.push(input.output_path.display().to_string());

    ExternalCommand::new("ffmpeg", args)
}
