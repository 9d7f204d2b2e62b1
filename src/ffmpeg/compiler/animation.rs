//! Callout entrance/exit animation filter chains.
//!
//! Both animations consume one callout input stream and thread the running
//! video label forward: `[input_label]` + the animated callout produce
//! `[output_label]`. The returned `out_sound_start` is where the exit
//! transition sound must be delayed to.

use crate::ffmpeg::format_time;

pub struct AnimationInput<'a> {
    /// ffmpeg input index of the callout image stream.
    pub callout_stream: usize,
    pub input_label: &'a str,
    pub output_label: &'a str,
    pub index: usize,
    pub starts_at: f64,
    pub ends_at: f64,
    pub x: i64,
    pub y: i64,
    pub animation_duration: f64,
    /// Raw duration of the host video clip.
    pub video_duration: f64,
    pub width: u32,
    pub height: u32,
}

pub struct AnimationChain {
    pub video: Vec<String>,
    pub out_sound_start: f64,
}

/// Scale the callout, alpha-fade it in and out, shift its timestamps to
/// `starts_at`, and overlay it at a fixed position.
pub fn fade(input: &AnimationInput) -> AnimationChain {
    let out_sound_start = input.ends_at - input.animation_duration;

    // Keep the fade-out inside the host clip if the callout would brush
    // its end.
    let adjusted_ends_at = if input.ends_at > input.video_duration {
        input.ends_at - 0.1
    } else {
        input.ends_at
    };

    let callout_duration = adjusted_ends_at - input.starts_at;
    let fade_out_start = callout_duration - input.animation_duration;

    let faded = format!("callout{}_faded", input.index);
    let delayed = format!("callout{}_delayed", input.index);

    let video = vec![
        format!(
            "[{stream}:v]scale={width}:{height},fade=t=in:st=0:d={fade_d}:alpha=1,\
             fade=t=out:st={fade_out_start}:d={fade_d}:alpha=1[{faded}]",
            stream = input.callout_stream,
            width = input.width,
            height = input.height,
            fade_d = format_time(input.animation_duration),
            fade_out_start = format_time(fade_out_start),
        ),
        format!(
            "[{faded}]setpts=PTS+{starts_at}/TB[{delayed}]",
            starts_at = format_time(input.starts_at),
        ),
        format!(
            "[{input}][{delayed}]overlay=x={x}:y={y}[{output}]",
            input = input.input_label,
            x = input.x,
            y = input.y,
            output = input.output_label,
        ),
    ];

    AnimationChain {
        video,
        out_sound_start,
    }
}

/// Slide the callout in from the left edge and back out again. The stream
/// is split into blurred-in / sharp / blurred-out branches, each enabled
/// over a disjoint window so motion is blurred and the hold is crisp.
pub fn slide(input: &AnimationInput) -> AnimationChain {
    let out_start = input.ends_at - input.animation_duration;
    let slide_in_end = input.starts_at + input.animation_duration;

    let base = format!("callout{}_base", input.index);
    let blur_in = format!("callout{}_blur_in", input.index);
    let sharp = format!("callout{}_sharp", input.index);
    let blur_out = format!("callout{}_blur_out", input.index);
    let blurred_in = format!("callout{}_blurred_in", input.index);
    let blurred_out = format!("callout{}_blurred_out", input.index);
    let stage_in = format!("{}_in", input.output_label);
    let stage_hold = format!("{}_hold", input.output_label);

    let video = vec![
        format!(
            "[{stream}:v]scale={width}:{height}[{base}]",
            stream = input.callout_stream,
            width = input.width,
            height = input.height,
        ),
        format!("[{base}]split=3[{blur_in}][{sharp}][{blur_out}]"),
        format!("[{blur_in}]boxblur=20:1[{blurred_in}]"),
        format!("[{blur_out}]boxblur=20:1[{blurred_out}]"),
        format!(
            "[{input}][{blurred_in}]overlay=x='if(lt(t,{in_end}),-W+((t-{start})*(W+{x})/{anim}),{x})':\
             y={y}:enable='between(t,{start},{in_end})'[{stage_in}]",
            input = input.input_label,
            in_end = format_time(slide_in_end),
            start = format_time(input.starts_at),
            x = input.x,
            y = input.y,
            anim = format_time(input.animation_duration),
        ),
        format!(
            "[{stage_in}][{sharp}]overlay=x={x}:y={y}:\
             enable='between(t,{in_end},{out_start})'[{stage_hold}]",
            x = input.x,
            y = input.y,
            in_end = format_time(slide_in_end),
            out_start = format_time(out_start),
        ),
        format!(
            "[{stage_hold}][{blurred_out}]overlay=x='if(lt(t,{end}),{x}-((t-{out_start})*(W+{x})/{anim}),-W)':\
             y={y}:enable='between(t,{out_start},{end})'[{output}]",
            end = format_time(input.ends_at),
            x = input.x,
            y = input.y,
            out_start = format_time(out_start),
            anim = format_time(input.animation_duration),
            output = input.output_label,
        ),
    ];

    AnimationChain {
        video,
        out_sound_start: out_start,
    }
}
