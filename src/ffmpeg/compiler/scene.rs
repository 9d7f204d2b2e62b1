//! Intro and outro scene command builders.
//!
//! Scenes are synthesized from config alone: a background (flat color or
//! image), an optional logo, an optional title, and an optional sound,
//! faded in and out over a fixed duration.

use std::path::{Path, PathBuf};

use crate::assets::Sound;
use crate::exec::ExternalCommand;
use crate::ffmpeg::{FilterChain, LOSSLESS_AUDIO, LOSSLESS_VIDEO, delay_ms, format_time, push_args};

const SCALE_FLAGS: &[&str] = &["-sws_flags", "lanczos+accurate_rnd+full_chroma_int"];
const OUTRO_LOGO_DELAY: f64 = 0.5;

/// A scene coordinate: centered, or an absolute pixel offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coord {
    Center,
    Pixels(i64),
}

impl Coord {
    fn overlay_expr(self) -> String {
        match self {
            Coord::Center => "(W-w)/2".to_string(),
            Coord::Pixels(value) => value.to_string(),
        }
    }

    fn overlay_expr_vertical(self) -> String {
        match self {
            Coord::Center => "(H-h)/2".to_string(),
            Coord::Pixels(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SceneBackground {
    Color(String),
    Image(PathBuf),
}

#[derive(Debug, Clone)]
pub struct LogoSpec {
    pub path: PathBuf,
    pub width: u32,
    pub x: Coord,
    pub y: Coord,
}

#[derive(Debug, Clone)]
pub struct TitleSpec {
    pub text: String,
    pub x: Coord,
    pub y: Coord,
    pub size: u32,
    pub color: String,
    pub font_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct IntroScene {
    pub duration: f64,
    pub background: SceneBackground,
    pub fade_in: f64,
    pub fade_out: f64,
    pub logo: Option<LogoSpec>,
    pub title: Option<TitleSpec>,
    pub sound: Option<Sound>,
}

#[derive(Debug, Clone)]
pub struct OutroScene {
    pub duration: f64,
    pub background: SceneBackground,
    pub fade_in: f64,
    pub fade_out: f64,
    pub logo: LogoSpec,
    pub sound: Option<Sound>,
}

pub fn compile_intro(scene: &IntroScene, output_path: &Path) -> ExternalCommand {
    let duration = scene.duration;
    let fade_out_start = duration - scene.fade_out - 0.1;

    let mut args: Vec<String> = Vec::new();
    let mut filters = FilterChain::new();
    let mut stream_index = 0usize;

    let background_image = match &scene.background {
        SceneBackground::Image(path) => Some(path.clone()),
        SceneBackground::Color(_) => None,
    };
    let background_color = match &scene.background {
        SceneBackground::Color(color) => color.clone(),
        SceneBackground::Image(_) => "black".to_string(),
    };

    if let Some(path) = &background_image {
        push_args(&mut args, &["-loop", "1", "-t"]);
        args.push(format_time(duration));
        push_args(&mut args, &["-i"]);
        args.push(path.display().to_string());
        filters.push(format!(
            "[{stream_index}:v]scale=1920:1080:force_original_aspect_ratio=increase:\
             flags=lanczos,crop=1920:1080,setpts=PTS-STARTPTS[bg]"
        ));
    } else {
        push_args(&mut args, &["-f", "lavfi", "-i"]);
        args.push(format!(
            "color=c={background_color}:s=1920x1080:d={}",
            format_time(duration)
        ));
        filters.push(format!("[{stream_index}:v]setpts=PTS-STARTPTS[bg]"));
    }
    stream_index += 1;

    let mut current_layer = "bg".to_string();

    if let Some(logo) = &scene.logo {
        push_args(&mut args, &["-loop", "1", "-i"]);
        args.push(logo.path.display().to_string());
        filters.push(format!(
            "[{stream_index}:v]scale={}:-1:flags=lanczos[logo]",
            logo.width
        ));
        filters.push(format!(
            "[{current_layer}][logo]overlay={}:{}[with_logo]",
            logo.x.overlay_expr(),
            logo.y.overlay_expr_vertical(),
        ));
        current_layer = "with_logo".to_string();
        stream_index += 1;
    }

    if let Some(title) = &scene.title {
        let wrapped = wrap_text(&title.text, max_chars_per_line(title));
        let text = escape_drawtext(&wrapped);
        let drawtext_x = match title.x {
            Coord::Center => "(w-text_w)/2".to_string(),
            Coord::Pixels(value) => value.to_string(),
        };
        let drawtext_y = match title.y {
            Coord::Center => "(h-text_h)/2".to_string(),
            Coord::Pixels(value) => value.to_string(),
        };
        let text_align = if title.x == Coord::Center {
            ":text_align=center"
        } else {
            ""
        };

        filters.push(format!(
            "[{current_layer}]drawtext=text='{text}':fontfile={font}:fontsize={size}:\
             fontcolor={color}:x={drawtext_x}:y={drawtext_y}{text_align}[with_title]",
            font = title.font_path.display(),
            size = title.size,
            color = title.color,
        ));
        current_layer = "with_title".to_string();
    }

    filters.push(format!(
        "[{current_layer}]fade=t=in:st=0:d={fade_in}:c={color},\
         fade=t=out:st={fade_out_start}:d={fade_out}:c={color},setpts=PTS-STARTPTS[fade]",
        fade_in = format_time(scene.fade_in),
        fade_out_start = format_time(fade_out_start),
        fade_out = format_time(scene.fade_out),
        color = background_color,
    ));

    if let Some(sound) = &scene.sound {
        push_args(&mut args, &["-i"]);
        args.push(sound.path.display().to_string());
        filters.push(format!(
            "[{stream_index}:a]apad,atrim=end={},aresample=async=1,volume={}[a]",
            format_time(duration),
            format_time(sound.volume),
        ));
    }

    push_args(&mut args, SCALE_FLAGS);
    args.push("-filter_complex".to_string());
    args.push(filters.join());
    push_args(&mut args, &["-map", "[fade]"]);
    if scene.sound.is_some() {
        push_args(&mut args, &["-map", "[a]"]);
    }

    push_args(
        &mut args,
        &["-c:v", "libx264", "-pix_fmt", "yuv420p", "-color_range", "jpeg"],
    );
    if scene.sound.is_some() {
        push_args(&mut args, &["-c:a", "aac", "-ac", "1"]);
    }

    push_args(&mut args, &["-shortest", "-t"]);
    args.push(format_time(duration));
    push_args(&mut args, &["-y"]);
    args.push(output_path.display().to_string());

    ExternalCommand::new("ffmpeg", args)
}

pub fn compile_outro(scene: &OutroScene, output_path: &Path) -> ExternalCommand {
    let duration = scene.duration;
    let fade_out_start = duration - scene.fade_out - 0.1;
    let logo_delay_ms = delay_ms(OUTRO_LOGO_DELAY);

    let mut args: Vec<String> = Vec::new();
    let mut filters = FilterChain::new();

    match &scene.background {
        SceneBackground::Image(background_path) => {
            push_args(&mut args, &["-loop", "1", "-t"]);
            args.push(format_time(duration));
            push_args(&mut args, &["-i"]);
            args.push(background_path.display().to_string());
            push_args(&mut args, &["-loop", "1", "-i"]);
            args.push(scene.logo.path.display().to_string());

            filters.push(
                "[0:v]scale=1920:1080:force_original_aspect_ratio=increase:flags=lanczos,\
                 crop=1920:1080,setpts=PTS-STARTPTS[bg]"
                    .to_string(),
            );
            filters.push(format!(
                "[1:v]scale={width}:-1:flags=lanczos,\
                 fade=t=in:st={delay}:d={fade_in}:alpha=1,\
                 fade=t=out:st={fade_out_start}:d={fade_out}:alpha=1[logo]",
                width = scene.logo.width,
                delay = format_time(OUTRO_LOGO_DELAY),
                fade_in = format_time(scene.fade_in),
                fade_out_start = format_time(fade_out_start),
                fade_out = format_time(scene.fade_out),
            ));
            filters.push(format!(
                "[bg][logo]overlay={}:{}[fade]",
                scene.logo.x.overlay_expr(),
                scene.logo.y.overlay_expr_vertical(),
            ));
        }
        SceneBackground::Color(color) => {
            push_args(&mut args, &["-f", "lavfi", "-i"]);
            args.push(format!(
                "color=c={color}:s=1920x1080:d={}",
                format_time(duration)
            ));
            push_args(&mut args, &["-loop", "1", "-i"]);
            args.push(scene.logo.path.display().to_string());

            filters.push(format!(
                "[1:v]scale={}:-1:flags=lanczos[logo]",
                scene.logo.width
            ));
            filters.push(format!(
                "[0:v][logo]overlay={}:{}[vid]",
                scene.logo.x.overlay_expr(),
                scene.logo.y.overlay_expr_vertical(),
            ));
            filters.push(format!(
                "[vid]fade=t=in:st={delay}:d={fade_in}:c={color},\
                 fade=t=out:st={fade_out_start}:d={fade_out}:c={color},\
                 setpts=PTS-STARTPTS[fade]",
                delay = format_time(OUTRO_LOGO_DELAY),
                fade_in = format_time(scene.fade_in),
                fade_out_start = format_time(fade_out_start),
                fade_out = format_time(scene.fade_out),
            ));
        }
    }

    if let Some(sound) = &scene.sound {
        push_args(&mut args, &["-i"]);
        args.push(sound.path.display().to_string());
        filters.push(format!(
            "[2:a]adelay={logo_delay_ms}|{logo_delay_ms},apad,atrim=end={},\
             aresample=async=1,volume={}[a]",
            format_time(duration),
            format_time(sound.volume),
        ));
    } else {
        filters.push(format!(
            "anullsrc=r=44100:cl=mono,atrim=end={}[a]",
            format_time(duration)
        ));
    }

    push_args(&mut args, SCALE_FLAGS);
    args.push("-filter_complex".to_string());
    args.push(filters.join());
    push_args(&mut args, &["-map", "[fade]", "-map", "[a]"]);
    push_args(&mut args, LOSSLESS_VIDEO);
    push_args(&mut args, LOSSLESS_AUDIO);
    push_args(&mut args, &["-shortest", "-t"]);
    args.push(format_time(duration));
    push_args(&mut args, &["-y"]);
    args.push(output_path.display().to_string());

    ExternalCommand::new("ffmpeg", args)
}

/// Estimated character budget per title line given the font size and the
/// horizontal placement.
fn max_chars_per_line(title: &TitleSpec) -> usize {
    let max_width = match title.x {
        Coord::Center => 1720, // 1920 minus 100 on each side
        Coord::Pixels(x) => (1920 - 2 * x).max(200),
    };
    let avg_char_width = f64::from(title.size) * 0.7;
    (max_width as f64 / avg_char_width).floor() as usize
}

/// Greedy word wrap; text that already contains line breaks is kept as-is.
fn wrap_text(text: &str, max_chars_per_line: usize) -> String {
    if text.lines().count() > 1 {
        return text.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            word.len()
        } else {
            current.len() + 1 + word.len()
        };

        if candidate_len <= max_chars_per_line || current.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// Escape characters that carry meaning inside a quoted drawtext value.
fn escape_drawtext(text: &str) -> String {
    text.replace('\'', "'\\\\''").replace(':', "\\:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_splits_on_the_character_budget() {
        let wrapped = wrap_text("one two three four five", 9);
        assert_eq!(wrapped, "one two\nthree\nfour five");
    }

    #[test]
    fn wrap_keeps_preformatted_text() {
        let text = "already\nwrapped";
        assert_eq!(wrap_text(text, 3), text);
    }

    #[test]
    fn wrap_never_drops_an_overlong_word() {
        assert_eq!(wrap_text("extraordinary", 5), "extraordinary");
    }

    #[test]
    fn drawtext_escaping_handles_quotes_and_colons() {
        assert_eq!(escape_drawtext("it's 10:30"), "it'\\\\''s 10\\:30");
    }
}
