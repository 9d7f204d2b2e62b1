use std::path::{Path, PathBuf};

use crate::assets::Sound;
use crate::ffmpeg::compiler::episode::{
    BacktrackSpec, ClipInfo, FinalMergeInput, WatermarkSpec, compile_final_merge,
};
use crate::ffmpeg::compiler::scene::{
    Coord, IntroScene, LogoSpec, OutroScene, SceneBackground, TitleSpec, compile_intro,
    compile_outro,
};
use crate::ffmpeg::compiler::segment::{SegmentMergeInput, compile_segment_merge};
use crate::ffmpeg::compiler::{AnimationKind, ResolvedCallout};

fn filter_complex(args: &[String]) -> &str {
    let index = args
        .iter()
        .position(|arg| arg == "-filter_complex")
        .expect("filter_complex present");
    &args[index + 1]
}

fn sound(path: &str, volume: f64) -> Sound {
    Sound {
        path: PathBuf::from(path),
        volume,
    }
}

fn callout(starts_at: f64, duration: f64) -> ResolvedCallout {
    ResolvedCallout {
        image_path: PathBuf::from("callouts/001-0.png"),
        width: 300,
        height: 120,
        starts_at,
        duration,
        x: 810,
        y: 860,
        animation: AnimationKind::Fade,
        animation_duration: 0.2,
        in_sound: sound("in.wav", 0.8),
        out_sound: sound("out.wav", 0.6),
    }
}

fn segment_input<'a>(callouts: &'a [ResolvedCallout]) -> SegmentMergeInput<'a> {
    SegmentMergeInput {
        video_path: Path::new("videos/001.mp4"),
        voiceover_path: Path::new("voiceovers/001.flac"),
        output_path: Path::new("segments/001.mp4"),
        video_duration: 10.0,
        audio_duration: 8.0,
        crossfade_duration: 0.5,
        callouts,
    }
}

#[test]
fn segment_merge_without_callouts_maps_padded_video_and_voiceover() {
    let command = compile_segment_merge(&segment_input(&[]));
    assert_eq!(command.program, "ffmpeg");

    let filters = filter_complex(&command.args);
    // final 10.5s, video pad 0.5s, audio pad 2.5s * 44100
    assert!(filters.contains("[0:v]tpad=stop_mode=clone:stop_duration=0.500000[v0]"));
    assert!(filters.contains("[1:a]amix=inputs=1:duration=longest:normalize=0[mixed_audio]"));
    assert!(filters.contains("apad=pad_len=110250[a]"));

    let map_index = command.args.iter().position(|a| a == "-map").unwrap();
    assert_eq!(command.args[map_index + 1], "[v0]");
    assert_eq!(command.args.last().unwrap(), "segments/001.mp4");
}

#[test]
fn segment_merge_threads_video_labels_through_each_callout() {
    let callouts = vec![callout(2.0, 3.0), callout(6.0, 2.5)];
    let command = compile_segment_merge(&segment_input(&callouts));
    let filters = filter_complex(&command.args);

    // Two callouts: v0 -> v1 -> v2, mapped output is the last label.
    assert!(filters.contains("[v0][callout0_delayed]overlay=x=810:y=860[v1]"));
    assert!(filters.contains("[v1][callout1_delayed]overlay=x=810:y=860[v2]"));
    let map_index = command.args.iter().position(|a| a == "-map").unwrap();
    assert_eq!(command.args[map_index + 1], "[v2]");
}

#[test]
fn segment_merge_allocates_three_input_streams_per_callout() {
    let callouts = vec![callout(2.0, 3.0), callout(6.0, 2.5)];
    let command = compile_segment_merge(&segment_input(&callouts));
    let filters = filter_complex(&command.args);

    // Callout 0 occupies streams 2..4, callout 1 streams 5..7.
    assert!(filters.contains("[2:v]scale=300:120"));
    assert!(filters.contains("[3:a]volume=0.800000,adelay=2000|2000[in_0]"));
    assert!(filters.contains("[4:a]volume=0.600000,adelay=4800|4800[out_0]"));
    assert!(filters.contains("[5:v]scale=300:120"));
    assert!(filters.contains("[6:a]volume=0.800000,adelay=6000|6000[in_1]"));

    // Voiceover plus two sound branches per callout.
    assert!(filters.contains(
        "[1:a][in_0][out_0][in_1][out_1]amix=inputs=5:duration=longest:normalize=0[mixed_audio]"
    ));
}

#[test]
fn segment_merge_uses_lossless_intermediate_codecs() {
    let command = compile_segment_merge(&segment_input(&[]));
    let args = &command.args;
    let position = |needle: &str| args.iter().position(|a| a == needle);

    assert!(position("-crf").is_some());
    assert_eq!(args[position("-crf").unwrap() + 1], "0");
    assert_eq!(args[position("-pix_fmt").unwrap() + 1], "yuv444p");
    assert_eq!(args[position("-c:a").unwrap() + 1], "flac");
}

#[test]
fn fade_animation_keeps_fade_out_inside_the_clip() {
    let callouts = vec![callout(8.0, 2.5)];
    let mut input = segment_input(&callouts);
    input.video_duration = 10.0;
    let command = compile_segment_merge(&input);
    let filters = filter_complex(&command.args);

    // ends_at 10.5 exceeds the 10s clip, so the fade-out window shrinks
    // by 0.1s: callout duration 2.4, fade-out start 2.2.
    assert!(filters.contains("fade=t=out:st=2.200000:d=0.200000:alpha=1[callout0_faded]"));
}

#[test]
fn slide_animation_builds_disjoint_enable_windows() {
    let mut slide_callout = callout(2.0, 3.0);
    slide_callout.animation = AnimationKind::Slide;
    let callouts = vec![slide_callout];
    let command = compile_segment_merge(&segment_input(&callouts));
    let filters = filter_complex(&command.args);

    assert!(filters.contains("split=3[callout0_blur_in][callout0_sharp][callout0_blur_out]"));
    assert!(filters.contains("enable='between(t,2.000000,2.200000)'[v1_in]"));
    assert!(filters.contains("enable='between(t,2.200000,4.800000)'[v1_hold]"));
    assert!(filters.contains("enable='between(t,4.800000,5.000000)'[v1]"));
}

fn clip(path: &str, duration: f64, fps: f64) -> ClipInfo {
    ClipInfo {
        path: PathBuf::from(path),
        duration,
        fps,
    }
}

fn final_input<'a>(clips: &'a [ClipInfo], output: &'a Path) -> FinalMergeInput<'a> {
    FinalMergeInput {
        clips,
        watermark: WatermarkSpec {
            path: PathBuf::from("watermark.png"),
            x: 1600,
            y: 940,
            opacity: 0.1,
        },
        backtrack: BacktrackSpec {
            path: PathBuf::from("backtrack.mp3"),
            full_volume: 0.4,
            ducked_volume: 0.375,
        },
        crossfade_duration: 1.0,
        output_path: output,
    }
}

#[test]
fn final_merge_chains_xfades_at_accumulated_offsets() {
    let clips = vec![
        clip("scenes/intro.mp4", 10.0, 24.0),
        clip("segments/001.mp4", 10.0, 24.0),
        clip("segments/002.mp4", 10.0, 24.0),
        clip("scenes/outro.mp4", 10.0, 24.0),
    ];
    let output = PathBuf::from("episode.mp4");
    let command = compile_final_merge(&final_input(&clips, &output)).unwrap();
    let filters = filter_complex(&command.args);

    assert!(filters.contains(
        "[v0][v1]xfade=transition=fade:duration=1.000000:offset=9.000000[vx0]"
    ));
    assert!(filters.contains(
        "[vx0][v2]xfade=transition=fade:duration=1.000000:offset=18.000000[vx1]"
    ));
    assert!(filters.contains(
        "[vx1_padded][v3]xfade=transition=fade:duration=1.000000:offset=27.000000[vfinal]"
    ));

    // Audio branches delayed to the same junctions.
    assert!(filters.contains("[1:a]adelay=9000|9000[a1]"));
    assert!(filters.contains("[2:a]adelay=18000|18000[a2]"));
    assert!(filters.contains("[3:a]adelay=27000|27000[a3]"));
}

#[test]
fn final_merge_pads_the_clip_feeding_the_last_crossfade() {
    let clips = vec![
        clip("scenes/intro.mp4", 10.0, 24.0),
        clip("segments/001.mp4", 10.0, 24.0),
        clip("scenes/outro.mp4", 10.0, 24.0),
    ];
    let output = PathBuf::from("episode.mp4");
    let command = compile_final_merge(&final_input(&clips, &output)).unwrap();
    let filters = filter_complex(&command.args);

    // offset at the last junction is 18, so the pad runs to 19s.
    assert!(filters.contains(
        "[vx0_watermarked]tpad=stop_mode=clone:stop_duration=19.000000[vx0_padded]"
    ));
}

#[test]
fn final_merge_watermarks_exactly_the_segment_region() {
    let clips = vec![
        clip("scenes/intro.mp4", 10.0, 24.0),
        clip("segments/001.mp4", 10.0, 24.0),
        clip("segments/002.mp4", 10.0, 24.0),
        clip("scenes/outro.mp4", 10.0, 24.0),
    ];
    let output = PathBuf::from("episode.mp4");
    let command = compile_final_merge(&final_input(&clips, &output)).unwrap();
    let filters = filter_complex(&command.args);

    // Watermark still is input 4 (after the four clips), backtrack 5.
    assert!(filters.contains(
        "[4:v]scale=iw*0.5:ih*0.5,format=rgba,colorchannelmixer=aa=0.100000[watermark]"
    ));
    // Segment region: watermark_start = 10 - 1 = 9, end = 9 + 18 = 27.
    assert!(filters.contains(
        "[vx1][watermark]overlay=1600:940:enable='between(t,9.000000,27.000000)'[vx1_watermarked]"
    ));
}

#[test]
fn final_merge_normalizes_clips_with_nonstandard_frame_rates() {
    let clips = vec![
        clip("scenes/intro.mp4", 10.0, 24.0),
        clip("segments/001.mp4", 10.0, 30.0), // 12.5s once retimed to 24
        clip("scenes/outro.mp4", 10.0, 24.0),
    ];
    let output = PathBuf::from("episode.mp4");
    let command = compile_final_merge(&final_input(&clips, &output)).unwrap();
    let filters = filter_complex(&command.args);

    assert!(filters.contains("[1:v]fps=24,setpts=PTS-STARTPTS[v1]"));
    // Second junction offset: 9 + (12.5 - 1) = 20.5.
    assert!(filters.contains("offset=20.500000[vfinal]"));
}

#[test]
fn final_merge_builds_the_backtrack_envelope() {
    let clips = vec![
        clip("scenes/intro.mp4", 10.0, 24.0),
        clip("segments/001.mp4", 10.0, 24.0),
        clip("segments/002.mp4", 10.0, 24.0),
        clip("scenes/outro.mp4", 10.0, 24.0),
    ];
    let output = PathBuf::from("episode.mp4");
    let command = compile_final_merge(&final_input(&clips, &output)).unwrap();
    let filters = filter_complex(&command.args);

    // Duck across the intro boundary (10s): 9.25 -> 10.25. Fade out
    // across the last-segment boundary (27s): 25.875 -> 27.375.
    assert!(filters.contains("if(lt(t,9.250000),0.400000"));
    assert!(filters.contains("(0.400000-0.375000)*(t-9.250000)/1.000000"));
    assert!(filters.contains("if(lt(t,25.875000),0.375000"));
    assert!(filters.contains("0.375000*(27.375000-t)/1.500000,0"));
    assert!(filters.contains(":eval=frame[backtrack_faded]"));
    assert!(
        filters.contains("[mixed][backtrack_faded]amix=inputs=2:duration=first:normalize=0[afinal]")
    );
}

#[test]
fn final_merge_mixes_one_audio_branch_per_clip() {
    let clips = vec![
        clip("scenes/intro.mp4", 10.0, 24.0),
        clip("segments/001.mp4", 10.0, 24.0),
        clip("scenes/outro.mp4", 10.0, 24.0),
    ];
    let output = PathBuf::from("episode.mp4");
    let command = compile_final_merge(&final_input(&clips, &output)).unwrap();
    let filters = filter_complex(&command.args);

    assert!(filters.contains("[a0][a1][a2]amix=inputs=3:duration=longest:normalize=0[mixed]"));
}

#[test]
fn final_merge_rejects_a_single_clip() {
    let clips = vec![clip("scenes/intro.mp4", 10.0, 24.0)];
    let output = PathBuf::from("episode.mp4");
    assert!(compile_final_merge(&final_input(&clips, &output)).is_err());
}

fn intro_scene() -> IntroScene {
    IntroScene {
        duration: 5.0,
        background: SceneBackground::Color("0x112233".to_string()),
        fade_in: 0.5,
        fade_out: 0.5,
        logo: Some(LogoSpec {
            path: PathBuf::from("logo.png"),
            width: 350,
            x: Coord::Center,
            y: Coord::Pixels(200),
        }),
        title: Some(TitleSpec {
            text: "Writing a Parser".to_string(),
            x: Coord::Center,
            y: Coord::Center,
            size: 72,
            color: "white".to_string(),
            font_path: PathBuf::from("fonts/title.ttf"),
        }),
        sound: Some(sound("intro.wav", 0.9)),
    }
}

#[test]
fn intro_layers_background_logo_and_title() {
    let command = compile_intro(&intro_scene(), Path::new("scenes/intro.mp4"));
    let filters = filter_complex(&command.args);

    assert!(command.args.iter().any(|a| a.starts_with("color=c=0x112233")));
    assert!(filters.contains("[1:v]scale=350:-1:flags=lanczos[logo]"));
    assert!(filters.contains("[bg][logo]overlay=(W-w)/2:200[with_logo]"));
    assert!(filters.contains("drawtext=text='Writing a Parser'"));
    assert!(filters.contains("text_align=center"));
    assert!(filters.contains("fade=t=out:st=4.400000:d=0.500000:c=0x112233"));
    assert_eq!(command.args.last().unwrap(), "scenes/intro.mp4");
}

#[test]
fn intro_without_sound_skips_the_audio_map() {
    let mut scene = intro_scene();
    scene.sound = None;
    let command = compile_intro(&scene, Path::new("scenes/intro.mp4"));

    let maps: Vec<&String> = command
        .args
        .iter()
        .enumerate()
        .filter(|(_, a)| *a == "-map")
        .map(|(i, _)| &command.args[i + 1])
        .collect();
    assert_eq!(maps, vec!["[fade]"]);
    assert!(!command.args.iter().any(|a| a == "aac"));
}

#[test]
fn outro_without_sound_synthesizes_silence() {
    let scene = OutroScene {
        duration: 4.0,
        background: SceneBackground::Color("black".to_string()),
        fade_in: 0.5,
        fade_out: 0.5,
        logo: LogoSpec {
            path: PathBuf::from("logo.png"),
            width: 350,
            x: Coord::Center,
            y: Coord::Center,
        },
        sound: None,
    };
    let command = compile_outro(&scene, Path::new("scenes/outro.mp4"));
    let filters = filter_complex(&command.args);

    assert!(filters.contains("anullsrc=r=44100:cl=mono,atrim=end=4.000000[a]"));
    assert!(filters.contains("fade=t=in:st=0.500000"));
}

#[test]
fn outro_sound_is_delayed_behind_the_logo() {
    let scene = OutroScene {
        duration: 4.0,
        background: SceneBackground::Color("black".to_string()),
        fade_in: 0.5,
        fade_out: 0.5,
        logo: LogoSpec {
            path: PathBuf::from("logo.png"),
            width: 350,
            x: Coord::Center,
            y: Coord::Center,
        },
        sound: Some(sound("sting.wav", 1.0)),
    };
    let command = compile_outro(&scene, Path::new("scenes/outro.mp4"));
    let filters = filter_complex(&command.args);

    assert!(filters.contains("[2:a]adelay=500|500,apad,atrim=end=4.000000"));
}
