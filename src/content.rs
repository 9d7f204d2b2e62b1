//! Recognized content file extensions.
//!
//! Each file under an episode's `content/` directory becomes one segment;
//! the extension decides which exporter turns it into a normalized clip.

pub const VIDEO: &[&str] = &["mp4", "webm", "mov"];
pub const AUDIO: &[&str] = &["mp3", "wav", "m4a", "aac", "aiff", "flac"];
pub const IMAGE: &[&str] = &["gif", "jpg", "jpeg", "png", "tiff"];
pub const DEMOTAPE: &[&str] = &["tape"];

/// All extensions that may appear as segment content.
pub fn all() -> Vec<&'static str> {
    let mut exts = Vec::new();
    exts.extend_from_slice(VIDEO);
    exts.extend_from_slice(IMAGE);
    exts.extend_from_slice(DEMOTAPE);
    exts
}

pub fn is_video(ext: &str) -> bool {
    VIDEO.contains(&ext)
}

pub fn is_image(ext: &str) -> bool {
    IMAGE.contains(&ext)
}

pub fn is_demotape(ext: &str) -> bool {
    DEMOTAPE.contains(&ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_covers_every_segment_kind() {
        let all = all();
        assert!(all.contains(&"mp4"));
        assert!(all.contains(&"png"));
        assert!(all.contains(&"tape"));
        assert!(!all.contains(&"mp3"));
    }
}
