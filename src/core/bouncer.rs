// FILE: src/core/bouncer.rs
//! The Bouncer: decides which files on disk are songs and which are noise.
//!
//! Noise is defined as:
//! 1. Hidden files (start with .)
//! 2. Backup files (end with ~)
//! 3. Known OS metadata files (Thumbs.db, desktop.ini)
//! 4. In-flight downloads and editor temp files

use std::path::Path;

const IGNORED_EXACT: &[&str] = &[
    "thumbs.db",
    "ehthumbs.db",
    "desktop.ini",
    "icon?",
    "autorun.inf",
    "$recycle.bin",
    "system volume information",
];

const IGNORED_EXTENSIONS: &[&str] = &[
    "swp", "tmp", "bak", "ds_store", "part", "partial", "crdownload", "download",
];

const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "mp2", "flac", "ogg", "oga", "opus", "spx", "m4a", "m4b", "mp4", "aac",
    "wav", "aif", "aiff", "wv", "ape", "mpc", "wma", "asf", "mod", "xm", "it", "s3m",
];

pub struct Bouncer;

impl Bouncer {
    /// Decides if a file name is "System Noise".
    pub fn is_noise(name: &str) -> bool {
        let name_lower = name.to_lowercase();

        if name.starts_with('.') || name.ends_with('~') {
            return true;
        }

        if IGNORED_EXACT.contains(&name_lower.as_str()) {
            return true;
        }

        match Self::extension(&name_lower) {
            Some(ext) => IGNORED_EXTENSIONS.contains(&ext),
            None => false,
        }
    }

    /// True if the path looks like a playable media file worth cataloguing.
    pub fn is_media(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if Self::is_noise(name) {
            return false;
        }
        let name_lower = name.to_lowercase();
        Self::extension(&name_lower).map_or(false, |ext| MEDIA_EXTENSIONS.contains(&ext))
    }

    // We scan from the *last* dot.
    fn extension(name_lower: &str) -> Option<&str> {
        let idx = name_lower.rfind('.')?;
        if idx + 1 < name_lower.len() {
            Some(&name_lower[idx + 1..])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise() {
        assert!(Bouncer::is_noise(".hidden.mp3"));
        assert!(Bouncer::is_noise("song.mp3~"));
        assert!(Bouncer::is_noise("Thumbs.db"));
        assert!(Bouncer::is_noise("song.mp3.part"));
        assert!(!Bouncer::is_noise("song.mp3"));
    }

    #[test]
    fn test_media() {
        assert!(Bouncer::is_media(Path::new("/music/a.MP3")));
        assert!(Bouncer::is_media(Path::new("/music/b.flac")));
        assert!(!Bouncer::is_media(Path::new("/music/cover.jpg")));
        assert!(!Bouncer::is_media(Path::new("/music/.a.mp3")));
        assert!(!Bouncer::is_media(Path::new("/music/noext")));
    }
}
