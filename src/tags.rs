//! Tag reading via `lofty`, plus the audio directory scan used by `import`.
//!
//! All functions are synchronous. Async callers use `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use lofty::config::{ParseOptions, ParsingMode};
use lofty::file::{FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag, TagType};

use crate::camelot::{self, CamelotCode};
use crate::error::MatchError;
use crate::genre;
use crate::index::MetadataFallback;
use crate::normalize::split_artists;
use crate::types::{Track, TrackMetadata};

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    /// lofty open/read failures.
    #[error("{0}")]
    Io(String),
    /// No tags found in file.
    #[error("No tags found in file")]
    NoTags,
    /// Track has no file to read tags from.
    #[error("Track {0} has no file path")]
    NoPath(i64),
    #[error("Invalid glob pattern \"{pattern}\": {reason}")]
    InvalidGlob { pattern: String, reason: String },
    #[error("Not a directory: {0}")]
    NotADirectory(String),
}

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "aiff", "aif", "m4a", "ogg"];

const MAX_ENERGY: u8 = 10;

fn parse_options() -> ParseOptions {
    ParseOptions::new()
        .read_cover_art(false)
        .parsing_mode(ParsingMode::BestAttempt)
}

fn tag_string(tag: &Tag, key: ItemKey) -> Option<String> {
    tag.get_string(&key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `IntegerBpm` first, then the free-form `Bpm` frame. Non-positive values are dropped.
fn tag_bpm(tag: &Tag) -> Option<f64> {
    [ItemKey::IntegerBpm, ItemKey::Bpm]
        .into_iter()
        .filter_map(|key| tag_string(tag, key))
        .filter_map(|raw| raw.replace(',', ".").parse::<f64>().ok())
        .find(|bpm| bpm.is_finite() && *bpm > 0.0)
}

/// Camelot code and energy embedded in a comment, as written by key
/// detection tools: `"8A - Energy 6"`, `"08A - 6"`, or a bare `"Energy 6"`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommentPayload {
    pub camelot_code: Option<CamelotCode>,
    pub energy: Option<u8>,
}

pub fn parse_comment_payload(comment: &str) -> CommentPayload {
    let comment = comment.trim();
    let mut payload = CommentPayload::default();

    let (head, rest) = match comment.split_once(" - ") {
        Some((head, rest)) => (head.trim(), Some(rest.trim())),
        None => (comment, None),
    };
    payload.camelot_code = head.parse().ok();

    let lower = comment.to_ascii_lowercase();
    let energy_digits = match lower.find("energy") {
        Some(pos) => Some(&comment[pos + "energy".len()..]),
        None if payload.camelot_code.is_some() => rest,
        None => None,
    };
    payload.energy = energy_digits.and_then(leading_energy);
    payload
}

fn leading_energy(text: &str) -> Option<u8> {
    let text = text.trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '=');
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    digits
        .parse::<u8>()
        .ok()
        .filter(|e| (1..=MAX_ENERGY).contains(e))
}

/// Read matching metadata from an audio file's tags.
pub fn read_track_metadata(path: &Path) -> Result<TrackMetadata, TagError> {
    let tagged_file = Probe::open(path)
        .and_then(|p| p.options(parse_options()).read())
        .map_err(|e| TagError::Io(format!("{}: {e}", path.display())))?;

    // WAV carries ID3v2 alongside RIFF INFO; the ID3v2 layer has the DJ fields.
    let tag = match tagged_file.file_type() {
        FileType::Wav => tagged_file.tag(TagType::Id3v2),
        _ => None,
    }
    .or_else(|| tagged_file.primary_tag())
    .or_else(|| tagged_file.first_tag())
    .ok_or(TagError::NoTags)?;

    Ok(metadata_from_tag(tag))
}

fn metadata_from_tag(tag: &Tag) -> TrackMetadata {
    let comment = tag_string(tag, ItemKey::Comment);
    let payload = comment
        .as_deref()
        .map(parse_comment_payload)
        .unwrap_or_default();
    let raw_key = tag_string(tag, ItemKey::InitialKey);
    let camelot_code = raw_key
        .as_deref()
        .and_then(camelot::key_to_camelot)
        .or(payload.camelot_code);

    TrackMetadata {
        title: tag_string(tag, ItemKey::TrackTitle),
        artists: tag_string(tag, ItemKey::TrackArtist)
            .map(|a| split_artists(&a))
            .unwrap_or_default(),
        remixers: tag_string(tag, ItemKey::Remixer)
            .map(|r| split_artists(&r))
            .unwrap_or_default(),
        bpm: tag_bpm(tag),
        key: raw_key
            .as_deref()
            .map(|k| camelot::canonical_key(k).unwrap_or_else(|| k.to_string())),
        camelot_code,
        genre: tag_string(tag, ItemKey::Genre).and_then(|g| genre::tidy_genre(&g)),
        label: tag_string(tag, ItemKey::Label),
        energy: payload.energy,
        comment,
    }
}

/// Build an importable track from a file: tags, file path, and the file's
/// modification time as `date_added`. Files without a title fall back to
/// their file stem.
pub fn track_from_file(path: &Path) -> Result<Track, TagError> {
    let meta = read_track_metadata(path)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let mut track = Track::new(0, meta.title.clone().unwrap_or(stem));
    track.fill_missing_from(meta);
    track.file_path = Some(path.display().to_string());
    track.date_added = file_mtime(path);
    Ok(track)
}

fn file_mtime(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let secs = modified.duration_since(UNIX_EPOCH).ok()?.as_secs();
    i64::try_from(secs).ok()
}

/// Re-reads a track's own file when its stored record cannot be matched.
pub struct TagFallback;

impl MetadataFallback for TagFallback {
    fn regenerate(&self, track: &Track) -> Result<TrackMetadata, MatchError> {
        let path = track.file_path.as_deref().ok_or(TagError::NoPath(track.id))?;
        Ok(read_track_metadata(Path::new(path))?)
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Scan a directory for audio files, optionally recursive, with optional
/// glob filter on the file name. Sorted.
pub fn scan_audio_directory(
    dir: &Path,
    recursive: bool,
    glob_pattern: Option<&str>,
) -> Result<Vec<PathBuf>, MatchError> {
    if !dir.is_dir() {
        return Err(TagError::NotADirectory(dir.display().to_string()).into());
    }

    let glob_matcher = match glob_pattern {
        Some(pattern) => {
            let glob = globset::GlobBuilder::new(pattern)
                .literal_separator(true)
                .case_insensitive(true)
                .build()
                .map_err(|e| TagError::InvalidGlob {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            Some(glob.compile_matcher())
        }
        None => None,
    };

    let mut files = Vec::new();
    let mut dirs_to_scan = vec![dir.to_path_buf()];

    while let Some(current_dir) = dirs_to_scan.pop() {
        for entry in std::fs::read_dir(&current_dir)? {
            let path = entry?.path();

            if path.is_dir() {
                if recursive {
                    dirs_to_scan.push(path);
                }
                continue;
            }
            if !path.is_file() || !is_audio_file(&path) {
                continue;
            }
            if let Some(ref matcher) = glob_matcher {
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !matcher.is_match(file_name) {
                    continue;
                }
            }
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_payload_variants() {
        let p = parse_comment_payload("8A - Energy 6");
        assert_eq!(p.camelot_code, "08A".parse().ok());
        assert_eq!(p.energy, Some(6));

        let p = parse_comment_payload("11B - 7");
        assert_eq!(p.camelot_code, "11B".parse().ok());
        assert_eq!(p.energy, Some(7));

        let p = parse_comment_payload("Energy: 10, great closer");
        assert_eq!(p.camelot_code, None);
        assert_eq!(p.energy, Some(10));

        let p = parse_comment_payload("Ripped from vinyl - 2004");
        assert_eq!(p, CommentPayload::default());

        assert_eq!(parse_comment_payload("8A - Energy 42").energy, None);
        assert_eq!(parse_comment_payload("").energy, None);
    }

    #[test]
    fn audio_extension_check() {
        assert!(is_audio_file(Path::new("/m/a.FLAC")));
        assert!(is_audio_file(Path::new("/m/a.aif")));
        assert!(!is_audio_file(Path::new("/m/a.txt")));
        assert!(!is_audio_file(Path::new("/m/noext")));
    }

    #[test]
    fn scan_filters_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        for name in ["b.mp3", "a.flac", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::write(nested.join("c.wav"), b"").unwrap();

        let flat = scan_audio_directory(dir.path(), false, None).unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.flac", "b.mp3"]);

        let deep = scan_audio_directory(dir.path(), true, None).unwrap();
        assert_eq!(deep.len(), 3);

        let globbed = scan_audio_directory(dir.path(), true, Some("*.MP3")).unwrap();
        assert_eq!(globbed.len(), 1);
    }

    #[test]
    fn scan_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.mp3");
        std::fs::write(&file, b"").unwrap();
        assert!(matches!(
            scan_audio_directory(&file, true, None),
            Err(MatchError::Tag(TagError::NotADirectory(_)))
        ));
        assert!(matches!(
            scan_audio_directory(dir.path(), true, Some("[")),
            Err(MatchError::Tag(TagError::InvalidGlob { .. }))
        ));
    }

    #[test]
    fn unreadable_files_error_instead_of_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("junk.mp3");
        std::fs::write(&junk, b"definitely not audio").unwrap();
        assert!(read_track_metadata(&junk).is_err());
        assert!(read_track_metadata(&dir.path().join("missing.flac")).is_err());
        assert!(track_from_file(&junk).is_err());
    }

    #[test]
    fn fallback_needs_a_path() {
        let track = Track::new(9, "Pathless");
        let err = TagFallback.regenerate(&track).unwrap_err();
        assert!(matches!(err, MatchError::Tag(TagError::NoPath(9))));
    }

    #[test]
    fn tag_fields_map_to_metadata() {
        let mut tag = Tag::new(TagType::Id3v2);
        tag.insert_text(ItemKey::TrackTitle, "Archangel".into());
        tag.insert_text(ItemKey::TrackArtist, "Burial feat. Kode9".into());
        tag.insert_text(ItemKey::IntegerBpm, "139".into());
        tag.insert_text(ItemKey::InitialKey, "Am".into());
        tag.insert_text(ItemKey::Genre, "uk bass".into());
        tag.insert_text(ItemKey::Label, "Hyperdub".into());
        tag.insert_text(ItemKey::Comment, "8A - Energy 5".into());

        let meta = metadata_from_tag(&tag);
        assert_eq!(meta.title.as_deref(), Some("Archangel"));
        assert_eq!(meta.artists, vec!["Burial", "Kode9"]);
        assert_eq!(meta.bpm, Some(139.0));
        assert_eq!(meta.key.as_deref(), Some("am"));
        assert_eq!(meta.camelot_code, "08A".parse().ok());
        assert_eq!(meta.genre.as_deref(), Some("UK Bass"));
        assert_eq!(meta.label.as_deref(), Some("Hyperdub"));
        assert_eq!(meta.energy, Some(5));
    }

    #[test]
    fn comment_code_fills_a_missing_key() {
        let mut tag = Tag::new(TagType::Id3v2);
        tag.insert_text(ItemKey::Comment, "3B - Energy 8".into());
        tag.insert_text(ItemKey::Bpm, "0".into());
        let meta = metadata_from_tag(&tag);
        assert_eq!(meta.key, None);
        assert_eq!(meta.camelot_code, "03B".parse().ok());
        assert_eq!(meta.bpm, None);
    }
}
