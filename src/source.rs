//! Track source resolution.
//!
//! A playlist's configured path may be a folder of audio files or a single
//! file. Expansion filters to supported audio extensions and sorts folder
//! contents naturally ("track2" before "track10"). Misconfigured or
//! unreadable sources resolve to an empty list rather than an error so one
//! bad playlist never blocks the rest of the day's rotation.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Supported audio extensions (case-insensitive).
const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac", "aac"];

/// Check whether a path has a supported audio extension.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = e.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Expand a configured source path into an ordered list of playable tracks.
///
/// - Directory: immediate children with supported extensions, naturally
///   sorted by filename.
/// - Single file with a supported extension: one-element list.
/// - Anything else (missing, unsupported, permission error): empty list.
pub fn expand_source(path: &Path) -> Vec<PathBuf> {
    match try_expand(path) {
        Ok(files) => files,
        Err(e) => {
            tracing::debug!("{}", e);
            Vec::new()
        }
    }
}

fn try_expand(path: &Path) -> Result<Vec<PathBuf>> {
    // An unconfigured slot is normal, not a broken source
    if path.as_os_str().is_empty() {
        return Ok(Vec::new());
    }

    if path.is_dir() {
        return Ok(folder_audio_files(path));
    }

    if path.is_file() && is_audio_file(path) {
        return Ok(vec![path.to_path_buf()]);
    }

    Err(Error::source(path))
}

/// List audio files directly inside a folder, naturally sorted.
fn folder_audio_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_audio_file(p))
        .collect();

    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    files
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// One run of a filename: either a digit run (compared numerically) or a
/// text run (compared case-insensitively).
#[derive(Debug, PartialEq, Eq)]
enum NaturalPart {
    Number(u64),
    Text(String),
}

/// Split a name into alternating text and digit runs.
fn natural_key(name: &str) -> Vec<NaturalPart> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = None;

    for ch in name.chars() {
        let is_digit = ch.is_ascii_digit();
        if current_is_digit != Some(is_digit) && !current.is_empty() {
            parts.push(finish_part(&current, current_is_digit == Some(true)));
            current.clear();
        }
        current_is_digit = Some(is_digit);
        current.push(ch);
    }
    if !current.is_empty() {
        parts.push(finish_part(&current, current_is_digit == Some(true)));
    }
    parts
}

fn finish_part(run: &str, is_digit: bool) -> NaturalPart {
    if is_digit {
        // A pathologically long digit run overflows u64; fall back to text
        match run.parse::<u64>() {
            Ok(n) => NaturalPart::Number(n),
            Err(_) => NaturalPart::Text(run.to_string()),
        }
    } else {
        NaturalPart::Text(run.to_lowercase())
    }
}

/// Compare two filenames naturally: digit runs numerically, text runs
/// case-insensitively, numbers before text when the run kinds differ.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ka = natural_key(a);
    let kb = natural_key(b);

    for (pa, pb) in ka.iter().zip(kb.iter()) {
        let ord = match (pa, pb) {
            (NaturalPart::Number(x), NaturalPart::Number(y)) => x.cmp(y),
            (NaturalPart::Text(x), NaturalPart::Text(y)) => x.cmp(y),
            (NaturalPart::Number(_), NaturalPart::Text(_)) => Ordering::Less,
            (NaturalPart::Text(_), NaturalPart::Number(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ka.len().cmp(&kb.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_natural_order() {
        let mut names = vec!["track10.mp3", "track2.mp3", "track1.mp3"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["track1.mp3", "track2.mp3", "track10.mp3"]);
    }

    #[test]
    fn test_natural_order_mixed_case() {
        let mut names = vec!["B-side.mp3", "a-side.mp3"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["a-side.mp3", "B-side.mp3"]);
    }

    #[test]
    fn test_expand_folder_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        File::create(root.join("track10.mp3")).unwrap();
        File::create(root.join("track2.mp3")).unwrap();
        File::create(root.join("track1.mp3")).unwrap();
        File::create(root.join("notes.txt")).unwrap(); // ignored
        File::create(root.join("cover.png")).unwrap(); // ignored
        File::create(root.join("LOUD.OGG")).unwrap(); // found (case-insensitive)

        // Nested files are not part of a flat playlist folder
        let sub = root.join("extras");
        std::fs::create_dir(&sub).unwrap();
        File::create(sub.join("hidden.mp3")).unwrap();

        let files = expand_source(root);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["LOUD.OGG", "track1.mp3", "track2.mp3", "track10.mp3"]);
    }

    #[test]
    fn test_expand_single_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("focus.m4a");
        File::create(&file).unwrap();

        assert_eq!(expand_source(&file), vec![file]);
    }

    #[test]
    fn test_expand_unsupported_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("readme.txt");
        File::create(&file).unwrap();

        assert!(expand_source(&file).is_empty());
    }

    #[test]
    fn test_expand_missing_path() {
        assert!(expand_source(Path::new("/no/such/place")).is_empty());
        assert!(expand_source(Path::new("")).is_empty());
    }
}
