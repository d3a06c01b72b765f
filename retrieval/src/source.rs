//! Listing audio files to ingest.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::IngestConfig;
use crate::error::{Result, RetrievalError};

/// One audio file waiting to be ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioItem {
    /// Identifier the record will be stored under.
    pub identifier: String,

    /// File to decode.
    pub path: PathBuf,
}

impl AudioItem {
    /// Item identified by its path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            identifier: path.display().to_string(),
            path,
        }
    }
}

/// List the audio files in `dir` that `config` selects, sorted by path.
pub fn list_audio_files(dir: &Path, config: &IngestConfig) -> Result<Vec<AudioItem>> {
    if !dir.is_dir() {
        return Err(RetrievalError::Source(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    let max_depth = if config.recursive {
        config.max_depth.unwrap_or(usize::MAX)
    } else {
        1
    };

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| config.process_hidden || entry.depth() == 0 || !is_hidden(entry));

    let mut items = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(RetrievalError::Source(format!(
                    "cannot read {}: {e}",
                    dir.display()
                )));
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {e}", dir.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if has_wanted_extension(entry.path(), &config.extensions) {
            items.push(AudioItem::from_path(entry.path()));
        }
    }

    items.sort_by(|a, b| a.path.as_path().cmp(b.path.as_path()));
    debug!("Found {} audio files in {}", items.len(), dir.display());
    Ok(items)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn has_wanted_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn names(items: &[AudioItem]) -> Vec<String> {
        items
            .iter()
            .map(|i| i.path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_lists_wav_files_only() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.wav"), b"").unwrap();
        fs::write(temp_dir.path().join("a.WAV"), b"").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"").unwrap();
        fs::write(temp_dir.path().join(".hidden.wav"), b"").unwrap();

        let items = list_audio_files(temp_dir.path(), &IngestConfig::default()).unwrap();
        assert_eq!(names(&items), vec!["a.WAV", "b.wav"]);
        assert_eq!(
            items[0].identifier,
            temp_dir.path().join("a.WAV").display().to_string()
        );
    }

    #[test]
    fn test_recursion_is_opt_in() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("speaker1");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("x.wav"), b"").unwrap();
        fs::write(temp_dir.path().join("top.wav"), b"").unwrap();

        let flat = list_audio_files(temp_dir.path(), &IngestConfig::default()).unwrap();
        assert_eq!(names(&flat), vec!["top.wav"]);

        let deep = list_audio_files(temp_dir.path(), &IngestConfig::default().recursive()).unwrap();
        assert_eq!(deep.len(), 2);
    }

    #[test]
    fn test_missing_directory_is_source_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = list_audio_files(&temp_dir.path().join("nope"), &IngestConfig::default())
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Source(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_root_is_source_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("a.wav"), b"").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind a privileged user.
        let readable = fs::read_dir(&locked).is_ok();
        let result = list_audio_files(&locked, &IngestConfig::default());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }

        assert!(matches!(result, Err(RetrievalError::Source(_))));
    }
}
