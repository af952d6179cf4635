//! Scans a directory for audio files carrying a playlist position in their name.

use crate::error::{Error, Result};
use crate::model::{AudioFormat, FileEntry};
use log::{debug, warn};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{3}) - (.+)\.(mp3|m4a)$").expect("file name pattern is valid")
});

/// Lists the `NNN - body.ext` files of `dir`, sorted by ordinal.
///
/// Names that do not match are skipped. When two files share an ordinal the one whose name
/// sorts last wins.
///
/// # Errors
///
/// Returns [`Error::NotFound`] when `dir` is missing or is not a directory.
pub fn index_directory(dir: impl AsRef<Path>) -> Result<Vec<FileEntry>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.to_path_buf()));
    }

    let mut candidates = Vec::new();
    for item in std::fs::read_dir(dir)? {
        let item = item?;
        if !item.file_type()?.is_file() {
            continue;
        }

        // The lossy name is only parsed, the entry keeps the real path.
        let name = item.file_name().to_string_lossy().into_owned();
        match parse_file_name(&name) {
            Some((ordinal, format, body)) => candidates.push((
                name,
                FileEntry {
                    path: item.path(),
                    ordinal,
                    format,
                    body,
                },
            )),
            None => debug!("Skipping {:?}: not an indexed audio file", name),
        }
    }
    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let (entries, dropped) = keep_last_per_ordinal(candidates.into_iter().map(|(_, e)| e));
    for (lost, kept) in &dropped {
        warn!(
            "Ordinal {:03} appears twice, ignoring {:?} in favour of {:?}",
            kept.ordinal, lost.path, kept.path
        );
    }

    Ok(entries)
}

/// Keeps the last entry of each ordinal, sorted by ordinal.
///
/// Also returns every dropped entry paired with the one that replaced it.
fn keep_last_per_ordinal(
    candidates: impl IntoIterator<Item = FileEntry>,
) -> (Vec<FileEntry>, Vec<(FileEntry, FileEntry)>) {
    let mut entries: Vec<FileEntry> = Vec::new();
    let mut replaced = Vec::new();
    for entry in candidates {
        match entries.iter_mut().find(|e| e.ordinal == entry.ordinal) {
            Some(existing) => replaced.push(std::mem::replace(existing, entry)),
            None => entries.push(entry),
        }
    }
    entries.sort_by_key(|e| e.ordinal);

    let dropped = replaced
        .into_iter()
        .filter_map(|lost| {
            let kept = entries.iter().find(|e| e.ordinal == lost.ordinal)?.clone();
            Some((lost, kept))
        })
        .collect();

    (entries, dropped)
}

/// Splits a file name into ordinal, format and body, if it follows the naming scheme.
pub fn parse_file_name(name: &str) -> Option<(u32, AudioFormat, String)> {
    let captures = FILE_NAME.captures(name)?;

    let ordinal: u32 = captures[1].parse().ok()?;
    if ordinal == 0 {
        return None;
    }
    let format = AudioFormat::from_extension(&captures[3])?;

    Some((ordinal, format, captures[2].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_names() {
        assert_eq!(
            parse_file_name("007 - Song.mp3"),
            Some((7, AudioFormat::Mp3, "Song".to_string()))
        );
        assert_eq!(
            parse_file_name("012 - Artist - Title.M4A"),
            Some((12, AudioFormat::M4a, "Artist - Title".to_string()))
        );
        assert_eq!(parse_file_name("000 - Zero.mp3"), None);
        assert_eq!(parse_file_name("7 - Short.mp3"), None);
        assert_eq!(parse_file_name("0007 - Long.mp3"), None);
        assert_eq!(parse_file_name("001 - Cover.jpg"), None);
        assert_eq!(parse_file_name("001-NoSpaces.mp3"), None);
    }

    #[test]
    fn indexes_sorted_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "003 - Third.m4a",
            "001 - First.mp3",
            "notes.txt",
            "002 - Second.flac",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("004 - Folder.mp3")).unwrap();

        let entries = index_directory(dir.path()).unwrap();
        let ordinals: Vec<u32> = entries.iter().map(|e| e.ordinal).collect();
        assert_eq!(ordinals, vec![1, 3]);
        assert_eq!(entries[1].format, AudioFormat::M4a);
        assert_eq!(entries[1].body, "Third");
    }

    #[test]
    fn duplicate_ordinal_keeps_last_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("005 - A.mp3"), b"x").unwrap();
        fs::write(dir.path().join("005 - B.mp3"), b"x").unwrap();

        let entries = index_directory(dir.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "B");
    }

    #[test]
    fn dropped_duplicates_are_reported_with_the_winner() {
        let file = |name: &str| {
            let (ordinal, format, body) = parse_file_name(name).unwrap();
            FileEntry {
                path: name.into(),
                ordinal,
                format,
                body,
            }
        };

        let (entries, dropped) = keep_last_per_ordinal([
            file("005 - A.mp3"),
            file("002 - Other.mp3"),
            file("005 - B.mp3"),
        ]);

        assert_eq!(entries.iter().map(|e| e.ordinal).collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(dropped.len(), 1);
        let (lost, kept) = &dropped[0];
        assert_eq!(lost.body, "A");
        assert_eq!(kept.body, "B");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_keep_their_real_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let name = OsStr::from_bytes(b"001 - Caf\xe9.mp3");
        if fs::write(dir.path().join(name), b"x").is_err() {
            // Some file systems only accept UTF-8 names.
            return;
        }

        let entries = index_directory(dir.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, dir.path().join(name));
        assert!(entries[0].path.exists());
    }

    #[test]
    fn empty_and_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(index_directory(dir.path()).unwrap().is_empty());

        let missing = dir.path().join("missing");
        assert!(matches!(index_directory(&missing), Err(Error::NotFound(_))));

        let file = dir.path().join("001 - File.mp3");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(index_directory(&file), Err(Error::NotFound(_))));
    }
}
