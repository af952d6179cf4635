//! Tools for working with the file system.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Returns the lowercased extension of the given path.
pub fn try_extension(path: impl AsRef<Path>) -> Result<String> {
    let ext = path
        .as_ref()
        .extension()
        .ok_or_else(|| Error::Path("File has no extension".to_string()))?
        .to_str()
        .ok_or_else(|| Error::Path("Invalid characters in file extension".to_string()))?
        .to_lowercase();

    Ok(ext)
}

/// Creates the parent directory of the given destination.
/// If the parent directory already exists, nothing is done.
///
/// # Arguments
///
/// * `destination` - The path to create the parent directory for.
pub fn create_parent_dir(destination: impl AsRef<Path>) -> Result<()> {
    if let Some(parent) = destination.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    Ok(())
}

/// Builds a path in `dir` that no other run or worker will pick, e.g. `pawtag_art_<uuid>.jpg`.
///
/// # Arguments
///
/// * `dir` - The directory the file will live in.
/// * `prefix` - A short name describing the file's purpose.
/// * `extension` - The extension, without the leading dot.
pub fn unique_temp_path(dir: impl AsRef<Path>, prefix: &str, extension: &str) -> PathBuf {
    let uuid = Uuid::new_v4().simple();

    dir.as_ref()
        .join(format!("{}_{}.{}", prefix, uuid, extension))
}

/// Removes a temporary file and logs any errors.
/// Does not propagate errors to avoid interrupting the execution flow.
///
/// # Arguments
///
/// * `file_path` - The path of the file to delete
///
/// # Returns
///
/// `true` if the file was deleted or was already gone, `false` otherwise
pub fn remove_temp_file(file_path: impl AsRef<Path> + std::fmt::Debug) -> bool {
    match std::fs::remove_file(file_path.as_ref()) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to remove temporary file {:?}: {}", file_path, _e);

            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_temp_paths_differ() {
        let dir = std::env::temp_dir();
        let a = unique_temp_path(&dir, "pawtag_art", "jpg");
        let b = unique_temp_path(&dir, "pawtag_art", "jpg");

        assert_ne!(a, b);
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("jpg"));
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with("pawtag_art_"));
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(try_extension("001 - Song.MP3").unwrap(), "mp3");
        assert!(try_extension("no_extension").is_err());
    }

    #[test]
    fn removing_a_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.jpg");
        assert!(remove_temp_file(&path));

        std::fs::write(&path, b"x").unwrap();
        assert!(remove_temp_file(&path));
        assert!(!path.exists());
    }
}
