//! Tools for fetching artwork into temporary files.

use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::metadata::{ImageKind, detect_image_kind};
use crate::utils::file_system;
use std::path::{Path, PathBuf};

/// A downloaded artwork file living in a temporary directory.
///
/// The file is not removed on drop, call [`Artwork::cleanup`] once the tag write is over,
/// whatever its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    /// Where the image was written.
    pub path: PathBuf,
    /// The image format, sniffed from its first bytes.
    pub kind: ImageKind,
}

impl Artwork {
    /// Removes the temporary file, returns `false` if it could not be removed.
    pub fn cleanup(&self) -> bool {
        file_system::remove_temp_file(&self.path)
    }
}

/// Downloads the artwork at `url` into a uniquely named file in `dir`.
///
/// # Errors
///
/// This function will return an error if the image could not be fetched or written.
pub async fn download_artwork(url: &str, dir: impl AsRef<Path>) -> Result<Artwork> {
    #[cfg(feature = "tracing")]
    tracing::debug!("Downloading artwork from {}", url);

    let bytes = Fetcher::new(url).fetch_bytes().await?;
    save_artwork(&bytes, dir).await
}

/// Writes image bytes into a uniquely named file in `dir`.
///
/// # Errors
///
/// This function will return an error if the file could not be written.
pub async fn save_artwork(bytes: &[u8], dir: impl AsRef<Path>) -> Result<Artwork> {
    let kind = detect_image_kind(bytes);

    let path = file_system::unique_temp_path(dir, "pawtag_art", kind.extension());
    file_system::create_parent_dir(&path)?;
    tokio::fs::write(&path, bytes).await?;

    Ok(Artwork { path, kind })
}
