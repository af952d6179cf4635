//! The errors that can occur during a run.

use std::path::PathBuf;
use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The possible errors that can occur.
///
/// `Argument`, `NotFound`, `Resolution` and `Config` abort the run. The others are raised per
/// item or per phase and are logged by the pipeline, which then moves on.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid command line input.
    #[error("Invalid argument: {0}")]
    Argument(String),
    /// The source directory does not exist.
    #[error("Directory not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Every playlist resolution tier failed.
    #[error("Could not resolve playlist {url}: all tiers failed, last error: {last}")]
    Resolution {
        /// The playlist URL.
        url: String,
        /// The error of the last tier attempted.
        last: String,
    },
    /// Every fetch tier failed for one remote id.
    #[error("Could not fetch {id}: {reason}")]
    Fetch {
        /// The remote id.
        id: String,
        /// The error of the last tier attempted.
        reason: String,
    },
    /// Writing the tags of one file failed.
    #[error("Could not tag {}: {source}", .path.display())]
    TagWrite {
        /// The audio file.
        path: PathBuf,
        /// The underlying writer error.
        source: pawtag_ytdlp::Error,
    },
    /// The cache could not be saved.
    #[error("Could not save the cache to {}: {reason}", .path.display())]
    CachePersist {
        /// The cache file.
        path: PathBuf,
        /// Why saving failed.
        reason: String,
    },
    /// The configuration file is malformed.
    #[error("Malformed config file {}: {reason}", .path.display())]
    Config {
        /// The configuration file.
        path: PathBuf,
        /// The parser message.
        reason: String,
    },
    /// An error occurred while interacting with the file system.
    #[error("An IO error occurred: {0}")]
    IO(#[from] std::io::Error),
    /// An error raised by the retrieval bridge.
    #[error(transparent)]
    Retrieval(#[from] pawtag_ytdlp::Error),
}

impl Error {
    /// Whether this error ends the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Argument(_)
                | Error::NotFound(_)
                | Error::Resolution { .. }
                | Error::Config { .. }
        )
    }
}
