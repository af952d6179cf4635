#![doc = include_str!("../README.md")]

use crate::error::Result;
use crate::executor::Executor;
use crate::model::Credentials;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod error;
pub mod executor;
pub mod fetcher;
pub mod metadata;
pub mod model;
pub mod retriever;
pub mod utils;

pub use error::Error;
pub use retriever::Retriever;

/// The base of the page URL built from a bare remote id.
pub const DEFAULT_WATCH_BASE: &str = "https://www.youtube.com/watch?v=";

/// A metadata retriever backed by the 'yt-dlp' executable.
///
/// Every call spawns one 'yt-dlp' process, bounded by its own timeout. Listing a playlist
/// usually takes much longer than fetching a single item, so both timeouts are separate.
///
/// The [`Retriever`] implementation lives in the `retriever` module.
///
/// # Examples
///
/// ```rust, no_run
/// # use pawtag_ytdlp::{YtDlp, Retriever};
/// # use pawtag_ytdlp::model::Tier;
/// # use std::path::PathBuf;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let ytdlp = YtDlp::new(PathBuf::from("yt-dlp"));
///
/// let tier = Tier::new("default", None, false);
/// let entry = ytdlp.fetch_one("dQw4w9WgXcQ", &tier).await?;
/// println!("Title: {:?}", entry.title);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct YtDlp {
    /// The path to the 'yt-dlp' executable.
    pub executable: PathBuf,
    /// The credentials forwarded by tiers that ask for them.
    pub credentials: Option<Credentials>,
    /// Extra arguments passed to every invocation.
    pub args: Vec<String>,
    /// The timeout for single-item and batched fetches.
    pub fetch_timeout: Duration,
    /// The timeout for playlist listings.
    pub listing_timeout: Duration,
    /// The prefix turning a bare id into a page URL.
    pub watch_base: String,
    /// Where batch files are written.
    pub scratch_dir: PathBuf,
}

impl fmt::Display for YtDlp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "YtDlp: executable={:?}, credentials={}, args={:?}",
            self.executable,
            self.credentials.is_some(),
            self.args
        )
    }
}

impl YtDlp {
    /// Creates a new retriever using the given 'yt-dlp' executable.
    ///
    /// # Arguments
    ///
    /// * `executable` - The path to 'yt-dlp', or just its name to look it up in `PATH`.
    pub fn new(executable: impl AsRef<Path>) -> Self {
        #[cfg(feature = "tracing")]
        tracing::debug!("Creating a new retriever for {:?}", executable.as_ref());

        Self {
            executable: executable.as_ref().to_path_buf(),
            credentials: None,
            args: Vec::new(),
            fetch_timeout: Duration::from_secs(60),
            listing_timeout: Duration::from_secs(180),
            watch_base: DEFAULT_WATCH_BASE.to_string(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Sets the credentials forwarded by tiers that use them.
    pub fn with_credentials(&mut self, credentials: Option<Credentials>) -> &mut Self {
        self.credentials = credentials;
        self
    }

    /// Sets the timeout for single-item and batched fetches.
    pub fn with_fetch_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Sets the timeout for playlist listings.
    pub fn with_listing_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.listing_timeout = timeout;
        self
    }

    /// Adds an argument to pass to every invocation.
    pub fn with_arg(&mut self, arg: impl AsRef<str>) -> &mut Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Sets the directory where batch files are written.
    pub fn with_scratch_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.scratch_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Returns the version string of the executable, which also proves it can be started.
    ///
    /// # Errors
    ///
    /// This function will return an error if 'yt-dlp' could not be run.
    pub async fn version(&self) -> Result<String> {
        let executor = Executor {
            executable_path: self.executable.clone(),
            timeout: Duration::from_secs(30),
            args: utils::to_owned(["--version"]),
        };

        let output = executor.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    pub(crate) fn executor(&self, timeout: Duration, args: Vec<String>) -> Executor {
        let mut all_args = self.args.clone();
        all_args.extend(args);

        Executor {
            executable_path: self.executable.clone(),
            timeout,
            args: all_args,
        }
    }
}
