//! The optional configuration file and the settings of a run.
//!
//! Values given on the command line override the file, the file overrides the defaults.

use crate::cache::DEFAULT_CACHE_FILE;
use crate::error::{Error, Result};
use crate::fetcher::{DEFAULT_BATCH_SIZE, DEFAULT_WORKERS, FetchMode, MetadataFetcher};
use crate::playlist::{DEFAULT_FALLBACK_ALBUM, PlaylistResolver, PlaylistTier};
use crate::tagging::Precedence;
use log::debug;
use pawtag_ytdlp::YtDlp;
use pawtag_ytdlp::model::{Credentials, Tier};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// The contents of `config.toml`, every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub yt_dlp: Option<PathBuf>,
    pub workers: Option<usize>,
    pub cookies_from_browser: Option<String>,
    pub cookies: Option<PathBuf>,
    pub fetch_timeout_secs: Option<u64>,
    pub playlist_timeout_secs: Option<u64>,
    pub cache_file: Option<PathBuf>,
    pub cache_ttl_days: Option<u64>,
    pub fallback_album: Option<String>,
    pub precedence: Option<Precedence>,
    pub batch: Option<bool>,
    pub batch_size: Option<usize>,
}

impl FileConfig {
    /// `<config dir>/pawtag/config.toml`, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pawtag").join("config.toml"))
    }

    /// Reads the file at `path`, a missing or empty file is an empty config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is not valid TOML or has unknown keys.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {:?}", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Reads the file at [`FileConfig::default_path`].
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Values given on the command line, `None` defers to the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub yt_dlp: Option<PathBuf>,
    pub workers: Option<usize>,
    pub cookies_from_browser: Option<String>,
    pub cookies: Option<PathBuf>,
    pub cache_file: Option<PathBuf>,
    pub precedence: Option<Precedence>,
    pub batch: bool,
}

/// The merged settings of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub yt_dlp: PathBuf,
    pub workers: usize,
    pub credentials: Option<Credentials>,
    pub fetch_timeout: Duration,
    pub playlist_timeout: Duration,
    pub cache_file: PathBuf,
    pub cache_ttl: Option<Duration>,
    pub fallback_album: String,
    pub precedence: Precedence,
    pub fetch_mode: FetchMode,
    pub batch_size: usize,
}

impl Settings {
    /// Applies `overrides` on top of `file`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] for a zero worker count or batch size, and when both a
    /// browser and a cookie file end up configured.
    pub fn merge(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let workers = overrides
            .workers
            .or(file.workers)
            .unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(Error::Argument("workers must be at least 1".to_string()));
        }

        let batch_size = file.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(Error::Argument("batch_size must be at least 1".to_string()));
        }

        // A credential given on the command line replaces both file keys.
        let (browser, cookie_file) =
            if overrides.cookies_from_browser.is_some() || overrides.cookies.is_some() {
                (overrides.cookies_from_browser, overrides.cookies)
            } else {
                (file.cookies_from_browser, file.cookies)
            };
        let credentials = match (browser, cookie_file) {
            (Some(_), Some(_)) => {
                return Err(Error::Argument(
                    "cookies_from_browser and cookies cannot be used together".to_string(),
                ));
            }
            (Some(browser), None) => Some(Credentials::Browser(browser)),
            (None, Some(path)) => Some(Credentials::CookieFile(path)),
            (None, None) => None,
        };

        let fetch_mode = if overrides.batch || file.batch.unwrap_or(false) {
            FetchMode::Batch
        } else {
            FetchMode::PerId
        };

        Ok(Self {
            yt_dlp: overrides
                .yt_dlp
                .or(file.yt_dlp)
                .unwrap_or_else(|| PathBuf::from("yt-dlp")),
            workers,
            credentials,
            fetch_timeout: Duration::from_secs(file.fetch_timeout_secs.unwrap_or(60)),
            playlist_timeout: Duration::from_secs(file.playlist_timeout_secs.unwrap_or(180)),
            cache_file: overrides
                .cache_file
                .or(file.cache_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE)),
            cache_ttl: file
                .cache_ttl_days
                .map(|days| Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY))),
            fallback_album: file
                .fallback_album
                .filter(|album| !album.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FALLBACK_ALBUM.to_string()),
            precedence: overrides.precedence.or(file.precedence).unwrap_or_default(),
            fetch_mode,
            batch_size,
        })
    }

    /// The 'yt-dlp' retriever these settings describe.
    pub fn retriever(&self) -> YtDlp {
        let mut ytdlp = YtDlp::new(&self.yt_dlp);
        ytdlp
            .with_credentials(self.credentials.clone())
            .with_fetch_timeout(self.fetch_timeout)
            .with_listing_timeout(self.playlist_timeout);

        ytdlp
    }

    pub fn resolver(&self) -> PlaylistResolver {
        PlaylistResolver::new(PlaylistTier::defaults(), &self.fallback_album)
    }

    pub fn fetcher(&self) -> MetadataFetcher {
        MetadataFetcher::new(Tier::fetch_defaults())
            .with_workers(self.workers)
            .with_mode(self.fetch_mode)
            .with_batch_size(self.batch_size)
    }
}
