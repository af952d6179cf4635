//! Tools for fetching data from a URL.
//!
//! Only artwork is fetched over HTTP, every piece of metadata comes from 'yt-dlp'.

use crate::error::Result;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::fmt;
use std::time::Duration;

pub mod thumbnail;

/// The fetcher is responsible for downloading data from a URL.
#[derive(Debug, Clone)]
pub struct Fetcher {
    /// The URL from which to download the data.
    url: String,
    /// The timeout of the whole request.
    timeout: Duration,
    /// The number of download attempts in case of failure.
    retry_attempts: usize,
}

impl fmt::Display for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fetcher(url={}, timeout={:?})", self.url, self.timeout)
    }
}

impl Fetcher {
    /// Creates a new fetcher for the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL from which to download the data.
    pub fn new(url: impl AsRef<str>) -> Self {
        Self {
            url: url.as_ref().to_string(),
            timeout: Duration::from_secs(30),
            retry_attempts: 2,
        }
    }

    /// Configures the timeout of each attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configures the number of download attempts in case of failure.
    ///
    /// # Arguments
    ///
    /// * `attempts` - The number of attempts, at least one is always made.
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Fetches the body of the URL into memory.
    ///
    /// # Errors
    ///
    /// This function will return the last error if every attempt failed.
    pub async fn fetch_bytes(&self) -> Result<Vec<u8>> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("pawtag"));

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()?;

        let attempts = self.retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            #[cfg(feature = "tracing")]
            tracing::debug!("Fetching {} (attempt {}/{})", self.url, attempt, attempts);

            let result = async {
                let response = client.get(&self.url).send().await?.error_for_status()?;
                let bytes = response.bytes().await?;
                Ok::<Vec<u8>, reqwest::Error>(bytes.to_vec())
            }
            .await;

            match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt >= attempts => return Err(e.into()),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Fetching {} failed, retrying: {}", self.url, _e);
                    attempt += 1;
                }
            }
        }
    }
}
