//! The retrieval capability: list a playlist, fetch one item, fetch a batch of items.
//!
//! Callers only see [`Retriever`], so tier ordering, caching and concurrency never depend on
//! how 'yt-dlp' is invoked.

use crate::YtDlp;
use crate::error::{Error, Result};
use crate::fetcher::thumbnail::{Artwork, download_artwork};
use crate::model::{Entry, FLAT_LISTING_TEMPLATE, ListingMode, PlaylistListing, Tier};
use crate::utils::{file_system, to_owned};
use std::path::Path;

/// A source of playlist listings and item metadata.
#[allow(async_fn_in_trait)]
pub trait Retriever {
    /// Lists the playlist at `url` using one tier.
    async fn list_playlist(
        &self,
        url: &str,
        tier: &Tier,
        mode: ListingMode,
    ) -> Result<PlaylistListing>;

    /// Fetches the metadata of one remote id using one tier.
    async fn fetch_one(&self, id: &str, tier: &Tier) -> Result<Entry>;

    /// Fetches as many of `ids` as possible in one go using one tier.
    ///
    /// Returns the entries that were obtained, items that failed are simply missing.
    async fn fetch_batch(&self, ids: &[String], tier: &Tier) -> Result<Vec<Entry>>;

    /// Downloads the artwork at `url` into a temporary file in `dir`.
    async fn fetch_artwork(&self, url: &str, dir: &Path) -> Result<Artwork> {
        download_artwork(url, dir).await
    }

    /// Whether credentials are configured, tiers that use them are otherwise redundant.
    fn has_credentials(&self) -> bool;

    /// The page URL of a remote id.
    fn watch_url(&self, id: &str) -> String;
}

impl Retriever for YtDlp {
    async fn list_playlist(
        &self,
        url: &str,
        tier: &Tier,
        mode: ListingMode,
    ) -> Result<PlaylistListing> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Listing playlist {} with tier {} ({:?})", url, tier, mode);

        let mut args = to_owned(["--no-warnings"]);
        match mode {
            ListingMode::Full => args.extend(to_owned(["--ignore-errors", "-J"])),
            ListingMode::Flat => {
                args.extend(to_owned(["--flat-playlist", "--print", FLAT_LISTING_TEMPLATE]))
            }
        }
        args.extend(tier.args(self.credentials.as_ref()));
        args.push(url.to_string());

        // With --ignore-errors one private video makes the exit code non-zero while the
        // listing itself is complete, so the output decides.
        let output = self
            .executor(self.listing_timeout, args)
            .execute_unchecked()
            .await?;

        let listing = match mode {
            ListingMode::Full => PlaylistListing::from_json(output.stdout.trim()),
            ListingMode::Flat => Ok(PlaylistListing::from_tab_delimited(&output.stdout)),
        };

        match listing {
            Ok(listing) if !listing.items.is_empty() => Ok(listing),
            _ if !output.success() => Err(Error::Command(format!(
                "yt-dlp exited with code {}: {}",
                output.code,
                output.diagnostic()
            ))),
            Ok(_) => Err(Error::Parse("playlist has no usable entries".to_string())),
            Err(e) => Err(e),
        }
    }

    async fn fetch_one(&self, id: &str, tier: &Tier) -> Result<Entry> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Fetching {} with tier {}", id, tier);

        let mut args = to_owned(["--no-warnings", "--skip-download", "--no-playlist", "-j"]);
        args.extend(tier.args(self.credentials.as_ref()));
        args.push(self.watch_url(id));

        let output = self.executor(self.fetch_timeout, args).execute().await?;

        Entry::from_json_lines(&output.stdout)
            .into_iter()
            .next()
            .ok_or_else(|| Error::Parse(format!("no metadata document for {}", id)))
    }

    async fn fetch_batch(&self, ids: &[String], tier: &Tier) -> Result<Vec<Entry>> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Fetching a batch of {} ids with tier {}", ids.len(), tier);

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let batch_file = file_system::unique_temp_path(&self.scratch_dir, "pawtag_batch", "txt");
        let urls: Vec<String> = ids.iter().map(|id| self.watch_url(id)).collect();
        tokio::fs::write(&batch_file, urls.join("\n")).await?;

        let mut args = to_owned([
            "--no-warnings",
            "--skip-download",
            "--ignore-errors",
            "-j",
            "--batch-file",
        ]);
        args.push(batch_file.display().to_string());
        args.extend(tier.args(self.credentials.as_ref()));

        // The batch gets the single-item timeout once per id.
        let timeout = self
            .fetch_timeout
            .saturating_mul(u32::try_from(ids.len()).unwrap_or(u32::MAX));
        let result = self.executor(timeout, args).execute_unchecked().await;
        file_system::remove_temp_file(&batch_file);
        let output = result?;

        let entries = Entry::from_json_lines(&output.stdout);
        if entries.is_empty() && !output.success() {
            return Err(Error::Command(format!(
                "yt-dlp exited with code {}: {}",
                output.code,
                output.diagnostic()
            )));
        }

        Ok(entries)
    }

    fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn watch_url(&self, id: &str) -> String {
        format!("{}{}", self.watch_base, id)
    }
}
