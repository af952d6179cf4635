//! In-memory doubles shared by the unit tests.

use crate::error::{Error, Result};
use crate::model::FileEntry;
use crate::tagging::TagWriter;
use pawtag_ytdlp::Retriever;
use pawtag_ytdlp::fetcher::thumbnail::{Artwork, save_artwork};
use pawtag_ytdlp::metadata::TagMeta;
use pawtag_ytdlp::model::{Entry, ListingMode, PlaylistListing, Tier};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub fn entry(id: &str, title: &str, uploader: &str) -> Entry {
    Entry {
        id: id.to_string(),
        title: Some(title.to_string()),
        uploader: Some(uploader.to_string()),
        upload_date: Some("20230115".to_string()),
        webpage_url: Some(format!("https://example.com/watch?v={}", id)),
        ..Default::default()
    }
}

/// A retriever answering from fixed data and recording every call.
#[derive(Debug, Default)]
pub struct ScriptedRetriever {
    credentials: bool,
    listings: HashMap<String, PlaylistListing>,
    entries: HashMap<String, Entry>,
    working_tiers: Option<Vec<String>>,
    batch_limit: Option<usize>,
    artwork: Option<Vec<u8>>,
    listing_calls: Mutex<Vec<String>>,
    fetch_calls: Mutex<Vec<(String, String)>>,
    batch_calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedRetriever {
    pub fn with_credentials(mut self) -> Self {
        self.credentials = true;
        self
    }

    /// Answers listings made with the tier labelled `tier`, every other tier fails.
    pub fn with_listing(mut self, tier: &str, listing: PlaylistListing) -> Self {
        self.listings.insert(tier.to_string(), listing);
        self
    }

    pub fn with_entry(mut self, entry: Entry) -> Self {
        self.entries.insert(entry.id.clone(), entry);
        self
    }

    /// Restricts fetches to the named tiers.
    pub fn with_working_tiers(mut self, tiers: &[&str]) -> Self {
        self.working_tiers = Some(tiers.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Caps the number of entries one batch call returns.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = Some(limit);
        self
    }

    /// Serves `bytes` for every artwork URL instead of failing the download.
    pub fn with_artwork(mut self, bytes: &[u8]) -> Self {
        self.artwork = Some(bytes.to_vec());
        self
    }

    pub fn listing_calls(&self) -> Vec<String> {
        self.listing_calls.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> Vec<(String, String)> {
        self.fetch_calls.lock().unwrap().clone()
    }

    pub fn batch_calls(&self) -> Vec<(String, Vec<String>)> {
        self.batch_calls.lock().unwrap().clone()
    }

    fn tier_works(&self, tier: &Tier) -> bool {
        self.working_tiers
            .as_ref()
            .is_none_or(|tiers| tiers.contains(&tier.label))
    }
}

impl Retriever for ScriptedRetriever {
    async fn list_playlist(
        &self,
        _url: &str,
        tier: &Tier,
        _mode: ListingMode,
    ) -> pawtag_ytdlp::error::Result<PlaylistListing> {
        self.listing_calls.lock().unwrap().push(tier.label.clone());

        self.listings
            .get(&tier.label)
            .cloned()
            .ok_or_else(|| pawtag_ytdlp::Error::Command("listing unavailable".to_string()))
    }

    async fn fetch_one(&self, id: &str, tier: &Tier) -> pawtag_ytdlp::error::Result<Entry> {
        self.fetch_calls
            .lock()
            .unwrap()
            .push((tier.label.clone(), id.to_string()));

        if !self.tier_works(tier) {
            return Err(pawtag_ytdlp::Error::Command("blocked".to_string()));
        }
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| pawtag_ytdlp::Error::Command("video unavailable".to_string()))
    }

    async fn fetch_batch(
        &self,
        ids: &[String],
        tier: &Tier,
    ) -> pawtag_ytdlp::error::Result<Vec<Entry>> {
        self.batch_calls
            .lock()
            .unwrap()
            .push((tier.label.clone(), ids.to_vec()));

        if !self.tier_works(tier) {
            return Err(pawtag_ytdlp::Error::Command("blocked".to_string()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .take(self.batch_limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn fetch_artwork(&self, _url: &str, dir: &Path) -> pawtag_ytdlp::error::Result<Artwork> {
        match &self.artwork {
            Some(bytes) => save_artwork(bytes, dir).await,
            None => Err(pawtag_ytdlp::Error::Command("no artwork".to_string())),
        }
    }

    fn has_credentials(&self) -> bool {
        self.credentials
    }

    fn watch_url(&self, id: &str) -> String {
        format!("https://example.com/watch?v={}", id)
    }
}

/// A tag writer that remembers what it was asked to write instead of touching files.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    pub writes: Mutex<Vec<(PathBuf, TagMeta, bool)>>,
    pub failing: Vec<u32>,
}

impl RecordingWriter {
    pub fn failing_on(ordinals: &[u32]) -> Self {
        Self {
            failing: ordinals.to_vec(),
            ..Default::default()
        }
    }

    pub fn written(&self) -> Vec<(PathBuf, TagMeta, bool)> {
        self.writes.lock().unwrap().clone()
    }
}

impl TagWriter for RecordingWriter {
    fn write(&self, file: &FileEntry, meta: &TagMeta, artwork: Option<&Path>) -> Result<()> {
        if self.failing.contains(&file.ordinal) {
            return Err(Error::TagWrite {
                path: file.path.clone(),
                source: pawtag_ytdlp::Error::Parse("corrupt header".to_string()),
            });
        }

        self.writes
            .lock()
            .unwrap()
            .push((file.path.clone(), meta.clone(), artwork.is_some()));
        Ok(())
    }
}
