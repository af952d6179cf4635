//! Resolves a playlist URL into an ordinal to remote id map, trying tiers until one works.

use crate::error::{Error, Result};
use crate::model::{PlaylistEntry, ResolvedPlaylist};
use log::{debug, info, warn};
use pawtag_ytdlp::Retriever;
use pawtag_ytdlp::model::tier::effective_tiers;
use pawtag_ytdlp::model::{AccessMethod, ListingMode, PlaylistListing, Tier};
use std::collections::BTreeMap;

/// The album name used when neither an override nor a playlist title is available.
pub const DEFAULT_FALLBACK_ALBUM: &str = "Unknown Album";

/// One listing attempt: a tier and how much to ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistTier {
    pub tier: Tier,
    pub mode: ListingMode,
}

impl PlaylistTier {
    pub fn new(tier: Tier, mode: ListingMode) -> Self {
        Self { tier, mode }
    }

    /// The resolution tiers, full listings first, the flat listing as last resort.
    pub fn defaults() -> Vec<PlaylistTier> {
        vec![
            PlaylistTier::new(Tier::new("full+cookies", None, true), ListingMode::Full),
            PlaylistTier::new(
                Tier::new("tv+cookies", Some(AccessMethod::Tv), true),
                ListingMode::Full,
            ),
            PlaylistTier::new(Tier::new("full", None, false), ListingMode::Full),
            PlaylistTier::new(Tier::new("flat+cookies", None, true), ListingMode::Flat),
        ]
    }
}

/// Turns a playlist URL into a [`ResolvedPlaylist`].
#[derive(Debug, Clone)]
pub struct PlaylistResolver {
    tiers: Vec<PlaylistTier>,
    fallback_album: String,
}

impl Default for PlaylistResolver {
    fn default() -> Self {
        Self::new(PlaylistTier::defaults(), DEFAULT_FALLBACK_ALBUM)
    }
}

impl PlaylistResolver {
    pub fn new(tiers: Vec<PlaylistTier>, fallback_album: impl Into<String>) -> Self {
        Self {
            tiers,
            fallback_album: fallback_album.into(),
        }
    }

    /// Lists the playlist with each tier in turn and keeps the first usable listing.
    ///
    /// With an album override the flat listings go first, they lack only the title.
    ///
    /// # Arguments
    ///
    /// * `retriever` - The retrieval back end.
    /// * `url` - The playlist URL.
    /// * `album_override` - An album name that wins over anything the listing reports.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] with the last tier error when every tier fails.
    pub async fn resolve<R: Retriever>(
        &self,
        retriever: &R,
        url: &str,
        album_override: Option<&str>,
    ) -> Result<ResolvedPlaylist> {
        let mut tiers = effective_tiers(self.tiers.clone(), retriever.has_credentials(), |t| {
            (&t.tier, Some(t.mode))
        });
        if non_empty(album_override).is_some() {
            // Full listings are only needed for the playlist title.
            tiers.sort_by_key(|t| t.mode != ListingMode::Flat);
        }

        let mut last = String::from("no tier configured");
        for attempt in &tiers {
            debug!("Resolving {} with tier {}", url, attempt.tier);

            match retriever.list_playlist(url, &attempt.tier, attempt.mode).await {
                Ok(listing) => {
                    let resolved = self.build(listing, album_override, &attempt.tier);
                    if resolved.entries.is_empty() {
                        warn!("Tier {} returned no usable entries", attempt.tier);
                        last = format!("{}: no usable entries", attempt.tier);
                        continue;
                    }

                    info!(
                        "Resolved {} entries of \"{}\" with tier {}",
                        resolved.entries.len(),
                        resolved.album_title,
                        attempt.tier
                    );
                    return Ok(resolved);
                }
                Err(e) => {
                    warn!("Tier {} failed to list the playlist: {}", attempt.tier, e);
                    last = format!("{}: {}", attempt.tier, e);
                }
            }
        }

        Err(Error::Resolution {
            url: url.to_string(),
            last,
        })
    }

    fn build(
        &self,
        listing: PlaylistListing,
        album_override: Option<&str>,
        tier: &Tier,
    ) -> ResolvedPlaylist {
        let album_title = non_empty(album_override)
            .or(non_empty(listing.title.as_deref()))
            .unwrap_or(self.fallback_album.as_str())
            .to_string();

        let mut entries = BTreeMap::new();
        for item in listing.items {
            if item.ordinal == 0 || item.id.trim().is_empty() {
                continue;
            }

            entries.insert(
                item.ordinal,
                PlaylistEntry {
                    ordinal: item.ordinal,
                    remote_id: item.id,
                    fallback_title: item.title.filter(|t| !t.trim().is_empty()),
                    url: item.url,
                },
            );
        }

        ResolvedPlaylist {
            album_title,
            entries,
            tier: tier.label.clone(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
