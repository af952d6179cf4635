//! The models used to represent the data fetched by 'yt-dlp'.
//!
//! The represented data is the single-item metadata document, thumbnails, playlist listings
//! and the retrieval tiers used to obtain them.

use crate::error::{Error, Result};
use crate::model::thumbnail::Thumbnail;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod thumbnail;
pub mod tier;

pub use tier::{AccessMethod, Credentials, ListingMode, Tier};

/// Represents one playable item, the output of 'yt-dlp -j'.
///
/// Only the fields pawtag reads are modelled, everything else in the document is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// The ID of the item.
    pub id: String,
    /// The title of the item.
    #[serde(default)]
    pub title: Option<String>,
    /// The uploader display name.
    #[serde(default)]
    pub uploader: Option<String>,
    /// The channel display name, used when the uploader is missing.
    #[serde(default)]
    pub channel: Option<String>,
    /// The upload date, formatted as 'YYYYMMDD'.
    #[serde(default)]
    pub upload_date: Option<String>,
    /// The single thumbnail URL 'yt-dlp' considers the best.
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Every thumbnail candidate.
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
    /// The canonical page URL of the item.
    #[serde(default)]
    pub webpage_url: Option<String>,
}

impl Entry {
    /// Parses one JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let entry: Entry = serde_json::from_str(json)?;
        if entry.id.is_empty() {
            return Err(Error::Parse("metadata document without an id".to_string()));
        }

        Ok(entry)
    }

    /// Parses newline-delimited JSON documents, as printed by a batched `-j` run.
    ///
    /// Lines that are not valid documents are skipped, a failed item only costs its own line.
    pub fn from_json_lines(output: &str) -> Vec<Self> {
        output
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('{'))
            .filter_map(|line| match Self::from_json(line) {
                Ok(entry) => Some(entry),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Skipping unreadable batch line: {}", _e);
                    None
                }
            })
            .collect()
    }

    /// The uploader, falling back to the channel name.
    pub fn uploader_name(&self) -> Option<&str> {
        self.uploader
            .as_deref()
            .or(self.channel.as_deref())
            .filter(|name| !name.trim().is_empty())
    }

    /// The URL of the tallest thumbnail, or the lone `thumbnail` field when no candidates are listed.
    pub fn best_thumbnail_url(&self) -> Option<&str> {
        match thumbnail::select_tallest(&self.thumbnails) {
            Some(best) => Some(best.url.as_str()),
            None => self.thumbnail.as_deref(),
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entry(id={}, title={})",
            self.id,
            self.title.as_deref().unwrap_or("unknown")
        )
    }
}

/// One line of a playlist listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    /// The 1-based position in the playlist.
    pub ordinal: u32,
    /// The ID of the item.
    pub id: String,
    /// The display title, if the listing reported one.
    pub title: Option<String>,
    /// The page URL, if the listing reported one.
    pub url: Option<String>,
}

/// A playlist as listed by 'yt-dlp', either with `-J` or with `--flat-playlist --print`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaylistListing {
    /// The playlist title, absent from flat listings.
    pub title: Option<String>,
    /// The usable items; items with a missing id or a non-positive ordinal are dropped.
    pub items: Vec<ListingItem>,
}

/// The template handed to `--print` for flat listings.
pub const FLAT_LISTING_TEMPLATE: &str = "%(playlist_index)s\t%(id)s\t%(title)s";

impl PlaylistListing {
    /// Parses the single JSON document printed by `-J`.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)?;
        let entries = document
            .get("entries")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Parse("playlist document has no entries".to_string()))?;

        let items = entries
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| Self::item_from_value(position + 1, entry))
            .collect();

        Ok(Self {
            title: non_empty(document.get("title").and_then(Value::as_str)),
            items,
        })
    }

    /// Parses the tab-delimited lines printed with [`FLAT_LISTING_TEMPLATE`].
    pub fn from_tab_delimited(output: &str) -> Self {
        let items = output
            .lines()
            .filter_map(|line| {
                let mut fields = line.splitn(3, '\t');
                let ordinal = parse_ordinal_str(fields.next()?)?;
                let id = fields.next()?.trim();
                if id.is_empty() || id == "NA" {
                    return None;
                }
                let title = fields.next().map(str::trim).filter(|t| *t != "NA");

                Some(ListingItem {
                    ordinal,
                    id: id.to_string(),
                    title: non_empty(title),
                    url: None,
                })
            })
            .collect();

        Self { title: None, items }
    }

    fn item_from_value(position: usize, entry: &Value) -> Option<ListingItem> {
        let id = entry.get("id").and_then(Value::as_str)?;
        if id.is_empty() {
            return None;
        }

        let ordinal = match entry.get("playlist_index") {
            None | Some(Value::Null) => u32::try_from(position).ok()?,
            Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok())?,
            Some(Value::String(s)) => parse_ordinal_str(s)?,
            Some(_) => return None,
        };
        if ordinal == 0 {
            return None;
        }

        let url = entry
            .get("webpage_url")
            .or_else(|| entry.get("url"))
            .and_then(Value::as_str);

        Some(ListingItem {
            ordinal,
            id: id.to_string(),
            title: non_empty(entry.get("title").and_then(Value::as_str)),
            url: non_empty(url),
        })
    }
}

fn parse_ordinal_str(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|ordinal| *ordinal > 0)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
