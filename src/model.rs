//! The records a run is built from: local files, playlist entries and cached metadata.

use chrono::{Datelike, NaiveDate};
use pawtag_ytdlp::model::Entry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// The audio containers pawtag tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    /// MPEG audio, tagged with ID3v2.
    Mp3,
    /// AAC in an MP4 container, tagged with MP4 atoms.
    M4a,
}

impl AudioFormat {
    /// Maps an extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" => Some(AudioFormat::M4a),
            _ => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioFormat::Mp3 => write!(f, "mp3"),
            AudioFormat::M4a => write!(f, "m4a"),
        }
    }
}

/// A local file named `NNN - body.ext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// The full path of the file.
    pub path: PathBuf,
    /// The three-digit prefix, always positive.
    pub ordinal: u32,
    /// The container, from the extension.
    pub format: AudioFormat,
    /// The name between `NNN - ` and the extension.
    pub body: String,
}

impl FileEntry {
    /// The artist and title a name like `Artist - Title` suggests.
    ///
    /// Without a ` - ` separator the whole body is the title.
    pub fn filename_artist_title(&self) -> (Option<&str>, &str) {
        match self.body.split_once(" - ") {
            Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
                (Some(artist.trim()), title.trim())
            }
            _ => (None, self.body.trim()),
        }
    }
}

/// One item of the remote playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// The position reported by the remote listing.
    pub ordinal: u32,
    /// The platform id.
    pub remote_id: String,
    /// The display title from the listing, used when no metadata could be fetched.
    pub fallback_title: Option<String>,
    /// The page URL, when the listing reported one.
    pub url: Option<String>,
}

/// The outcome of playlist resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlaylist {
    /// The album name applied to every file.
    pub album_title: String,
    /// Ordinal to entry.
    pub entries: BTreeMap<u32, PlaylistEntry>,
    /// The label of the tier that succeeded.
    pub tier: String,
}

/// Descriptive metadata of one remote id, as stored in the cache.
///
/// Every field is optional so that documents written by older versions still load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRecord {
    /// The item title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The uploader or channel name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    /// The upload date as `YYYYMMDD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    /// The URL of the tallest thumbnail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// The canonical page URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,
    /// When the record was fetched, in Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<u64>,
}

impl MetadataRecord {
    /// Builds a record from a fetched document, stamped with the current time.
    pub fn from_entry(entry: &Entry) -> Self {
        Self {
            title: clean(entry.title.as_deref()),
            uploader: clean(entry.uploader_name()),
            upload_date: clean(entry.upload_date.as_deref()),
            thumbnail_url: clean(entry.best_thumbnail_url()),
            webpage_url: clean(entry.webpage_url.as_deref()),
            fetched_at: Some(unix_now()),
        }
    }

    /// The upload year, if the upload date is a valid `YYYYMMDD` value.
    pub fn year(&self) -> Option<i32> {
        parse_upload_year(self.upload_date.as_deref())
    }
}

/// Parses an 8-digit `YYYYMMDD` date into its year.
///
/// Any other shape, or an impossible calendar date, yields `None`.
pub fn parse_upload_year(raw: Option<&str>) -> Option<i32> {
    let raw = raw?.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .ok()
        .map(|date| date.year())
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
