//! Builds the tags of one file and writes them.

use crate::error::{Error, Result};
use crate::model::{FileEntry, MetadataRecord, PlaylistEntry};
use pawtag_ytdlp::metadata::{MetadataManager, TagMeta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const TOPIC_SUFFIX: &str = " - Topic";

/// Which source wins when fetched metadata and the file name disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precedence {
    /// Fetched title and uploader win, the file name fills gaps.
    #[default]
    Fetched,
    /// The file name wins, fetched values fill gaps.
    Filename,
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precedence::Fetched => write!(f, "fetched"),
            Precedence::Filename => write!(f, "filename"),
        }
    }
}

/// The inputs of [`build_tag_meta`] that are the same for every file of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagContext<'a> {
    pub album: &'a str,
    pub precedence: Precedence,
    pub skip_year: bool,
}

/// Merges the file name, playlist entry and fetched record of one file into its tags.
///
/// # Arguments
///
/// * `file` - The local file.
/// * `entry` - The playlist entry at the file's ordinal.
/// * `record` - The fetched metadata, if any tier could get it.
/// * `watch_url` - The page URL to use when neither the record nor the entry has one.
/// * `context` - Album name and the run options.
pub fn build_tag_meta(
    file: &FileEntry,
    entry: &PlaylistEntry,
    record: Option<&MetadataRecord>,
    watch_url: &str,
    context: &TagContext<'_>,
) -> TagMeta {
    let (file_artist, file_title) = file.filename_artist_title();
    let fetched_title = record.and_then(|r| r.title.as_deref());
    let fetched_artist = record
        .and_then(|r| r.uploader.as_deref())
        .map(trim_topic_suffix);
    let listed_title = entry.fallback_title.as_deref();

    let (title, artist) = match context.precedence {
        Precedence::Fetched => (
            fetched_title.or(listed_title).unwrap_or(file_title),
            fetched_artist.or(file_artist),
        ),
        Precedence::Filename => (
            Some(file_title)
                .filter(|t| !t.is_empty())
                .or(fetched_title)
                .or(listed_title)
                .unwrap_or_default(),
            file_artist.or(fetched_artist),
        ),
    };

    let year = if context.skip_year {
        None
    } else {
        record.and_then(MetadataRecord::year)
    };

    let source_url = record
        .and_then(|r| r.webpage_url.as_deref())
        .or(entry.url.as_deref())
        .unwrap_or(watch_url);

    TagMeta {
        title: title.to_string(),
        artist: artist.unwrap_or_default().to_string(),
        album: context.album.to_string(),
        track: file.ordinal,
        year,
        source_url: source_url.to_string(),
        remote_id: entry.remote_id.clone(),
    }
}

/// Drops the `" - Topic"` suffix of auto-generated artist channels.
pub fn trim_topic_suffix(name: &str) -> &str {
    name.strip_suffix(TOPIC_SUFFIX).unwrap_or(name).trim()
}

/// Writes tags into audio files.
pub trait TagWriter {
    fn write(&self, file: &FileEntry, meta: &TagMeta, artwork: Option<&Path>) -> Result<()>;
}

/// The writer that edits the files in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTagWriter;

impl TagWriter for FileTagWriter {
    fn write(&self, file: &FileEntry, meta: &TagMeta, artwork: Option<&Path>) -> Result<()> {
        MetadataManager::write_tags(&file.path, meta, artwork).map_err(|source| Error::TagWrite {
            path: file.path.clone(),
            source,
        })
    }
}
