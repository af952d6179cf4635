//! Metadata management module for local audio files.
//!
//! This module writes descriptive tags (title, artist, album, track, year, source and artwork)
//! into the two supported container families: ID3v2 for MP3 files and MP4 atoms for M4A files.

use crate::error::{Error, Result};
use crate::utils::file_system;
use id3::{Frame as ID3Frame, Tag as ID3Tag, TagLike, Version as ID3Version};
use mp4ameta::{Data as MP4Data, DataIdent as MP4DataIdent, Tag as MP4Tag};
use serde::Serialize;
use std::fmt::{self, Debug};
use std::fs;
use std::path::Path;

/// The description of the ID3 comment frame owned by pawtag.
pub const COMMENT_DESCRIPTION: &str = "pawtag";
/// The vendor namespace of the custom MP4 atoms.
pub const FREEFORM_MEAN: &str = "com.pawtag";

/// The tags written into one file.
///
/// Empty strings and `None` are not written, the existing value of that field is kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TagMeta {
    /// The track title.
    pub title: String,
    /// The track artist.
    pub artist: String,
    /// The album, usually the playlist title.
    pub album: String,
    /// The track number, the file's ordinal.
    pub track: u32,
    /// The release year.
    pub year: Option<i32>,
    /// The page the item was fetched from.
    pub source_url: String,
    /// The platform id of the item.
    pub remote_id: String,
}

impl TagMeta {
    /// The text stored in the ID3 comment frame.
    pub fn comment(&self) -> String {
        match (self.source_url.is_empty(), self.remote_id.is_empty()) {
            (false, false) => format!("{} (id: {})", self.source_url, self.remote_id),
            (false, true) => self.source_url.clone(),
            (true, false) => format!("id: {}", self.remote_id),
            (true, true) => String::new(),
        }
    }
}

impl fmt::Display for TagMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "title=\"{}\" artist=\"{}\" album=\"{}\" track={} year={} source={}",
            self.title,
            self.artist,
            self.album,
            self.track,
            self.year.map_or_else(|| "-".to_string(), |y| y.to_string()),
            self.source_url
        )
    }
}

/// The tag container families the writer supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFamily {
    /// Frame based ID3v2 tags, used by MP3 files.
    Id3,
    /// Atom based MP4 tags, used by M4A files.
    Mp4,
}

impl ContainerFamily {
    /// Picks the family from the file extension, case-insensitively.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let ext = file_system::try_extension(path)?;
        match ext.as_str() {
            "mp3" => Ok(ContainerFamily::Id3),
            "m4a" | "m4b" | "mp4" => Ok(ContainerFamily::Mp4),
            _ => Err(Error::UnsupportedFormat(ext)),
        }
    }
}

/// The image formats artwork is declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// JPEG, also the default for unrecognised data.
    Jpeg,
    /// PNG.
    Png,
}

impl ImageKind {
    /// The MIME type of the image.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }

    /// The usual file extension of the image.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }
}

/// Sniffs the image format from its magic bytes, defaulting to JPEG.
pub fn detect_image_kind(bytes: &[u8]) -> ImageKind {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return ImageKind::Png;
    }

    ImageKind::Jpeg
}

/// Metadata manager for handling file metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataManager {}

impl MetadataManager {
    /// Writes `meta` and the optional artwork into the file, in place.
    ///
    /// # Arguments
    ///
    /// * `file_path` - The audio file, its extension selects the container family.
    /// * `meta` - The tags to write.
    /// * `artwork` - An image file to embed as the front cover.
    ///
    /// # Errors
    ///
    /// This function will return an error if the format is unsupported, if the artwork cannot
    /// be read, or if the tag cannot be read or saved.
    pub fn write_tags(
        file_path: impl AsRef<Path> + Debug,
        meta: &TagMeta,
        artwork: Option<&Path>,
    ) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::trace!("Writing tags to file: {:?}", file_path);

        let family = ContainerFamily::from_path(file_path.as_ref())?;
        let artwork = artwork.map(Self::read_artwork).transpose()?;

        match family {
            ContainerFamily::Id3 => Self::write_id3(file_path.as_ref(), meta, artwork),
            ContainerFamily::Mp4 => Self::write_mp4(file_path.as_ref(), meta, artwork),
        }
    }

    fn read_artwork(path: &Path) -> Result<(Vec<u8>, ImageKind)> {
        let data = fs::read(path)?;
        let kind = detect_image_kind(&data);

        Ok((data, kind))
    }

    /// Write the tags into an MP3 file using ID3
    fn write_id3(
        file_path: &Path,
        meta: &TagMeta,
        artwork: Option<(Vec<u8>, ImageKind)>,
    ) -> Result<()> {
        // A file without a tag gets a fresh one
        let mut tag = match ID3Tag::read_from_path(file_path) {
            Ok(tag) => tag,
            Err(_) => ID3Tag::new(),
        };

        if !meta.title.is_empty() {
            tag.set_title(meta.title.as_str());
        }
        if !meta.artist.is_empty() {
            tag.set_artist(meta.artist.as_str());
        }
        if !meta.album.is_empty() {
            tag.set_album(meta.album.as_str());
        }
        if meta.track > 0 {
            tag.set_track(meta.track);
        }
        if let Some(year) = meta.year {
            tag.set_year(year);
        }

        let comment = meta.comment();
        if !comment.is_empty() {
            tag.remove_comment(Some(COMMENT_DESCRIPTION), None);
            tag.add_frame(ID3Frame::with_content(
                "COMM",
                id3::frame::Content::Comment(id3::frame::Comment {
                    lang: "eng".to_string(),
                    description: COMMENT_DESCRIPTION.to_string(),
                    text: comment,
                }),
            ));
        }

        if let Some((data, kind)) = artwork {
            tag.remove_all_pictures();
            tag.add_frame(ID3Frame::with_content(
                "APIC",
                id3::frame::Content::Picture(id3::frame::Picture {
                    mime_type: kind.mime_type().to_string(),
                    picture_type: id3::frame::PictureType::CoverFront,
                    description: "Cover".to_string(),
                    data,
                }),
            ));
        }

        tag.write_to_path(file_path, ID3Version::Id3v24)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote ID3 tags to {:?}", file_path);

        Ok(())
    }

    /// Write the tags into an M4A file using MP4 atoms
    fn write_mp4(
        file_path: &Path,
        meta: &TagMeta,
        artwork: Option<(Vec<u8>, ImageKind)>,
    ) -> Result<()> {
        let mut tag = MP4Tag::read_from_path(file_path)?;

        if !meta.title.is_empty() {
            tag.set_title(meta.title.clone());
        }
        if !meta.artist.is_empty() {
            tag.set_artist(meta.artist.clone());
        }
        if !meta.album.is_empty() {
            tag.set_album(meta.album.clone());
        }
        if meta.track > 0 {
            // Stored as (index, total) with an unknown total
            tag.set_track(u16::try_from(meta.track).unwrap_or(u16::MAX), 0);
        }
        if let Some(year) = meta.year {
            tag.set_year(year.to_string());
        }

        if !meta.source_url.is_empty() {
            tag.set_data(
                MP4DataIdent::freeform(FREEFORM_MEAN, "source_url"),
                MP4Data::Utf8(meta.source_url.clone()),
            );
        }
        if !meta.remote_id.is_empty() {
            tag.set_data(
                MP4DataIdent::freeform(FREEFORM_MEAN, "remote_id"),
                MP4Data::Utf8(meta.remote_id.clone()),
            );
        }

        if let Some((data, kind)) = artwork {
            let fmt = match kind {
                ImageKind::Jpeg => mp4ameta::ImgFmt::Jpeg,
                ImageKind::Png => mp4ameta::ImgFmt::Png,
            };
            tag.set_artwork(mp4ameta::Img::new(fmt, data));
        }

        tag.write_to_path(file_path)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote MP4 tags to {:?}", file_path);

        Ok(())
    }
}
