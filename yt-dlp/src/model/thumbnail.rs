//! Thumbnails-related models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents one thumbnail candidate of a video, as listed by 'yt-dlp'.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Thumbnail {
    /// The URL of the thumbnail.
    pub url: String,
    /// The ID of the thumbnail, e.g. 'maxresdefault'.
    #[serde(default)]
    pub id: Option<String>,
    /// The preference index of the thumbnail, e.g. '-35' or '0'.
    #[serde(default)]
    pub preference: Option<i64>,

    /// The height of the thumbnail, can be `None`.
    #[serde(default)]
    pub height: Option<i64>,
    /// The width of the thumbnail, can be `None`.
    #[serde(default)]
    pub width: Option<i64>,
}

impl fmt::Display for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.width, self.height) {
            (Some(width), Some(height)) => write!(f, "Thumbnail({}x{}, {})", width, height, self.url),
            _ => write!(f, "Thumbnail(unknown size, {})", self.url),
        }
    }
}

/// Picks the candidate with the greatest reported height.
///
/// Candidates without a height rank below every candidate that has one. On ties the
/// later candidate wins, 'yt-dlp' lists thumbnails from worst to best.
pub fn select_tallest(thumbnails: &[Thumbnail]) -> Option<&Thumbnail> {
    thumbnails
        .iter()
        .max_by_key(|thumbnail| thumbnail.height.map_or(-1, |h| h.max(0)))
}
