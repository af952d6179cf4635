//! pawtag reconciles a directory of `NNN - Title.ext` audio files with the playlist they were
//! downloaded from, then writes title, artist, album, track, year, source and artwork tags.
//!
//! Remote metadata comes from 'yt-dlp' through [`pawtag_ytdlp::Retriever`], and is kept in a
//! JSON cache so that reruns cost no network access.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod indexer;
pub mod model;
pub mod pipeline;
pub mod playlist;
pub mod tagging;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineOptions, RunSummary};
