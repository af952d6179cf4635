//! The end-to-end run: index, resolve, fetch, cache, tag.

use crate::cache::MetadataCache;
use crate::error::Result;
use crate::fetcher::MetadataFetcher;
use crate::indexer::index_directory;
use crate::model::FileEntry;
use crate::playlist::PlaylistResolver;
use crate::tagging::{Precedence, TagContext, TagWriter, build_tag_meta};
use log::{debug, error, info, warn};
use pawtag_ytdlp::Retriever;
use pawtag_ytdlp::fetcher::thumbnail::Artwork;
use pawtag_ytdlp::metadata::TagMeta;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// What one run works on and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// The directory holding the `NNN - body.ext` files.
    pub dir: PathBuf,
    /// The playlist the files were downloaded from.
    pub playlist_url: String,
    /// An album name overriding the playlist title.
    pub album: Option<String>,
    pub skip_artwork: bool,
    pub skip_year: bool,
    /// Log the tags instead of writing them.
    pub dry_run: bool,
    pub precedence: Precedence,
    /// Where artwork is downloaded before being embedded.
    pub scratch_dir: PathBuf,
}

impl PipelineOptions {
    pub fn new(dir: impl Into<PathBuf>, playlist_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            playlist_url: playlist_url.into(),
            album: None,
            skip_artwork: false,
            skip_year: false,
            dry_run: false,
            precedence: Precedence::default(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// The counters of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Indexed files.
    pub files: usize,
    /// Files tagged, or that would be tagged in a dry run.
    pub tagged: usize,
    /// Files without a playlist entry.
    pub skipped: usize,
    /// Files whose tags could not be written.
    pub failed: usize,
    /// Ids fetched during this run.
    pub fetched: usize,
    /// Ids answered by the cache.
    pub cache_hits: usize,
    /// Ids no tier could fetch.
    pub fetch_failures: usize,
}

impl RunSummary {
    /// Whether every attempted write failed.
    pub fn is_failure(&self) -> bool {
        self.tagged == 0 && self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} tagged, {} skipped, {} failed; {} fetched, {} from cache, {} fetch failures",
            self.files,
            self.tagged,
            self.skipped,
            self.failed,
            self.fetched,
            self.cache_hits,
            self.fetch_failures
        )
    }
}

/// Reconciles a directory of numbered files with a playlist and tags them.
#[derive(Debug)]
pub struct Pipeline<R, W> {
    retriever: R,
    writer: W,
    resolver: PlaylistResolver,
    fetcher: MetadataFetcher,
}

impl<R: Retriever, W: TagWriter> Pipeline<R, W> {
    pub fn new(retriever: R, writer: W) -> Self {
        Self {
            retriever,
            writer,
            resolver: PlaylistResolver::default(),
            fetcher: MetadataFetcher::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: PlaylistResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_fetcher(mut self, fetcher: MetadataFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Runs the whole pipeline once.
    ///
    /// Only a missing directory and an unresolvable playlist abort the run. Fetch failures,
    /// a cache that cannot be saved and tag write failures are logged and counted.
    ///
    /// # Arguments
    ///
    /// * `options` - The directory, playlist and run flags.
    /// * `cache` - The metadata cache, updated with every record fetched.
    /// * `progress` - Receives `(done, total)` during the fetch phase.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] or [`crate::Error::Resolution`].
    pub async fn run<C, P>(
        &self,
        options: &PipelineOptions,
        cache: &Mutex<C>,
        progress: P,
    ) -> Result<RunSummary>
    where
        C: MetadataCache,
        P: Fn(usize, usize),
    {
        let files = index_directory(&options.dir)?;
        let mut summary = RunSummary {
            files: files.len(),
            ..Default::default()
        };
        if files.is_empty() {
            info!("No numbered audio files in {:?}, nothing to do", options.dir);
            return Ok(summary);
        }
        info!("Found {} numbered audio files", files.len());

        let playlist = self
            .resolver
            .resolve(&self.retriever, &options.playlist_url, options.album.as_deref())
            .await?;

        let ids: Vec<String> = files
            .iter()
            .filter_map(|file| playlist.entries.get(&file.ordinal))
            .map(|entry| entry.remote_id.clone())
            .collect();

        let report = self
            .fetcher
            .fetch_missing(&self.retriever, cache, &ids, progress)
            .await;
        summary.fetched = report.fetched;
        summary.cache_hits = report.cache_hits;
        summary.fetch_failures = report.failures.len();

        if report.fetched > 0 {
            let saved = cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .persist();
            if let Err(e) = saved {
                warn!("{}", e);
            }
        }

        let context = TagContext {
            album: &playlist.album_title,
            precedence: options.precedence,
            skip_year: options.skip_year,
        };

        for file in &files {
            let Some(entry) = playlist.entries.get(&file.ordinal) else {
                info!(
                    "Skipping {:?}: no playlist entry at position {}",
                    file.path, file.ordinal
                );
                summary.skipped += 1;
                continue;
            };

            let record = report.records.get(&entry.remote_id);
            let watch_url = self.retriever.watch_url(&entry.remote_id);
            let meta = build_tag_meta(file, entry, record, &watch_url, &context);

            if options.dry_run {
                let artwork = record
                    .and_then(|r| r.thumbnail_url.as_deref())
                    .filter(|_| !options.skip_artwork);
                info!("{}", dry_run_line(file, &meta, artwork));
                summary.tagged += 1;
                continue;
            }

            let artwork = match record.and_then(|r| r.thumbnail_url.as_deref()) {
                Some(url) if !options.skip_artwork => self.fetch_artwork(file, url, options).await,
                _ => None,
            };

            let written = self
                .writer
                .write(file, &meta, artwork.as_ref().map(|a| a.path.as_path()));
            if let Some(artwork) = &artwork {
                if !artwork.cleanup() {
                    warn!("Could not remove temporary artwork {:?}", artwork.path);
                }
            }

            match written {
                Ok(()) => {
                    debug!("Tagged {:?}: {}", file.path, meta);
                    summary.tagged += 1;
                }
                Err(e) => {
                    error!("{:03} ({}): {}", file.ordinal, entry.remote_id, e);
                    summary.failed += 1;
                }
            }
        }

        info!("{}", summary);
        Ok(summary)
    }

    async fn fetch_artwork(
        &self,
        file: &FileEntry,
        url: &str,
        options: &PipelineOptions,
    ) -> Option<Artwork> {
        match self.retriever.fetch_artwork(url, &options.scratch_dir).await {
            Ok(artwork) => Some(artwork),
            Err(e) => {
                warn!("No artwork for {:?}: {}", file.path, e);
                None
            }
        }
    }
}

/// The log line describing everything a dry run would write into `file`.
fn dry_run_line(file: &FileEntry, meta: &TagMeta, artwork_url: Option<&str>) -> String {
    format!(
        "[dry run] {:03} {:?}: {} id={} artwork={}",
        file.ordinal,
        file.path,
        meta,
        if meta.remote_id.is_empty() { "-" } else { meta.remote_id.as_str() },
        artwork_url.unwrap_or("none")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{JsonCache, MemoryCache};
    use crate::error::Error;
    use crate::model::MetadataRecord;
    use crate::testing::{RecordingWriter, ScriptedRetriever, entry};
    use pawtag_ytdlp::model::{ListingItem, PlaylistListing};
    use std::path::Path;

    fn listing(ids: &[(u32, &str)]) -> PlaylistListing {
        PlaylistListing {
            title: Some("Road Trip".to_string()),
            items: ids
                .iter()
                .map(|(ordinal, id)| ListingItem {
                    ordinal: *ordinal,
                    id: id.to_string(),
                    title: Some(format!("Listed {}", id)),
                    url: None,
                })
                .collect(),
        }
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), b"audio").unwrap();
        }
    }

    fn scenario_retriever() -> ScriptedRetriever {
        ScriptedRetriever::default()
            .with_listing("full+cookies", listing(&[(1, "aaa"), (2, "bbb"), (3, "ccc")]))
            .with_entry(entry("aaa", "Song A", "Band A"))
            .with_entry(entry("bbb", "Song B", "Band B - Topic"))
            .with_entry(entry("ccc", "Song C", "Band C"))
    }

    fn cached(title: &str) -> MetadataRecord {
        MetadataRecord {
            title: Some(title.to_string()),
            uploader: Some("Cached Band".to_string()),
            upload_date: Some("20200101".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn tags_files_and_fetches_only_misses() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["001 - Song A.mp3", "002 - Song B.m4a"]);

        let mut memory = MemoryCache::new();
        memory.put("aaa", cached("Cached A"));
        let cache = Mutex::new(memory);

        let pipeline = Pipeline::new(scenario_retriever(), RecordingWriter::default());
        let options = PipelineOptions::new(dir.path(), "https://example.com/list");
        let summary = pipeline.run(&options, &cache, |_, _| {}).await.unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.tagged, 2);
        assert_eq!(summary.cache_hits, 1);
        assert_eq!(summary.fetched, 1);
        assert_eq!(cache.lock().unwrap().len(), 2);

        let fetched: Vec<String> = pipeline
            .retriever
            .fetch_calls()
            .into_iter()
            .map(|(_, id)| id)
            .collect();
        assert_eq!(fetched, vec!["bbb"]);

        let writes = pipeline.writer.written();
        let (_, first, _) = &writes[0];
        assert_eq!(first.title, "Cached A");
        assert_eq!(first.track, 1);
        assert_eq!(first.album, "Road Trip");
        assert_eq!(first.year, Some(2020));

        let (path, second, _) = &writes[1];
        assert!(path.ends_with("002 - Song B.m4a"));
        assert_eq!(second.title, "Song B");
        assert_eq!(second.artist, "Band B");
        assert_eq!(second.remote_id, "bbb");
        assert_eq!(second.year, Some(2023));
    }

    #[tokio::test]
    async fn second_run_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["001 - Song A.mp3", "003 - Song C.mp3"]);
        let cache_path = dir.path().join("state").join("cache.json");
        let options = PipelineOptions::new(dir.path(), "https://example.com/list");

        let first = Pipeline::new(scenario_retriever(), RecordingWriter::default());
        let cache = Mutex::new(JsonCache::load(&cache_path, None));
        let summary = first.run(&options, &cache, |_, _| {}).await.unwrap();
        assert_eq!(summary.fetched, 2);

        let second = Pipeline::new(scenario_retriever(), RecordingWriter::default());
        let cache = Mutex::new(JsonCache::load(&cache_path, None));
        let summary = second.run(&options, &cache, |_, _| {}).await.unwrap();

        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.cache_hits, 2);
        assert!(second.retriever.fetch_calls().is_empty());

        let tags = |p: &Pipeline<ScriptedRetriever, RecordingWriter>| {
            p.writer
                .written()
                .into_iter()
                .map(|(_, meta, _)| meta)
                .collect::<Vec<_>>()
        };
        assert_eq!(tags(&first), tags(&second));
    }

    #[tokio::test]
    async fn files_without_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["001 - Song A.mp3", "009 - Bonus.mp3"]);

        let pipeline = Pipeline::new(scenario_retriever(), RecordingWriter::default());
        let cache = Mutex::new(MemoryCache::new());
        let options = PipelineOptions::new(dir.path(), "https://example.com/list");
        let summary = pipeline.run(&options, &cache, |_, _| {}).await.unwrap();

        assert_eq!(summary.tagged, 1);
        assert_eq!(summary.skipped, 1);
        assert!(!summary.is_failure());
        assert_eq!(pipeline.writer.written().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["001 - Song A.mp3", "002 - Song B.mp3"]);
        let before = std::fs::read(dir.path().join("001 - Song A.mp3")).unwrap();

        let pipeline = Pipeline::new(scenario_retriever(), crate::tagging::FileTagWriter);
        let cache = Mutex::new(MemoryCache::new());
        let mut options = PipelineOptions::new(dir.path(), "https://example.com/list");
        options.dry_run = true;

        let summary = pipeline.run(&options, &cache, |_, _| {}).await.unwrap();

        assert_eq!(summary.tagged, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(std::fs::read(dir.path().join("001 - Song A.mp3")).unwrap(), before);
    }

    #[test]
    fn dry_run_line_names_id_and_artwork() {
        let file = FileEntry {
            path: PathBuf::from("002 - Song B.m4a"),
            ordinal: 2,
            format: crate::model::AudioFormat::M4a,
            body: "Song B".to_string(),
        };
        let meta = TagMeta {
            title: "Song B".to_string(),
            track: 2,
            remote_id: "bbb".to_string(),
            ..Default::default()
        };

        let line = dry_run_line(&file, &meta, Some("https://img.example.com/bbb.jpg"));
        assert!(line.starts_with("[dry run] 002 "));
        assert!(line.contains("title=\"Song B\""));
        assert!(line.contains("id=bbb"));
        assert!(line.contains("artwork=https://img.example.com/bbb.jpg"));

        assert!(dry_run_line(&file, &meta, None).ends_with("artwork=none"));
    }

    #[tokio::test]
    async fn write_failures_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["001 - Song A.mp3", "002 - Song B.mp3"]);

        let pipeline = Pipeline::new(scenario_retriever(), RecordingWriter::failing_on(&[1, 2]));
        let cache = Mutex::new(MemoryCache::new());
        let options = PipelineOptions::new(dir.path(), "https://example.com/list");
        let summary = pipeline.run(&options, &cache, |_, _| {}).await.unwrap();

        assert_eq!(summary.failed, 2);
        assert!(summary.is_failure());
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_listing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["001 - Artist - Local.mp3"]);

        let retriever = ScriptedRetriever::default()
            .with_listing("full+cookies", listing(&[(1, "gone")]));
        let pipeline = Pipeline::new(retriever, RecordingWriter::default());
        let cache = Mutex::new(MemoryCache::new());
        let options = PipelineOptions::new(dir.path(), "https://example.com/list");
        let summary = pipeline.run(&options, &cache, |_, _| {}).await.unwrap();

        assert_eq!(summary.fetch_failures, 1);
        assert_eq!(summary.tagged, 1);
        let (_, meta, artwork) = &pipeline.writer.written()[0];
        assert_eq!(meta.title, "Listed gone");
        assert_eq!(meta.artist, "Artist");
        assert_eq!(meta.source_url, "https://example.com/watch?v=gone");
        assert!(!artwork);
    }

    #[tokio::test]
    async fn temporary_artwork_is_removed_whatever_the_write_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        touch(dir.path(), &["001 - Song A.mp3", "002 - Song B.mp3"]);

        let with_thumbnail = |id: &str, title: &str| pawtag_ytdlp::model::Entry {
            thumbnail: Some(format!("https://img.example.com/{}.jpg", id)),
            ..entry(id, title, "Band")
        };
        let retriever = ScriptedRetriever::default()
            .with_listing("full+cookies", listing(&[(1, "aaa"), (2, "bbb")]))
            .with_entry(with_thumbnail("aaa", "Song A"))
            .with_entry(with_thumbnail("bbb", "Song B"))
            .with_artwork(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]);

        let pipeline = Pipeline::new(retriever, RecordingWriter::failing_on(&[2]));
        let cache = Mutex::new(MemoryCache::new());
        let mut options = PipelineOptions::new(dir.path(), "https://example.com/list");
        options.scratch_dir = scratch.path().to_path_buf();
        let summary = pipeline.run(&options, &cache, |_, _| {}).await.unwrap();

        assert_eq!(summary.tagged, 1);
        assert_eq!(summary.failed, 1);
        let (_, _, artwork) = &pipeline.writer.written()[0];
        assert!(artwork);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn no_artwork_flag_skips_the_download() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        touch(dir.path(), &["001 - Song A.mp3"]);

        let retriever = ScriptedRetriever::default()
            .with_listing("full+cookies", listing(&[(1, "aaa")]))
            .with_entry(pawtag_ytdlp::model::Entry {
                thumbnail: Some("https://img.example.com/aaa.jpg".to_string()),
                ..entry("aaa", "Song A", "Band")
            })
            .with_artwork(&[0xFF, 0xD8]);

        let pipeline = Pipeline::new(retriever, RecordingWriter::default());
        let cache = Mutex::new(MemoryCache::new());
        let mut options = PipelineOptions::new(dir.path(), "https://example.com/list");
        options.scratch_dir = scratch.path().to_path_buf();
        options.skip_artwork = true;
        pipeline.run(&options, &cache, |_, _| {}).await.unwrap();

        let (_, _, artwork) = &pipeline.writer.written()[0];
        assert!(!artwork);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_directory_needs_no_playlist() {
        let dir = tempfile::tempdir().unwrap();

        let pipeline = Pipeline::new(ScriptedRetriever::default(), RecordingWriter::default());
        let cache = Mutex::new(MemoryCache::new());
        let options = PipelineOptions::new(dir.path(), "https://example.com/list");
        let summary = pipeline.run(&options, &cache, |_, _| {}).await.unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(pipeline.retriever.listing_calls().is_empty());
    }

    #[tokio::test]
    async fn fatal_errors_abort() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Mutex::new(MemoryCache::new());

        let pipeline = Pipeline::new(ScriptedRetriever::default(), RecordingWriter::default());
        let options = PipelineOptions::new(dir.path().join("missing"), "url");
        let err = pipeline.run(&options, &cache, |_, _| {}).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        touch(dir.path(), &["001 - Song.mp3"]);
        let options = PipelineOptions::new(dir.path(), "url");
        let err = pipeline.run(&options, &cache, |_, _| {}).await.unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
    }
}
