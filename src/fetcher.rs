//! Fetches the metadata of remote ids the cache does not hold yet.
//!
//! Misses are fetched with bounded parallelism. Each id walks an ordered list of tiers and
//! only fails once every tier failed. One failing id never stops the others.

use crate::cache::MetadataCache;
use crate::error::Error;
use crate::model::MetadataRecord;
use futures_util::StreamExt;
use futures_util::stream;
use log::{debug, warn};
use pawtag_ytdlp::Retriever;
use pawtag_ytdlp::model::tier::effective_tiers;
use pawtag_ytdlp::model::{Entry, Tier};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// The default number of concurrent fetches.
pub const DEFAULT_WORKERS: usize = 8;
/// The default number of ids per batched invocation.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// How misses are handed to the retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// One invocation per id and tier.
    #[default]
    PerId,
    /// One invocation per chunk of ids and tier.
    Batch,
}

/// The outcome of [`MetadataFetcher::fetch_missing`].
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Every record obtained, from the cache or freshly fetched.
    pub records: HashMap<String, MetadataRecord>,
    /// The ids answered by the cache.
    pub cache_hits: usize,
    /// The ids fetched during this call.
    pub fetched: usize,
    /// The ids no tier could fetch, with the reason.
    pub failures: BTreeMap<String, Error>,
}

/// Fills the cache with the metadata of remote ids.
#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    tiers: Vec<Tier>,
    workers: usize,
    mode: FetchMode,
    batch_size: usize,
}

impl Default for MetadataFetcher {
    fn default() -> Self {
        Self::new(Tier::fetch_defaults())
    }
}

impl MetadataFetcher {
    pub fn new(tiers: Vec<Tier>) -> Self {
        Self {
            tiers,
            workers: DEFAULT_WORKERS,
            mode: FetchMode::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the maximum number of concurrent fetches, at least one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the number of ids per batched invocation, at least one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Returns the metadata of `ids`, fetching and caching the ones the cache misses.
    ///
    /// Cached ids cost no retrieval attempt. `progress` receives `(done, total)` over the
    /// misses each time an id is settled, successfully or not.
    ///
    /// # Arguments
    ///
    /// * `retriever` - The retrieval back end.
    /// * `cache` - The shared cache, updated as records arrive.
    /// * `ids` - The remote ids, duplicates are looked up once.
    /// * `progress` - Called after each settled miss.
    pub async fn fetch_missing<R, C, P>(
        &self,
        retriever: &R,
        cache: &Mutex<C>,
        ids: &[String],
        progress: P,
    ) -> FetchReport
    where
        R: Retriever,
        C: MetadataCache,
        P: Fn(usize, usize),
    {
        let mut report = FetchReport::default();

        let mut seen = HashSet::new();
        let mut misses = Vec::new();
        {
            let cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            for id in ids {
                if !seen.insert(id.as_str()) {
                    continue;
                }
                match cache.get(id) {
                    Some(record) => {
                        report.records.insert(id.clone(), record);
                        report.cache_hits += 1;
                    }
                    None => misses.push(id.clone()),
                }
            }
        }

        debug!(
            "{} cache hits, {} ids to fetch",
            report.cache_hits,
            misses.len()
        );
        if misses.is_empty() {
            return report;
        }

        let tiers = effective_tiers(self.tiers.clone(), retriever.has_credentials(), |t| {
            (t, None)
        });
        let total = misses.len();
        let done = AtomicUsize::new(0);
        let outcomes: Mutex<Vec<(String, Result<MetadataRecord, Error>)>> =
            Mutex::new(Vec::with_capacity(total));

        let settle = |id: String, outcome: Result<MetadataRecord, Error>| {
            if let Ok(record) = &outcome {
                cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .put(&id, record.clone());
            }
            outcomes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((id, outcome));
            progress(done.fetch_add(1, Ordering::SeqCst) + 1, total);
        };

        match self.mode {
            FetchMode::PerId => {
                let tiers = &tiers;
                let settle = &settle;
                stream::iter(misses)
                    .for_each_concurrent(self.workers, |id| async move {
                        let outcome = fetch_with_tiers(retriever, tiers, &id).await;
                        settle(id, outcome);
                    })
                    .await;
            }
            FetchMode::Batch => {
                let chunks: Vec<Vec<String>> =
                    misses.chunks(self.batch_size).map(<[String]>::to_vec).collect();
                let tiers = &tiers;
                let settle = &settle;
                stream::iter(chunks)
                    .for_each_concurrent(self.workers, |chunk| async move {
                        fetch_chunk_with_tiers(retriever, tiers, chunk, settle).await;
                    })
                    .await;
            }
        }

        for (id, outcome) in outcomes.into_inner().unwrap_or_else(PoisonError::into_inner) {
            match outcome {
                Ok(record) => {
                    report.records.insert(id, record);
                    report.fetched += 1;
                }
                Err(e) => {
                    warn!("{}", e);
                    report.failures.insert(id, e);
                }
            }
        }

        report
    }
}

async fn fetch_with_tiers<R: Retriever>(
    retriever: &R,
    tiers: &[Tier],
    id: &str,
) -> Result<MetadataRecord, Error> {
    let mut last = String::from("no tier configured");

    for tier in tiers {
        match retriever.fetch_one(id, tier).await {
            Ok(entry) => {
                debug!("Fetched {} with tier {}", id, tier);
                return Ok(MetadataRecord::from_entry(&entry));
            }
            Err(e) => {
                debug!("Tier {} failed for {}: {}", tier, id, e);
                last = format!("{}: {}", tier, e);
            }
        }
    }

    Err(Error::Fetch {
        id: id.to_string(),
        reason: last,
    })
}

async fn fetch_chunk_with_tiers<R, S>(retriever: &R, tiers: &[Tier], chunk: Vec<String>, settle: S)
where
    R: Retriever,
    S: Fn(String, Result<MetadataRecord, Error>),
{
    let mut remaining = chunk;
    let mut last = String::from("no tier configured");

    for tier in tiers {
        if remaining.is_empty() {
            break;
        }

        match retriever.fetch_batch(&remaining, tier).await {
            Ok(entries) => {
                let mut returned: HashMap<String, Entry> = entries
                    .into_iter()
                    .map(|entry| (entry.id.clone(), entry))
                    .collect();
                debug!(
                    "Tier {} returned {} of {} ids",
                    tier,
                    returned.len(),
                    remaining.len()
                );

                remaining.retain(|id| match returned.remove(id) {
                    Some(entry) => {
                        settle(id.clone(), Ok(MetadataRecord::from_entry(&entry)));
                        false
                    }
                    None => true,
                });
                last = format!("{}: not returned", tier);
            }
            Err(e) => {
                debug!("Tier {} failed for a batch of {}: {}", tier, remaining.len(), e);
                last = format!("{}: {}", tier, e);
            }
        }
    }

    for id in remaining {
        let reason = last.clone();
        settle(id.clone(), Err(Error::Fetch { id, reason }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::{ScriptedRetriever, entry};
    use std::cell::RefCell;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn cached_ids_cost_nothing() {
        let retriever = ScriptedRetriever::default();
        let mut cache = MemoryCache::new();
        cache.put(
            "aaa",
            MetadataRecord {
                title: Some("Cached".to_string()),
                ..Default::default()
            },
        );
        let cache = Mutex::new(cache);

        let report = MetadataFetcher::default()
            .fetch_missing(&retriever, &cache, &ids(&["aaa", "aaa"]), |_, _| {})
            .await;

        assert_eq!(report.cache_hits, 1);
        assert_eq!(report.fetched, 0);
        assert!(retriever.fetch_calls().is_empty());
        assert_eq!(report.records["aaa"].title.as_deref(), Some("Cached"));
    }

    #[tokio::test]
    async fn misses_are_fetched_and_cached() {
        let retriever = ScriptedRetriever::default()
            .with_entry(entry("aaa", "Song A", "Band"))
            .with_entry(entry("bbb", "Song B", "Band"));
        let cache = Mutex::new(MemoryCache::new());
        let progress = RefCell::new(Vec::new());

        let report = MetadataFetcher::default()
            .with_workers(2)
            .fetch_missing(&retriever, &cache, &ids(&["aaa", "bbb"]), |done, total| {
                progress.borrow_mut().push((done, total))
            })
            .await;

        assert_eq!(report.fetched, 2);
        assert!(report.failures.is_empty());
        assert_eq!(cache.lock().unwrap().len(), 2);
        assert_eq!(progress.into_inner(), vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn walks_tiers_until_one_succeeds() {
        let retriever = ScriptedRetriever::default()
            .with_credentials()
            .with_entry(entry("aaa", "Song A", "Band"))
            .with_working_tiers(&["android"]);
        let cache = Mutex::new(MemoryCache::new());

        let report = MetadataFetcher::default()
            .fetch_missing(&retriever, &cache, &ids(&["aaa"]), |_, _| {})
            .await;

        assert_eq!(report.fetched, 1);
        let tiers: Vec<String> = retriever.fetch_calls().into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            tiers,
            vec!["android+cookies", "tv+cookies", "web+cookies", "android"]
        );
    }

    #[tokio::test]
    async fn failure_of_one_id_does_not_block_others() {
        let retriever = ScriptedRetriever::default().with_entry(entry("aaa", "Song A", "Band"));
        let cache = Mutex::new(MemoryCache::new());

        let report = MetadataFetcher::default()
            .fetch_missing(&retriever, &cache, &ids(&["aaa", "gone"]), |_, _| {})
            .await;

        assert_eq!(report.fetched, 1);
        assert!(matches!(report.failures.get("gone"), Some(Error::Fetch { .. })));
        assert!(cache.lock().unwrap().get("gone").is_none());
    }

    #[tokio::test]
    async fn batch_mode_carries_leftovers_to_next_tier() {
        let retriever = ScriptedRetriever::default()
            .with_credentials()
            .with_entry(entry("aaa", "Song A", "Band"))
            .with_entry(entry("bbb", "Song B", "Band"))
            .with_entry(entry("ccc", "Song C", "Band"))
            .with_batch_limit(2);
        let cache = Mutex::new(MemoryCache::new());

        let report = MetadataFetcher::default()
            .with_mode(FetchMode::Batch)
            .with_batch_size(50)
            .fetch_missing(&retriever, &cache, &ids(&["aaa", "bbb", "ccc", "gone"]), |_, _| {})
            .await;

        assert_eq!(report.fetched, 3);
        assert_eq!(report.failures.len(), 1);

        let batches = retriever.batch_calls();
        assert_eq!(batches[0].1.len(), 4);
        assert_eq!(batches[1].1, ids(&["ccc", "gone"]));
        assert_eq!(batches.len(), 5);
    }
}
