//! Scan execution.

use super::cost::{round_to, CostEstimate, WorkCounts};
use super::result::{counters, timings, ScanDebug, ScanResult, StageMetrics};
use crate::config::{RunCapabilities, ScanSettings};
use crate::core::comparator::{exact_groups, near_duplicate_groups_with_events, PhotoGroup};
use crate::core::download::{
    ByteFetcher, DownloadClient, DownloadPolicy, FixtureSource, GlobalOnlyResolver, HostResolver,
    HttpFetcher, SystemResolver,
};
use crate::core::hasher::{HashingService, PerceptualPair};
use crate::core::narrowing::{candidate_item_count, narrow, CandidateSet, NarrowingDebug};
use crate::core::photo::{sort_chronologically, PhotoItem};
use crate::error::{EngineError, Result, ValidationError};
use crate::events::{
    null_sender, Event, EventSender, HashEvent, HashProgress, HashStage, ScanEvent, ScanPhase,
    ScanSummary,
};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Run one scan with the default network stack
pub fn run_scan(photos: &[PhotoItem], settings: &ScanSettings, explain: bool) -> Result<ScanResult> {
    ScanEngine::new(settings.clone()).run(photos, explain)
}

/// Builder for a [`ScanEngine`]
pub struct ScanEngineBuilder {
    settings: ScanSettings,
    fetcher: Option<Arc<dyn ByteFetcher>>,
    resolver: Option<Arc<dyn HostResolver>>,
}

impl ScanEngineBuilder {
    pub fn new(settings: ScanSettings) -> Self {
        Self {
            settings,
            fetcher: None,
            resolver: None,
        }
    }

    /// Replace the HTTP transport
    pub fn fetcher(mut self, fetcher: Arc<dyn ByteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replace DNS resolution
    pub fn resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn build(self) -> ScanEngine {
        ScanEngine {
            settings: self.settings,
            fetcher: self.fetcher,
            resolver: self.resolver.unwrap_or_else(|| Arc::new(SystemResolver)),
        }
    }
}

/// Sequences narrowing, hashing and grouping for one batch of photos.
///
/// The engine itself holds only read-only settings. Every run builds its
/// own download client and hashing service, so concurrent runs never share
/// a cache or a counter.
pub struct ScanEngine {
    settings: ScanSettings,
    fetcher: Option<Arc<dyn ByteFetcher>>,
    resolver: Arc<dyn HostResolver>,
}

impl ScanEngine {
    pub fn new(settings: ScanSettings) -> Self {
        ScanEngineBuilder::new(settings).build()
    }

    pub fn builder(settings: ScanSettings) -> ScanEngineBuilder {
        ScanEngineBuilder::new(settings)
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Run a scan without events
    pub fn run(&self, photos: &[PhotoItem], explain: bool) -> Result<ScanResult> {
        self.run_with_events(photos, explain, &null_sender())
    }

    /// Run a scan with event reporting
    pub fn run_with_events(
        &self,
        photos: &[PhotoItem],
        explain: bool,
        events: &EventSender,
    ) -> Result<ScanResult> {
        let result = self.execute(photos, explain, events);
        if let Err(error) = &result {
            events.send(Event::Scan(ScanEvent::Error {
                message: error.to_string(),
            }));
        }
        result
    }

    fn execute(
        &self,
        photos: &[PhotoItem],
        explain: bool,
        events: &EventSender,
    ) -> Result<ScanResult> {
        let start_time = Instant::now();
        self.settings.validate()?;
        ensure_unique_ids(photos)?;

        let run_id = Uuid::new_v4().simple().to_string();
        let capabilities = RunCapabilities::resolve(&self.settings, explain);
        let policy = DownloadPolicy::for_run(&self.settings, &capabilities);
        let fetcher = self.fetcher(&policy)?;
        let hashing = HashingService::new(
            DownloadClient::new(
                policy,
                FixtureSource::for_run(&capabilities),
                fetcher,
                Arc::clone(&self.resolver),
            )
            .with_events(events.clone()),
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.scan_download_workers)
            .build()
            .map_err(|e| EngineError::Config(format!("failed to start worker pool: {e}")))?;

        events.send(Event::Scan(ScanEvent::Started {
            run_id: run_id.clone(),
            total_photos: photos.len(),
        }));
        let mut metrics = StageMetrics::default();
        metrics.set_count(counters::SELECTED_IMAGES, photos.len());

        // Phase 1: candidate narrowing
        phase(events, ScanPhase::Narrowing);
        let started = Instant::now();
        let mut narrowing_debug = capabilities.explain.then(NarrowingDebug::default);
        let narrowed = narrow(photos, narrowing_debug.as_mut());
        metrics.set_timing(timings::CANDIDATE_NARROWING, elapsed_ms(started));
        metrics.set_count(counters::CANDIDATE_SETS, narrowed.len());
        metrics.set_count(counters::CANDIDATE_ITEMS, candidate_item_count(&narrowed));
        let narrowing_found_sets = !narrowed.is_empty();

        // Phase 2: small-input fallback
        let fallback = small_input_fallback(
            &narrowed,
            photos,
            self.settings.scan_small_input_fallback_max,
        );
        let fallback_items = candidate_item_count(&fallback);
        metrics.set_count(counters::FALLBACK_TRIGGERED, usize::from(!fallback.is_empty()));
        metrics.set_count(counters::FALLBACK_CANDIDATE_ITEMS, fallback_items);
        let candidate_sets = if fallback.is_empty() {
            narrowed
        } else {
            debug!(photos = fallback_items, "Narrowing found no candidates, comparing the whole batch");
            events.send(Event::Scan(ScanEvent::FallbackApplied {
                candidate_items: fallback_items,
            }));
            metrics.set_count(counters::CANDIDATE_SETS, fallback.len());
            metrics.set_count(counters::CANDIDATE_ITEMS, fallback_items);
            fallback
        };

        // Phase 3: byte hashing
        phase(events, ScanPhase::ByteHashing);
        let started = Instant::now();
        let downloadable: Vec<&PhotoItem> = photos.iter().filter(|p| p.is_downloadable()).collect();
        let digests: HashMap<String, String> = hash_all(
            &pool,
            &downloadable,
            HashStage::Bytes,
            events,
            |photo| hashing.byte_hash(photo),
        )?;
        metrics.set_timing(timings::BYTE_HASHING, elapsed_ms(started));
        metrics.set_count(counters::BYTE_HASHES, hashing.byte_hash_count());

        // Phase 4: exact grouping
        phase(events, ScanPhase::ExactGrouping);
        let started = Instant::now();
        let groups_exact = exact_groups(photos, &digests);
        metrics.set_timing(timings::EXACT_GROUPING, elapsed_ms(started));

        // Phase 5: perceptual hashing and comparison over what is left
        phase(events, ScanPhase::PerceptualHashing);
        let started = Instant::now();
        let hashable_sets = hashable_candidate_sets(candidate_sets, &groups_exact);
        let mut seen = HashSet::new();
        let to_hash: Vec<&PhotoItem> = hashable_sets
            .iter()
            .flatten()
            .filter(|photo| seen.insert(photo.id.as_str()))
            .collect();
        let perceptual: HashMap<String, PerceptualPair> = hash_all(
            &pool,
            &to_hash,
            HashStage::Perceptual,
            events,
            |photo| hashing.perceptual_hashes(photo),
        )?;

        phase(events, ScanPhase::Comparing);
        let thresholds = self.settings.thresholds();
        let near = near_duplicate_groups_with_events(&hashable_sets, &perceptual, &thresholds, events);
        metrics.set_timing(timings::PERCEPTUAL_HASHING, elapsed_ms(started));
        metrics.set_count(counters::PERCEPTUAL_HASHES, hashing.perceptual_hash_count());
        metrics.set_count(counters::COMPARISONS_EXECUTED, near.comparisons);
        metrics.set_count(counters::DOWNLOADS_PERFORMED, hashing.downloads().download_count());

        // Phase 6: cost and result assembly
        phase(events, ScanPhase::Finalizing);
        if let Some(narrowing_debug) = narrowing_debug {
            metrics.set_count(counters::REASON_MISSING_DIMS, narrowing_debug.missing_dims_ids.len());
            metrics.set_count(
                counters::REASON_TIME_BUCKET,
                narrowing_debug.time_bucket_mismatch_ids.len(),
            );
            metrics.set_count(counters::REASON_MIME, narrowing_debug.mime_mismatch_ids.len());
            metrics.debug = Some(ScanDebug::from_narrowing(narrowing_debug, narrowing_found_sets));
        }

        let cost_estimate = CostEstimate::from_counts(
            &self.settings.cost_rates(),
            &WorkCounts {
                downloads: hashing.downloads().download_count(),
                byte_hashes: hashing.byte_hash_count(),
                perceptual_hashes: hashing.perceptual_hash_count(),
                comparisons: near.comparisons,
            },
        );

        let result = ScanResult {
            run_id,
            input_count: photos.len(),
            stage_metrics: metrics,
            cost_estimate,
            groups_exact,
            groups_very_similar: near.very_similar,
            groups_possibly_similar: near.possibly_similar,
        };

        info!(
            run_id = %result.run_id,
            photos = result.input_count,
            exact = result.groups_exact.len(),
            very_similar = result.groups_very_similar.len(),
            possibly_similar = result.groups_possibly_similar.len(),
            total_cost = result.cost_estimate.total_cost,
            "Scan completed"
        );

        events.send(Event::Scan(ScanEvent::Completed {
            summary: ScanSummary {
                run_id: result.run_id.clone(),
                total_photos: result.input_count,
                exact_groups: result.groups_exact.len(),
                very_similar_groups: result.groups_very_similar.len(),
                possibly_similar_groups: result.groups_possibly_similar.len(),
                downloads_performed: hashing.downloads().download_count(),
                total_cost: result.cost_estimate.total_cost,
                duration_ms: start_time.elapsed().as_millis() as u64,
            },
        }));

        Ok(result)
    }

    /// The injected transport, or an HTTP client whose DNS answers are
    /// held to the same address rules as validation
    fn fetcher(&self, policy: &DownloadPolicy) -> Result<Arc<dyn ByteFetcher>> {
        match &self.fetcher {
            Some(fetcher) => Ok(Arc::clone(fetcher)),
            None => {
                let resolver = GlobalOnlyResolver::new(Arc::clone(&self.resolver), policy.exempt_hosts());
                Ok(Arc::new(HttpFetcher::new(self.settings.download_timeout(), resolver)?))
            }
        }
    }
}

fn phase(events: &EventSender, phase: ScanPhase) {
    events.send(Event::Scan(ScanEvent::PhaseChanged { phase }));
}

fn elapsed_ms(started: Instant) -> f64 {
    round_to(started.elapsed().as_secs_f64() * 1000.0, 2)
}

fn ensure_unique_ids(photos: &[PhotoItem]) -> Result<()> {
    let mut seen = HashSet::with_capacity(photos.len());
    for photo in photos {
        if !seen.insert(photo.id.as_str()) {
            return Err(ValidationError::DuplicatePhotoId {
                photo_id: photo.id.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// One set of every photo when narrowing found nothing in a small batch
pub fn small_input_fallback(
    narrowed: &[CandidateSet],
    photos: &[PhotoItem],
    fallback_max: usize,
) -> Vec<CandidateSet> {
    if !narrowed.is_empty() || photos.len() > fallback_max || photos.len() < 2 {
        return Vec::new();
    }
    let mut everything = photos.to_vec();
    sort_chronologically(&mut everything);
    vec![everything]
}

/// Drop photos that cannot be hashed or already sit in an exact group,
/// then drop sets left with fewer than two members.
pub fn hashable_candidate_sets(sets: Vec<CandidateSet>, groups_exact: &[PhotoGroup]) -> Vec<CandidateSet> {
    let exact_ids: HashSet<&str> = groups_exact
        .iter()
        .flat_map(|group| group.items.iter().map(|item| item.id.as_str()))
        .collect();

    sets.into_iter()
        .map(|set| {
            set.into_iter()
                .filter(|photo| photo.is_downloadable() && !exact_ids.contains(photo.id.as_str()))
                .collect::<CandidateSet>()
        })
        .filter(|set| set.len() >= 2)
        .collect()
}

/// Hash photos on the worker pool, failing on the first error
fn hash_all<T, F>(
    pool: &ThreadPool,
    photos: &[&PhotoItem],
    stage: HashStage,
    events: &EventSender,
    hash: F,
) -> Result<HashMap<String, T>>
where
    T: Send,
    F: Fn(&PhotoItem) -> Result<T> + Sync,
{
    let total = photos.len();
    events.send(Event::Hash(HashEvent::Started {
        stage,
        total_photos: total,
    }));
    let completed = AtomicUsize::new(0);

    let hashes = pool.install(|| {
        photos
            .par_iter()
            .map(|&photo| {
                let value = hash(photo)?;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                events.send(Event::Hash(HashEvent::Progress(HashProgress {
                    stage,
                    completed: done,
                    total,
                    photo_id: photo.id.clone(),
                })));
                Ok((photo.id.clone(), value))
            })
            .collect::<Result<HashMap<String, T>>>()
    })?;

    events.send(Event::Hash(HashEvent::Completed {
        stage,
        total_hashed: hashes.len(),
    }));
    Ok(hashes)
}
