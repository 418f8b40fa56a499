//! Export Orchestrator
//!
//! Runs decode → crop → encode for every segment of a job, then packages the
//! successes into one archive.
//!
//! # Job lifecycle
//!
//! ```text
//! Idle ──run()──▶ Running ──▶ Completed
//!                    │
//!                    ├──cancel──▶ Cancelled
//!                    │
//!                    └──packaging error──▶ Failed
//! ```
//!
//! While running, each segment moves from `Pending` to `Succeeded` or
//! `Failed` on its own. A failed segment never stops the batch. Cancellation
//! is checked before each segment starts; a cancelled job keeps no bytes.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ExportSettings;
use crate::engine::{crop, encode, Decoder, PcmBuffer};
use crate::error::{CropperError, Result};
use crate::export::archive::{pack, PackedArchive};
use crate::session::{Segment, SegmentId, Song, SongId};

// ============================================================================
// Job State
// ============================================================================

/// Lifecycle state of an export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    /// Aborted by a job-level error; no archive and no segment bytes
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "Idle"),
            JobState::Running => write!(f, "Running"),
            JobState::Completed => write!(f, "Completed"),
            JobState::Cancelled => write!(f, "Cancelled"),
            JobState::Failed => write!(f, "Failed"),
        }
    }
}

/// Per-segment result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SegmentResult {
    #[default]
    Pending,
    /// Encoded WAV bytes
    Succeeded(Vec<u8>),
    /// Why the segment could not be exported
    Failed(String),
}

/// Cooperative cancellation flag shared between the caller and a running job
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Segments already in flight finish; no new
    /// segment starts.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Progress
// ============================================================================

/// What the job is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Segments,
    Packaging,
    Done,
}

/// Progress snapshot passed to the caller's callback
///
/// `completed` never decreases within a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    pub stage: ExportStage,
    pub completed: usize,
    pub total: usize,
    /// Share of the display scale held back for archive assembly
    pub archive_reserve: f64,
}

impl ExportProgress {
    /// Position on a 0.0..=1.0 display scale
    pub fn fraction(&self) -> f64 {
        let segment_share = 1.0 - self.archive_reserve;
        match self.stage {
            ExportStage::Segments if self.total == 0 => 0.0,
            ExportStage::Segments => self.completed as f64 / self.total as f64 * segment_share,
            ExportStage::Packaging => segment_share + self.archive_reserve / 2.0,
            ExportStage::Done => 1.0,
        }
    }

    /// Position on a 0..=100 display scale
    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }
}

// ============================================================================
// Results
// ============================================================================

/// A segment that could not be exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentFailure {
    /// `None` when the entry was rejected before it became a segment
    pub segment_id: Option<SegmentId>,
    pub segment_name: String,
    pub reason: String,
}

/// Overall result classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportStatus {
    FullySucceeded,
    PartiallySucceeded { failed: usize },
    Failed,
}

/// Counts and reasons reported after a job finishes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub failures: Vec<SegmentFailure>,
    /// Archive entry names of the succeeded segments, in job order
    pub entry_names: Vec<String>,
}

impl ExportSummary {
    pub fn status(&self) -> ExportStatus {
        match (self.succeeded_count, self.failed_count) {
            (0, _) => ExportStatus::Failed,
            (_, 0) => ExportStatus::FullySucceeded,
            (_, failed) => ExportStatus::PartiallySucceeded { failed },
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// At least one segment succeeded and the archive was built
    Completed {
        archive: Vec<u8>,
        summary: ExportSummary,
    },
    /// Every segment failed; there is no archive
    Failed { summary: ExportSummary },
    /// The job was cancelled; every produced byte was discarded
    Cancelled,
}

impl ExportOutcome {
    pub fn summary(&self) -> Option<&ExportSummary> {
        match self {
            ExportOutcome::Completed { summary, .. } | ExportOutcome::Failed { summary } => {
                Some(summary)
            }
            ExportOutcome::Cancelled => None,
        }
    }

    pub fn archive(&self) -> Option<&[u8]> {
        match self {
            ExportOutcome::Completed { archive, .. } => Some(archive),
            _ => None,
        }
    }
}

// ============================================================================
// Export Job
// ============================================================================

/// An ordered batch of segments to export
#[derive(Debug)]
pub struct ExportJob {
    id: Uuid,
    segments: Vec<Segment>,
    results: Vec<SegmentResult>,
    state: JobState,
    cancel: CancelToken,
}

impl ExportJob {
    /// Create a job over `segments`, processed in the given order
    ///
    /// # Errors
    /// * `EmptySelection` - If `segments` is empty
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(CropperError::EmptySelection);
        }
        let results = vec![SegmentResult::Pending; segments.len()];
        Ok(Self {
            id: Uuid::new_v4(),
            segments,
            results,
            state: JobState::Idle,
            cancel: CancelToken::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Per-segment results, index-aligned with [`ExportJob::segments`]
    pub fn results(&self) -> &[SegmentResult] {
        &self.results
    }

    /// A handle that cancels this job from another thread or a callback
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

// ============================================================================
// Decode Cache
// ============================================================================

/// One song's decoded source, shared read-only by that song's segments
struct SourceSlot {
    decoded: OnceLock<std::result::Result<Arc<PcmBuffer>, String>>,
    remaining: AtomicUsize,
}

/// Decodes each song at most once per job and drops the decoded source as
/// soon as its last segment has been processed
struct DecodeCache<'a, D: Decoder> {
    decoder: &'a D,
    slots: Mutex<HashMap<SongId, Arc<SourceSlot>>>,
}

impl<'a, D: Decoder> DecodeCache<'a, D> {
    fn new(decoder: &'a D, segments: &[Segment]) -> Self {
        let mut counts: HashMap<SongId, usize> = HashMap::new();
        for segment in segments {
            *counts.entry(segment.song().id()).or_default() += 1;
        }
        let slots = counts
            .into_iter()
            .map(|(id, count)| {
                let slot = SourceSlot {
                    decoded: OnceLock::new(),
                    remaining: AtomicUsize::new(count),
                };
                (id, Arc::new(slot))
            })
            .collect();

        Self {
            decoder,
            slots: Mutex::new(slots),
        }
    }

    fn slot(&self, song_id: SongId) -> Option<Arc<SourceSlot>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&song_id)
            .cloned()
    }

    /// Decoded source for `song`, decoding on first use
    ///
    /// Errors are kept as the original error's message, so every segment of
    /// the song reports the same reason.
    fn acquire(&self, song: &Song) -> std::result::Result<Arc<PcmBuffer>, String> {
        let decode = || -> std::result::Result<Arc<PcmBuffer>, String> {
            let bytes = song.load_bytes().map_err(|e| e.to_string())?;
            let buffer = self.decoder.decode(&bytes).map_err(|e| e.to_string())?;
            song.record_sample_rate(buffer.sample_rate());
            debug!(
                song = song.name(),
                frames = buffer.len(),
                channels = buffer.channels(),
                "decoded source"
            );
            Ok(Arc::new(buffer))
        };

        match self.slot(song.id()) {
            Some(slot) => slot.decoded.get_or_init(decode).clone(),
            // Not counted up front; decode without caching
            None => decode(),
        }
    }

    /// Mark one of `song_id`'s segments as finished
    fn release(&self, song_id: SongId) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let finished = slots
            .get(&song_id)
            .map_or(false, |slot| slot.remaining.fetch_sub(1, Ordering::SeqCst) == 1);
        if finished {
            slots.remove(&song_id);
            debug!(%song_id, "released decoded source");
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Encoded bytes, or the reason the segment failed
type SegmentOutcome = std::result::Result<Vec<u8>, String>;

/// Serializes progress callbacks so `completed` is reported in order
struct ProgressReporter<'a, F: Fn(ExportProgress) + Sync> {
    completed: Mutex<usize>,
    total: usize,
    archive_reserve: f64,
    callback: &'a F,
}

impl<'a, F: Fn(ExportProgress) + Sync> ProgressReporter<'a, F> {
    fn report(&self, stage: ExportStage, completed: usize) {
        (self.callback)(ExportProgress {
            stage,
            completed,
            total: self.total,
            archive_reserve: self.archive_reserve,
        });
    }

    fn segment_done(&self) {
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        *completed += 1;
        self.report(ExportStage::Segments, *completed);
    }
}

/// Runs export jobs with a given decoder and settings
pub struct ExportOrchestrator<D: Decoder> {
    decoder: D,
    settings: ExportSettings,
}

impl<D: Decoder> ExportOrchestrator<D> {
    pub fn new(decoder: D, settings: ExportSettings) -> Self {
        Self { decoder, settings }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Run `job` to completion or cancellation
    ///
    /// `on_progress` is called after every segment resolves and again for
    /// packaging and completion. It may call `cancel()` on the job's token.
    ///
    /// # Errors
    /// * `JobNotIdle` - If the job has already run
    /// * `WorkerPool` - If the worker threads cannot be started
    /// * `Packaging` - If the archive cannot be assembled
    ///
    /// Segment failures are not errors; they are reported in the outcome.
    pub fn run<F>(&self, job: &mut ExportJob, on_progress: F) -> Result<ExportOutcome>
    where
        F: Fn(ExportProgress) + Sync,
    {
        if job.state != JobState::Idle {
            return Err(CropperError::JobNotIdle {
                job_id: job.id.to_string(),
                state: job.state.to_string(),
            });
        }
        job.state = JobState::Running;

        let total = job.segments.len();
        let workers = self.settings.max_workers.max(1);
        info!(job = %job.id, segments = total, workers, "export started");

        let cache = DecodeCache::new(&self.decoder, &job.segments);
        let reporter = ProgressReporter {
            completed: Mutex::new(0),
            total,
            archive_reserve: self.settings.archive_reserve,
            callback: &on_progress,
        };
        let cancel = job.cancel.clone();

        let run_one = |segment: &Segment| -> Option<SegmentOutcome> {
            if cancel.is_cancelled() {
                return None;
            }
            let result = Self::process_segment(&cache, segment);
            cache.release(segment.song().id());
            reporter.segment_done();
            Some(result)
        };

        let outcomes: Vec<Option<SegmentOutcome>> = if workers == 1 {
            job.segments.iter().map(run_one).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("export-worker-{}", i))
                .build()
                .map_err(|e| CropperError::WorkerPool {
                    reason: e.to_string(),
                })?;
            // Collecting an indexed parallel iterator keeps job order
            pool.install(|| job.segments.par_iter().map(run_one).collect())
        };
        drop(cache);

        if cancel.is_cancelled() {
            job.results.iter_mut().for_each(|r| *r = SegmentResult::Pending);
            job.state = JobState::Cancelled;
            info!(job = %job.id, "export cancelled, discarded all output");
            return Ok(ExportOutcome::Cancelled);
        }

        let mut summary = ExportSummary::default();
        for ((segment, outcome), slot) in job
            .segments
            .iter()
            .zip(outcomes)
            .zip(job.results.iter_mut())
        {
            *slot = match outcome {
                Some(Ok(bytes)) => {
                    summary.succeeded_count += 1;
                    SegmentResult::Succeeded(bytes)
                }
                Some(Err(reason)) => {
                    warn!(segment = segment.name(), error = %reason, "segment export failed");
                    summary.failed_count += 1;
                    summary.failures.push(SegmentFailure {
                        segment_id: Some(segment.id()),
                        segment_name: segment.name().to_string(),
                        reason: reason.clone(),
                    });
                    SegmentResult::Failed(reason)
                }
                None => SegmentResult::Pending,
            };
        }

        if summary.succeeded_count == 0 {
            job.state = JobState::Completed;
            warn!(job = %job.id, failed = summary.failed_count, "export failed entirely");
            return Ok(ExportOutcome::Failed { summary });
        }

        reporter.report(ExportStage::Packaging, total);
        let entries = job
            .segments
            .iter()
            .zip(&job.results)
            .filter_map(|(segment, result)| match result {
                SegmentResult::Succeeded(bytes) => Some((segment.name(), bytes.as_slice())),
                _ => None,
            });
        let packed = pack(entries);
        let packed = Self::settle(job, packed)?;
        summary.entry_names = packed.entry_names;
        reporter.report(ExportStage::Done, total);

        info!(
            job = %job.id,
            succeeded = summary.succeeded_count,
            failed = summary.failed_count,
            archive_bytes = packed.bytes.len(),
            "export completed"
        );
        Ok(ExportOutcome::Completed {
            archive: packed.bytes,
            summary,
        })
    }

    /// Record how packaging ended. On failure the job gives up every
    /// segment's bytes and ends `Failed`.
    fn settle(job: &mut ExportJob, packed: Result<PackedArchive>) -> Result<PackedArchive> {
        match packed {
            Ok(packed) => {
                job.state = JobState::Completed;
                Ok(packed)
            }
            Err(e) => {
                job.results.iter_mut().for_each(|r| *r = SegmentResult::Pending);
                job.state = JobState::Failed;
                warn!(job = %job.id, error = %e, "archive assembly failed");
                Err(e)
            }
        }
    }

    /// Decode, crop and encode one segment. The cropped buffer is dropped as
    /// soon as it has been encoded.
    fn process_segment(cache: &DecodeCache<'_, D>, segment: &Segment) -> SegmentOutcome {
        let source = cache.acquire(segment.song())?;
        let cropped =
            crop(&source, segment.start_time(), segment.end_time()).map_err(|e| e.to_string())?;
        drop(source);
        let bytes = encode(&cropped).map_err(|e| e.to_string())?;
        debug!(
            segment = segment.name(),
            frames = cropped.len(),
            bytes = bytes.len(),
            "segment encoded"
        );
        Ok(bytes)
    }
}
