//! Conversion queue and job lifecycle
//!
//! The orchestrator owns the job collection. Callers get snapshots; every
//! mutation goes through the transition functions below, each bumping a
//! version counter so observers can cheaply detect change.
//!
//! Batches are sequential by default: one job runs parse → demux → encode →
//! assemble to completion before the next begins, in submission order. With
//! `max_parallel_jobs > 1` queued jobs run on a bounded rayon pool instead;
//! each job still owns its own buffers and encoder, and each status change is
//! applied atomically under the lock.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ConvertConfig;
use crate::encoder::{LameEncoderFactory, Mp3EncoderFactory};
use crate::error::{ConvertError, ConvertResult};
use crate::intake::{has_wav_extension, is_wav_source, source_name};
use crate::job::{ConversionJob, JobId, JobSource, JobStatus};
use crate::pipeline::ConversionPipeline;

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH SUMMARY
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome counts of one `convert_all` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Jobs that reached `Done`
    pub converted: usize,
    /// Jobs that reached `Error`
    pub failed: usize,
    /// Jobs removed from the queue before their turn
    pub skipped: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.converted + self.failed + self.skipped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Converted,
    Failed,
    Skipped,
}

/// Clears the busy flag when the batch ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Owns the conversion queue
pub struct ConversionOrchestrator<F: Mp3EncoderFactory = LameEncoderFactory> {
    config: ConvertConfig,
    pipeline: ConversionPipeline<F>,
    jobs: RwLock<Vec<ConversionJob>>,
    busy: AtomicBool,
    version: AtomicU64,
}

impl ConversionOrchestrator<LameEncoderFactory> {
    /// Orchestrator backed by native LAME
    pub fn new(config: ConvertConfig) -> Self {
        let factory = LameEncoderFactory::new(config.quality);
        Self::with_factory(config, factory)
    }
}

impl Default for ConversionOrchestrator<LameEncoderFactory> {
    fn default() -> Self {
        Self::new(ConvertConfig::default())
    }
}

impl<F: Mp3EncoderFactory> ConversionOrchestrator<F> {
    /// Orchestrator with a custom MP3 encoder
    pub fn with_factory(config: ConvertConfig, factory: F) -> Self {
        Self {
            pipeline: ConversionPipeline::new(&config, factory),
            config,
            jobs: RwLock::new(Vec::new()),
            busy: AtomicBool::new(false),
            version: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Intake
    // ───────────────────────────────────────────────────────────────────────────

    /// Queue WAV files from disk. Non-WAV paths are dropped.
    /// Bytes are read when each job starts.
    pub fn add_files<I, P>(&self, paths: I) -> ConvertResult<Vec<JobId>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.ensure_idle()?;

        let mut new_jobs = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if !has_wav_extension(path) {
                log::warn!("Skipping non-WAV file: {}", path.display());
                continue;
            }
            new_jobs.push(ConversionJob::new(
                source_name(path),
                JobSource::Path(path.to_path_buf()),
            ));
        }

        Ok(self.enqueue(new_jobs))
    }

    /// Queue an in-memory WAV buffer. Returns `None` when the intake filter
    /// drops it.
    pub fn add_buffer(
        &self,
        name: &str,
        mime: Option<&str>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> ConvertResult<Option<JobId>> {
        self.ensure_idle()?;

        if !is_wav_source(name, mime) {
            log::warn!("Skipping non-WAV buffer: {} ({:?})", name, mime);
            return Ok(None);
        }

        let job = ConversionJob::new(name, JobSource::Bytes(bytes.into()));
        Ok(self.enqueue(vec![job]).into_iter().next())
    }

    fn enqueue(&self, new_jobs: Vec<ConversionJob>) -> Vec<JobId> {
        if new_jobs.is_empty() {
            return Vec::new();
        }

        let ids: Vec<JobId> = new_jobs.iter().map(|job| job.id.clone()).collect();
        for job in &new_jobs {
            log::info!("Queued {} ({})", job.source_name, job.id);
        }

        self.jobs.write().extend(new_jobs);
        self.bump_version();
        ids
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Conversion
    // ───────────────────────────────────────────────────────────────────────────

    /// Convert every `Queued` job. A failing job is marked `Error` and the
    /// batch carries on. Jobs in any other state are left alone.
    pub fn convert_all(&self) -> ConvertResult<BatchSummary> {
        let _guard = self.begin_batch()?;
        let start = Instant::now();

        let queued: Vec<(JobId, String, JobSource)> = self
            .jobs
            .read()
            .iter()
            .filter(|job| job.status == JobStatus::Queued)
            .map(|job| (job.id.clone(), job.source_name.clone(), job.source.clone()))
            .collect();

        log::info!("Converting {} queued file(s)", queued.len());

        let outcomes = self.run_batch(&queued);

        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            match outcome {
                JobOutcome::Converted => summary.converted += 1,
                JobOutcome::Failed => summary.failed += 1,
                JobOutcome::Skipped => summary.skipped += 1,
            }
        }

        log::info!(
            "Batch finished in {:?}: {} converted, {} failed, {} skipped",
            start.elapsed(),
            summary.converted,
            summary.failed,
            summary.skipped
        );

        Ok(summary)
    }

    fn run_batch(&self, queued: &[(JobId, String, JobSource)]) -> Vec<JobOutcome> {
        let max_parallel = self.config.max_parallel_jobs;

        if max_parallel > 1 && queued.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(max_parallel)
                .build()
            {
                Ok(pool) => {
                    return pool.install(|| {
                        queued
                            .par_iter()
                            .map(|(id, name, source)| self.run_job(id, name, source))
                            .collect()
                    });
                }
                Err(e) => {
                    log::warn!("Worker pool unavailable ({}), converting sequentially", e);
                }
            }
        }

        queued
            .iter()
            .map(|(id, name, source)| self.run_job(id, name, source))
            .collect()
    }

    /// Full lifecycle of one job. Errors never escape: they become the
    /// job's error message.
    fn run_job(&self, id: &JobId, name: &str, source: &JobSource) -> JobOutcome {
        let started = self.transition(id, |job| {
            if job.status == JobStatus::Queued {
                job.begin();
                true
            } else {
                false
            }
        });

        if started != Some(true) {
            log::debug!("Skipping {} (no longer queued)", id);
            return JobOutcome::Skipped;
        }

        log::info!("Converting {}", name);
        let start = Instant::now();

        let result = source
            .read()
            .and_then(|bytes| self.pipeline.convert(name, &bytes));

        match result {
            Ok(output) => {
                log::info!(
                    "Converted {} → {} ({} bytes, {:.2}s audio) in {:?}",
                    name,
                    output.info.file_name,
                    output.info.size_bytes,
                    output.info.duration_seconds,
                    start.elapsed()
                );
                self.transition(id, |job| job.complete(output.bytes, output.info));
                JobOutcome::Converted
            }
            Err(e) => {
                let message = e.to_string();
                log::warn!("Conversion of {} failed: {}", name, message);
                self.transition(id, |job| job.fail(message));
                JobOutcome::Failed
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Removal
    // ───────────────────────────────────────────────────────────────────────────

    /// Remove one job. A `Converting` job cannot be removed.
    pub fn remove(&self, id: &JobId) -> ConvertResult<ConversionJob> {
        let mut jobs = self.jobs.write();
        let index = jobs
            .iter()
            .position(|job| &job.id == id)
            .ok_or_else(|| ConvertError::JobNotFound(id.clone()))?;

        if jobs[index].status == JobStatus::Converting {
            return Err(ConvertError::JobInProgress(id.clone()));
        }

        let job = jobs.remove(index);
        drop(jobs);
        self.bump_version();

        log::info!("Removed {} ({:?})", job.source_name, job.status);
        Ok(job)
    }

    /// Remove every job. Rejected while a batch is running.
    pub fn reset(&self) -> ConvertResult<usize> {
        self.ensure_idle()?;

        let removed = {
            let mut jobs = self.jobs.write();
            // Checked again under the lock: a batch may have started meanwhile
            if jobs.iter().any(|job| job.status == JobStatus::Converting) {
                return Err(ConvertError::Busy);
            }
            std::mem::take(&mut *jobs).len()
        };

        self.bump_version();
        log::info!("Queue reset ({} job(s) removed)", removed);
        Ok(removed)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ───────────────────────────────────────────────────────────────────────────

    /// Snapshot of all jobs in queue order
    pub fn jobs(&self) -> Vec<ConversionJob> {
        self.jobs.read().clone()
    }

    pub fn job(&self, id: &JobId) -> Option<ConversionJob> {
        self.jobs.read().iter().find(|job| &job.id == id).cloned()
    }

    pub fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.jobs.read().iter().find(|job| &job.id == id).map(|job| job.status)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    pub fn queued_count(&self) -> usize {
        self.jobs
            .read()
            .iter()
            .filter(|job| job.status == JobStatus::Queued)
            .count()
    }

    /// True while `convert_all` runs
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Incremented on every change to the job collection
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Internals
    // ───────────────────────────────────────────────────────────────────────────

    fn ensure_idle(&self) -> ConvertResult<()> {
        if self.is_busy() {
            Err(ConvertError::Busy)
        } else {
            Ok(())
        }
    }

    fn begin_batch(&self) -> ConvertResult<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ConvertError::Busy)?;
        Ok(BusyGuard(&self.busy))
    }

    /// Apply `f` to job `id` under the write lock
    fn transition<R>(&self, id: &JobId, f: impl FnOnce(&mut ConversionJob) -> R) -> Option<R> {
        let result = {
            let mut jobs = self.jobs.write();
            jobs.iter_mut().find(|job| &job.id == id).map(f)
        };
        if result.is_some() {
            self.bump_version();
        }
        result
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodedChunk, Mp3Encode};
    use std::sync::Barrier;

    /// Emits one byte per encode call plus one on flush
    #[derive(Default)]
    struct TinyFactory {
        gate: Option<(Arc<Barrier>, Arc<Barrier>)>,
    }

    struct TinyEncoder {
        gate: Option<(Arc<Barrier>, Arc<Barrier>)>,
    }

    impl Mp3Encode for TinyEncoder {
        fn encode_buffer(&mut self, _: &[i16], _: Option<&[i16]>) -> ConvertResult<EncodedChunk> {
            // Hold the first call until the test has inspected the queue
            if let Some((started, release)) = self.gate.take() {
                started.wait();
                release.wait();
            }
            Ok(vec![0x42])
        }

        fn flush(&mut self) -> ConvertResult<EncodedChunk> {
            Ok(vec![0x43])
        }
    }

    impl Mp3EncoderFactory for TinyFactory {
        type Encoder = TinyEncoder;

        fn construct(&self, _: u16, _: u32, _: u32) -> ConvertResult<TinyEncoder> {
            Ok(TinyEncoder {
                gate: self.gate.clone(),
            })
        }
    }

    fn wav_bytes(channels: u16, frames: usize) -> Vec<u8> {
        let data_len = (frames * channels as usize * 2) as u32;
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&44100u32.to_le_bytes());
        out.extend_from_slice(&(44100 * channels as u32 * 2).to_le_bytes());
        out.extend_from_slice(&(channels * 2).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(out.len() + data_len as usize, 0);
        out
    }

    fn queue() -> ConversionOrchestrator<TinyFactory> {
        ConversionOrchestrator::with_factory(ConvertConfig::default(), TinyFactory::default())
    }

    #[test]
    fn test_batch_isolates_failure() {
        let queue = queue();
        let a = queue.add_buffer("a.wav", None, wav_bytes(1, 2000)).unwrap().unwrap();
        let b = queue.add_buffer("b.wav", None, vec![0u8; 64]).unwrap().unwrap();
        let c = queue.add_buffer("c.wav", None, wav_bytes(2, 500)).unwrap().unwrap();

        let summary = queue.convert_all().unwrap();
        assert_eq!(summary, BatchSummary { converted: 2, failed: 1, skipped: 0 });

        assert_eq!(queue.status(&a), Some(JobStatus::Done));
        assert_eq!(queue.status(&b), Some(JobStatus::Error));
        assert_eq!(queue.status(&c), Some(JobStatus::Done));

        let failed = queue.job(&b).unwrap();
        assert!(!failed.error_message.unwrap().is_empty());
        assert!(failed.result_bytes.is_none());

        let done = queue.job(&a).unwrap();
        let info = done.result_info.unwrap();
        assert_eq!(info.file_name, "a.mp3");
        // 2 frames (1152 + 848) + flush
        assert_eq!(done.result_bytes.unwrap().len(), 3);
        assert_eq!(info.size_bytes, 3);
        assert!(!queue.is_busy());
    }

    #[test]
    fn test_only_queued_jobs_rerun() {
        let queue = queue();
        queue.add_buffer("a.wav", None, wav_bytes(1, 10)).unwrap();
        queue.add_buffer("b.wav", None, b"nope".to_vec()).unwrap();
        queue.convert_all().unwrap();

        let before = queue.jobs();
        let summary = queue.convert_all().unwrap();
        assert_eq!(summary.total(), 0);

        let after = queue.jobs();
        for (x, y) in before.iter().zip(&after) {
            assert_eq!(x.status, y.status);
            assert_eq!(x.error_message, y.error_message);
        }

        // New work is picked up, old work is not
        let c = queue.add_buffer("c.wav", None, wav_bytes(1, 10)).unwrap().unwrap();
        assert_eq!(queue.convert_all().unwrap().converted, 1);
        assert_eq!(queue.status(&c), Some(JobStatus::Done));
    }

    #[test]
    fn test_intake_filter() {
        let queue = queue();
        assert_eq!(queue.add_buffer("notes.txt", None, vec![1u8]).unwrap(), None);
        assert!(queue.add_buffer("capture", Some("audio/wav"), vec![1u8]).unwrap().is_some());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_terminal_jobs() {
        let queue = queue();
        let ok = queue.add_buffer("ok.wav", None, wav_bytes(1, 10)).unwrap().unwrap();
        let bad = queue.add_buffer("bad.wav", None, vec![0u8; 4]).unwrap().unwrap();
        queue.convert_all().unwrap();

        assert_eq!(queue.remove(&ok).unwrap().status, JobStatus::Done);
        assert_eq!(queue.remove(&bad).unwrap().status, JobStatus::Error);
        assert!(queue.is_empty());
        assert!(matches!(queue.remove(&ok), Err(ConvertError::JobNotFound(_))));
    }

    #[test]
    fn test_guards_while_converting() {
        let started = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let factory = TinyFactory {
            gate: Some((Arc::clone(&started), Arc::clone(&release))),
        };
        let queue = ConversionOrchestrator::with_factory(ConvertConfig::default(), factory);
        let id = queue.add_buffer("slow.wav", None, wav_bytes(1, 10)).unwrap().unwrap();

        std::thread::scope(|s| {
            let batch = s.spawn(|| queue.convert_all());
            started.wait();

            assert!(queue.is_busy());
            assert_eq!(queue.status(&id), Some(JobStatus::Converting));
            assert!(matches!(queue.remove(&id), Err(ConvertError::JobInProgress(_))));
            assert!(matches!(queue.reset(), Err(ConvertError::Busy)));
            assert!(matches!(queue.convert_all(), Err(ConvertError::Busy)));
            assert!(matches!(
                queue.add_buffer("more.wav", None, wav_bytes(1, 10)),
                Err(ConvertError::Busy)
            ));
            assert_eq!(queue.len(), 1);

            release.wait();
            let summary = batch.join().unwrap().unwrap();
            assert_eq!(summary.converted, 1);
        });

        assert!(!queue.is_busy());
        assert_eq!(queue.status(&id), Some(JobStatus::Done));
        assert!(queue.remove(&id).is_ok());
    }

    #[test]
    fn test_reset_and_version() {
        let queue = queue();
        assert_eq!(queue.version(), 0);

        queue.add_buffer("a.wav", None, wav_bytes(1, 10)).unwrap();
        queue.add_buffer("b.wav", None, wav_bytes(1, 10)).unwrap();
        let v = queue.version();
        assert!(v >= 2);

        assert_eq!(queue.reset().unwrap(), 2);
        assert!(queue.is_empty());
        assert!(queue.version() > v);
    }

    #[test]
    fn test_parallel_pool_preserves_isolation() {
        let config = ConvertConfig::default().with_max_parallel_jobs(3);
        let queue = ConversionOrchestrator::with_factory(config, TinyFactory::default());

        let mut ids = Vec::new();
        for i in 0..8 {
            let bytes = if i % 3 == 1 {
                vec![0u8; 16]
            } else {
                wav_bytes(2, 3000)
            };
            ids.push(queue.add_buffer(&format!("take{}.wav", i), None, bytes).unwrap().unwrap());
        }

        let summary = queue.convert_all().unwrap();
        assert_eq!(summary.converted, 5);
        assert_eq!(summary.failed, 3);

        for (i, id) in ids.iter().enumerate() {
            let expected = if i % 3 == 1 { JobStatus::Error } else { JobStatus::Done };
            assert_eq!(queue.status(id), Some(expected));
        }
        // Queue order is submission order regardless of completion order
        let names: Vec<String> = queue.jobs().into_iter().map(|j| j.source_name).collect();
        assert_eq!(names[0], "take0.wav");
        assert_eq!(names[7], "take7.wav");
    }
}
