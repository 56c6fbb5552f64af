use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

use crate::registry::models::{Job, JobStatus};

/// Per-status job counts, used for health reporting
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct JobCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// In-memory store for job records
///
/// The registry is the single owner of every `Job` for the lifetime of the
/// process. Readers get snapshot clones; writers mutate under one coarse
/// mutex since jobs carry no cross-job invariants.
///
/// Mutators are tolerant of unknown ids and of jobs that already reached a
/// terminal state: both cases are silent no-ops.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a new queued job and return a snapshot of it
    pub fn create_job(&self, job_type: &str, original_file: impl Into<PathBuf>) -> Job {
        let id = Uuid::new_v4().to_string();
        let job = Job::new(id.clone(), job_type, original_file.into());

        debug!("Creating job: id={}, type={}", job.id, job.job_type);
        self.lock().insert(id, job.clone());
        job
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.lock().get(job_id).cloned()
    }

    /// Mark the job as processing with the given progress percentage
    pub fn update_progress(&self, job_id: &str, percent: u8) {
        self.mutate(job_id, "update_progress", |job| {
            job.status = JobStatus::Processing;
            job.progress = percent.min(100);
        });
    }

    pub fn complete_job(&self, job_id: &str, output_file: &str) {
        self.mutate(job_id, "complete_job", |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.output_file = Some(output_file.to_string());
            job.completed_at = Some(Utc::now());
        });
    }

    pub fn fail_job(&self, job_id: &str, error: &str) {
        self.mutate(job_id, "fail_job", |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error.to_string());
            job.completed_at = Some(Utc::now());
        });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn counts(&self) -> JobCounts {
        self.lock()
            .values()
            .fold(JobCounts::default(), |mut counts, job| {
                match job.status {
                    JobStatus::Queued => counts.queued += 1,
                    JobStatus::Processing => counts.processing += 1,
                    JobStatus::Completed => counts.completed += 1,
                    JobStatus::Failed => counts.failed += 1,
                }
                counts
            })
    }

    fn mutate(&self, job_id: &str, op: &str, apply: impl FnOnce(&mut Job)) {
        let mut jobs = self.lock();
        match jobs.get_mut(job_id) {
            Some(job) if job.is_terminal() => {
                debug!("Ignoring {} on terminal job {} ({:?})", op, job_id, job.status);
            }
            Some(job) => apply(job),
            None => debug!("Ignoring {} on unknown job {}", op, job_id),
        }
    }
}
