use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Job status enum representing the state of a job
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// In-memory representation of an enhancement job with all fields
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    pub progress: u8,
    pub original_file: PathBuf,
    pub output_file: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub(crate) fn new(id: String, job_type: &str, original_file: PathBuf) -> Self {
        Self {
            id,
            job_type: job_type.to_string(),
            status: JobStatus::Queued,
            progress: 0,
            original_file,
            output_file: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Completed and failed jobs accept no further writes
    pub fn is_terminal(&self) -> bool {
        self.completed_at.is_some()
    }
}
