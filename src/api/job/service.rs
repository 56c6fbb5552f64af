use actix_multipart::form::tempfile::TempFile;
use actix_web::{HttpResponse, ResponseError};
use chrono::Utc;
use rand::Rng;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tracing::{error, info, warn};
use validator::ValidationErrors;

use crate::api::validation::{field_errors, ErrorResponse};
use crate::registry::JobRegistry;
use crate::worker::{PassthroughProcessor, TranscodeQueue};
use super::dto::{JobStatusResponse, UploadResponse};
use super::models::UploadFields;

/// Service-level errors
#[derive(Debug)]
pub enum ServiceError {
    /// Upload request carried no file
    NoFile,

    /// Validation failed
    ValidationError(ValidationErrors),

    /// Reading or writing a stored file failed
    StorageError(std::io::Error),

    /// Job not found
    NotFound(String),

    /// Requested output file does not exist
    FileNotFound(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NoFile => write!(f, "No file uploaded"),
            ServiceError::ValidationError(e) => write!(f, "Validation error: {}", e),
            ServiceError::StorageError(e) => write!(f, "Storage error: {}", e),
            ServiceError::NotFound(id) => write!(f, "Job not found: {}", id),
            ServiceError::FileNotFound(name) => write!(f, "File not found: {}", name),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::NoFile => {
                warn!("Upload rejected: no file");
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "No file uploaded".to_string(),
                    fields: serde_json::json!({"file": {"errors": ["A file is required"]}}),
                })
            }
            ServiceError::ValidationError(errors) => {
                warn!("Validation error: {}", errors);
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Validation failed".to_string(),
                    fields: field_errors(errors),
                })
            }
            ServiceError::StorageError(e) => {
                error!("Storage error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Upload failed".to_string(),
                    fields: serde_json::json!({"message": "Storage error occurred"}),
                })
            }
            ServiceError::NotFound(id) => {
                warn!("Job not found: {}", id);
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Job not found".to_string(),
                    fields: serde_json::json!({"message": format!("Job with id {} not found", id)}),
                })
            }
            ServiceError::FileNotFound(name) => {
                warn!("Download of missing file: {}", name);
                HttpResponse::NotFound().body("File not found")
            }
        }
    }
}

/// Job service containing business logic
pub struct JobService {
    registry: Arc<JobRegistry>,
    queue: Arc<TranscodeQueue>,
    passthrough: PassthroughProcessor,
    upload_dir: PathBuf,
    processed_dir: PathBuf,
}

impl JobService {
    /// Create a new JobService instance
    pub fn new(
        registry: Arc<JobRegistry>,
        queue: Arc<TranscodeQueue>,
        passthrough: PassthroughProcessor,
        upload_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            queue,
            passthrough,
            upload_dir: upload_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    /// Persist an uploaded file under the upload directory
    ///
    /// Files are renamed to `file-<unix millis>-<random><ext>` so client
    /// supplied names never reach the filesystem.
    pub async fn store_upload(&self, file: &TempFile) -> Result<PathBuf, ServiceError> {
        let extension = file
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str());
        let destination = self.upload_dir.join(upload_filename(extension));

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(ServiceError::StorageError)?;
        tokio::fs::copy(file.file.path(), &destination)
            .await
            .map_err(ServiceError::StorageError)?;

        info!("Service: Stored upload of {} bytes at {:?}", file.size, destination);
        Ok(destination)
    }

    /// Create a job for a stored upload and hand it to its processor
    ///
    /// # Business Logic
    /// - Creates the job in the registry (status `queued`)
    /// - Video tools go to the transcode queue
    /// - Other tools go to the passthrough processor
    /// - Returns without waiting for processing
    pub fn submit(&self, fields: &UploadFields, stored_path: PathBuf) -> UploadResponse {
        let job = self.registry.create_job(&fields.tool_type, stored_path);
        info!("Service: Created job {} (type={})", job.id, job.job_type);

        if fields.is_transcode() {
            self.queue
                .enqueue(&job.id, job.original_file.clone(), fields.option_set());
        } else {
            self.passthrough.submit(&job.id, job.original_file.clone());
        }

        UploadResponse {
            success: true,
            job_id: job.id,
            message: "File uploaded and processing started".to_string(),
        }
    }

    pub fn status(&self, job_id: &str) -> Result<JobStatusResponse, ServiceError> {
        self.registry
            .get_job(job_id)
            .map(JobStatusResponse::from)
            .ok_or_else(|| ServiceError::NotFound(job_id.to_string()))
    }

    /// Open a produced artifact from the output directory, returning its size
    pub async fn open_output(&self, filename: &str) -> Result<(File, u64), ServiceError> {
        let not_found = |e: std::io::Error| match e.kind() {
            ErrorKind::NotFound => ServiceError::FileNotFound(filename.to_string()),
            _ => ServiceError::StorageError(e),
        };
        let file = File::open(self.processed_dir.join(filename)).await.map_err(not_found)?;
        let len = file.metadata().await.map_err(not_found)?.len();
        Ok((file, len))
    }
}

fn upload_filename(extension: Option<&str>) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    match extension {
        Some(ext) => format!("file-{}-{}.{}", millis, suffix, ext),
        None => format!("file-{}-{}", millis, suffix),
    }
}
