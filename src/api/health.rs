use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::error;

use crate::registry::{JobCounts, JobRegistry};
use crate::worker::TranscodeQueue;

/// Directories the service reads from and writes to
#[derive(Debug, Clone)]
pub struct StorageDirs {
    pub upload_dir: PathBuf,
    pub processed_dir: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueSummary {
    active_job: Option<String>,
    pending: usize,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue: Option<QueueSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jobs: Option<JobCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint
///
/// Reports the transcode slot and per-status job counts.
#[get("/health")]
async fn health_check(
    registry: web::Data<JobRegistry>,
    queue: web::Data<TranscodeQueue>,
) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        queue: Some(QueueSummary {
            active_job: queue.active_job(),
            pending: queue.pending_len(),
        }),
        jobs: Some(registry.counts()),
        error: None,
    })
}

/// Readiness check endpoint
///
/// Checks that the upload and output directories exist and are writable.
/// Returns 503 until they are.
#[get("/ready")]
async fn readiness_check(dirs: web::Data<StorageDirs>) -> impl Responder {
    for dir in [&dirs.upload_dir, &dirs.processed_dir] {
        if let Err(msg) = check_writable_dir(dir).await {
            error!("Readiness check failed: {}", msg);
            return HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "not_ready".to_string(),
                queue: None,
                jobs: None,
                error: Some(msg),
            });
        }
    }

    HttpResponse::Ok().json(HealthResponse {
        status: "ready".to_string(),
        queue: None,
        jobs: None,
        error: None,
    })
}

/// Liveness check endpoint
///
/// Simple check that the process is alive. Does not check dependencies.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive".to_string(),
        queue: None,
        jobs: None,
        error: None,
    })
}

async fn check_writable_dir(dir: &Path) -> Result<(), String> {
    let metadata = tokio::fs::metadata(dir)
        .await
        .map_err(|e| format!("Directory {:?} unavailable: {}", dir, e))?;

    if !metadata.is_dir() {
        return Err(format!("{:?} is not a directory", dir));
    }
    if metadata.permissions().readonly() {
        return Err(format!("Directory {:?} is read-only", dir));
    }
    Ok(())
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
