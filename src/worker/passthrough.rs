use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info};

use crate::registry::JobRegistry;

/// Completes jobs for tools that have no transcode workflow
///
/// After a fixed delay the upload is copied verbatim into the output
/// directory and the job is completed. Runs outside the transcode slot.
#[derive(Clone)]
pub struct PassthroughProcessor {
    registry: Arc<JobRegistry>,
    output_dir: PathBuf,
    delay: Duration,
}

impl PassthroughProcessor {
    pub fn new(registry: Arc<JobRegistry>, output_dir: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            registry,
            output_dir: output_dir.into(),
            delay,
        }
    }

    /// Name of the copied artifact, keeping the upload's extension
    pub fn output_filename(job_id: &str, input_path: &Path) -> String {
        match input_path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("enhanced_{}.{}", job_id, ext),
            None => format!("enhanced_{}", job_id),
        }
    }

    pub fn submit(&self, job_id: &str, input_path: impl Into<PathBuf>) -> JoinHandle<()> {
        let processor = self.clone();
        let job_id = job_id.to_string();
        let input_path = input_path.into();

        tokio::spawn(async move {
            sleep(processor.delay).await;

            let output_file = Self::output_filename(&job_id, &input_path);
            let output_path = processor.output_dir.join(&output_file);

            match tokio::fs::copy(&input_path, &output_path).await {
                Ok(bytes) => {
                    info!("Passthrough job {} copied {} bytes to {}", job_id, bytes, output_file);
                    processor.registry.complete_job(&job_id, &output_file);
                }
                Err(e) => {
                    error!("Passthrough job {} failed to copy {:?}: {}", job_id, input_path, e);
                    processor
                        .registry
                        .fail_job(&job_id, &format!("Failed to copy upload: {}", e));
                }
            }
        })
    }
}
