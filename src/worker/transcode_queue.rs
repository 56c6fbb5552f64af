use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::registry::JobRegistry;
use crate::worker::ffmpeg::{TranscodeEvent, TranscodeInvocation, Transcoder};
use crate::worker::options::OptionSet;

const OUTPUT_PREFIX: &str = "enhanced_";
const OUTPUT_EXTENSION: &str = "mp4";

/// Name of the artifact produced for a job, relative to the output directory
pub fn output_filename(job_id: &str) -> String {
    format!("{}{}.{}", OUTPUT_PREFIX, job_id, OUTPUT_EXTENSION)
}

/// A pending transcode, consumed when it is dequeued
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub job_id: String,
    pub input_path: PathBuf,
    pub options: OptionSet,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<TranscodeRequest>,
    /// Job bound to the single transcode slot
    active: Option<String>,
}

/// FIFO queue feeding a single transcode slot
///
/// # Architecture
/// - `enqueue` appends a request and immediately tries to fill the slot
/// - Admission ("is the slot free?" plus "take it") happens under one mutex
/// - Each admitted transcode gets a bridging task that turns its lifecycle
///   events into registry updates, then frees the slot and admits the next
///   request
///
/// There is no timeout: a transcode that never reports a result holds the
/// slot forever.
pub struct TranscodeQueue {
    registry: Arc<JobRegistry>,
    transcoder: Arc<dyn Transcoder>,
    output_dir: PathBuf,
    state: Mutex<QueueState>,
}

impl TranscodeQueue {
    /// Create a new queue writing artifacts into `output_dir`
    pub fn new(
        registry: Arc<JobRegistry>,
        transcoder: Arc<dyn Transcoder>,
        output_dir: impl Into<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            transcoder,
            output_dir: output_dir.into(),
            state: Mutex::new(QueueState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a request; starts it right away when the slot is free
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(self: &Arc<Self>, job_id: &str, input_path: impl Into<PathBuf>, options: OptionSet) {
        let request = TranscodeRequest {
            job_id: job_id.to_string(),
            input_path: input_path.into(),
            options,
        };

        let depth = {
            let mut state = self.lock();
            state.pending.push_back(request);
            state.pending.len()
        };
        debug!("Enqueued transcode for job {} (pending={})", job_id, depth);

        self.process_next();
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn active_job(&self) -> Option<String> {
        self.lock().active.clone()
    }

    /// Fill the slot with the next admissible request, if any
    fn process_next(self: &Arc<Self>) {
        let request = {
            let mut state = self.lock();
            if state.active.is_some() {
                return;
            }

            loop {
                let Some(request) = state.pending.pop_front() else {
                    return;
                };
                if self.registry.get_job(&request.job_id).is_none() {
                    warn!("Skipping transcode for unknown job {}", request.job_id);
                    continue;
                }
                state.active = Some(request.job_id.clone());
                break request;
            }
        };

        let output_file = output_filename(&request.job_id);
        let invocation = TranscodeInvocation {
            job_id: request.job_id.clone(),
            input: request.input_path,
            output: self.output_dir.join(&output_file),
            options: request.options,
        };

        info!(
            "Starting transcode for job {} with filters: {:?}",
            invocation.job_id,
            invocation.options.video_filters()
        );

        let events = self.transcoder.start(invocation);
        let queue = Arc::clone(self);
        tokio::spawn(queue.bridge(request.job_id, output_file, events));
    }

    /// Relay one transcode's events into the registry, then free the slot
    async fn bridge(
        self: Arc<Self>,
        job_id: String,
        output_file: String,
        mut events: mpsc::UnboundedReceiver<TranscodeEvent>,
    ) {
        let mut settled = false;

        while let Some(event) = events.recv().await {
            match event {
                TranscodeEvent::Started { command_line } => {
                    debug!("Job {} transcoder started: {}", job_id, command_line);
                    self.registry.update_progress(&job_id, 0);
                }
                TranscodeEvent::Progress { percent } => {
                    let percent = percent.round();
                    if percent > 0.0 && percent < 100.0 {
                        self.registry.update_progress(&job_id, percent as u8);
                    }
                }
                TranscodeEvent::Error { message } => {
                    error!("Job {} transcode failed: {}", job_id, message);
                    self.registry.fail_job(&job_id, &message);
                    settled = true;
                    break;
                }
                TranscodeEvent::Finished => {
                    info!("Job {} finished processing: {}", job_id, output_file);
                    self.registry.complete_job(&job_id, &output_file);
                    settled = true;
                    break;
                }
            }
        }
        drop(events);

        if !settled {
            error!("Job {} transcoder exited without reporting a result", job_id);
            self.registry
                .fail_job(&job_id, "Transcoder exited without reporting a result");
        }

        self.release(&job_id);
        self.process_next();
    }

    fn release(&self, job_id: &str) {
        let mut state = self.lock();
        if state.active.as_deref() == Some(job_id) {
            state.active = None;
        }
    }
}
