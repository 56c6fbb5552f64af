//! Test doubles for the transcode layer.

use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::worker::ffmpeg::{TranscodeEvent, TranscodeInvocation, Transcoder};

struct FakeRun {
    invocation: TranscodeInvocation,
    tx: Option<mpsc::UnboundedSender<TranscodeEvent>>,
}

/// Transcoder whose events are pushed by hand from the test body
#[derive(Default)]
pub struct FakeTranscoder {
    runs: Mutex<Vec<FakeRun>>,
}

impl Transcoder for FakeTranscoder {
    fn start(&self, invocation: TranscodeInvocation) -> mpsc::UnboundedReceiver<TranscodeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.runs.lock().unwrap().push(FakeRun { invocation, tx: Some(tx) });
        rx
    }
}

impl FakeTranscoder {
    /// Job ids in the order their transcodes were started
    pub fn started_jobs(&self) -> Vec<String> {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .map(|run| run.invocation.job_id.clone())
            .collect()
    }

    /// Transcodes whose event stream is still being listened to
    pub fn running(&self) -> usize {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .filter(|run| run.tx.as_ref().is_some_and(|tx| !tx.is_closed()))
            .count()
    }

    pub fn invocation(&self, job_id: &str) -> Option<TranscodeInvocation> {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .find(|run| run.invocation.job_id == job_id)
            .map(|run| run.invocation.clone())
    }

    pub fn send(&self, job_id: &str, event: TranscodeEvent) {
        let runs = self.runs.lock().unwrap();
        let run = runs
            .iter()
            .find(|run| run.invocation.job_id == job_id)
            .expect("job was never started");
        if let Some(tx) = &run.tx {
            let _ = tx.send(event);
        }
    }

    /// Drop the sender without a final event
    pub fn close(&self, job_id: &str) {
        let mut runs = self.runs.lock().unwrap();
        if let Some(run) = runs.iter_mut().find(|run| run.invocation.job_id == job_id) {
            run.tx = None;
        }
    }
}

/// Poll `condition` until it holds, panicking after roughly two seconds
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}
