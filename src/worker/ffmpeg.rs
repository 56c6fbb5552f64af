use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::worker::options::OptionSet;

/// Number of trailing stderr lines kept for error reports
const STDERR_TAIL: usize = 10;

/// Lifecycle signal emitted by a running transcode
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeEvent {
    /// The external process was spawned
    Started { command_line: String },
    /// Raw completion estimate, 0.0 when the input duration is unknown
    Progress { percent: f64 },
    Error { message: String },
    Finished,
}

/// Everything needed to run one transcode
#[derive(Debug, Clone)]
pub struct TranscodeInvocation {
    pub job_id: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: OptionSet,
}

impl TranscodeInvocation {
    /// Build the full ffmpeg argument list
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-i".to_string(),
            self.input.to_string_lossy().to_string(),
        ];
        args.extend(self.options.output_args());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Source of transcode lifecycle events
///
/// `start` must not block: implementations run the work in the background
/// and report through the returned channel. A well-behaved stream ends with
/// exactly one `Error` or `Finished` event.
pub trait Transcoder: Send + Sync {
    fn start(&self, invocation: TranscodeInvocation) -> mpsc::UnboundedReceiver<TranscodeEvent>;
}

/// Errors raised while driving the ffmpeg process
#[derive(Debug)]
pub enum TranscodeError {
    /// Process could not be spawned
    Spawn(std::io::Error),

    /// Reading process output or waiting on it failed
    Io(std::io::Error),

    /// Process exited unsuccessfully
    Exit { code: Option<i32>, stderr: String },
}

impl fmt::Display for TranscodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeError::Spawn(e) => write!(f, "Failed to start ffmpeg: {}", e),
            TranscodeError::Io(e) => write!(f, "ffmpeg I/O error: {}", e),
            TranscodeError::Exit { code, stderr } => {
                match code {
                    Some(code) => write!(f, "ffmpeg exited with status {}", code)?,
                    None => write!(f, "ffmpeg was terminated by a signal")?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for TranscodeError {}

impl From<std::io::Error> for TranscodeError {
    fn from(e: std::io::Error) -> Self {
        TranscodeError::Io(e)
    }
}

/// Runs the real ffmpeg binary as a child process
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn start(&self, invocation: TranscodeInvocation) -> mpsc::UnboundedReceiver<TranscodeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let binary = self.binary.clone();

        tokio::spawn(async move {
            let event = match execute(&binary, &invocation, &tx).await {
                Ok(()) => TranscodeEvent::Finished,
                Err(e) => TranscodeEvent::Error { message: e.to_string() },
            };
            if tx.send(event).is_err() {
                debug!("No listener for final event of job {}", invocation.job_id);
            }
        });

        rx
    }
}

async fn execute(
    binary: &Path,
    invocation: &TranscodeInvocation,
    tx: &mpsc::UnboundedSender<TranscodeEvent>,
) -> Result<(), TranscodeError> {
    let args = invocation.args();
    let command_line = format!("{} {}", binary.display(), args.join(" "));

    let mut child = Command::new(binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(TranscodeError::Spawn)?;

    info!("Spawned ffmpeg for job {}: {}", invocation.job_id, command_line);
    let _ = tx.send(TranscodeEvent::Started { command_line });

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TranscodeError::Io(std::io::Error::other("stdout not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| TranscodeError::Io(std::io::Error::other("stderr not captured")))?;

    // ffmpeg echoes input metadata verbatim, so lines are not guaranteed UTF-8
    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    let mut stdout_open = true;
    let mut stderr_open = true;

    let mut tracker = ProgressTracker::default();
    let mut stderr_tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);

    while stdout_open || stderr_open {
        tokio::select! {
            read = stdout.read_until(b'\n', &mut stdout_buf), if stdout_open => {
                if read? == 0 {
                    stdout_open = false;
                } else {
                    let line = take_line(&mut stdout_buf);
                    if let Some(percent) = tracker.observe_progress_line(&line) {
                        let _ = tx.send(TranscodeEvent::Progress { percent });
                    }
                }
            }
            read = stderr.read_until(b'\n', &mut stderr_buf), if stderr_open => {
                if read? == 0 {
                    stderr_open = false;
                } else {
                    let line = take_line(&mut stderr_buf);
                    tracker.observe_log_line(&line);
                    if stderr_tail.len() == STDERR_TAIL {
                        stderr_tail.pop_front();
                    }
                    stderr_tail.push_back(line);
                }
            }
        }
    }

    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        let stderr = stderr_tail
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Err(TranscodeError::Exit { code: status.code(), stderr })
    }
}

/// Drains one buffered line, replacing invalid UTF-8
fn take_line(buf: &mut Vec<u8>) -> String {
    let line = String::from_utf8_lossy(buf)
        .trim_end_matches(['\r', '\n'])
        .to_string();
    buf.clear();
    line
}

/// Derives a completion percentage from ffmpeg output
///
/// The input duration comes from the `Duration:` banner on stderr, the
/// position from `out_time_us` in the `-progress` blocks on stdout.
#[derive(Debug, Default)]
struct ProgressTracker {
    duration_ms: Option<u64>,
    out_time_ms: u64,
}

impl ProgressTracker {
    fn observe_log_line(&mut self, line: &str) {
        if self.duration_ms.is_some() {
            return;
        }
        if let Some(rest) = line.trim().strip_prefix("Duration:") {
            let stamp = rest.trim().split(',').next().unwrap_or_default();
            self.duration_ms = parse_timestamp(stamp).filter(|ms| *ms > 0);
        }
    }

    /// Returns a percentage at the end of each progress block
    fn observe_progress_line(&mut self, line: &str) -> Option<f64> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = (us.max(0) / 1000) as u64;
                }
                None
            }
            "progress" => Some(self.percent()),
            _ => None,
        }
    }

    fn percent(&self) -> f64 {
        match self.duration_ms {
            Some(duration) => (self.out_time_ms as f64 / duration as f64 * 100.0).clamp(0.0, 100.0),
            None => 0.0,
        }
    }
}

/// Parse `HH:MM:SS.ff` into milliseconds
fn parse_timestamp(stamp: &str) -> Option<u64> {
    let mut parts = stamp.trim().splitn(3, ':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some((hours * 3600 + minutes * 60) * 1000 + (seconds * 1000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::options::Resolution;

    fn invocation() -> TranscodeInvocation {
        TranscodeInvocation {
            job_id: "job-1".to_string(),
            input: PathBuf::from("uploads/in.mov"),
            output: PathBuf::from("processed/enhanced_job-1.mp4"),
            options: OptionSet {
                resolution: Resolution::Uhd4k,
                denoise: true,
                deblur: false,
                color_correct: false,
            },
        }
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<TranscodeEvent>) -> Vec<TranscodeEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_invocation_args() {
        let args = invocation().args();

        assert_eq!(&args[..7], &["-y", "-hide_banner", "-nostats", "-progress", "pipe:1", "-i", "uploads/in.mov"]);
        assert_eq!(args[7], "-vf");
        assert_eq!(args[8], "hqdn3d=1.5:1.5:6:6,scale=3840:-2:flags=lanczos");
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "128k"]));
        assert_eq!(args.last().map(String::as_str), Some("processed/enhanced_job-1.mp4"));
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:00:10.00"), Some(10_000));
        assert_eq!(parse_timestamp("01:02:03.50"), Some(3_723_500));
        assert_eq!(parse_timestamp("N/A"), None);
        assert_eq!(parse_timestamp("00:00"), None);
    }

    #[test]
    fn test_progress_tracker() {
        let mut tracker = ProgressTracker::default();

        tracker.observe_log_line("  Duration: 00:00:20.00, start: 0.000000, bitrate: 1205 kb/s");
        tracker.observe_log_line("  Duration: 00:05:00.00, start: 0.000000, bitrate: 1 kb/s");
        assert_eq!(tracker.duration_ms, Some(20_000));

        assert_eq!(tracker.observe_progress_line("frame=120"), None);
        assert_eq!(tracker.observe_progress_line("out_time_us=5000000"), None);
        let percent = tracker.observe_progress_line("progress=continue").unwrap();
        assert!((percent - 25.0).abs() < 0.001);

        tracker.observe_progress_line("out_time_us=N/A");
        let percent = tracker.observe_progress_line("progress=continue").unwrap();
        assert!((percent - 25.0).abs() < 0.001);
    }

    #[test]
    fn test_progress_without_duration_is_zero() {
        let mut tracker = ProgressTracker::default();
        tracker.observe_log_line("  Duration: N/A, bitrate: N/A");
        tracker.observe_progress_line("out_time_us=9000000");
        assert_eq!(tracker.observe_progress_line("progress=end"), Some(0.0));
    }

    #[test]
    fn test_exit_error_message() {
        let err = TranscodeError::Exit {
            code: Some(1),
            stderr: "Invalid data found when processing input".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ffmpeg exited with status 1: Invalid data found when processing input"
        );
    }

    #[tokio::test]
    async fn test_missing_binary_reports_error_without_start() {
        let transcoder = FfmpegTranscoder::new("/nonexistent/ffmpeg-binary");
        let events = collect(transcoder.start(invocation())).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            TranscodeEvent::Error { message } => assert!(message.starts_with("Failed to start ffmpeg")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_exit_reports_finished() {
        let transcoder = FfmpegTranscoder::new("true");
        let events = collect(transcoder.start(invocation())).await;

        assert!(matches!(events.first(), Some(TranscodeEvent::Started { .. })));
        assert_eq!(events.last(), Some(&TranscodeEvent::Finished));
    }

    #[test]
    fn test_take_line_replaces_invalid_utf8() {
        let mut buf = b"title : Caf\xe9 Vid\xe9o\r\n".to_vec();
        assert_eq!(take_line(&mut buf), "title : Caf\u{FFFD} Vid\u{FFFD}o");
        assert!(buf.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_latin1_metadata_does_not_abort_transcode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ffmpeg");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             printf '  Duration: 00:00:10.00, start: 0.000000\\n' >&2\n\
             printf '    title           : Caf\\351 Vid\\351o\\n' >&2\n\
             printf 'out_time_us=5000000\\nprogress=continue\\n'\n\
             printf 'out_time_us=10000000\\nprogress=end\\n'\n\
             exit 0\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let transcoder = FfmpegTranscoder::new(script.clone());
        let events = collect(transcoder.start(invocation())).await;

        assert!(matches!(events.first(), Some(TranscodeEvent::Started { .. })));
        assert!(events.iter().any(|e| matches!(e, TranscodeEvent::Progress { .. })));
        assert_eq!(events.last(), Some(&TranscodeEvent::Finished));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_exit_reports_error() {
        let transcoder = FfmpegTranscoder::new("false");
        let events = collect(transcoder.start(invocation())).await;

        assert!(matches!(events.first(), Some(TranscodeEvent::Started { .. })));
        assert_eq!(
            events.last(),
            Some(&TranscodeEvent::Error { message: "ffmpeg exited with status 1".to_string() })
        );
    }
}
