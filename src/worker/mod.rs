pub mod ffmpeg;
pub mod options;
pub mod passthrough;
pub mod transcode_queue;

#[cfg(test)]
pub mod testing;

pub use ffmpeg::{FfmpegTranscoder, Transcoder};
pub use options::{OptionSet, Resolution};
pub use passthrough::PassthroughProcessor;
pub use transcode_queue::TranscodeQueue;
