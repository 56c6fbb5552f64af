use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Command line overrides for the environment configuration
#[derive(Parser, Debug)]
#[command(name = "enhance-processor", about = "Video enhancement job processor")]
pub struct Cli {
    /// Address to bind the HTTP server to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind the HTTP server to (overrides PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory for rolling log files (overrides LOG_DIR)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// Where uploaded source files are stored
    pub upload_dir: PathBuf,

    /// Where produced artifacts are written and served from
    pub processed_dir: PathBuf,

    /// Maximum upload size (in bytes)
    /// Default: 500MB
    pub max_payload_size: usize,

    /// ffmpeg executable, resolved through PATH when not absolute
    pub ffmpeg_path: PathBuf,

    /// Delay before passthrough jobs complete
    pub passthrough_delay: Duration,

    pub log_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// All variables are optional:
    /// - HOST (default: 127.0.0.1)
    /// - PORT (default: 5000)
    /// - UPLOAD_DIR (default: uploads)
    /// - PROCESSED_DIR (default: processed)
    /// - MAX_PAYLOAD_SIZE: bytes (default: 524288000 = 500MB)
    /// - FFMPEG_PATH (default: ffmpeg)
    /// - PASSTHROUGH_DELAY_MS (default: 3000)
    /// - LOG_DIR (default: logs)
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| format!("PORT must be a valid port number, got '{}'", raw))?,
            Err(_) => 5000,
        };

        let max_payload_size = env::var("MAX_PAYLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500 * 1024 * 1024);

        let passthrough_delay_ms = env::var("PASSTHROUGH_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            upload_dir: env_path("UPLOAD_DIR", "uploads"),
            processed_dir: env_path("PROCESSED_DIR", "processed"),
            max_payload_size,
            ffmpeg_path: env_path("FFMPEG_PATH", "ffmpeg"),
            passthrough_delay: Duration::from_millis(passthrough_delay_ms),
            log_dir: env_path("LOG_DIR", "logs"),
        })
    }

    /// Apply command line overrides on top of the environment
    pub fn with_cli(mut self, cli: Cli) -> Self {
        if let Some(host) = cli.host {
            self.host = host;
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(log_dir) = cli.log_dir {
            self.log_dir = log_dir;
        }
        self
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var_os(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
