use actix_multipart::form::MultipartFormConfig;
use actix_web::{App, HttpServer, web};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, filter::LevelFilter};
mod api;
use crate::api::{
    health::{health_config, StorageDirs},
    job::{handlers::job_config, JobService},
    validation,
};
mod config;
mod registry;
mod shutdown;
mod worker;
use crate::registry::JobRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::worker::{FfmpegTranscoder, PassthroughProcessor, TranscodeQueue};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = config::Cli::parse();

    // Load configuration from environment, then apply CLI overrides
    let config::Config {
        host,
        port,
        upload_dir,
        processed_dir,
        max_payload_size,
        ffmpeg_path,
        passthrough_delay,
        log_dir,
    } = config::Config::from_env()
        .expect("Failed to load configuration")
        .with_cli(cli);

    // Create logs directory if it doesn't exist
    std::fs::create_dir_all(&log_dir)
        .expect("Failed to create logs directory");

    // Initialize file-based logging with daily rotation and level separation
    // Log files will be created as: logs/info.log.2024-12-22, logs/error.log.2024-12-22, etc.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_file = tracing_appender::rolling::daily(&log_dir, "info.log");
    let warn_file = tracing_appender::rolling::daily(&log_dir, "warn.log");
    let error_file = tracing_appender::rolling::daily(&log_dir, "error.log");
    let debug_file = tracing_appender::rolling::daily(&log_dir, "debug.log");

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let debug_layer = tracing_subscriber::fmt::layer()
        .with_writer(debug_file)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .with(debug_layer)
        .init();

    // Uploaded sources and produced artifacts live on the filesystem
    std::fs::create_dir_all(&upload_dir)?;
    std::fs::create_dir_all(&processed_dir)?;

    info!("Starting enhance-processor application");
    info!("Configuration loaded successfully:");
    info!("  - Max payload size: {} bytes", max_payload_size);
    info!("  - Upload directory: {:?}", upload_dir);
    info!("  - Output directory: {:?}", processed_dir);
    info!("  - ffmpeg binary: {:?}", ffmpeg_path);
    info!("  - Passthrough delay: {:?}", passthrough_delay);

    // One registry and one transcode slot for the whole process
    let registry = Arc::new(JobRegistry::new());
    let transcoder = Arc::new(FfmpegTranscoder::new(ffmpeg_path));
    let queue = TranscodeQueue::new(registry.clone(), transcoder, processed_dir.clone());
    let passthrough = PassthroughProcessor::new(registry.clone(), processed_dir.clone(), passthrough_delay);

    let job_service = web::Data::new(JobService::new(
        registry.clone(),
        queue.clone(),
        passthrough,
        upload_dir.clone(),
        processed_dir.clone(),
    ));
    let registry_data = web::Data::from(registry.clone());
    let queue_data = web::Data::from(queue.clone());
    let dirs_data = web::Data::new(StorageDirs {
        upload_dir,
        processed_dir,
    });

    let server = HttpServer::new(move || {
        // Configure payload size limits globally
        let payload_config = web::PayloadConfig::default()
            .limit(max_payload_size);

        let multipart_config = MultipartFormConfig::default()
            .total_limit(max_payload_size);

        App::new()
            .app_data(job_service.clone())
            .app_data(registry_data.clone())
            .app_data(queue_data.clone())
            .app_data(dirs_data.clone())
            .app_data(payload_config) // Global payload size limit
            .app_data(multipart_config) // Global multipart/file upload size limit
            .app_data(validation::path_config()) // Global path validation config
            .configure(health_config) // Health check endpoints
            .configure(job_config)
    });

    info!("Server starting on http://{}:{}", host, port);

    // Bind and start the server
    let server = server
        .bind((host.as_str(), port))?
        .run();

    // Get server handle for graceful shutdown
    let server_handle = server.handle();

    // Spawn server in background
    let server_task = tokio::spawn(server);

    // Create shutdown coordinator and wait for shutdown signal
    let coordinator = ShutdownCoordinator::new(
        server_handle,
        server_task,
        registry,
        queue,
    );

    coordinator.wait_for_shutdown().await
}
