use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use refinery_core::config::LogFormat;
use refinery_core::metadata::IntegrationSet;
use refinery_core::processor::{FfmpegProcessor, ProcessorRegistry};
use refinery_core::validator::FfprobeProbe;
use refinery_core::{
    load_config, validate_config, BatchResult, Config, MediaValidator, ObservabilitySink, Pipeline,
    PrometheusSink, StateManager, TracingSink,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code when the batch finished but some files failed.
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(result) if result.is_success() => {}
        Ok(_) => std::process::exit(EXIT_PARTIAL_FAILURE),
        Err(e) => {
            eprintln!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<BatchResult> {
    // Determine config path
    let config_path = std::env::var("REFINERY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("refinery.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(&config);
    info!(version = VERSION, config = ?config_path, "Starting refinery");
    info!(
        input = %config.paths.input_dir.display(),
        output = %config.paths.output_dir.display(),
        dry_run = config.processing.dry_run,
        "Configuration loaded"
    );

    let probe = Arc::new(FfprobeProbe::new(&config.ffmpeg.ffprobe_path));
    let validator = Arc::new(MediaValidator::new(
        config.audio_extensions(),
        config.video_extensions(),
        probe,
    ));

    let state = Arc::new(
        StateManager::new(config.state_dir())
            .await
            .context("Failed to open state directory")?,
    );

    let processors = build_processors(&config);
    info!(processors = processors.len(), "Processors registered");

    // No built-in metadata integrations yet; file names are the only source.
    let integrations = IntegrationSet::new();
    for (name, error) in integrations.health_check_all().await {
        warn!(integration = %name, error = %error, "Integration unhealthy, continuing without it");
    }

    let prometheus = match &config.telemetry.metrics_file {
        Some(_) => Some(Arc::new(
            PrometheusSink::new().context("Failed to create metrics registry")?,
        )),
        None => None,
    };
    let sink: Arc<dyn ObservabilitySink> = match &prometheus {
        Some(sink) => Arc::clone(sink) as Arc<dyn ObservabilitySink>,
        None => Arc::new(TracingSink),
    };

    let pipeline = Pipeline::new(config.pipeline_config(), validator, state, processors)
        .with_integrations(integrations)
        .with_sink(sink);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown requested, finishing files in progress");
        signal_cancel.cancel();
    });

    let result = pipeline.run(&cancel).await.context("Batch failed")?;

    println!("{}", result.summary());
    for failure in &result.errors {
        println!("  failed: {}", failure);
    }
    if result.omitted_errors > 0 {
        println!("  ... and {} more", result.omitted_errors);
    }

    if let (Some(sink), Some(path)) = (&prometheus, &config.telemetry.metrics_file) {
        let text = sink.render().context("Failed to render metrics")?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
        info!(path = %path.display(), "Metrics written");
    }

    Ok(result)
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Audio first, then video; the registry picks the first match.
fn build_processors(config: &Config) -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    let ffmpeg = config.ffmpeg.settings();

    if config.audio.enabled {
        registry.register(Arc::new(FfmpegProcessor::audio(
            config.audio.settings(),
            ffmpeg.clone(),
            config.audio_extensions(),
        )));
    }
    if config.video.enabled {
        registry.register(Arc::new(FfmpegProcessor::video(
            config.video.settings(),
            ffmpeg,
            config.video_extensions(),
        )));
    }
    registry
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
