use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use voicerelay::adapters::{CpalCapture, HttpPipelineClient, TomlConfigStore};
use voicerelay::app::SessionController;
use voicerelay::cli::{run_session, Cli, Commands};
use voicerelay::domain::language::SUPPORTED_LANGUAGES;
use voicerelay::domain::Language;
use voicerelay::infrastructure::logging::init_logging;
use voicerelay::ports::{AudioCapture, ConfigStore, PipelineClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let store = match cli.config.clone() {
        Some(dir) => TomlConfigStore::with_data_dir(dir)?,
        None => TomlConfigStore::new()?,
    };
    let mut config = store.load().context("Failed to load configuration")?;

    // Command-line overrides beat the config file.
    if let Some(base_url) = &cli.base_url {
        config.service.base_url = base_url.clone();
    }
    if let Some(code) = &cli.language {
        config.translation.default_target = Language::from_code(code)?;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.speech_dir = Some(dir.clone());
    }

    let level = cli.log_level(&config.logging.level);
    let _guard = init_logging(&store.logs_dir(), &level, config.logging.file_logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "voicerelay starting");

    match cli.command {
        Some(Commands::Languages) => {
            println!("Supported languages:");
            for language in SUPPORTED_LANGUAGES {
                println!("  {}  {}", language.code(), language.name());
            }
            return Ok(());
        }
        Some(Commands::Devices) => {
            let capture = CpalCapture::new(config.audio.clone())?;
            let devices = capture.list_input_devices()?;
            if devices.is_empty() {
                println!("No input devices found");
            } else {
                println!("Input devices:");
                for device in devices {
                    let marker = if device.is_default { "*" } else { " " };
                    println!("  {} {}", marker, device.name);
                }
            }
            return Ok(());
        }
        None => {}
    }

    let capture = Arc::new(CpalCapture::new(config.audio.clone())?);
    if let Some(device) = &cli.device {
        capture
            .select_input_device(Some(device))
            .with_context(|| format!("Input device '{}' not available", device))?;
    }

    let speech_dir = config
        .output
        .speech_dir
        .clone()
        .unwrap_or_else(|| store.speech_dir());
    let pipeline = Arc::new(HttpPipelineClient::new(&config.service, speech_dir)?);

    let controller = Arc::new(SessionController::new(
        capture as Arc<dyn AudioCapture>,
        pipeline as Arc<dyn PipelineClient>,
        config.translation.default_target,
    ));

    run_session(controller).await?;

    info!("voicerelay exiting");
    Ok(())
}
