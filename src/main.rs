#![deny(clippy::all)]

mod audio;
mod console;
mod error;
mod fetcher;
mod generator;
mod pipeline;
mod record;
mod store;
mod transcriber;
mod workspace;

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Application configuration
#[derive(serde::Deserialize)]
struct Config {
    generation: GenerationConfig,
    transcription: TranscriptionConfig,
    storage: StorageConfig,
}

#[derive(serde::Deserialize)]
struct GenerationConfig {
    model: String,
}

#[derive(serde::Deserialize)]
struct TranscriptionConfig {
    language: String,
}

#[derive(serde::Deserialize)]
struct StorageConfig {
    path: Option<PathBuf>,
}

/// Load configuration from embedded config.toml
fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    const CONFIG_TOML: &str = include_str!("../config.toml");
    let config: Config = toml::from_str(CONFIG_TOML)?;
    Ok(config)
}

/// Default idea store location under the platform data directory
fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("ThinkFlow").join("ideas.json"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for structured logging
    tracing_subscriber::fmt::init();

    // The API key may live in a local .env file
    let _ = dotenvy::dotenv();

    // Load configuration from embedded config.toml
    let config = load_config()?;

    let api_key = std::env::var("OPENAI_API_KEY")
        .context("OPENAI_API_KEY is not set; add it to the environment or a .env file")?;

    let store_path = config
        .storage
        .path
        .clone()
        .or_else(default_store_path)
        .context("Could not determine an idea store location")?;
    let store = store::RecordStore::open(store_path);

    // Collaborators are constructed once here and injected. The
    // transcriber in particular is shared for the process lifetime.
    let transcriber: Arc<dyn transcriber::Transcriber> =
        Arc::new(transcriber::OpenAITranscriber::new(api_key.clone())?);
    let generator = generator::OpenAIGenerator::new(api_key, config.generation.model.clone())?;
    let fetcher = fetcher::PageFetcher::new()?;
    let pipeline = pipeline::ExpansionPipeline::new(Box::new(generator), Box::new(fetcher));

    info!(model = %config.generation.model, "ThinkFlow started");

    let mut console = console::Console::new(
        pipeline,
        transcriber,
        store,
        config.transcription.language.clone(),
    );
    console.run().await?;

    Ok(())
}
