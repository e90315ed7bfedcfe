//! Subcommands and the settings they share.

pub mod batch;
pub mod config;
pub mod convert;
pub mod models;
pub mod template;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use sheetscan_core::models::config::{ModelConfig, TemplateConfig};
use sheetscan_core::pipeline::{EventSink, RunEvent, RunOutcome, RunRequest, RunWorker};
use sheetscan_core::SheetscanConfig;

/// Options that shape a run, shared by `convert` and `batch`.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// OCR language code (e.g. es, en, pt)
    #[arg(short, long)]
    lang: Option<String>,

    /// Maximum cells per row when no template applies; extra words go to the last cell
    #[arg(long)]
    max_cols: Option<usize>,

    /// Template name or path to a template .json
    #[arg(short, long)]
    template: Option<String>,

    /// Model directory
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Template store directory
    #[arg(long)]
    templates_dir: Option<PathBuf>,
}

impl PipelineArgs {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut SheetscanConfig) {
        if let Some(lang) = &self.lang {
            config.ocr.language = lang.clone();
        }
        if let Some(max_cols) = self.max_cols {
            config.layout.max_columns = Some(max_cols);
        }
        if let Some(dir) = &self.model_dir {
            config.models.model_dir = dir.clone();
        }
        if let Some(dir) = &self.templates_dir {
            config.templates.dir = dir.clone();
        }
    }

    pub fn request(&self, image: PathBuf, output_dir: PathBuf, output_name: Option<String>) -> RunRequest {
        let mut request = RunRequest::new(image, output_dir).with_max_columns(self.max_cols);
        request.template = self.template.clone();
        request.output_name = output_name;
        request
    }
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sheetscan")
        .join("config.json")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sheetscan")
}

/// Load `path`, else the default config file if present, else defaults.
///
/// Library-default model and template directories are moved under the
/// user data directory.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SheetscanConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            SheetscanConfig::from_file(path)?
        }
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                debug!("Using config {}", default_path.display());
                SheetscanConfig::from_file(&default_path)?
            } else {
                SheetscanConfig::default()
            }
        }
    };

    if config.models.model_dir == ModelConfig::default().model_dir {
        config.models.model_dir = data_dir().join("models");
    }
    if config.templates.dir == TemplateConfig::default().dir {
        config.templates.dir = data_dir().join("templates");
    }
    Ok(config)
}

pub fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Progress events rendered as the spinner message.
pub fn progress_events(pb: &ProgressBar) -> EventSink {
    let pb = pb.clone();
    Arc::new(move |event: RunEvent| match event {
        RunEvent::StrategyStarted { name } => pb.set_message(format!("{} strategy", name)),
        RunEvent::CellRead { done, total } => pb.set_message(format!("reading cell {}/{}", done, total)),
        RunEvent::StrategyFinished { .. } => {}
    })
}

/// Submit `request` and wait for it off the async runtime. Ctrl-C cancels
/// the run at the next cell.
pub async fn run_request(worker: &RunWorker, request: RunRequest) -> anyhow::Result<RunOutcome> {
    let handle = worker.submit(request)?;
    let cancel = handle.cancel_token().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = tokio::task::spawn_blocking(move || handle.wait()).await;
    interrupt.abort();
    Ok(outcome??)
}
