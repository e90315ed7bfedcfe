//! Models command - check which OCR and table-structure models are installed.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use super::load_config;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Check model status
    Status(StatusArgs),

    /// Show the model directory
    Path,
}

#[derive(Args)]
struct StatusArgs {
    /// Model directory to check
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// OCR language whose recognition model is checked
    #[arg(short, long)]
    lang: Option<String>,
}

/// One model file the pipeline can use.
struct ModelFile {
    label: &'static str,
    path: PathBuf,
    required: bool,
}

pub async fn run(args: ModelsArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Status(status_args) => check_status(status_args, config_path),
        ModelsCommand::Path => {
            let config = load_config(config_path)?;
            println!("{}", config.models.model_dir.display());
            Ok(())
        }
    }
}

fn check_status(args: StatusArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = args.model_dir {
        config.models.model_dir = dir;
    }
    let language = args.lang.unwrap_or_else(|| config.ocr.language.clone());
    let models = &config.models;

    println!("{}", style("Model Status").bold());
    println!("Directory: {}", style(models.model_dir.display()).cyan());
    println!("Language: {}", style(&language).cyan());
    println!();

    let files = [
        ModelFile {
            label: "detection",
            path: models.detection_path(),
            required: true,
        },
        ModelFile {
            label: "recognition",
            path: models.recognition_path(&language),
            required: true,
        },
        ModelFile {
            label: "dictionary",
            path: models.dictionary_path(&language),
            required: true,
        },
        ModelFile {
            label: "angle classifier",
            path: models.classification_path(),
            required: config.ocr.classify_angle,
        },
        ModelFile {
            label: "table structure",
            path: models.table_path(),
            required: false,
        },
        ModelFile {
            label: "table dictionary",
            path: models.table_dictionary_path(),
            required: false,
        },
    ];

    let mut ready = true;
    let mut total_size: u64 = 0;

    for file in &files {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (status, size_str) = match fs::metadata(&file.path) {
            Ok(metadata) => {
                total_size += metadata.len();
                (style("✓").green(), format_size(metadata.len()))
            }
            Err(_) if file.required => {
                ready = false;
                (style("✗").red(), "missing".to_string())
            }
            Err(_) => (style("-").dim(), "optional".to_string()),
        };

        println!("  {} {:<18} {:<32} {:>10}", status, file.label, name, size_str);
    }

    println!();
    if ready {
        println!("{} Ready ({} total)", style("✓").green(), format_size(total_size));
    } else {
        println!(
            "{} Place the missing files in {} or pass --model-dir",
            style("⚠").yellow(),
            models.model_dir.display()
        );
    }

    let structure_model = models.table_path().exists() && models.table_dictionary_path().exists();
    if !structure_model {
        let fallback = if config.structure.enabled {
            "ruled-line detection"
        } else {
            "disabled"
        };
        println!("  Table structure: {}", fallback);
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(10_500), "10.5KB");
        assert_eq!(format_size(96_000_000), "96.0MB");
    }
}
