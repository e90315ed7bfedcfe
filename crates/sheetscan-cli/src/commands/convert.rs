//! Convert command - turn one photographed table into a spreadsheet.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use sheetscan_core::{GridPipeline, RunWorker};

use super::{load_config, progress_events, run_request, spinner, PipelineArgs};

/// Arguments for the convert command.
#[derive(Args)]
pub struct ConvertArgs {
    /// Input image (png, jpg, bmp, tiff, gif, webp, or a scanned PDF)
    #[arg(required = true)]
    image: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Output file name (.xlsx or .csv; no extension means .xlsx)
    #[arg(short = 'n', long)]
    output_name: Option<String>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

pub async fn run(args: ConvertArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.pipeline.apply(&mut config);

    if !args.image.exists() {
        anyhow::bail!("Input file not found: {}", args.image.display());
    }
    info!("Converting {}", args.image.display());

    let pb = spinner();
    pb.set_message("loading");

    let pipeline = GridPipeline::from_config(&config)?.with_events(progress_events(&pb));
    let worker = RunWorker::new(pipeline);
    let request = args
        .pipeline
        .request(args.image.clone(), args.output_dir.clone(), args.output_name.clone());

    let result = run_request(&worker, request).await;
    pb.finish_and_clear();
    let outcome = result?;

    println!(
        "{} {} ({} rows x {} columns, {} strategy)",
        style("✓").green(),
        outcome.output_path.display(),
        outcome.rows,
        outcome.columns,
        outcome.strategy
    );
    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
