//! Template command - inspect and create grid templates.

use std::path::Path;

use clap::{Args, Subcommand};
use console::style;

use sheetscan_core::{GridSpec, TemplateStore, DEFAULT_TEMPLATE};

use super::load_config;

/// Arguments for the template command.
#[derive(Args)]
pub struct TemplateArgs {
    /// Template store directory
    #[arg(long, global = true)]
    templates_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: TemplateCommand,
}

#[derive(Subcommand)]
enum TemplateCommand {
    /// List stored templates
    List,

    /// Show a template's geometry
    Show {
        /// Template name or path to a .json record
        name: String,

        /// Print the stored JSON record instead of a cell table
        #[arg(long)]
        json: bool,
    },

    /// Write the built-in 3x4 default template to the store
    InitDefault {
        /// Overwrite an existing default template
        #[arg(long)]
        force: bool,
    },

    /// Create a template from marked grid lines
    FromLines(FromLinesArgs),
}

#[derive(Args)]
struct FromLinesArgs {
    /// Template name
    name: String,

    /// Reference image width in pixels
    #[arg(long)]
    width: u32,

    /// Reference image height in pixels
    #[arg(long)]
    height: u32,

    /// Vertical separator x positions, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    vertical: Vec<u32>,

    /// Horizontal separator y positions, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    horizontal: Vec<u32>,

    /// Column names, left to right, comma separated
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Overwrite an existing template with the same name
    #[arg(long)]
    force: bool,
}

pub async fn run(args: TemplateArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = args.templates_dir {
        config.templates.dir = dir;
    }
    let store = TemplateStore::new(&config.templates.dir)?;

    match args.command {
        TemplateCommand::List => list_templates(&store),
        TemplateCommand::Show { name, json } => show_template(&store, &name, json),
        TemplateCommand::InitDefault { force } => init_default(&store, force),
        TemplateCommand::FromLines(from_args) => from_lines(&store, from_args),
    }
}

fn list_templates(store: &TemplateStore) -> anyhow::Result<()> {
    let names = store.list()?;

    println!("Templates in {}", store.dir().display());
    if names.is_empty() {
        println!("  {}", style("(none)").dim());
        println!();
        println!("Run 'sheetscan template init-default' to create the built-in template.");
        return Ok(());
    }

    for name in names {
        println!("  {}", name);
    }
    Ok(())
}

fn show_template(store: &TemplateStore, name: &str, json: bool) -> anyhow::Result<()> {
    let spec = store.resolve(name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&spec)?);
        return Ok(());
    }

    println!("{}", style(&spec.name).bold());
    println!(
        "  Reference size: {}x{} ({})",
        spec.width,
        spec.height,
        if spec.normalized { "normalized" } else { "pixels" }
    );
    println!("  Rows: {}", spec.max_row());
    println!("  Columns: {}", spec.column_names().join(", "));
    println!();
    println!("  {:>4} {:>4}  {:>9} {:>9} {:>9} {:>9}  Name", "Row", "Col", "X", "Y", "W", "H");

    let mut cells: Vec<_> = spec.cells.iter().collect();
    cells.sort_by_key(|c| (c.row, c.col));
    for cell in cells {
        println!(
            "  {:>4} {:>4}  {:>9.3} {:>9.3} {:>9.3} {:>9.3}  {}",
            cell.row,
            cell.col,
            cell.x,
            cell.y,
            cell.w,
            cell.h,
            cell.column_name()
        );
    }
    Ok(())
}

fn init_default(store: &TemplateStore, force: bool) -> anyhow::Result<()> {
    let path = store.path_for(DEFAULT_TEMPLATE);
    if path.exists() && !force {
        anyhow::bail!(
            "Template already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    let path = store.save(&GridSpec::builtin_default())?;
    println!("{} Created default template at {}", style("✓").green(), path.display());
    Ok(())
}

fn from_lines(store: &TemplateStore, args: FromLinesArgs) -> anyhow::Result<()> {
    let path = store.path_for(&args.name);
    if path.exists() && !args.force {
        anyhow::bail!(
            "Template '{}' already exists. Use --force to overwrite.",
            args.name
        );
    }

    let spec = GridSpec::from_grid_lines(
        &args.name,
        args.width,
        args.height,
        &args.vertical,
        &args.horizontal,
        &args.columns,
    )?;
    let path = store.save(&spec)?;

    println!(
        "{} Saved template '{}' ({} rows x {} columns) to {}",
        style("✓").green(),
        spec.name,
        spec.max_row(),
        spec.column_names().len(),
        path.display()
    );
    Ok(())
}
