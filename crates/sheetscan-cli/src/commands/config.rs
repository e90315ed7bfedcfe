//! Config command - inspect and edit the JSON configuration file.
//!
//! Keys are dotted paths into [`SheetscanConfig`] sections, e.g.
//! `grid.pad` or `export.sheet_name`. Only keys the config already has can be
//! set, and every edit must still deserialize into a valid config.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use sheetscan_core::SheetscanConfig;

use super::default_config_path;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the configuration, or one section of it
    Show {
        /// Section name (ocr, models, grid, layout, structure, templates, export)
        section: Option<String>,
    },

    /// Write a configuration file with default values
    Init {
        /// Output path for configuration file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print one value (e.g. "layout.max_columns")
    Get { key: String },

    /// Change one value; strings need no quotes
    Set { key: String, value: String },

    /// Put one value back to its default
    Reset { key: String },

    /// Show configuration file path
    Path,
}

/// The configuration as stored at one path, defaults when the file is absent.
struct ConfigFile {
    path: PathBuf,
    tree: Value,
}

impl ConfigFile {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            SheetscanConfig::from_file(path)?
        } else {
            SheetscanConfig::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            tree: serde_json::to_value(&config)?,
        })
    }

    fn get(&self, key: &str) -> anyhow::Result<&Value> {
        self.tree
            .pointer(&pointer(key))
            .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {}", key))
    }

    /// Replace the value at `key` and check the result is still a valid config.
    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut tree = self.tree.clone();
        let slot = tree
            .pointer_mut(&pointer(key))
            .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {}", key))?;
        if slot.is_object() {
            anyhow::bail!("'{}' is a section; set one of its keys instead", key);
        }
        *slot = value;

        serde_json::from_value::<SheetscanConfig>(tree.clone())
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
        self.tree = tree;
        Ok(())
    }

    fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let config: SheetscanConfig = serde_json::from_value(self.tree.clone())?;
        config.save(&self.path)?;
        Ok(())
    }
}

pub async fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show { section } => show(&path, section.as_deref()),
        ConfigCommand::Init { output, force } => init(output.as_deref().unwrap_or(&path), force),
        ConfigCommand::Get { key } => {
            let file = ConfigFile::open(&path)?;
            println!("{}", serde_json::to_string_pretty(file.get(&key)?)?);
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            let mut file = ConfigFile::open(&path)?;
            let parsed = parse_value(&value, file.get(&key)?);
            file.set(&key, parsed.clone())?;
            file.save()?;
            println!("{} {} = {}", style("✓").green(), key, parsed);
            Ok(())
        }
        ConfigCommand::Reset { key } => {
            let defaults = serde_json::to_value(SheetscanConfig::default())?;
            let default_value = defaults
                .pointer(&pointer(&key))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {}", key))?;
            let mut file = ConfigFile::open(&path)?;
            file.set(&key, default_value.clone())?;
            file.save()?;
            println!("{} {} = {} (default)", style("✓").green(), key, default_value);
            Ok(())
        }
        ConfigCommand::Path => show_path(&path),
    }
}

fn show(path: &Path, section: Option<&str>) -> anyhow::Result<()> {
    if !path.exists() {
        println!("{} No config file found, showing defaults.", style("ℹ").blue());
    }
    let file = ConfigFile::open(path)?;
    let value = match section {
        Some(section) => file.get(section)?,
        None => &file.tree,
    };
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    SheetscanConfig::default().save(path)?;

    println!("{} Created configuration file at {}", style("✓").green(), path.display());
    Ok(())
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    println!("Configuration file: {}", path.display());
    if path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'sheetscan config init' to create a configuration file.");
    }
    Ok(())
}

/// JSON pointer for a dotted key.
fn pointer(key: &str) -> String {
    key.split('.')
        .filter(|part| !part.is_empty())
        .fold(String::new(), |mut acc, part| {
            acc.push('/');
            acc.push_str(part);
            acc
        })
}

/// Interpret `raw` for a slot currently holding `current`.
///
/// String slots take the text verbatim unless it is a quoted JSON string;
/// every other slot expects JSON (`4`, `true`, `null`).
fn parse_value(raw: &str, current: &Value) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(s)) => Value::String(s),
        Ok(_) | Err(_) if current.is_string() => Value::String(raw.to_string()),
        Ok(value) => value,
        Err(_) => Value::String(raw.to_string()),
    }
}
