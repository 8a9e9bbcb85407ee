mod annotate;
mod batch;
mod config;
mod document;
mod error;
mod geometry;
mod host;
mod layout;
mod registry;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::info;
use serde_json::{json, Value};

use crate::annotate::inspect_layers;
use crate::batch::{
    active_document, annotate_directory, annotate_file, timestamp_iso, DEFAULT_EXTENSION,
};
use crate::config::{AnnotateConfig, Scale};
use crate::document::JsonDocument;
use crate::host::DrawingAdapter;
use crate::error::AnnotateError;
use crate::layout::legend_lines;

#[derive(Parser, Debug)]
#[command(
    name = "annotate-fonts",
    version,
    about = "Draw indexed badges beside text layers and a legend of font names, sizes and colors"
)]
struct Cli {
    /// Log progress (same as RUST_LOG=info)
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print supported commands in JSON
    Commands,
    /// Annotate the active document
    Current(CurrentArgs),
    /// Annotate every document in a directory tree
    Directory(DirectoryArgs),
    /// Print the legend a pass would draw, without changing the document
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct StyleArgs {
    /// Density the document was authored at
    #[arg(long, value_enum, default_value_t = Scale::Retina)]
    scale: Scale,
    /// Name of the top-level annotation group
    #[arg(long)]
    group: Option<String>,
    /// Font for badge numbers and the legend
    #[arg(long)]
    font: Option<String>,
    /// Badge and legend background color (#RRGGBB)
    #[arg(long)]
    background: Option<String>,
    /// Badge number and legend text color (#RRGGBB)
    #[arg(long)]
    foreground: Option<String>,
}

impl StyleArgs {
    fn config(&self) -> Result<AnnotateConfig> {
        AnnotateConfig::from_flags(
            self.scale,
            self.group.as_deref(),
            self.font.as_deref(),
            self.background.as_deref(),
            self.foreground.as_deref(),
        )
    }
}

#[derive(Args, Debug)]
struct CurrentArgs {
    /// Document path (default: $ANNOTATE_FONTS_DOCUMENT)
    document: Option<PathBuf>,
    /// Write the annotated document here instead of in place
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write a PNG preview of the annotated document
    #[arg(long)]
    preview: Option<PathBuf>,
    /// Print the pass report as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug)]
struct DirectoryArgs {
    /// Root directory to scan recursively
    directory: Option<PathBuf>,
    /// Document file extension, matched case-insensitively
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    extension: String,
    /// Write a PNG preview per document under this directory
    #[arg(long)]
    preview_dir: Option<PathBuf>,
    /// Exit with non-zero status when any document failed
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,
    /// Print the batch report as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Document path
    document: PathBuf,
    /// Print the inspection as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    #[command(flatten)]
    style: StyleArgs,
}

fn main() {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(err) = run(cli.command) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Commands => print_commands(),
        Commands::Current(args) => command_current(args),
        Commands::Directory(args) => command_directory(args),
        Commands::Inspect(args) => command_inspect(args),
    }
}

fn print_commands() -> Result<()> {
    let rows = vec![
        json!({
            "name": "current",
            "description": "Annotate the active document in place (or to --output)."
        }),
        json!({
            "name": "directory",
            "description": "Recursively annotate every document under a directory."
        }),
        json!({
            "name": "inspect",
            "description": "Print the font legend without modifying the document."
        }),
    ];

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "commands": rows }))?
    );
    Ok(())
}

fn command_current(args: CurrentArgs) -> Result<()> {
    let config = args.style.config()?;
    let path = active_document(args.document)?;
    if !path.exists() {
        return Err(anyhow::Error::new(AnnotateError::NoDocumentOpen)
            .context(format!("document not found: {}", path.display())));
    }

    let (report, saved) = annotate_file(
        &path,
        args.output.as_deref(),
        args.preview.as_deref(),
        &config,
    )?;
    info!("saved {}", saved.display());

    if args.json {
        let payload = json!({
            "document": abs_path(&saved).display().to_string(),
            "preview": args.preview.as_deref().map(|p| abs_path(p).display().to_string()),
            "generated_at": timestamp_iso(),
            "scale": config.scale.factor(),
            "report": serde_json::to_value(&report)?,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for line in &report.legend {
            println!("{line}");
        }
    }
    Ok(())
}

fn command_directory(args: DirectoryArgs) -> Result<()> {
    let config = args.style.config()?;
    let Some(root) = args.directory else {
        info!("{}", AnnotateError::NoDirectorySelected);
        return Ok(());
    };
    if !root.is_dir() {
        bail!("not a directory: {}", root.display());
    }

    let report = annotate_directory(
        &root,
        &args.extension,
        args.preview_dir.as_deref(),
        &config,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for file in &report.files {
            match &file.error {
                None => println!("ok\t{}", file.path.display()),
                Some(err) => println!("failed\t{err}"),
            }
        }
    }

    if args.strict && report.failed > 0 {
        let first = report
            .failures()
            .next()
            .and_then(|f| f.error.clone())
            .unwrap_or_default();
        bail!(
            "{} of {} documents failed (first: {first})",
            report.failed,
            report.files.len()
        );
    }
    Ok(())
}

fn command_inspect(args: InspectArgs) -> Result<()> {
    let config = args.style.config()?;
    let document = JsonDocument::open(&args.document)?;
    let inspection = inspect_layers(&document, config.scale.factor());
    let legend = legend_lines(&inspection.registry);

    if args.json {
        let payload = json!({
            "document": abs_path(&args.document).display().to_string(),
            "scale": config.scale.factor(),
            "group": config.group_name,
            "group_exists": document.find_group(&config.group_name).is_some(),
            "style": serde_json::to_value(&config.style)?,
            "signatures": inspection
                .registry
                .iter()
                .map(|(index, sig)| json!({
                    "index": index,
                    "font": sig.font_name,
                    "size": sig.point_size(),
                    "color": sig.color_hex,
                }))
                .collect::<Vec<Value>>(),
            "layers": serde_json::to_value(&inspection.annotated)?,
            "skipped": serde_json::to_value(&inspection.skipped)?,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for line in legend {
            println!("{line}");
        }
    }
    Ok(())
}

fn abs_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}
