//! Rowshell CLI
//!
//! - `push` / `diff`: sync component files with the components table
//! - `apply-diff`: strict offline application of a unified diff
//! - `ask`: send a component file to the AI endpoint

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rowshell_host::GristRestDocument;
use rowshell_model::{apply_unified_diff, ComponentSchema};
use std::fs;
use std::path::PathBuf;

mod ask;
mod sync;

use sync::{
    diff_component, list_component_files, load_dotenv, push_component, template_id_from_path,
    DiffStatus, PushOutcome, SyncConfig, DEFAULT_CONFIG_PATH, DEFAULT_DOTENV_PATH,
};

#[derive(Parser)]
#[command(name = "rowshell")]
#[command(author, version, about = "Rowshell: applications built from component rows")]
struct Cli {
    /// Log at DEBUG level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push local component files to the components table.
    Push(SyncArgs),

    /// Compare local component files with the components table.
    Diff(SyncArgs),

    /// Apply a unified diff to a file. Fails instead of patching partially.
    ApplyDiff {
        /// Original source
        original: PathBuf,
        /// Diff body (hunk and file headers are ignored)
        diff: PathBuf,
        /// Write the result here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Ask the assistant about a component file.
    Ask(ask::AskArgs),
}

#[derive(Args)]
struct SyncArgs {
    /// Sync config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Environment name in the config
    #[arg(long)]
    env: String,
    /// Dotenv file loaded before resolving the API key
    #[arg(long, default_value = DEFAULT_DOTENV_PATH)]
    dotenv: PathBuf,
    /// Every file of the components directory
    #[arg(long)]
    all: bool,
    /// Component files; the file name is the template id
    files: Vec<PathBuf>,
}

#[derive(Clone, Copy)]
enum SyncMode {
    Push,
    Diff,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Push(args) => cmd_sync(args, SyncMode::Push).await,
        Commands::Diff(args) => cmd_sync(args, SyncMode::Diff).await,
        Commands::ApplyDiff { original, diff, out } => cmd_apply_diff(original, diff, out),
        Commands::Ask(args) => ask::cmd_ask(args).await,
    }
}

async fn cmd_sync(args: SyncArgs, mode: SyncMode) -> Result<()> {
    load_dotenv(&args.dotenv)?;
    let config = SyncConfig::load(&args.config)?;
    let env = config.resolve(&args.env, |key| std::env::var(key).ok())?;

    let files = if args.all {
        if !config.components_dir.is_dir() {
            bail!(
                "components directory not found: {}",
                config.components_dir.display()
            );
        }
        list_component_files(&config.components_dir)
    } else if args.files.is_empty() {
        bail!("specify component files or --all");
    } else {
        args.files
    };

    let document = GristRestDocument::new(env.rest)?;
    let schema = ComponentSchema::default();
    tracing::info!(env = %args.env, table = %env.table_id, files = files.len(), "sync");

    for file in files {
        let template_id = template_id_from_path(&file)
            .ok_or_else(|| anyhow!("no file name in {}", file.display()))?;
        let code = fs::read_to_string(&file)
            .with_context(|| format!("reading {}", file.display()))?;

        match mode {
            SyncMode::Push => {
                let outcome =
                    push_component(&document, &env.table_id, &schema, &template_id, &code)
                        .await
                        .with_context(|| format!("pushing {template_id}"))?;
                match outcome {
                    PushOutcome::Updated(row_id) => println!(
                        "{} {} (row {row_id})",
                        "updated".green().bold(),
                        template_id.bold()
                    ),
                    PushOutcome::Created(row_id) => println!(
                        "{} {} (row {row_id})",
                        "created".green().bold(),
                        template_id.bold()
                    ),
                }
            }
            SyncMode::Diff => {
                let status =
                    diff_component(&document, &env.table_id, &schema, &template_id, &code)
                        .await
                        .with_context(|| format!("comparing {template_id}"))?;
                let label = match status {
                    DiffStatus::Identical => status.as_str().green(),
                    DiffStatus::Different => status.as_str().yellow(),
                    DiffStatus::NotFound => status.as_str().red(),
                };
                println!("{}: {}", template_id.bold(), label);
            }
        }
    }
    Ok(())
}

fn cmd_apply_diff(original: PathBuf, diff: PathBuf, out: Option<PathBuf>) -> Result<()> {
    let source = fs::read_to_string(&original)
        .with_context(|| format!("reading {}", original.display()))?;
    let body =
        fs::read_to_string(&diff).with_context(|| format!("reading {}", diff.display()))?;

    let patched = apply_unified_diff(&source, &body).ok_or_else(|| {
        anyhow!(
            "the diff does not apply to {}; ask for the complete file instead",
            original.display()
        )
    })?;

    match out {
        Some(path) => {
            fs::write(&path, patched).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => println!("{patched}"),
    }
    Ok(())
}
