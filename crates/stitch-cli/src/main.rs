#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::needless_pass_by_value)]

mod commands;
mod logging;

use clap::{ArgAction, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use stitch_core::{Error, Options};
use stitch_util::path::normalize;
use tracing::debug;

/// stitch - module resolution adapter for virtual and rehomed modules
#[derive(Parser)]
#[command(name = "stitch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Output logs and results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Working directory (defaults to current directory)
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Path to a JSON options file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Application root (overrides the options file; defaults to the working directory)
    #[arg(long, global = true)]
    app_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a specifier through the plugin and print the outcome
    Resolve {
        /// Module specifier to resolve
        specifier: String,

        /// Importing file; omit to resolve as if issued by a synthetic module
        #[arg(long)]
        from: Option<PathBuf>,

        /// Directory to record as the resolution context
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Trace manual node_modules probing for a package specifier
    Probe {
        /// Bare package specifier (e.g. "pkg/deep/file")
        specifier: String,

        /// Importing file; its directory is the probing start point
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn absolutize(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        normalize(&path)
    } else {
        normalize(&cwd.join(path))
    }
}

fn load_options(cli: &Cli, cwd: &Path) -> Result<Options> {
    let mut options = match &cli.config {
        Some(path) => Options::load(&absolutize(cwd, path.clone())).into_diagnostic()?,
        None => Options::default(),
    };
    if let Some(app_root) = &cli.app_root {
        options.app_root = absolutize(cwd, app_root.clone())
            .to_string_lossy()
            .into_owned();
    }
    if options.app_root.is_empty() {
        options.app_root = cwd.to_string_lossy().into_owned();
    }
    Ok(options)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.json);

    let cwd = match &cli.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir().map_err(Error::Io).into_diagnostic()?,
    };
    debug!(cwd = %cwd.display(), "starting");

    match cli.command {
        Commands::Version => commands::version::run(cli.json),
        Commands::Probe {
            ref specifier,
            ref from,
        } => {
            let context = from
                .as_ref()
                .map(|f| absolutize(&cwd, f.clone()))
                .and_then(|f| f.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| cwd.clone());
            commands::probe::run(specifier, &context, cli.json)
        }
        Commands::Resolve {
            ref specifier,
            ref from,
            ref context,
        } => {
            let options = load_options(&cli, &cwd)?;
            let action = commands::resolve::ResolveAction {
                specifier: specifier.clone(),
                from: from.clone().map(|f| absolutize(&cwd, f)),
                context: context.clone().map(|c| absolutize(&cwd, c)),
                cwd: cwd.clone(),
            };
            commands::resolve::run(action, options, cli.json)
        }
    }
}
