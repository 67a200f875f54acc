use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use orbitscope_app::commands::{compute_snapshot, load_coloring, recolor_png, render_png};
use orbitscope_app::{
    load_zoom_stack, IoResponse, IoWorker, ParametersFile, Preferences, SessionError, Snapshot,
};
use orbitscope_core::formula::families;
use orbitscope_render::BuiltinMap;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "orbitscope", version)]
#[command(about = "Compute, snapshot and recolor fractal images")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Command,
}

/// Overrides for the stored preferences.
#[derive(Args)]
struct EngineArgs {
    /// Worker threads (0 = all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Minimum number of blocks per pass
    #[arg(long, global = true)]
    blocks: Option<usize>,

    #[arg(long, global = true)]
    width: Option<u32>,

    #[arg(long, global = true)]
    height: Option<u32>,

    /// Gather orbit statistics on every pass
    #[arg(long, global = true)]
    advanced: bool,

    /// Map row 0 to the top of the bounds
    #[arg(long, global = true)]
    invert_y: bool,

    /// Preferences file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

impl EngineArgs {
    fn preferences(&self) -> Preferences {
        let mut prefs = match &self.config {
            Some(path) => Preferences::load_or_default(path),
            None => Preferences::load(),
        };
        if let Some(threads) = self.threads {
            prefs.nr_of_threads = threads;
        }
        if let Some(blocks) = self.blocks {
            prefs.nr_of_blocks = blocks;
        }
        if let Some(width) = self.width {
            prefs.width = width;
        }
        if let Some(height) = self.height {
            prefs.height = height;
        }
        prefs.advanced_statistics |= self.advanced;
        prefs.invert_y |= self.invert_y;
        prefs
    }
}

#[derive(Subcommand)]
enum Command {
    /// Compute a parameters file and write the image as PNG
    Render {
        params: PathBuf,
        out: PathBuf,
        /// Zoom history whose top entry replaces the file's bounds
        #[arg(long)]
        zoom: Option<PathBuf>,
    },
    /// Compute a parameters file and save parameters plus iteration data
    Snapshot {
        params: PathBuf,
        out: PathBuf,
        #[arg(long)]
        zoom: Option<PathBuf>,
    },
    /// Recolor a snapshot without recomputing and write the image as PNG
    Recolor {
        snapshot: PathBuf,
        coloring: PathBuf,
        out: PathBuf,
    },
    /// List the supported fractal families
    Families,
    /// List the built-in color maps
    Maps,
    /// Store the effective engine settings as the new preferences
    Configure,
    /// Write a parameters file with a family's defaults
    Init { family: String, out: PathBuf },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> orbitscope_app::Result<()> {
    let prefs = cli.engine.preferences();
    let io = IoWorker::spawn()?;

    match cli.command {
        Command::Render { params, out, zoom } => {
            let file = ParametersFile::load(&params)?;
            let zoom = zoom.as_deref().map(load_zoom_stack).transpose()?;
            io.write(out, render_png(&file, zoom, &prefs)?);
        }
        Command::Snapshot { params, out, zoom } => {
            let file = ParametersFile::load(&params)?;
            let zoom = zoom.as_deref().map(load_zoom_stack).transpose()?;
            let snapshot = compute_snapshot(&file, zoom, &prefs)?;
            io.write(out, snapshot.to_json()?.into_bytes());
        }
        Command::Recolor {
            snapshot,
            coloring,
            out,
        } => {
            let snapshot = Snapshot::load(&snapshot)?;
            let coloring = load_coloring(&coloring)?;
            io.write(out, recolor_png(&snapshot, coloring, &prefs)?);
        }
        Command::Families => {
            for family in families() {
                println!("{}", family.name);
            }
        }
        Command::Maps => {
            for map in BuiltinMap::ALL {
                println!("{}", map.name());
            }
        }
        Command::Configure => {
            match &cli.engine.config {
                Some(path) => prefs.save_to(path)?,
                None => prefs.save()?,
            }
            info!("Preferences saved");
        }
        Command::Init { family, out } => {
            let file = ParametersFile::for_family(&family)?;
            io.write(out, file.to_json()?.into_bytes());
        }
    }

    for response in io.finish() {
        match response {
            IoResponse::Written { path, bytes } => info!("Wrote {bytes} bytes to {}", path.display()),
            IoResponse::WriteFailed { path, message } => {
                return Err(SessionError::Io {
                    path,
                    source: std::io::Error::other(message),
                });
            }
        }
    }
    Ok(())
}
