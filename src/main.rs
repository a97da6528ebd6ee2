use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oceandata::{datasets, descriptor};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Fetch, cache and normalize oceanographic datasets.
#[derive(Parser, Debug)]
#[command(name = "oceandata", version, about)]
struct Cli {
    /// Cache root; defaults to $OCEANDATA_DIR, then ~/.oceandata.
    #[arg(long, env = "OCEANDATA_DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the known datasets with their source and cache location.
    List,
    /// Load a dataset, downloading it first if needed.
    Load { dataset: String },
    /// Only fetch a dataset's raw files.
    Download { dataset: String },
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let cli = Cli::parse();

    // ─── 2) resolve cache root ───────────────────────────────────────
    let cache_dir = match cli.cache_dir {
        Some(dir) => dir,
        None => dirs::home_dir()
            .context("no home directory; pass --cache-dir")?
            .join(".oceandata"),
    };
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("creating cache root {}", cache_dir.display()))?;

    // ─── 3) dispatch ─────────────────────────────────────────────────
    match cli.command {
        Command::List => {
            for name in descriptor::builtin_names() {
                let desc = descriptor::builtin(name)?;
                let remote = oceandata::fetch::Remote::for_file(&desc, desc.remote_filename());
                println!(
                    "{name:<12} {}  ->  {}",
                    remote.describe(),
                    desc.raw_path(&cache_dir).display()
                );
            }
        }
        Command::Load { dataset } => match datasets::load_by_name(&dataset, &cache_dir)? {
            Some(table) => {
                let range = table
                    .time_range()
                    .map(|(a, b)| format!("{a} .. {b}"))
                    .unwrap_or_else(|| "no dates".into());
                info!(
                    %dataset,
                    rows = table.num_rows(),
                    columns = ?table.column_names(),
                    %range,
                    "loaded"
                );
            }
            None => warn!(%dataset, "server timed out; no data"),
        },
        Command::Download { dataset } => {
            if datasets::download_by_name(&dataset, &cache_dir)? {
                info!(%dataset, cache = %cache_dir.display(), "available");
            } else {
                warn!(%dataset, "server timed out; nothing downloaded");
            }
        }
    }
    Ok(())
}
