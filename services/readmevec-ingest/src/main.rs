use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use readmevec_core::{IngestCounters, RunConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod embed_cmd;
mod error;
mod fetch_cmd;

use embed_cmd::{EmbedArgs, Provider};
use error::IngestError;
use fetch_cmd::FetchArgs;

#[derive(Parser, Debug)]
#[command(name = "readmevec-ingest")]
#[command(about = "README semantic-search ingestion pipeline: fetch and embed", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root data directory (cursor store, batch state); overrides `DATA_DIR`.
    #[arg(long, global = true, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// README storage directory; overrides `READMES_DIR`.
    #[arg(long, global = true, env = "READMES_DIR")]
    readmes_dir: Option<PathBuf>,

    /// Vector store base URL; overrides `QDRANT_URL`.
    #[arg(long, global = true, env = "QDRANT_URL")]
    qdrant_url: Option<String>,

    /// Emit debug-level logs.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl origin URLs for READMEs via raw hosting with proxy rotation.
    Fetch {
        /// Columnar archive of origin URLs to fetch from.
        #[arg(long, default_value = "./data/origins.csv")]
        archive: PathBuf,

        /// Maximum number of rows to process, from `offset` (exclusive).
        #[arg(long)]
        limit: Option<u64>,

        /// Row offset marking the start of this instance's slice (0 = primary).
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Try `main` before `master` for every repo's candidate sweep,
        /// instead of the archive-weighted default (`master` first).
        #[arg(long)]
        full: bool,

        /// Skip origins archived before this date (YYYY-MM-DD).
        #[arg(long)]
        min_date: Option<String>,

        /// Newline-delimited proxy list file; repeatable.
        #[arg(long = "proxies")]
        proxies: Vec<PathBuf>,
    },
    /// Embed fetched READMEs and upsert vectors into the vector store.
    Embed {
        /// Embedding backend to drive.
        #[arg(long, value_enum)]
        provider: Provider,

        /// Number of `{PROVIDER}_API_KEY[_i]` environment keys to round-robin.
        #[arg(long, default_value_t = 1)]
        keys: usize,

        /// Overrides the batch chunk size (`BATCH_CHUNK_SIZE`).
        #[arg(long)]
        chunk: Option<usize>,

        /// Overrides realtime worker count or batch concurrency, depending on provider.
        #[arg(long)]
        parallel: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            let code = e.exit_code();
            if code == 0 {
                info!(error = %e, "stopping gracefully (budget exhausted)");
            } else {
                error!(error = %e, "ingest run failed");
            }
            code
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<(), IngestError> {
    let mut config = RunConfig::load().map_err(|e| IngestError::Config(e.to_string()))?;
    if let Some(dir) = &cli.data_dir {
        config.paths.data_dir = dir.display().to_string();
    }
    if let Some(dir) = &cli.readmes_dir {
        config.paths.readmes_dir = dir.display().to_string();
    }
    if let Some(url) = &cli.qdrant_url {
        config.vector_store.url = url.clone();
    }

    let counters = Arc::new(IngestCounters::new());
    let ctrl_c_counters = counters.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let snap = ctrl_c_counters.snapshot();
            info!(
                fetched = snap.fetched,
                embedded = snap.embedded,
                upserted = snap.upserted,
                cost_usd = snap.cost_usd,
                "received ctrl-c, flushing counters; durable state makes this safe to interrupt"
            );
        }
    });

    match cli.command {
        Command::Fetch {
            archive,
            limit,
            offset,
            full,
            min_date,
            proxies,
        } => {
            let args = FetchArgs {
                archive_path: archive,
                data_dir: PathBuf::from(&config.paths.data_dir),
                readmes_dir: PathBuf::from(&config.paths.readmes_dir),
                limit,
                offset,
                full,
                min_date,
                proxies,
            };
            fetch_cmd::run(args, config.fetch, counters.clone()).await?;
        }
        Command::Embed {
            provider,
            keys,
            chunk,
            parallel,
        } => {
            let args = EmbedArgs {
                readmes_dir: PathBuf::from(&config.paths.readmes_dir),
                data_dir: PathBuf::from(&config.paths.data_dir),
                provider,
                keys,
                chunk,
                parallel,
            };
            embed_cmd::run(args, config.embed, config.vector_store, counters.clone()).await?;
        }
    }

    print!("{}", counters.render_prometheus());
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(env_filter).with_target(false).init();
}
