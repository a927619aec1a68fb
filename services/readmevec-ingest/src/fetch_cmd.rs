use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use readmevec_core::{FetchConfig, IngestCounters};
use readmevec_fetch::{FetchEngine, FetchOutcome, ReadmeStore, WorkSource, WorkSourceConfig, DEFAULT_BATCH_SIZE};
use readmevec_proxy::{load_proxy_files, ProxyPool};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::IngestResult;

/// Flags accepted by `readmevec-ingest fetch`, mirroring the CLI contract.
pub struct FetchArgs {
    pub archive_path: PathBuf,
    pub data_dir: PathBuf,
    pub readmes_dir: PathBuf,
    pub limit: Option<u64>,
    pub offset: u64,
    pub full: bool,
    pub min_date: Option<String>,
    pub proxies: Vec<PathBuf>,
}

/// Runs the Fetch Engine to exhaustion against one `WorkSource` slice,
/// bounding in-flight requests with a semaphore per the concurrency model.
pub async fn run(args: FetchArgs, config: FetchConfig, counters: Arc<IngestCounters>) -> IngestResult<()> {
    let store = Arc::new(ReadmeStore::new(&args.readmes_dir).map_err(readmevec_core::CoreError::Io)?);
    let proxy_urls = load_proxy_files(&args.proxies);
    info!(proxies = proxy_urls.len(), "loaded proxy pool");
    let proxies = Arc::new(ProxyPool::new(proxy_urls));

    // `--full` maps to the candidate sweep's `default_branch_first` reorder:
    // try `main` before `master` instead of the archive-weighted default.
    let engine = Arc::new(FetchEngine::new(proxies, store.clone(), config.clone(), args.full));
    let semaphore = Arc::new(Semaphore::new(config.concurrency));

    // The primary instance owns the whole archive and pays for one upfront
    // directory listing so a restart recognizes every prior success,
    // regardless of which candidate filename it landed under. A parallel
    // instance only ever sees its own slice and falls back to the cheaper
    // per-origin disk probe instead.
    let existing_success = if args.offset == 0 {
        let set = store.load_existing_success_set()?;
        info!(existing = set.len(), "preloaded existing-success set for primary fetch instance");
        Some(set)
    } else {
        None
    };

    let mut source = WorkSource::open(
        args.data_dir.join(".fetch-cache.duckdb"),
        WorkSourceConfig {
            archive_path: args.archive_path,
            table_name: "readmes".to_string(),
            min_date: args.min_date,
            offset: args.offset,
            limit: args.limit,
        },
    )?;

    loop {
        let batch = source.next_batch(DEFAULT_BATCH_SIZE)?;
        if batch.is_empty() {
            break;
        }

        let mut handles = Vec::with_capacity(batch.len());
        for origin in batch {
            let Some((owner, repo)) = origin.owner_repo() else {
                warn!(url = %origin.url, "origin is not a github.com URL, skipping");
                continue;
            };
            let done = match &existing_success {
                Some(set) => {
                    set.contains(&format!("{owner}_{repo}")) || store.has_known_error_marker(&owner, &repo)
                }
                None => store.probably_done_on_disk(&owner, &repo),
            };
            if done {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
            let engine = engine.clone();
            let counters = counters.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                match engine.fetch_repo(&owner, &repo).await {
                    Ok(FetchOutcome::Success(_)) => {
                        counters.fetched.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(FetchOutcome::Error(marker)) => {
                        counters.fetch_errors.fetch_add(1, Ordering::Relaxed);
                        info!(repo = %format!("{owner}/{repo}"), bucket = %marker.bucket, "fetch recorded permanent failure");
                    }
                    Ok(FetchOutcome::Skipped) => {
                        counters.skipped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!(repo = %format!("{owner}/{repo}"), error = %e, "fetch failed");
                        counters.fetch_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        let snap = counters.snapshot();
        info!(
            fetched = snap.fetched,
            errors = snap.fetch_errors,
            skipped = snap.skipped,
            remaining = source.remaining(),
            "fetch batch complete"
        );
    }

    Ok(())
}
