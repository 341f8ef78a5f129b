//! One refresh cycle: fetch, parse and store every source concurrently.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::app::{FetchError, StorageError};
use crate::domain::{CycleReport, FailureKind, Item, SourceOutcome, SourceReport};
use crate::fetcher::Fetcher;
use crate::registry::{RegisteredSource, SourceRegistry};
use crate::store::{Store, UpsertOutcome};

pub const DEFAULT_WORKERS: usize = 8;

pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn Store>,
    semaphore: Arc<Semaphore>,
    fetch_timeout: Duration,
}

impl Aggregator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn Store>,
        fetch_timeout: Duration,
    ) -> Self {
        Self::with_workers(registry, fetcher, store, fetch_timeout, DEFAULT_WORKERS)
    }

    pub fn with_workers(
        registry: Arc<SourceRegistry>,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn Store>,
        fetch_timeout: Duration,
        workers: usize,
    ) -> Self {
        Self {
            registry,
            fetcher,
            store,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            fetch_timeout,
        }
    }

    /// Run every source once and wait for all of them.
    ///
    /// A failing source only affects its own entry in the report.
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        let sources = self.registry.snapshot();
        info!(sources = sources.len(), "Refresh cycle started");

        let handles: Vec<_> = sources
            .iter()
            .cloned()
            .map(|registered| {
                let fetcher = self.fetcher.clone();
                let store = self.store.clone();
                let semaphore = self.semaphore.clone();
                let fetch_timeout = self.fetch_timeout;

                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return SourceOutcome::Failed {
                            kind: FailureKind::Internal,
                            reason: "worker pool closed".to_string(),
                        };
                    };
                    process_source(fetcher, store, registered, fetch_timeout).await
                })
            })
            .collect();

        let joined = futures::future::join_all(handles).await;

        let reports = sources
            .iter()
            .zip(joined)
            .map(|(registered, result)| {
                let outcome = result.unwrap_or_else(|e| {
                    error!(source = %registered.source.name, error = %e, "Source task failed");
                    SourceOutcome::Failed {
                        kind: FailureKind::Internal,
                        reason: e.to_string(),
                    }
                });
                SourceReport {
                    source: registered.source.name.clone(),
                    outcome,
                }
            })
            .collect();

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            sources: reports,
        };

        let totals = report.totals();
        info!(
            succeeded = totals.succeeded,
            failed = totals.failed,
            seen = totals.seen,
            new = totals.inserted,
            updated = totals.updated,
            elapsed_secs = report.elapsed_secs(),
            "Refresh cycle complete"
        );

        report
    }
}

async fn process_source(
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn Store>,
    registered: RegisteredSource,
    fetch_timeout: Duration,
) -> SourceOutcome {
    let RegisteredSource { source, parser } = registered;

    let raw = match tokio::time::timeout(fetch_timeout, fetcher.fetch(&source)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            warn!(source = %source.name, error = %e, "Fetch failed");
            return e.into();
        }
        Err(_) => {
            let e = FetchError::Timeout(fetch_timeout);
            warn!(source = %source.name, error = %e, "Fetch failed");
            return e.into();
        }
    };

    let parsed = match parser.parse(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(source = %source.name, error = %e, "Parse failed");
            return e.into();
        }
    };

    let fetched_at = Utc::now();
    let items: Vec<Item> = parsed
        .into_iter()
        .filter(|p| {
            source
                .filter_keyword
                .as_deref()
                .is_none_or(|kw| p.matches_keyword(kw))
        })
        .map(|p| p.into_item(&source, fetched_at))
        .collect();

    let seen = items.len();
    let stored = tokio::task::spawn_blocking(move || upsert_all(store.as_ref(), &items)).await;

    match stored {
        Ok(Ok((inserted, updated, unchanged))) => {
            info!(
                source = %source.name,
                seen,
                new = inserted,
                updated,
                "Source refreshed"
            );
            SourceOutcome::Succeeded {
                seen,
                inserted,
                updated,
                unchanged,
            }
        }
        Ok(Err(e)) => {
            error!(source = %source.name, error = %e, "Storing items failed");
            e.into()
        }
        Err(e) => SourceOutcome::Failed {
            kind: FailureKind::Internal,
            reason: e.to_string(),
        },
    }
}

/// Upsert in parser order; stops at the first storage error.
fn upsert_all(store: &dyn Store, items: &[Item]) -> Result<(usize, usize, usize), StorageError> {
    let (mut inserted, mut updated, mut unchanged) = (0, 0, 0);
    for item in items {
        match store.upsert(item)? {
            UpsertOutcome::Inserted => inserted += 1,
            UpsertOutcome::Updated => updated += 1,
            UpsertOutcome::UpdatedNoChange => unchanged += 1,
        }
    }
    Ok((inserted, updated, unchanged))
}
