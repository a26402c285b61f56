//! Concurrent batch operations
//!
//! Every item runs as its own task, gated by a semaphore so at most
//! `concurrency` remote calls are in flight. Outcomes are funneled through a
//! channel to a single collector, which owns the result lists.
//!
//! Fail-fast is cooperative. The first recorded failure sets a cancellation
//! flag and the collector stops waiting. Tasks that have not yet started see
//! the flag and skip their item; tasks already in flight run to completion
//! but their outcomes are not recorded. After a fail-fast batch `total()` may
//! be anything from 1 to N.

use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::client::RepoApi;
use crate::error::{PdsxError, Result};
use crate::operations;
use crate::value::Fields;

/// Default number of concurrent operations
pub const DEFAULT_CONCURRENCY: usize = 10;

/// How a batch is executed
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum operations in flight at once
    pub concurrency: usize,
    /// Stop waiting on remaining items after the first failure
    pub fail_fast: bool,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fail_fast: false,
            show_progress: false,
        }
    }
}

/// Outcome of a batch.
///
/// Order within each list follows completion order, not input order.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Identifiers of items that succeeded
    pub successful: Vec<String>,
    /// Identifier and error of items that failed
    pub failed: Vec<(String, PdsxError)>,
}

impl BatchResult {
    /// Number of items with a recorded outcome
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// Percentage of recorded items that succeeded, 0 for an empty result
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.successful.len() as f64 / total as f64 * 100.0
    }
}

enum Outcome {
    Success(String),
    Failure(String, PdsxError),
}

/// Run `op` over every item with bounded concurrency.
///
/// Each item is paired with the label reported if it fails. `op` returns the
/// identifier recorded on success.
pub async fn run_batch<T, F, Fut>(
    items: Vec<(String, T)>,
    op: F,
    options: &BatchOptions,
    description: &str,
) -> BatchResult
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    let mut result = BatchResult::default();
    if items.is_empty() {
        return result;
    }

    let total = items.len();
    let concurrency = options.concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let cancelled = Arc::new(AtomicBool::new(false));
    let op = Arc::new(op);
    let (tx, mut rx) = mpsc::channel::<Outcome>(total);

    debug!(total, concurrency, fail_fast = options.fail_fast, "Starting batch");
    let progress = progress_bar(total as u64, description, options.show_progress);

    for (label, item) in items {
        let semaphore = Arc::clone(&semaphore);
        let cancelled = Arc::clone(&cancelled);
        let op = Arc::clone(&op);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            if cancelled.load(Ordering::SeqCst) {
                return;
            }

            let outcome = match op(item).await {
                Ok(id) => Outcome::Success(id),
                Err(e) => Outcome::Failure(label, e),
            };
            // Receiver is gone once a fail-fast batch has returned
            let _ = tx.send(outcome).await;
        });
    }
    drop(tx);

    while let Some(outcome) = rx.recv().await {
        progress.inc(1);
        match outcome {
            Outcome::Success(id) => result.successful.push(id),
            Outcome::Failure(label, e) => {
                warn!(item = %label, error = %e, "Batch item failed");
                result.failed.push((label, e));
                if options.fail_fast {
                    cancelled.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
    }
    progress.finish_and_clear();

    info!(
        succeeded = result.successful.len(),
        failed = result.failed.len(),
        total,
        "Batch finished"
    );
    result
}

/// Create one record per field map in `collection`.
///
/// Failures are labelled `record #N`, 1-based in input order.
pub async fn batch_create(
    api: Arc<dyn RepoApi>,
    collection: &str,
    records: Vec<Fields>,
    options: &BatchOptions,
) -> BatchResult {
    let collection = Arc::<str>::from(collection);
    let items: Vec<(String, Fields)> = records
        .into_iter()
        .enumerate()
        .map(|(i, fields)| (format!("record #{}", i + 1), fields))
        .collect();

    run_batch(
        items,
        move |fields: Fields| {
            let api = Arc::clone(&api);
            let collection = Arc::clone(&collection);
            async move {
                operations::create_record(&*api, &collection, fields)
                    .await
                    .map(|created| created.uri)
            }
        },
        options,
        "creating records",
    )
    .await
}

/// Merge each field map into the record at its URI
pub async fn batch_update(
    api: Arc<dyn RepoApi>,
    updates: Vec<(String, Fields)>,
    options: &BatchOptions,
) -> BatchResult {
    let items: Vec<(String, (String, Fields))> = updates
        .into_iter()
        .map(|(uri, fields)| (uri.clone(), (uri, fields)))
        .collect();

    run_batch(
        items,
        move |(uri, fields): (String, Fields)| {
            let api = Arc::clone(&api);
            async move {
                let updated = operations::update_record(&*api, &uri, fields).await;
                updated.map(|_| uri)
            }
        },
        options,
        "updating records",
    )
    .await
}

/// Delete every record in `uris`
pub async fn batch_delete(
    api: Arc<dyn RepoApi>,
    uris: Vec<String>,
    options: &BatchOptions,
) -> BatchResult {
    let items: Vec<(String, String)> = uris.into_iter().map(|uri| (uri.clone(), uri)).collect();

    run_batch(
        items,
        move |uri: String| {
            let api = Arc::clone(&api);
            async move {
                let deleted = operations::delete_record(&*api, &uri).await;
                deleted.map(|()| uri)
            }
        },
        options,
        "deleting records",
    )
    .await
}

fn progress_bar(total: u64, description: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold.blue} [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    ) {
        pb.set_style(style);
    }
    pb.set_prefix(description.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
