//! Sequential batch core
//!
//! Every submitted item produces exactly one [`BatchResult`], whether the
//! item's work returns an error or panics.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tokio::sync::{mpsc, watch};

use crate::error::Result;

use super::progress::{BatchEvent, BatchResult, BatchStatus, BatchSummary};

/// Anything a batch can process
pub trait BatchItem {
    fn key(&self) -> &Path;
}

impl BatchItem for crate::features::dispatch::AudioFile {
    fn key(&self) -> &Path {
        &self.path
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Process `items` in order, stopping early only between items
///
/// `work` errors become `Failed` records and panics become `Error` records.
/// Send failures on `events` are ignored so a dropped receiver never stops the
/// batch.
pub fn run_items<T, F>(
    items: &[T],
    cancel: &watch::Receiver<bool>,
    events: &mpsc::UnboundedSender<BatchEvent>,
    mut work: F,
) -> (Vec<BatchResult>, BatchSummary)
where
    T: BatchItem,
    F: FnMut(&T) -> Result<BatchResult>,
{
    let total = items.len();
    let _ = events.send(BatchEvent::Started { total });

    let mut results = Vec::with_capacity(total);
    let mut summary = BatchSummary::default();

    for (index, item) in items.iter().enumerate() {
        if *cancel.borrow() {
            tracing::info!("Batch canceled after {} of {} items", index, total);
            summary.canceled = Some((index, total));
            break;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(item)));
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!("Failed to process {:?}: {}", item.key(), e);
                BatchResult::new(item.key(), BatchStatus::Failed, e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Panic while processing {:?}: {}", item.key(), message);
                BatchResult::new(item.key(), BatchStatus::Error, message)
            }
        };

        summary.record(result.status);
        let _ = events.send(BatchEvent::Progress {
            current: index + 1,
            total,
        });
        let _ = events.send(BatchEvent::Result(result.clone()));
        results.push(result);
    }

    let _ = events.send(BatchEvent::Finished(summary.clone()));
    (results, summary)
}
