//! At most one batch in flight, run on a background thread

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, watch};

use crate::error::{Result, TagfixError};
use crate::features::dispatch::AudioFile;

use super::operations::{Job, Operation, OperationContext};
use super::progress::{BatchEvent, BatchResult, BatchSummary};

/// Asks a running batch to stop before its next item
#[derive(Debug)]
struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

type ActiveSlot = Arc<Mutex<Option<CancelHandle>>>;

/// Clears the running flag and the active batch when the worker exits, even by panic
struct RunningGuard {
    running: Arc<AtomicBool>,
    active: ActiveSlot,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.take();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Receiving end of a started batch
pub struct BatchHandle {
    pub events: mpsc::UnboundedReceiver<BatchEvent>,
    join: JoinHandle<(Vec<BatchResult>, BatchSummary)>,
}

impl BatchHandle {
    /// Block until the next event; `None` once the worker is gone
    pub fn next_event(&mut self) -> Option<BatchEvent> {
        self.events.blocking_recv()
    }

    /// Wait for the worker and return every record plus the summary
    pub fn wait(self) -> Result<(Vec<BatchResult>, BatchSummary)> {
        self.join
            .join()
            .map_err(|_| TagfixError::write("batch", "worker thread panicked"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchController {
    running: Arc<AtomicBool>,
    active: ActiveSlot,
}

impl BatchController {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Cancel the batch in flight, if any; `false` when nothing was running
    pub fn cancel_running(&self) -> bool {
        let Ok(active) = self.active.lock() else {
            return false;
        };
        match active.as_ref() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Start `operation` over `files`
    ///
    /// Returns `Busy` while another batch runs and `CapabilityMissing` when the
    /// operation cannot run at all; in both cases no file is touched.
    pub fn start(
        &self,
        files: Vec<AudioFile>,
        operation: Operation,
        context: OperationContext,
    ) -> Result<BatchHandle> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Refusing to start {}: a batch is already running", operation);
            return Err(TagfixError::Busy);
        }
        let guard = RunningGuard {
            running: self.running.clone(),
            active: self.active.clone(),
        };

        let job = Job::prepare(operation, context)?;
        tracing::debug!(
            "Starting {} over {} items",
            job.operation(),
            job.item_count(&files)
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel = CancelHandle(cancel_tx);
        if let Ok(mut active) = self.active.lock() {
            *active = Some(cancel);
        }

        let join = thread::Builder::new()
            .name("tagfix-batch".to_string())
            .spawn(move || {
                let _guard = guard;
                job.run(&files, &cancel_rx, &events_tx)
            })?;

        Ok(BatchHandle {
            events: events_rx,
            join,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::batch::CaseMode;
    use crate::features::batch::progress::BatchStatus;
    use crate::features::convert::TargetFormat;
    use crate::features::tags::{CanonicalTag, TagSession};
    use crate::test_support::write_silent_wav;
    use tempfile::TempDir;

    fn files(dir: &TempDir, n: usize) -> Vec<AudioFile> {
        (0..n)
            .map(|i| {
                let path = dir.path().join(format!("{}.wav", i));
                write_silent_wav(&path);
                let file = AudioFile::from_path(&path).unwrap();
                let mut session = TagSession::open(&file).unwrap();
                session.set(CanonicalTag::Title, "lower title").unwrap();
                session.save().unwrap();
                file
            })
            .collect()
    }

    #[test]
    fn test_batch_runs_and_reports() {
        let dir = TempDir::new().unwrap();
        let controller = BatchController::new();
        let mut handle = controller
            .start(
                files(&dir, 3),
                Operation::CaseConvert(CaseMode::Upper),
                OperationContext::offline(),
            )
            .unwrap();

        let mut progress = Vec::new();
        let mut summary = None;
        while let Some(event) = handle.next_event() {
            match event {
                BatchEvent::Progress { current, total } => progress.push((current, total)),
                BatchEvent::Finished(s) => summary = Some(s),
                _ => {}
            }
        }
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(summary.unwrap().message(), "Done, updated 3 files.");

        let (results, _) = handle.wait().unwrap();
        assert!(results.iter().all(|r| r.status == BatchStatus::Updated));
        assert!(!controller.is_running());
    }

    #[test]
    fn test_second_batch_is_busy() {
        let dir = TempDir::new().unwrap();
        let controller = BatchController::new();
        controller.running.store(true, Ordering::SeqCst);

        let result = controller.start(
            files(&dir, 1),
            Operation::ResizeCover,
            OperationContext::offline(),
        );
        assert!(matches!(result, Err(TagfixError::Busy)));
        assert!(controller.is_running());
    }

    #[test]
    fn test_missing_capability_releases_flag() {
        let dir = TempDir::new().unwrap();
        let controller = BatchController::new();
        let result = controller.start(
            files(&dir, 1),
            Operation::Convert(TargetFormat::Flac),
            OperationContext::offline(),
        );
        assert!(matches!(result, Err(TagfixError::CapabilityMissing(_))));
        assert!(!controller.is_running());
    }

    #[test]
    fn test_cancel_before_first_item() {
        let dir = TempDir::new().unwrap();
        let controller = BatchController::new();
        let handle = controller
            .start(
                files(&dir, 2),
                Operation::CaseConvert(CaseMode::Lower),
                OperationContext::offline(),
            )
            .unwrap();
        controller.cancel_running();
        let (results, summary) = handle.wait().unwrap();
        // The worker may already have finished one or both items.
        assert!(results.len() <= 2);
        if results.len() < 2 {
            assert!(summary.canceled.is_some());
        }
        assert!(!controller.is_running());
    }

    #[test]
    fn test_cancel_running_reaches_active_batch() {
        let controller = BatchController::new();
        assert!(!controller.cancel_running());

        let (cancel_tx, cancel_rx) = watch::channel(false);
        *controller.active.lock().unwrap() = Some(CancelHandle(cancel_tx));
        assert!(controller.cancel_running());
        assert!(*cancel_rx.borrow());
    }

    #[test]
    fn test_finished_batch_is_no_longer_cancelable() {
        let dir = TempDir::new().unwrap();
        let controller = BatchController::new();
        let handle = controller
            .start(
                files(&dir, 1),
                Operation::CaseConvert(CaseMode::Upper),
                OperationContext::offline(),
            )
            .unwrap();
        handle.wait().unwrap();
        assert!(!controller.cancel_running());
        assert!(controller.active.lock().unwrap().is_none());
    }
}
