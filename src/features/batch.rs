//! Batch orchestration
//!
//! A batch applies one [`Operation`] to a list of files on a background thread,
//! producing one result per file and a [`BatchSummary`] at the end.

mod controller;
mod operations;
mod plan;
mod progress;
mod runner;

pub use controller::{BatchController, BatchHandle};
pub use operations::{CaseMode, Operation, OperationContext};
pub use plan::EditPlan;
pub use progress::{BatchEvent, BatchSummary};
pub use runner::BatchItem;
