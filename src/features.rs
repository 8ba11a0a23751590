//! Tag editing, conversion and batch work for tagfix
//!
//! `dispatch` finds audio files and `tags` reads and writes them through one
//! canonical tag set. `batch` runs multi-file operations. The console only
//! drives these modules and prints what they return.

pub mod batch;
pub mod convert;
pub mod cover;
pub mod csv_io;
pub mod dispatch;
pub mod lyrics;
pub mod rename;
pub mod romanize;
pub mod session;
pub mod settings;
pub mod tags;
