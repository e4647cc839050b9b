//! # Directory Watcher
//!
//! Finds ingestible files in the documents directory and reports changes to
//! them as they happen.
//!
//! ## Features
//!
//! - **Scanning**: Full-directory walks for the initial ingest
//! - **Real-time Watching**: Create, modify, rename and delete events
//! - **Exclusion Patterns**: Filter out unwanted files
//! - **Debouncing**: A path is reported once it has been quiet for a while,
//!   so half-copied files are not ingested
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WatchConfig ──► DirectoryWatcher ──► Debouncer ──► FileEvent   │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  FileMatcher ◄── scan                                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod scanner;
pub mod watcher;

pub use config::{FileMatcher, WatchConfig};
pub use error::{Result, WatcherError};
pub use event::{Debouncer, FileEvent, FileEventKind};
pub use scanner::scan;
pub use watcher::DirectoryWatcher;
