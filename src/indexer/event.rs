//! The abstracted filesystem event each watch root emits.
//!
//! Kept as a small enum independent of the `notify` crate's own event types so
//! the Indexer's dispatch logic (`mod.rs`) can be driven by an in-memory fake
//! in tests, without spinning up real inotify/FSEvents watches.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
    Deleted(PathBuf),
}
