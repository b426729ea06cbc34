//! ZenFS core: a personal-computing filesystem overlay unifying a system
//! drive and removable roaming drives into one namespace, with per-file
//! drive attribution, collision resolution, and dynamic symlink
//! projections of media libraries.
//!
//! Three components compose the core: the [`reconciler`] ("Nomad"), the
//! [`indexer`] ("Librarian"), and the [`conductor`].

pub mod config;
pub mod conductor;
pub mod drive;
pub mod indexer;
pub mod notify;
pub mod reconciler;
