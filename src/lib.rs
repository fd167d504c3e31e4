pub mod cli;
pub mod git;

mod api;
mod config;
mod flock;

pub use api::{MirrorSync, MirrorSyncBuilder};
pub use crate::config::MirrorSyncConfig;
pub use git::working_directory::{SyncAction, SyncError, Synced, WorkingDirectory};
