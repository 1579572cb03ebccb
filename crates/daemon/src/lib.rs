// autosync-daemon library entry point.

pub mod api;
pub mod config;
pub mod git;
pub mod sync;
pub mod watcher;
