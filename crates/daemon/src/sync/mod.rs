// Auto-sync core: one debounce/ignore scheduler per repository, owned and
// coordinated by the runner.

pub mod runner;
pub mod scheduler;

pub use runner::{Runner, RunnerError};
pub use scheduler::{IgnoreHandle, Scheduler, SyncTarget};
