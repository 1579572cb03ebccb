// Debounce/ignore scheduler: turns the bursty change-event stream of one
// repository into at most one commit+push per quiet period, and keeps the
// daemon from reacting to filesystem churn it caused itself.
//
// Two timers, both owned exclusively by the scheduler task:
//
// - the debounce deadline, re-armed on every change event, so it always
//   measures quiet time since the *last* event;
// - the ignore window, a cooldown gate. While it is pending the decision
//   point skips the commit. It starts pending at creation, is re-armed to
//   a short default after every commit attempt (the commit's own disk
//   writes come back as change events), and is re-armed to the
//   repository's configured ignore interval when the external control
//   fires (a revert rewrites large parts of the tree and needs a longer
//   grace period).
//
// External callers never touch the timers; the ignore request travels
// through a single-slot watch channel consumed only by the owning task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::git::worker::CommandExecutor;
use crate::git::{sync_timestamp, GitError, GitRepo};
use crate::watcher::FsEvent;

/// Delay before the scheduler starts reacting at all, so the filesystem
/// fallout of open/pull does not arm the debounce timer.
pub const STARTUP_GRACE: Duration = Duration::from_millis(50);

/// Ignore window re-armed after every commit attempt; long enough for the
/// commit's own working-tree touches to drain out of the watch source.
pub const POST_COMMIT_COOLDOWN: Duration = Duration::from_millis(100);

/// The operations a scheduler invokes when a quiet period ends. `GitRepo`
/// is the production implementation; tests observe decision points through
/// a recording stand-in.
pub trait SyncTarget: Send + Sync + 'static {
    /// Stage and commit the current working tree. `Ok(false)` means the
    /// tree was clean and nothing was committed.
    fn commit(&self, message: &str) -> Result<bool, GitError>;
    fn push(&self) -> Result<(), GitError>;
}

impl<E: CommandExecutor + 'static> SyncTarget for GitRepo<E> {
    fn commit(&self, message: &str) -> Result<bool, GitError> {
        GitRepo::commit(self, message)
    }

    fn push(&self) -> Result<(), GitError> {
        GitRepo::push(self)
    }
}

/// External control surface for one scheduler. Held by the runner;
/// delivering a window re-arms the scheduler's ignore gate.
#[derive(Debug, Clone)]
pub struct IgnoreHandle {
    tx: watch::Sender<Duration>,
}

impl IgnoreHandle {
    /// Suppress auto-commit for `window` from now. Returns `false` when the
    /// scheduler has already exited.
    pub fn suppress(&self, window: Duration) -> bool {
        self.tx.send(window).is_ok()
    }
}

pub struct Scheduler<T: SyncTarget> {
    name: String,
    debounce: Duration,
    target: Arc<T>,
    events: mpsc::Receiver<FsEvent>,
    errors: mpsc::Receiver<notify::Error>,
    control: watch::Receiver<Duration>,
}

impl<T: SyncTarget> Scheduler<T> {
    pub fn new(
        name: impl Into<String>,
        debounce: Duration,
        target: Arc<T>,
        events: mpsc::Receiver<FsEvent>,
        errors: mpsc::Receiver<notify::Error>,
    ) -> (Self, IgnoreHandle) {
        let (tx, control) = watch::channel(Duration::ZERO);
        let scheduler =
            Self { name: name.into(), debounce, target, events, errors, control };
        (scheduler, IgnoreHandle { tx })
    }

    /// Run until the watch source closes both of its channels. Spawned as
    /// an independent task, one per repository, for the process lifetime.
    ///
    /// Commit and push run on the blocking pool but are awaited in place,
    /// so at most one sequence is in flight per repository and the task
    /// does not return to its multiplexed wait until it finishes.
    pub async fn run(mut self) {
        tokio::time::sleep(STARTUP_GRACE).await;

        let mut ignore_until = Instant::now() + POST_COMMIT_COOLDOWN;

        let deadline = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(deadline);
        let mut armed = false;

        let mut events_open = true;
        let mut errors_open = true;
        let mut control_open = true;

        while events_open || errors_open {
            tokio::select! {
                maybe_event = self.events.recv(), if events_open => match maybe_event {
                    Some(event) => {
                        trace!(repo = %self.name, kind = ?event.kind,
                            path = %event.path.display(), "change event");
                        deadline.as_mut().reset(Instant::now() + self.debounce);
                        armed = true;
                    }
                    None => events_open = false,
                },

                maybe_error = self.errors.recv(), if errors_open => match maybe_error {
                    Some(error) => {
                        // Informational: the watch backend may recover on
                        // its own, and the event stream stays live.
                        warn!(repo = %self.name, %error, "watch error");
                    }
                    None => errors_open = false,
                },

                changed = self.control.changed(), if control_open => match changed {
                    Ok(()) => {
                        let window = *self.control.borrow_and_update();
                        ignore_until = Instant::now() + window;
                        info!(repo = %self.name, window_ms = window.as_millis() as u64,
                            "auto-commit suppressed on external request");
                    }
                    // Control handle dropped; no further suppress requests
                    // can arrive.
                    Err(_) => control_open = false,
                },

                () = deadline.as_mut(), if armed => {
                    armed = false;
                    if Instant::now() < ignore_until {
                        debug!(repo = %self.name,
                            "quiet period ended inside ignore window, skipping commit");
                        continue;
                    }
                    self.commit_and_push().await;
                    ignore_until = Instant::now() + POST_COMMIT_COOLDOWN;
                }
            }
        }

        info!(repo = %self.name, "watch source closed, scheduler exiting");
    }

    async fn commit_and_push(&self) {
        let target = Arc::clone(&self.target);
        let name = self.name.clone();
        let message = format!("auto sync at {}", sync_timestamp());

        let result = tokio::task::spawn_blocking(move || match target.commit(&message) {
            Ok(true) => {
                if let Err(error) = target.push() {
                    // Local commits accumulate until a later cycle pushes.
                    warn!(repo = %name, %error, "push failed");
                }
            }
            Ok(false) => {}
            Err(error) => warn!(repo = %name, %error, "commit failed"),
        })
        .await;

        if let Err(error) = result {
            warn!(repo = %self.name, %error, "commit task failed");
        }
    }
}
