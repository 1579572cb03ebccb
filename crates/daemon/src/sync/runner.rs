// Multi-repository runner.
//
// Takes the resolved configuration, brings each repository up (open the
// working tree, start a watch source, spawn a scheduler task) and keeps a
// positional registry of what is running. A repository that fails to start
// leaves a vacant slot: later repositories keep the ids their configuration
// position implies, and operations on the failed id report it as not
// running instead of touching a neighbor.

use std::sync::Arc;
use std::time::Duration;

use autosync_common::types::RepoSummary;
use tracing::{info, warn};

use crate::config::RepoSettings;
use crate::git::worker::{CommandExecutor, ProcessCommandExecutor};
use crate::git::GitRepo;
use crate::sync::scheduler::{IgnoreHandle, Scheduler};
use crate::watcher::WatchSource;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("no repository with id {0}")]
    InvalidId(usize),
    #[error("repository {0} is not running")]
    NotRunning(usize),
}

struct RepoEntry<E: CommandExecutor + 'static> {
    repo: Arc<GitRepo<E>>,
    ignore: IgnoreHandle,
    ignore_window: Duration,
    // Dropping the watch source closes the scheduler's channels, so the
    // entry keeps it alive for as long as the repository is running.
    _watch: WatchSource,
}

pub struct Runner<E: CommandExecutor + 'static = ProcessCommandExecutor> {
    entries: Vec<Option<RepoEntry<E>>>,
}

impl Runner<ProcessCommandExecutor> {
    /// Bring up every configured repository. Must be called from within a
    /// runtime; scheduler tasks are spawned onto it.
    pub fn start(settings: Vec<RepoSettings>) -> Self {
        Self::start_with(settings, GitRepo::new)
    }
}

impl<E: CommandExecutor + 'static> Runner<E> {
    /// Like [`Runner::start`] with an injectable repository constructor.
    pub fn start_with(
        settings: Vec<RepoSettings>,
        mut make_repo: impl FnMut(RepoSettings) -> GitRepo<E>,
    ) -> Self {
        let entries =
            settings.into_iter().map(|repo| Self::start_repo(repo, &mut make_repo)).collect();
        Self { entries }
    }

    fn start_repo(
        settings: RepoSettings,
        make_repo: &mut impl FnMut(RepoSettings) -> GitRepo<E>,
    ) -> Option<RepoEntry<E>> {
        let name = settings.name.clone();
        let path = settings.path.clone();
        let debounce = settings.debounce;
        let ignore_window = settings.ignore;
        let pull = settings.pull;

        let repo = Arc::new(make_repo(settings));

        if let Err(error) = repo.open(pull) {
            warn!(repo = %name, %error, "failed to open repository, skipping");
            return None;
        }

        let (watch, events, errors) = match WatchSource::add(&path) {
            Ok(parts) => parts,
            Err(error) => {
                warn!(repo = %name, %error, "failed to watch repository, skipping");
                return None;
            }
        };

        let (scheduler, ignore) =
            Scheduler::new(name.clone(), debounce, Arc::clone(&repo), events, errors);
        tokio::spawn(scheduler.run());

        info!(repo = %name, path = %path.display(), "repository running");
        Some(RepoEntry { repo, ignore, ignore_window, _watch: watch })
    }

    /// Suppress auto-commit on repository `id` for its configured ignore
    /// interval.
    pub fn ignore(&self, id: usize) -> Result<(), RunnerError> {
        let entry = self.entry(id)?;
        if !entry.ignore.suppress(entry.ignore_window) {
            return Err(RunnerError::NotRunning(id));
        }
        Ok(())
    }

    /// Shared handle to repository `id` for history and revert operations.
    pub fn repository(&self, id: usize) -> Result<Arc<GitRepo<E>>, RunnerError> {
        Ok(Arc::clone(&self.entry(id)?.repo))
    }

    /// Every running repository, with its stable 1-based id. Vacant slots
    /// are skipped, not renumbered.
    pub fn summaries(&self) -> Vec<RepoSummary> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let entry = slot.as_ref()?;
                let settings = entry.repo.settings();
                Some(RepoSummary {
                    id: index + 1,
                    name: settings.name.clone(),
                    path: settings.path.display().to_string(),
                    url: settings.url.clone(),
                    branch: settings.branch.clone(),
                })
            })
            .collect()
    }

    fn entry(&self, id: usize) -> Result<&RepoEntry<E>, RunnerError> {
        if id == 0 || id > self.entries.len() {
            return Err(RunnerError::InvalidId(id));
        }
        self.entries[id - 1].as_ref().ok_or(RunnerError::NotRunning(id))
    }
}
