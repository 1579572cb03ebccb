// Wire types for the autosync HTTP API.

use serde::{Deserialize, Serialize};

/// A running repository as shown in listings. Credentials are never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    /// Stable 1-based id, assigned in configuration order.
    pub id: usize,
    pub name: String,
    pub path: String,
    pub url: String,
    pub branch: String,
}

/// One entry of a repository's commit history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub email: String,
    /// Author date, `YYYY-MM-DD HH:MM:SS`.
    pub date: String,
}

/// What happened to a path in a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Added,
    Modified,
    Deleted,
}

/// One changed path in a commit, relative to its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub action: ChangeAction,
    pub path: String,
}

/// Pagination for history queries. `index` is 1-based; an index of 0
/// returns every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Pager {
    pub index: usize,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_action_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&ChangeAction::Added).unwrap(), "\"added\"");
        assert_eq!(serde_json::to_string(&ChangeAction::Modified).unwrap(), "\"modified\"");
        assert_eq!(serde_json::to_string(&ChangeAction::Deleted).unwrap(), "\"deleted\"");
    }

    #[test]
    fn repo_summary_roundtrip() {
        let summary = RepoSummary {
            id: 1,
            name: "notes".into(),
            path: "/home/me/notes".into(),
            url: "https://git.example.com/me/notes.git".into(),
            branch: "main".into(),
        };
        let json = serde_json::to_string(&summary).unwrap();
        let back: RepoSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary, back);
    }

    #[test]
    fn pager_defaults_to_all() {
        let pager = Pager::default();
        assert_eq!(pager.index, 0);
        assert_eq!(pager.size, 0);
    }
}
