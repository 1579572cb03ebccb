// Daemon configuration.
//
// A single TOML file (default `autosync.toml`, overridable with `--config`)
// holds the API server address, the API user, global fallbacks, and one
// `[[repos]]` table per synchronized repository. Per-repo values override
// `[defaults]`, which override the built-ins.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Built-in fallbacks applied when neither the repo nor `[defaults]` sets
/// a value.
const DEFAULT_DEBOUNCE_SECS: u64 = 3;
const DEFAULT_IGNORE_SECS: u64 = 3;
const DEFAULT_PULL_ON_START: bool = true;
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_EMAIL: &str = "autosync@example.com";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub defaults: SyncDefaults,
    pub repos: Vec<RepoConfig>,
}

impl Config {
    /// Load and parse the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Apply the defaults cascade and produce one immutable [`RepoSettings`]
    /// per configured repository, in configuration order.
    pub fn resolve(&self) -> Vec<RepoSettings> {
        self.repos.iter().map(|repo| repo.resolve(&self.defaults)).collect()
    }
}

/// Bind address for the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 2222 }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The single API user and the JWT signing secret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: "admin123".into(),
            jwt_secret: "autosync_local_development_secret_change_me".into(),
        }
    }
}

/// Global fallbacks for per-repo sync settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SyncDefaults {
    /// Quiet seconds after the last change event before committing.
    pub debounce: Option<u64>,
    /// Seconds to suppress auto-commit after an external ignore request.
    pub ignore: Option<u64>,
    /// Pull from the remote when the repository is opened.
    pub pull: Option<bool>,
}

/// One `[[repos]]` table. Unset fields fall back to `[defaults]`, then to
/// the built-ins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RepoConfig {
    pub name: Option<String>,
    pub path: PathBuf,
    pub url: String,
    pub branch: Option<String>,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub debounce: Option<u64>,
    pub ignore: Option<u64>,
    pub pull: Option<bool>,
}

impl RepoConfig {
    fn resolve(&self, defaults: &SyncDefaults) -> RepoSettings {
        RepoSettings {
            name: self
                .name
                .clone()
                .unwrap_or_else(|| self.path.display().to_string()),
            path: self.path.clone(),
            url: self.url.clone(),
            branch: self.branch.clone().unwrap_or_else(|| DEFAULT_BRANCH.into()),
            username: self.username.clone(),
            password: self.password.clone(),
            email: self.email.clone().unwrap_or_else(|| DEFAULT_EMAIL.into()),
            debounce: Duration::from_secs(
                self.debounce.or(defaults.debounce).unwrap_or(DEFAULT_DEBOUNCE_SECS),
            ),
            ignore: Duration::from_secs(
                self.ignore.or(defaults.ignore).unwrap_or(DEFAULT_IGNORE_SECS),
            ),
            pull: self.pull.or(defaults.pull).unwrap_or(DEFAULT_PULL_ON_START),
        }
    }
}

/// Fully resolved, immutable settings for one repository. Handed to the
/// runner at construction; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoSettings {
    pub name: String,
    pub path: PathBuf,
    pub url: String,
    pub branch: String,
    pub username: String,
    pub password: String,
    pub email: String,
    pub debounce: Duration,
    pub ignore: Duration,
    pub pull: bool,
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(std::io::Error),
    #[error("config parse error: {0}")]
    Parse(toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 2222);
        assert_eq!(cfg.auth.username, "admin");
        assert!(cfg.repos.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8080

[auth]
username = "me"
password = "secret"
jwt_secret = "another-secret"

[defaults]
debounce = 5
ignore = 10
pull = false

[[repos]]
name = "notes"
path = "/home/me/notes"
url = "https://git.example.com/me/notes.git"
branch = "dev"
username = "me"
password = "token"
email = "me@example.com"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.server.bind_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.defaults.debounce, Some(5));
        assert_eq!(cfg.repos.len(), 1);
        assert_eq!(cfg.repos[0].name.as_deref(), Some("notes"));
        assert_eq!(cfg.repos[0].branch.as_deref(), Some("dev"));
    }

    #[test]
    fn resolve_applies_built_ins() {
        let cfg: Config = toml::from_str(
            r#"
[[repos]]
path = "/data/wiki"
url = "https://git.example.com/wiki.git"
"#,
        )
        .unwrap();
        let settings = cfg.resolve();
        assert_eq!(settings.len(), 1);
        let repo = &settings[0];
        assert_eq!(repo.name, "/data/wiki");
        assert_eq!(repo.branch, "main");
        assert_eq!(repo.email, "autosync@example.com");
        assert_eq!(repo.debounce, Duration::from_secs(3));
        assert_eq!(repo.ignore, Duration::from_secs(3));
        assert!(repo.pull);
    }

    #[test]
    fn resolve_prefers_repo_over_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[defaults]
debounce = 5
ignore = 10
pull = false

[[repos]]
path = "/data/a"
url = "https://git.example.com/a.git"
debounce = 1

[[repos]]
path = "/data/b"
url = "https://git.example.com/b.git"
"#,
        )
        .unwrap();
        let settings = cfg.resolve();
        assert_eq!(settings[0].debounce, Duration::from_secs(1));
        assert_eq!(settings[0].ignore, Duration::from_secs(10));
        assert!(!settings[0].pull);
        assert_eq!(settings[1].debounce, Duration::from_secs(5));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_invalid_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "server = \"not a table\"").unwrap();
        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("autosync.toml");
        let cfg = Config {
            repos: vec![RepoConfig {
                name: Some("notes".into()),
                path: PathBuf::from("/home/me/notes"),
                url: "https://git.example.com/me/notes.git".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        std::fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(cfg, loaded);
    }
}
