//! Runtime configuration for the rule engine.
//!
//! # Config file: `.gkrc`
//!
//! Like `.gitconfig`, gatekeep reads TOML `.gkrc` files:
//!
//! - **Global**: `~/.gkrc` applies everywhere
//! - **Local**: `.gkrc` or `.gatekeep/.gkrc` in the project, found by
//!   walking up from the working directory; overrides global values
//!
//! ```toml
//! command_timeout = 60
//! http_timeout = 10
//! max_parallel_tasks = 4
//! auth_token = "bearer-token-for-http"
//! package_dir = "~/.gatekeep/packages"
//! ```
//!
//! All fields are optional.

use crate::error::EvalError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TOML-friendly intermediate representation (all fields optional).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    command_timeout: Option<u64>,
    http_timeout: Option<u64>,
    max_parallel_tasks: Option<usize>,
    auth_token: Option<String>,
    package_dir: Option<String>,
}

/// Resolved configuration.
///
/// | Setting | Default |
/// |---------|---------|
/// | `command_timeout` | 30 s |
/// | `http_timeout` | 30 s |
/// | `max_parallel_tasks` | `0` (= all available cores) |
/// | `auth_token` | `None` |
/// | `package_dir` | `~/.gatekeep/packages` |
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Maximum time a `run` command or `exec()` call may take.
    pub command_timeout: Duration,
    /// Timeout for `http.get()`.
    pub http_timeout: Duration,
    /// Upper bound on concurrently executing `parallel` tasks.
    /// `0` means one per core.
    pub max_parallel_tasks: usize,
    /// Bearer token sent with every HTTP request.
    pub auth_token: Option<String>,
    /// Where `use "name"` packages are looked up.
    pub package_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let package_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gatekeep")
            .join("packages");
        Self {
            command_timeout: Duration::from_secs(30),
            http_timeout: Duration::from_secs(30),
            max_parallel_tasks: 0,
            auth_token: None,
            package_dir,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration by merging the global `~/.gkrc` with the
    /// nearest local `.gkrc`, local values winning.
    pub fn load(start_dir: impl AsRef<Path>) -> Result<Self, EvalError> {
        let mut config = Self::default();

        if let Some(global) = Self::global_path() {
            if global.exists() {
                config.apply(&Self::read_file(&global)?);
            }
        }

        if let Some(local) = Self::find_local(start_dir.as_ref()) {
            config.apply(&Self::read_file(&local)?);
        }

        Ok(config)
    }

    fn global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".gkrc"))
    }

    /// Walks up from `start` looking for `.gkrc` or `.gatekeep/.gkrc`.
    fn find_local(start: &Path) -> Option<PathBuf> {
        let mut dir = Some(start);
        while let Some(current) = dir {
            for candidate in [current.join(".gkrc"), current.join(".gatekeep/.gkrc")] {
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
            dir = current.parent();
        }
        None
    }

    fn read_file(path: &Path) -> Result<ConfigFile, EvalError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EvalError::io(format!("cannot read {}: {}", path.display(), e), None))?;
        toml::from_str(&text)
            .map_err(|e| EvalError::io(format!("invalid config {}: {}", path.display(), e), None))
    }

    fn apply(&mut self, file: &ConfigFile) {
        if let Some(secs) = file.command_timeout {
            self.command_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.http_timeout {
            self.http_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = file.max_parallel_tasks {
            self.max_parallel_tasks = n;
        }
        if let Some(token) = &file.auth_token {
            self.auth_token = Some(token.clone());
        }
        if let Some(dir) = &file.package_dir {
            self.package_dir = PathBuf::from(shellexpand_home(dir));
        }
    }
}

/// Expands a leading `~` to the home directory.
fn shellexpand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert_eq!(config.max_parallel_tasks, 0);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn local_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join(".gkrc")).unwrap();
        writeln!(file, "command_timeout = 5\nmax_parallel_tasks = 2").unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.max_parallel_tasks, 2);
        // Untouched fields keep their defaults.
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn nested_gatekeep_dir_is_found_from_subdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".gatekeep")).unwrap();
        let mut file = std::fs::File::create(dir.path().join(".gatekeep/.gkrc")).unwrap();
        writeln!(file, "http_timeout = 7").unwrap();

        let subdir = dir.path().join("src/deep");
        std::fs::create_dir_all(&subdir).unwrap();

        let config = Config::load(&subdir).unwrap();
        assert_eq!(config.http_timeout, Duration::from_secs(7));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join(".gkrc")).unwrap();
        writeln!(file, "command_timeout = \"soon\"").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
