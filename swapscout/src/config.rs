use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Workflow-wide settings shared by every run.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.swapscout.yaml` in the current directory
/// 3. Global `$HOME/.config/swapscout/config.yaml`
///
/// # Configuration Format
///
/// ```yaml
/// # Branches that need an explicit override before a run may start on them
/// protected_branches: ["main", "master", "release"]
///
/// # Remote that branches are pushed to
/// remote: "origin"
///
/// # Path substrings excluded from every scan
/// exclude_dirs: ["node_modules", "target"]
///
/// # Hard cap on scanned candidates
/// max_files: 10000
///
/// # Base URL for the pull-request REST API
/// github_api_url: "https://api.github.com"
///
/// # Thread count for content matching (default: CPU cores)
/// thread_count: 4
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
///
/// # Allow runs on protected branches without asking
/// allow_protected: false
/// ```
///
/// Command-line values take precedence over file values; see `merge_with_cli`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Branch names guarded against direct automated changes
    #[serde(default = "default_protected_branches")]
    pub protected_branches: Vec<String>,

    /// Remote the working branch is pushed to
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Path substrings excluded from scanning when a job does not supply its own
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Maximum number of candidate files gathered per scan
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Base URL of the GitHub REST API
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Number of threads used to match file contents
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Proceed on protected branches without confirmation
    #[serde(default)]
    pub allow_protected: bool,
}

pub(crate) fn default_protected_branches() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}

fn default_remote() -> String {
    "origin".to_string()
}

pub(crate) fn default_exclude_dirs() -> Vec<String> {
    [".git", "node_modules", "dist", "build", ".next", "__pycache__"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub(crate) fn default_max_files() -> usize {
    10_000
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            protected_branches: default_protected_branches(),
            remote: default_remote(),
            exclude_dirs: default_exclude_dirs(),
            max_files: default_max_files(),
            github_api_url: default_github_api_url(),
            thread_count: default_thread_count(),
            log_level: default_log_level(),
            allow_protected: false,
        }
    }
}

/// Values supplied on the command line. `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub protected_branches: Option<Vec<String>>,
    pub remote: Option<String>,
    pub max_files: Option<usize>,
    pub thread_count: Option<NonZeroUsize>,
    pub log_level: Option<String>,
    pub allow_protected: bool,
}

impl WorkflowConfig {
    /// Loads configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("swapscout/config.yaml")),
            Some(PathBuf::from(".swapscout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Returns true if `branch` is in the protected set
    pub fn is_protected(&self, branch: &str) -> bool {
        self.protected_branches.iter().any(|b| b == branch)
    }

    /// Merges command-line values over configuration file values
    pub fn merge_with_cli(mut self, cli: ConfigOverrides) -> Self {
        if let Some(branches) = cli.protected_branches {
            self.protected_branches = branches;
        }
        if let Some(remote) = cli.remote {
            self.remote = remote;
        }
        if let Some(max_files) = cli.max_files {
            self.max_files = max_files;
        }
        if let Some(threads) = cli.thread_count {
            self.thread_count = threads;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        if cli.allow_protected {
            self.allow_protected = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            protected_branches: ["main", "release"]
            remote: "upstream"
            exclude_dirs: ["vendor"]
            max_files: 50
            github_api_url: "http://localhost:9000"
            thread_count: 2
            log_level: "debug"
            allow_protected: true
        "#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = WorkflowConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.protected_branches, vec!["main", "release"]);
        assert_eq!(config.remote, "upstream");
        assert_eq!(config.exclude_dirs, vec!["vendor"]);
        assert_eq!(config.max_files, 50);
        assert_eq!(config.github_api_url, "http://localhost:9000");
        assert_eq!(config.thread_count, NonZeroUsize::new(2).unwrap());
        assert_eq!(config.log_level, "debug");
        assert!(config.allow_protected);
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(b"remote: \"origin\"\n").unwrap();

        let config = WorkflowConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.protected_branches, vec!["main", "master"]);
        assert_eq!(config.max_files, 10_000);
        assert!(config.exclude_dirs.contains(&"node_modules".to_string()));
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert_eq!(config.log_level, "warn");
        assert!(!config.allow_protected);
    }

    #[test]
    fn test_merge_with_cli() {
        let file_config = WorkflowConfig {
            remote: "upstream".to_string(),
            max_files: 100,
            ..WorkflowConfig::default()
        };

        let merged = file_config.merge_with_cli(ConfigOverrides {
            max_files: Some(5),
            log_level: Some("trace".to_string()),
            allow_protected: true,
            ..ConfigOverrides::default()
        });

        assert_eq!(merged.remote, "upstream"); // File value (CLI None)
        assert_eq!(merged.max_files, 5); // CLI value
        assert_eq!(merged.log_level, "trace"); // CLI value
        assert!(merged.allow_protected);
    }

    #[test]
    fn test_is_protected() {
        let config = WorkflowConfig::default();
        assert!(config.is_protected("main"));
        assert!(config.is_protected("master"));
        assert!(!config.is_protected("feature/main"));
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(b"max_files: \"many\"\nthread_count: 0\n").unwrap();

        assert!(WorkflowConfig::load_from(Some(&config_path)).is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = WorkflowConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }
}
