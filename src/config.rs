use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::drag::DEFAULT_ACTIVATION_DISTANCE;
use crate::error::{AtsError, Result};

pub const DATA_DIR_ENV: &str = "ATS_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    /// Tracing filter, e.g. `info` or `ats=debug`. `ATS_LOG` wins over this.
    pub log_level: String,
    /// A press becomes a drag once the pointer moves more than this many cells.
    pub drag_activation_distance: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: "info".to_string(),
            drag_activation_distance: DEFAULT_ACTIVATION_DISTANCE,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location. A missing file yields defaults;
    /// a file that exists but does not parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| AtsError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&raw).map_err(|e| match e {
            AtsError::Config(msg) => AtsError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AtsError::Config(e.to_string()))
    }

    /// Data directory in priority order: command line, environment, config file,
    /// platform default, current directory.
    pub fn resolve_data_dir(&self, cli: Option<&Path>, env: Option<&str>) -> PathBuf {
        if let Some(dir) = cli {
            return dir.to_path_buf();
        }
        if let Some(dir) = env.filter(|d| !d.trim().is_empty()) {
            return PathBuf::from(dir);
        }
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("", "", "ats")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "ats").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Files kept in the data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn database(&self) -> PathBuf {
        self.root.join("ats.db")
    }

    pub fn session(&self) -> PathBuf {
        self.root.join("session.json")
    }

    pub fn resumes(&self) -> PathBuf {
        self.root.join("resumes")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("ats.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config = Config::parse("log_level = \"debug\"").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.drag_activation_distance, DEFAULT_ACTIVATION_DISTANCE);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        assert!(matches!(
            Config::parse("drag_activation_distance = \"far\""),
            Err(AtsError::Config(_))
        ));
    }

    #[test]
    fn load_reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "data_dir = \"/srv/ats\"\ndrag_activation_distance = 4\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/ats")));
        assert_eq!(config.drag_activation_distance, 4);

        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(AtsError::Config(_))));
    }

    #[test]
    fn data_dir_priority() {
        let config = Config {
            data_dir: Some(PathBuf::from("/from/config")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_data_dir(Some(Path::new("/from/cli")), Some("/from/env")),
            PathBuf::from("/from/cli")
        );
        assert_eq!(config.resolve_data_dir(None, Some("/from/env")), PathBuf::from("/from/env"));
        assert_eq!(config.resolve_data_dir(None, Some("  ")), PathBuf::from("/from/config"));
        assert_eq!(config.resolve_data_dir(None, None), PathBuf::from("/from/config"));
    }

    #[test]
    fn data_paths_live_under_root() {
        let paths = DataPaths::new("/tmp/ats");
        assert_eq!(paths.database(), PathBuf::from("/tmp/ats/ats.db"));
        assert_eq!(paths.session(), PathBuf::from("/tmp/ats/session.json"));
        assert_eq!(paths.resumes(), PathBuf::from("/tmp/ats/resumes"));
    }
}
