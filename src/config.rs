use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cluster::DEFAULT_THRESHOLD;

pub const DEFAULT_CONFIG_PATH: &str = "mediadup.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct Config {
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,

    #[serde(default = "default_threshold")]
    pub threshold: u32,

    #[serde(default)]
    pub workers: Option<usize>,
}

fn default_catalog() -> PathBuf {
    PathBuf::from("media.json")
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            threshold: default_threshold(),
            workers: None,
        }
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// Without an explicit path, a missing `mediadup.toml` means defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read config {}", path.display()))
            }
        };
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn workers(&self) -> usize {
        self.workers.filter(|&n| n > 0).unwrap_or_else(num_cpus::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.catalog, PathBuf::from("media.json"));
        assert_eq!(config.threshold, 8);
        assert_eq!(config.workers(), num_cpus::get());
    }

    #[test]
    fn fields_override_defaults() {
        let config: Config =
            toml::from_str("catalog = \"/srv/media.json\"\nthreshold = 4\nworkers = 3\n").unwrap();
        assert_eq!(config.catalog, PathBuf::from("/srv/media.json"));
        assert_eq!(config.threshold, 4);
        assert_eq!(config.workers(), 3);
    }

    #[test]
    fn zero_workers_means_all_cpus() {
        let config: Config = toml::from_str("workers = 0").unwrap();
        assert_eq!(config.workers(), num_cpus::get());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("treshold = 4").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.toml");
        assert!(Config::load(Some(absent.as_path())).is_err());

        let path = dir.path().join("mediadup.toml");
        std::fs::write(&path, "threshold = 12").unwrap();
        assert_eq!(Config::load(Some(path.as_path())).unwrap().threshold, 12);
    }
}
