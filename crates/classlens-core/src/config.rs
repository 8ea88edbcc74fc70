//! Configuration, resolution policy, and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

use crate::error::{Error, Result};

/// Matches scoring at or above this are discarded outright.
pub const DEFAULT_QUALITY_FLOOR: f64 = 0.4;
/// Absolute score window above the best match kept as competing candidates.
pub const DEFAULT_AMBIGUITY_MARGIN: f64 = 0.05;
/// Maximum number of candidates a resolved term carries.
pub const DEFAULT_MAX_CANDIDATES: usize = 5;
/// Tolerance for score comparisons, so `best + margin` stays inclusive
/// despite float rounding.
pub const SCORE_EPSILON: f64 = 1e-9;

/// Paths to all ClassLens data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub db_dir: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
    /// Default seed file for `classlens import` (`data/seed.json`).
    pub seed_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db_dir: root.join("db"),
            llm_config_file: root.join("llm-config.json"),
            seed_file: root.join("seed.json"),
            root,
        };
        std::fs::create_dir_all(&paths.db_dir)?;
        Ok(paths)
    }
}

/// Tunable thresholds of the entity resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    /// Absolute quality floor; candidates must score strictly below it.
    pub quality_floor: f64,
    /// Candidates within `best + ambiguity_margin` are kept.
    pub ambiguity_margin: f64,
    /// Cap on candidates per resolved term.
    pub max_candidates: usize,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            quality_floor: DEFAULT_QUALITY_FLOOR,
            ambiguity_margin: DEFAULT_AMBIGUITY_MARGIN,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl ResolutionPolicy {
    /// Check the thresholds are usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.quality_floor > 0.0 && self.quality_floor <= 1.0) {
            return Err(Error::Config(format!(
                "quality floor must be in (0, 1], got {}",
                self.quality_floor
            )));
        }
        if !(self.ambiguity_margin >= 0.0 && self.ambiguity_margin.is_finite()) {
            return Err(Error::Config(format!(
                "ambiguity margin must be a non-negative number, got {}",
                self.ambiguity_margin
            )));
        }
        if self.max_candidates == 0 {
            return Err(Error::Config("max candidates must be at least 1".into()));
        }
        Ok(())
    }

    /// Build a policy from `CLASSLENS_*` variables supplied by `lookup`.
    ///
    /// Unparseable values, or a combination that fails validation, fall back
    /// to the defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let policy = Self {
            quality_floor: parse_var(&lookup, "CLASSLENS_QUALITY_FLOOR")
                .unwrap_or(defaults.quality_floor),
            ambiguity_margin: parse_var(&lookup, "CLASSLENS_AMBIGUITY_MARGIN")
                .unwrap_or(defaults.ambiguity_margin),
            max_candidates: parse_var(&lookup, "CLASSLENS_MAX_CANDIDATES")
                .unwrap_or(defaults.max_candidates),
        };
        match policy.validate() {
            Ok(()) => policy,
            Err(e) => {
                warn!("Ignoring resolution policy overrides: {}", e);
                defaults
            }
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

/// Top-level ClassLens configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassLensConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Entity resolution thresholds.
    pub policy: ResolutionPolicy,
    /// Periodic index rebuild interval; `None` rebuilds only on demand.
    pub refresh_interval_secs: Option<u64>,
}

impl ClassLensConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();

        let port = parse_var(&lookup, "PORT").unwrap_or(3004);
        let refresh_interval_secs =
            parse_var::<u64>(&lookup, "CLASSLENS_REFRESH_SECS").filter(|secs| *secs > 0);

        Ok(Self {
            port,
            data_paths: DataPaths::new(data_dir)?,
            policy: ResolutionPolicy::from_lookup(lookup),
            refresh_interval_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_policy() {
        let policy = ResolutionPolicy::default();
        assert_eq!(policy.quality_floor, 0.4);
        assert_eq!(policy.ambiguity_margin, 0.05);
        assert_eq!(policy.max_candidates, 5);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_overrides() {
        let policy = ResolutionPolicy::from_lookup(lookup_from(&[
            ("CLASSLENS_QUALITY_FLOOR", "0.3"),
            ("CLASSLENS_MAX_CANDIDATES", "3"),
        ]));
        assert_eq!(policy.quality_floor, 0.3);
        assert_eq!(policy.ambiguity_margin, 0.05);
        assert_eq!(policy.max_candidates, 3);
    }

    #[test]
    fn test_unparseable_override_uses_default() {
        let policy = ResolutionPolicy::from_lookup(lookup_from(&[(
            "CLASSLENS_AMBIGUITY_MARGIN",
            "wide",
        )]));
        assert_eq!(policy.ambiguity_margin, DEFAULT_AMBIGUITY_MARGIN);
    }

    #[test]
    fn test_invalid_policy_falls_back() {
        let policy = ResolutionPolicy::from_lookup(lookup_from(&[
            ("CLASSLENS_QUALITY_FLOOR", "1.5"),
            ("CLASSLENS_MAX_CANDIDATES", "2"),
        ]));
        assert_eq!(policy, ResolutionPolicy::default());
    }

    #[test]
    fn test_data_paths_created() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        let paths = DataPaths::new(&root).unwrap();
        assert!(paths.db_dir.is_dir());
        assert_eq!(paths.seed_file, root.join("seed.json"));
    }
}
