//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::AdvisorConfig;

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .course-advisor.toml
        search_paths.push(PathBuf::from(".course-advisor.toml"));

        // 2. User config directory: ~/.config/course-advisor/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("course-advisor").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<AdvisorConfig, ConfigError> {
        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                return Self::load_from_path(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(AdvisorConfig::default())
    }

    fn load_from_path(path: &Path) -> Result<AdvisorConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: AdvisorConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        validate(&config).map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(config: &AdvisorConfig) -> Result<(), String> {
    let fraction = |name: &str, value: f64| {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(format!("{name} must be between 0 and 1, got {value}"))
        }
    };
    fraction("router.confidence_threshold", config.router.confidence_threshold)?;
    fraction("safety.failure_rate_threshold", config.safety.failure_rate_threshold)?;
    if config.safety.window_size == 0 {
        return Err("safety.window_size must be at least 1".to_string());
    }
    if config.safety.min_samples > config.safety.window_size {
        return Err(format!(
            "safety.min_samples ({}) cannot exceed safety.window_size ({})",
            config.safety.min_samples, config.safety.window_size
        ));
    }
    if config.graph.per_semester_cap == 0 {
        return Err("graph.per_semester_cap must be at least 1".to_string());
    }
    Ok(())
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config file {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EitherOfRule;

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(".course-advisor.toml"));
    }

    #[test]
    fn test_config_loader_returns_defaults_when_no_file() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml"));
        let config = loader.load().unwrap();
        assert_eq!(config.safety.max_consecutive_failures, 5);
        assert!(loader.find_config_file().is_none());
    }

    #[test]
    fn test_load_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                [router]
                confidence_threshold = 0.6

                [safety]
                max_consecutive_failures = 3
                cooldown_secs = 5

                [graph]
                either_of = "exactly_one"
                per_semester_cap = 4

                [store]
                path = "/var/lib/course-advisor/catalog.db"

                [server]
                port = 8080
            "#,
        )
        .unwrap();

        let config = ConfigLoader::with_path(path).load().unwrap();
        assert!((config.router.confidence_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.safety.max_consecutive_failures, 3);
        assert_eq!(config.safety.window_size, 20);
        assert_eq!(config.graph.either_of, EitherOfRule::ExactlyOne);
        assert_eq!(config.graph.per_semester_cap, 4);
        assert!(config.store.path.is_some());
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[router\nconfidence_threshold = ").unwrap();

        let err = ConfigLoader::with_path(path).load().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[safety]\nfailure_rate_threshold = 1.5\n").unwrap();

        let err = ConfigLoader::with_path(path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
