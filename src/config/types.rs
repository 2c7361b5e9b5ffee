//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph::{CorequisiteRule, EitherOfRule, GraphPolicy};

/// AI provider kind.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Claude,
}

/// Configuration for the text-generation client used by the escalation tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Provider to use (gemini or claude).
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model to answer escalated questions.
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Base URL for the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable name for the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Tier selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Queries classified below this confidence go straight to escalation.
    pub confidence_threshold: f64,
    /// Upper bound on one escalation call.
    pub escalation_timeout_secs: u64,
    /// Re-attempts at the same tier after a transient failure.
    pub max_retries: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            escalation_timeout_secs: 30,
            max_retries: 1,
        }
    }
}

impl RouterConfig {
    #[must_use]
    pub fn escalation_timeout(&self) -> Duration {
        Duration::from_secs(self.escalation_timeout_secs)
    }
}

/// Circuit breaker and latency budget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Consecutive failures that open a tier's circuit.
    pub max_consecutive_failures: u32,
    /// Window failure rate above which a tier's circuit opens.
    pub failure_rate_threshold: f64,
    /// Outcomes required in the window before the rate is considered.
    pub min_samples: usize,
    /// Outcomes kept per tier.
    pub window_size: usize,
    /// How long an open circuit stays open.
    pub cooldown_secs: u64,
    pub structured_budget_ms: u64,
    pub rule_based_budget_ms: u64,
    pub escalation_budget_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            failure_rate_threshold: 0.3,
            min_samples: 10,
            window_size: 20,
            cooldown_secs: 60,
            structured_budget_ms: 100,
            rule_based_budget_ms: 250,
            escalation_budget_ms: 30_000,
        }
    }
}

/// Prerequisite semantics and planning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub either_of: EitherOfRule,
    pub corequisite: CorequisiteRule,
    /// Courses per semester when planning a roadmap.
    pub per_semester_cap: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            either_of: EitherOfRule::default(),
            corequisite: CorequisiteRule::default(),
            per_semester_cap: 3,
        }
    }
}

impl GraphConfig {
    #[must_use]
    pub fn policy(&self) -> GraphPolicy {
        GraphPolicy {
            either_of: self.either_of,
            corequisite: self.corequisite,
        }
    }
}

/// Knowledge store location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `SQLite` catalog file. The built-in sample catalog is used when unset.
    pub path: Option<PathBuf>,
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allow cross-origin requests from any origin.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3210,
            cors_permissive: true,
        }
    }
}

/// Full configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub router: RouterConfig,
    pub safety: SafetyConfig,
    pub graph: GraphConfig,
    pub ai: AiConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_config_defaults() {
        let config = AiConfig::default();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.max_tokens, 2048);
    }

    #[test]
    fn test_ai_config_deserialize_claude() {
        let toml = r#"
            provider = "claude"
            model = "claude-sonnet-4-20250514"
            base_url = "https://api.anthropic.com"
            api_key_env = "ANTHROPIC_API_KEY"
        "#;
        let config: AiConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.provider, ProviderKind::Claude);
        assert_eq!(config.base_url, "https://api.anthropic.com");
        assert_eq!(config.max_tokens, 2048);
    }

    #[test]
    fn test_safety_defaults() {
        let config = SafetyConfig::default();
        assert_eq!(config.max_consecutive_failures, 5);
        assert!((config.failure_rate_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.min_samples, 10);
        assert_eq!(config.cooldown_secs, 60);
        assert_eq!(config.structured_budget_ms, 100);
    }

    #[test]
    fn test_graph_config_parses_rules() {
        let toml = r#"
            either_of = "exactly_one"
            corequisite = "before"
        "#;
        let config: GraphConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.either_of, EitherOfRule::ExactlyOne);
        assert_eq!(config.corequisite, CorequisiteRule::Before);
        assert_eq!(config.per_semester_cap, 3);
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: AdvisorConfig = toml::from_str("").unwrap();
        assert!((config.router.confidence_threshold - 0.7).abs() < f64::EPSILON);
        assert!(config.store.path.is_none());
        assert_eq!(config.server.port, 3210);
    }
}
