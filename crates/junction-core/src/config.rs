//! Configuration types for targets and chains.
//!
//! Loading (files, CLI) is the caller's concern; these are the serde types
//! a loader deserializes into. Defaults follow typical deployments.

use serde::{Deserialize, Serialize};

/// One logical backend a chain can route to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Unique target name, referenced by chain configs.
    pub name: String,

    /// Hostname or address of the backend.
    #[serde(default = "default_address")]
    pub address: String,

    /// Port of the backend.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// One routing chain: an ordered stack of filters ending in a router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Router module name, as registered.
    pub router: String,

    /// Filter module names, head of chain first.
    #[serde(default)]
    pub filters: Vec<String>,

    /// Target the router binds to.
    pub target: String,

    /// Whether to run the query classifier on inbound buffers.
    #[serde(default = "default_classify")]
    pub classify_queries: bool,
}

/// Per-session limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum queries queued per endpoint before routing fails.
    #[serde(default = "default_max_pending")]
    pub max_pending_queries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_pending_queries: default_max_pending(),
        }
    }
}

fn default_address() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_classify() -> bool {
    true
}

fn default_max_pending() -> u32 {
    128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_config_defaults() {
        let config: TargetConfig = serde_yaml::from_str("name: db1").unwrap();
        assert_eq!(config.name, "db1");
        assert_eq!(config.address, "localhost");
        assert_eq!(config.port, 3306);
    }

    #[test]
    fn test_chain_config_defaults() {
        let yaml = "router: rw-split\ntarget: db1";
        let config: ChainConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.filters.is_empty());
        assert!(config.classify_queries);
    }

    #[test]
    fn test_chain_config_round_trip() {
        let config = ChainConfig {
            router: "rw-split".into(),
            filters: vec!["tee".into(), "mask".into()],
            target: "db1".into(),
            classify_queries: false,
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: ChainConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.filters, config.filters);
        assert!(!back.classify_queries);
    }

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.max_pending_queries, 128);
    }
}
