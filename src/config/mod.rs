//! Configuration loading and management

use crate::core::serialize::{DEFAULT_MAX_DEPTH, GroupSet, OperationGroups};
use crate::server::routes::Routes;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Environment variable naming the YAML configuration file
pub const CONFIG_ENV: &str = "CRUD_CONFIG";

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Maximum nesting of expanded relations when rendering
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_depth: default_max_depth(),
        }
    }
}

/// Exposure of one entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Entity kind, as declared by its descriptor (e.g. "pet")
    pub kind: String,

    /// Mount prefix (e.g. "/pets")
    pub prefix: String,

    /// Exposed operations, all when omitted
    #[serde(default)]
    pub routes: Routes,

    /// Serialization groups per operation
    #[serde(default)]
    pub groups: OperationGroups,
}

impl EntityConfig {
    pub fn new(kind: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            prefix: prefix.into(),
            routes: Routes::ALL,
            groups: OperationGroups::default(),
        }
    }

    pub fn with_routes(mut self, routes: Routes) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_groups(mut self, groups: OperationGroups) -> Self {
        self.groups = groups;
        self
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrudConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Entity kinds to expose
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

impl CrudConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load from the file named by `CRUD_CONFIG`, or fall back to the demo configuration
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_yaml_file(&path),
            Err(_) => Ok(Self::default_config()),
        }
    }

    pub fn entity(&self, kind: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.kind == kind)
    }

    /// Configuration exposing the demo schema
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            entities: vec![
                EntityConfig::new("pet", "/pets")
                    .with_groups(OperationGroups::uniform(GroupSet::new(["pet"]))),
                EntityConfig::new("user", "/users").with_groups(
                    OperationGroups::uniform(GroupSet::new(["user"]))
                        .with_read(GroupSet::new(["user", "user:pets"])),
                ),
                EntityConfig::new("group", "/groups")
                    .with_groups(OperationGroups::uniform(GroupSet::new(["group"]))),
            ],
        }
    }
}
