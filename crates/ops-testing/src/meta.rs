//! Charm metadata and config schema.
//!
//! Only the parts the harness needs are modelled: the declared relation
//! endpoints with their interface names, and the default value of each
//! config option. Everything else in the YAML is ignored.

use std::collections::BTreeMap;

use serde::Deserialize;

use ops_framework::ConfigData;

/// Errors that can occur when parsing metadata or config YAML.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// Failed to parse YAML content.
    #[error("failed to parse charm YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for MetaError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Which metadata section declared an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationRole {
    /// Declared under `requires`.
    Requires,
    /// Declared under `provides`.
    Provides,
    /// Declared under `peers`.
    Peer,
}

/// One declared relation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationMeta {
    /// Interface name, e.g. `pgsql`.
    pub interface: String,
}

/// Contents of `metadata.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CharmMeta {
    /// Application name.
    pub name: String,

    /// Endpoints this charm consumes.
    #[serde(default)]
    pub requires: BTreeMap<String, RelationMeta>,

    /// Endpoints this charm offers.
    #[serde(default)]
    pub provides: BTreeMap<String, RelationMeta>,

    /// Peer endpoints.
    #[serde(default)]
    pub peers: BTreeMap<String, RelationMeta>,
}

impl CharmMeta {
    /// Parse metadata from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, MetaError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Every declared endpoint with its role and interface.
    pub fn endpoints(&self) -> impl Iterator<Item = (&str, RelationRole, &str)> {
        section(&self.requires, RelationRole::Requires)
            .chain(section(&self.provides, RelationRole::Provides))
            .chain(section(&self.peers, RelationRole::Peer))
    }

    /// Interface of a declared endpoint.
    pub fn interface(&self, endpoint: &str) -> Option<&str> {
        self.endpoints()
            .find(|(name, _, _)| *name == endpoint)
            .map(|(_, _, interface)| interface)
    }
}

fn section(
    map: &BTreeMap<String, RelationMeta>,
    role: RelationRole,
) -> impl Iterator<Item = (&str, RelationRole, &str)> {
    map.iter()
        .map(move |(name, rel)| (name.as_str(), role, rel.interface.as_str()))
}

/// One option in `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigOption {
    /// Declared type (`string`, `int`, `boolean`, ...).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Default value, if any.
    #[serde(default)]
    pub default: Option<serde_json::Value>,

    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Contents of `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigSchema {
    /// Options keyed by name.
    #[serde(default)]
    pub options: BTreeMap<String, ConfigOption>,
}

impl ConfigSchema {
    /// Parse a config schema from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, MetaError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Initial configuration: every option that declares a default.
    pub fn defaults(&self) -> ConfigData {
        self.options
            .iter()
            .filter_map(|(key, option)| option.default.clone().map(|value| (key.clone(), value)))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    const METADATA: &str = "
name: my-charm
requires:
  db:
    interface: pgsql
provides:
  website:
    interface: http
peers:
  cluster:
    interface: my-cluster
";

    #[test]
    fn parses_all_endpoint_sections() {
        let meta = CharmMeta::from_yaml(METADATA).unwrap();
        assert_eq!(meta.name, "my-charm");
        assert_eq!(meta.interface("db"), Some("pgsql"));
        assert_eq!(meta.interface("website"), Some("http"));
        assert_eq!(meta.interface("cluster"), Some("my-cluster"));
        assert_eq!(meta.interface("nope"), None);

        let roles: Vec<(&str, RelationRole)> =
            meta.endpoints().map(|(name, role, _)| (name, role)).collect();
        assert_eq!(
            roles,
            vec![
                ("db", RelationRole::Requires),
                ("website", RelationRole::Provides),
                ("cluster", RelationRole::Peer),
            ]
        );
    }

    #[test]
    fn sections_are_optional() {
        let meta = CharmMeta::from_yaml("name: bare\n").unwrap();
        assert_eq!(meta.endpoints().count(), 0);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            CharmMeta::from_yaml("requires: [unterminated"),
            Err(MetaError::Yaml { .. })
        ));
    }

    #[test]
    fn config_defaults_skip_options_without_one() {
        let schema = ConfigSchema::from_yaml(
            "
options:
  port:
    type: int
    default: 8080
    description: Listen port
  name:
    type: string
  debug:
    type: boolean
    default: false
",
        )
        .unwrap();
        assert_eq!(schema.options["port"].kind.as_deref(), Some("int"));
        let defaults = schema.defaults();
        assert_eq!(defaults.get("port"), Some(&json!(8080)));
        assert_eq!(defaults.get("debug"), Some(&json!(false)));
        assert!(!defaults.contains_key("name"));
    }
}
