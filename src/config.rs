use crate::k8s::client::ClientConfig;
use crate::k8s::labels::MatchLabels;
use crate::k8s::mapping::ResourceMapping;
use crate::logging::LoggingConfig;
use kube::core::GroupVersionKind;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Page size used when the config does not set one. Same as `kubectl --chunk-size`.
pub const DEFAULT_CHUNK_SIZE: i64 = 500;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error loading config: `{0}`")]
    IOError(#[from] std::io::Error),

    #[error("error loading config: `{0}`")]
    SerdeYamlError(#[from] serde_yaml::Error),
}

/// Describes which collection to traverse and how to reach the API server.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct SelectorConfig {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub label_selector: String,
    /// Labels appended to `label_selector` as equality terms.
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub export: bool,
    #[serde(default)]
    pub include_uninitialized: bool,
    /// Items per page, `0` disables chunking.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,
    pub resource: ResourceConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub log: LoggingConfig,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ResourceConfig {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    #[serde(default = "default_namespaced")]
    pub namespaced: bool,
}

fn default_chunk_size() -> i64 {
    DEFAULT_CHUNK_SIZE
}

fn default_namespaced() -> bool {
    true
}

impl SelectorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Label selector including the `match_labels` terms.
    pub fn effective_label_selector(&self) -> String {
        MatchLabels::new(self.match_labels.clone()).merge_into(&self.label_selector)
    }
}

impl ResourceConfig {
    pub fn mapping(&self) -> ResourceMapping {
        ResourceMapping::new(
            GroupVersionKind::gvk(&self.group, &self.version, &self.kind),
            &self.plural,
            self.namespaced,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
namespace: default
label_selector: tier!=db
match_labels:
  app: web
export: true
include_uninitialized: true
chunk_size: 50
resource:
  group: apps
  version: v1
  kind: Deployment
  plural: deployments
client:
  client_timeout: 10s
log:
  level: debug
"#;

    #[test]
    fn load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{FULL_CONFIG}").unwrap();

        let config = SelectorConfig::load(file.path()).unwrap();

        assert_eq!(config.namespace, "default");
        assert_eq!(config.effective_label_selector(), "tier!=db,app==web");
        assert!(config.export);
        assert!(config.include_uninitialized);
        assert_eq!(config.chunk_size, 50);
        assert_eq!(
            Duration::from(config.client.client_timeout),
            Duration::from_secs(10)
        );

        let mapping = config.resource.mapping();
        assert_eq!(mapping.group_version(), "apps/v1");
        assert_eq!(mapping.gvk.kind, "Deployment");
        assert_eq!(mapping.resource, "deployments");
        assert!(mapping.namespaced);
    }

    #[test]
    fn minimal_config_defaults() {
        let config: SelectorConfig = serde_yaml::from_str(
            r#"
resource:
  version: v1
  kind: Node
  plural: nodes
  namespaced: false
"#,
        )
        .unwrap();

        assert_eq!(config.namespace, "");
        assert_eq!(config.effective_label_selector(), "");
        assert!(!config.export);
        assert!(!config.include_uninitialized);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.client, ClientConfig::default());
        assert_eq!(config.log, LoggingConfig::default());
        assert_eq!(config.resource.mapping().group_version(), "v1");
        assert!(!config.resource.mapping().namespaced);
    }

    #[test]
    fn missing_resource_fails() {
        assert!(serde_yaml::from_str::<SelectorConfig>("namespace: default").is_err());
    }

    #[test]
    fn missing_file_fails() {
        assert_matches!(
            SelectorConfig::load(Path::new("/non/existent/selector.yaml")),
            Err(ConfigError::IOError(_))
        );
    }
}
