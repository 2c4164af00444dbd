//! Stack Configuration
//!
//! Reads a stack configuration file in the Pulumi layout:
//!
//! ```yaml
//! config:
//!   tgdemo:data:
//!     vpc_name: tgdemo-vpc
//!     # ...
//!   tgdemo:ca_config:
//!     ca_hostname: ca
//!   twingate:network: autoco
//! ```
//!
//! Keys without a namespace belong to the project. `data` and `ca_config`
//! are required; the Twingate account falls back to `TWINGATE_NETWORK`.

pub mod types;

pub use types::{CaConfig, NetworkConfig};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::bootstrap::CA_COMPUTED_VARIABLES;

/// Project namespace used when none is given
pub const DEFAULT_PROJECT: &str = "tgdemo";

/// Environment variable consulted when `twingate:network` is absent
pub const ACCOUNT_ENV: &str = "TWINGATE_NETWORK";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read stack config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stack config is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("missing required configuration key '{0}'")]
    MissingKey(String),

    #[error("configuration key '{key}' is invalid: {reason}")]
    Invalid { key: String, reason: String },

    #[error("no Twingate network configured: set 'twingate:network' or TWINGATE_NETWORK")]
    MissingAccount,
}

#[derive(Debug, Deserialize)]
struct StackFile {
    #[serde(default)]
    config: BTreeMap<String, serde_yaml::Value>,
}

/// Raw namespaced configuration values
#[derive(Debug, Clone)]
pub struct ConfigBag {
    project: String,
    values: BTreeMap<String, serde_yaml::Value>,
}

impl ConfigBag {
    pub fn from_yaml_str(project: &str, yaml: &str) -> Result<Self, ConfigError> {
        let file: StackFile = serde_yaml::from_str(yaml)?;
        Ok(Self {
            project: project.to_string(),
            values: file.config,
        })
    }

    pub fn load(path: &Path, project: &str) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), project = %project, "Reading stack config");
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(project, &yaml)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Fully qualified key; bare keys get the project namespace
    pub fn qualify(&self, key: &str) -> String {
        if key.contains(':') {
            key.to_string()
        } else {
            format!("{}:{}", self.project, key)
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.values.get(&self.qualify(key))
    }

    /// A string value, if present
    pub fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ConfigError::Invalid {
                key: self.qualify(key),
                reason: format!("expected a string, found {:?}", other),
            }),
        }
    }

    /// A required structured value
    pub fn require_object<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let qualified = self.qualify(key);
        let value = self
            .values
            .get(&qualified)
            .ok_or_else(|| ConfigError::MissingKey(qualified.clone()))?;

        serde_yaml::from_value(value.clone()).map_err(|e| ConfigError::Invalid {
            key: qualified,
            reason: e.to_string(),
        })
    }
}

/// Everything the topology needs, validated
#[derive(Debug, Clone, PartialEq)]
pub struct StackConfig {
    pub project: String,
    pub data: NetworkConfig,
    pub ca: CaConfig,
    /// Twingate network (account) name, e.g. `autoco` for autoco.twingate.com
    pub tg_account: String,
}

impl StackConfig {
    /// Load from a stack file, consulting the environment for the account
    pub fn load(path: &Path, project: &str) -> Result<Self, ConfigError> {
        let bag = ConfigBag::load(path, project)?;
        let config = Self::from_bag(&bag, std::env::var(ACCOUNT_ENV).ok())?;
        info!(
            project = %config.project,
            domain = %config.data.domain,
            connectors = config.data.connectors,
            "Stack configuration loaded"
        );
        Ok(config)
    }

    /// Build from raw values; `env_account` is the fallback account name
    pub fn from_bag(bag: &ConfigBag, env_account: Option<String>) -> Result<Self, ConfigError> {
        let data: NetworkConfig = bag.require_object("data")?;
        let ca: CaConfig = bag.require_object("ca_config")?;

        let tg_account = bag
            .get_string("twingate:network")?
            .or(env_account)
            .filter(|account| !account.trim().is_empty())
            .ok_or(ConfigError::MissingAccount)?;

        let config = Self {
            project: bag.project().to_string(),
            data,
            ca,
            tg_account,
        };
        config.validate()?;
        Ok(config)
    }

    /// `{ca_hostname}.{domain}`
    pub fn ca_domain(&self) -> String {
        self.ca.domain(&self.data.domain)
    }

    /// HTTPS endpoint of the CA
    pub fn ca_url(&self) -> String {
        format!("https://{}", self.ca_domain())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, reason: String| ConfigError::Invalid {
            key: format!("{}:{}", self.project, key),
            reason,
        };
        let data = &self.data;

        for (name, subnet) in [("prv_cidr", &data.prv_cidr), ("pub_cidr", &data.pub_cidr)] {
            if !data.vpc_cidr.contains_cidr(subnet) {
                return Err(invalid(
                    "data",
                    format!("{name} {subnet} is outside vpc_cidr {}", data.vpc_cidr),
                ));
            }
        }
        if data.prv_cidr.contains_cidr(&data.pub_cidr) || data.pub_cidr.contains_cidr(&data.prv_cidr) {
            return Err(invalid(
                "data",
                format!("prv_cidr {} overlaps pub_cidr {}", data.prv_cidr, data.pub_cidr),
            ));
        }
        if data.domain.trim().is_empty() || data.domain.ends_with('.') {
            return Err(invalid(
                "data",
                format!("domain '{}' must be non-empty without a trailing dot", data.domain),
            ));
        }
        if self.ca.ca_hostname.trim().is_empty() {
            return Err(invalid("ca_config", "ca_hostname is empty".to_string()));
        }
        if let Some(key) = CA_COMPUTED_VARIABLES
            .iter()
            .find(|key| self.ca.settings.contains_key(**key))
        {
            return Err(invalid(
                "ca_config",
                format!("{key} is computed for the CA template and cannot be set"),
            ));
        }
        if let Some(ip) = self.ca.ca_private_ip {
            if !data.prv_cidr.contains(ip) {
                return Err(invalid(
                    "ca_config",
                    format!("ca_private_ip {ip} is outside prv_cidr {}", data.prv_cidr),
                ));
            }
            if data.prv_cidr.is_reserved(ip) {
                return Err(invalid(
                    "ca_config",
                    format!("ca_private_ip {ip} is reserved in prv_cidr {}", data.prv_cidr),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub(crate) const STACK_YAML: &str = r#"
config:
  aws:region: us-east-1
  twingate:network: autoco
  tgdemo:data:
    vpc_name: tgdemo-vpc
    vpc_cidr: 10.0.0.0/16
    prv_subnet_name: tgdemo-private
    prv_cidr: 10.0.1.0/24
    pub_subnet_name: tgdemo-public
    pub_cidr: 10.0.2.0/24
    eip_name: tgdemo-eip
    igw_name: tgdemo-igw
    natgw_name: tgdemo-natgw
    pubrttable_name: tgdemo-public-rt
    prvrttable_name: tgdemo-private-rt
    pubrtasst_name: tgdemo-public-rta
    prvrtasst_name: tgdemo-private-rta
    sec_grp_name: tgdemo-sg
    key_name: tgdemo-key
    ec2_type: t3a.micro
    connectors: 2
    domain: example.com
    tg_remote_network: tgdemo-network
  tgdemo:ca_config:
    ca_hostname: ca
    ca_name: tgdemo
    ca_provisioner: admin@example.com
    ca_aws_account: "123456789012"
    ca_host_cert_duration: 720h
"#;

    pub(crate) fn sample_config() -> StackConfig {
        let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, STACK_YAML).unwrap();
        StackConfig::from_bag(&bag, None).unwrap()
    }

    #[test]
    fn test_parse_sample_stack() {
        let config = sample_config();
        assert_eq!(config.tg_account, "autoco");
        assert_eq!(config.data.connectors, 2);
        assert!(config.data.ssh_enabled);
        assert_eq!(config.data.ca_sec_grp_name, types::DEFAULT_CA_SECURITY_GROUP);
        assert_eq!(config.ca_domain(), "ca.example.com");
        assert_eq!(config.ca_url(), "https://ca.example.com");
    }

    #[test]
    fn test_missing_required_object() {
        let yaml = "config:\n  twingate:network: autoco\n";
        let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, yaml).unwrap();
        let err = StackConfig::from_bag(&bag, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(ref key) if key == "tgdemo:data"));
    }

    #[test]
    fn test_project_namespace_is_respected() {
        let bag = ConfigBag::from_yaml_str("other", STACK_YAML).unwrap();
        assert!(matches!(
            StackConfig::from_bag(&bag, None),
            Err(ConfigError::MissingKey(ref key)) if key == "other:data"
        ));
    }

    #[test]
    fn test_account_falls_back_to_environment_value() {
        let yaml = STACK_YAML.replace("  twingate:network: autoco\n", "");
        let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, &yaml).unwrap();

        let config = StackConfig::from_bag(&bag, Some("fallbackco".to_string())).unwrap();
        assert_eq!(config.tg_account, "fallbackco");

        assert!(matches!(
            StackConfig::from_bag(&bag, None),
            Err(ConfigError::MissingAccount)
        ));
        assert!(matches!(
            StackConfig::from_bag(&bag, Some("  ".to_string())),
            Err(ConfigError::MissingAccount)
        ));
    }

    #[test]
    fn test_config_value_wins_over_environment() {
        let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, STACK_YAML).unwrap();
        let config = StackConfig::from_bag(&bag, Some("fallbackco".to_string())).unwrap();
        assert_eq!(config.tg_account, "autoco");
    }

    #[test]
    fn test_invalid_cidr_rejected() {
        let yaml = STACK_YAML.replace("vpc_cidr: 10.0.0.0/16", "vpc_cidr: 10.0.0.0/99");
        let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, &yaml).unwrap();
        assert!(matches!(
            StackConfig::from_bag(&bag, None),
            Err(ConfigError::Invalid { ref key, .. }) if key == "tgdemo:data"
        ));
    }

    #[test]
    fn test_subnet_outside_vpc_rejected() {
        let yaml = STACK_YAML.replace("pub_cidr: 10.0.2.0/24", "pub_cidr: 192.168.0.0/24");
        let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, &yaml).unwrap();
        let err = StackConfig::from_bag(&bag, None).unwrap_err();
        assert!(err.to_string().contains("outside vpc_cidr"));
    }

    #[test]
    fn test_ca_private_ip_must_be_in_private_subnet() {
        let inside = STACK_YAML.replace("ca_hostname: ca\n", "ca_hostname: ca\n    ca_private_ip: 10.0.1.104\n");
        let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, &inside).unwrap();
        assert!(StackConfig::from_bag(&bag, None).is_ok());

        let outside = STACK_YAML.replace("ca_hostname: ca\n", "ca_hostname: ca\n    ca_private_ip: 10.0.2.104\n");
        let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, &outside).unwrap();
        let err = StackConfig::from_bag(&bag, None).unwrap_err();
        assert!(err.to_string().contains("outside prv_cidr"));
    }

    #[test]
    fn test_ca_private_ip_must_not_be_reserved() {
        for reserved in ["10.0.1.0", "10.0.1.3", "10.0.1.255"] {
            let yaml = STACK_YAML.replace(
                "ca_hostname: ca\n",
                &format!("ca_hostname: ca\n    ca_private_ip: {reserved}\n"),
            );
            let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, &yaml).unwrap();
            let err = StackConfig::from_bag(&bag, None).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { ref key, .. } if key == "tgdemo:ca_config"),
                "{reserved}"
            );
            assert!(err.to_string().contains("reserved"), "{reserved}");
        }

        let first_usable = STACK_YAML.replace("ca_hostname: ca\n", "ca_hostname: ca\n    ca_private_ip: 10.0.1.4\n");
        let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, &first_usable).unwrap();
        assert!(StackConfig::from_bag(&bag, None).is_ok());
    }

    #[test]
    fn test_computed_ca_keys_cannot_be_configured() {
        for key in CA_COMPUTED_VARIABLES {
            let yaml = STACK_YAML.replace(
                "ca_hostname: ca\n",
                &format!("ca_hostname: ca\n    {key}: from-config\n"),
            );
            let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, &yaml).unwrap();
            let err = StackConfig::from_bag(&bag, None).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { ref key, .. } if key == "tgdemo:ca_config"),
                "{key}"
            );
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn test_ssh_toggle_and_zero_connectors() {
        let yaml = STACK_YAML
            .replace("connectors: 2\n", "connectors: 0\n    ssh_enabled: false\n");
        let bag = ConfigBag::from_yaml_str(DEFAULT_PROJECT, &yaml).unwrap();
        let config = StackConfig::from_bag(&bag, None).unwrap();
        assert_eq!(config.data.connectors, 0);
        assert!(!config.data.ssh_enabled);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(STACK_YAML.as_bytes()).unwrap();

        let bag = ConfigBag::load(file.path(), DEFAULT_PROJECT).unwrap();
        assert_eq!(bag.get_string("aws:region").unwrap().as_deref(), Some("us-east-1"));

        let missing = ConfigBag::load(Path::new("/nonexistent/Pulumi.dev.yaml"), DEFAULT_PROJECT);
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
