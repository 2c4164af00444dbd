//! Configuration objects
//!
//! `data` describes the network topology, `ca_config` the certificate
//! authority. Field names match the keys of the stack configuration file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::cidr::Ipv4Cidr;

/// Default name of the CA security group
pub const DEFAULT_CA_SECURITY_GROUP: &str = "ca-security-group";

fn default_ca_security_group() -> String {
    DEFAULT_CA_SECURITY_GROUP.to_string()
}

fn default_true() -> bool {
    true
}

/// The `data` object: network topology and fleet size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub vpc_name: String,
    pub vpc_cidr: Ipv4Cidr,

    pub prv_subnet_name: String,
    pub prv_cidr: Ipv4Cidr,
    pub pub_subnet_name: String,
    pub pub_cidr: Ipv4Cidr,

    pub eip_name: String,
    pub igw_name: String,
    pub natgw_name: String,

    pub pubrttable_name: String,
    pub prvrttable_name: String,
    pub pubrtasst_name: String,
    pub prvrtasst_name: String,

    pub sec_grp_name: String,
    #[serde(default = "default_ca_security_group")]
    pub ca_sec_grp_name: String,

    /// Existing key pair installed on every instance
    pub key_name: String,
    /// EC2 instance type for the CA and the connectors
    pub ec2_type: String,

    /// Number of connector hosts
    #[serde(default)]
    pub connectors: u32,

    /// Private DNS zone, e.g. `example.com`
    pub domain: String,

    pub tg_remote_network: String,

    /// Open TCP/22 on the connector security group
    #[serde(default = "default_true")]
    pub ssh_enabled: bool,
}

/// The `ca_config` object
///
/// Every field, known or not, is available to the CA bootstrap template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaConfig {
    pub ca_hostname: String,

    /// Fixed private address for the CA host; assigned by the provider when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_private_ip: Option<Ipv4Addr>,

    #[serde(flatten)]
    pub settings: BTreeMap<String, serde_yaml::Value>,
}

impl CaConfig {
    /// `{ca_hostname}.{domain}`
    pub fn domain(&self, domain: &str) -> String {
        format!("{}.{}", self.ca_hostname, domain)
    }

    /// All fields rendered as template values
    pub fn template_fields(&self) -> BTreeMap<String, String> {
        let mut fields: BTreeMap<String, String> = self
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), template_value(v)))
            .collect();
        fields.insert("ca_hostname".to_string(), self.ca_hostname.clone());
        if let Some(ip) = self.ca_private_ip {
            fields.insert("ca_private_ip".to_string(), ip.to_string());
        }
        fields
    }
}

fn template_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
