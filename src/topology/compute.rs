//! Lookups and compute instances

use std::net::Ipv4Addr;

use crate::config::NetworkConfig;
use crate::graph::GraphError;
use crate::resource::{list, object, value, Input, ResourceKind, ResourceRef};
use crate::stack::Stack;
use crate::topology::network::Network;

/// Account publishing the connector images
pub const AMI_OWNER: &str = "617935088040";
pub const AMI_NAME_FILTER: &str = "twingate/images/hvm-ssd/twingate-amd64-*";

/// Existing infrastructure read by the topology
#[derive(Debug, Clone)]
pub struct Lookups {
    pub key_pair: ResourceRef,
    pub ami: ResourceRef,
}

pub fn declare_lookups(stack: &mut Stack, data: &NetworkConfig) -> Result<Lookups, GraphError> {
    let key_pair = stack.declare(
        ResourceKind::KeyPairLookup,
        &data.key_name,
        [
            ("key_name", value(data.key_name.as_str())),
            ("include_public_key", value(true)),
        ],
    )?;

    let ami = stack.declare(
        ResourceKind::AmiLookup,
        "twingate-connector-ami",
        [
            ("most_recent", value(true)),
            ("owners", list([value(AMI_OWNER)])),
            (
                "filters",
                list([object([
                    ("name", value("name")),
                    ("values", list([value(AMI_NAME_FILTER)])),
                ])]),
            ),
        ],
    )?;

    Ok(Lookups { key_pair, ami })
}

/// A host in the private subnet
pub struct Host<'a> {
    name: &'a str,
    tag: Input,
    security_group: &'a ResourceRef,
    user_data: Input,
    private_ip: Option<Ipv4Addr>,
}

impl<'a> Host<'a> {
    pub fn new(name: &'a str, security_group: &'a ResourceRef, user_data: Input) -> Self {
        Self {
            name,
            tag: value(name),
            security_group,
            user_data,
            private_ip: None,
        }
    }

    /// `Name` tag; defaults to the declaration name
    pub fn tag(mut self, tag: Input) -> Self {
        self.tag = tag;
        self
    }

    pub fn private_ip(mut self, address: Option<Ipv4Addr>) -> Self {
        self.private_ip = address;
        self
    }

    pub fn declare(
        self,
        stack: &mut Stack,
        data: &NetworkConfig,
        network: &Network,
        lookups: &Lookups,
    ) -> Result<ResourceRef, GraphError> {
        let mut inputs = vec![
            ("tags", object([("Name", self.tag)])),
            ("instance_type", value(data.ec2_type.as_str())),
            ("vpc_security_group_ids", list([self.security_group.id()])),
            ("ami", lookups.ami.id()),
            ("key_name", lookups.key_pair.output("key_name")),
            ("user_data", self.user_data),
            ("subnet_id", network.private_subnet.id()),
            ("associate_public_ip_address", value(false)),
        ];
        if let Some(address) = self.private_ip {
            inputs.push(("private_ip", value(address.to_string())));
        }
        stack.declare(ResourceKind::Instance, self.name, inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::topology::network::declare_network;
    use serde_json::json;

    #[test]
    fn test_host_inputs() {
        let config = sample_config();
        let mut stack = Stack::new("tgdemo", "dev");
        let network = declare_network(&mut stack, &config.data).unwrap();
        let lookups = declare_lookups(&mut stack, &config.data).unwrap();

        let host = Host::new("smallstep-ca", &network.ca_security_group, value("#!/bin/bash"))
            .private_ip(Some(Ipv4Addr::new(10, 0, 1, 104)))
            .declare(&mut stack, &config.data, &network, &lookups)
            .unwrap();

        let declared = stack.get(host.urn()).unwrap();
        let known = |key: &str| declared.input(key).unwrap().try_get();
        assert_eq!(known("tags"), Some(Ok(json!({"Name": "smallstep-ca"}))));
        assert_eq!(known("private_ip"), Some(Ok(json!("10.0.1.104"))));
        assert_eq!(known("associate_public_ip_address"), Some(Ok(json!(false))));
        assert_eq!(known("instance_type"), Some(Ok(json!("t3a.micro"))));

        let refs = declared.references();
        assert!(refs.contains(network.ca_security_group.urn()));
        assert!(refs.contains(network.private_subnet.urn()));
        assert!(refs.contains(lookups.ami.urn()));
        assert!(refs.contains(lookups.key_pair.urn()));
        assert!(!refs.contains(network.security_group.urn()));
    }

    #[test]
    fn test_private_ip_omitted_when_unset() {
        let config = sample_config();
        let mut stack = Stack::new("tgdemo", "dev");
        let network = declare_network(&mut stack, &config.data).unwrap();
        let lookups = declare_lookups(&mut stack, &config.data).unwrap();

        let host = Host::new("Twingate-Connector-1", &network.security_group, value(""))
            .declare(&mut stack, &config.data, &network, &lookups)
            .unwrap();
        assert!(stack.get(host.urn()).unwrap().input("private_ip").is_none());
        assert!(lookups.ami.kind().is_lookup());
    }
}
