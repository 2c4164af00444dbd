//! Topology
//!
//! Declares the whole demo environment into a [`Stack`]:
//!
//! - the root key password, exported as a secret
//! - VPC, subnets, gateways, route tables, security groups
//! - the private DNS zone, key pair and AMI lookups, Twingate remote network
//! - the smallstep CA host with its DNS record and Twingate resource
//! - `connectors` Twingate connector hosts, each with its own record and resource

pub mod ca;
pub mod compute;
pub mod connectors;
pub mod dns;
pub mod network;
pub mod twingate;

use std::sync::Arc;
use tracing::info;

use crate::bootstrap::BootstrapTemplates;
use crate::config::StackConfig;
use crate::error::Result;
use crate::graph::GraphError;
use crate::resource::ResourceRef;
use crate::stack::Stack;

pub use ca::CaHost;
pub use compute::Lookups;
pub use connectors::ConnectorHost;
pub use network::Network;

/// Shared infrastructure the hosts are placed in
#[derive(Debug, Clone)]
pub struct Site {
    pub network: Network,
    pub zone: ResourceRef,
    pub lookups: Lookups,
    pub remote_network: ResourceRef,
}

/// Handles to everything declared
#[derive(Debug, Clone)]
pub struct Topology {
    pub password: ResourceRef,
    pub site: Site,
    pub ca: CaHost,
    pub connectors: Vec<ConnectorHost>,
}

/// Validate the templates, then declare the topology into a new stack
pub fn build_stack(
    config: &StackConfig,
    templates: Arc<BootstrapTemplates>,
    stack_name: &str,
) -> Result<(Stack, Topology)> {
    let fields = config.ca.template_fields();
    templates.validate(fields.keys().map(String::as_str))?;

    let mut stack = Stack::new(&config.project, stack_name);
    let topology = declare_topology(&mut stack, config, &templates)?;

    info!(
        project = %config.project,
        stack = %stack_name,
        declarations = stack.len(),
        connectors = topology.connectors.len(),
        "📋 Topology declared"
    );
    Ok((stack, topology))
}

pub fn declare_topology(
    stack: &mut Stack,
    config: &StackConfig,
    templates: &Arc<BootstrapTemplates>,
) -> Result<Topology, GraphError> {
    let password = ca::declare_root_key_password(stack)?;
    stack.export(ca::PASSWORD_EXPORT, password.output("result").mark_secret());

    let network = network::declare_network(stack, &config.data)?;
    let zone = dns::declare_zone(stack, &config.data.domain, &network.vpc)?;
    let lookups = compute::declare_lookups(stack, &config.data)?;
    let remote_network = twingate::declare_remote_network(stack, &config.data.tg_remote_network)?;

    let site = Site {
        network,
        zone,
        lookups,
        remote_network,
    };

    let ca = ca::declare_ca(stack, config, templates, &site, &password)?;
    let connectors = connectors::declare_fleet(stack, config, templates, &site)?;

    Ok(Topology {
        password,
        site,
        ca,
        connectors,
    })
}
