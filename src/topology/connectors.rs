//! Connector fleet
//!
//! Each connector gets a name from Twingate, so everything derived from that
//! name (host name, tags, DNS record, resource) is deferred until the
//! connector exists.

use std::sync::Arc;

use crate::bootstrap::{BootstrapTemplates, ConnectorBootstrap};
use crate::config::StackConfig;
use crate::graph::GraphError;
use crate::output::Output;
use crate::resource::{text, value, ResourceKind, ResourceRef};
use crate::stack::Stack;
use crate::topology::compute::Host;
use crate::topology::dns::declare_a_record;
use crate::topology::twingate::declare_resource;
use crate::topology::Site;

/// One connector and everything declared for it
#[derive(Debug, Clone)]
pub struct ConnectorHost {
    pub index: u32,
    pub connector: ResourceRef,
    pub tokens: ResourceRef,
    pub instance: ResourceRef,
    pub record: ResourceRef,
    pub resource: ResourceRef,
    /// Name assigned by Twingate
    pub name: Output<String>,
}

pub fn host_name(connector_name: &str) -> String {
    format!("tg-{connector_name}")
}

pub fn host_fqdn(connector_name: &str, domain: &str) -> String {
    format!("{}.{}", host_name(connector_name), domain)
}

/// Declare connectors `1..=connectors`
pub fn declare_fleet(
    stack: &mut Stack,
    config: &StackConfig,
    templates: &Arc<BootstrapTemplates>,
    site: &Site,
) -> Result<Vec<ConnectorHost>, GraphError> {
    let mut fleet = Vec::with_capacity(config.data.connectors as usize);
    for index in 1..=config.data.connectors {
        fleet.push(declare_connector(stack, config, templates, site, index)?);
    }
    Ok(fleet)
}

pub fn declare_connector(
    stack: &mut Stack,
    config: &StackConfig,
    templates: &Arc<BootstrapTemplates>,
    site: &Site,
    index: u32,
) -> Result<ConnectorHost, GraphError> {
    let connector = stack.declare(
        ResourceKind::Connector,
        &format!("twingate_connector_{index}"),
        [
            // empty lets Twingate pick the name
            ("name", value("")),
            ("remote_network_id", site.remote_network.id()),
        ],
    )?;
    let tokens = stack.declare(
        ResourceKind::ConnectorTokens,
        &format!("connector_token_{index}"),
        [("connector_id", connector.id())],
    )?;

    let name = connector.string("name");
    let fqdn = {
        let domain = config.data.domain.clone();
        name.apply(move |name| host_fqdn(&name, &domain))
    };

    let user_data = {
        let templates = Arc::clone(templates);
        let tg_account = config.tg_account.clone();
        let ca_url = config.ca_url();
        tokens
            .string("access_token")
            .zip(&tokens.string("refresh_token"))
            .zip(&fqdn)
            .try_apply(move |((access_token, refresh_token), host_fqdn)| {
                templates.connector_user_data(&ConnectorBootstrap {
                    tg_account,
                    access_token,
                    refresh_token,
                    host_fqdn,
                    ca_url,
                })
            })
    };

    let instance_name = format!("Twingate-Connector-{index}");
    let instance = Host::new(&instance_name, &site.network.security_group, text(&user_data))
        .tag(text(&name.apply(|name| host_name(&name))))
        .declare(stack, &config.data, &site.network, &site.lookups)?;

    let record = declare_a_record(
        stack,
        &format!("connector_a_record-{index}"),
        &site.zone,
        text(&fqdn),
        instance.output("private_ip"),
    )?;

    let resource = declare_resource(
        stack,
        &format!("connector_tg_resource-{index}"),
        &site.remote_network,
        text(&name.apply(|name| format!("Twingate Connector {name}"))),
        text(&fqdn),
    )?;

    Ok(ConnectorHost {
        index,
        connector,
        tokens,
        instance,
        record,
        resource,
        name,
    })
}
