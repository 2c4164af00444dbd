//! Certificate authority host
//!
//! The smallstep CA runs on a private instance. Its bootstrap script needs the
//! generated root key password, so the script stays a deferred secret until
//! the password exists.

use std::sync::Arc;

use crate::bootstrap::BootstrapTemplates;
use crate::config::StackConfig;
use crate::graph::GraphError;
use crate::resource::{text, value, ResourceKind, ResourceRef};
use crate::secret::PasswordPolicy;
use crate::stack::Stack;
use crate::topology::compute::Host;
use crate::topology::dns::declare_a_record;
use crate::topology::twingate::declare_resource;
use crate::topology::Site;

pub const PASSWORD_NAME: &str = "ca_root_key_password";
/// Stack output holding the root key password
pub const PASSWORD_EXPORT: &str = "ca_root_key_password";

pub const CA_INSTANCE: &str = "smallstep-ca";
pub const CA_RECORD: &str = "ca_a_record";
pub const CA_RESOURCE: &str = "ca_tg_resource";
pub const CA_RESOURCE_NAME: &str = "Certificate Authority";

#[derive(Debug, Clone)]
pub struct CaHost {
    /// `{ca_hostname}.{domain}`
    pub domain: String,
    pub instance: ResourceRef,
    pub record: ResourceRef,
    pub resource: ResourceRef,
}

pub fn declare_root_key_password(stack: &mut Stack) -> Result<ResourceRef, GraphError> {
    let policy = PasswordPolicy::root_key();
    stack.declare(
        ResourceKind::RandomPassword,
        PASSWORD_NAME,
        [
            ("length", value(policy.length)),
            ("special", value(policy.special)),
        ],
    )
}

pub fn declare_ca(
    stack: &mut Stack,
    config: &StackConfig,
    templates: &Arc<BootstrapTemplates>,
    site: &Site,
    password: &ResourceRef,
) -> Result<CaHost, GraphError> {
    let domain = config.ca_domain();

    let script = {
        let templates = Arc::clone(templates);
        let fields = config.ca.template_fields();
        let domain = domain.clone();
        password
            .string("result")
            .try_apply(move |password| templates.ca_user_data(&fields, &password, &domain))
    };

    let instance = Host::new(CA_INSTANCE, &site.network.ca_security_group, text(&script))
        .private_ip(config.ca.ca_private_ip)
        .declare(stack, &config.data, &site.network, &site.lookups)?;

    let record = declare_a_record(
        stack,
        CA_RECORD,
        &site.zone,
        value(domain.as_str()),
        instance.output("private_ip"),
    )?;

    let resource = declare_resource(
        stack,
        CA_RESOURCE,
        &site.remote_network,
        value(CA_RESOURCE_NAME),
        value(domain.as_str()),
    )?;

    Ok(CaHost {
        domain,
        instance,
        record,
        resource,
    })
}
