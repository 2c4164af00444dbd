//! Bootstrap Scripts
//!
//! User data for the CA host and the connector hosts, rendered from the
//! templates under `scripts/`. The templates are bundled into the binary and
//! can be replaced by a directory holding files with the same names.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::template::{without_first_line, Template, TemplateError};

pub const CA_TEMPLATE: &str = "init_aws_ca.sh";
pub const CONNECTOR_TEMPLATE: &str = "init_connector.sh";
pub const SSH_HOST_TEMPLATE: &str = "init_aws_ssh_host.sh";

/// Placeholders the connector template may use
pub const CONNECTOR_VARIABLES: [&str; 4] = ["tg_account", "access_token", "refresh_token", "host_fqdn"];

/// Placeholders the SSH host template may use
pub const SSH_HOST_VARIABLES: [&str; 2] = ["ca_url", "host_fqdn"];

/// Placeholders the CA template gets on top of the `ca_config` fields
pub const CA_COMPUTED_VARIABLES: [&str; 2] = ["ca_root_key_password", "ca_dns_name"];

/// The three bootstrap templates
#[derive(Debug, Clone)]
pub struct BootstrapTemplates {
    pub ca: Template,
    pub connector: Template,
    pub ssh_host: Template,
}

impl BootstrapTemplates {
    /// Templates compiled into the binary
    pub fn bundled() -> Result<Self, TemplateError> {
        Ok(Self {
            ca: Template::parse(CA_TEMPLATE, include_str!("../scripts/init_aws_ca.sh"))?,
            connector: Template::parse(
                CONNECTOR_TEMPLATE,
                include_str!("../scripts/init_connector.sh"),
            )?,
            ssh_host: Template::parse(
                SSH_HOST_TEMPLATE,
                include_str!("../scripts/init_aws_ssh_host.sh"),
            )?,
        })
    }

    /// Templates read from `dir`
    pub fn load(dir: &Path) -> Result<Self, TemplateError> {
        let read = |file: &str| -> Result<Template, TemplateError> {
            let path = dir.join(file);
            debug!(path = %path.display(), "Loading bootstrap template");
            let source = fs::read_to_string(&path).map_err(|source| TemplateError::Read {
                path: path.clone(),
                source,
            })?;
            Template::parse(file, &source)
        };

        Ok(Self {
            ca: read(CA_TEMPLATE)?,
            connector: read(CONNECTOR_TEMPLATE)?,
            ssh_host: read(SSH_HOST_TEMPLATE)?,
        })
    }

    /// Check every placeholder can be filled
    ///
    /// `ca_fields` are the keys of the `ca_config` object.
    pub fn validate<'a, I>(&self, ca_fields: I) -> Result<(), TemplateError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.ca
            .check(ca_fields.into_iter().chain(CA_COMPUTED_VARIABLES))?;
        self.connector.check(CONNECTOR_VARIABLES)?;
        self.ssh_host.check(SSH_HOST_VARIABLES)?;
        Ok(())
    }

    /// CA host user data
    ///
    /// `ca_fields` are exposed as-is, followed by the root key password and
    /// the CA DNS name.
    pub fn ca_user_data(
        &self,
        ca_fields: &BTreeMap<String, String>,
        root_key_password: &str,
        ca_dns_name: &str,
    ) -> Result<String, TemplateError> {
        let mut values = ca_fields.clone();
        values.insert("ca_root_key_password".to_string(), root_key_password.to_string());
        values.insert("ca_dns_name".to_string(), ca_dns_name.to_string());
        self.ca.render(&values)
    }

    /// Connector host user data: the connector script followed by the SSH
    /// host script without its shebang line
    pub fn connector_user_data(&self, vars: &ConnectorBootstrap) -> Result<String, TemplateError> {
        let connector = self.connector.render(&BTreeMap::from([
            ("tg_account".to_string(), vars.tg_account.clone()),
            ("access_token".to_string(), vars.access_token.clone()),
            ("refresh_token".to_string(), vars.refresh_token.clone()),
            ("host_fqdn".to_string(), vars.host_fqdn.clone()),
        ]))?;
        let ssh_host = self.ssh_host.render(&BTreeMap::from([
            ("ca_url".to_string(), vars.ca_url.clone()),
            ("host_fqdn".to_string(), vars.host_fqdn.clone()),
        ]))?;

        Ok(connector + &without_first_line(&ssh_host))
    }
}

/// Values threaded into a connector's user data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorBootstrap {
    pub tg_account: String,
    pub access_token: String,
    pub refresh_token: String,
    pub host_fqdn: String,
    pub ca_url: String,
}
