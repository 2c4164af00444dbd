//! Resource kinds and their type tokens

use serde::{Deserialize, Serialize};

/// Every kind of declaration the topology uses
///
/// Type tokens follow the `package:module/member:Type` convention of the
/// providers they stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    RandomPassword,
    Vpc,
    Subnet,
    Eip,
    InternetGateway,
    NatGateway,
    RouteTable,
    RouteTableAssociation,
    SecurityGroup,
    Instance,
    /// Read-only lookup of an existing key pair
    KeyPairLookup,
    /// Read-only lookup of the most recent matching AMI
    AmiLookup,
    HostedZone,
    DnsRecord,
    RemoteNetwork,
    Connector,
    ConnectorTokens,
    ZeroTrustResource,
}

impl ResourceKind {
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::RandomPassword => "random:index/randomPassword:RandomPassword",
            ResourceKind::Vpc => "aws:ec2/vpc:Vpc",
            ResourceKind::Subnet => "aws:ec2/subnet:Subnet",
            ResourceKind::Eip => "aws:ec2/eip:Eip",
            ResourceKind::InternetGateway => "aws:ec2/internetGateway:InternetGateway",
            ResourceKind::NatGateway => "aws:ec2/natGateway:NatGateway",
            ResourceKind::RouteTable => "aws:ec2/routeTable:RouteTable",
            ResourceKind::RouteTableAssociation => {
                "aws:ec2/routeTableAssociation:RouteTableAssociation"
            }
            ResourceKind::SecurityGroup => "aws:ec2/securityGroup:SecurityGroup",
            ResourceKind::Instance => "aws:ec2/instance:Instance",
            ResourceKind::KeyPairLookup => "aws:ec2/getKeyPair:getKeyPair",
            ResourceKind::AmiLookup => "aws:ec2/getAmi:getAmi",
            ResourceKind::HostedZone => "aws:route53/zone:Zone",
            ResourceKind::DnsRecord => "aws:route53/record:Record",
            ResourceKind::RemoteNetwork => {
                "twingate:index/twingateRemoteNetwork:TwingateRemoteNetwork"
            }
            ResourceKind::Connector => "twingate:index/twingateConnector:TwingateConnector",
            ResourceKind::ConnectorTokens => {
                "twingate:index/twingateConnectorTokens:TwingateConnectorTokens"
            }
            ResourceKind::ZeroTrustResource => "twingate:index/twingateResource:TwingateResource",
        }
    }

    /// Lookups read existing infrastructure instead of creating it
    pub fn is_lookup(&self) -> bool {
        matches!(self, ResourceKind::KeyPairLookup | ResourceKind::AmiLookup)
    }

    /// Outputs the provider always treats as sensitive
    pub fn secret_outputs(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::RandomPassword => &["result"],
            ResourceKind::ConnectorTokens => &["access_token", "refresh_token"],
            ResourceKind::Instance => &["user_data", "user_data_base64"],
            _ => &[],
        }
    }

    /// Unique key of a declaration of this kind
    pub fn urn(&self, name: &str) -> String {
        format!("{}::{}", self.type_token(), name)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_token())
    }
}
