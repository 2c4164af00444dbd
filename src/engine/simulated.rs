//! Simulated Provider
//!
//! Materializes declarations in memory with deterministic ids, so a stack can
//! be previewed end to end without cloud credentials. Private addresses are
//! allocated from the subnet's CIDR, connectors get generated names, and the
//! root key password is really generated.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use tokio::sync::Mutex;
use tracing::debug;

use super::provider::{CreateRequest, Provider, ProviderError};
use crate::cidr::Ipv4Cidr;
use crate::resource::{ResourceKind, ResourceOutputs};
use crate::secret::{generate_secure_password, PasswordPolicy};

/// First host offset handed out inside a subnet
const FIRST_HOST_OFFSET: u32 = 10;

const ADJECTIVES: [&str; 12] = [
    "amber", "brave", "calm", "daring", "eager", "fancy", "gentle", "hidden", "ivory", "jolly",
    "keen", "lucky",
];

const ANIMALS: [&str; 10] = [
    "falcon", "otter", "lynx", "heron", "badger", "marten", "osprey", "bison", "gecko", "walrus",
];

#[derive(Default)]
struct Allocations {
    sequence: HashMap<ResourceKind, u32>,
    /// subnet id -> CIDR
    subnets: HashMap<String, Ipv4Cidr>,
    /// subnet id -> next host offset to try
    next_host: HashMap<String, u32>,
    assigned: HashSet<Ipv4Addr>,
    /// (zone id, record name, record type)
    records: HashSet<(String, String, String)>,
    connector_names: HashSet<String>,
}

impl Allocations {
    fn next(&mut self, kind: ResourceKind) -> u32 {
        let n = self.sequence.entry(kind).or_insert(0);
        *n += 1;
        *n
    }
}

/// In-memory provider with deterministic outputs
#[derive(Default)]
pub struct SimulatedProvider {
    state: Mutex<Allocations>,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Generated connector name for the `n`th connector
///
/// Every adjective/animal pair is used once; after that the pairs repeat
/// with a round suffix (`amber-falcon-2`).
pub fn connector_name(n: u32) -> String {
    let pairs = ADJECTIVES.len() * ANIMALS.len();
    let i = (n.max(1) - 1) as usize;
    let (round, i) = (i / pairs, i % pairs);
    let adjective = ADJECTIVES[i % ADJECTIVES.len()];
    let animal = ANIMALS[(i / ADJECTIVES.len() + i) % ANIMALS.len()];
    match round {
        0 => format!("{adjective}-{animal}"),
        _ => format!("{adjective}-{animal}-{}", round + 1),
    }
}

fn graph_id(kind: &str, n: u32) -> String {
    STANDARD.encode(format!("{kind}:{n}"))
}

#[async_trait]
impl Provider for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn create(&self, request: &CreateRequest) -> Result<ResourceOutputs, ProviderError> {
        let mut state = self.state.lock().await;
        let n = state.next(request.kind);
        let mut outputs: ResourceOutputs = request.inputs.clone();

        let id = match request.kind {
            ResourceKind::RandomPassword => {
                let policy: PasswordPolicy =
                    serde_json::from_value(Value::Object(request.inputs.clone().into_iter().collect()))
                        .map_err(|e| request.invalid("length", e.to_string()))?;
                let password = generate_secure_password(&policy)
                    .map_err(|e| request.invalid("length", e.to_string()))?;
                outputs.insert("result".to_string(), Value::String(password));
                "none".to_string()
            }
            ResourceKind::Vpc => {
                request.str_input("cidr_block")?;
                format!("vpc-{n:08x}")
            }
            ResourceKind::Subnet => {
                request.str_input("vpc_id")?;
                let cidr: Ipv4Cidr = request
                    .str_input("cidr_block")?
                    .parse::<Ipv4Cidr>()
                    .map_err(|e| request.invalid("cidr_block", e.to_string()))?;
                let id = format!("subnet-{n:08x}");
                state.subnets.insert(id.clone(), cidr);
                state.next_host.insert(id.clone(), FIRST_HOST_OFFSET);
                id
            }
            ResourceKind::Eip => {
                outputs.insert("public_ip".to_string(), json!(format!("203.0.113.{}", n % 254)));
                format!("eipalloc-{n:08x}")
            }
            ResourceKind::InternetGateway => format!("igw-{n:08x}"),
            ResourceKind::NatGateway => {
                request.str_input("allocation_id")?;
                request.str_input("subnet_id")?;
                format!("nat-{n:08x}")
            }
            ResourceKind::RouteTable => format!("rtb-{n:08x}"),
            ResourceKind::RouteTableAssociation => format!("rtbassoc-{n:08x}"),
            ResourceKind::SecurityGroup => format!("sg-{n:08x}"),
            ResourceKind::Instance => {
                let subnet_id = request.str_input("subnet_id")?.to_string();
                let private_ip = allocate_address(&mut state, request, &subnet_id)?;
                outputs.insert("private_ip".to_string(), json!(private_ip.to_string()));
                if let Some(user_data) = request.opt_str_input("user_data")? {
                    outputs.insert("user_data_base64".to_string(), json!(STANDARD.encode(user_data)));
                }
                format!("i-{n:08x}")
            }
            ResourceKind::KeyPairLookup => {
                request.str_input("key_name")?;
                format!("key-{n:08x}")
            }
            ResourceKind::AmiLookup => {
                outputs.insert(
                    "name".to_string(),
                    json!(format!("twingate/images/hvm-ssd/twingate-amd64-{n}")),
                );
                outputs.insert("architecture".to_string(), json!("x86_64"));
                format!("ami-{n:08x}")
            }
            ResourceKind::HostedZone => {
                request.str_input("name")?;
                outputs.insert(
                    "name_servers".to_string(),
                    json!(["ns-1.awsdns.internal", "ns-2.awsdns.internal"]),
                );
                format!("Z{:013}", n)
            }
            ResourceKind::DnsRecord => {
                let zone_id = request.str_input("zone_id")?;
                let name = request.str_input("name")?;
                let record_type = request.str_input("type")?;
                let fqdn = name.trim_end_matches('.');
                let key = (
                    zone_id.to_string(),
                    fqdn.to_ascii_lowercase(),
                    record_type.to_ascii_uppercase(),
                );
                if !state.records.insert(key) {
                    return Err(ProviderError::Rejected {
                        urn: request.urn.clone(),
                        message: format!("{record_type} record {fqdn} already exists in zone {zone_id}"),
                    });
                }
                outputs.insert("fqdn".to_string(), json!(fqdn));
                format!("{zone_id}_{name}_{record_type}")
            }
            ResourceKind::RemoteNetwork => {
                request.str_input("name")?;
                graph_id("RemoteNetwork", n)
            }
            ResourceKind::Connector => {
                request.str_input("remote_network_id")?;
                let name = match request.opt_str_input("name")? {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => connector_name(n),
                };
                if !state.connector_names.insert(name.clone()) {
                    return Err(ProviderError::Rejected {
                        urn: request.urn.clone(),
                        message: format!("connector name {name} is already taken"),
                    });
                }
                outputs.insert("name".to_string(), json!(name));
                graph_id("Connector", n)
            }
            ResourceKind::ConnectorTokens => {
                let connector_id = request.str_input("connector_id")?;
                let seed = STANDARD.encode(format!("{connector_id}/{n}"));
                outputs.insert("access_token".to_string(), json!(format!("at-{seed}")));
                outputs.insert("refresh_token".to_string(), json!(format!("rt-{seed}")));
                graph_id("ConnectorTokens", n)
            }
            ResourceKind::ZeroTrustResource => {
                request.str_input("address")?;
                request.str_input("remote_network_id")?;
                graph_id("Resource", n)
            }
        };

        debug!(urn = %request.urn, id = %id, "Simulated resource");
        outputs.insert("id".to_string(), Value::String(id));
        Ok(outputs)
    }
}

fn allocate_address(
    state: &mut Allocations,
    request: &CreateRequest,
    subnet_id: &str,
) -> Result<Ipv4Addr, ProviderError> {
    let cidr = *state
        .subnets
        .get(subnet_id)
        .ok_or_else(|| request.invalid("subnet_id", format!("unknown subnet {subnet_id}")))?;

    if let Some(requested) = request.opt_str_input("private_ip")? {
        let address = requested
            .parse::<Ipv4Addr>()
            .map_err(|_| request.invalid("private_ip", format!("'{requested}' is not an IPv4 address")))?;
        if !cidr.contains(address) {
            return Err(request.invalid("private_ip", format!("{address} is outside {cidr}")));
        }
        if cidr.is_reserved(address) {
            return Err(request.invalid("private_ip", format!("{address} is reserved in {cidr}")));
        }
        if !state.assigned.insert(address) {
            return Err(ProviderError::Rejected {
                urn: request.urn.clone(),
                message: format!("private address {address} is already in use"),
            });
        }
        return Ok(address);
    }

    // Search from the last allocation to the end of the block, then wrap
    let usable = cidr.usable_offsets();
    let start = state
        .next_host
        .get(subnet_id)
        .copied()
        .unwrap_or(FIRST_HOST_OFFSET)
        .clamp(usable.start, usable.end.max(usable.start));
    let assigned = &state.assigned;
    let free = (start..usable.end)
        .chain(usable.start..start)
        .filter_map(|offset| cidr.host(offset).map(|address| (offset, address)))
        .find(|(_, address)| !assigned.contains(address));

    let (offset, address) = free.ok_or_else(|| ProviderError::Rejected {
        urn: request.urn.clone(),
        message: format!("subnet {cidr} has no free addresses"),
    })?;
    state.assigned.insert(address);
    state.next_host.insert(subnet_id.to_string(), offset + 1);
    Ok(address)
}
