//! VPC, subnets, gateways, routing and security groups

use crate::cidr::Ipv4Cidr;
use crate::config::NetworkConfig;
use crate::graph::GraphError;
use crate::resource::{list, name_tag, object, value, Input, ResourceKind, ResourceRef};
use crate::stack::Stack;

/// Any IPv4 address
pub const ANYWHERE: &str = "0.0.0.0/0";

pub const SSH_PORT: u16 = 22;
pub const HTTPS_PORT: u16 = 443;

/// Handles to the declared network
#[derive(Debug, Clone)]
pub struct Network {
    pub vpc: ResourceRef,
    pub private_subnet: ResourceRef,
    pub public_subnet: ResourceRef,
    pub eip: ResourceRef,
    pub internet_gateway: ResourceRef,
    pub nat_gateway: ResourceRef,
    pub public_route_table: ResourceRef,
    pub private_route_table: ResourceRef,
    pub public_association: ResourceRef,
    pub private_association: ResourceRef,
    /// Attached to the connector hosts
    pub security_group: ResourceRef,
    /// Attached to the CA host
    pub ca_security_group: ResourceRef,
}

/// Allow all outbound traffic
pub fn egress_all() -> Input {
    list([object([
        ("protocol", value("-1")),
        ("from_port", value(0)),
        ("to_port", value(0)),
        ("cidr_blocks", list([value(ANYWHERE)])),
    ])])
}

/// Allow inbound TCP on `port` from anywhere
pub fn tcp_ingress(port: u16) -> Input {
    object([
        ("protocol", value("tcp")),
        ("from_port", value(port)),
        ("to_port", value(port)),
        ("cidr_blocks", list([value(ANYWHERE)])),
    ])
}

/// A route table's `0.0.0.0/0` entry; `target` names the gateway attribute
fn default_route(target: &str, gateway: &ResourceRef) -> Input {
    list([object([
        ("cidr_block", value(ANYWHERE)),
        (target, gateway.id()),
    ])])
}

fn declare_subnet(
    stack: &mut Stack,
    vpc: &ResourceRef,
    name: &str,
    cidr: &Ipv4Cidr,
    public: bool,
) -> Result<ResourceRef, GraphError> {
    stack.declare(
        ResourceKind::Subnet,
        name,
        [
            ("vpc_id", vpc.id()),
            ("cidr_block", value(cidr.to_string())),
            ("map_public_ip_on_launch", value(public)),
            ("tags", name_tag(name)),
        ],
    )
}

pub fn declare_network(stack: &mut Stack, data: &NetworkConfig) -> Result<Network, GraphError> {
    let vpc = stack.declare(
        ResourceKind::Vpc,
        &data.vpc_name,
        [
            ("cidr_block", value(data.vpc_cidr.to_string())),
            ("enable_dns_hostnames", value(true)),
            ("tags", name_tag(&data.vpc_name)),
        ],
    )?;

    let private_subnet = declare_subnet(stack, &vpc, &data.prv_subnet_name, &data.prv_cidr, false)?;
    let public_subnet = declare_subnet(stack, &vpc, &data.pub_subnet_name, &data.pub_cidr, true)?;

    let eip = stack.declare(ResourceKind::Eip, &data.eip_name, [("domain", value("vpc"))])?;

    let internet_gateway = stack.declare(
        ResourceKind::InternetGateway,
        &data.igw_name,
        [("vpc_id", vpc.id()), ("tags", name_tag(&data.igw_name))],
    )?;

    let nat_gateway = stack.declare_with(
        ResourceKind::NatGateway,
        &data.natgw_name,
        [
            ("allocation_id", eip.id()),
            ("subnet_id", public_subnet.id()),
            ("tags", name_tag(&data.natgw_name)),
        ],
        &[&internet_gateway],
    )?;

    let public_route_table = stack.declare(
        ResourceKind::RouteTable,
        &data.pubrttable_name,
        [
            ("vpc_id", vpc.id()),
            ("routes", default_route("gateway_id", &internet_gateway)),
            ("tags", name_tag(&data.pubrttable_name)),
        ],
    )?;
    let private_route_table = stack.declare(
        ResourceKind::RouteTable,
        &data.prvrttable_name,
        [
            ("vpc_id", vpc.id()),
            ("routes", default_route("nat_gateway_id", &nat_gateway)),
            ("tags", name_tag(&data.prvrttable_name)),
        ],
    )?;

    let public_association = stack.declare(
        ResourceKind::RouteTableAssociation,
        &data.pubrtasst_name,
        [
            ("route_table_id", public_route_table.id()),
            ("subnet_id", public_subnet.id()),
        ],
    )?;
    let private_association = stack.declare(
        ResourceKind::RouteTableAssociation,
        &data.prvrtasst_name,
        [
            ("route_table_id", private_route_table.id()),
            ("subnet_id", private_subnet.id()),
        ],
    )?;

    let mut sg_inputs = vec![("vpc_id", vpc.id()), ("egress", egress_all())];
    if data.ssh_enabled {
        sg_inputs.push(("ingress", list([tcp_ingress(SSH_PORT)])));
    }
    let security_group = stack.declare(ResourceKind::SecurityGroup, &data.sec_grp_name, sg_inputs)?;

    let ca_security_group = stack.declare(
        ResourceKind::SecurityGroup,
        &data.ca_sec_grp_name,
        [
            ("vpc_id", vpc.id()),
            ("egress", egress_all()),
            (
                "ingress",
                list([tcp_ingress(SSH_PORT), tcp_ingress(HTTPS_PORT)]),
            ),
        ],
    )?;

    Ok(Network {
        vpc,
        private_subnet,
        public_subnet,
        eip,
        internet_gateway,
        nat_gateway,
        public_route_table,
        private_route_table,
        public_association,
        private_association,
        security_group,
        ca_security_group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use serde_json::json;

    #[test]
    fn test_egress_and_ingress_rules() {
        assert_eq!(
            egress_all().try_get(),
            Some(Ok(json!([{
                "protocol": "-1",
                "from_port": 0,
                "to_port": 0,
                "cidr_blocks": ["0.0.0.0/0"]
            }])))
        );
        assert_eq!(
            tcp_ingress(443).try_get(),
            Some(Ok(json!({
                "protocol": "tcp",
                "from_port": 443,
                "to_port": 443,
                "cidr_blocks": ["0.0.0.0/0"]
            })))
        );
    }

    #[test]
    fn test_route_tables_target_their_gateways() {
        let config = sample_config();
        let mut stack = Stack::new("tgdemo", "dev");
        let network = declare_network(&mut stack, &config.data).unwrap();

        let private = stack.get(network.private_route_table.urn()).unwrap();
        let routes = private.input("routes").unwrap();
        assert!(routes.dependencies().contains(network.nat_gateway.urn()));
        assert!(!routes.dependencies().contains(network.internet_gateway.urn()));

        let public = stack.get(network.public_route_table.urn()).unwrap();
        let routes = public.input("routes").unwrap();
        assert!(routes.dependencies().contains(network.internet_gateway.urn()));
        assert!(!routes.dependencies().contains(network.nat_gateway.urn()));
    }

    #[test]
    fn test_nat_gateway_waits_for_internet_gateway() {
        let config = sample_config();
        let mut stack = Stack::new("tgdemo", "dev");
        let network = declare_network(&mut stack, &config.data).unwrap();

        let nat = stack.get(network.nat_gateway.urn()).unwrap();
        assert!(nat.depends_on.contains(network.internet_gateway.urn()));
        assert!(nat.references().contains(network.eip.urn()));
        assert!(nat.references().contains(network.public_subnet.urn()));
    }

    #[test]
    fn test_ssh_toggle() {
        let mut config = sample_config();
        let mut stack = Stack::new("tgdemo", "dev");
        let network = declare_network(&mut stack, &config.data).unwrap();
        let sg = stack.get(network.security_group.urn()).unwrap();
        let ingress = sg.input("ingress").unwrap().try_get().unwrap().unwrap();
        assert_eq!(ingress.as_array().unwrap().len(), 1);
        assert_eq!(ingress[0]["from_port"], json!(22));
        assert_eq!(ingress[0]["protocol"], json!("tcp"));

        config.data.ssh_enabled = false;
        let mut stack = Stack::new("tgdemo", "dev");
        let network = declare_network(&mut stack, &config.data).unwrap();
        let sg = stack.get(network.security_group.urn()).unwrap();
        assert!(sg.input("ingress").is_none());

        // The CA group is not affected by the toggle
        let ca_sg = stack.get(network.ca_security_group.urn()).unwrap();
        let rules = ca_sg.input("ingress").unwrap().try_get().unwrap().unwrap();
        let ports: Vec<u64> = rules
            .as_array()
            .unwrap()
            .iter()
            .map(|rule| rule["from_port"].as_u64().unwrap())
            .collect();
        assert_eq!(ports, vec![22, 443]);
    }

    #[test]
    fn test_subnets_public_ip_mapping() {
        let config = sample_config();
        let mut stack = Stack::new("tgdemo", "dev");
        let network = declare_network(&mut stack, &config.data).unwrap();

        let public_ip = |r: &ResourceRef| {
            stack
                .get(r.urn())
                .unwrap()
                .input("map_public_ip_on_launch")
                .unwrap()
                .try_get()
        };
        assert_eq!(public_ip(&network.public_subnet), Some(Ok(json!(true))));
        assert_eq!(public_ip(&network.private_subnet), Some(Ok(json!(false))));
        assert_eq!(stack.len(), 12);
    }
}
