//! End-to-end: stack file on disk -> declared topology -> simulated preview

use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

use tgdemo_infra::config::ConfigError;
use tgdemo_infra::engine::{ResourceStatus, REDACTED};
use tgdemo_infra::topology::build_stack;
use tgdemo_infra::{BootstrapTemplates, Engine, Plan, ResourceKind, SimulatedProvider, StackConfig};

const STACK: &str = r#"
config:
  twingate:network: autoco
  tgdemo:data:
    vpc_name: vpc
    vpc_cidr: 10.0.0.0/16
    prv_subnet_name: private
    prv_cidr: 10.0.1.0/24
    pub_subnet_name: public
    pub_cidr: 10.0.2.0/24
    eip_name: eip
    igw_name: igw
    natgw_name: natgw
    pubrttable_name: public-rt
    prvrttable_name: private-rt
    pubrtasst_name: public-rta
    prvrtasst_name: private-rta
    sec_grp_name: connector-sg
    key_name: demo-key
    ec2_type: t3a.micro
    connectors: 3
    domain: example.com
    tg_remote_network: demo-network
  tgdemo:ca_config:
    ca_hostname: ca
    ca_private_ip: 10.0.1.104
    ca_name: tgdemo
    ca_provisioner: admin@example.com
    ca_aws_account: "123456789012"
    ca_host_cert_duration: 720h
"#;

fn stack_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn load() -> StackConfig {
    let file = stack_file(STACK);
    StackConfig::load(file.path(), "tgdemo").unwrap()
}

#[test]
fn test_plan_from_stack_file() {
    let config = load();
    let templates = Arc::new(BootstrapTemplates::bundled().unwrap());
    let (stack, _) = build_stack(&config, templates, "test").unwrap();
    let plan = Plan::from_stack(&stack).unwrap();

    assert_eq!(plan.count(ResourceKind::Connector), 3);
    assert_eq!(plan.count(ResourceKind::Instance), 4);
    assert_eq!(plan.count(ResourceKind::SecurityGroup), 2);

    // The CA security group falls back to its default name
    assert!(plan
        .resource(ResourceKind::SecurityGroup, "ca-security-group")
        .is_some());
    assert!(plan.to_json().unwrap().contains("\"project\": \"tgdemo\""));
}

#[tokio::test]
async fn test_preview_from_stack_file() {
    let config = load();
    let templates = Arc::new(BootstrapTemplates::bundled().unwrap());
    let (stack, topology) = build_stack(&config, templates, "test").unwrap();

    let summary = Engine::new(SimulatedProvider::new())
        .with_parallelism(3)
        .unwrap()
        .apply(stack)
        .await
        .unwrap();

    assert!(summary.is_success(), "{:#?}", summary.resources);
    assert_eq!(summary.count(ResourceStatus::Failed), 0);
    assert_eq!(summary.exports["ca_root_key_password"], json!(REDACTED));

    let ca = summary.resource(topology.ca.instance.urn()).unwrap();
    assert_eq!(ca.outputs["private_ip"], json!("10.0.1.104"));
    assert_eq!(ca.inputs["user_data"], json!(REDACTED));

    // Private route goes through the NAT gateway
    let nat = summary.find(ResourceKind::NatGateway, "natgw").unwrap();
    let private_rt = summary.find(ResourceKind::RouteTable, "private-rt").unwrap();
    assert_eq!(
        private_rt.inputs["routes"],
        json!([{"cidr_block": "0.0.0.0/0", "nat_gateway_id": nat.outputs["id"]}])
    );
    let igw = summary.find(ResourceKind::InternetGateway, "igw").unwrap();
    let public_rt = summary.find(ResourceKind::RouteTable, "public-rt").unwrap();
    assert_eq!(
        public_rt.inputs["routes"],
        json!([{"cidr_block": "0.0.0.0/0", "gateway_id": igw.outputs["id"]}])
    );

    // Every connector host got a distinct address, none of them the CA's
    let mut addresses: Vec<&str> = summary
        .of_kind(ResourceKind::Instance)
        .map(|r| r.outputs["private_ip"].as_str().unwrap())
        .collect();
    addresses.sort();
    addresses.dedup();
    assert_eq!(addresses.len(), 4);
}

#[test]
fn test_missing_account_is_reported() {
    let without_account = STACK.replace("  twingate:network: autoco\n", "");
    let file = stack_file(&without_account);
    if std::env::var("TWINGATE_NETWORK").is_ok() {
        return;
    }
    let err = StackConfig::load(file.path(), "tgdemo").unwrap_err();
    assert!(matches!(err, ConfigError::MissingAccount));
}
