//! Private DNS zone and address records

use crate::graph::GraphError;
use crate::resource::{list, object, value, Input, ResourceKind, ResourceRef};
use crate::stack::Stack;

pub const ZONE_NAME: &str = "tgdemo_zone";

/// TTL of every address record
pub const RECORD_TTL: u32 = 300;

/// Private zone `<domain>.` bound to `vpc`
pub fn declare_zone(stack: &mut Stack, domain: &str, vpc: &ResourceRef) -> Result<ResourceRef, GraphError> {
    stack.declare(
        ResourceKind::HostedZone,
        ZONE_NAME,
        [
            ("name", value(format!("{domain}."))),
            ("force_destroy", value(true)),
            ("vpcs", list([object([("vpc_id", vpc.id())])])),
        ],
    )
}

/// An `A` record pointing `record_name` at `address`
pub fn declare_a_record(
    stack: &mut Stack,
    name: &str,
    zone: &ResourceRef,
    record_name: Input,
    address: Input,
) -> Result<ResourceRef, GraphError> {
    stack.declare(
        ResourceKind::DnsRecord,
        name,
        [
            ("name", record_name),
            ("zone_id", zone.id()),
            ("type", value("A")),
            ("ttl", value(RECORD_TTL)),
            ("records", list([address])),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zone_and_record_inputs() {
        let mut stack = Stack::new("tgdemo", "dev");
        let vpc = stack
            .declare(ResourceKind::Vpc, "vpc", Vec::<(&str, Input)>::new())
            .unwrap();
        let zone = declare_zone(&mut stack, "example.com", &vpc).unwrap();
        let record = declare_a_record(
            &mut stack,
            "ca_a_record",
            &zone,
            value("ca.example.com"),
            value("10.0.1.10"),
        )
        .unwrap();

        let declared = stack.get(zone.urn()).unwrap();
        assert_eq!(declared.input("name").unwrap().try_get(), Some(Ok(json!("example.com."))));
        assert!(declared.references().contains(vpc.urn()));

        let declared = stack.get(record.urn()).unwrap();
        assert_eq!(declared.input("ttl").unwrap().try_get(), Some(Ok(json!(300))));
        assert_eq!(
            declared.input("records").unwrap().try_get(),
            Some(Ok(json!(["10.0.1.10"])))
        );
        assert_eq!(declared.references().len(), 1);
    }
}
