//! Twingate remote network and resources

use crate::graph::GraphError;
use crate::resource::{value, Input, ResourceKind, ResourceRef};
use crate::stack::Stack;

pub fn declare_remote_network(stack: &mut Stack, name: &str) -> Result<ResourceRef, GraphError> {
    stack.declare(ResourceKind::RemoteNetwork, name, [("name", value(name))])
}

/// A resource reachable at `address` through `remote_network`
pub fn declare_resource(
    stack: &mut Stack,
    name: &str,
    remote_network: &ResourceRef,
    display_name: Input,
    address: Input,
) -> Result<ResourceRef, GraphError> {
    stack.declare(
        ResourceKind::ZeroTrustResource,
        name,
        [
            ("name", display_name),
            ("remote_network_id", remote_network.id()),
            ("address", address),
        ],
    )
}
