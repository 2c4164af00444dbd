//! Resource Declarations
//!
//! A [`Declaration`] is a one-shot record: a kind, a name, and a set of inputs
//! that may be deferred references to other declarations' outputs. A
//! [`ResourceRef`] is the handle returned when declaring, used to read the
//! declaration's outputs once they exist.

pub mod types;

pub use types::ResourceKind;

use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::output::{Output, ResolveError, ResolveResult};

/// An input attribute of a declaration
pub type Input = Output<Value>;

/// Outputs reported by a provider after materializing a declaration
pub type ResourceOutputs = BTreeMap<String, Value>;

pub(crate) type SharedOutputs = Shared<BoxFuture<'static, ResolveResult<Arc<ResourceOutputs>>>>;

/// A declared resource and its inputs
#[derive(Debug, Clone)]
pub struct Declaration {
    pub urn: String,
    pub kind: ResourceKind,
    pub name: String,
    pub inputs: BTreeMap<String, Input>,
    /// Ordering-only dependencies that carry no data
    pub depends_on: BTreeSet<String>,
}

impl Declaration {
    /// Every URN this declaration must wait for
    pub fn references(&self) -> BTreeSet<String> {
        self.inputs
            .values()
            .flat_map(|input| input.dependencies().iter().cloned())
            .chain(self.depends_on.iter().cloned())
            .collect()
    }

    pub fn input(&self, key: &str) -> Option<&Input> {
        self.inputs.get(key)
    }
}

/// Handle to a declared resource
#[derive(Clone)]
pub struct ResourceRef {
    urn: String,
    kind: ResourceKind,
    name: String,
    outputs: SharedOutputs,
}

impl ResourceRef {
    pub(crate) fn new(urn: String, kind: ResourceKind, name: String, outputs: SharedOutputs) -> Self {
        Self {
            urn,
            kind,
            name,
            outputs,
        }
    }

    pub fn urn(&self) -> &str {
        &self.urn
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A named output of this resource
    pub fn output(&self, key: &str) -> Input {
        let outputs = self.outputs.clone();
        let urn = self.urn.clone();
        let key = key.to_string();
        let secret = self.kind.secret_outputs().contains(&key.as_str());

        let output = Output::deferred(
            {
                let urn = urn.clone();
                async move {
                    let outputs = outputs.await?;
                    outputs
                        .get(&key)
                        .cloned()
                        .ok_or(ResolveError::MissingOutput { urn, key })
                }
            },
            BTreeSet::from([urn]),
        );

        if secret {
            output.mark_secret()
        } else {
            output
        }
    }

    /// The provider-assigned id
    pub fn id(&self) -> Input {
        self.output("id")
    }

    /// A named output that must be a string
    pub fn string(&self, key: &str) -> Output<String> {
        let location = format!("{}.{}", self.urn, key);
        self.output(key).try_apply(move |value| match value {
            Value::String(s) => Ok(s),
            other => Err(format!("{location} is not a string: {other}")),
        })
    }

    /// Resolves once the resource has been materialized
    pub(crate) async fn completed(&self) -> ResolveResult<Arc<ResourceOutputs>> {
        self.outputs.clone().await
    }
}

impl std::fmt::Debug for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRef").field("urn", &self.urn).finish()
    }
}

/// A known input value
pub fn value(value: impl Into<Value>) -> Input {
    Output::known(value.into())
}

/// A string output converted into an input
pub fn text(output: &Output<String>) -> Input {
    output.apply(Value::String)
}

/// An object whose fields may be deferred
pub fn object<I, K>(fields: I) -> Input
where
    I: IntoIterator<Item = (K, Input)>,
    K: Into<String>,
{
    let (keys, inputs): (Vec<String>, Vec<Input>) =
        fields.into_iter().map(|(k, v)| (k.into(), v)).unzip();

    Output::all(inputs).apply(move |values| Value::Object(keys.into_iter().zip(values).collect()))
}

/// A list whose items may be deferred
pub fn list<I>(items: I) -> Input
where
    I: IntoIterator<Item = Input>,
{
    Output::all(items).apply(Value::Array)
}

/// The conventional `Name` tag
pub fn name_tag(name: &str) -> Input {
    object([("Name", value(name))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_of_known_values_is_known() {
        let route = object([("cidr_block", value("0.0.0.0/0")), ("ttl", value(300))]);
        assert_eq!(
            route.try_get(),
            Some(Ok(json!({"cidr_block": "0.0.0.0/0", "ttl": 300})))
        );
    }

    #[test]
    fn test_list_and_name_tag() {
        let tags = list([name_tag("smallstep-ca"), value(true)]);
        assert_eq!(
            tags.try_get(),
            Some(Ok(json!([{"Name": "smallstep-ca"}, true])))
        );
    }

    #[test]
    fn test_text_keeps_secrecy() {
        let secret = Output::known("token".to_string()).mark_secret();
        let input = text(&secret);
        assert!(input.is_secret());
        assert_eq!(input.try_get(), Some(Ok(json!("token"))));
    }
}
