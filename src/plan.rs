//! Plan rendering
//!
//! A [`Plan`] is a static view of a stack before anything is materialized:
//! declarations in dependency order with each input shown as a known value,
//! a computed value (and what it waits on), or a redacted secret.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::graph::{DependencyGraph, GraphError};
use crate::resource::{Input, ResourceKind};
use crate::stack::Stack;

/// An input as it is known at plan time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PlannedValue {
    Known { value: Value },
    /// Known only once the listed declarations exist
    Computed { from: Vec<String> },
    Secret,
    /// Can never resolve, e.g. a callback already failed
    Invalid { error: String },
}

impl PlannedValue {
    pub fn of(input: &Input) -> Self {
        if input.is_secret() {
            return PlannedValue::Secret;
        }
        match input.try_get() {
            Some(Ok(value)) => PlannedValue::Known { value },
            Some(Err(e)) => PlannedValue::Invalid {
                error: e.to_string(),
            },
            None => PlannedValue::Computed {
                from: input.dependencies().iter().cloned().collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedDeclaration {
    pub urn: String,
    pub kind: ResourceKind,
    pub name: String,
    pub inputs: BTreeMap<String, PlannedValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// Everything a stack would create
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub project: String,
    pub stack: String,
    pub resources: Vec<PlannedDeclaration>,
    pub exports: BTreeMap<String, PlannedValue>,
}

impl Plan {
    pub fn from_stack(stack: &Stack) -> Result<Self, GraphError> {
        let graph = DependencyGraph::from_declarations(stack.declarations())?;
        let resources = graph
            .topological_order()?
            .into_iter()
            .filter_map(|urn| stack.get(urn))
            .map(|declaration| PlannedDeclaration {
                urn: declaration.urn.clone(),
                kind: declaration.kind,
                name: declaration.name.clone(),
                inputs: declaration
                    .inputs
                    .iter()
                    .map(|(key, input)| (key.clone(), PlannedValue::of(input)))
                    .collect(),
                depends_on: graph
                    .dependencies_of(&declaration.urn)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect();

        Ok(Self {
            project: stack.project().to_string(),
            stack: stack.name().to_string(),
            resources,
            exports: stack
                .exports()
                .iter()
                .map(|(name, output)| (name.clone(), PlannedValue::of(output)))
                .collect(),
        })
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.resources.iter().filter(|r| r.kind == kind).count()
    }

    pub fn resource(&self, kind: ResourceKind, name: &str) -> Option<&PlannedDeclaration> {
        let urn = kind.urn(name);
        self.resources.iter().find(|r| r.urn == urn)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
