//! Declaration Registry
//!
//! A [`Stack`] collects declarations in the order they are made, hands out
//! [`ResourceRef`] handles, and keeps the exported values. Declaring never
//! contacts a provider; the outputs behind each handle stay pending until an
//! engine materializes the declaration.

use futures::future::FutureExt;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::graph::GraphError;
use crate::output::ResolveError;
use crate::resource::{Declaration, Input, ResourceKind, ResourceOutputs, ResourceRef};

/// Collected declarations for one stack
pub struct Stack {
    project: String,
    name: String,
    declarations: Vec<Declaration>,
    handles: BTreeMap<String, ResourceRef>,
    pending: HashMap<String, oneshot::Sender<Arc<ResourceOutputs>>>,
    exports: BTreeMap<String, Input>,
}

// Values are left out: inputs may be secret and are mostly still pending
impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("project", &self.project)
            .field("name", &self.name)
            .field("declarations", &self.declarations.len())
            .field("exports", &self.exports.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A stack taken apart for materialization
pub(crate) struct StackParts {
    pub declarations: Vec<Declaration>,
    pub handles: BTreeMap<String, ResourceRef>,
    pub pending: HashMap<String, oneshot::Sender<Arc<ResourceOutputs>>>,
    pub exports: BTreeMap<String, Input>,
}

impl Stack {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            declarations: Vec::new(),
            handles: BTreeMap::new(),
            pending: HashMap::new(),
            exports: BTreeMap::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a resource
    pub fn declare<I, K>(
        &mut self,
        kind: ResourceKind,
        name: &str,
        inputs: I,
    ) -> Result<ResourceRef, GraphError>
    where
        I: IntoIterator<Item = (K, Input)>,
        K: Into<String>,
    {
        self.declare_with(kind, name, inputs, &[])
    }

    /// Declare a resource that must also wait for `depends_on`
    pub fn declare_with<I, K>(
        &mut self,
        kind: ResourceKind,
        name: &str,
        inputs: I,
        depends_on: &[&ResourceRef],
    ) -> Result<ResourceRef, GraphError>
    where
        I: IntoIterator<Item = (K, Input)>,
        K: Into<String>,
    {
        let urn = kind.urn(name);
        if self.handles.contains_key(&urn) {
            return Err(GraphError::Duplicate(urn));
        }

        let (tx, rx) = oneshot::channel::<Arc<ResourceOutputs>>();
        let owner = urn.clone();
        let outputs = async move { rx.await.map_err(|_| ResolveError::Abandoned(owner)) }
            .boxed()
            .shared();

        let handle = ResourceRef::new(urn.clone(), kind, name.to_string(), outputs);
        let declaration = Declaration {
            urn: urn.clone(),
            kind,
            name: name.to_string(),
            inputs: inputs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            depends_on: depends_on
                .iter()
                .map(|r| r.urn().to_string())
                .collect::<BTreeSet<_>>(),
        };

        debug!(urn = %urn, inputs = declaration.inputs.len(), "Declared resource");

        self.declarations.push(declaration);
        self.handles.insert(urn.clone(), handle.clone());
        self.pending.insert(urn, tx);
        Ok(handle)
    }

    /// Export a stack output
    pub fn export(&mut self, name: impl Into<String>, value: Input) {
        self.exports.insert(name.into(), value);
    }

    pub fn exports(&self) -> &BTreeMap<String, Input> {
        &self.exports
    }

    /// Declarations in the order they were made
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn get(&self, urn: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.urn == urn)
    }

    pub fn find(&self, kind: ResourceKind, name: &str) -> Option<&Declaration> {
        self.get(&kind.urn(name))
    }

    /// All declarations of one kind
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.kind == kind)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.of_kind(kind).count()
    }

    pub(crate) fn into_parts(self) -> StackParts {
        StackParts {
            declarations: self.declarations,
            handles: self.handles,
            pending: self.pending,
            exports: self.exports,
        }
    }
}
