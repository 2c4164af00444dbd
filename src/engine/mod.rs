//! Resolution Walk
//!
//! Materializes a [`Stack`] against a [`Provider`]. Every declaration runs as
//! its own task: it waits for the declarations it references, resolves its
//! inputs, then calls the provider while holding a parallelism permit. Its
//! outputs are published to the shared futures behind its [`ResourceRef`], so
//! dependents wake up as soon as it is done.
//!
//! A declaration whose provider call fails is reported as failed; everything
//! downstream of it is reported as skipped.

pub mod provider;
pub mod simulated;
pub mod types;

pub use provider::{CreateRequest, Provider, ProviderError};
pub use simulated::SimulatedProvider;
pub use types::{ApplySummary, ResourceResult, ResourceStatus, REDACTED};

use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::graph::{DependencyGraph, GraphError};
use crate::resource::{Declaration, Input, ResourceOutputs, ResourceRef};
use crate::stack::Stack;

/// Provider calls allowed in flight at once
pub const DEFAULT_PARALLELISM: usize = 10;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("parallelism must be at least 1")]
    InvalidParallelism,

    #[error("task for {urn} did not complete: {reason}")]
    TaskFailed { urn: String, reason: String },
}

/// Drives a provider over a stack
pub struct Engine<P> {
    provider: Arc<P>,
    parallelism: usize,
    reveal_secrets: bool,
}

impl<P> Engine<P>
where
    P: Provider + 'static,
{
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            parallelism: DEFAULT_PARALLELISM,
            reveal_secrets: false,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Result<Self, EngineError> {
        if parallelism == 0 {
            return Err(EngineError::InvalidParallelism);
        }
        self.parallelism = parallelism;
        Ok(self)
    }

    /// Show secret values in the summary instead of redacting them
    pub fn reveal_secrets(mut self, reveal: bool) -> Self {
        self.reveal_secrets = reveal;
        self
    }

    /// Materialize every declaration of `stack`
    pub async fn apply(&self, stack: Stack) -> Result<ApplySummary, EngineError> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let project = stack.project().to_string();
        let stack_name = stack.name().to_string();
        let parts = stack.into_parts();

        // Reject cycles up front; they would leave tasks waiting forever
        let graph = DependencyGraph::from_declarations(&parts.declarations)?;
        let order: Vec<String> = graph
            .topological_order()?
            .into_iter()
            .map(str::to_string)
            .collect();

        info!(
            run_id = %run_id,
            provider = self.provider.name(),
            declarations = order.len(),
            parallelism = self.parallelism,
            "🚀 Resolving stack {}/{}",
            project,
            stack_name
        );

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut pending = parts.pending;
        let mut declarations: HashMap<String, Declaration> = parts
            .declarations
            .into_iter()
            .map(|d| (d.urn.clone(), d))
            .collect();

        let mut tasks = Vec::with_capacity(order.len());
        for urn in &order {
            let Some(declaration) = declarations.remove(urn) else {
                continue;
            };
            let waits_on: Vec<ResourceRef> = declaration
                .references()
                .iter()
                .filter_map(|r| parts.handles.get(r).cloned())
                .collect();
            let task = Materialize {
                provider: Arc::clone(&self.provider),
                semaphore: Arc::clone(&semaphore),
                declaration,
                waits_on,
                sender: pending.remove(urn),
                reveal_secrets: self.reveal_secrets,
            };
            tasks.push((urn.clone(), tokio::spawn(task.run())));
        }

        let mut resources = Vec::with_capacity(tasks.len());
        for (urn, handle) in tasks {
            let result = handle.await.map_err(|e| EngineError::TaskFailed {
                urn: urn.clone(),
                reason: e.to_string(),
            })?;
            resources.push(result);
        }

        let exports = self.resolve_exports(&parts.exports).await;
        let summary = ApplySummary {
            run_id,
            project,
            stack: stack_name,
            provider: self.provider.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            resources,
            exports,
        };

        let (created, failed, skipped) = (
            summary.count(ResourceStatus::Created),
            summary.count(ResourceStatus::Failed),
            summary.count(ResourceStatus::Skipped),
        );
        if summary.is_success() {
            info!(created, "✅ Stack resolved");
        } else {
            warn!(created, failed, skipped, "⚠️  Stack resolved with failures");
        }
        Ok(summary)
    }

    async fn resolve_exports(&self, exports: &BTreeMap<String, Input>) -> BTreeMap<String, Value> {
        let mut resolved = BTreeMap::new();
        for (name, output) in exports {
            let value = match output.resolve().await {
                Ok(_) if output.is_secret() && !self.reveal_secrets => Value::String(REDACTED.to_string()),
                Ok(value) => value,
                Err(e) => {
                    warn!(export = %name, error = %e, "Export could not be resolved");
                    Value::Null
                }
            };
            resolved.insert(name.clone(), value);
        }
        resolved
    }
}

/// One declaration's materialization task
struct Materialize<P: ?Sized> {
    provider: Arc<P>,
    semaphore: Arc<Semaphore>,
    declaration: Declaration,
    waits_on: Vec<ResourceRef>,
    sender: Option<oneshot::Sender<Arc<ResourceOutputs>>>,
    reveal_secrets: bool,
}

impl<P> Materialize<P>
where
    P: Provider + ?Sized,
{
    async fn run(self) -> ResourceResult {
        let Materialize {
            provider,
            semaphore,
            declaration,
            waits_on,
            sender,
            reveal_secrets,
        } = self;
        let Declaration {
            urn, kind, name, inputs, ..
        } = declaration;

        // Dropping `sender` on any early return abandons our dependents
        for dependency in &waits_on {
            if let Err(e) = dependency.completed().await {
                debug!(urn = %urn, dependency = %dependency.urn(), "Skipping");
                return ResourceResult::unresolved(urn, kind, name, ResourceStatus::Skipped, e.to_string());
            }
        }

        let mut resolved = BTreeMap::new();
        let mut shown = BTreeMap::new();
        for (key, input) in &inputs {
            match input.resolve().await {
                Ok(value) => {
                    let display = if input.is_secret() && !reveal_secrets {
                        Value::String(REDACTED.to_string())
                    } else {
                        value.clone()
                    };
                    shown.insert(key.clone(), display);
                    resolved.insert(key.clone(), value);
                }
                Err(e) => {
                    error!(urn = %urn, input = %key, error = %e, "❌ Input could not be resolved");
                    return ResourceResult::unresolved(
                        urn,
                        kind,
                        name,
                        ResourceStatus::Failed,
                        format!("input '{key}': {e}"),
                    );
                }
            }
        }

        let request = CreateRequest {
            urn: urn.clone(),
            kind,
            name: name.clone(),
            inputs: resolved,
        };

        let created = {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    return ResourceResult::unresolved(urn, kind, name, ResourceStatus::Failed, e.to_string())
                }
            };
            provider.create(&request).await
        };

        match created {
            Ok(outputs) => {
                info!(urn = %urn, "➕ Created {}", name);
                let secret_inputs: Vec<&String> = inputs
                    .iter()
                    .filter(|(_, input)| input.is_secret())
                    .map(|(key, _)| key)
                    .collect();
                let visible = outputs
                    .iter()
                    .map(|(key, value)| {
                        let secret = kind.secret_outputs().contains(&key.as_str())
                            || secret_inputs.contains(&key);
                        let value = if secret && !reveal_secrets {
                            Value::String(REDACTED.to_string())
                        } else {
                            value.clone()
                        };
                        (key.clone(), value)
                    })
                    .collect();

                if let Some(sender) = sender {
                    // Nobody listening is fine
                    let _ = sender.send(Arc::new(outputs));
                }

                ResourceResult {
                    urn,
                    kind,
                    name,
                    status: ResourceStatus::Created,
                    inputs: shown,
                    outputs: visible,
                    error: None,
                }
            }
            Err(e) => {
                error!(urn = %urn, error = %e, "❌ Provider failed");
                ResourceResult {
                    urn,
                    kind,
                    name,
                    status: ResourceStatus::Failed,
                    inputs: shown,
                    outputs: BTreeMap::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
