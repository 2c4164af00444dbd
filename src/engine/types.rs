//! Types reported by the resolution walk

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::resource::ResourceKind;

/// Placeholder shown instead of a secret value
pub const REDACTED: &str = "[secret]";

/// Outcome for one declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Materialized by the provider
    Created,
    /// The provider or an input callback failed
    Failed,
    /// A dependency failed or was skipped
    Skipped,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Created => write!(f, "created"),
            ResourceStatus::Failed => write!(f, "failed"),
            ResourceStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Resolved view of one declaration
#[derive(Debug, Clone, Serialize)]
pub struct ResourceResult {
    pub urn: String,
    pub kind: ResourceKind,
    pub name: String,
    pub status: ResourceStatus,
    /// Resolved inputs, secrets redacted unless revealed
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, Value>,
    /// Provider outputs, secrets redacted unless revealed
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceResult {
    pub(crate) fn unresolved(
        urn: String,
        kind: ResourceKind,
        name: String,
        status: ResourceStatus,
        error: String,
    ) -> Self {
        Self {
            urn,
            kind,
            name,
            status,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            error: Some(error),
        }
    }
}

/// Result of resolving a whole stack
#[derive(Debug, Clone, Serialize)]
pub struct ApplySummary {
    pub run_id: Uuid,
    pub project: String,
    pub stack: String,
    pub provider: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Declarations in dependency order
    pub resources: Vec<ResourceResult>,
    pub exports: BTreeMap<String, Value>,
}

impl ApplySummary {
    pub fn count(&self, status: ResourceStatus) -> usize {
        self.resources.iter().filter(|r| r.status == status).count()
    }

    pub fn is_success(&self) -> bool {
        self.resources
            .iter()
            .all(|r| r.status == ResourceStatus::Created)
    }

    pub fn resource(&self, urn: &str) -> Option<&ResourceResult> {
        self.resources.iter().find(|r| r.urn == urn)
    }

    pub fn find(&self, kind: ResourceKind, name: &str) -> Option<&ResourceResult> {
        self.resource(&kind.urn(name))
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceResult> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }
}
