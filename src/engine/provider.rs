//! Provider seam
//!
//! A provider materializes one fully resolved declaration at a time and
//! reports its outputs. Lookups go through the same call.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::resource::{ResourceKind, ResourceOutputs};

/// A declaration with every input resolved
#[derive(Debug, Clone, Serialize)]
pub struct CreateRequest {
    pub urn: String,
    pub kind: ResourceKind,
    pub name: String,
    pub inputs: BTreeMap<String, Value>,
}

impl CreateRequest {
    /// A required string input
    pub fn str_input(&self, key: &str) -> Result<&str, ProviderError> {
        match self.inputs.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(ProviderError::InvalidInput {
                urn: self.urn.clone(),
                input: key.to_string(),
                reason: format!("expected a string, found {other}"),
            }),
            None => Err(ProviderError::MissingInput {
                urn: self.urn.clone(),
                input: key.to_string(),
            }),
        }
    }

    /// An optional string input
    pub fn opt_str_input(&self, key: &str) -> Result<Option<&str>, ProviderError> {
        match self.inputs.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.str_input(key).map(Some),
        }
    }

    pub(crate) fn invalid(&self, key: &str, reason: impl Into<String>) -> ProviderError {
        ProviderError::InvalidInput {
            urn: self.urn.clone(),
            input: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{urn}: missing input '{input}'")]
    MissingInput { urn: String, input: String },

    #[error("{urn}: invalid input '{input}': {reason}")]
    InvalidInput {
        urn: String,
        input: String,
        reason: String,
    },

    #[error("{urn}: {message}")]
    Rejected { urn: String, message: String },
}

/// Something that can materialize declarations
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human readable provider name
    fn name(&self) -> &str;

    /// Create (or, for lookups, read) the resource described by `request`
    async fn create(&self, request: &CreateRequest) -> Result<ResourceOutputs, ProviderError>;
}
