//! Crate-level error type

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::graph::GraphError;
use crate::template::TemplateError;

/// Errors raised while loading, declaring or resolving the topology
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T, E = TopologyError> = std::result::Result<T, E>;
