//! tgdemo Infrastructure Library
//!
//! Declares the demo topology: a VPC with public/private subnets, a smallstep
//! certificate authority host, and a fleet of Twingate connector instances.
//!
//! Declarations are collected into a [`Stack`], wired together through
//! deferred [`Output`] values, ordered by a [`DependencyGraph`], and can be
//! planned or resolved against a [`Provider`].

pub mod bootstrap;
pub mod cidr;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod output;
pub mod plan;
pub mod resource;
pub mod secret;
pub mod stack;
pub mod template;
pub mod topology;

pub use bootstrap::BootstrapTemplates;
pub use config::StackConfig;
pub use engine::{ApplySummary, Engine, Provider, SimulatedProvider};
pub use error::{Result, TopologyError};
pub use graph::DependencyGraph;
pub use output::Output;
pub use plan::Plan;
pub use resource::{ResourceKind, ResourceRef};
pub use stack::Stack;
pub use topology::Topology;
