//! Dependency Graph
//!
//! Explicit DAG of declarations keyed by URN. An edge `a -> b` means `a`
//! reads an output of `b` (or explicitly depends on it) and must therefore be
//! materialized after it.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::fmt::Write;
use thiserror::Error;

use crate::resource::Declaration;

/// Errors in the shape of the declaration graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("duplicate declaration: {0}")]
    Duplicate(String),

    #[error("{from} references undeclared {to}")]
    UnknownReference { from: String, to: String },

    #[error("dependency cycle between: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Directed acyclic graph of declarations
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// URNs in declaration order
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    /// node -> the nodes it depends on
    dependencies: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from declarations, adding an edge for every reference
    pub fn from_declarations(declarations: &[Declaration]) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for declaration in declarations {
            graph.add_node(&declaration.urn)?;
        }
        for declaration in declarations {
            for reference in declaration.references() {
                graph.add_edge(&declaration.urn, &reference)?;
            }
        }
        Ok(graph)
    }

    pub fn add_node(&mut self, urn: &str) -> Result<(), GraphError> {
        if self.index.contains_key(urn) {
            return Err(GraphError::Duplicate(urn.to_string()));
        }
        self.index.insert(urn.to_string(), self.nodes.len());
        self.nodes.push(urn.to_string());
        self.dependencies.push(BTreeSet::new());
        Ok(())
    }

    /// Record that `from` depends on `to`
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let unknown = |missing: &str| GraphError::UnknownReference {
            from: from.to_string(),
            to: missing.to_string(),
        };
        let from_idx = *self.index.get(from).ok_or_else(|| unknown(from))?;
        let to_idx = *self.index.get(to).ok_or_else(|| unknown(to))?;
        self.dependencies[from_idx].insert(to_idx);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of `urn`, in declaration order
    pub fn dependencies_of(&self, urn: &str) -> Vec<&str> {
        self.index
            .get(urn)
            .map(|&i| {
                self.dependencies[i]
                    .iter()
                    .map(|&d| self.nodes[d].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Declarations that directly depend on `urn`, in declaration order
    pub fn dependents_of(&self, urn: &str) -> Vec<&str> {
        let Some(&target) = self.index.get(urn) else {
            return Vec::new();
        };
        self.dependencies
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.contains(&target))
            .map(|(i, _)| self.nodes[i].as_str())
            .collect()
    }

    /// Kahn's algorithm; ties go to the earliest declaration
    pub fn topological_order(&self) -> Result<Vec<&str>, GraphError> {
        let mut remaining: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (node, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, &count)| count == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(self.nodes[node].as_str());
            for &dependent in &dependents[node] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() < self.nodes.len() {
            let stuck = remaining
                .iter()
                .enumerate()
                .filter(|(_, &count)| count > 0)
                .map(|(i, _)| self.nodes[i].clone())
                .collect();
            return Err(GraphError::Cycle(stuck));
        }

        Ok(order)
    }

    /// Graphviz rendering, edges pointing from dependency to dependent
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph stack {\n    rankdir=LR;\n");
        for (i, urn) in self.nodes.iter().enumerate() {
            let _ = writeln!(dot, "    n{} [label=\"{}\"];", i, urn.replace('"', "\\\""));
        }
        for (node, deps) in self.dependencies.iter().enumerate() {
            for dep in deps {
                let _ = writeln!(dot, "    n{} -> n{};", dep, node);
            }
        }
        dot.push_str("}\n");
        dot
    }
}
