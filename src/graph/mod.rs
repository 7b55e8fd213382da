//! Composition-graph integration
//!
//! An enclosing composition graph sees every construct through its
//! [`GraphFacet`]: a stable name, an advertised interface, static input
//! bindings, and upstream node names. A fan-out construct presents an empty
//! binding list and no upstream nodes, so it appears as one opaque node;
//! its internal structure is resolved at execution time, never during
//! static graph analysis.

use std::collections::HashMap;
use std::time::Duration;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interface::Interface;
use crate::Result;

/// Errors specific to composition-graph operations
#[derive(Error, Debug)]
pub enum GraphError {
    /// Referenced node is not in the graph
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// A node with this name is already registered
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    /// A declared upstream node is not in the graph
    #[error("Upstream node '{upstream}' of '{node}' not found")]
    UpstreamNotFound {
        /// The node declaring the dependency
        node: String,
        /// The missing upstream node
        upstream: String,
    },
}

/// Metadata attached to a graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Node name
    pub name: String,

    /// Per-node execution timeout
    pub timeout: Option<Duration>,

    /// Whether the node may be preempted
    pub interruptible: Option<bool>,
}

impl NodeMetadata {
    /// Metadata carrying only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout: None,
            interruptible: None,
        }
    }
}

/// A static binding of a node input to an upstream output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    /// Input variable being bound
    pub var: String,

    /// Upstream node supplying the value
    pub upstream_node: String,

    /// Output variable on the upstream node
    pub upstream_var: String,
}

/// How a construct presents itself to an enclosing composition graph
pub trait GraphFacet: Send + Sync {
    /// Stable node name
    fn name(&self) -> &str;

    /// Interface advertised to the graph
    fn interface(&self) -> &Interface;

    /// Static input bindings; empty for constructs resolved at execution
    /// time
    fn bindings(&self) -> Vec<Binding> {
        Vec::new()
    }

    /// Names of upstream nodes; empty for constructs resolved at execution
    /// time
    fn upstream_nodes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Metadata for the graph node
    fn node_metadata(&self) -> NodeMetadata;
}

/// A registered graph node, as captured from a facet
#[derive(Debug, Clone)]
pub struct GraphEntry {
    /// Node name
    pub name: String,

    /// Advertised interface
    pub interface: Interface,

    /// Static bindings captured at registration
    pub bindings: Vec<Binding>,

    /// Node metadata captured at registration
    pub metadata: NodeMetadata,
}

/// A composition graph of registered facets
#[derive(Debug, Clone)]
pub struct CompositionGraph {
    name: String,
    graph: DiGraph<GraphEntry, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl CompositionGraph {
    /// Create an empty composition graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Graph name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a construct through its facet.
    ///
    /// Declared upstream nodes must already be registered; edges are added
    /// from each upstream to the new node.
    pub fn add_facet(&mut self, facet: &dyn GraphFacet) -> Result<()> {
        let name = facet.name().to_string();
        if self.node_map.contains_key(&name) {
            return Err(GraphError::DuplicateNode(name).into());
        }

        let upstream = facet.upstream_nodes();
        let mut upstream_indices = Vec::with_capacity(upstream.len());
        for up in &upstream {
            match self.node_map.get(up) {
                Some(&idx) => upstream_indices.push(idx),
                None => {
                    return Err(GraphError::UpstreamNotFound {
                        node: name,
                        upstream: up.clone(),
                    }
                    .into())
                }
            }
        }

        let entry = GraphEntry {
            name: name.clone(),
            interface: facet.interface().clone(),
            bindings: facet.bindings(),
            metadata: facet.node_metadata(),
        };
        let idx = self.graph.add_node(entry);
        self.node_map.insert(name, idx);

        for up_idx in upstream_indices {
            self.graph.add_edge(up_idx, idx, ());
        }
        Ok(())
    }

    /// Look up a registered node by name
    pub fn get_node(&self, name: &str) -> Option<&GraphEntry> {
        self.node_map
            .get(name)
            .and_then(|idx| self.graph.node_weight(*idx))
    }

    /// Number of registered nodes
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of incoming edges for a node
    pub fn upstream_count(&self, name: &str) -> std::result::Result<usize, GraphError> {
        let idx = self
            .node_map
            .get(name)
            .ok_or_else(|| GraphError::NodeNotFound(name.to_string()))?;
        Ok(self
            .graph
            .edges_directed(*idx, petgraph::Direction::Incoming)
            .count())
    }

    /// Check if the graph has cycles
    pub fn has_cycles(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }
}
