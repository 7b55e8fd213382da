//! # ArrayFlow
//!
//! A fan-out ("array node") execution construct: take one registered
//! invocable entity, map it over collection-valued inputs, and gather the
//! per-element outputs back into a single positionally-aligned collection.
//!
//! ## Overview
//!
//! An [`node::ArrayNode`] wraps a single-output target entity. Inputs are
//! split into *mapped* fields (one element per sub-invocation) and *bound*
//! fields (the same value broadcast to every sub-invocation). Execution runs
//! N independent sub-invocations under a partial-success budget: failures
//! are tolerated up to a configured minimum-success threshold, recorded as
//! none-sentinels in the output collection, and the whole call aborts with
//! the triggering failure as soon as the budget is exhausted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::{HashMap, HashSet};
//! use arrayflow::engine::ExecutionContext;
//! use arrayflow::node::ArrayNode;
//! use arrayflow::policy::ExecutionPolicy;
//! use arrayflow::target::Target;
//! use serde_json::json;
//!
//! # async fn example(target: Target) -> Result<(), Box<dyn std::error::Error>> {
//! let node = ArrayNode::new(
//!     target,
//!     ExecutionPolicy::default().with_min_success_ratio(0.75),
//!     HashSet::new(),
//!     None,
//! )?;
//!
//! let mut inputs = HashMap::new();
//! inputs.insert("x".to_string(), json!([1, 2, 3, 4]));
//!
//! let ctx = ExecutionContext::sequential();
//! let output = node.call(&ctx, inputs).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`value`]: typed value representation and native-to-typed translation
//! - [`interface`]: entity interfaces and the collection-interface transform
//! - [`target`]: the invocable-entity abstraction being mapped over
//! - [`policy`]: execution policy and the failure budget
//! - [`engine`]: sequential and concurrent fan-out engines
//! - [`node`]: the array node construct itself
//! - [`graph`]: composition-graph integration (the node's identity facet)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for ArrayFlow operations
pub type Result<T> = std::result::Result<T, ArrayFlowError>;

/// Main error type for ArrayFlow operations
#[derive(Error, Debug)]
pub enum ArrayFlowError {
    /// Construction-time validation failure
    #[error("Construction error: {0}")]
    Construction(#[from] node::ConstructionError),

    /// Call-time input shape or type failure, raised before any
    /// sub-invocation runs
    #[error("Input shape error: {0}")]
    InputShape(#[from] value::InputShapeError),

    /// A target entity's own invocation failed
    #[error("Invocation error: {0}")]
    Invocation(String),

    /// Composition graph error
    #[error("Graph error: {0}")]
    Graph(#[from] graph::GraphError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Join error from async tasks
    #[error("Async join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Typed value representation and translation
pub mod value;

/// Entity interfaces and the collection-interface transform
pub mod interface;

/// Invocable target entities
pub mod target;

/// Execution policy and failure budget
pub mod policy;

/// Fan-out execution engines
pub mod engine;

/// The array node construct
pub mod node;

/// Composition-graph integration
pub mod graph;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArrayFlowError::Invocation("boom".to_string());
        assert_eq!(err.to_string(), "Invocation error: boom");
    }

    #[test]
    fn test_input_shape_error_conversion() {
        let shape = value::InputShapeError::MissingField {
            field: "x".to_string(),
        };
        let err: ArrayFlowError = shape.into();
        assert!(matches!(err, ArrayFlowError::InputShape(_)));
    }
}
