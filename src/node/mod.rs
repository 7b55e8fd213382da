//! The array node construct
//!
//! An [`ArrayNode`] maps one registered target entity over collection
//! inputs. Construction derives the collection interface and validates the
//! target synchronously; each call builds N per-invocation input bundles,
//! hands them to the fan-out engine, and returns the aggregated,
//! index-aligned output (or the triggering failure once the partial-success
//! budget is exhausted).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::engine::{ArrayOutput, ExecutionContext, FanOut};
use crate::graph::{Binding, GraphFacet, NodeMetadata};
use crate::interface::{Field, Interface};
use crate::policy::{ExecutionPolicy, EXECUTION_VERSION};
use crate::target::{Invocable, Target, TaskMetadata};
use crate::value::{to_typed, InputShapeError, TypedInputs, TypedValue};
use crate::Result;

/// Metadata supplied at construction; the variant must match the target
/// kind
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayNodeMetadata {
    /// Graph-node metadata, required for plan targets
    Node(NodeMetadata),

    /// Task metadata; invalid for plan targets
    Task(TaskMetadata),
}

/// Construction-time validation failure
///
/// Unrecognized target kinds are unrepresentable: [`Target`] is a tagged
/// enum and construction matches it exhaustively, so adding a kind forces
/// a decision here at compile time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    /// The target declares more than one output
    #[error("only single-output targets are supported in map constructs (got {count})")]
    MultipleOutputs {
        /// Number of declared outputs
        count: usize,
    },

    /// The execution version is not defined
    #[error("only execution version {EXECUTION_VERSION} is supported for plan targets (got {version})")]
    UnsupportedExecutionVersion {
        /// The version supplied
        version: u32,
    },

    /// The metadata variant does not match the target kind
    #[error("invalid metadata for {kind} target; node metadata required")]
    MetadataMismatch {
        /// Target kind label
        kind: &'static str,
    },
}

/// A fan-out construct over one registered target entity
#[derive(Clone)]
pub struct ArrayNode {
    target: Target,
    entity: Arc<dyn Invocable>,
    name: String,
    policy: ExecutionPolicy,
    bound_inputs: HashSet<String>,
    scalar_interface: Interface,
    collection_interface: Interface,
    metadata: Option<NodeMetadata>,
}

impl ArrayNode {
    /// Construct an array node over `target`.
    ///
    /// Validation runs synchronously, before anything can execute: the
    /// target must declare at most one output, the execution version must
    /// be 1, and metadata (if supplied) must be the variant matching the
    /// target kind.
    pub fn new(
        target: Target,
        policy: ExecutionPolicy,
        bound_inputs: HashSet<String>,
        metadata: Option<ArrayNodeMetadata>,
    ) -> std::result::Result<Self, ConstructionError> {
        let scalar_interface = target.interface();
        let n_outputs = scalar_interface.outputs().len();
        if n_outputs > 1 {
            return Err(ConstructionError::MultipleOutputs { count: n_outputs });
        }

        let metadata = match &target {
            Target::Plan(_) => {
                if policy.execution_version != EXECUTION_VERSION {
                    return Err(ConstructionError::UnsupportedExecutionVersion {
                        version: policy.execution_version,
                    });
                }
                match metadata {
                    None => None,
                    Some(ArrayNodeMetadata::Node(meta)) => Some(meta),
                    Some(ArrayNodeMetadata::Task(_)) => {
                        return Err(ConstructionError::MetadataMismatch {
                            kind: target.kind(),
                        })
                    }
                }
            }
        };

        let optional_output = policy.tolerates_partial_output() && n_outputs == 1;
        let collection_interface =
            scalar_interface.to_collection_interface(&bound_inputs, optional_output);

        let entity = target.entity();
        let name = target.name();
        Ok(Self {
            target,
            entity,
            name,
            policy,
            bound_inputs,
            scalar_interface,
            collection_interface,
            metadata,
        })
    }

    /// Stable node name (the target's registered name)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The collection interface this construct advertises
    pub fn interface(&self) -> &Interface {
        &self.collection_interface
    }

    /// The target being mapped over
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Names of broadcast (non-indexed) inputs
    pub fn bound_inputs(&self) -> &HashSet<String> {
        &self.bound_inputs
    }

    /// Configured batch width
    pub fn concurrency(&self) -> Option<usize> {
        self.policy.concurrency
    }

    /// Configured absolute minimum-success threshold
    pub fn min_successes(&self) -> Option<usize> {
        self.policy.min_successes
    }

    /// Configured minimum success ratio
    pub fn min_success_ratio(&self) -> Option<f64> {
        self.policy.min_success_ratio
    }

    /// Execution protocol version
    pub fn execution_version(&self) -> u32 {
        self.policy.execution_version
    }

    /// Metadata for the enclosing graph node
    pub fn construct_node_metadata(&self) -> NodeMetadata {
        self.metadata
            .clone()
            .unwrap_or_else(|| NodeMetadata::named(&self.name))
    }

    /// Execute the fan-out against native inputs matching the collection
    /// interface.
    ///
    /// Returns the index-aligned output collection (or a void
    /// acknowledgement for void targets), or the triggering failure once
    /// the budget is exhausted. Input-shape errors surface before any
    /// sub-invocation runs.
    #[instrument(skip(self, ctx, inputs), fields(node = %self.name))]
    pub async fn call(
        &self,
        ctx: &ExecutionContext,
        inputs: HashMap<String, Value>,
    ) -> Result<ArrayOutput> {
        let outputs_expected = self.scalar_interface.single_output().is_some();
        let (bound_typed, mapped, n) = self.partition_inputs(&inputs)?;

        let effective_min = self.policy.effective_min_successes(n);

        let mut invocations = Vec::with_capacity(n);
        for i in 0..n {
            let mut bundle = bound_typed.clone();
            for (field, items) in &mapped {
                bundle.insert(field.name.clone(), element_typed(field, i, &items[i])?);
            }
            invocations.push(bundle);
        }

        let fan_out = FanOut {
            target: Arc::clone(&self.entity),
            node_name: self.name.clone(),
            invocations,
            effective_min,
            outputs_expected,
            concurrency: self.policy.concurrency,
        };
        fan_out.run(ctx).await
    }

    /// Split native inputs into translated bound values and validated
    /// mapped sequences, fixing the fan-out width N.
    ///
    /// N is the length of the first mapped field in declaration order;
    /// every other mapped field must match it. All shape checks happen
    /// here, before any sub-invocation starts.
    fn partition_inputs<'a>(
        &self,
        inputs: &'a HashMap<String, Value>,
    ) -> Result<(TypedInputs, Vec<(&Field, &'a Vec<Value>)>, usize)> {
        let mut bound_typed = TypedInputs::new();
        let mut mapped: Vec<(&Field, &Vec<Value>)> = Vec::new();
        let mut n: Option<usize> = None;

        for field in self.scalar_interface.inputs() {
            let value = inputs
                .get(&field.name)
                .ok_or_else(|| InputShapeError::MissingField {
                    field: field.name.clone(),
                })?;

            if self.bound_inputs.contains(&field.name) {
                bound_typed.insert(field.name.clone(), to_typed(&field.name, value, &field.ty)?);
                continue;
            }

            let items = value
                .as_array()
                .ok_or_else(|| InputShapeError::NotASequence {
                    field: field.name.clone(),
                })?;
            if items.is_empty() {
                return Err(InputShapeError::EmptySequence {
                    field: field.name.clone(),
                }
                .into());
            }
            match n {
                None => n = Some(items.len()),
                Some(expected) if items.len() != expected => {
                    return Err(InputShapeError::LengthMismatch {
                        field: field.name.clone(),
                        expected,
                        found: items.len(),
                    }
                    .into())
                }
                Some(_) => {}
            }
            mapped.push((field, items));
        }

        // No mapped fields means a zero-width fan-out
        Ok((bound_typed, mapped, n.unwrap_or(0)))
    }
}

impl std::fmt::Debug for ArrayNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayNode")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("bound_inputs", &self.bound_inputs)
            .finish()
    }
}

impl GraphFacet for ArrayNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn interface(&self) -> &Interface {
        &self.collection_interface
    }

    // The fan-out is resolved at execution time; static analysis sees one
    // opaque node with no bindings and no upstream edges.
    fn bindings(&self) -> Vec<Binding> {
        Vec::new()
    }

    fn upstream_nodes(&self) -> Vec<String> {
        Vec::new()
    }

    fn node_metadata(&self) -> NodeMetadata {
        self.construct_node_metadata()
    }
}

/// Construct an array node with no bound inputs or metadata.
pub fn array_node(target: Target, policy: ExecutionPolicy) -> Result<ArrayNode> {
    Ok(ArrayNode::new(target, policy, HashSet::new(), None)?)
}

/// Translate one mapped element, attributing failures to its index.
fn element_typed(field: &Field, index: usize, native: &Value) -> Result<TypedValue> {
    to_typed(&field.name, native, &field.ty).map_err(|err| match err {
        InputShapeError::TypeMismatch {
            field, expected, ..
        } => InputShapeError::ElementType {
            field,
            index,
            expected,
            found: crate::value::translate::native_kind(native).to_string(),
        }
        .into(),
        other => other.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;
    use async_trait::async_trait;

    struct Doubler {
        iface: Interface,
    }

    #[async_trait]
    impl Invocable for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        fn interface(&self) -> &Interface {
            &self.iface
        }

        async fn invoke(&self, inputs: TypedInputs) -> Result<Option<TypedValue>> {
            match inputs.get("x") {
                Some(TypedValue::Integer(x)) => Ok(Some(TypedValue::Integer(x * 2))),
                _ => Err(crate::ArrayFlowError::Invocation("bad input".to_string())),
            }
        }
    }

    fn doubler_with(iface: Interface) -> Target {
        Target::Plan(Arc::new(Doubler { iface }))
    }

    fn doubler() -> Target {
        doubler_with(
            Interface::new()
                .input("x", ValueType::Integer)
                .output("o0", ValueType::Integer),
        )
    }

    #[test]
    fn test_construction_rejects_multiple_outputs() {
        let target = doubler_with(
            Interface::new()
                .input("x", ValueType::Integer)
                .output("o0", ValueType::Integer)
                .output("o1", ValueType::Integer),
        );
        let err = ArrayNode::new(target, ExecutionPolicy::default(), HashSet::new(), None)
            .unwrap_err();
        assert_eq!(err, ConstructionError::MultipleOutputs { count: 2 });
    }

    #[test]
    fn test_construction_rejects_unknown_execution_version() {
        let err = ArrayNode::new(
            doubler(),
            ExecutionPolicy::default().with_execution_version(2),
            HashSet::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, ConstructionError::UnsupportedExecutionVersion { version: 2 });
    }

    #[test]
    fn test_construction_rejects_task_metadata_for_plan() {
        let err = ArrayNode::new(
            doubler(),
            ExecutionPolicy::default(),
            HashSet::new(),
            Some(ArrayNodeMetadata::Task(TaskMetadata::default())),
        )
        .unwrap_err();
        assert_eq!(err, ConstructionError::MetadataMismatch { kind: "plan" });
    }

    #[test]
    fn test_construction_accepts_node_metadata() {
        let node = ArrayNode::new(
            doubler(),
            ExecutionPolicy::default(),
            HashSet::new(),
            Some(ArrayNodeMetadata::Node(NodeMetadata::named("custom"))),
        )
        .unwrap();
        assert_eq!(node.construct_node_metadata().name, "custom");
    }

    #[test]
    fn test_default_node_metadata_uses_target_name() {
        let node = array_node(doubler(), ExecutionPolicy::default()).unwrap();
        assert_eq!(node.construct_node_metadata().name, "doubler");
    }

    #[test]
    fn test_derived_interface_wraps_output_only_under_partial_tolerance() {
        let strict = array_node(doubler(), ExecutionPolicy::default()).unwrap();
        assert_eq!(
            strict.interface().single_output().unwrap().ty,
            ValueType::Collection(Box::new(ValueType::Integer))
        );

        let tolerant = array_node(
            doubler(),
            ExecutionPolicy::default().with_min_success_ratio(0.5),
        )
        .unwrap();
        assert_eq!(
            tolerant.interface().single_output().unwrap().ty,
            ValueType::Collection(Box::new(ValueType::Optional(Box::new(ValueType::Integer))))
        );
    }

    #[test]
    fn test_facet_is_opaque() {
        let node = array_node(doubler(), ExecutionPolicy::default()).unwrap();
        let facet: &dyn GraphFacet = &node;
        assert_eq!(facet.name(), "doubler");
        assert!(facet.bindings().is_empty());
        assert!(facet.upstream_nodes().is_empty());
    }

    #[test]
    fn test_accessors_reflect_policy() {
        let node = ArrayNode::new(
            doubler(),
            ExecutionPolicy::default()
                .with_concurrency(3)
                .with_min_successes(2)
                .with_min_success_ratio(0.5),
            HashSet::new(),
            None,
        )
        .unwrap();
        assert_eq!(node.concurrency(), Some(3));
        assert_eq!(node.min_successes(), Some(2));
        assert_eq!(node.min_success_ratio(), Some(0.5));
        assert_eq!(node.execution_version(), 1);
    }

    #[tokio::test]
    async fn test_call_rejects_missing_mapped_field() {
        let node = array_node(doubler(), ExecutionPolicy::default()).unwrap();
        let err = node
            .call(&ExecutionContext::sequential(), HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ArrayFlowError::InputShape(InputShapeError::MissingField { .. })
        ));
    }

    #[tokio::test]
    async fn test_call_rejects_scalar_for_mapped_field() {
        let node = array_node(doubler(), ExecutionPolicy::default()).unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), serde_json::json!(1));
        let err = node
            .call(&ExecutionContext::sequential(), inputs)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ArrayFlowError::InputShape(InputShapeError::NotASequence { .. })
        ));
    }

    #[tokio::test]
    async fn test_call_rejects_empty_mapped_field() {
        let node = array_node(doubler(), ExecutionPolicy::default()).unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), serde_json::json!([]));
        let err = node
            .call(&ExecutionContext::sequential(), inputs)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ArrayFlowError::InputShape(InputShapeError::EmptySequence { .. })
        ));
    }

    #[tokio::test]
    async fn test_call_rejects_wrong_element_type_before_invoking() {
        let node = array_node(doubler(), ExecutionPolicy::default()).unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), serde_json::json!([1, "two", 3]));
        let err = node
            .call(&ExecutionContext::sequential(), inputs)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ArrayFlowError::InputShape(InputShapeError::ElementType { index: 1, .. })
        ));
    }
}
