//! Fan-out execution engines
//!
//! The sequential engine defines the reference semantics: indices run in
//! order, outcomes feed the failure budget one at a time, and the call
//! aborts with the triggering failure the moment the budget is exhausted.
//! The concurrent engine runs sub-invocations in batches but folds their
//! outcomes in index order through the same budget, so its aggregated
//! content and abort behavior are indistinguishable from the reference.

use std::sync::Arc;

use futures::future;
use tracing::{debug, error, instrument, warn};

use crate::policy::{BudgetState, FailureBudget};
use crate::target::Invocable;
use crate::value::{TypedInputs, TypedValue};
use crate::{ArrayFlowError, Result};

/// How sub-invocations are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Reference semantics: one sub-invocation at a time, in index order
    Sequential,

    /// Batched execution on spawned tasks
    Concurrent {
        /// Parallelism inherited when the policy leaves concurrency unset
        ambient_parallelism: usize,
    },
}

/// Explicit execution context threaded through every call
///
/// Execution mode is a function argument, not ambient global state; the
/// caller decides how a fan-out runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Scheduling mode for this call
    pub mode: ExecutionMode,
}

impl ExecutionContext {
    /// Sequential reference execution
    pub fn sequential() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
        }
    }

    /// Concurrent execution with ambient parallelism from the host
    pub fn concurrent() -> Self {
        Self {
            mode: ExecutionMode::Concurrent {
                ambient_parallelism: num_cpus::get(),
            },
        }
    }

    /// Concurrent execution with an explicit ambient parallelism
    pub fn concurrent_with_parallelism(parallelism: usize) -> Self {
        Self {
            mode: ExecutionMode::Concurrent {
                ambient_parallelism: parallelism,
            },
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::concurrent()
    }
}

/// Aggregated result of a completed fan-out call
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayOutput {
    /// Index-aligned output collection; tolerated failures hold the
    /// none-sentinel
    Collection(Vec<TypedValue>),

    /// Acknowledgement for a void target
    Void {
        /// Name of the node that completed
        node: String,
    },
}

impl ArrayOutput {
    /// The aggregated collection, if the target declares an output
    pub fn collection(&self) -> Option<&[TypedValue]> {
        match self {
            ArrayOutput::Collection(values) => Some(values),
            ArrayOutput::Void { .. } => None,
        }
    }

    /// True for a void acknowledgement
    pub fn is_void(&self) -> bool {
        matches!(self, ArrayOutput::Void { .. })
    }
}

/// Outcome of one sub-invocation
///
/// Failures are values here, not raised errors; the budget-tracking loop
/// stays exception-free and only the triggering failure is converted to an
/// error at the abort boundary.
enum Outcome {
    Success(Option<TypedValue>),
    Failed(ArrayFlowError),
}

/// One prepared fan-out call, ready to run
pub(crate) struct FanOut {
    /// Entity to invoke per index
    pub target: Arc<dyn Invocable>,

    /// Node name, for logging and the void acknowledgement
    pub node_name: String,

    /// Per-index typed input bundles; length fixes N
    pub invocations: Vec<TypedInputs>,

    /// Resolved minimum-success threshold
    pub effective_min: usize,

    /// Whether the target declares an output
    pub outputs_expected: bool,

    /// Batch width from the policy
    pub concurrency: Option<usize>,
}

impl FanOut {
    /// Run the fan-out under the given context.
    #[instrument(
        skip(self, ctx),
        fields(node = %self.node_name, n = self.invocations.len(), min = self.effective_min)
    )]
    pub async fn run(self, ctx: &ExecutionContext) -> Result<ArrayOutput> {
        match ctx.mode {
            ExecutionMode::Sequential => self.run_sequential().await,
            ExecutionMode::Concurrent {
                ambient_parallelism,
            } => self.run_concurrent(ambient_parallelism).await,
        }
    }

    /// Reference engine: index order, one at a time.
    async fn run_sequential(self) -> Result<ArrayOutput> {
        let FanOut {
            target,
            node_name,
            invocations,
            effective_min,
            outputs_expected,
            ..
        } = self;

        let n = invocations.len();
        let mut budget = FailureBudget::new(n, effective_min);
        let mut results = Vec::with_capacity(n);

        for (index, inputs) in invocations.into_iter().enumerate() {
            let outcome = invoke_once(&target, index, inputs).await;
            record_outcome(
                &node_name,
                outputs_expected,
                &mut budget,
                &mut results,
                index,
                outcome,
            )?;
        }

        debug!(node = %node_name, n, failed = budget.failed(), "fan-out completed");
        Ok(finish(node_name, outputs_expected, results))
    }

    /// Batched engine: up to `width` sub-invocations run simultaneously on
    /// spawned tasks; outcomes are folded in index order through the same
    /// budget as the sequential engine. Once the budget is exhausted the
    /// fold stops, remaining outcomes of the batch are dropped unappended,
    /// and no later batch is started.
    async fn run_concurrent(self, ambient_parallelism: usize) -> Result<ArrayOutput> {
        let FanOut {
            target,
            node_name,
            invocations,
            effective_min,
            outputs_expected,
            concurrency,
        } = self;

        let n = invocations.len();
        let width = match concurrency {
            Some(0) => n.max(1),
            Some(k) => k,
            None => ambient_parallelism.max(1),
        };
        debug!(node = %node_name, n, width, "running batched fan-out");

        let mut budget = FailureBudget::new(n, effective_min);
        let mut results = Vec::with_capacity(n);
        let mut remaining = invocations.into_iter().enumerate();

        loop {
            let batch: Vec<(usize, TypedInputs)> = remaining.by_ref().take(width).collect();
            if batch.is_empty() {
                break;
            }

            let mut handles = Vec::with_capacity(batch.len());
            for (index, inputs) in batch {
                let target = Arc::clone(&target);
                handles.push(tokio::spawn(async move {
                    let outcome = invoke_once(&target, index, inputs).await;
                    (index, outcome)
                }));
            }

            // join_all preserves spawn order, so the fold sees outcomes in
            // index order within each batch
            for joined in future::join_all(handles).await {
                let (index, outcome) = joined?;
                record_outcome(
                    &node_name,
                    outputs_expected,
                    &mut budget,
                    &mut results,
                    index,
                    outcome,
                )?;
            }
        }

        debug!(node = %node_name, n, failed = budget.failed(), "fan-out completed");
        Ok(finish(node_name, outputs_expected, results))
    }
}

async fn invoke_once(target: &Arc<dyn Invocable>, index: usize, inputs: TypedInputs) -> Outcome {
    debug!(index, "sub-invocation starting");
    match target.invoke(inputs).await {
        Ok(value) => Outcome::Success(value),
        Err(err) => Outcome::Failed(err),
    }
}

/// Fold one outcome into the result sequence and the budget.
///
/// Returns the triggering failure as `Err` exactly when the budget is
/// exhausted; every earlier tolerated failure is absorbed into the
/// none-sentinel.
fn record_outcome(
    node: &str,
    outputs_expected: bool,
    budget: &mut FailureBudget,
    results: &mut Vec<TypedValue>,
    index: usize,
    outcome: Outcome,
) -> Result<()> {
    match outcome {
        Outcome::Success(value) => {
            if outputs_expected {
                match value {
                    Some(value) => results.push(value),
                    None => {
                        return Err(ArrayFlowError::Internal(format!(
                            "target '{}' declared an output but returned none at index {}",
                            node, index
                        )))
                    }
                }
            }
            Ok(())
        }
        Outcome::Failed(err) => {
            if outputs_expected {
                results.push(TypedValue::None);
            }
            match budget.record_failure() {
                BudgetState::Continue => {
                    warn!(
                        node,
                        index,
                        failed = budget.failed(),
                        error = %err,
                        "sub-invocation failed within budget"
                    );
                    Ok(())
                }
                BudgetState::Exhausted => {
                    error!(
                        node,
                        index,
                        failed = budget.failed(),
                        min_successes = budget.effective_min(),
                        "the number of successful tasks is lower than the minimum"
                    );
                    Err(err)
                }
            }
        }
    }
}

fn finish(node_name: String, outputs_expected: bool, results: Vec<TypedValue>) -> ArrayOutput {
    if outputs_expected {
        ArrayOutput::Collection(results)
    } else {
        ArrayOutput::Void { node: node_name }
    }
}
