//! Execution policy and the failure budget
//!
//! The policy fixes the partial-success budget and the batching width for
//! a fan-out call. Thresholds resolve once per call: an explicit
//! `min_successes` always wins, otherwise `ceil(N * min_success_ratio)`,
//! otherwise `N` (zero tolerance). The budget itself is a monotone failure
//! counter consulted after every sub-invocation outcome.

use serde::{Deserialize, Serialize};

/// The only execution version currently defined
pub const EXECUTION_VERSION: u32 = 1;

/// Partial-success and batching policy for an array node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    /// Batch width: `None` inherits ambient parallelism, `0` is unbounded,
    /// `k > 0` caps simultaneous sub-invocations at `k`
    pub concurrency: Option<usize>,

    /// Absolute minimum number of successful sub-invocations; wins over
    /// the ratio when both are set
    pub min_successes: Option<usize>,

    /// Minimum success fraction in (0, 1]; the threshold is
    /// `ceil(N * ratio)`
    pub min_success_ratio: Option<f64>,

    /// Execution protocol version; only version 1 is defined
    pub execution_version: u32,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            concurrency: None,
            min_successes: None,
            min_success_ratio: None,
            execution_version: EXECUTION_VERSION,
        }
    }
}

impl ExecutionPolicy {
    /// Set the batch width
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Set the absolute minimum-success threshold
    pub fn with_min_successes(mut self, min_successes: usize) -> Self {
        self.min_successes = Some(min_successes);
        self
    }

    /// Set the minimum success ratio
    pub fn with_min_success_ratio(mut self, ratio: f64) -> Self {
        self.min_success_ratio = Some(ratio);
        self
    }

    /// Set the execution version
    pub fn with_execution_version(mut self, version: u32) -> Self {
        self.execution_version = version;
        self
    }

    /// Resolve the effective minimum-success threshold for a fan-out of
    /// width `n`.
    pub fn effective_min_successes(&self, n: usize) -> usize {
        if let Some(min) = self.min_successes {
            min
        } else if let Some(ratio) = self.min_success_ratio {
            (n as f64 * ratio).ceil() as usize
        } else {
            n
        }
    }

    /// True when tolerated failures can appear in the output, i.e. a
    /// success ratio other than 1 is configured. Only then is the output
    /// element type Optional-wrapped.
    pub fn tolerates_partial_output(&self) -> bool {
        matches!(self.min_success_ratio, Some(ratio) if ratio != 1.0)
    }
}

/// Decision returned by the budget after recording a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetState {
    /// Remaining sub-invocations can still reach the threshold
    Continue,

    /// The threshold is mathematically unreachable; abort
    Exhausted,
}

/// Monotone failure accounting for one fan-out call
///
/// Counting rather than predicting: the construct keeps trying until the
/// budget is mathematically exhausted, so every still-reachable success is
/// attempted before giving up.
#[derive(Debug, Clone)]
pub struct FailureBudget {
    n: usize,
    effective_min: usize,
    failed: usize,
}

impl FailureBudget {
    /// Create a budget for `n` sub-invocations with a resolved threshold
    pub fn new(n: usize, effective_min: usize) -> Self {
        Self {
            n,
            effective_min,
            failed: 0,
        }
    }

    /// Record one failed sub-invocation and report whether the threshold
    /// is still reachable.
    pub fn record_failure(&mut self) -> BudgetState {
        self.failed += 1;
        if self.n - self.failed < self.effective_min {
            BudgetState::Exhausted
        } else {
            BudgetState::Continue
        }
    }

    /// Failures recorded so far
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// The resolved minimum-success threshold
    pub fn effective_min(&self) -> usize {
        self.effective_min
    }
}
