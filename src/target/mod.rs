//! Invocable target entities
//!
//! A target is the single, already-registered computational unit an array
//! node maps over. Targets come in kinds, modelled as a tagged enum so
//! construction can match exhaustively and reject unrecognized kinds
//! instead of inspecting types at runtime. Today the only supported kind
//! is [`Target::Plan`], a closed launch-plan-like entity.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::interface::Interface;
use crate::value::{TypedInputs, TypedValue};
use crate::Result;

/// Capability set every invocable entity kind exposes
#[async_trait]
pub trait Invocable: Send + Sync {
    /// Stable registered name of the entity
    fn name(&self) -> &str;

    /// The entity's declared scalar interface
    fn interface(&self) -> &Interface;

    /// Invoke the entity once with a typed input bundle.
    ///
    /// Returns `Ok(Some(value))` for an entity with a declared output,
    /// `Ok(None)` for a void entity, or an error if the invocation itself
    /// failed.
    async fn invoke(&self, inputs: TypedInputs) -> Result<Option<TypedValue>>;
}

/// Tagged kinds of invocable entities
#[derive(Clone)]
pub enum Target {
    /// A closed, registered plan entity
    Plan(Arc<dyn Invocable>),
}

impl Target {
    /// The underlying invocable entity
    pub fn entity(&self) -> Arc<dyn Invocable> {
        match self {
            Target::Plan(entity) => Arc::clone(entity),
        }
    }

    /// Registered name of the target
    pub fn name(&self) -> String {
        match self {
            Target::Plan(entity) => entity.name().to_string(),
        }
    }

    /// The target's declared scalar interface
    pub fn interface(&self) -> Interface {
        match self {
            Target::Plan(entity) => entity.interface().clone(),
        }
    }

    /// Kind label used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Target::Plan(_) => "plan",
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

/// Metadata describing a task-kind entity
///
/// Present for parity with the metadata construction parameter; a plan
/// target requires node metadata, and supplying this variant instead is a
/// construction error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Number of retries the backend may attempt per task
    pub retries: u32,

    /// Per-task timeout
    pub timeout: Option<Duration>,

    /// Whether the task may be preempted
    pub interruptible: bool,
}
