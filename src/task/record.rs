//! Task state and the per-task record kept by the scheduler.

use crate::config::TaskConfig;
use crate::time::ModelTime;

use super::id::{ResourceId, TaskId};

/// OSEK task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskState {
    /// Ready, or running if it is on top of the execution stack.
    ReadyRunning,
    /// Blocked on an event; not on the execution stack.
    Waiting,
    /// Not activated.
    Suspended,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::ReadyRunning => write!(f, "ready/running"),
            TaskState::Waiting => write!(f, "waiting"),
            TaskState::Suspended => write!(f, "suspended"),
        }
    }
}

/// Everything the scheduler knows about one task.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub priority: i32,
    pub internal_resource: Option<ResourceId>,
    pub autostart: bool,
    pub state: TaskState,
    /// Execution time left in the current segment; `+inf` when unknown.
    pub remaining: ModelTime,
    /// Execution time consumed while `remaining` was unknown.
    pub used: ModelTime,
    /// Dispatched and not yet finished with the current segment.
    pub started: bool,
    /// Running at its internal resource's ceiling; stays set while
    /// preempted.
    pub raised: bool,
    pub activations: u64,
}

impl Task {
    pub(crate) fn from_config(config: &TaskConfig) -> Self {
        Task {
            id: config.id,
            name: config.name.clone(),
            priority: config.priority,
            internal_resource: config.internal_resource,
            autostart: config.autostart,
            state: TaskState::Suspended,
            remaining: ModelTime::POSITIVE_INFINITY,
            used: ModelTime::ZERO,
            started: false,
            raised: false,
            activations: 0,
        }
    }

    /// Back to the freshly configured state.
    pub(crate) fn reset(&mut self) {
        self.state = TaskState::Suspended;
        self.remaining = ModelTime::POSITIVE_INFINITY;
        self.used = ModelTime::ZERO;
        self.started = false;
        self.raised = false;
        self.activations = 0;
    }
}
