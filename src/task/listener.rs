//! Observers of task START/STOP events.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use crate::time::ModelTime;

use super::id::TaskId;

/// What happened to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionEventKind {
    /// The task became the running task.
    Start,
    /// The task stopped running (preempted, finished, or waiting).
    Stop,
}

/// Receives START/STOP notifications from a `TaskScheduler`.
pub trait ExecutionListener {
    fn on_event(&mut self, task: TaskId, time: ModelTime, kind: ExecutionEventKind);
}

/// Share a listener with the scheduler while keeping a handle to it.
impl<L: ExecutionListener> ExecutionListener for Rc<RefCell<L>> {
    fn on_event(&mut self, task: TaskId, time: ModelTime, kind: ExecutionEventKind) {
        self.borrow_mut().on_event(task, time, kind);
    }
}

/// A single recorded notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry {
    pub time: ModelTime,
    pub task: TaskId,
    pub kind: ExecutionEventKind,
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}] {:?}", self.time, self.task, self.kind)
    }
}

/// Records every notification in order.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ExecutionTrace {
    pub entries: Vec<TraceEntry>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(task, kind)` pairs without times, handy in assertions.
    pub fn events(&self) -> Vec<(TaskId, ExecutionEventKind)> {
        self.entries.iter().map(|e| (e.task, e.kind)).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl ExecutionListener for ExecutionTrace {
    fn on_event(&mut self, task: TaskId, time: ModelTime, kind: ExecutionEventKind) {
        self.entries.push(TraceEntry { time, task, kind });
    }
}

/// Forwards notifications to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl ExecutionListener for LogListener {
    fn on_event(&mut self, task: TaskId, time: ModelTime, kind: ExecutionEventKind) {
        info!(%task, %time, ?kind, "task execution");
    }
}
