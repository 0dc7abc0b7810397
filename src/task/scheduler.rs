//! Fixed-priority preemptive CPU scheduler.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, trace, warn};

use crate::config::SchedulerConfig;
use crate::director::{Component, ComponentId, Director};
use crate::error::KairosResult;
use crate::time::ModelTime;

use super::id::{ResourceId, TaskId};
use super::listener::{ExecutionEventKind, ExecutionListener};
use super::record::{Task, TaskState};
use super::resource::ResourceTable;
use super::status::{OsError, OsResult};

/// A state change for one task, delivered through [`TaskScheduler::submit`]
/// and applied at the scheduler's next firing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleRequest {
    pub task: TaskId,
    /// Known execution time of the task's next segment.
    pub execution_time: Option<ModelTime>,
    /// Target state; `None` keeps the current state.
    pub state: Option<TaskState>,
}

impl ScheduleRequest {
    /// Make `task` ready with a known execution time.
    pub fn ready(task: TaskId, execution_time: ModelTime) -> Self {
        ScheduleRequest {
            task,
            execution_time: Some(execution_time),
            state: Some(TaskState::ReadyRunning),
        }
    }

    /// Record the execution time of `task` without changing its state.
    pub fn execution_time(task: TaskId, execution_time: ModelTime) -> Self {
        ScheduleRequest {
            task,
            execution_time: Some(execution_time),
            state: None,
        }
    }

    /// Move `task` to `state`.
    pub fn transition(task: TaskId, state: TaskState) -> Self {
        ScheduleRequest {
            task,
            execution_time: None,
            state: Some(state),
        }
    }
}

/// An OSEK-style CPU scheduler.
///
/// Ready tasks live on an execution stack whose top is the running task.
/// A newly ready task with a strictly higher priority than the running
/// one preempts it. Otherwise it is inserted below the top at its
/// priority position, after tasks of equal priority.
///
/// A task with an internal resource runs at the ceiling priority of its
/// group (the highest priority among the tasks sharing that resource),
/// from the moment it reaches the top until it waits, terminates or
/// yields. Members of its own group therefore never preempt it, and
/// neither does any task ranked at or below the ceiling.
///
/// Model time spent while a task is on top is charged to it. A task with
/// a known execution time finishes its segment once that time is used
/// up, and is then dispatched again for its next segment. Every time a
/// task reaches the top without having been started it is dispatched:
/// its id is appended to [`TaskScheduler::take_dispatched`].
///
/// Every service call takes the director so the scheduler can account
/// for elapsed time and request a firing for the end of the running
/// segment.
pub struct TaskScheduler {
    id: ComponentId,
    tasks: Vec<Task>,
    index: BTreeMap<TaskId, usize>,
    /// Indices into `tasks`; the last element is the running task.
    stack: Vec<usize>,
    /// Highest priority among the tasks sharing each internal resource.
    ceilings: BTreeMap<ResourceId, i32>,
    resources: ResourceTable,
    previous_time: ModelTime,
    next_fire_at: Option<ModelTime>,
    /// Validated requests, with the index of their task.
    requests: VecDeque<(usize, ScheduleRequest)>,
    dispatched: Vec<TaskId>,
    listeners: Vec<Box<dyn ExecutionListener>>,
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("id", &self.id)
            .field("stack", &self.stack_ids())
            .field("previous_time", &self.previous_time)
            .field("next_fire_at", &self.next_fire_at)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl TaskScheduler {
    /// Build a scheduler from a validated configuration.
    pub fn new(id: ComponentId, config: &SchedulerConfig) -> KairosResult<Self> {
        config.validate()?;
        let tasks: Vec<Task> = config.tasks.iter().map(Task::from_config).collect();
        let index = tasks.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        let mut ceilings: BTreeMap<ResourceId, i32> = BTreeMap::new();
        for task in &tasks {
            if let Some(group) = task.internal_resource {
                let ceiling = ceilings.entry(group).or_insert(task.priority);
                *ceiling = (*ceiling).max(task.priority);
            }
        }
        Ok(TaskScheduler {
            id,
            tasks,
            index,
            stack: Vec::new(),
            ceilings,
            resources: ResourceTable::new(config.resources.iter().copied()),
            previous_time: ModelTime::ZERO,
            next_fire_at: None,
            requests: VecDeque::new(),
            dispatched: Vec::new(),
            listeners: Vec::new(),
        })
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Register an observer of START/STOP events.
    pub fn add_listener(&mut self, listener: impl ExecutionListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn task(&self, task: TaskId) -> Option<&Task> {
        self.index.get(&task).map(|&i| &self.tasks[i])
    }

    pub fn state(&self, task: TaskId) -> Option<TaskState> {
        self.task(task).map(|t| t.state)
    }

    /// The task on top of the execution stack.
    pub fn running(&self) -> Option<TaskId> {
        self.top().map(|i| self.tasks[i].id)
    }

    /// Execution stack from bottom to top.
    pub fn stack_ids(&self) -> Vec<TaskId> {
        self.stack.iter().map(|&i| self.tasks[i].id).collect()
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// The firing time most recently requested from the director.
    pub fn next_fire_at(&self) -> Option<ModelTime> {
        self.next_fire_at
    }

    /// Dispatch signals emitted so far, oldest first.
    pub fn dispatched(&self) -> &[TaskId] {
        &self.dispatched
    }

    pub fn take_dispatched(&mut self) -> Vec<TaskId> {
        std::mem::take(&mut self.dispatched)
    }

    // ── Task management ───────────────────────────────────────

    /// Move a suspended task to ready.
    pub fn activate_task(&mut self, director: &mut dyn Director, task: TaskId) -> OsResult {
        self.service(director, |s| {
            let idx = s.lookup(task)?;
            if s.tasks[idx].state != TaskState::Suspended {
                return Err(OsError::Limit);
            }
            s.tasks[idx].activations += 1;
            s.reschedule(idx, TaskState::ReadyRunning, None);
            Ok(())
        })
    }

    /// Suspend the calling task, which must be the running one.
    pub fn terminate_task(&mut self, director: &mut dyn Director, caller: TaskId) -> OsResult {
        self.service(director, |s| {
            let idx = s.lookup(caller)?;
            if s.top() != Some(idx) {
                return Err(OsError::CallLevel);
            }
            s.check_transition(idx, TaskState::Suspended, None)?;
            s.reschedule(idx, TaskState::Suspended, None);
            Ok(())
        })
    }

    /// Suspend the caller and activate `task` as one step.
    ///
    /// Listeners and dispatch only see the outcome, never the
    /// intermediate stack.
    pub fn chain_task(&mut self, director: &mut dyn Director, caller: TaskId, task: TaskId) -> OsResult {
        self.service(director, |s| {
            let from = s.lookup(caller)?;
            let to = s.lookup(task)?;
            if s.top() != Some(from) {
                return Err(OsError::CallLevel);
            }
            s.check_transition(from, TaskState::Suspended, None)?;
            if to != from && s.tasks[to].state != TaskState::Suspended {
                return Err(OsError::Limit);
            }
            s.reschedule(from, TaskState::Suspended, None);
            s.tasks[to].activations += 1;
            s.reschedule(to, TaskState::ReadyRunning, None);
            Ok(())
        })
    }

    /// Rescheduling point (OSEK `Schedule`).
    ///
    /// If the caller runs and a strictly higher-priority task is ready
    /// below it (held back by a shared internal resource), the caller
    /// steps aside for it.
    pub fn yield_point(&mut self, director: &mut dyn Director, caller: TaskId) -> OsResult {
        self.service(director, |s| {
            let idx = s.lookup(caller)?;
            if s.top() != Some(idx) {
                return Ok(());
            }
            let priority = s.tasks[idx].priority;
            let below = &s.stack[..s.stack.len() - 1];
            if below.iter().any(|&i| s.effective_priority(i) > priority) {
                // Above its equals, so it still runs before them.
                let pos = below
                    .iter()
                    .position(|&i| s.effective_priority(i) > priority)
                    .unwrap_or(below.len());
                s.stack.pop();
                s.stack.insert(pos, idx);
                s.tasks[idx].raised = false;
                debug!(task = %caller, "yielded at rescheduling point");
            }
            Ok(())
        })
    }

    /// Apply a state change immediately.
    ///
    /// - a waiting task that stays waiting only has its execution time
    ///   recorded;
    /// - `Waiting` or `Suspended` take the task off the execution stack;
    /// - `ReadyRunning` puts it on the stack (preempting if it outranks the
    ///   running task), or, if it is already there, sets its remaining time
    ///   to `execution_time` minus the time it has already used.
    ///
    /// Suspending a task that holds resources fails with `E_OS_RESOURCE`,
    /// sending a suspended task to `Waiting` with `E_OS_STATE`, and a
    /// negative execution time with `E_OS_VALUE`.
    pub fn schedule(
        &mut self,
        director: &mut dyn Director,
        task: TaskId,
        execution_time: Option<ModelTime>,
        state: TaskState,
    ) -> OsResult {
        self.service(director, |s| {
            let idx = s.lookup(task)?;
            s.check_transition(idx, state, execution_time)?;
            s.reschedule(idx, state, execution_time);
            Ok(())
        })
    }

    // ── Resource management ───────────────────────────────────

    pub fn get_resource(&mut self, director: &mut dyn Director, caller: TaskId, resource: ResourceId) -> OsResult {
        self.service(director, |s| {
            s.lookup(caller)?;
            s.resources.get(caller, resource)
        })
    }

    pub fn release_resource(
        &mut self,
        director: &mut dyn Director,
        caller: TaskId,
        resource: ResourceId,
    ) -> OsResult {
        self.service(director, |s| {
            s.lookup(caller)?;
            s.resources.release(caller, resource)
        })
    }

    // ── Deferred requests ─────────────────────────────────────

    /// Queue a request for the next firing, and ask to be fired now.
    ///
    /// An unknown task is rejected here with `E_OS_ID`. The remaining
    /// checks of [`TaskScheduler::schedule`] run when the request is
    /// applied, since the task's state may change in between.
    pub fn submit(&mut self, director: &mut dyn Director, request: ScheduleRequest) -> OsResult {
        let idx = self.lookup(request.task)?;
        trace!(task = %request.task, "schedule request queued");
        self.requests.push_back((idx, request));
        let now = director.model_time();
        if let Err(e) = director.fire_at(self.id, now) {
            warn!(component = %self.id, error = %e, "director refused firing for request");
        }
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────

    fn lookup(&self, task: TaskId) -> Result<usize, OsError> {
        self.index.get(&task).copied().ok_or(OsError::Id)
    }

    fn top(&self) -> Option<usize> {
        self.stack.last().copied()
    }

    /// Priority a task competes with: its group's ceiling while it runs, or
    /// while it sits preempted after having run, and its own otherwise.
    fn effective_priority(&self, idx: usize) -> i32 {
        let task = &self.tasks[idx];
        match task.internal_resource {
            Some(group) if task.raised || self.top() == Some(idx) => {
                self.ceilings.get(&group).copied().unwrap_or(task.priority)
            }
            _ => task.priority,
        }
    }

    /// Reject state changes that would break an OSEK rule.
    fn check_transition(&self, idx: usize, state: TaskState, execution_time: Option<ModelTime>) -> OsResult {
        if execution_time.is_some_and(|t| t.is_negative()) {
            return Err(OsError::Value);
        }
        let task = &self.tasks[idx];
        match state {
            TaskState::Suspended if !self.resources.held_by(task.id).is_empty() => Err(OsError::Resource),
            TaskState::Waiting if task.state == TaskState::Suspended => Err(OsError::State),
            _ => Ok(()),
        }
    }

    /// Run one atomic service: account for elapsed time, apply `op`,
    /// then report the change of running task and request a refiring.
    fn service<F>(&mut self, director: &mut dyn Director, op: F) -> OsResult
    where
        F: FnOnce(&mut Self) -> OsResult,
    {
        let now = director.model_time();
        self.advance_to(now);
        let before = self.top();
        let result = op(self);
        self.settle(before, now);
        self.request_refire(director);
        result
    }

    /// Charge the time since the previous call to the running task.
    fn advance_to(&mut self, now: ModelTime) {
        let passed = now - self.previous_time;
        self.previous_time = now;
        let Some(top) = self.top() else {
            return;
        };

        let task = &mut self.tasks[top];
        if task.remaining.is_infinite() {
            task.used = task.used + passed;
            return;
        }
        task.remaining = (task.remaining - passed).max(ModelTime::ZERO);
        if task.remaining == ModelTime::ZERO {
            debug!(task = %task.id, time = %now, "execution segment finished");
            task.started = false;
            task.remaining = ModelTime::POSITIVE_INFINITY;
            task.used = ModelTime::ZERO;
            self.notify(top, now, ExecutionEventKind::Stop);
            self.notify(top, now, ExecutionEventKind::Start);
            self.dispatch(top);
        }
    }

    /// Apply a state change to the execution stack. Emits nothing.
    fn reschedule(&mut self, idx: usize, state: TaskState, execution_time: Option<ModelTime>) {
        let previous = self.tasks[idx].state;
        trace!(task = %self.tasks[idx].id, from = %previous, to = %state, "reschedule");

        if previous == TaskState::Waiting && state == TaskState::Waiting {
            if let Some(exec) = execution_time {
                self.tasks[idx].remaining = exec;
            }
            return;
        }

        match state {
            TaskState::Waiting | TaskState::Suspended => {
                self.stack.retain(|&i| i != idx);
                self.tasks[idx].raised = false;
                if state == TaskState::Suspended {
                    let task = &mut self.tasks[idx];
                    task.started = false;
                    task.remaining = ModelTime::POSITIVE_INFINITY;
                    task.used = ModelTime::ZERO;
                } else if let Some(exec) = execution_time {
                    self.tasks[idx].remaining = exec;
                }
            }
            TaskState::ReadyRunning => {
                if self.stack.contains(&idx) {
                    if let Some(exec) = execution_time {
                        let task = &mut self.tasks[idx];
                        task.remaining = (exec - task.used).max(ModelTime::ZERO);
                        task.used = ModelTime::ZERO;
                    }
                } else {
                    self.insert(idx);
                    let task = &mut self.tasks[idx];
                    if let Some(exec) = execution_time {
                        task.remaining = exec;
                    }
                    task.used = ModelTime::ZERO;
                }
            }
        }
        self.tasks[idx].state = state;
    }

    /// Put a newly ready task on the stack.
    fn insert(&mut self, idx: usize) {
        let Some(top) = self.top() else {
            self.stack.push(idx);
            return;
        };
        let priority = self.tasks[idx].priority;
        if priority > self.effective_priority(top) {
            debug!(task = %self.tasks[idx].id, preempted = %self.tasks[top].id, "preemption");
            self.stack.push(idx);
            return;
        }
        let limit = self.stack.len() - 1;
        let pos = self.stack[..limit]
            .iter()
            .position(|&i| self.effective_priority(i) >= priority)
            .unwrap_or(limit);
        self.stack.insert(pos, idx);
    }

    /// Report a change of running task and dispatch the new one if needed.
    fn settle(&mut self, before: Option<usize>, now: ModelTime) {
        let after = self.top();
        if let Some(new) = after {
            self.tasks[new].raised = true;
        }
        if before != after {
            if let Some(old) = before {
                self.notify(old, now, ExecutionEventKind::Stop);
            }
            if let Some(new) = after {
                self.notify(new, now, ExecutionEventKind::Start);
            }
        }
        if let Some(new) = after {
            if !self.tasks[new].started {
                self.dispatch(new);
            }
        }
    }

    fn dispatch(&mut self, idx: usize) {
        let task = &mut self.tasks[idx];
        task.started = true;
        debug!(task = %task.id, time = %self.previous_time, "dispatch");
        self.dispatched.push(task.id);
    }

    fn notify(&mut self, idx: usize, time: ModelTime, kind: ExecutionEventKind) {
        let task = self.tasks[idx].id;
        for listener in &mut self.listeners {
            listener.on_event(task, time, kind);
        }
    }

    /// Ask to be fired when the running segment ends, once per time.
    fn request_refire(&mut self, director: &mut dyn Director) {
        let Some(top) = self.top() else {
            return;
        };
        let remaining = self.tasks[top].remaining;
        if remaining.is_infinite() {
            return;
        }
        let at = director.model_time() + remaining;
        if self.next_fire_at == Some(at) {
            return;
        }
        match director.fire_at(self.id, at) {
            Ok(tag) => {
                debug!(component = %self.id, %tag, "scheduler refire requested");
                self.next_fire_at = Some(at);
            }
            Err(e) => warn!(component = %self.id, error = %e, "director refused refire"),
        }
    }
}

impl Component for TaskScheduler {
    /// Reset every task and the resource table, then activate the
    /// autostart tasks in configuration order.
    fn initialize(&mut self, director: &mut dyn Director) -> KairosResult<()> {
        let now = director.model_time();
        for task in &mut self.tasks {
            task.reset();
        }
        self.stack.clear();
        self.resources.reset();
        self.previous_time = now;
        self.next_fire_at = None;
        self.requests.clear();
        self.dispatched.clear();

        for idx in 0..self.tasks.len() {
            if self.tasks[idx].autostart {
                self.tasks[idx].activations += 1;
                self.reschedule(idx, TaskState::ReadyRunning, None);
            }
        }
        self.settle(None, now);
        self.request_refire(director);
        Ok(())
    }

    fn fire(&mut self, director: &mut dyn Director) -> KairosResult<()> {
        let now = director.model_time();
        if self.next_fire_at.is_some_and(|t| !now.is_before(t)) {
            self.next_fire_at = None;
        }
        self.advance_to(now);

        let before = self.top();
        while let Some((idx, request)) = self.requests.pop_front() {
            let state = request.state.unwrap_or(self.tasks[idx].state);
            if let Err(e) = self.check_transition(idx, state, request.execution_time) {
                warn!(task = %request.task, to = %state, error = %e, "schedule request refused");
                continue;
            }
            self.reschedule(idx, state, request.execution_time);
        }
        self.settle(before, now);
        self.request_refire(director);
        Ok(())
    }

    fn postfire(&mut self, _director: &mut dyn Director) -> KairosResult<bool> {
        Ok(true)
    }
}
