//! Priority-preemptive task scheduling.
//!
//! A [`TaskScheduler`] keeps an execution stack of ready tasks and
//! decides which one runs, in the manner of an OSEK operating system.
//! It is a [`Component`](crate::director::Component): a director fires it
//! whenever the running task's execution segment ends, and every OSEK
//! service takes the director so elapsed time is charged correctly.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`TaskId`], [`ResourceId`] newtypes |
//! | [`status`] | [`OsError`] status codes, [`OsResult`] |
//! | [`record`] | [`Task`] record, [`TaskState`] |
//! | [`resource`] | [`ResourceTable`] |
//! | [`listener`] | [`ExecutionListener`], [`ExecutionTrace`], [`LogListener`] |
//! | [`scheduler`] | [`TaskScheduler`], [`ScheduleRequest`] |

pub mod id;
pub mod listener;
pub mod record;
pub mod resource;
pub mod scheduler;
pub mod status;

pub use id::{ResourceId, TaskId};
pub use listener::{ExecutionEventKind, ExecutionListener, ExecutionTrace, LogListener, TraceEntry};
pub use record::{Task, TaskState};
pub use resource::ResourceTable;
pub use scheduler::{ScheduleRequest, TaskScheduler};
pub use status::{status_code, OsError, OsResult};
