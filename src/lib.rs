//! # Kairos: Deterministic Discrete-Event Scheduling Core
//!
//! Building blocks for discrete-event models in superdense time: a
//! time-ordered event queue, delay components that shift signals in
//! model time, and an OSEK-style preemptive task scheduler. No async, no
//! threads, no wall-clock time; a director fires components one tag at
//! a time.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ Simulation / ManualDirector               │ ← owns the clock, honors fire_at
//! │  ┌─────────────────────────────────────┐  │
//! │  │ Components (initialize/fire/postfire)│  │
//! │  │  ┌──────────────┐ ┌──────────────┐  │  │
//! │  │  │ DelayElement │ │ TaskScheduler│  │  │
//! │  │  │ TimedDelay   │ │  + resources │  │  │
//! │  │  └──────┬───────┘ └──────────────┘  │  │
//! │  │  ┌──────┴───────┐                   │  │
//! │  │  │ EventQueue   │ ← min-heap of TimedEvents
//! │  │  └──────────────┘                   │  │
//! │  └─────────────────────────────────────┘  │
//! │   ModelTime / Tag                         │ ← fixed-point superdense time
//! └───────────────────────────────────────────┘
//! ```

pub mod config;
pub mod delay;
pub mod director;
pub mod error;
pub mod event;
pub mod queue;
pub mod simulation;
pub mod task;
pub mod time;

// Re-exports for convenience.
pub use config::{DelayConfig, SchedulerConfig, TaskConfig};
pub use delay::{DelayElement, Hold, Interpolate, Signal, TimedDelay};
pub use director::{Component, ComponentId, Director, ManualDirector};
pub use error::{KairosError, KairosResult};
pub use event::{EventId, TimedEvent};
pub use queue::EventQueue;
pub use simulation::{FiringHandler, Simulation, SimulationContext};
pub use task::{
    ExecutionEventKind, ExecutionListener, ExecutionTrace, OsError, OsResult, ScheduleRequest,
    TaskId, TaskScheduler, TaskState,
};
pub use time::{ModelTime, Tag};
