//! Delay components.
//!
//! | Type | Behavior |
//! |---|---|
//! | [`DelayElement`] | delays a sampled signal, interpolating between samples |
//! | [`TimedDelay`] | re-emits discrete events after a fixed delay |
//!
//! Both take a [`DelayConfig`](crate::config::DelayConfig), reject
//! negative delays at construction and are driven through
//! [`Component`](crate::director::Component).

mod continuous;
mod timed;
pub mod token;

pub use continuous::DelayElement;
pub use timed::TimedDelay;
pub use token::{Hold, Interpolate, Signal};
