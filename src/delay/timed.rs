//! Discrete-event delay without interpolation.

use tracing::trace;

use crate::config::DelayConfig;
use crate::delay::token::Signal;
use crate::director::{Component, ComponentId, Director};
use crate::error::KairosResult;
use crate::event::TimedEvent;
use crate::queue::EventQueue;
use crate::time::ModelTime;

/// Re-emits each input `delay` model seconds after it arrived.
///
/// With a zero delay the input is forwarded in the same firing, unless a
/// queued value is already due at that time. Values due at the same time
/// are emitted one per microstep, oldest first, so the output carries at
/// most one value per tag.
///
/// The initial value of the configuration is ignored.
#[derive(Debug, Clone)]
pub struct TimedDelay<V> {
    id: ComponentId,
    delay: ModelTime,
    pending: EventQueue<V>,
    input: Signal<V>,
    /// Input read in `fire` that still has to be queued in `postfire`.
    current_input: Option<V>,
    output: Option<V>,
    output_from_queue: bool,
}

impl<V: Clone + std::fmt::Debug> TimedDelay<V> {
    /// Build a timed delay. Fails on a negative delay.
    pub fn new(id: ComponentId, config: DelayConfig<V>) -> KairosResult<Self> {
        config.validate()?;
        Ok(TimedDelay {
            id,
            delay: config.delay,
            pending: EventQueue::new(),
            input: Signal::Unknown,
            current_input: None,
            output: None,
            output_from_queue: false,
        })
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn set_input(&mut self, input: Signal<V>) {
        self.input = input;
    }

    pub fn output(&self) -> Option<&V> {
        self.output.as_ref()
    }

    pub fn take_output(&mut self) -> Option<V> {
        self.output.take()
    }

    /// Number of values waiting for their output time.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<V: Clone + std::fmt::Debug> Component for TimedDelay<V> {
    fn initialize(&mut self, _director: &mut dyn Director) -> KairosResult<()> {
        self.pending.clear();
        self.input = Signal::Unknown;
        self.current_input = None;
        self.output = None;
        self.output_from_queue = false;
        Ok(())
    }

    fn fire(&mut self, director: &mut dyn Director) -> KairosResult<()> {
        let now = director.model_time();
        self.current_input = std::mem::take(&mut self.input).into_value();
        self.output = None;
        self.output_from_queue = false;

        if self.pending.earliest_time() == Some(now) {
            self.output = Some(self.pending.peek()?.payload.clone());
            self.output_from_queue = true;
        } else if self.delay == ModelTime::ZERO {
            self.output = self.current_input.take();
        }

        trace!(component = %self.id, time = %now, output = ?self.output, "timed delay fired");
        Ok(())
    }

    fn postfire(&mut self, director: &mut dyn Director) -> KairosResult<bool> {
        let now = director.model_time();
        if self.output_from_queue {
            self.pending.take()?;
            self.output_from_queue = false;
        }
        if let Some(value) = self.current_input.take() {
            let due = now + self.delay;
            self.pending.put(TimedEvent::new(due, value));
            director.fire_at(self.id, due)?;
            if due == now {
                return Ok(true);
            }
        }
        if self.pending.earliest_time() == Some(now) {
            director.fire_at(self.id, now)?;
        }
        Ok(true)
    }
}
