//! Interpolating delay for sampled continuous signals.

use tracing::{debug, trace};

use crate::config::DelayConfig;
use crate::delay::token::{Interpolate, Signal};
use crate::director::{Component, ComponentId, Director};
use crate::error::KairosResult;
use crate::event::TimedEvent;
use crate::queue::EventQueue;
use crate::time::{ModelTime, Tag};

/// Delays a sampled signal by a fixed amount of model time.
///
/// Every present input is buffered with the tag it arrived at. On each
/// firing at time `now` the element outputs its estimate of the input
/// at `center = now - delay`:
///
/// - a buffered sample exactly at `center` is output as is;
/// - before `start + delay` the configured initial value is output;
/// - otherwise the value is interpolated between the last sample before
///   `center` and the first one after it, or held if there is none after.
///
/// Samples older than `center` are discarded except for the latest, which
/// serves as the left interpolation point.
///
/// With a zero delay the output for a sample appears one microstep after
/// the sample arrived.
#[derive(Debug, Clone)]
pub struct DelayElement<V> {
    id: ComponentId,
    delay: ModelTime,
    initial_value: Option<V>,
    start: ModelTime,
    buffer: EventQueue<V>,
    /// Latest sample known to lie before the center time.
    discarded: Option<TimedEvent<V>>,
    next_fire_at: Option<ModelTime>,
    input: Signal<V>,
    output: Option<V>,
}

impl<V: Interpolate + std::fmt::Debug> DelayElement<V> {
    /// Build a delay element. Fails on a negative delay.
    pub fn new(id: ComponentId, config: DelayConfig<V>) -> KairosResult<Self> {
        config.validate()?;
        Ok(DelayElement {
            id,
            delay: config.delay,
            initial_value: config.initial_value,
            start: ModelTime::ZERO,
            buffer: EventQueue::new(),
            discarded: None,
            next_fire_at: None,
            input: Signal::Unknown,
            output: None,
        })
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn delay(&self) -> ModelTime {
        self.delay
    }

    /// Offer the input for the next firing.
    pub fn set_input(&mut self, input: Signal<V>) {
        self.input = input;
    }

    /// Output produced by the most recent firing.
    pub fn output(&self) -> Option<&V> {
        self.output.as_ref()
    }

    pub fn take_output(&mut self) -> Option<V> {
        self.output.take()
    }

    /// Number of buffered samples.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The time most recently passed to `fire_at`, if any.
    pub fn next_fire_at(&self) -> Option<ModelTime> {
        self.next_fire_at
    }

    fn interpolate(&self, left: &TimedEvent<V>, right: &TimedEvent<V>, center: ModelTime) -> V {
        let run = (right.timestamp - left.timestamp).as_secs_f64();
        assert!(
            run > 0.0,
            "zero time gap between interpolation points at {}",
            left.timestamp
        );
        let offset = (center - left.timestamp).as_secs_f64();
        left.payload.interpolate(&right.payload, run, offset)
    }

    fn request_refire(&mut self, director: &mut dyn Director, time: ModelTime) -> KairosResult<()> {
        let tag = director.fire_at(self.id, time)?;
        debug!(component = %self.id, %tag, "delay refire requested");
        self.next_fire_at = Some(time);
        Ok(())
    }
}

impl<V: Interpolate + std::fmt::Debug> Component for DelayElement<V> {
    fn initialize(&mut self, director: &mut dyn Director) -> KairosResult<()> {
        self.start = director.model_start_time();
        self.buffer.clear();
        self.discarded = None;
        self.next_fire_at = None;
        self.input = Signal::Unknown;
        self.output = None;

        if let Some(initial) = self.initial_value.clone() {
            self.buffer.put(TimedEvent::new(self.start, initial));
            let first = self.start + self.delay;
            self.request_refire(director, first)?;
        }
        Ok(())
    }

    fn fire(&mut self, director: &mut dyn Director) -> KairosResult<()> {
        let now = Tag::new(director.model_time(), director.microstep());
        let center = now.time - self.delay;
        self.output = None;

        // Intake.
        if let Some(value) = std::mem::take(&mut self.input).into_value() {
            self.buffer.put(TimedEvent::at_tag(now, value));
        }

        // Expiry.
        if let Some(expired) = self.buffer.discard_before(center) {
            self.discarded = Some(expired);
        }

        let exact = match self.buffer.peek() {
            Ok(right) if right.timestamp == center => {
                // A zero-delay sample is only output once it has been
                // read, i.e. from a later microstep than its arrival.
                self.delay != ModelTime::ZERO || right.microstep < now.microstep
            }
            _ => false,
        };

        if exact {
            let matched = self.buffer.take()?;
            self.output = Some(matched.payload.clone());
            self.discarded = Some(matched);
        } else if now.time.is_before(self.start + self.delay) {
            self.output = self.initial_value.clone();
        } else if self.delay == ModelTime::ZERO {
            // Deferred to the next microstep.
        } else if let Some(left) = &self.discarded {
            self.output = Some(match self.buffer.peek() {
                Ok(right) => self.interpolate(left, right, center),
                Err(_) => left.payload.clone(),
            });
        }

        trace!(component = %self.id, %now, output = ?self.output, "delay fired");
        Ok(())
    }

    fn postfire(&mut self, director: &mut dyn Director) -> KairosResult<bool> {
        if let Some(earliest) = self.buffer.earliest_time() {
            let next = earliest + self.delay;
            if next == director.model_time() || self.next_fire_at != Some(next) {
                self.request_refire(director, next)?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::token::Hold;
    use crate::director::ManualDirector;
    use crate::error::KairosError;
    use crate::simulation::{Simulation, SimulationContext};

    fn at(secs: f64) -> ModelTime {
        ModelTime::from_secs(secs)
    }

    fn element(delay: f64) -> DelayElement<f64> {
        DelayElement::new(ComponentId::new(0), DelayConfig::new(at(delay))).unwrap()
    }

    /// Advance to `time`, offer `input`, fire and postfire.
    fn step(
        d: &mut DelayElement<f64>,
        director: &mut ManualDirector,
        time: f64,
        input: Option<f64>,
    ) -> Option<f64> {
        director.advance_to(at(time));
        d.set_input(input.into());
        d.fire(director).unwrap();
        d.postfire(director).unwrap();
        d.output().copied()
    }

    #[test]
    fn test_negative_delay_rejected() {
        let err = DelayElement::<f64>::new(ComponentId::new(0), DelayConfig::new(at(-1.0))).unwrap_err();
        assert!(matches!(err, KairosError::NegativeDelay { .. }));
    }

    #[test]
    fn test_exact_match_is_output_and_removed() {
        let mut d = element(1.5);
        let mut director = ManualDirector::new(ModelTime::ZERO);
        d.initialize(&mut director).unwrap();

        assert_eq!(step(&mut d, &mut director, 0.0, Some(4.0)), None);
        assert_eq!(director.take_requests(), vec![(d.id(), Tag::at(at(1.5)))]);

        assert_eq!(step(&mut d, &mut director, 1.5, None), Some(4.0));
        assert_eq!(d.buffered(), 0);
    }

    #[test]
    fn test_interpolates_between_samples() {
        let mut d = element(1.0);
        let mut director = ManualDirector::new(ModelTime::ZERO);
        d.initialize(&mut director).unwrap();

        step(&mut d, &mut director, 0.0, Some(0.0));
        step(&mut d, &mut director, 1.0, None);
        step(&mut d, &mut director, 2.0, Some(10.0));

        // center = 1.5, halfway between the samples at 0 and 2
        assert_eq!(step(&mut d, &mut director, 2.5, None), Some(7.5));
    }

    #[test]
    fn test_holds_last_sample_without_right_point() {
        let mut d = element(1.0);
        let mut director = ManualDirector::new(ModelTime::ZERO);
        d.initialize(&mut director).unwrap();

        step(&mut d, &mut director, 0.0, Some(2.0));
        assert_eq!(step(&mut d, &mut director, 1.0, None), Some(2.0));
        assert_eq!(step(&mut d, &mut director, 4.0, None), Some(2.0));
    }

    #[test]
    fn test_initial_value_during_transient() {
        let config = DelayConfig::new(at(2.0)).with_initial_value(-1.0);
        let mut d = DelayElement::new(ComponentId::new(3), config).unwrap();
        let mut director = ManualDirector::new(ModelTime::ZERO);
        d.initialize(&mut director).unwrap();
        assert_eq!(director.take_requests(), vec![(d.id(), Tag::at(at(2.0)))]);

        assert_eq!(step(&mut d, &mut director, 0.5, Some(6.0)), Some(-1.0));
        assert_eq!(step(&mut d, &mut director, 1.9, None), Some(-1.0));
        // The seeded sample at t=0 is matched exactly at t=2.
        assert_eq!(step(&mut d, &mut director, 2.0, None), Some(-1.0));
        // Then interpolate from -1@0 towards 6@0.5.
        assert_eq!(step(&mut d, &mut director, 2.25, None), Some(2.5));
    }

    #[test]
    fn test_no_output_without_history() {
        let mut d = element(1.0);
        let mut director = ManualDirector::new(ModelTime::ZERO);
        d.initialize(&mut director).unwrap();
        assert_eq!(step(&mut d, &mut director, 3.0, None), None);
        assert!(director.requests().is_empty());
    }

    #[test]
    fn test_zero_delay_outputs_one_microstep_later() {
        let mut d = element(0.0);
        let mut director = ManualDirector::new(ModelTime::ZERO);
        d.initialize(&mut director).unwrap();

        assert_eq!(step(&mut d, &mut director, 1.0, Some(9.0)), None);
        assert_eq!(director.take_requests(), vec![(d.id(), Tag::new(at(1.0), 1))]);

        director.next_microstep();
        d.fire(&mut director).unwrap();
        assert_eq!(d.output(), Some(&9.0));
        d.postfire(&mut director).unwrap();
        assert_eq!(d.buffered(), 0);
        assert!(director.requests().is_empty());
    }

    #[test]
    fn test_refire_is_requested_once_per_time() {
        let mut d = element(2.0);
        let mut director = ManualDirector::new(ModelTime::ZERO);
        d.initialize(&mut director).unwrap();

        step(&mut d, &mut director, 0.0, Some(1.0));
        step(&mut d, &mut director, 0.5, None);
        step(&mut d, &mut director, 1.0, None);

        assert_eq!(director.requests(), &[(d.id(), Tag::at(at(2.0)))]);
        assert_eq!(d.next_fire_at(), Some(at(2.0)));
    }

    #[test]
    fn test_hold_values_are_not_blended() {
        let mut d = DelayElement::new(ComponentId::new(0), DelayConfig::new(at(1.0))).unwrap();
        let mut director = ManualDirector::new(ModelTime::ZERO);
        d.initialize(&mut director).unwrap();

        for (t, v) in [(0.0, "off"), (1.0, "on")] {
            director.advance_to(at(t));
            d.set_input(Signal::Present(Hold(v)));
            d.fire(&mut director).unwrap();
            d.postfire(&mut director).unwrap();
        }
        director.advance_to(at(1.5));
        d.fire(&mut director).unwrap();
        assert_eq!(d.output(), Some(&Hold("off")));
    }

    #[test]
    fn test_initialize_resets_state() {
        let mut d = element(1.0);
        let mut director = ManualDirector::new(ModelTime::ZERO);
        d.initialize(&mut director).unwrap();
        step(&mut d, &mut director, 0.0, Some(1.0));
        assert_eq!(d.buffered(), 1);

        let mut fresh = ManualDirector::new(ModelTime::ZERO);
        d.initialize(&mut fresh).unwrap();
        assert_eq!(d.buffered(), 0);
        assert_eq!(d.next_fire_at(), None);
        assert!(d.output().is_none());
    }

    #[test]
    fn test_driven_by_simulation() {
        let mut sim = Simulation::new();
        let mut d = element(0.5);
        sim.initialize(&mut d).unwrap();

        // A source that samples at 0, 1 and 2 and fires the delay with it.
        let source = ComponentId::new(99);
        for t in [0.0, 1.0, 2.0] {
            sim.schedule_firing(source, at(t)).unwrap();
        }

        let mut outputs = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext<'_>, target: ComponentId| -> KairosResult<bool> {
            if target == source {
                d.set_input(Signal::Present(ctx.model_time().as_secs_f64() * 10.0));
            }
            d.fire(ctx)?;
            if let Some(v) = d.output() {
                outputs.push((ctx.model_time().as_secs_f64(), *v));
            }
            d.postfire(ctx)
        })
        .unwrap();

        assert_eq!(outputs, vec![(0.5, 0.0), (1.0, 5.0), (1.5, 10.0), (2.0, 15.0), (2.5, 20.0)]);
    }
}
