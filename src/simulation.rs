//! Reference superdense-time director.
//!
//! Holds a queue of firing requests keyed by tag, advances the current
//! tag to the earliest request and hands the firing to a user-supplied
//! handler. The loop is purely synchronous and single-threaded, so two
//! runs fed the same way fire in the same order.

use std::collections::BTreeSet;

use tracing::{debug, info, trace};

use crate::director::{granted_tag, Component, ComponentId, Director};
use crate::error::KairosResult;
use crate::event::TimedEvent;
use crate::queue::EventQueue;
use crate::time::{ModelTime, Tag};

// ── Handler trait ─────────────────────────────────────────────────────

/// User-defined firing handler.
///
/// Called once per firing with the target component. The handler gets a
/// `SimulationContext`, which implements [`Director`], so it can pass it
/// straight into [`Component::fire`] and [`Component::postfire`].
///
/// Returning `Ok(false)` halts the simulation.
pub trait FiringHandler {
    fn fire(&mut self, ctx: &mut SimulationContext<'_>, target: ComponentId) -> KairosResult<bool>;
}

/// A handler backed by a closure, for tests and one-off scripts.
impl<F> FiringHandler for F
where
    F: FnMut(&mut SimulationContext<'_>, ComponentId) -> KairosResult<bool>,
{
    fn fire(&mut self, ctx: &mut SimulationContext<'_>, target: ComponentId) -> KairosResult<bool> {
        (self)(ctx, target)
    }
}

// ── Simulation Context ───────────────────────────────────────────────

/// The director view handed to components during a firing.
///
/// Borrows the request queue mutably, so components can only influence
/// future firings through `fire_at`.
pub struct SimulationContext<'a> {
    requests: &'a mut EventQueue<ComponentId>,
    now: Tag,
    start: ModelTime,
}

impl<'a> SimulationContext<'a> {
    /// Number of pending firing requests.
    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }
}

impl<'a> Director for SimulationContext<'a> {
    fn model_time(&self) -> ModelTime {
        self.now.time
    }

    fn microstep(&self) -> u32 {
        self.now.microstep
    }

    fn model_start_time(&self) -> ModelTime {
        self.start
    }

    fn fire_at(&mut self, component: ComponentId, time: ModelTime) -> KairosResult<Tag> {
        let tag = granted_tag(self.now, time)?;
        self.requests.put(TimedEvent::at_tag(tag, component));
        trace!(%component, %tag, "firing requested");
        Ok(tag)
    }
}

// ── Simulation ────────────────────────────────────────────────────────

/// One completed firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Firing {
    pub tag: Tag,
    pub component: ComponentId,
}

/// Top-level director.
///
/// Owns the request queue and tracks the current tag. Call `run` to
/// execute until no requests remain, or `step` to perform exactly one
/// firing.
#[derive(Debug, Clone)]
pub struct Simulation {
    requests: EventQueue<ComponentId>,
    now: Tag,
    start_time: ModelTime,
    stop_time: ModelTime,
    firings: u64,
    /// Components already fired at `now`.
    fired_at_now: BTreeSet<ComponentId>,
    halted: bool,
}

impl Simulation {
    /// Create a new simulation starting at time zero.
    pub fn new() -> Self {
        Simulation::starting_at(ModelTime::ZERO)
    }

    /// Create a new simulation whose model starts at `start`.
    pub fn starting_at(start: ModelTime) -> Self {
        Simulation {
            requests: EventQueue::new(),
            now: Tag::at(start),
            start_time: start,
            stop_time: ModelTime::POSITIVE_INFINITY,
            firings: 0,
            fired_at_now: BTreeSet::new(),
            halted: false,
        }
    }

    /// Never fire anything later than `stop`.
    pub fn with_stop_time(mut self, stop: ModelTime) -> Self {
        self.stop_time = stop;
        self
    }

    /// Current tag.
    pub fn now(&self) -> Tag {
        self.now
    }

    /// Current model time.
    pub fn current_time(&self) -> ModelTime {
        self.now.time
    }

    pub fn start_time(&self) -> ModelTime {
        self.start_time
    }

    pub fn stop_time(&self) -> ModelTime {
        self.stop_time
    }

    /// Total firings performed so far.
    pub fn firings(&self) -> u64 {
        self.firings
    }

    /// A director view at the current tag, for seeding requests or
    /// poking components between steps.
    pub fn context(&mut self) -> SimulationContext<'_> {
        SimulationContext {
            requests: &mut self.requests,
            now: self.now,
            start: self.start_time,
        }
    }

    /// Run `component.initialize` against this director.
    pub fn initialize(&mut self, component: &mut dyn Component) -> KairosResult<()> {
        component.initialize(&mut self.context())
    }

    /// Request a firing of `component` at `time` from outside the loop.
    pub fn schedule_firing(&mut self, component: ComponentId, time: ModelTime) -> KairosResult<Tag> {
        self.context().fire_at(component, time)
    }

    /// Execute a single firing: pop one request, advance the tag, dispatch.
    ///
    /// Returns `Ok(None)` once the queue is empty, the next request lies
    /// beyond the stop time, or a handler has halted the run. A component
    /// fires at most once per tag; further requests for it at that tag are
    /// dropped.
    pub fn step(&mut self, handler: &mut dyn FiringHandler) -> KairosResult<Option<Firing>> {
        self.step_within(self.stop_time, handler)
    }

    fn step_within(
        &mut self,
        limit: ModelTime,
        handler: &mut dyn FiringHandler,
    ) -> KairosResult<Option<Firing>> {
        if self.halted {
            return Ok(None);
        }
        let firing = loop {
            match self.requests.earliest_time() {
                Some(t) if !limit.is_before(t) => {}
                _ => return Ok(None),
            }
            let request = self.requests.take()?;
            let firing = Firing {
                tag: request.tag(),
                component: request.payload,
            };
            if firing.tag == self.now && self.fired_at_now.contains(&firing.component) {
                trace!(component = %firing.component, tag = %firing.tag, "duplicate request dropped");
                continue;
            }
            break firing;
        };

        // Model time must never go backward.
        assert!(
            firing.tag >= self.now,
            "model time went backward: now={}, firing={}",
            self.now,
            firing.tag
        );
        if firing.tag != self.now {
            self.fired_at_now.clear();
            self.now = firing.tag;
        }
        self.fired_at_now.insert(firing.component);
        self.firings += 1;
        trace!(component = %firing.component, tag = %firing.tag, "fire");

        let mut ctx = self.context();
        if !handler.fire(&mut ctx, firing.component)? {
            debug!(component = %firing.component, tag = %firing.tag, "halt requested");
            self.halted = true;
        }
        Ok(Some(firing))
    }

    /// Run until no requests remain.
    ///
    /// Returns the number of firings performed during this run.
    pub fn run(&mut self, handler: &mut dyn FiringHandler) -> KairosResult<u64> {
        self.run_until(self.stop_time, handler)
    }

    /// Run every request with a time no later than `time`.
    pub fn run_until(&mut self, time: ModelTime, handler: &mut dyn FiringHandler) -> KairosResult<u64> {
        let limit = Ord::min(time, self.stop_time);
        let before = self.firings;
        info!(now = %self.now, until = %limit, "simulation run started");
        while self.step_within(limit, handler)?.is_some() {}
        info!(now = %self.now, firings = self.firings - before, "simulation run finished");
        Ok(self.firings - before)
    }

    /// Run until no requests remain **or** `max_steps` firings have been
    /// performed, whichever comes first.
    pub fn run_for(&mut self, max_steps: u64, handler: &mut dyn FiringHandler) -> KairosResult<u64> {
        let before = self.firings;
        while self.firings - before < max_steps {
            if self.step(handler)?.is_none() {
                break;
            }
        }
        Ok(self.firings - before)
    }

    /// Returns `true` if a handler halted the run.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Returns `true` if nothing more will fire.
    pub fn is_finished(&self) -> bool {
        self.halted
            || self
                .requests
                .earliest_time()
                .map_or(true, |t| self.stop_time.is_before(t))
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KairosError;

    fn at(secs: f64) -> ModelTime {
        ModelTime::from_secs(secs)
    }

    fn noop(_ctx: &mut SimulationContext<'_>, _target: ComponentId) -> KairosResult<bool> {
        Ok(true)
    }

    #[test]
    fn test_basic_execution_loop() {
        let mut sim = Simulation::new();
        let (a, b, c) = (ComponentId::new(0), ComponentId::new(1), ComponentId::new(2));

        sim.schedule_firing(c, at(3.0)).unwrap();
        sim.schedule_firing(a, at(1.0)).unwrap();
        sim.schedule_firing(b, at(2.0)).unwrap();

        let mut log = Vec::new();
        let processed = sim
            .run(&mut |_ctx: &mut SimulationContext<'_>, target: ComponentId| -> KairosResult<bool> {
                log.push(target);
                Ok(true)
            })
            .unwrap();

        assert_eq!(processed, 3);
        assert_eq!(log, vec![a, b, c]);
        assert_eq!(sim.current_time(), at(3.0));
    }

    #[test]
    fn test_handler_requests_followup() {
        let mut sim = Simulation::new();
        let c = ComponentId::new(0);
        sim.schedule_firing(c, ModelTime::ZERO).unwrap();

        let mut log = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext<'_>, target: ComponentId| -> KairosResult<bool> {
            log.push(ctx.model_time().as_secs_f64());
            if ctx.model_time() < at(3.0) {
                ctx.fire_at(target, ctx.model_time() + at(1.0))?;
            }
            Ok(true)
        })
        .unwrap();

        assert_eq!(log, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_fire_at_now_advances_microstep() {
        let mut sim = Simulation::new();
        let c = ComponentId::new(0);
        sim.schedule_firing(c, at(1.0)).unwrap();

        let mut tags = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext<'_>, target: ComponentId| -> KairosResult<bool> {
            tags.push(ctx.tag());
            if ctx.microstep() < 2 {
                ctx.fire_at(target, ctx.model_time())?;
            }
            Ok(true)
        })
        .unwrap();

        assert_eq!(
            tags,
            vec![Tag::new(at(1.0), 0), Tag::new(at(1.0), 1), Tag::new(at(1.0), 2)]
        );
    }

    #[test]
    fn test_fire_at_past_is_rejected() {
        let mut sim = Simulation::new();
        let c = ComponentId::new(0);
        sim.schedule_firing(c, at(5.0)).unwrap();

        let result = sim.run(&mut |ctx: &mut SimulationContext<'_>, target: ComponentId| -> KairosResult<bool> {
            ctx.fire_at(target, at(1.0))?;
            Ok(true)
        });
        assert!(matches!(result, Err(KairosError::NonCausalRequest { .. })));
    }

    #[test]
    fn test_duplicate_requests_fire_once() {
        let mut sim = Simulation::new();
        let (a, b, c) = (ComponentId::new(0), ComponentId::new(1), ComponentId::new(2));
        sim.schedule_firing(a, at(2.0)).unwrap();
        sim.schedule_firing(a, at(2.0)).unwrap();
        sim.schedule_firing(b, at(2.0)).unwrap();
        sim.schedule_firing(c, at(2.0)).unwrap();
        sim.schedule_firing(a, at(2.0)).unwrap();
        sim.schedule_firing(b, at(2.0)).unwrap();
        // Same component, later tag: fires again.
        sim.schedule_firing(a, at(3.0)).unwrap();

        let mut log = Vec::new();
        let processed = sim
            .run(&mut |ctx: &mut SimulationContext<'_>, target: ComponentId| -> KairosResult<bool> {
                log.push((ctx.model_time().as_secs_f64(), target));
                Ok(true)
            })
            .unwrap();
        assert_eq!(processed, 4);
        assert_eq!(log, vec![(2.0, a), (2.0, b), (2.0, c), (3.0, a)]);
    }

    #[test]
    fn test_step_by_step() {
        let mut sim = Simulation::new();
        let c = ComponentId::new(0);
        sim.schedule_firing(c, at(0.5)).unwrap();
        sim.schedule_firing(c, at(1.5)).unwrap();

        let first = sim.step(&mut noop).unwrap().unwrap();
        assert_eq!(first.tag, Tag::at(at(0.5)));
        assert_eq!(sim.current_time(), at(0.5));

        let second = sim.step(&mut noop).unwrap().unwrap();
        assert_eq!(second.tag, Tag::at(at(1.5)));

        assert!(sim.step(&mut noop).unwrap().is_none());
        assert!(sim.is_finished());
    }

    #[test]
    fn test_run_for_limits_steps() {
        let mut sim = Simulation::new();
        for i in 0..100 {
            sim.schedule_firing(ComponentId::new(0), ModelTime::from_ticks(i)).unwrap();
        }

        let processed = sim.run_for(10, &mut noop).unwrap();
        assert_eq!(processed, 10);
        assert_eq!(sim.firings(), 10);
        assert!(!sim.is_finished());
    }

    #[test]
    fn test_run_until_and_stop_time() {
        let mut sim = Simulation::new().with_stop_time(at(10.0));
        let c = ComponentId::new(0);
        for t in [1.0, 4.0, 9.0, 12.0] {
            sim.schedule_firing(c, at(t)).unwrap();
        }

        assert_eq!(sim.run_until(at(4.0), &mut noop).unwrap(), 2);
        assert_eq!(sim.current_time(), at(4.0));
        assert_eq!(sim.run(&mut noop).unwrap(), 1);
        // The request at 12 lies past the stop time.
        assert!(sim.is_finished());
        assert_eq!(sim.current_time(), at(9.0));
    }

    #[test]
    fn test_handler_can_halt() {
        let mut sim = Simulation::new();
        for t in [1.0, 2.0, 3.0] {
            sim.schedule_firing(ComponentId::new(0), at(t)).unwrap();
        }

        let processed = sim
            .run(&mut |ctx: &mut SimulationContext<'_>, _target: ComponentId| -> KairosResult<bool> {
                Ok(ctx.model_time() < at(2.0))
            })
            .unwrap();
        assert_eq!(processed, 2);
        assert!(sim.is_halted());
        assert!(sim.step(&mut noop).unwrap().is_none());
    }

    #[test]
    fn test_deterministic_replay() {
        fn run_trace() -> Vec<(Tag, ComponentId)> {
            let mut sim = Simulation::new();
            sim.schedule_firing(ComponentId::new(1), at(5.0)).unwrap();
            sim.schedule_firing(ComponentId::new(2), at(5.0)).unwrap();
            sim.schedule_firing(ComponentId::new(3), at(3.0)).unwrap();

            let mut trace = Vec::new();
            sim.run(&mut |ctx: &mut SimulationContext<'_>, target: ComponentId| -> KairosResult<bool> {
                trace.push((ctx.tag(), target));
                if ctx.model_time() < at(8.0) {
                    ctx.fire_at(target, ctx.model_time() + at(2.0))?;
                }
                Ok(true)
            })
            .unwrap();
            trace
        }

        assert_eq!(run_trace(), run_trace(), "simulation is not deterministic");
    }

    #[test]
    fn test_empty_simulation() {
        let mut sim = Simulation::starting_at(at(2.0));
        assert_eq!(sim.run(&mut noop).unwrap(), 0);
        assert!(sim.is_finished());
        assert_eq!(sim.start_time(), at(2.0));
        assert_eq!(sim.context().model_start_time(), at(2.0));
    }
}
