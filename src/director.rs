//! The director boundary.
//!
//! Components never reach for a global clock. Every entry point receives
//! the [`Director`] explicitly, reads model time from it, and asks it for
//! future firings through [`Director::fire_at`].
//!
//! | Item | Role |
//! |---|---|
//! | [`ComponentId`] | stable handle a component uses to name itself |
//! | [`Director`] | clock + refire requests (consumed by components) |
//! | [`Component`] | `initialize` / `fire` / `postfire` (exposed to directors) |
//! | [`ManualDirector`] | hand-stepped director for embedding and tests |

use tracing::trace;

use crate::error::{KairosError, KairosResult};
use crate::time::{ModelTime, Tag};

// ── ComponentId ───────────────────────────────────────────────────────

/// A unique identifier for a component driven by a director.
///
/// A newtype rather than a bare integer so it cannot be confused with
/// task ids or event ids at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentId(u64);

impl ComponentId {
    /// Create a component ID from a raw integer.
    #[inline]
    pub const fn new(id: u64) -> Self {
        ComponentId(id)
    }

    /// Return the underlying integer.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

// ── Director ──────────────────────────────────────────────────────────

/// The clock authority that advances model time and fires components.
///
/// # Contract
///
/// Implementations **must**:
/// - Never move model time backwards.
/// - Honor every accepted `fire_at` request exactly once.
/// - Treat a request for the current time as a request for the next
///   microstep at that time.
pub trait Director {
    /// Current model time.
    fn model_time(&self) -> ModelTime;

    /// Current microstep at `model_time`.
    fn microstep(&self) -> u32;

    /// The time at which the model started.
    fn model_start_time(&self) -> ModelTime;

    /// Ask to fire `component` again at `time`.
    ///
    /// Returns the tag at which the firing will happen. Fails with
    /// [`KairosError::NonCausalRequest`] if `time` is in the past.
    fn fire_at(&mut self, component: ComponentId, time: ModelTime) -> KairosResult<Tag>;

    /// Current superdense tag.
    fn tag(&self) -> Tag {
        Tag::new(self.model_time(), self.microstep())
    }
}

/// Tag a `fire_at(time)` request maps to, given the current tag.
///
/// Shared by every director in the crate so they agree on microsteps.
pub(crate) fn granted_tag(now: Tag, time: ModelTime) -> KairosResult<Tag> {
    if time.is_before(now.time) {
        return Err(KairosError::NonCausalRequest {
            requested: time,
            current: now.time,
        });
    }
    if time == now.time {
        Ok(now.next_microstep())
    } else {
        Ok(Tag::at(time))
    }
}

// ── Component ─────────────────────────────────────────────────────────

/// Trait implemented by everything a director can fire.
///
/// One logical step is `fire` followed by `postfire`. Neither call may
/// suspend; all state changes finish before control returns.
///
/// # Example
///
/// ```rust
/// use kairos::director::{Component, ComponentId, Director, ManualDirector};
/// use kairos::error::KairosResult;
/// use kairos::time::ModelTime;
///
/// struct Ticker { id: ComponentId, count: u32 }
///
/// impl Component for Ticker {
///     fn initialize(&mut self, director: &mut dyn Director) -> KairosResult<()> {
///         self.count = 0;
///         director.fire_at(self.id, director.model_start_time())?;
///         Ok(())
///     }
///     fn fire(&mut self, _director: &mut dyn Director) -> KairosResult<()> {
///         self.count += 1;
///         Ok(())
///     }
///     fn postfire(&mut self, director: &mut dyn Director) -> KairosResult<bool> {
///         let next = director.model_time() + ModelTime::from_secs(1.0);
///         director.fire_at(self.id, next)?;
///         Ok(self.count < 3)
///     }
/// }
///
/// let mut director = ManualDirector::new(ModelTime::ZERO);
/// let mut ticker = Ticker { id: ComponentId::new(0), count: 0 };
/// ticker.initialize(&mut director).unwrap();
/// ticker.fire(&mut director).unwrap();
/// assert!(ticker.postfire(&mut director).unwrap());
/// assert_eq!(director.requests().len(), 2);
/// ```
pub trait Component {
    /// Reset run state. Called once before the first firing of a run.
    fn initialize(&mut self, director: &mut dyn Director) -> KairosResult<()>;

    /// Compute outputs for the current tag.
    fn fire(&mut self, director: &mut dyn Director) -> KairosResult<()>;

    /// Commit state and request future firings.
    ///
    /// Returns `false` to ask the director to halt.
    fn postfire(&mut self, director: &mut dyn Director) -> KairosResult<bool>;
}

// ── ManualDirector ────────────────────────────────────────────────────

/// A director stepped by hand.
///
/// Keeps the current tag and records every `fire_at` request instead of
/// acting on it. Useful when embedding components in an outer loop that
/// already owns the clock, and in tests.
#[derive(Debug, Clone)]
pub struct ManualDirector {
    now: Tag,
    start: ModelTime,
    requests: Vec<(ComponentId, Tag)>,
}

impl ManualDirector {
    /// A director whose model starts (and currently sits) at `start`.
    pub fn new(start: ModelTime) -> Self {
        ManualDirector {
            now: Tag::at(start),
            start,
            requests: Vec::new(),
        }
    }

    /// Jump to microstep 0 of `time`.
    ///
    /// # Panics
    /// Panics if `time` is before the current time.
    pub fn advance_to(&mut self, time: ModelTime) {
        assert!(
            !time.is_before(self.now.time),
            "model time went backward: now={}, requested={}",
            self.now.time,
            time
        );
        if time != self.now.time {
            self.now = Tag::at(time);
        }
    }

    /// Stay at the current time, one microstep later.
    pub fn next_microstep(&mut self) {
        self.now = self.now.next_microstep();
    }

    /// Every request recorded so far, oldest first.
    pub fn requests(&self) -> &[(ComponentId, Tag)] {
        &self.requests
    }

    /// Take and clear the recorded requests.
    pub fn take_requests(&mut self) -> Vec<(ComponentId, Tag)> {
        std::mem::take(&mut self.requests)
    }
}

impl Director for ManualDirector {
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
        trace!(%component, %tag, "fire_at recorded");
        self.requests.push((component, tag));
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_at_now_is_next_microstep() {
        let mut d = ManualDirector::new(ModelTime::ZERO);
        let c = ComponentId::new(1);
        let tag = d.fire_at(c, ModelTime::ZERO).unwrap();
        assert_eq!(tag, Tag::new(ModelTime::ZERO, 1));
    }

    #[test]
    fn test_fire_at_future_is_microstep_zero() {
        let mut d = ManualDirector::new(ModelTime::ZERO);
        d.next_microstep();
        let c = ComponentId::new(1);
        let tag = d.fire_at(c, ModelTime::from_secs(2.0)).unwrap();
        assert_eq!(tag, Tag::at(ModelTime::from_secs(2.0)));
        assert_eq!(d.requests(), &[(c, tag)]);
    }

    #[test]
    fn test_fire_at_past_is_rejected() {
        let mut d = ManualDirector::new(ModelTime::ZERO);
        d.advance_to(ModelTime::from_secs(5.0));
        let err = d
            .fire_at(ComponentId::new(0), ModelTime::from_secs(1.0))
            .unwrap_err();
        assert!(matches!(err, KairosError::NonCausalRequest { .. }));
        assert!(d.requests().is_empty());
    }

    #[test]
    fn test_advance_resets_microstep() {
        let mut d = ManualDirector::new(ModelTime::ZERO);
        d.next_microstep();
        d.next_microstep();
        assert_eq!(d.microstep(), 2);
        d.advance_to(ModelTime::ZERO);
        assert_eq!(d.microstep(), 2);
        d.advance_to(ModelTime::from_secs(1.0));
        assert_eq!(d.tag(), Tag::at(ModelTime::from_secs(1.0)));
    }

    #[test]
    #[should_panic(expected = "went backward")]
    fn test_advance_backwards_panics() {
        let mut d = ManualDirector::new(ModelTime::from_secs(3.0));
        d.advance_to(ModelTime::from_secs(1.0));
    }

    #[test]
    fn test_take_requests_clears() {
        let mut d = ManualDirector::new(ModelTime::ZERO);
        d.fire_at(ComponentId::new(0), ModelTime::from_secs(1.0)).unwrap();
        assert_eq!(d.take_requests().len(), 1);
        assert!(d.requests().is_empty());
    }

    #[test]
    fn test_component_id_display() {
        assert_eq!(format!("{}", ComponentId::new(7)), "C7");
    }
}
