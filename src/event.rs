/// Timed events for the scheduling core.
///
/// A `TimedEvent` pairs an opaque payload with the tag at which it was
/// produced. Events are immutable once queued; the queue only ever
/// peeks at them or takes them out whole.

use crate::time::{ModelTime, Tag};

// ── Event ID ──────────────────────────────────────────────────────────

/// A strictly-increasing insertion identifier.
///
/// Two events queued at the same tag are ordered by their `EventId`,
/// which corresponds to insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw u64 into an `EventId`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
///
/// Each `EventQueue` owns exactly one of these.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }
}

// ── TimedEvent ────────────────────────────────────────────────────────

/// A value paired with the tag at which it occurred.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedEvent<T> {
    /// Model time of the event.
    pub timestamp: ModelTime,

    /// Microstep at which the event was produced. Orders simultaneous
    /// events and lets a zero-delay consumer tell whether it has already
    /// seen this event in an earlier microstep.
    pub microstep: u32,

    /// The event payload.
    pub payload: T,
}

impl<T> TimedEvent<T> {
    /// An event at microstep 0 of `timestamp`.
    pub fn new(timestamp: ModelTime, payload: T) -> Self {
        TimedEvent {
            timestamp,
            microstep: 0,
            payload,
        }
    }

    /// An event at an explicit tag.
    pub fn at_tag(tag: Tag, payload: T) -> Self {
        TimedEvent {
            timestamp: tag.time,
            microstep: tag.microstep,
            payload,
        }
    }

    /// The `(timestamp, microstep)` tag of this event.
    #[inline]
    pub fn tag(&self) -> Tag {
        Tag::new(self.timestamp, self.microstep)
    }
}

impl<T: std::fmt::Debug> std::fmt::Display for TimedEvent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.tag(), self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_monotonic() {
        let mut gen = EventIdGen::new();
        let a = gen.next_id();
        let b = gen.next_id();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert!(a < b);
        assert_eq!(gen.peek().raw(), 2);
    }

    #[test]
    fn test_event_tag() {
        let tag = Tag::new(ModelTime::from_secs(1.0), 3);
        let e = TimedEvent::at_tag(tag, 7.0);
        assert_eq!(e.tag(), tag);
        assert_eq!(TimedEvent::new(ModelTime::ZERO, ()).microstep, 0);
    }

    #[test]
    fn test_event_display() {
        let e = TimedEvent::new(ModelTime::from_secs(2.0), 5.0);
        assert_eq!(format!("{}", EventId::new(42)), "E#42");
        assert_eq!(format!("{}", e), "(T=2, m=0) 5.0");
    }
}
