/// Time-ordered event queue.
///
/// Uses a `BinaryHeap` with a reversed `Ord` on its slots to act as a
/// min-heap keyed by `(timestamp, microstep, event_id)`. Because event
/// IDs are strictly increasing, events at the same tag come out in
/// insertion order and two queues fed the same way always drain the
/// same way.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::trace;

use crate::error::{KairosError, KairosResult};
use crate::event::{EventId, EventIdGen, TimedEvent};
use crate::time::ModelTime;

// ── Slot ──────────────────────────────────────────────────────────────

/// A queued event plus the insertion id that breaks ties.
#[derive(Debug, Clone)]
struct Slot<T> {
    id: EventId,
    event: TimedEvent<T>,
}

impl<T> Slot<T> {
    fn key(&self) -> (ModelTime, u32, EventId) {
        (self.event.timestamp, self.event.microstep, self.id)
    }
}

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for Slot<T> {}

/// Reversed so that `BinaryHeap` pops the *smallest* key first.
impl<T> Ord for Slot<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl<T> PartialOrd for Slot<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ── EventQueue ────────────────────────────────────────────────────────

/// A priority queue of timed events, earliest first.
///
/// Unbounded; `put` never fails. Emptiness is the only error condition
/// for `peek` and `take`.
#[derive(Debug, Clone)]
pub struct EventQueue<T> {
    heap: BinaryHeap<Slot<T>>,
    id_gen: EventIdGen,
}

impl<T> EventQueue<T> {
    /// Create a new, empty queue.
    pub fn new() -> Self {
        EventQueue {
            heap: BinaryHeap::new(),
            id_gen: EventIdGen::new(),
        }
    }

    /// Insert an event in timestamp order.
    ///
    /// Returns the `EventId` that orders it among simultaneous events.
    pub fn put(&mut self, event: TimedEvent<T>) -> EventId {
        let id = self.id_gen.next_id();
        trace!(
            id = id.raw(),
            timestamp = %event.timestamp,
            microstep = event.microstep,
            "queue put"
        );
        self.heap.push(Slot { id, event });
        id
    }

    /// The earliest event, without removing it.
    pub fn peek(&self) -> KairosResult<&TimedEvent<T>> {
        self.heap
            .peek()
            .map(|slot| &slot.event)
            .ok_or(KairosError::EmptyQueue)
    }

    /// Remove and return the earliest event.
    pub fn take(&mut self) -> KairosResult<TimedEvent<T>> {
        let slot = self.heap.pop().ok_or(KairosError::EmptyQueue)?;
        trace!(id = slot.id.raw(), timestamp = %slot.event.timestamp, "queue take");
        Ok(slot.event)
    }

    /// Timestamp of the earliest event, if any.
    pub fn earliest_time(&self) -> Option<ModelTime> {
        self.heap.peek().map(|slot| slot.event.timestamp)
    }

    /// Discard every event with `timestamp < threshold`.
    ///
    /// Returns the last event discarded, i.e. the latest one known to
    /// precede `threshold`, or `None` if nothing expired.
    pub fn discard_before(&mut self, threshold: ModelTime) -> Option<TimedEvent<T>> {
        let mut last = None;
        while self
            .earliest_time()
            .is_some_and(|t| t.is_before(threshold))
        {
            last = self.heap.pop().map(|slot| slot.event);
        }
        last
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if no events are queued.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop every queued event. Insertion ids keep increasing.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// The id that the next `put` will assign.
    pub fn next_event_id(&self) -> EventId {
        self.id_gen.peek()
    }

    /// Drain all events in queue order into a `Vec`.
    pub fn drain_ordered(&mut self) -> Vec<TimedEvent<T>> {
        let mut events = Vec::with_capacity(self.heap.len());
        while let Some(slot) = self.heap.pop() {
            events.push(slot.event);
        }
        events
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
