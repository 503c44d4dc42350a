//! Engine events.
//!
//! The engine pushes typed events into a bounded bus as it works; the host
//! drains them after each step for sounds, particles, or logging. Events are
//! advisory: dropping them never affects simulation state.

use crate::grid::Pos3;
use crate::path::TransitId;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A pipe node joined the grid.
    NodePlaced { at: Pos3 },
    /// A pipe node left the grid, spilling `transits` in-flight units.
    NodeRemoved { at: Pos3, transits: usize },
    /// A ripple rebuilt the component containing `at`, touching
    /// `nodes` pipe nodes.
    NetworkRebuilt { at: Pos3, nodes: usize },
    /// A unit was pulled out of storage and set moving.
    TransitStarted { id: TransitId, from: Pos3 },
    /// A unit crossed from one node to the next.
    TransitHop { id: TransitId, from: Pos3, to: Pos3 },
    /// A unit arrived and its delivery was committed.
    TransitDelivered { id: TransitId, destination: Pos3 },
    /// A unit found no feasible destination and is waiting at `at`.
    TransitStuck { id: TransitId, at: Pos3 },
    /// A waiting or broken-path unit was given a fresh route from `at`.
    TransitRerouted { id: TransitId, at: Pos3 },
}

/// Discriminant used for suppression; one per [`Event`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NodePlaced,
    NodeRemoved,
    NetworkRebuilt,
    TransitStarted,
    TransitHop,
    TransitDelivered,
    TransitStuck,
    TransitRerouted,
}

const KIND_COUNT: usize = 8;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NodePlaced { .. } => EventKind::NodePlaced,
            Event::NodeRemoved { .. } => EventKind::NodeRemoved,
            Event::NetworkRebuilt { .. } => EventKind::NetworkRebuilt,
            Event::TransitStarted { .. } => EventKind::TransitStarted,
            Event::TransitHop { .. } => EventKind::TransitHop,
            Event::TransitDelivered { .. } => EventKind::TransitDelivered,
            Event::TransitStuck { .. } => EventKind::TransitStuck,
            Event::TransitRerouted { .. } => EventKind::TransitRerouted,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        match self {
            EventKind::NodePlaced => 0,
            EventKind::NodeRemoved => 1,
            EventKind::NetworkRebuilt => 2,
            EventKind::TransitStarted => 3,
            EventKind::TransitHop => 4,
            EventKind::TransitDelivered => 5,
            EventKind::TransitStuck => 6,
            EventKind::TransitRerouted => 7,
        }
    }
}

/// Bounded event queue. When full, the oldest event is dropped; simulation
/// never blocks on an unread bus.
#[derive(Debug)]
pub struct EventBus {
    events: VecDeque<Event>,
    capacity: usize,
    suppressed: [bool; KIND_COUNT],
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            suppressed: [false; KIND_COUNT],
        }
    }

    /// Stop recording events of `kind`. Chatty kinds like `TransitHop` are
    /// worth suppressing on large networks.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn push(&mut self, event: Event) {
        if self.suppressed[event.kind().index()] {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Remove and return all queued events, oldest first.
    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivered(n: u64) -> Event {
        Event::TransitDelivered {
            id: TransitId(n),
            destination: Pos3::new(0, 0, 0),
        }
    }

    #[test]
    fn drains_in_order() {
        let mut bus = EventBus::new(8);
        bus.push(delivered(1));
        bus.push(delivered(2));
        let drained = bus.drain();
        assert_eq!(drained, vec![delivered(1), delivered(2)]);
        assert!(bus.is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut bus = EventBus::new(2);
        bus.push(delivered(1));
        bus.push(delivered(2));
        bus.push(delivered(3));
        assert_eq!(bus.drain(), vec![delivered(2), delivered(3)]);
    }

    #[test]
    fn suppression_filters_by_kind() {
        let mut bus = EventBus::new(8);
        bus.suppress(EventKind::TransitHop);
        bus.push(Event::TransitHop {
            id: TransitId(1),
            from: Pos3::new(0, 0, 0),
            to: Pos3::new(1, 0, 0),
        });
        bus.push(delivered(1));
        assert_eq!(bus.len(), 1);

        bus.unsuppress(EventKind::TransitHop);
        bus.push(Event::TransitHop {
            id: TransitId(2),
            from: Pos3::new(0, 0, 0),
            to: Pos3::new(1, 0, 0),
        });
        assert_eq!(bus.len(), 2);
    }
}
