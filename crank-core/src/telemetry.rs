//! Telemetry event catalog and in-memory history.
//!
//! The control loop never logs directly. Notable events are written into a
//! fixed-size ring so the firmware can drain them to `defmt` and the emulator
//! can replay them in a `history` view, both without allocation.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::position::{PositionIndex, PositionSource};
use crate::time::Millis;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Monotonic identifier assigned to each record; wraps on overflow.
pub type EventId = u32;

/// Events raised by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    /// `initialize` completed.
    Started,
    PositionChanged {
        from: PositionIndex,
        to: PositionIndex,
        source: PositionSource,
    },
    /// Replay cap hit; the count of skipped debounce ticks.
    TicksDropped(u32),
    /// Remote command outside the position table.
    CommandRejected(u8),
    /// Same-iteration event discarded by the precedence rule.
    PrecedenceDropped(PositionSource),
    NotificationShown,
    IndicatorOff,
    /// Radio link went up (`true`) or down (`false`).
    LinkChanged(bool),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::Started => f.write_str("started"),
            TelemetryEventKind::PositionChanged { from, to, source } => {
                write!(f, "position {from} -> {to} ({source})")
            }
            TelemetryEventKind::TicksDropped(count) => write!(f, "ticks-dropped {count}"),
            TelemetryEventKind::CommandRejected(raw) => write!(f, "command-rejected {raw}"),
            TelemetryEventKind::PrecedenceDropped(source) => {
                write!(f, "precedence-dropped {source}")
            }
            TelemetryEventKind::NotificationShown => f.write_str("notification-shown"),
            TelemetryEventKind::IndicatorOff => f.write_str("indicator-off"),
            TelemetryEventKind::LinkChanged(true) => f.write_str("link-up"),
            TelemetryEventKind::LinkChanged(false) => f.write_str("link-down"),
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp: Millis,
    pub event: TelemetryEventKind,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} @{} {}", self.id, self.timestamp, self.event)
    }
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    next_event_id: EventId,
    dropped_ticks_total: u32,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
            dropped_ticks_total: 0,
        }
    }

    /// Records an event and returns its identifier.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp: Millis) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        if let TelemetryEventKind::TicksDropped(count) = event {
            self.dropped_ticks_total = self.dropped_ticks_total.saturating_add(count);
        }

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });

        id
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns records with an id at or after `since`, oldest first.
    ///
    /// Lets a consumer drain only what it has not seen yet.
    pub fn since(&self, since: EventId) -> impl Iterator<Item = &TelemetryRecord> {
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id.wrapping_sub(since) < u32::MAX / 2)
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Identifier the next record will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Ticks dropped by capped replay since start-up.
    #[must_use]
    pub const fn dropped_ticks_total(&self) -> u32 {
        self.dropped_ticks_total
    }

    /// Returns the number of records currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
