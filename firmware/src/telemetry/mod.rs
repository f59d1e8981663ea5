//! Forwards controller telemetry to the log sink.
//!
//! `crank-core` only records events into its ring. This module drains the
//! records written since the previous drain and mirrors them to defmt on the
//! target or stdout on the host, so the control task never formats inline.

use crank_core::telemetry::{EventId, TelemetryEventKind, TelemetryRecord, TelemetryRecorder};

/// How loudly a record is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
}

impl Severity {
    #[must_use]
    pub const fn of(event: &TelemetryEventKind) -> Self {
        match event {
            TelemetryEventKind::TicksDropped(_)
            | TelemetryEventKind::CommandRejected(_)
            | TelemetryEventKind::PrecedenceDropped(_) => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

/// Cursor into a [`TelemetryRecorder`] remembering the next unseen id.
pub struct TelemetryDrain {
    next: EventId,
}

impl TelemetryDrain {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Emits every record written since the last call and returns how many
    /// were emitted.
    ///
    /// Records that were overwritten in the ring before being drained are
    /// silently skipped.
    pub fn drain<const N: usize>(&mut self, recorder: &TelemetryRecorder<N>) -> usize {
        let mut emitted = 0;
        for record in recorder.since(self.next) {
            emit_log(Severity::of(&record.event), record);
            emitted += 1;
        }
        self.next = recorder.next_id();
        emitted
    }

    pub const fn next_id(&self) -> EventId {
        self.next
    }
}

impl Default for TelemetryDrain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "none")]
fn emit_log(severity: Severity, record: &TelemetryRecord) {
    match severity {
        Severity::Info => defmt::info!("telemetry {}", defmt::Display2Format(record)),
        Severity::Warn => defmt::warn!("telemetry {}", defmt::Display2Format(record)),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(severity: Severity, record: &TelemetryRecord) {
    let level = match severity {
        Severity::Info => "info",
        Severity::Warn => "warn",
    };
    println!("telemetry:{level} {record}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crank_core::position::PositionSource;
    use crank_core::time::Millis;

    #[test]
    fn drains_only_new_records() {
        let mut recorder = TelemetryRecorder::<8>::new();
        let mut drain = TelemetryDrain::new();

        recorder.record(TelemetryEventKind::Started, Millis::ZERO);
        assert_eq!(drain.drain(&recorder), 1);
        assert_eq!(drain.drain(&recorder), 0);

        recorder.record(TelemetryEventKind::LinkChanged(true), Millis::from_raw(10));
        recorder.record(TelemetryEventKind::IndicatorOff, Millis::from_raw(300));
        assert_eq!(drain.drain(&recorder), 2);
        assert_eq!(drain.next_id(), 3);
    }

    #[test]
    fn overwritten_records_are_skipped() {
        let mut recorder = TelemetryRecorder::<2>::new();
        let mut drain = TelemetryDrain::new();

        for raw in 0..5 {
            recorder.record(TelemetryEventKind::CommandRejected(raw), Millis::ZERO);
        }
        assert_eq!(drain.drain(&recorder), 2);
    }

    #[test]
    fn faults_are_warnings() {
        assert_eq!(
            Severity::of(&TelemetryEventKind::TicksDropped(4)),
            Severity::Warn
        );
        assert_eq!(
            Severity::of(&TelemetryEventKind::PrecedenceDropped(PositionSource::Button)),
            Severity::Warn
        );
        assert_eq!(
            Severity::of(&TelemetryEventKind::NotificationShown),
            Severity::Info
        );
    }
}
