//! Cooperative control loop and its hardware seams.
//!
//! [`Controller::tick`] is called as often as the host can manage. Each call
//! replays every debounce tick that fell due since the previous call, applies
//! at most one position change, services the indicator and refresh deadlines
//! and finally pushes the newest display frame. Nothing in here blocks or
//! sleeps; the caller owns the clock.

use crate::config::{ConfigError, ControllerConfig, OverridePrecedence};
use crate::debounce::{ButtonLevel, DebounceIntegrator};
use crate::display::{DisplayFrame, StatusSnapshot};
use crate::effects::{Deadline, IndicatorPulse, RefreshTimer};
use crate::position::{
    PositionChange, PositionError, PositionIndex, PositionSource, PositionStateMachine,
};
use crate::remote::NotificationRecord;
use crate::scheduler::TickTimeline;
use crate::telemetry::{TelemetryEventKind, TelemetryRecorder};
use crate::time::Millis;

/// Servo (or any pulse-width driven actuator).
pub trait Actuator {
    fn set_pulse_width(&mut self, pulse_us: u16);
}

/// Overwrite-only status screen; the most recent frame wins.
pub trait StatusDisplay {
    fn render(&mut self, frame: &DisplayFrame);
}

/// Status LED.
pub trait Indicator {
    fn set_lit(&mut self, lit: bool);
}

/// Inbound side of the radio link, polled once per iteration.
pub trait RemoteLink {
    /// Returns and clears the pending raw position command.
    fn poll_position_command(&self) -> Option<u8>;

    fn has_notification(&self) -> bool;

    /// Returns and clears the unread notification.
    fn take_notification(&self) -> Option<NotificationRecord>;

    fn is_connected(&self) -> bool;
}

/// Which frame, if any, an iteration pushed to the display.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RenderedFrame {
    Status,
    Notification,
}

/// Summary of one [`Controller::tick`] call.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TickReport {
    /// Debounce ticks replayed this iteration.
    pub debounce_ticks: u32,
    /// Elapsed debounce ticks skipped by the catch-up cap.
    pub dropped_ticks: u32,
    pub change: Option<PositionChange>,
    /// Event discarded because the other source won the precedence rule.
    pub superseded: Option<PositionSource>,
    pub rejected_command: Option<PositionError>,
    pub indicator_off: bool,
    /// New link state when it changed this iteration.
    pub link_changed: Option<bool>,
    pub rendered: Option<RenderedFrame>,
}

impl TickReport {
    /// Returns `true` when nothing observable happened.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.dropped_ticks == 0
            && self.change.is_none()
            && self.superseded.is_none()
            && self.rejected_command.is_none()
            && !self.indicator_off
            && self.link_changed.is_none()
            && self.rendered.is_none()
    }
}

/// The control loop, generic over its output seams.
pub struct Controller<A, D, I> {
    config: ControllerConfig,
    actuator: A,
    display: D,
    indicator: I,
    integrator: DebounceIntegrator,
    timeline: TickTimeline,
    positions: PositionStateMachine,
    indicator_pulse: IndicatorPulse,
    refresh: RefreshTimer,
    notification_hold: Deadline,
    link_connected: bool,
    telemetry: TelemetryRecorder,
}

impl<A, D, I> Controller<A, D, I>
where
    A: Actuator,
    D: StatusDisplay,
    I: Indicator,
{
    /// Builds a controller after validating `config`.
    pub fn new(
        config: ControllerConfig,
        actuator: A,
        display: D,
        indicator: I,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            actuator,
            display,
            indicator,
            integrator: DebounceIntegrator::new(config.thresholds),
            timeline: TickTimeline::new(
                Millis::ZERO,
                config.debounce_period_ms,
                config.max_catch_up,
            ),
            positions: PositionStateMachine::new(config.positions),
            indicator_pulse: IndicatorPulse::new(config.indicator_pulse_ms),
            refresh: RefreshTimer::new(config.refresh_period_ms),
            notification_hold: Deadline::DISARMED,
            link_connected: false,
            telemetry: TelemetryRecorder::new(),
        })
    }

    /// Drives outputs to their start-up state and anchors the timelines.
    ///
    /// Call once before the first [`tick`](Self::tick).
    pub fn initialize(&mut self, now: Millis) {
        self.actuator.set_pulse_width(self.positions.pulse_us());
        self.indicator.set_lit(false);
        self.display.render(&DisplayFrame::Splash);

        self.timeline.reset(now);
        self.refresh.start(now);
        self.telemetry.record(TelemetryEventKind::Started, now);
    }

    /// Runs one loop iteration with the raw button sample taken at `now`.
    pub fn tick<R>(&mut self, now: Millis, raw: bool, remote: &R) -> TickReport
    where
        R: RemoteLink + ?Sized,
    {
        let mut report = TickReport::default();

        let due = self.timeline.due_ticks(now);
        report.debounce_ticks = due.replay;
        report.dropped_ticks = due.dropped;
        if due.dropped > 0 {
            self.telemetry
                .record(TelemetryEventKind::TicksDropped(due.dropped), now);
        }

        let mut local_edge = false;
        for _ in 0..due.replay {
            local_edge |= self.integrator.step(raw).pressed;
        }

        let remote_target = remote
            .poll_position_command()
            .and_then(|raw| match self.positions.table().index(raw) {
                Ok(index) => Some(index),
                Err(error) => {
                    report.rejected_command = Some(error);
                    self.telemetry
                        .record(TelemetryEventKind::CommandRejected(raw), now);
                    None
                }
            });

        if let Some(change) = self.resolve_change(local_edge, remote_target, &mut report, now) {
            self.apply_change(change, now);
            report.change = Some(change);
        }

        if self.indicator_pulse.poll(now) {
            self.indicator.set_lit(false);
            self.telemetry.record(TelemetryEventKind::IndicatorOff, now);
            report.indicator_off = true;
        }

        let connected = remote.is_connected();
        if connected != self.link_connected {
            self.link_connected = connected;
            self.telemetry
                .record(TelemetryEventKind::LinkChanged(connected), now);
            report.link_changed = Some(connected);
        }

        let pending = if remote.has_notification() {
            remote.take_notification()
        } else {
            None
        };
        if let Some(record) = pending {
            self.display.render(&DisplayFrame::Notification(record));
            if self.config.notification_hold_ms > 0 {
                self.notification_hold
                    .arm(now, self.config.notification_hold_ms);
            }
            self.telemetry
                .record(TelemetryEventKind::NotificationShown, now);
            report.rendered = Some(RenderedFrame::Notification);
        }

        // Status refreshes stay suppressed while a notification is held.
        let holding = self.notification_hold.is_armed() && !self.notification_hold.is_due(now);
        if self.refresh.poll(now) && !holding {
            self.notification_hold.disarm();
            self.display.render(&DisplayFrame::Status(self.snapshot()));
            report.rendered = Some(RenderedFrame::Status);
        }

        report
    }

    fn resolve_change(
        &mut self,
        local_edge: bool,
        remote_target: Option<PositionIndex>,
        report: &mut TickReport,
        now: Millis,
    ) -> Option<PositionChange> {
        let change = match (local_edge, remote_target) {
            (false, None) => return None,
            (true, None) => self.positions.advance(),
            (false, Some(target)) => self.positions.jump_to(target),
            (true, Some(target)) => {
                let (change, loser) = match self.config.precedence {
                    OverridePrecedence::RemoteFirst => {
                        (self.positions.jump_to(target), PositionSource::Button)
                    }
                    OverridePrecedence::LocalFirst => {
                        (self.positions.advance(), PositionSource::Remote)
                    }
                };
                report.superseded = Some(loser);
                self.telemetry
                    .record(TelemetryEventKind::PrecedenceDropped(loser), now);
                change
            }
        };
        Some(change)
    }

    fn apply_change(&mut self, change: PositionChange, now: Millis) {
        self.actuator.set_pulse_width(change.pulse_us);
        // A move ends any notification hold so the next refresh shows it.
        self.notification_hold.disarm();
        self.indicator.set_lit(true);
        self.indicator_pulse.trigger(now);
        self.telemetry.record(
            TelemetryEventKind::PositionChanged {
                from: change.from,
                to: change.to,
                source: change.source,
            },
            now,
        );
    }

    /// State shown on the next status refresh.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            position: self.positions.current(),
            position_count: self.positions.table().len(),
            label: self.positions.label(),
            pulse_us: self.positions.pulse_us(),
            button_down: self.integrator.level().is_down(),
            link_connected: self.link_connected,
        }
    }

    #[must_use]
    pub fn position(&self) -> PositionIndex {
        self.positions.current()
    }

    #[must_use]
    pub fn button_level(&self) -> ButtonLevel {
        self.integrator.level()
    }

    #[must_use]
    pub fn integrator(&self) -> &DebounceIntegrator {
        &self.integrator
    }

    #[must_use]
    pub fn timeline(&self) -> &TickTimeline {
        &self.timeline
    }

    #[must_use]
    pub fn indicator_pulse(&self) -> &IndicatorPulse {
        &self.indicator_pulse
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteMailbox;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[derive(Default)]
    struct Servo(Option<u16>);

    impl Actuator for Servo {
        fn set_pulse_width(&mut self, pulse_us: u16) {
            self.0 = Some(pulse_us);
        }
    }

    #[derive(Default)]
    struct Screen {
        frames: usize,
        last: Option<DisplayFrame>,
    }

    impl StatusDisplay for Screen {
        fn render(&mut self, frame: &DisplayFrame) {
            self.frames += 1;
            self.last = Some(frame.clone());
        }
    }

    #[derive(Default)]
    struct Led(bool);

    impl Indicator for Led {
        fn set_lit(&mut self, lit: bool) {
            self.0 = lit;
        }
    }

    type TestController = Controller<Servo, Screen, Led>;

    fn controller(config: ControllerConfig) -> TestController {
        let mut controller =
            Controller::new(config, Servo::default(), Screen::default(), Led::default())
                .expect("valid config");
        controller.initialize(Millis::ZERO);
        controller
    }

    /// Holds the button for `ms` milliseconds in 1 ms steps starting at `start`.
    fn hold(
        controller: &mut TestController,
        remote: &RemoteMailbox<NoopRawMutex>,
        start: u32,
        ms: u32,
        raw: bool,
    ) -> heapless::Vec<TickReport, 16> {
        let mut notable = heapless::Vec::new();
        for t in start..start + ms {
            let report = controller.tick(Millis::from_raw(t + 1), raw, remote);
            if report.change.is_some() || report.indicator_off {
                notable.push(report).unwrap();
            }
        }
        notable
    }

    #[test]
    fn initialize_parks_outputs() {
        let controller = controller(ControllerConfig::DEFAULT);
        assert_eq!(controller.actuator().0, Some(1_000));
        assert!(!controller.indicator().0);
        assert_eq!(controller.display().last, Some(DisplayFrame::Splash));
    }

    #[test]
    fn press_advances_and_pulses_indicator() {
        let mut controller = controller(ControllerConfig::DEFAULT);
        let remote = RemoteMailbox::<NoopRawMutex>::new();

        // Eight 5 ms ticks of activity reach the on-threshold at t=40.
        let reports = hold(&mut controller, &remote, 0, 60, true);
        assert_eq!(reports.len(), 1);
        let change = reports[0].change.expect("edge");
        assert_eq!(change.to.get(), 1);
        assert_eq!(change.pulse_us, 1_500);
        assert_eq!(controller.actuator().0, Some(1_500));
        assert!(controller.indicator().0);
        assert_eq!(
            controller.indicator_pulse().deadline().at(),
            Some(Millis::from_raw(340))
        );

        // Releasing does not move; the LED goes out at t=340.
        let reports = hold(&mut controller, &remote, 60, 400, false);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].indicator_off);
        assert!(!controller.indicator().0);
        assert_eq!(controller.position().get(), 1);
    }

    #[test]
    fn remote_override_wins_by_default() {
        let mut controller = controller(ControllerConfig::DEFAULT);
        let remote = RemoteMailbox::<NoopRawMutex>::new();
        hold(&mut controller, &remote, 0, 39, true);

        remote.post_position(2);
        let report = controller.tick(Millis::from_raw(40), true, &remote);
        let change = report.change.expect("remote applied");
        assert_eq!(change.source, PositionSource::Remote);
        assert_eq!(change.to.get(), 2);
        assert_eq!(report.superseded, Some(PositionSource::Button));
    }

    #[test]
    fn local_first_precedence_drops_remote() {
        let config = ControllerConfig::DEFAULT.with_precedence(OverridePrecedence::LocalFirst);
        let mut controller = controller(config);
        let remote = RemoteMailbox::<NoopRawMutex>::new();
        hold(&mut controller, &remote, 0, 39, true);

        remote.post_position(2);
        let report = controller.tick(Millis::from_raw(40), true, &remote);
        let change = report.change.expect("press applied");
        assert_eq!(change.source, PositionSource::Button);
        assert_eq!(change.to.get(), 1);
        assert_eq!(report.superseded, Some(PositionSource::Remote));
        assert_eq!(remote.poll_position_command(), None);
    }

    #[test]
    fn out_of_range_command_is_rejected() {
        let mut controller = controller(ControllerConfig::DEFAULT);
        let remote = RemoteMailbox::<NoopRawMutex>::new();
        remote.post_position(7);

        let report = controller.tick(Millis::from_raw(5), false, &remote);
        assert!(report.change.is_none());
        assert_eq!(
            report.rejected_command,
            Some(PositionError::OutOfRange {
                requested: 7,
                count: 3
            })
        );
        assert_eq!(controller.position(), PositionIndex::HOME);
        assert_eq!(
            controller.telemetry().latest().map(|record| record.event),
            Some(TelemetryEventKind::CommandRejected(7))
        );
    }

    #[test]
    fn notification_holds_off_status_refresh() {
        let config = ControllerConfig::DEFAULT.with_notification_hold_ms(1_000);
        let mut controller = controller(config);
        let remote = RemoteMailbox::<NoopRawMutex>::new();
        assert!(remote.post_raw_notification("Alice|09:41|hi"));

        let report = controller.tick(Millis::from_raw(50), false, &remote);
        assert_eq!(report.rendered, Some(RenderedFrame::Notification));
        assert!(!remote.has_notification());

        // Refresh at t=100 is suppressed while the hold runs.
        let report = controller.tick(Millis::from_raw(100), false, &remote);
        assert_eq!(report.rendered, None);

        let report = controller.tick(Millis::from_raw(1_100), false, &remote);
        assert_eq!(report.rendered, Some(RenderedFrame::Status));
        assert!(matches!(
            controller.display().last,
            Some(DisplayFrame::Status(_))
        ));
    }

    #[test]
    fn position_change_ends_notification_hold() {
        let mut controller = controller(ControllerConfig::DEFAULT);
        let remote = RemoteMailbox::<NoopRawMutex>::new();
        assert!(remote.post_raw_notification("Alice|09:41|hi"));
        let report = controller.tick(Millis::from_raw(50), false, &remote);
        assert_eq!(report.rendered, Some(RenderedFrame::Notification));

        remote.post_position(2);
        let report = controller.tick(Millis::from_raw(60), false, &remote);
        assert!(report.change.is_some());

        // The next refresh shows the new position instead of waiting out the hold.
        let report = controller.tick(Millis::from_raw(100), false, &remote);
        assert_eq!(report.rendered, Some(RenderedFrame::Status));
        match &controller.display().last {
            Some(DisplayFrame::Status(snapshot)) => assert_eq!(snapshot.position.get(), 2),
            other => panic!("expected status frame, got {other:?}"),
        }
    }

    #[test]
    fn long_stall_caps_replay() {
        let config = ControllerConfig::DEFAULT.with_max_catch_up(10);
        let mut controller = controller(config);
        let remote = RemoteMailbox::<NoopRawMutex>::new();

        let report = controller.tick(Millis::from_raw(1_003), false, &remote);
        assert_eq!(report.debounce_ticks, 10);
        assert_eq!(report.dropped_ticks, 190);
        assert!(controller.timeline().pending(Millis::from_raw(1_003)) < 5);
        assert_eq!(controller.telemetry().dropped_ticks_total(), 190);
    }

    #[test]
    fn link_changes_are_reported_once() {
        let mut controller = controller(ControllerConfig::DEFAULT);
        let remote = RemoteMailbox::<NoopRawMutex>::new();
        remote.set_connected(true);

        let report = controller.tick(Millis::from_raw(1), false, &remote);
        assert_eq!(report.link_changed, Some(true));
        let report = controller.tick(Millis::from_raw(2), false, &remote);
        assert_eq!(report.link_changed, None);
        assert!(controller.snapshot().link_connected);
    }
}
