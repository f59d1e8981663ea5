use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crank_core::config::ControllerConfig;
use crank_core::controller::{Actuator, Controller, Indicator, StatusDisplay, TickReport};
use crank_core::display::{DISPLAY_WIDTH, DisplayFrame, TEXT_COLUMNS};
use crank_core::position::servo_duty;
use crank_core::remote::{LinkStatus, RemoteFrame, RemoteMailbox};
use crank_core::telemetry::EventId;
use crank_core::time::Millis;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Mailbox shared between the session and any input thread.
pub type SharedMailbox = Arc<RemoteMailbox<CriticalSectionRawMutex>>;

/// Duty resolution reported for the emulated 16-bit PWM timer.
pub const EMULATED_MAX_DUTY: u32 = 65_535;

const DEFAULT_HOLD_MS: u32 = 100;
/// A tap holds long enough to debounce and releases past the indicator pulse.
const TAP_PRESS_MS: u32 = 100;
const TAP_RELEASE_MS: u32 = 400;
const DEFAULT_HISTORY: usize = 10;
/// Upper bound for a single time-advancing command (ten minutes).
const MAX_ADVANCE_MS: u32 = 600_000;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "press",
        "press [ms]              - hold the button for ms (default 100)",
    ),
    (
        "release",
        "release [ms]            - release the button for ms (default 100)",
    ),
    (
        "tap",
        "tap                     - press then release, long enough to register",
    ),
    (
        "chatter",
        "chatter <ms>            - bounce the contact every millisecond",
    ),
    (
        "wait",
        "wait <ms>               - let time pass with the button unchanged",
    ),
    (
        "stall",
        "stall <ms>              - run one late iteration after ms",
    ),
    (
        "remote",
        "remote <n>              - post a radio position command",
    ),
    (
        "notify",
        "notify <from|at|text>   - post a radio notification",
    ),
    (
        "frame",
        "frame <line>            - feed a raw radio wire frame (P1, N..., OK+CONN)",
    ),
    (
        "link",
        "link <up|down>          - set the radio link state",
    ),
    (
        "screen",
        "screen                  - show the last rendered display frame",
    ),
    (
        "status",
        "status                  - show controller state",
    ),
    (
        "history",
        "history [n]             - show the most recent telemetry",
    ),
    (
        "help",
        "help [topic]            - show help for a command",
    ),
];

/// Servo stand-in remembering the commanded pulse.
#[derive(Debug, Default)]
pub struct HostServo {
    pulse_us: Option<u16>,
    moves: usize,
}

impl HostServo {
    pub fn pulse_us(&self) -> Option<u16> {
        self.pulse_us
    }

    pub fn duty(&self) -> Option<u32> {
        self.pulse_us
            .map(|pulse| servo_duty(pulse, EMULATED_MAX_DUTY))
    }

    pub fn moves(&self) -> usize {
        self.moves
    }
}

impl Actuator for HostServo {
    fn set_pulse_width(&mut self, pulse_us: u16) {
        self.pulse_us = Some(pulse_us);
        self.moves += 1;
    }
}

/// Screen stand-in keeping the most recent frame.
#[derive(Debug, Default)]
pub struct HostScreen {
    last: Option<DisplayFrame>,
    renders: usize,
}

impl HostScreen {
    pub fn last(&self) -> Option<&DisplayFrame> {
        self.last.as_ref()
    }

    pub fn renders(&self) -> usize {
        self.renders
    }
}

impl StatusDisplay for HostScreen {
    fn render(&mut self, frame: &DisplayFrame) {
        self.last = Some(frame.clone());
        self.renders += 1;
    }
}

#[derive(Debug, Default)]
pub struct HostLed {
    lit: bool,
}

impl HostLed {
    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl Indicator for HostLed {
    fn set_lit(&mut self, lit: bool) {
        self.lit = lit;
    }
}

pub type HostController = Controller<HostServo, HostScreen, HostLed>;

#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    pub config: ControllerConfig,
    /// Virtual clock reading at start-up.
    pub start: Millis,
    /// File receiving a copy of every command and response.
    pub transcript: Option<PathBuf>,
}

/// Controller driven by a virtual millisecond clock.
pub struct Session {
    controller: HostController,
    remote: SharedMailbox,
    now: Millis,
    button_down: bool,
    next_event: EventId,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        Self::with_mailbox(options, Arc::new(RemoteMailbox::new()))
    }

    /// Builds a session whose radio side is fed through `remote`.
    pub fn with_mailbox(options: SessionOptions, remote: SharedMailbox) -> io::Result<Self> {
        let mut controller = Controller::new(
            options.config,
            HostServo::default(),
            HostScreen::default(),
            HostLed::default(),
        )
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error.to_string()))?;
        controller.initialize(options.start);

        let transcript = options
            .transcript
            .as_deref()
            .map(TranscriptLogger::new)
            .transpose()?;

        Ok(Self {
            controller,
            remote,
            now: options.start,
            button_down: false,
            next_event: 0,
            transcript,
        })
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.now;
        self.log(now, TranscriptRole::Host, trimmed)?;

        let (verb, rest) = trimmed
            .split_once(char::is_whitespace)
            .map_or((trimmed, ""), |(verb, rest)| (verb, rest.trim()));

        let lines = match verb.to_ascii_lowercase().as_str() {
            "help" => handle_help(rest),
            "press" => self.timed(rest, DEFAULT_HOLD_MS, |session, ms| session.advance(ms, true)),
            "release" => {
                self.timed(rest, DEFAULT_HOLD_MS, |session, ms| session.advance(ms, false))
            }
            "tap" => {
                let mut lines = self.advance(TAP_PRESS_MS, true);
                lines.extend(self.advance(TAP_RELEASE_MS, false));
                lines
            }
            "chatter" => self.timed(rest, DEFAULT_HOLD_MS, Self::chatter),
            "wait" => self.timed(rest, DEFAULT_HOLD_MS, |session, ms| {
                session.advance(ms, session.button_down)
            }),
            "stall" => self.timed(rest, DEFAULT_HOLD_MS, Self::stall),
            "remote" => self.handle_remote(rest),
            "notify" => {
                let ack = if self.remote.post_raw_notification(rest) {
                    "OK notification posted".to_string()
                } else {
                    "ERR notification needs sender|timestamp|message".to_string()
                };
                self.settle(ack)
            }
            "frame" => {
                let ack = match self.remote.ingest_line(rest) {
                    Ok(frame) => format!("OK frame {}", describe_frame(&frame)),
                    Err(error) => format!("ERR frame {error}"),
                };
                self.settle(ack)
            }
            "link" => self.handle_link(rest),
            "screen" => self.screen_lines(),
            "status" => self.status_lines(),
            "history" => self.history_lines(rest),
            _ => vec![format!("ERR unknown command `{verb}` (try `help`)")],
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    /// Runs one iteration per virtual millisecond for `ms` with the button
    /// held at `raw`, returning narration for what happened.
    fn advance(&mut self, ms: u32, raw: bool) -> Vec<String> {
        self.drive(ms, |_| raw)
    }

    fn drive(&mut self, ms: u32, mut sample: impl FnMut(u32) -> bool) -> Vec<String> {
        for step in 0..ms {
            self.tick_once(self.now + 1, sample(step));
        }
        self.drain_telemetry()
    }

    fn chatter(&mut self, ms: u32) -> Vec<String> {
        let mut lines = self.drive(ms, |step| step % 2 == 0);
        if lines.is_empty() {
            lines.push(format!(
                "bounced for {ms}ms, integrator counter={}",
                self.controller.integrator().counter()
            ));
        }
        lines
    }

    /// Runs a single loop iteration at `now`, however far that is from the
    /// previous one. The live view calls this with the wall clock.
    pub fn tick_at(&mut self, now: Millis, raw: bool) -> Vec<String> {
        self.tick_once(now, raw);
        self.drain_telemetry()
    }

    fn tick_once(&mut self, now: Millis, raw: bool) -> TickReport {
        self.button_down = raw;
        self.now = now;
        self.controller.tick(now, raw, &*self.remote)
    }

    fn stall(&mut self, ms: u32) -> Vec<String> {
        let report = self.tick_once(self.now + ms, self.button_down);

        let mut lines = vec![format!(
            "late iteration at {} replayed {} debounce ticks",
            self.now, report.debounce_ticks
        )];
        lines.extend(self.drain_telemetry());
        lines
    }

    /// Acknowledges a radio-side write, then lets the loop observe it.
    fn settle(&mut self, ack: String) -> Vec<String> {
        let mut lines = vec![ack];
        lines.extend(self.advance(1, self.button_down));
        lines
    }

    fn timed<F>(&mut self, argument: &str, default_ms: u32, action: F) -> Vec<String>
    where
        F: FnOnce(&mut Self, u32) -> Vec<String>,
    {
        match parse_duration(argument, default_ms) {
            Ok(ms) => action(self, ms),
            Err(message) => vec![message],
        }
    }

    fn handle_remote(&mut self, argument: &str) -> Vec<String> {
        match argument.parse::<u8>() {
            Ok(raw) => {
                self.remote.post_position(raw);
                self.settle(format!("OK remote position {raw} posted"))
            }
            Err(_) => vec![format!("ERR expected a position number, got `{argument}`")],
        }
    }

    fn handle_link(&mut self, argument: &str) -> Vec<String> {
        let connected = match argument.to_ascii_lowercase().as_str() {
            "up" | "on" => true,
            "down" | "off" => false,
            _ => return vec!["ERR expected `link up` or `link down`".to_string()],
        };
        self.remote.set_connected(connected);
        self.settle(format!("OK link {argument}"))
    }

    fn drain_telemetry(&mut self) -> Vec<String> {
        let telemetry = self.controller.telemetry();
        let lines = telemetry
            .since(self.next_event)
            .map(|record| format!("  {record}"))
            .collect();
        self.next_event = telemetry.next_id();
        lines
    }

    pub fn screen_lines(&self) -> Vec<String> {
        match self.controller.display().last() {
            Some(frame) => render_ascii(frame),
            None => vec!["(screen blank)".to_string()],
        }
    }

    pub fn status_lines(&self) -> Vec<String> {
        let snapshot = self.controller.snapshot();
        let servo = self.controller.actuator();
        let duty = servo.duty().unwrap_or(0);
        let telemetry = self.controller.telemetry();

        vec![
            format!("time={} raw-button={}", self.now, on_off(self.button_down)),
            format!(
                "position={} label={} pulse={}us duty={duty}/{EMULATED_MAX_DUTY}",
                snapshot.position.ordinal(),
                snapshot.label,
                snapshot.pulse_us,
            ),
            format!(
                "debounced={} counter={} indicator={} frames={}",
                if snapshot.button_down { "down" } else { "up" },
                self.controller.integrator().counter(),
                on_off(self.controller.indicator().is_lit()),
                self.controller.display().renders(),
            ),
            format!(
                "link={} precedence={} dropped-ticks={} rejected-frames={}",
                if snapshot.link_connected { "up" } else { "down" },
                self.controller.config().precedence,
                telemetry.dropped_ticks_total(),
                self.remote.rejected_frames(),
            ),
        ]
    }

    fn history_lines(&self, argument: &str) -> Vec<String> {
        let count = if argument.is_empty() {
            DEFAULT_HISTORY
        } else {
            match argument.parse::<usize>() {
                Ok(count) => count,
                Err(_) => return vec![format!("ERR expected a record count, got `{argument}`")],
            }
        };

        let records: Vec<String> = self
            .controller
            .telemetry()
            .oldest_first()
            .map(ToString::to_string)
            .collect();
        let skip = records.len().saturating_sub(count);
        records.into_iter().skip(skip).collect()
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn controller(&self) -> &HostController {
        &self.controller
    }

    pub fn remote(&self) -> &SharedMailbox {
        &self.remote
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let now = self.now;
        for line in lines {
            self.log(now, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }

    fn log(&mut self, at: Millis, role: TranscriptRole, line: &str) -> io::Result<()> {
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(at, role, line),
            None => Ok(()),
        }
    }
}

fn handle_help(topic: &str) -> Vec<String> {
    let mut lines = Vec::new();
    if topic.is_empty() {
        lines.push("Available commands:".to_string());
        for (_, detail) in HELP_TOPICS {
            lines.push(format!("  {detail}"));
        }
        lines.push("Type `help <topic>` for a specific command.".to_string());
    } else if let Some((_, detail)) = HELP_TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
    {
        lines.push((*detail).to_string());
    } else {
        lines.push(format!("No help available for `{topic}`."));
        lines.push(format!("Available topics: {}", help_topic_list()));
    }
    lines
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_duration(argument: &str, default_ms: u32) -> Result<u32, String> {
    if argument.is_empty() {
        return Ok(default_ms);
    }
    let digits = argument.strip_suffix("ms").unwrap_or(argument);
    match digits.parse::<u32>() {
        Ok(ms) if ms <= MAX_ADVANCE_MS => Ok(ms),
        Ok(_) => Err(format!("ERR at most {MAX_ADVANCE_MS}ms per command")),
        Err(_) => Err(format!("ERR expected milliseconds, got `{argument}`")),
    }
}

fn describe_frame(frame: &RemoteFrame) -> String {
    match frame {
        RemoteFrame::Position(raw) => format!("position {raw}"),
        RemoteFrame::Notification(record) => format!("notification {record}"),
        RemoteFrame::Link(LinkStatus::Connected) => "link connected".to_string(),
        RemoteFrame::Link(LinkStatus::Lost) => "link lost".to_string(),
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

/// Text rendering of a display frame, one string per panel row.
pub fn render_ascii(frame: &DisplayFrame) -> Vec<String> {
    let layout = frame.layout();
    let border = format!("+{}+", "-".repeat(TEXT_COLUMNS + 2));

    let mut lines = vec![border.clone()];
    for row in &layout.rows {
        let text: String = row.text.chars().take(TEXT_COLUMNS).collect();
        lines.push(format!("| {text:<TEXT_COLUMNS$} |"));
    }

    if let Some(bar) = layout.bar {
        // Map the marker's pixel travel onto the text columns.
        let travel = usize::try_from(DISPLAY_WIDTH - bar.marker.width).unwrap_or(1).max(1);
        let marker_x = usize::try_from(bar.marker.x).unwrap_or(0);
        let column = marker_x * (TEXT_COLUMNS - 1) / travel;
        let track: String = (0..TEXT_COLUMNS)
            .map(|index| if index == column { '#' } else { '.' })
            .collect();
        lines.push(format!("| {track} |"));
    }

    lines.push(border);
    lines
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Window crank emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are the controller's virtual clock in milliseconds"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, at: Millis, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[{:>10} ms] {} {line}",
            at.raw(),
            role.prefix()
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
