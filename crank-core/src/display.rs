//! Frames pushed to the status display and their 128x64 layout.
//!
//! The controller only ever hands a [`DisplayFrame`] to the display seam.
//! [`DisplayFrame::layout`] turns it into positioned text rows plus the
//! position bar, so the firmware OLED driver and the emulator's terminal view
//! draw exactly the same content.

use core::fmt::{self, Write};

use heapless::{String, Vec};

use crate::position::PositionIndex;
use crate::remote::NotificationRecord;

/// Panel width in pixels.
pub const DISPLAY_WIDTH: u32 = 128;
/// Panel height in pixels.
pub const DISPLAY_HEIGHT: u32 = 64;
/// Glyph columns per row with a 6 px wide font.
pub const TEXT_COLUMNS: usize = 21;

pub const SPLASH_TITLE: &str = "Window Crank";
pub const SPLASH_SUBTITLE: &str = "System Ready";

/// Horizontal travel of the bar marker across the frame.
const BAR_TRAVEL: u32 = 124;
const BAR_FRAME_Y: i32 = 58;
const BAR_FRAME_HEIGHT: u32 = 6;
const BAR_MARKER_Y: i32 = 60;
const BAR_MARKER_SIZE: (u32, u32) = (4, 2);

const LINK_MARKER: &str = " *";
const MESSAGE_ROWS: usize = 3;

/// Maximum rows any frame lays out.
pub const MAX_ROWS: usize = 6;

/// Bytes per row: a full row of two-byte Latin-1 glyphs.
pub const TEXT_LINE_BYTES: usize = TEXT_COLUMNS * 2;

pub type TextLine = String<TEXT_LINE_BYTES>;

/// Snapshot of controller state shown on the status screen.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub position: PositionIndex,
    pub position_count: usize,
    pub label: &'static str,
    pub pulse_us: u16,
    pub button_down: bool,
    pub link_connected: bool,
}

impl StatusSnapshot {
    /// Bar marker x offset: `index * 124 / (N - 1)`.
    #[must_use]
    pub fn bar_x(&self) -> u32 {
        let span = self.position_count.saturating_sub(1).max(1);
        let index = u32::try_from(self.position.get()).unwrap_or(u32::MAX);
        let span = u32::try_from(span).unwrap_or(u32::MAX);
        (index.saturating_mul(BAR_TRAVEL) / span).min(BAR_TRAVEL)
    }

    #[must_use]
    pub fn title_line(&self) -> TextLine {
        let marker = if self.link_connected { LINK_MARKER } else { "" };
        line(format_args!("{SPLASH_TITLE}{marker}"))
    }

    #[must_use]
    pub fn position_line(&self) -> TextLine {
        line(format_args!(
            "Position: {} ({})",
            self.label,
            self.position.ordinal()
        ))
    }

    #[must_use]
    pub fn pulse_line(&self) -> TextLine {
        line(format_args!("Pulse: {} us", self.pulse_us))
    }

    #[must_use]
    pub fn button_line(&self) -> TextLine {
        let state = if self.button_down { "PRESSED" } else { "Ready" };
        line(format_args!("Button: {state}"))
    }
}

/// Content of a single display refresh; the most recent frame wins.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DisplayFrame {
    Splash,
    Status(StatusSnapshot),
    Notification(NotificationRecord),
}

/// Text row anchored at a baseline.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TextRow {
    pub x: i32,
    pub baseline_y: i32,
    pub text: TextLine,
}

/// Rectangle in panel coordinates.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Outlined bar with a filled marker at the current position.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PositionBar {
    pub frame: Rect,
    pub marker: Rect,
}

/// Drawable content of one frame.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FrameLayout {
    pub rows: Vec<TextRow, MAX_ROWS>,
    pub bar: Option<PositionBar>,
}

impl FrameLayout {
    fn row(&mut self, baseline_y: i32, text: TextLine) {
        // Every layout below stays within MAX_ROWS.
        let _ = self.rows.push(TextRow {
            x: 0,
            baseline_y,
            text,
        });
    }
}

impl DisplayFrame {
    /// Positions the frame's content on the panel.
    #[must_use]
    pub fn layout(&self) -> FrameLayout {
        let mut layout = FrameLayout::default();
        match self {
            DisplayFrame::Splash => {
                layout.row(10, line(format_args!("{SPLASH_TITLE}")));
                layout.row(24, line(format_args!("{SPLASH_SUBTITLE}")));
            }
            DisplayFrame::Status(snapshot) => {
                layout.row(10, snapshot.title_line());
                layout.row(30, snapshot.position_line());
                layout.row(42, snapshot.pulse_line());
                layout.row(54, snapshot.button_line());
                layout.bar = Some(PositionBar {
                    frame: Rect {
                        x: 0,
                        y: BAR_FRAME_Y,
                        width: DISPLAY_WIDTH,
                        height: BAR_FRAME_HEIGHT,
                    },
                    marker: Rect {
                        x: i32::try_from(snapshot.bar_x()).unwrap_or(0),
                        y: BAR_MARKER_Y,
                        width: BAR_MARKER_SIZE.0,
                        height: BAR_MARKER_SIZE.1,
                    },
                });
            }
            DisplayFrame::Notification(record) => {
                layout.row(10, line(format_args!("From: {}", record.sender)));
                layout.row(22, line(format_args!("At: {}", record.timestamp)));
                for (baseline, chunk) in [36, 48, 60]
                    .into_iter()
                    .zip(wrap(&record.message, TEXT_COLUMNS).take(MESSAGE_ROWS))
                {
                    layout.row(baseline, line(format_args!("{chunk}")));
                }
            }
        }
        layout
    }
}

/// Formats into a row, keeping whole characters up to the row capacity.
fn line(args: fmt::Arguments<'_>) -> TextLine {
    let mut out = TextLine::new();
    // Err only signals the clip point; everything before it is kept.
    let _ = ClippedLine(&mut out).write_fmt(args);
    out
}

struct ClippedLine<'a>(&'a mut TextLine);

impl Write for ClippedLine<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            self.0.push(ch).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

/// Splits `text` into chunks of at most `columns` characters.
pub fn wrap(text: &str, columns: usize) -> impl Iterator<Item = &str> {
    let columns = columns.max(1);
    let mut rest = text;
    core::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let split = rest
            .char_indices()
            .nth(columns)
            .map_or(rest.len(), |(offset, _)| offset);
        let (head, tail) = rest.split_at(split);
        rest = tail;
        Some(head)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionTable;

    fn snapshot(raw: u8, button_down: bool) -> StatusSnapshot {
        let table = PositionTable::CRANK;
        let position = table.index(raw).expect("in range");
        let slot = table.slot(position);
        StatusSnapshot {
            position,
            position_count: table.len(),
            label: slot.label,
            pulse_us: slot.pulse_us,
            button_down,
            link_connected: false,
        }
    }

    #[test]
    fn status_text_matches_panel_layout() {
        let status = snapshot(1, false);
        assert_eq!(status.position_line().as_str(), "Position: 90° (2)");
        assert_eq!(status.pulse_line().as_str(), "Pulse: 1500 us");
        assert_eq!(status.button_line().as_str(), "Button: Ready");
        assert_eq!(snapshot(0, true).button_line().as_str(), "Button: PRESSED");
    }

    #[test]
    fn bar_marker_spans_the_frame() {
        assert_eq!(snapshot(0, false).bar_x(), 0);
        assert_eq!(snapshot(1, false).bar_x(), 62);
        assert_eq!(snapshot(2, false).bar_x(), 124);
    }

    #[test]
    fn title_marks_connected_link() {
        let mut status = snapshot(0, false);
        assert_eq!(status.title_line().as_str(), "Window Crank");
        status.link_connected = true;
        assert_eq!(status.title_line().as_str(), "Window Crank *");
    }

    #[test]
    fn notification_layout_wraps_message() {
        let record = NotificationRecord::new(
            "Alice",
            "09:41",
            "Meeting moved to 3pm in the big room",
        );
        let layout = DisplayFrame::Notification(record).layout();

        let texts: Vec<&str, MAX_ROWS> = layout.rows.iter().map(|row| row.text.as_str()).collect();
        assert_eq!(
            texts.as_slice(),
            &[
                "From: Alice",
                "At: 09:41",
                "Meeting moved to 3pm ",
                "in the big room"
            ]
        );
        assert!(layout.bar.is_none());
    }

    #[test]
    fn long_fields_fill_their_rows() {
        let sender = "Building Management Office 2B/C";
        assert_eq!(sender.len(), 31);
        let mut message = String::<64>::new();
        for _ in 0..TEXT_COLUMNS {
            message.push('é').unwrap();
        }
        let record = NotificationRecord::new(sender, "09:41", &message);
        let layout = DisplayFrame::Notification(record).layout();

        assert_eq!(
            layout.rows[0].text.as_str(),
            "From: Building Management Office 2B/C"
        );
        assert_eq!(layout.rows[2].text.as_str(), message.as_str());
    }

    #[test]
    fn overlong_rows_clip_at_a_char_boundary() {
        let mut status = snapshot(1, false);
        status.label = "ääääääääääääääääääää";
        let line = status.position_line();

        let mut expected = String::<64>::try_from("Position: ").unwrap();
        for _ in 0..16 {
            expected.push('ä').unwrap();
        }
        assert_eq!(line.len(), TEXT_LINE_BYTES);
        assert_eq!(line.as_str(), expected.as_str());
    }

    #[test]
    fn splash_has_two_rows() {
        let layout = DisplayFrame::Splash.layout();
        assert_eq!(layout.rows.len(), 2);
        assert_eq!(layout.rows[1].text.as_str(), SPLASH_SUBTITLE);
    }
}
