//! Line framing and decoding for the BLE-UART radio module.
//!
//! The module speaks a line-oriented protocol:
//!
//! - `P<digit>`: absolute position command
//! - `N<sender>|<timestamp>|<message>`: notification
//! - `OK+CONN` / `OK+LOST`: link status reported by the module itself

use core::fmt;
use core::mem;

use heapless::{String, Vec};
use winnow::combinator::alt;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::one_of;

use super::{NotificationRecord, parse_notification};

/// Longest line accepted from the radio (excluding the terminator).
pub const MAX_LINE_LEN: usize = 192;

/// Radio link state reported by the module.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkStatus {
    Connected,
    Lost,
}

/// Decoded wire frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RemoteFrame {
    /// Raw position byte; range checking happens in the control loop.
    Position(u8),
    Notification(NotificationRecord),
    Link(LinkStatus),
}

/// Reasons a line fails to decode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameError {
    Empty,
    UnknownKind,
    InvalidPosition,
    MalformedNotification,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Empty => f.write_str("empty frame"),
            FrameError::UnknownKind => f.write_str("unknown frame kind"),
            FrameError::InvalidPosition => f.write_str("position frame needs a single digit"),
            FrameError::MalformedNotification => {
                f.write_str("notification needs sender|timestamp|message")
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum FrameKind {
    Position,
    Notification,
    Link(LinkStatus),
}

fn frame_kind(input: &mut &str) -> Result<FrameKind, ContextError> {
    alt((
        "OK+CONN".value(FrameKind::Link(LinkStatus::Connected)),
        "OK+LOST".value(FrameKind::Link(LinkStatus::Lost)),
        'P'.value(FrameKind::Position),
        'N'.value(FrameKind::Notification),
    ))
    .parse_next(input)
}

fn position_digit(input: &mut &str) -> Result<char, ContextError> {
    one_of('0'..='9').parse_next(input)
}

/// Decodes a single line (terminator optional).
pub fn parse_frame(line: &str) -> Result<RemoteFrame, FrameError> {
    let mut input = line.trim_end_matches(['\r', '\n']);
    if input.is_empty() {
        return Err(FrameError::Empty);
    }

    let kind = frame_kind
        .parse_next(&mut input)
        .map_err(|_| FrameError::UnknownKind)?;

    match kind {
        FrameKind::Link(status) if input.is_empty() => Ok(RemoteFrame::Link(status)),
        FrameKind::Link(_) => Err(FrameError::UnknownKind),
        FrameKind::Position => position_digit
            .parse(input)
            .ok()
            .and_then(|digit| digit.to_digit(10))
            .and_then(|value| u8::try_from(value).ok())
            .map(RemoteFrame::Position)
            .ok_or(FrameError::InvalidPosition),
        FrameKind::Notification => parse_notification(input)
            .map(RemoteFrame::Notification)
            .ok_or(FrameError::MalformedNotification),
    }
}

/// Errors surfaced while assembling lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineError {
    /// Line exceeded the buffer; the rest of it is discarded.
    Overflow,
    /// Completed line was not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::Overflow => write!(f, "line longer than {MAX_LINE_LEN} bytes"),
            LineError::InvalidUtf8 => f.write_str("line is not valid UTF-8"),
        }
    }
}

/// Byte-at-a-time line buffer for the radio UART.
#[derive(Debug, Default)]
pub struct LineAssembler<const N: usize = MAX_LINE_LEN> {
    buffer: Vec<u8, N>,
    discarding: bool,
}

impl<const N: usize> LineAssembler<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feeds one byte. Returns a completed line on `\r` or `\n`.
    ///
    /// An over-long line reports [`LineError::Overflow`] once, then every
    /// byte up to the next terminator is dropped.
    pub fn push(&mut self, byte: u8) -> Result<Option<String<N>>, LineError> {
        match byte {
            b'\r' | b'\n' => {
                if mem::take(&mut self.discarding) || self.buffer.is_empty() {
                    self.buffer.clear();
                    return Ok(None);
                }
                let bytes = mem::take(&mut self.buffer);
                String::from_utf8(bytes)
                    .map(Some)
                    .map_err(|_| LineError::InvalidUtf8)
            }
            0x08 | 0x7f => {
                self.buffer.pop();
                Ok(None)
            }
            _ if self.discarding => Ok(None),
            value => {
                if self.buffer.push(value).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(LineError::Overflow);
                }
                Ok(None)
            }
        }
    }
}
