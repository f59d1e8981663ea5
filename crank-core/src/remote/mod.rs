//! Remote command exchange between the radio context and the control loop.
//!
//! The radio side (a UART task on the MCU, an input thread in the emulator)
//! decodes wire frames and deposits them into a [`RemoteMailbox`]. The control
//! loop polls the mailbox through the [`RemoteLink`] trait once per iteration.
//! Position commands are a single byte exchanged with an atomic swap;
//! notifications are copied in and out entirely under a blocking mutex so a
//! reader never observes a half-written record.

pub mod frame;

use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::String;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{rest, take_till};

use crate::controller::RemoteLink;

pub use frame::{
    FrameError, LineAssembler, LineError, LinkStatus, MAX_LINE_LEN, RemoteFrame, parse_frame,
};

/// Maximum UTF-8 bytes retained for a notification sender.
pub const SENDER_CAPACITY: usize = 31;
/// Maximum UTF-8 bytes retained for a notification timestamp.
pub const TIMESTAMP_CAPACITY: usize = 15;
/// Maximum UTF-8 bytes retained for a notification body.
pub const MESSAGE_CAPACITY: usize = 127;

const FIELD_DELIMITER: char = '|';
const NO_COMMAND: u8 = u8::MAX;

/// Free-text notification pushed by the remote peer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NotificationRecord {
    pub sender: String<SENDER_CAPACITY>,
    pub timestamp: String<TIMESTAMP_CAPACITY>,
    pub message: String<MESSAGE_CAPACITY>,
}

impl NotificationRecord {
    /// Builds a record, truncating each field at a character boundary.
    #[must_use]
    pub fn new(sender: &str, timestamp: &str, message: &str) -> Self {
        Self {
            sender: truncated(sender),
            timestamp: truncated(timestamp),
            message: truncated(message),
        }
    }
}

impl fmt::Display for NotificationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}: {}", self.sender, self.timestamp, self.message)
    }
}

fn truncated<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    for ch in value.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

fn notification_fields<'a>(input: &mut &'a str) -> Result<(&'a str, &'a str, &'a str), ContextError> {
    let (sender, _, timestamp, _, message) = (
        take_till(0.., FIELD_DELIMITER),
        FIELD_DELIMITER,
        take_till(0.., FIELD_DELIMITER),
        FIELD_DELIMITER,
        rest,
    )
        .parse_next(input)?;
    Ok((sender, timestamp, message))
}

/// Splits `sender|timestamp|message` at the first two delimiters.
///
/// The message keeps any later `'|'`. Returns `None` when fewer than two
/// delimiters are present.
#[must_use]
pub fn parse_notification(raw: &str) -> Option<NotificationRecord> {
    notification_fields
        .parse(raw)
        .ok()
        .map(|(sender, timestamp, message)| NotificationRecord::new(sender, timestamp, message))
}

/// Single-slot exchange written by the radio context and drained by the loop.
pub struct RemoteMailbox<M: RawMutex> {
    position: AtomicU8,
    notification: Mutex<M, RefCell<Option<NotificationRecord>>>,
    connected: AtomicBool,
    rejected: AtomicU32,
}

impl<M: RawMutex> RemoteMailbox<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            position: AtomicU8::new(NO_COMMAND),
            notification: Mutex::new(RefCell::new(None)),
            connected: AtomicBool::new(false),
            rejected: AtomicU32::new(0),
        }
    }

    /// Stores a raw position command, replacing any unconsumed one.
    ///
    /// `u8::MAX` is reserved as the empty marker and is clamped to the
    /// largest representable command, which the loop then rejects as out of
    /// range.
    pub fn post_position(&self, raw: u8) {
        self.position.store(raw.min(NO_COMMAND - 1), Ordering::Release);
    }

    /// Stores a notification, overwriting any unread record.
    pub fn post_notification(&self, record: NotificationRecord) {
        self.notification.lock(|slot| {
            *slot.borrow_mut() = Some(record);
        });
    }

    /// Parses and stores a raw `sender|timestamp|message` string.
    ///
    /// Malformed input is discarded and the unread flag is left untouched.
    pub fn post_raw_notification(&self, raw: &str) -> bool {
        match parse_notification(raw) {
            Some(record) => {
                self.post_notification(record);
                true
            }
            None => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Applies a decoded wire frame.
    pub fn apply(&self, frame: RemoteFrame) {
        match frame {
            RemoteFrame::Position(raw) => self.post_position(raw),
            RemoteFrame::Notification(record) => self.post_notification(record),
            RemoteFrame::Link(status) => self.set_connected(status == LinkStatus::Connected),
        }
    }

    /// Decodes a wire line and applies it.
    pub fn ingest_line(&self, line: &str) -> Result<RemoteFrame, FrameError> {
        let frame = parse_frame(line).inspect_err(|_| {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        })?;
        self.apply(frame.clone());
        Ok(frame)
    }

    /// Inputs discarded as undecodable since start-up; wraps on overflow.
    #[must_use]
    pub fn rejected_frames(&self) -> u32 {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl<M: RawMutex> Default for RemoteMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> RemoteLink for RemoteMailbox<M> {
    fn poll_position_command(&self) -> Option<u8> {
        match self.position.swap(NO_COMMAND, Ordering::AcqRel) {
            NO_COMMAND => None,
            raw => Some(raw),
        }
    }

    fn has_notification(&self) -> bool {
        self.notification.lock(|slot| slot.borrow().is_some())
    }

    fn take_notification(&self) -> Option<NotificationRecord> {
        self.notification.lock(|slot| slot.borrow_mut().take())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
