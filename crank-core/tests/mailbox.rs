use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crank_core::controller::RemoteLink;
use crank_core::remote::{NotificationRecord, RemoteMailbox};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

#[test]
fn reader_never_observes_a_torn_notification() {
    let mailbox = Arc::new(RemoteMailbox::<CriticalSectionRawMutex>::new());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let mailbox = Arc::clone(&mailbox);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for round in 0..5_000u32 {
                // Every field carries the same tag so a mix is detectable.
                let tag = format!("{round:05}");
                mailbox.post_notification(NotificationRecord::new(&tag, &tag, &tag));
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut seen = 0;
    while !done.load(Ordering::Acquire) || mailbox.has_notification() {
        if let Some(record) = mailbox.take_notification() {
            assert_eq!(record.sender, record.timestamp);
            assert_eq!(record.sender.as_str(), record.message.as_str());
            seen += 1;
        }
    }

    writer.join().expect("writer thread");
    assert!(seen > 0);
}

#[test]
fn position_commands_are_consumed_once_across_threads() {
    let mailbox = Arc::new(RemoteMailbox::<CriticalSectionRawMutex>::new());

    let writer = {
        let mailbox = Arc::clone(&mailbox);
        thread::spawn(move || {
            for raw in 0..200u32 {
                mailbox.post_position(u8::try_from(raw % 3).expect("small"));
            }
        })
    };
    writer.join().expect("writer thread");

    assert!(mailbox.poll_position_command().is_some());
    assert_eq!(mailbox.poll_position_command(), None);
}
