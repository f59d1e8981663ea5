//! Real-time terminal front end.
//!
//! The control loop runs on the main thread against the wall clock while a
//! second thread reads keys and writes the shared mailbox, the same split as
//! the firmware's control and radio tasks.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crank_core::controller::RemoteLink;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue};

use crate::session::{Session, SessionOptions, SharedMailbox};

const FRAME_INTERVAL: Duration = Duration::from_millis(50);
const LOG_LINES: usize = 8;
const SAMPLE_NOTIFICATION: &str = "Front door|now|Someone rang the bell";

const KEY_HELP: &str =
    "space: hold/release button  0-9: radio position  n: notify  l: link  q: quit";

pub fn run(options: SessionOptions) -> io::Result<()> {
    let mut session = Session::new(options)?;
    let button = Arc::new(AtomicBool::new(false));
    let quit = Arc::new(AtomicBool::new(false));

    let input = {
        let remote = Arc::clone(session.remote());
        let button = Arc::clone(&button);
        let quit = Arc::clone(&quit);
        thread::spawn(move || read_keys(&remote, &button, &quit))
    };

    let mut stdout = io::stdout();
    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let result = drive(&mut session, &mut stdout, &button, &quit);

    execute!(stdout, cursor::Show, LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;

    quit.store(true, Ordering::Release);
    match input.join() {
        Ok(outcome) => outcome?,
        Err(_) => return Err(io::Error::other("input thread panicked")),
    }
    result
}

fn drive(
    session: &mut Session,
    out: &mut impl Write,
    button: &AtomicBool,
    quit: &AtomicBool,
) -> io::Result<()> {
    let started = Instant::now();
    let origin = session.now();
    let mut log: VecDeque<String> = VecDeque::with_capacity(LOG_LINES);
    let mut last_draw: Option<Instant> = None;

    while !quit.load(Ordering::Acquire) {
        // One controller iteration per pass at wall-clock time.
        let now = origin + started.elapsed();
        for line in session.tick_at(now, button.load(Ordering::Acquire)) {
            if log.len() == LOG_LINES {
                log.pop_front();
            }
            log.push_back(line.trim_start().to_string());
        }

        if last_draw.is_none_or(|at| at.elapsed() >= FRAME_INTERVAL) {
            draw(out, session, &log, button.load(Ordering::Acquire))?;
            last_draw = Some(Instant::now());
        }

        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}

fn draw(
    out: &mut impl Write,
    session: &Session,
    log: &VecDeque<String>,
    button_held: bool,
) -> io::Result<()> {
    let held = if button_held { "HELD" } else { "free" };
    let header = format!("Window crank emulator  button={held}");

    let lines = std::iter::once(header)
        .chain(std::iter::once(String::new()))
        .chain(session.screen_lines())
        .chain(std::iter::once(String::new()))
        .chain(session.status_lines())
        .chain(std::iter::once(String::new()))
        .chain(log.iter().cloned())
        .chain(std::iter::once(String::new()))
        .chain(std::iter::once(KEY_HELP.to_string()));

    queue!(out, terminal::Clear(ClearType::All))?;
    for (row, line) in lines.enumerate() {
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        queue!(out, cursor::MoveTo(0, row), Print(line))?;
    }
    out.flush()
}

fn read_keys(remote: &SharedMailbox, button: &AtomicBool, quit: &AtomicBool) -> io::Result<()> {
    while !quit.load(Ordering::Acquire) {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }

        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                quit.store(true, Ordering::Release);
            }
            KeyCode::Char('q') | KeyCode::Esc => quit.store(true, Ordering::Release),
            KeyCode::Char(' ') => {
                button.fetch_xor(true, Ordering::AcqRel);
            }
            KeyCode::Char(digit @ '0'..='9') => {
                if let Some(value) = digit.to_digit(10).and_then(|value| u8::try_from(value).ok()) {
                    remote.post_position(value);
                }
            }
            KeyCode::Char('n') => {
                remote.post_raw_notification(SAMPLE_NOTIFICATION);
            }
            KeyCode::Char('l') => {
                remote.set_connected(!remote.is_connected());
            }
            _ => {}
        }
    }
    Ok(())
}
