mod live;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use crank_core::config::{ControllerConfig, OverridePrecedence};
use crank_core::time::Millis;

use session::{Session, SessionOptions};

const USAGE: &str =
    "Usage: crank-emulator [--live] [--local-first] [--start <ms>] [--transcript <path>]";

struct Args {
    live: bool,
    options: SessionOptions,
}

fn main() -> io::Result<()> {
    let args = parse_args(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    if args.live {
        return live::run(args.options);
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(args.options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Window crank emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "[{}] > ", session.now())?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut live = false;
    let mut config = ControllerConfig::DEFAULT;
    let mut options = SessionOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--live" => live = true,
            "--local-first" => config = config.with_precedence(OverridePrecedence::LocalFirst),
            "--start" => {
                let value = args.next().ok_or("Expected value after --start")?;
                let raw = value
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid start time `{value}`"))?;
                options.start = Millis::from_raw(raw);
            }
            "--transcript" => {
                let value = args.next().ok_or("Expected value after --transcript")?;
                options.transcript = Some(PathBuf::from(value));
            }
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    options.config = config;
    Ok(Args { live, options })
}
