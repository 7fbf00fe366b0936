//! Interactive deck emulator.
//!
//! Runs the controller's protocol engines against a simulated battery and
//! host so command handling, chunking, and the sleep watchdog can be
//! demonstrated without hardware. Protocol lines are entered verbatim;
//! `!`-prefixed lines drive the simulation itself.

use std::io::{self, BufRead, Write};

use crossterm::style::Stylize;

mod session;

use session::DeckSession;

const BANNER: &str = "deck controller emulator: protocol lines go to the deck, \
!help for simulation commands";

fn main() -> io::Result<()> {
    let mut session = DeckSession::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("{}", BANNER.dark_cyan());

    loop {
        print!("{} ", format!("[{}ms]>", session.now_ms()).green());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();

        if let Some(command) = line.strip_prefix('!') {
            if !run_sim_command(&mut session, command) {
                break;
            }
            continue;
        }

        // Every protocol line is followed by a short tick so handshakes
        // and the watchdog make progress between commands.
        for entry in session.handle_line(line) {
            println!("{}", entry.cyan());
        }
        for entry in session.tick(250) {
            println!("{}", entry.yellow());
        }
    }

    Ok(())
}

fn run_sim_command(session: &mut DeckSession, command: &str) -> bool {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("tick") => {
            let millis = parts.next().and_then(|v| v.parse::<u64>().ok()).unwrap_or(1_000);
            for entry in session.tick(millis) {
                println!("{}", entry.yellow());
            }
            if session.is_asleep() {
                println!("{}", "deck is now asleep".dark_yellow());
            }
        }
        Some("charger") => match parts.next() {
            Some("on") => {
                session.set_charger(true);
                println!("{}", "charger connected".yellow());
            }
            Some("off") => {
                session.set_charger(false);
                println!("{}", "charger disconnected".yellow());
            }
            _ => println!("{}", "usage: !charger on|off".red()),
        },
        Some("quit" | "exit") => return false,
        Some("help") | None => {
            println!("  !tick [ms]      advance simulated time (default 1000)");
            println!("  !charger on|off attach or detach the bench charger");
            println!("  !quit           leave the emulator");
            println!("  anything else is sent to the deck as a protocol line");
        }
        Some(other) => {
            println!("{}", format!("unknown simulation command: {other}").red());
        }
    }
    true
}
