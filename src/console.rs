//! Console commands
//!
//! `t` toggles monitoring, `d` closes open alerts, `q` quits.

use crate::monitor::ControlEvent;
use crate::notification::ConsoleNotifier;
use anyhow::Result;
use crossbeam_channel::Sender;
use std::io::BufRead;
use std::thread;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Dismiss,
    Quit,
    Help,
}

pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_lowercase().as_str() {
        "t" | "toggle" => Some(Command::Toggle),
        "d" | "dismiss" | "close" => Some(Command::Dismiss),
        "q" | "quit" | "exit" => Some(Command::Quit),
        "h" | "help" | "?" => Some(Command::Help),
        _ => None,
    }
}

pub fn print_help(can_dismiss: bool) {
    println!("Commands: t = toggle monitoring, q = quit, h = help");
    if can_dismiss {
        println!("          d = close open alerts");
    }
}

/// Reads commands until EOF or `q`
pub fn command_loop<R: BufRead>(
    input: R,
    sender: &Sender<ControlEvent>,
    notifier: Option<&ConsoleNotifier>,
) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Some(Command::Toggle) => {
                if sender.send(ControlEvent::ToggleMonitoring).is_err() {
                    break;
                }
            }
            Some(Command::Dismiss) => match notifier {
                Some(n) => {
                    let closed = n.dismiss_all();
                    println!("{} alert(s) closed", closed);
                }
                None => println!("Alerts are closed in their own window"),
            },
            Some(Command::Quit) => {
                info!("Quit requested from console");
                let _ = sender.send(ControlEvent::Shutdown);
                break;
            }
            Some(Command::Help) => print_help(notifier.is_some()),
            None => println!("Unknown command '{}', h for help", line.trim()),
        }
    }
    debug!("Console command loop ended");
    Ok(())
}

/// Runs `command_loop` on stdin in a background thread
pub fn spawn_stdin_commands(
    sender: Sender<ControlEvent>,
    notifier: Option<ConsoleNotifier>,
) -> Result<()> {
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            if let Err(e) = command_loop(stdin.lock(), &sender, notifier.as_ref()) {
                debug!("Console input unavailable: {}", e);
            }
        })?;
    Ok(())
}
