//! Line-based control channel.
//!
//! Reads commands (`pause`, `resume`, `stop`, `status`) one per line and forwards
//! them through a channel, so a terminal or a parent process can drive a running
//! executor.
//!
//! Behavior:
//! - Lines are trimmed and matched case-insensitively; blank lines are skipped.
//! - Unknown commands are logged with `warn!` and ignored; reading continues.
//! - EOF or a closed channel ends the reader thread.

use std::fmt;
use std::io::{self, BufRead as _, BufReader, Read};
use std::str::FromStr;
use std::thread;

use tokio::sync::mpsc::Sender;
use tracing::{info, trace, warn};

use crate::executor::ScriptExecutor;

/// Command accepted on the control channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Stop,
    Status,
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pause" | "p" => Ok(Self::Pause),
            "resume" | "r" => Ok(Self::Resume),
            "stop" | "quit" | "exit" | "q" => Ok(Self::Stop),
            "status" | "s" => Ok(Self::Status),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Status => "status",
        })
    }
}

impl ControlCommand {
    /// Apply the command to `executor`. Returns a status line for `Status`.
    pub fn apply(self, executor: &ScriptExecutor) -> Option<String> {
        match self {
            Self::Pause => {
                executor.pause();
                None
            }
            Self::Resume => {
                executor.resume();
                None
            }
            Self::Stop => {
                executor.stop();
                None
            }
            Self::Status => Some(executor.context().to_string()),
        }
    }
}

/// Read commands from `reader` on a dedicated thread, typically `std::io::stdin()`.
///
/// Blocking reads cannot be cancelled, so the thread is detached instead of living on
/// the runtime's blocking pool, where it would hold up shutdown.
pub fn spawn_line_reader<R>(
    reader: R,
    sender: Sender<ControlCommand>,
) -> io::Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("stepbot-control".into())
        .spawn(move || {
            info!(target: "stepbot::control", "Control reader started");
            for line in BufReader::new(reader).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(target: "stepbot::control", error = %e, "Error reading control input");
                        break;
                    }
                };
                let Some(command) = parse_line(&line) else { continue };
                if sender.blocking_send(command).is_err() {
                    trace!(target: "stepbot::control", "Command channel closed");
                    break;
                }
            }
            info!(target: "stepbot::control", "Control input ended");
        })
}

fn parse_line(line: &str) -> Option<ControlCommand> {
    let raw = line.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<ControlCommand>() {
        Ok(command) => {
            trace!(target: "stepbot::control", %command, "Parsed command");
            Some(command)
        }
        Err(e) => {
            warn!(target: "stepbot::control", error = %e, "Ignoring input line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::sync::mpsc;

    #[test]
    fn parses_commands_case_insensitively() {
        assert_eq!("PAUSE".parse(), Ok(ControlCommand::Pause));
        assert_eq!(" resume ".parse(), Ok(ControlCommand::Resume));
        assert_eq!("quit".parse(), Ok(ControlCommand::Stop));
        assert_eq!("status".parse(), Ok(ControlCommand::Status));
        assert!("jump".parse::<ControlCommand>().is_err());
    }

    #[tokio::test]
    async fn reader_forwards_valid_lines_and_skips_the_rest() {
        let input = Cursor::new(b"pause\n\nnonsense\nresume\nstop\n".to_vec());
        let (tx, mut rx) = mpsc::channel(8);
        spawn_line_reader(input, tx).unwrap();

        let mut got = Vec::new();
        while let Some(command) = rx.recv().await {
            got.push(command);
        }
        assert_eq!(
            got,
            vec![ControlCommand::Pause, ControlCommand::Resume, ControlCommand::Stop]
        );
    }
}
