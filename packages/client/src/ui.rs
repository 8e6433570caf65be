//! Terminal input: command parsing and the readline thread.

use std::io::Write;

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use pixelwall_server::domain::HexColor;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Place { x: u32, y: u32, color: String },
    Show { x: u32, y: u32 },
    Status,
    Disconnect,
    Reconnect,
    Help,
    Quit,
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<Command, ClientError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["place", x, y, color] => {
            let color = HexColor::try_from(*color)
                .map_err(|_| ClientError::InvalidCommand(format!("'{color}' is not #RRGGBB")))?;
            Ok(Command::Place {
                x: coordinate(x)?,
                y: coordinate(y)?,
                color: color.into_string(),
            })
        }
        ["show", x, y] => Ok(Command::Show {
            x: coordinate(x)?,
            y: coordinate(y)?,
        }),
        ["status"] => Ok(Command::Status),
        ["disconnect"] => Ok(Command::Disconnect),
        ["reconnect"] => Ok(Command::Reconnect),
        ["help"] => Ok(Command::Help),
        ["quit"] | ["exit"] => Ok(Command::Quit),
        _ => Err(ClientError::InvalidCommand(format!(
            "'{}' (type 'help' for commands)",
            line.trim()
        ))),
    }
}

fn coordinate(raw: &str) -> Result<u32, ClientError> {
    raw.parse()
        .map_err(|_| ClientError::InvalidCommand(format!("'{raw}' is not a coordinate")))
}

/// Spawn a blocking thread for rustyline (synchronous readline).
///
/// The channel closes on Ctrl+C / Ctrl+D.
pub fn spawn_readline(prompt: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            // Channel closed, exit thread
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

/// Redisplay the prompt after printing asynchronous output
pub fn redisplay_prompt(prompt: &str) {
    print!("{}", prompt);
    std::io::stdout().flush().ok();
}
