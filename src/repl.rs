//! Interactive read loop.
//!
//! ```text
//! AwaitingInput --line--> Dispatching --result/error--> AwaitingInput
//! AwaitingInput --"quit" or end of input--> Done
//! AwaitingInput --undecodable line--> AwaitingInput
//! ```
//!
//! One query is dispatched at a time; the next prompt is printed only after
//! the previous dispatch has finished.

use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::dispatcher::Dispatch;
use crate::error::Result;

pub const BANNER: &str = "=== Investment Bank Multi-Agent Demo ===";
pub const QUIT_HINT: &str = "Type 'quit' to exit.";
pub const PROMPT: &str = "\nYou: ";
pub const INVALID_QUERY: &str = "Please enter a valid query.";

/// `quit`, ignoring surrounding whitespace and case.
pub fn is_sentinel(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("quit")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplState {
    AwaitingInput,
    Dispatching(String),
    Done,
}

pub struct Repl<D, R, W> {
    dispatcher: D,
    input: R,
    output: W,
    state: ReplState,
}

impl<D, R, W> Repl<D, R, W>
where
    D: Dispatch,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(dispatcher: D, input: R, output: W) -> Self {
        Self {
            dispatcher,
            input,
            output,
            state: ReplState::AwaitingInput,
        }
    }

    pub fn state(&self) -> &ReplState {
        &self.state
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Print the banner and loop until the sentinel or end of input.
    pub async fn run(&mut self) -> Result<()> {
        writeln!(self.output, "{}", BANNER)?;
        writeln!(self.output, "{}", QUIT_HINT)?;
        while self.state != ReplState::Done {
            self.step().await?;
        }
        Ok(())
    }

    /// Advance the state machine by one transition.
    pub async fn step(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, ReplState::Done) {
            ReplState::AwaitingInput => {
                write!(self.output, "{}", PROMPT)?;
                self.output.flush()?;

                let mut raw = Vec::new();
                if self.input.read_until(b'\n', &mut raw).await? == 0 {
                    debug!("end of input");
                    return Ok(());
                }
                let line = match String::from_utf8(raw) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "input line is not valid UTF-8");
                        writeln!(self.output, "{}", INVALID_QUERY)?;
                        self.state = ReplState::AwaitingInput;
                        return Ok(());
                    }
                };
                if is_sentinel(&line) {
                    debug!("sentinel received");
                    return Ok(());
                }
                self.state = ReplState::Dispatching(line.trim_end_matches(['\r', '\n']).to_string());
            }
            ReplState::Dispatching(query) => {
                match self.dispatcher.select_and_run(&query).await {
                    Ok(result) => {
                        writeln!(self.output, "Result: {}", result.query)?;
                        writeln!(self.output, "Done!")?;
                    }
                    Err(e) if e.is_validation() => {
                        writeln!(self.output, "{}", INVALID_QUERY)?;
                    }
                    Err(e) => {
                        warn!(error = %e, "dispatch failed");
                        writeln!(self.output, "Error: {}", e)?;
                    }
                }
                self.state = ReplState::AwaitingInput;
            }
            ReplState::Done => {}
        }
        Ok(())
    }
}
