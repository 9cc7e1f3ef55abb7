use anyhow::{Context, Result};
use nix::sys::signal::{signal, SigHandler, Signal};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, warn};

use crate::eval;
use crate::global;

pub const DEFAULT_PROMPT: &str = "$ ";

/// Keeps keyboard interrupts from killing the interpreter; they still reach
/// the children, which restore the default handlers before exec.
pub fn ignore_interrupts() -> Result<()> {
	for sig in [Signal::SIGINT, Signal::SIGQUIT] {
		unsafe { signal(sig, SigHandler::SigIgn) }.with_context(|| format!("ignoring {:?}", sig))?;
	}
	Ok(())
}

/// Reads and runs lines until end of input or `exit`. Returns the status the
/// interpreter should exit with.
pub fn run(state: &mut global::State, prompt: &str) -> Result<i32> {
	let mut rl = DefaultEditor::new().context("failed to initialise line editor")?;

	loop {
		match rl.readline(prompt) {
			Ok(line) => {
				let line = line.trim();
				if line.is_empty() {
					continue;
				}
				if let Err(e) = rl.add_history_entry(line) {
					warn!("Failed to add history entry: {}", e);
				}
				let s = eval::eval_line(state, line);
				debug!(status = s, "line finished");
				if let Some(code) = state.exit_requested {
					return Ok(code);
				}
			},
			// Ctrl-C at the prompt drops the line and prompts again.
			Err(ReadlineError::Interrupted) => continue,
			Err(ReadlineError::Eof) => return Ok(state.last_status),
			Err(e) => return Err(e).context("failed to read line"),
		}
	}
}
