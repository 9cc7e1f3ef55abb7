use std::io::{self, Write};

use tracing::debug;

use crate::builtin::{self, Builtin, Kind};
use crate::error::{Result, ShellError};
use crate::global;
use crate::job::Process;
use crate::parser;
use crate::redirect::{self, StdioGuard};
use crate::spawn;
use crate::types::Pipeline;

#[derive(Debug)]
pub enum Outcome {
	/// A builtin ran in the interpreter's own process.
	Builtin(i32),
	/// Every stage was forked and has been reaped.
	Spawned(Vec<Process>),
}

impl Outcome {
	/// Status of the line: the builtin's, or the last stage's.
	pub fn status(&self) -> i32 {
		match self {
			Outcome::Builtin(s) => *s,
			Outcome::Spawned(processes) => processes.last().and_then(|pr| pr.status.code()).unwrap_or(0),
		}
	}
}

/// Decides where each stage runs, then runs the line.
///
/// A lone builtin runs here, with its redirections applied for the duration
/// of the call. In a longer pipeline every stage is a child; builtins that
/// change interpreter state are refused there since the change would be lost
/// with the child.
pub fn eval(state: &mut global::State, pipeline: &Pipeline) -> Result<Outcome> {
	let commands = &pipeline.commands;
	if commands.is_empty() {
		return Err(ShellError::EmptyPipeline);
	}
	if commands.iter().any(|c| c.argv.is_empty()) {
		return Err(ShellError::EmptyCommand);
	}

	if commands.len() == 1 {
		if let Some(b) = builtin::find(commands[0].name()) {
			match b.kind {
				Kind::ProcessConfined => debug!(builtin = b.name, "process-confined builtin"),
				Kind::SideEffectFree => debug!(builtin = b.name, "builtin run in process"),
			}
			return run_in_process(state, b, pipeline).map(Outcome::Builtin);
		}
	} else if let Some(c) = commands.iter().find(|c| builtin::find(c.name()).map_or(false, Builtin::is_process_confined)) {
		return Err(ShellError::BuiltinInPipeline { name: c.name().to_string() });
	}

	spawn::run_pipeline(state, pipeline).map(Outcome::Spawned)
}

fn run_in_process(state: &mut global::State, b: &Builtin, pipeline: &Pipeline) -> Result<i32> {
	let command = &pipeline.commands[0];
	let input = pipeline.global_input_file.as_deref()
		.or(command.input_file.as_deref());
	let output = match (&pipeline.global_output_file, &command.output_file) {
		(Some(p), _) => Some((p.as_str(), pipeline.global_append)),
		(None, Some(p)) => Some((p.as_str(), command.append)),
		(None, None) => None,
	};

	let _ = io::stdout().flush();
	let _guard = StdioGuard::install(input, output)?;
	let mut out = redirect::raw_stdout();
	Ok(b.run(state, &command.argv, &mut *out))
}

/// Parses and runs one line, reporting any error on stderr. Returns the
/// line's status, which is also stored as the interpreter's last status.
pub fn eval_line(state: &mut global::State, line: &str) -> i32 {
	let r = parser::parse(line).and_then(|pipeline| eval(state, &pipeline));
	let s = match r {
		Ok(outcome) => outcome.status(),
		Err(e) => {
			let _ = writeln!(io::stderr(), "pipesh: {}", e);
			1
		},
	};
	state.last_status = s;
	s
}
