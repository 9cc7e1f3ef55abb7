use std::io;
use std::process::ExitCode;

use argh::FromArgs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pipesh::{eval, repl, State};

/// Runs commands and pipelines, interactively or from `-c`.
#[derive(FromArgs)]
struct Args {
	/// run a single line and exit with its status
	#[argh(option, short = 'c')]
	command: Option<String>,

	/// prompt shown before each line
	#[argh(option, default = "String::from(repl::DEFAULT_PROMPT)")]
	prompt: String,
}

fn main() -> ExitCode {
	tracing_subscriber::registry()
		.with(fmt::layer().with_writer(io::stderr))
		.with(EnvFilter::from_default_env())
		.init();

	let args: Args = argh::from_env();
	let mut state = State::new();

	let status = match args.command {
		Some(line) => eval::eval_line(&mut state, &line),
		None => {
			if let Err(e) = repl::ignore_interrupts() {
				eprintln!("pipesh: {:#}", e);
			}
			match repl::run(&mut state, &args.prompt) {
				Ok(s) => s,
				Err(e) => {
					eprintln!("pipesh: {:#}", e);
					return ExitCode::FAILURE;
				},
			}
		},
	};
	ExitCode::from(status as u8)
}
