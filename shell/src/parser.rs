use tracing::warn;

use crate::error::{Result, ShellError};
use crate::types::{Command, Pipeline, MAX_STAGES};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, Output, Append }

impl RedirectType {
	fn from_token(token: &str) -> Option<RedirectType> {
		match token {
			"<" => Some(RedirectType::Input),
			">" => Some(RedirectType::Output),
			">>" => Some(RedirectType::Append),
			_ => None,
		}
	}

	fn operator(self) -> &'static str {
		match self {
			RedirectType::Input => "<",
			RedirectType::Output => ">",
			RedirectType::Append => ">>",
		}
	}
}

fn is_whitespace(c: char) -> bool {
	matches!(c, ' ' | '\t' | '\n')
}

/// Splits a line on `|`. Blank segments between pipes are dropped; a line
/// with no command at all, or one that ends in a dangling `|`, is rejected.
pub fn split_pipeline(line: &str) -> Result<Vec<&str>> {
	let line = line.trim_matches(is_whitespace);
	if line.ends_with('|') {
		return Err(ShellError::EmptyPipeline);
	}
	let segments: Vec<&str> = line.split('|')
		.map(|s| s.trim_matches(is_whitespace))
		.filter(|s| !s.is_empty())
		.collect();
	if segments.is_empty() {
		return Err(ShellError::EmptyPipeline);
	}
	Ok(segments)
}

/// Whitespace split, no quoting.
pub fn tokenize(segment: &str) -> Vec<String> {
	segment.split(is_whitespace)
		.filter(|s| !s.is_empty())
		.map(str::to_owned)
		.collect()
}

/// Lifts `<`, `>` and `>>` together with their file name out of `argv`.
/// Later redirections of the same direction overwrite earlier ones.
pub fn extract_redirections(command: &mut Command) -> Result<()> {
	let mut i = 0;
	while i < command.argv.len() {
		let typ = match RedirectType::from_token(&command.argv[i]) {
			Some(typ) => typ,
			None => {
				i += 1;
				continue;
			},
		};
		let target = command.argv.get(i + 1)
			.map(|s| s.trim_matches(is_whitespace))
			.filter(|s| !s.is_empty() && RedirectType::from_token(s).is_none())
			.map(str::to_owned);
		let target = match target {
			Some(t) => t,
			None => return Err(ShellError::MalformedRedirection { operator: typ.operator().to_string() }),
		};
		command.argv.drain(i .. i + 2);
		match typ {
			RedirectType::Input => command.input_file = Some(target),
			RedirectType::Output | RedirectType::Append => {
				command.output_file = Some(target);
				command.append = typ == RedirectType::Append;
			},
		}
	}
	Ok(())
}

pub fn parse_command(segment: &str) -> Result<Command> {
	let mut command = Command::new(tokenize(segment));
	extract_redirections(&mut command)?;
	if command.argv.is_empty() {
		return Err(ShellError::EmptyCommand);
	}
	Ok(command)
}

pub fn parse(line: &str) -> Result<Pipeline> {
	let segments = split_pipeline(line)?;
	if segments.len() > MAX_STAGES {
		return Err(ShellError::TooManyStages { count: segments.len(), max: MAX_STAGES });
	}
	let commands = segments.into_iter().map(parse_command).collect::<Result<Vec<_>>>()?;
	let mut pipeline = Pipeline::new(commands);
	pipeline.hoist_redirects();

	let last = pipeline.len() - 1;
	for (i, command) in pipeline.commands.iter().enumerate() {
		if i > 0 && command.input_file.is_some() {
			warn!(stage = i, command = command.name(), "input redirection superseded by pipe");
		}
		if i < last && command.output_file.is_some() {
			warn!(stage = i, command = command.name(), "output redirection superseded by pipe");
		}
	}
	Ok(pipeline)
}
