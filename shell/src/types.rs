/// Upper bound on the number of stages in one pipeline.
pub const MAX_STAGES: usize = 32;

/// One pipeline stage: an argument vector plus its own redirections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
	pub argv: Vec<String>,
	pub input_file: Option<String>,
	pub output_file: Option<String>,
	pub append: bool,
}

impl Command {
	pub fn new<I, S>(argv: I) -> Command where I: IntoIterator<Item = S>, S: Into<String> {
		Command { argv: argv.into_iter().map(Into::into).collect(), ..Command::default() }
	}

	/// Program name, `argv[0]`.
	pub fn name(&self) -> &str {
		self.argv.first().map_or("", String::as_str)
	}

	pub fn has_redirects(&self) -> bool {
		self.input_file.is_some() || self.output_file.is_some()
	}
}

/// An ordered, non-empty sequence of stages with redirection for the two
/// open ends of the line: stdin of the first stage and stdout of the last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
	pub commands: Vec<Command>,
	pub global_input_file: Option<String>,
	pub global_output_file: Option<String>,
	pub global_append: bool,
}

impl Pipeline {
	pub fn new(commands: Vec<Command>) -> Pipeline {
		Pipeline { commands, ..Pipeline::default() }
	}

	pub fn with_input(mut self, path: impl Into<String>) -> Pipeline {
		self.global_input_file = Some(path.into());
		self
	}

	pub fn with_output(mut self, path: impl Into<String>, append: bool) -> Pipeline {
		self.global_output_file = Some(path.into());
		self.global_append = append;
		self
	}

	pub fn len(&self) -> usize {
		self.commands.len()
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}

	/// Moves the first stage's input and the last stage's output redirection
	/// into the pipeline-level slots. Anything already there is overwritten,
	/// since the stage's own tokens come later on the line.
	pub fn hoist_redirects(&mut self) {
		if let Some(first) = self.commands.first_mut() {
			if let Some(path) = first.input_file.take() {
				self.global_input_file = Some(path);
			}
		}
		if let Some(last) = self.commands.last_mut() {
			if let Some(path) = last.output_file.take() {
				self.global_output_file = Some(path);
				self.global_append = last.append;
				last.append = false;
			}
		}
	}
}
