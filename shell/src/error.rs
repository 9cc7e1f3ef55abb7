use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
	#[error("syntax error: missing file name after '{operator}'")]
	MalformedRedirection { operator: String },

	#[error("syntax error: empty pipeline")]
	EmptyPipeline,

	#[error("syntax error: empty command")]
	EmptyCommand,

	#[error("too many pipeline stages: {count} (at most {max})")]
	TooManyStages { count: usize, max: usize },

	#[error("{name}: builtin cannot run inside a pipeline")]
	BuiltinInPipeline { name: String },

	#[error("{what}: {source}")]
	ResourceExhausted {
		what: &'static str,
		#[source]
		source: nix::Error,
	},

	#[error("{path}: {source}")]
	RedirectionOpenFailed {
		path: String,
		#[source]
		source: io::Error,
	},

	#[error("{program}: {source}")]
	ExecFailed {
		program: String,
		#[source]
		source: nix::Error,
	},

	#[error("{0}: argument contains a NUL byte")]
	InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, ShellError>;
