//! A small interactive command interpreter built around a fork/exec
//! pipeline engine.
//!
//! A line is split on `|` into stages, each stage's `<`, `>` and `>>`
//! redirections are lifted out of its arguments, and the resulting
//! [`Pipeline`] is either handled by an in-process builtin or run as one
//! child process per stage.

pub mod builtin;
pub mod error;
pub mod eval;
pub mod global;
pub mod job;
pub mod parser;
pub mod redirect;
pub mod repl;
pub mod spawn;
pub mod types;

pub use error::{Result, ShellError};
pub use eval::{eval, eval_line, Outcome};
pub use global::State;
pub use parser::parse;
pub use spawn::run_pipeline;
pub use types::{Command, Pipeline, MAX_STAGES};
