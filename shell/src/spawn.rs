//! The pipeline engine: one forked process per stage, connected by pipes.
//!
//! Every pipe is created before the first fork. Each child installs its
//! redirections, then the pipe ends it uses, then closes every pipe
//! descriptor it inherited before it execs. The parent closes all of its
//! pipe ends once the last child is forked and only then waits, so that
//! each reader sees end-of-file as soon as its writer is gone.

use std::ffi::CString;
use std::fs::File;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};

use libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::{self, ForkResult};
use tracing::debug;

use crate::builtin::{self, Builtin};
use crate::error::{Result, ShellError};
use crate::global;
use crate::job::{JobBuilder, Process};
use crate::redirect;
use crate::types::{Command, Pipeline, MAX_STAGES};

/// Child exit status when a redirection target cannot be opened.
pub const EXIT_REDIRECT_FAILED: i32 = 1;
/// Child exit status when the program is not runnable.
pub const EXIT_EXEC_FAILED: i32 = 126;
/// Child exit status when the program is not found on the search path.
pub const EXIT_NOT_FOUND: i32 = 127;

/// A pipe between stage `i` (writer) and stage `i + 1` (reader).
#[derive(Debug)]
struct PipeLink {
	read: OwnedFd,
	write: OwnedFd,
}

fn allocate_links(count: usize) -> Result<Vec<PipeLink>> {
	let links = (0 .. count)
		.map(|_| unistd::pipe2(OFlag::O_CLOEXEC)
			.map(|(read, write)| PipeLink { read, write })
			.map_err(|e| ShellError::ResourceExhausted { what: "pipe", source: e }))
		.collect::<Result<Vec<_>>>()?;
	debug!(count, "pipes allocated");
	Ok(links)
}

/// Everything a child needs, converted before forking.
struct Stage<'a> {
	command: &'a Command,
	program: CString,
	argv: Vec<CString>,
	builtin: Option<&'static Builtin>,
	input: Option<&'a str>,
	output: Option<(&'a str, bool)>,
	pipe_in: Option<RawFd>,
	pipe_out: Option<RawFd>,
}

fn to_cstring(s: &str) -> Result<CString> {
	CString::new(s).map_err(|_| ShellError::InvalidArgument(s.to_string()))
}

fn prepare<'a>(pipeline: &'a Pipeline, links: &[PipeLink]) -> Result<Vec<Stage<'a>>> {
	let n = pipeline.len();
	pipeline.commands.iter().enumerate().map(|(i, command)| -> Result<Stage<'a>> {
		let argv = command.argv.iter().map(|s| to_cstring(s)).collect::<Result<Vec<_>>>()?;
		let program = argv.first().cloned().ok_or(ShellError::EmptyCommand)?;
		let input = if i == 0 { pipeline.global_input_file.as_deref() } else { None };
		let output = if i == n - 1 {
			pipeline.global_output_file.as_deref().map(|p| (p, pipeline.global_append))
		} else {
			None
		};
		Ok(Stage {
			command,
			program,
			argv,
			builtin: builtin::find(command.name()).filter(|b| !b.is_process_confined()),
			input,
			output,
			pipe_in: if i > 0 { Some(links[i - 1].read.as_raw_fd()) } else { None },
			pipe_out: if i < n - 1 { Some(links[i].write.as_raw_fd()) } else { None },
		})
	}).collect()
}

/// Runs every stage of `pipeline` and reaps them all.
///
/// Fails only when the pipeline cannot be set up; a stage that cannot open
/// its redirection or exec its program exits on its own and the rest of the
/// pipeline runs regardless.
pub fn run_pipeline(state: &mut global::State, pipeline: &Pipeline) -> Result<Vec<Process>> {
	let n = pipeline.len();
	if n == 0 {
		return Err(ShellError::EmptyPipeline);
	}
	if n > MAX_STAGES {
		return Err(ShellError::TooManyStages { count: n, max: MAX_STAGES });
	}
	let links = allocate_links(n - 1)?;
	let stages = prepare(pipeline, &links)?;
	let link_fds: Vec<RawFd> = links.iter()
		.flat_map(|l| [l.read.as_raw_fd(), l.write.as_raw_fd()])
		.collect();

	let mut job_builder = JobBuilder::new(n);
	for (i, stage) in stages.iter().enumerate() {
		match unsafe { job_builder.push_fork(i) } {
			Ok(ForkResult::Parent { .. }) => {},
			Ok(ForkResult::Child) => exec_stage(state, stage, &link_fds),
			Err(e) => {
				drop(links);
				job_builder.abort();
				return Err(ShellError::ResourceExhausted { what: "fork", source: e });
			},
		}
	}

	drop(links);
	debug!(count = link_fds.len(), "parent pipe ends closed");
	Ok(job_builder.build().wait())
}

/// Writes straight to fd 2; the child must not touch the std stderr lock.
fn report(msg: &str) {
	let line = format!("pipesh: {}\n", msg);
	unsafe {
		libc::write(libc::STDERR_FILENO, line.as_ptr().cast(), line.len());
	}
}

fn die(code: i32) -> ! {
	unsafe { libc::_exit(code) }
}

fn install(fd: RawFd, target: RawFd) {
	if fd == target {
		return;
	}
	if let Err(e) = unistd::dup2(fd, target) {
		report(&format!("dup2: {}", e));
		die(EXIT_REDIRECT_FAILED);
	}
}

fn install_file(opened: Result<File>, target: RawFd) {
	match opened {
		Ok(file) => install(file.as_raw_fd(), target),
		Err(e) => {
			report(&e.to_string());
			die(EXIT_REDIRECT_FAILED);
		},
	}
}

/// Body of a forked child. Never returns.
fn exec_stage(state: &mut global::State, stage: &Stage, link_fds: &[RawFd]) -> ! {
	for sig in [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGPIPE] {
		let _ = unsafe { signal(sig, SigHandler::SigDfl) };
	}

	if let Some(path) = stage.input {
		install_file(redirect::open_input(path), STDIN_FILENO);
	}
	if let Some((path, append)) = stage.output {
		install_file(redirect::open_output(path, append), STDOUT_FILENO);
	}
	if let Some(path) = stage.command.input_file.as_deref() {
		install_file(redirect::open_input(path), STDIN_FILENO);
	}
	if let Some(path) = stage.command.output_file.as_deref() {
		install_file(redirect::open_output(path, stage.command.append), STDOUT_FILENO);
	}
	if let Some(fd) = stage.pipe_in {
		install(fd, STDIN_FILENO);
	}
	if let Some(fd) = stage.pipe_out {
		install(fd, STDOUT_FILENO);
	}
	for &fd in link_fds {
		let kept = (fd == STDIN_FILENO && stage.pipe_in == Some(fd))
			|| (fd == STDOUT_FILENO && stage.pipe_out == Some(fd));
		if !kept {
			let _ = unistd::close(fd);
		}
	}

	if let Some(b) = stage.builtin {
		let mut out = redirect::raw_stdout();
		let s = b.run(state, &stage.command.argv, &mut *out);
		die(s);
	}

	let e = match unistd::execvp(&stage.program, &stage.argv) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	if e == Errno::ENOENT {
		report(&format!("{}: command not found", stage.command.name()));
		die(EXIT_NOT_FOUND);
	}
	report(&ShellError::ExecFailed { program: stage.command.name().to_string(), source: e }.to_string());
	die(EXIT_EXEC_FAILED)
}
