use std::fs::{File, OpenOptions};
use std::mem::ManuallyDrop;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd;
use tracing::debug;

use crate::error::{Result, ShellError};

/// Permission bits for output files created by `>` and `>>`.
pub const OUTPUT_MODE: u32 = 0o644;

/// Saved copies are parked above the usual low descriptors.
const SAVED_FD_FLOOR: RawFd = 10;

pub fn open_input(path: &str) -> Result<File> {
	File::open(path).map_err(|e| ShellError::RedirectionOpenFailed { path: path.to_string(), source: e })
}

pub fn open_output(path: &str, append: bool) -> Result<File> {
	let mut oopt = OpenOptions::new();
	oopt.write(true).create(true).mode(OUTPUT_MODE);
	if append {
		oopt.append(true);
	} else {
		oopt.truncate(true);
	}
	oopt.open(path).map_err(|e| ShellError::RedirectionOpenFailed { path: path.to_string(), source: e })
}

/// A writer on whatever fd 1 currently is, with no buffering of its own.
pub fn raw_stdout() -> ManuallyDrop<File> {
	ManuallyDrop::new(unsafe { File::from_raw_fd(STDOUT_FILENO) })
}

/// Redirects stdin and stdout of the calling process for as long as it is
/// alive; the original descriptors come back when it is dropped.
#[derive(Debug)]
pub struct StdioGuard {
	saved: Vec<(RawFd, OwnedFd)>,
}

impl StdioGuard {
	pub fn install(input: Option<&str>, output: Option<(&str, bool)>) -> Result<StdioGuard> {
		let mut guard = StdioGuard { saved: Vec::with_capacity(2) };
		if let Some(path) = input {
			let file = open_input(path)?;
			guard.redirect(&file, STDIN_FILENO)?;
		}
		if let Some((path, append)) = output {
			let file = open_output(path, append)?;
			guard.redirect(&file, STDOUT_FILENO)?;
		}
		Ok(guard)
	}

	fn redirect(&mut self, file: &File, target: RawFd) -> Result<()> {
		let saved = fcntl(target, FcntlArg::F_DUPFD_CLOEXEC(SAVED_FD_FLOOR))
			.map_err(|e| ShellError::ResourceExhausted { what: "dup", source: e })?;
		self.saved.push((target, unsafe { OwnedFd::from_raw_fd(saved) }));
		unistd::dup2(file.as_raw_fd(), target)
			.map_err(|e| ShellError::ResourceExhausted { what: "dup2", source: e })?;
		debug!(fd = target, saved, "stdio redirected");
		Ok(())
	}
}

impl Drop for StdioGuard {
	fn drop(&mut self) {
		for (target, saved) in self.saved.drain(..).rev() {
			let _ = unistd::dup2(saved.as_raw_fd(), target);
			debug!(fd = target, "stdio restored");
		}
	}
}
