use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, warn};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status {
	Running,
	Exited(i32),
	Signaled(Signal),
	/// The kernel had no record of the child (e.g. SIGCHLD ignored).
	Lost,
}

impl Status {
	/// Shell-style exit code: the exit status, or 128 + signal number.
	pub fn code(self) -> Option<i32> {
		match self {
			Status::Exited(c) => Some(c),
			Status::Signaled(sig) => Some(128 + sig as i32),
			Status::Running | Status::Lost => None,
		}
	}

	fn from_wait(status: WaitStatus) -> Option<Status> {
		match status {
			WaitStatus::Exited(_, c) => Some(Status::Exited(c)),
			WaitStatus::Signaled(_, sig, _) => Some(Status::Signaled(sig)),
			_ => None,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub stage: usize,
	pub status: Status,
}

impl Process {
	pub fn is_reaped(&self) -> bool {
		self.status != Status::Running
	}

	/// Blocks until this process has terminated and its status is collected.
	fn reap(&mut self) {
		while !self.is_reaped() {
			match waitpid(self.pid, None) {
				Ok(ws) => if let Some(s) = Status::from_wait(ws) {
					self.status = s;
				},
				Err(Errno::EINTR) => {},
				Err(e) => {
					warn!(pid = %self.pid, error = %e, "waitpid failed");
					self.status = Status::Lost;
				},
			}
		}
		debug!(pid = %self.pid, stage = self.stage, status = ?self.status, "reaped");
	}
}

/// The processes of one pipeline, in stage order.
#[derive(Debug)]
pub struct Job {
	pub processes: Vec<Process>,
}

impl Job {
	/// Reaps every process. A failing stage does not stop the others from
	/// being waited for.
	pub fn wait(mut self) -> Vec<Process> {
		for pr in self.processes.iter_mut() {
			pr.reap();
		}
		self.processes
	}
}

#[derive(Debug)]
pub struct JobBuilder {
	imp: Job,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder {
			imp: Job { processes: Vec::with_capacity(size_hint) }
		}
	}

	/// Forks; in the parent the child is recorded as a running stage.
	///
	/// # Safety
	///
	/// Same contract as [`nix::unistd::fork`]: the child must restrict itself
	/// to async-signal-safe work before it execs or exits.
	pub unsafe fn push_fork(&mut self, stage: usize) -> nix::Result<ForkResult> {
		let r = unistd::fork()?;
		if let ForkResult::Parent { child } = r {
			debug!(pid = %child, stage, "spawned");
			self.imp.processes.push(Process { pid: child, stage, status: Status::Running });
		}
		Ok(r)
	}

	/// Kills and reaps everything spawned so far, for when the pipeline
	/// cannot be completed.
	pub fn abort(self) {
		for pr in &self.imp.processes {
			warn!(pid = %pr.pid, stage = pr.stage, "killing partially started pipeline");
			let _ = kill(pr.pid, Signal::SIGKILL);
		}
		self.imp.wait();
	}

	pub fn build(self) -> Job {
		self.imp
	}
}
