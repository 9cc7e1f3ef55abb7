// Lowers the descriptor limit of the whole process, so it lives alone in
// its own test binary.
#![cfg(target_os = "linux")]

use std::fs;

use nix::errno::Errno;
use nix::sys::resource::{getrlimit, setrlimit, Resource};
use pipesh::{run_pipeline, Command, Pipeline, ShellError, State};

fn open_fds() -> usize {
	fs::read_dir("/proc/self/fd").unwrap().count()
}

#[test]
fn pipe_exhaustion_spawns_nothing_and_leaks_nothing() {
	let pipeline = Pipeline::new(vec![Command::new(["true"]); 8]);
	let mut state = State::new();

	let (soft, hard) = getrlimit(Resource::RLIMIT_NOFILE).unwrap();
	let before = open_fds();
	// room for a few pipes, not for the seven this pipeline needs
	setrlimit(Resource::RLIMIT_NOFILE, before as u64 + 6, hard).unwrap();
	let r = run_pipeline(&mut state, &pipeline);
	setrlimit(Resource::RLIMIT_NOFILE, soft, hard).unwrap();

	match r {
		Err(ShellError::ResourceExhausted { what, source }) => {
			assert_eq!(what, "pipe");
			assert_eq!(source, Errno::EMFILE);
		},
		other => panic!("{:?}", other),
	}
	assert_eq!(open_fds(), before);
	// no stage was forked
	assert_eq!(
		nix::sys::wait::waitpid(nix::unistd::Pid::from_raw(-1), Some(nix::sys::wait::WaitPidFlag::WNOHANG)),
		Err(Errno::ECHILD),
	);
}
