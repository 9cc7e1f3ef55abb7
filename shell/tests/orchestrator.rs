use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use pipesh::job::Status;
use pipesh::spawn::{EXIT_NOT_FOUND, EXIT_REDIRECT_FAILED};
use pipesh::{eval, parse, run_pipeline, Command, Outcome, Pipeline, ShellError, State};

static FORK_LOCK: Mutex<()> = Mutex::new(());

fn lock() -> MutexGuard<'static, ()> {
	FORK_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn path_str(p: &Path) -> &str {
	p.to_str().unwrap()
}

fn run_line(line: &str) -> Vec<Status> {
	let mut state = State::new();
	let pipeline = parse(line).unwrap();
	let processes = run_pipeline(&mut state, &pipeline).unwrap();
	assert_eq!(processes.len(), pipeline.len());
	for (i, pr) in processes.iter().enumerate() {
		assert_eq!(pr.stage, i);
		assert!(pr.is_reaped(), "stage {} left running", i);
	}
	processes.iter().map(|pr| pr.status).collect()
}

#[test]
fn producer_into_consumer() {
	let _l = lock();
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out");

	let statuses = run_line(&format!("printf abc\\ndef | cat > {}", path_str(&out)));
	assert_eq!(statuses, vec![Status::Exited(0), Status::Exited(0)]);
	assert_eq!(fs::read_to_string(&out).unwrap(), "abc\ndef");
}

#[test]
fn truncate_then_append() {
	let _l = lock();
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out");
	fs::write(&out, "stale contents\n").unwrap();

	run_line(&format!("echo hello | tr a-z A-Z > {}", path_str(&out)));
	assert_eq!(fs::read_to_string(&out).unwrap(), "HELLO\n");

	let line = format!("echo hello | tr a-z A-Z >> {}", path_str(&out));
	run_line(&line);
	run_line(&line);
	assert_eq!(fs::read_to_string(&out).unwrap(), "HELLO\nHELLO\nHELLO\n");
}

#[test]
fn first_stage_reads_input_file() {
	let _l = lock();
	let dir = tempfile::tempdir().unwrap();
	let input = dir.path().join("in");
	let out = dir.path().join("out");
	fs::write(&input, "b\na\nc\n").unwrap();

	let statuses = run_line(&format!("cat < {} | sort | cat > {}", path_str(&input), path_str(&out)));
	assert!(statuses.iter().all(|s| *s == Status::Exited(0)));
	assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\nc\n");
}

#[test]
fn missing_middle_program_does_not_hang() {
	let _l = lock();
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out");

	let statuses = run_line(&format!("printf data | pipesh-no-such-program-x | cat > {}", path_str(&out)));
	assert_eq!(statuses.len(), 3);
	assert_eq!(statuses[1], Status::Exited(EXIT_NOT_FOUND));
	assert_eq!(statuses[2], Status::Exited(0));
	assert_eq!(fs::read_to_string(&out).unwrap(), "");
}

#[test]
fn unreadable_input_only_fails_first_stage() {
	let _l = lock();
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out");

	let statuses = run_line(&format!("cat < /nonexistent/pipesh-in | cat > {}", path_str(&out)));
	assert_eq!(statuses, vec![Status::Exited(EXIT_REDIRECT_FAILED), Status::Exited(0)]);
	assert_eq!(fs::read_to_string(&out).unwrap(), "");
}

#[test]
fn unwritable_output_only_fails_last_stage() {
	let _l = lock();
	let statuses = run_line("echo lost | cat > /nonexistent/dir/out");
	assert_eq!(statuses[1], Status::Exited(EXIT_REDIRECT_FAILED));
}

#[test]
fn pipe_wins_over_inner_redirection() {
	let _l = lock();
	let dir = tempfile::tempdir().unwrap();
	let side = dir.path().join("side");
	let out = dir.path().join("out");

	let statuses = run_line(&format!("echo hi > {} | cat > {}", path_str(&side), path_str(&out)));
	assert_eq!(statuses, vec![Status::Exited(0), Status::Exited(0)]);
	assert_eq!(fs::read_to_string(&side).unwrap(), "");
	assert_eq!(fs::read_to_string(&out).unwrap(), "hi\n");
}

#[test]
fn more_than_a_pipe_buffer() {
	let _l = lock();
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out");

	run_line(&format!("head -c 300000 /dev/zero | cat | wc -c > {}", path_str(&out)));
	assert_eq!(fs::read_to_string(&out).unwrap().trim(), "300000");
}

#[test]
fn single_stage_is_one_child() {
	let _l = lock();
	assert_eq!(run_line("true"), vec![Status::Exited(0)]);
	assert_eq!(run_line("false"), vec![Status::Exited(1)]);
	assert_eq!(run_line("pipesh-no-such-program-y"), vec![Status::Exited(EXIT_NOT_FOUND)]);
}

#[test]
fn builtin_stage_runs_in_child() {
	let _l = lock();
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out");

	let mut state = State::new();
	let pipeline = parse(&format!("echo hi there | tr a-z A-Z > {}", path_str(&out))).unwrap();
	match eval(&mut state, &pipeline).unwrap() {
		Outcome::Spawned(processes) => assert_eq!(processes.len(), 2),
		other => panic!("{:?}", other),
	}
	assert_eq!(fs::read_to_string(&out).unwrap(), "HI THERE\n");
}

#[test]
fn built_pipeline_with_global_redirects() {
	let _l = lock();
	let dir = tempfile::tempdir().unwrap();
	let input = dir.path().join("in");
	let out = dir.path().join("out");
	fs::write(&input, "one two\n").unwrap();

	let pipeline = Pipeline::new(vec![Command::new(["tr", " ", "\n"]), Command::new(["wc", "-l"])])
		.with_input(path_str(&input))
		.with_output(path_str(&out), false);
	let mut state = State::new();
	let processes = run_pipeline(&mut state, &pipeline).unwrap();
	assert_eq!(processes.len(), 2);
	assert_eq!(fs::read_to_string(&out).unwrap().trim(), "2");
}

#[test]
fn setup_errors_spawn_nothing() {
	let _l = lock();
	let mut state = State::new();
	assert!(matches!(run_pipeline(&mut state, &Pipeline::new(vec![])), Err(ShellError::EmptyPipeline)));

	let pipeline = Pipeline::new(vec![Command::new(["echo", "a\0b"])]);
	assert!(matches!(run_pipeline(&mut state, &pipeline), Err(ShellError::InvalidArgument(_))));

	let pipeline = Pipeline::new(vec![Command::new(Vec::<String>::new())]);
	assert!(matches!(run_pipeline(&mut state, &pipeline), Err(ShellError::EmptyCommand)));
}
