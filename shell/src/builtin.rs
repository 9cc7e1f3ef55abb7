use std::io::Write;
use std::path::PathBuf;
use std::env;

use anyhow::{anyhow, bail, Context};

use crate::global;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Kind {
	/// Changes interpreter state; only meaningful in the interpreter's own process.
	ProcessConfined,
	/// Effect fully captured by its output; may run in a child.
	SideEffectFree,
}

pub type Handler = fn(&mut global::State, &[String], &mut dyn Write) -> anyhow::Result<i32>;

pub struct Builtin {
	pub name: &'static str,
	pub kind: Kind,
	pub summary: &'static str,
	pub handler: Handler,
}

impl Builtin {
	pub fn is_process_confined(&self) -> bool {
		self.kind == Kind::ProcessConfined
	}

	/// Runs the handler; an error is reported on stderr and becomes status 1.
	pub fn run(&self, state: &mut global::State, argv: &[String], out: &mut dyn Write) -> i32 {
		match (self.handler)(state, argv, out) {
			Ok(s) => s,
			Err(e) => {
				let _ = writeln!(std::io::stderr(), "{}: {:#}", self.name, e);
				1
			},
		}
	}
}

impl std::fmt::Debug for Builtin {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Builtin").field("name", &self.name).field("kind", &self.kind).finish()
	}
}

static BUILTINS: &[Builtin] = &[
	Builtin { name: "cd", kind: Kind::ProcessConfined, summary: "change the working directory", handler: builtin_cd },
	Builtin { name: "exit", kind: Kind::ProcessConfined, summary: "leave the shell", handler: builtin_exit },
	Builtin { name: "echo", kind: Kind::SideEffectFree, summary: "print arguments", handler: builtin_echo },
	Builtin { name: "pwd", kind: Kind::SideEffectFree, summary: "print the working directory", handler: builtin_pwd },
	Builtin { name: "env", kind: Kind::SideEffectFree, summary: "print the environment", handler: builtin_env },
	Builtin { name: "help", kind: Kind::SideEffectFree, summary: "list builtin commands", handler: builtin_help },
];

pub fn find(name: &str) -> Option<&'static Builtin> {
	BUILTINS.iter().find(|b| b.name == name)
}

pub fn all() -> &'static [Builtin] {
	BUILTINS
}

pub fn builtin_cd(_: &mut global::State, argv: &[String], _: &mut dyn Write) -> anyhow::Result<i32> {
	let path = match argv.get(1) {
		Some(p) => PathBuf::from(p),
		None => env::var_os("HOME").map(PathBuf::from).ok_or_else(|| anyhow!("HOME not set"))?,
	};
	env::set_current_dir(&path).with_context(|| path.display().to_string())?;
	Ok(0)
}

pub fn builtin_exit(state: &mut global::State, argv: &[String], _: &mut dyn Write) -> anyhow::Result<i32> {
	let status = match argv.get(1) {
		Some(s) => match s.parse::<i32>() {
			Ok(n) => n,
			Err(_) => bail!("{}: numeric argument required", s),
		},
		None => state.last_status,
	};
	state.exit_requested = Some(status);
	Ok(status)
}

pub fn builtin_echo(_: &mut global::State, argv: &[String], out: &mut dyn Write) -> anyhow::Result<i32> {
	let mut args = &argv[argv.len().min(1)..];
	let newline = match args.first() {
		Some(a) if a == "-n" => {
			args = &args[1..];
			false
		},
		_ => true,
	};
	out.write_all(args.join(" ").as_bytes())?;
	if newline {
		out.write_all(b"\n")?;
	}
	out.flush()?;
	Ok(0)
}

pub fn builtin_pwd(_: &mut global::State, _: &[String], out: &mut dyn Write) -> anyhow::Result<i32> {
	let cwd = env::current_dir()?;
	writeln!(out, "{}", cwd.display())?;
	Ok(0)
}

pub fn builtin_env(_: &mut global::State, _: &[String], out: &mut dyn Write) -> anyhow::Result<i32> {
	use std::os::unix::ffi::OsStrExt;
	for (k, v) in env::vars_os() {
		out.write_all(k.as_bytes())?;
		out.write_all(b"=")?;
		out.write_all(v.as_bytes())?;
		out.write_all(b"\n")?;
	}
	Ok(0)
}

pub fn builtin_help(_: &mut global::State, _: &[String], out: &mut dyn Write) -> anyhow::Result<i32> {
	for b in all() {
		writeln!(out, "{:<6} {}", b.name, b.summary)?;
	}
	Ok(0)
}
