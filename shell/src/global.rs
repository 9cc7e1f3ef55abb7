/// Interpreter state shared by the read loop and the builtins.
#[derive(Debug, Default)]
pub struct State {
	/// Status of the last foreground line.
	pub last_status: i32,
	/// Set by `exit`; the read loop stops once this is `Some`.
	pub exit_requested: Option<i32>,
}

impl State {
	pub fn new() -> State {
		State::default()
	}
}
