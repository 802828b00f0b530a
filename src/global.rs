use crate::config::Config;
use crate::job;

pub struct State {
	pub job_table: job::ProcessTable,
	pub config: Config,
	/// Cleared by `quit`.
	pub running: bool,
}

impl State {
	pub fn new(config: Config) -> State {
		State { job_table: job::ProcessTable::new(), config, running: true }
	}
}
