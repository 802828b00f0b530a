/// How a foreground pipeline of several stages is waited for.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum StageWait {
	/// Wait for each stage right after forking it.
	#[default]
	Sequential,
	/// Fork every stage, then wait for them in order.
	AfterLaunch,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Config {
	pub debug: bool,
	pub stage_wait: StageWait,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
	Help,
	Run(Config),
}

pub const USAGE: &str = "usage: jobsh [-d|--debug] [--wait-after-launch]";

impl Action {
	pub fn from_env() -> Result<Action, String> {
		Action::parse_arguments(std::env::args())
	}

	/// Parses the shell's arguments; the first item is the program name.
	pub fn parse_arguments<I, S>(args: I) -> Result<Action, String>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut config = Config::default();
		for arg in args.into_iter().skip(1) {
			match arg.as_ref() {
				"-d" | "--debug" => config.debug = true,
				"--wait-after-launch" => config.stage_wait = StageWait::AfterLaunch,
				"-h" | "--help" => return Ok(Action::Help),
				other => return Err(format!("unrecognized option '{}'", other)),
			}
		}
		Ok(Action::Run(config))
	}
}
