use std::io::{self, BufRead, IsTerminal, Write};
use std::process;

use jobsh::config::{Action, USAGE};
use jobsh::{eval, global, logger, parser};

fn prompt(stdout: &mut io::Stdout) {
	let cwd = std::env::current_dir().map(|p| p.display().to_string()).unwrap_or_default();
	let _ = write!(stdout, "{}>", cwd);
	let _ = stdout.flush();
}

fn main() {
	let config = match Action::from_env() {
		Ok(Action::Run(config)) => config,
		Ok(Action::Help) => {
			println!("{}", USAGE);
			return;
		},
		Err(e) => {
			eprintln!("jobsh: {}\n{}", e, USAGE);
			process::exit(2);
		},
	};
	logger::ShellLogger::new().into_global_logger(config.debug);

	let mut state = global::State::new(config);
	let interactive = io::stdin().is_terminal();
	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	let mut line = String::new();
	while state.running {
		if interactive {
			prompt(&mut stdout);
		}
		line.clear();
		match stdin_locked.read_line(&mut line) {
			Ok(0) => break,
			Ok(_) => {},
			Err(e) => {
				log::error!(target: "jobsh::user", "cannot read input: {}", e);
				break;
			},
		}
		match parser::parse(&line) {
			Ok(Some(pipeline)) => { eval::eval(&mut state, pipeline); },
			Ok(None) => {},
			Err(e) => log::error!(target: "jobsh::user", "{}", e),
		}
		if interactive {
			let _ = writeln!(stdout);
		}
	}
	state.job_table.clear();
}
