use std::io::{self, Write};
use std::path::PathBuf;
use std::{env, thread};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{self, ForkResult, Pid};

use crate::error::ShellError;
use crate::global;
use crate::job::ProcessTable;
use crate::logger::{dev_debug, user_error};

/// A job-control command run inside the shell process. Receives the
/// arguments after the command name and returns the shell status.
pub type Builtin = fn(&mut global::State, &[String]) -> u8;

fn report(r: Result<(), ShellError>) -> u8 {
	match r {
		Ok(()) => 0,
		Err(e) => {
			user_error!("{}", e);
			match e {
				ShellError::Usage(_) => 2,
				_ => 1,
			}
		},
	}
}

fn parse_pid(arg: Option<&String>, usage: &'static str) -> Result<Pid, ShellError> {
	match arg.and_then(|s| s.parse::<i32>().ok()) {
		// 0 and negative values would address process groups
		Some(n) if n > 0 => Ok(Pid::from_raw(n)),
		_ => Err(ShellError::Usage(usage)),
	}
}

fn send(pid: Pid, signal: Signal) -> Result<(), ShellError> {
	kill(pid, signal).map_err(|source| ShellError::Signal { signal, pid, source })
}

pub fn builtin_cd(_: &mut global::State, args: &[String]) -> u8 {
	let target = match args.first() {
		Some(path) => PathBuf::from(path),
		None => match env::var_os("HOME") {
			Some(home) => PathBuf::from(home),
			None => return report(Err(ShellError::Usage("cd <path>"))),
		},
	};
	report(env::set_current_dir(&target).map_err(|e| ShellError::io("cd: cannot change directory to", target, e)))
}

const NAP_USAGE: &str = "nap <seconds> <pid>";

/// Runs in the detached helper: suspend, sleep, resume.
fn nap_helper(pid: Pid, seconds: u64) -> i32 {
	if let Err(e) = send(pid, Signal::SIGTSTP) {
		user_error!("{}", e);
		return 1;
	}
	println!("{} handling SIGTSTP", pid);
	thread::sleep(Duration::from_secs(seconds));
	if let Err(e) = send(pid, Signal::SIGCONT) {
		user_error!("{}", e);
		return 1;
	}
	println!("{} handling SIGCONT", pid);
	0
}

fn nap(args: &[String]) -> Result<(), ShellError> {
	let seconds = args.first()
		.and_then(|s| s.parse::<u64>().ok())
		.ok_or(ShellError::Usage(NAP_USAGE))?;
	let pid = parse_pid(args.get(1), NAP_USAGE)?;

	let _ = io::stdout().flush();
	// Fork twice so the helper is adopted by init and never waits on us.
	// SAFETY: single threaded; both children only signal, sleep, print and _exit.
	match unsafe { unistd::fork() }.map_err(ShellError::Spawn)? {
		ForkResult::Child => {
			let status = match unsafe { unistd::fork() } {
				Ok(ForkResult::Child) => {
					let status = nap_helper(pid, seconds);
					let _ = io::stdout().flush();
					status
				},
				Ok(ForkResult::Parent { .. }) => 0,
				Err(e) => {
					user_error!("{}", ShellError::Spawn(e));
					1
				},
			};
			unsafe { libc::_exit(status) }
		},
		ForkResult::Parent { child } => {
			dev_debug!("nap helper launcher: {}", child);
			if let Err(e) = waitpid(child, None) {
				dev_debug!("waitpid {} failed: {}", child, e);
			}
			Ok(())
		},
	}
}

pub fn builtin_nap(_: &mut global::State, args: &[String]) -> u8 {
	report(nap(args))
}

/// Prints the table after reconciling it, then drops one finished job.
pub fn show_procs<W: Write>(table: &mut ProcessTable, out: &mut W) -> io::Result<()> {
	table.refresh();
	writeln!(out, "PID\tCommand\tSTATUS")?;
	for job in table.iter() {
		writeln!(out, "{}\t{}\t{}", job.pid, job.command.name(), job.state)?;
	}
	out.flush()?;
	table.reap_one();
	Ok(())
}

pub fn builtin_showprocs(state: &mut global::State, _: &[String]) -> u8 {
	let stdout = io::stdout();
	let mut out = stdout.lock();
	match show_procs(&mut state.job_table, &mut out) {
		Ok(()) => 0,
		Err(e) => report(Err(ShellError::io("showprocs: cannot write to", "stdout", e))),
	}
}

fn stop(table: &ProcessTable, args: &[String]) -> Result<(), ShellError> {
	let pid = parse_pid(args.first(), "stop <pid>")?;
	send(pid, Signal::SIGINT)?;
	match table.lookup_name(pid) {
		Some(name) => println!("{} handling SIGINT", name),
		None => println!("{} handling SIGINT", pid),
	}
	Ok(())
}

pub fn builtin_stop(state: &mut global::State, args: &[String]) -> u8 {
	report(stop(&state.job_table, args))
}

pub fn builtin_quit(state: &mut global::State, _: &[String]) -> u8 {
	state.job_table.clear();
	state.running = false;
	0
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"cd" => Some(builtin_cd as Builtin),
		"nap" => Some(builtin_nap as Builtin),
		"showprocs" => Some(builtin_showprocs as Builtin),
		"stop" => Some(builtin_stop as Builtin),
		"quit" => Some(builtin_quit as Builtin),
		_ => None,
	}
}
