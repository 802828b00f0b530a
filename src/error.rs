use std::{error, fmt, io};
use std::path::PathBuf;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

/// Everything that can go wrong while launching or controlling jobs.
///
/// Errors raised inside a forked child never reach the parent; the child
/// reports them and exits with a failure status instead.
#[derive(Debug)]
pub enum ShellError {
	/// fork(2) failed; the current pipeline launch is aborted.
	Spawn(nix::Error),
	/// execvp(3) failed inside the child.
	Exec { program: String, source: nix::Error },
	/// A file or directory operation failed: opening, duplicating or closing a
	/// descriptor, changing directory, writing a listing.
	Io { operation: &'static str, target: PathBuf, source: io::Error },
	/// Pipe allocation failed before anything was forked.
	Resource(nix::Error),
	/// kill(2) failed.
	Signal { signal: Signal, pid: Pid, source: nix::Error },
	/// A builtin got arguments it cannot use.
	Usage(&'static str),
}

impl ShellError {
	pub fn io(operation: &'static str, target: impl Into<PathBuf>, source: impl Into<io::Error>) -> ShellError {
		ShellError::Io { operation, target: target.into(), source: source.into() }
	}

	/// Exit status a child uses after reporting this error.
	pub fn child_status(&self) -> i32 {
		match *self {
			ShellError::Exec { source: nix::Error::ENOENT, .. } => 127,
			ShellError::Exec { .. } => 126,
			_ => 1,
		}
	}
}

impl fmt::Display for ShellError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			ShellError::Spawn(ref e) => write!(f, "fork failed: {}", e),
			ShellError::Exec { ref program, source: nix::Error::ENOENT } => write!(f, "{}: command not found", program),
			ShellError::Exec { ref program, ref source } => write!(f, "{}: cannot execute: {}", program, source),
			ShellError::Io { operation, ref target, ref source } => write!(f, "{} {}: {}", operation, target.display(), source),
			ShellError::Resource(ref e) => write!(f, "cannot create pipe: {}", e),
			ShellError::Signal { signal, pid, ref source } => write!(f, "kill {} {} failed: {}", signal, pid, source),
			ShellError::Usage(usage) => write!(f, "usage: {}", usage),
		}
	}
}

impl error::Error for ShellError {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match *self {
			ShellError::Spawn(ref e) => Some(e),
			ShellError::Exec { ref source, .. } => Some(source),
			ShellError::Io { ref source, .. } => Some(source),
			ShellError::Resource(ref e) => Some(e),
			ShellError::Signal { ref source, .. } => Some(source),
			ShellError::Usage(_) => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::error::Error;

	#[test]
	fn messages_name_operation_and_target() {
		let e = ShellError::io("cannot open", "missing.txt", io::Error::from_raw_os_error(libc::ENOENT));
		let msg = e.to_string();
		assert!(msg.starts_with("cannot open missing.txt: "), "{}", msg);
		assert!(e.source().is_some());

		let e = ShellError::Signal { signal: Signal::SIGINT, pid: Pid::from_raw(4242), source: nix::Error::ESRCH };
		assert!(e.to_string().starts_with("kill SIGINT 4242 failed"));
	}

	#[test]
	fn child_status_codes() {
		let not_found = ShellError::Exec { program: "nope".into(), source: nix::Error::ENOENT };
		assert_eq!(not_found.child_status(), 127);
		assert_eq!(not_found.to_string(), "nope: command not found");
		let denied = ShellError::Exec { program: "x".into(), source: nix::Error::EACCES };
		assert_eq!(denied.child_status(), 126);
		assert_eq!(ShellError::io("cannot open", "f", io::Error::other("x")).child_status(), 1);
	}
}
