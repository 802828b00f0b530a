use std::convert::Infallible;
use std::ffi::CString;
use std::fs;
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::{self, ForkResult, Pid};

use crate::error::ShellError;
use crate::logger::{dev_debug, user_error};
use crate::pipe::PipeFabric;
use crate::types::Stage;

/// Permissions of an output file created by a redirect: rw-r--r--.
const CREATE_MODE: u32 = 0o644;

enum Direction { Input, Output }

fn open_redirect(path: &Path, direction: &Direction) -> Result<RawFd, ShellError> {
	let mut oopt = fs::OpenOptions::new();
	match *direction {
		Direction::Input => oopt.read(true),
		Direction::Output => oopt.append(true).create(true).mode(CREATE_MODE),
	};
	let file = oopt.open(path).map_err(|e| ShellError::io("cannot open", path, e))?;
	Ok(file.into_raw_fd())
}

fn redirect(path: &Path, direction: Direction, onto: RawFd) -> Result<(), ShellError> {
	let fd = open_redirect(path, &direction)?;
	// with `onto` closed beforehand, open already landed on it
	if fd == onto {
		return Ok(());
	}
	unistd::dup2(fd, onto).map_err(|e| ShellError::io("cannot redirect to", path, e))?;
	unistd::close(fd).map_err(|e| ShellError::io("cannot close", path, e))?;
	Ok(())
}

/// Points stdin and stdout of the current (child) process at the stage's
/// redirect files or pipe ends, then closes every endpoint of the fabric.
fn wire_stdio(stage: &Stage, fabric: &mut PipeFabric) -> Result<(), ShellError> {
	match (&stage.input_redirect, fabric.left_of(stage.index)) {
		(Some(path), _) => redirect(path, Direction::Input, STDIN_FILENO)?,
		(None, Some(read_end)) => {
			unistd::dup2(read_end.as_raw_fd(), STDIN_FILENO)
				.map_err(|e| ShellError::io("cannot redirect to", "pipe", e))?;
		},
		(None, None) => {},
	}
	match (&stage.output_redirect, fabric.right_of(stage.index)) {
		(Some(path), _) => redirect(path, Direction::Output, STDOUT_FILENO)?,
		(None, Some(write_end)) => {
			unistd::dup2(write_end.as_raw_fd(), STDOUT_FILENO)
				.map_err(|e| ShellError::io("cannot redirect to", "pipe", e))?;
		},
		(None, None) => {},
	}
	fabric.release();
	Ok(())
}

fn exec_stage(stage: &Stage) -> Result<Infallible, ShellError> {
	let exec_error = |source: nix::Error| ShellError::Exec { program: stage.name().to_owned(), source };
	let argv = stage.arguments.iter()
		.map(|s| CString::new(s.as_bytes()))
		.collect::<Result<Vec<CString>, _>>()
		.map_err(|_| exec_error(nix::Error::EINVAL))?;
	let program = argv.first().ok_or_else(|| exec_error(nix::Error::EINVAL))?;
	unistd::execvp(program, &argv).map_err(exec_error)
}

/// Which process group a launched stage joins.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Group {
	/// Stay in the shell's group.
	Shell,
	/// Start a new group led by the stage itself.
	Leader,
	/// Join the group of an earlier stage.
	Join(Pid),
}

impl Group {
	/// Both sides call setpgid so the group exists before either one relies on it.
	fn apply(self, pid: Pid) -> nix::Result<()> {
		match self {
			Group::Shell => Ok(()),
			Group::Leader => unistd::setpgid(pid, pid),
			Group::Join(pgid) => unistd::setpgid(pid, pgid),
		}
	}
}

/// The child side of a launch. Never returns.
fn run_child(stage: &Stage, fabric: &mut PipeFabric, group: Group) -> ! {
	if let Err(e) = group.apply(unistd::getpid()) {
		dev_debug!("setpgid for {} failed: {}", stage.name(), e);
	}
	let r = wire_stdio(stage, fabric).and_then(|()| exec_stage(stage));
	let status = match r {
		Ok(never) => match never {},
		Err(e) => {
			user_error!("{}", e);
			e.child_status()
		},
	};
	unsafe { libc::_exit(status) }
}

/// Forks a process for `stage`, wires it to `fabric` and executes it.
///
/// Returns the child's pid in the parent, after the parent has given up the
/// pipe ends that now belong to the child.
pub fn launch(stage: &Stage, fabric: &mut PipeFabric, group: Group) -> Result<Pid, ShellError> {
	// SAFETY: the shell is single threaded, and the child only wires
	// descriptors before it execs or exits.
	match unsafe { unistd::fork() }.map_err(ShellError::Spawn)? {
		ForkResult::Child => run_child(stage, fabric, group),
		ForkResult::Parent { child } => {
			// fails harmlessly once the child has already exec'd
			let _ = group.apply(child);
			dev_debug!("PID: {}", child);
			dev_debug!("Executing command: {}", stage.arguments.join(" "));
			fabric.close_after_fork(stage.index);
			Ok(child)
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use nix::sys::wait::{waitpid, WaitStatus};
	use pretty_assertions::assert_eq;

	#[test]
	fn redirect_onto_a_closed_descriptor_keeps_it_open() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out.txt");
		match unsafe { unistd::fork() }.unwrap() {
			ForkResult::Child => {
				let _ = unistd::close(STDOUT_FILENO);
				let code = match redirect(&path, Direction::Output, STDOUT_FILENO) {
					Ok(()) => {
						let n = unsafe { libc::write(STDOUT_FILENO, b"kept\n".as_ptr().cast(), 5) };
						if n == 5 { 0 } else { 2 }
					},
					Err(_) => 1,
				};
				unsafe { libc::_exit(code) }
			},
			ForkResult::Parent { child } => {
				assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));
				assert_eq!(fs::read_to_string(&path).unwrap(), "kept\n");
			},
		}
	}
}
