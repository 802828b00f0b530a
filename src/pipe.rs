use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use nix::fcntl::OFlag;
use nix::unistd;

use crate::error::ShellError;
use crate::logger::dev_debug;

#[derive(Debug)]
struct Pipe {
	read: Option<OwnedFd>,
	write: Option<OwnedFd>,
}

/// The pipes connecting the stages of one pipeline.
///
/// Pipe `i` carries stage `i`'s standard output to stage `i + 1`'s standard
/// input. Every endpoint is closed at most once: closing takes it out of its
/// slot, and whatever is left is closed on [`PipeFabric::release`] or drop.
/// The pipes are close-on-exec, so no endpoint reaches an executed program
/// unless it was duplicated onto stdin or stdout.
#[derive(Debug, Default)]
pub struct PipeFabric {
	pipes: Vec<Pipe>,
}

impl PipeFabric {
	pub fn create(n_pipes: usize) -> Result<PipeFabric, ShellError> {
		let mut pipes = Vec::with_capacity(n_pipes);
		for _ in 0 .. n_pipes {
			// on error the pipes made so far are dropped, which closes them
			let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ShellError::Resource)?;
			pipes.push(Pipe { read: Some(read), write: Some(write) });
		}
		dev_debug!("allocated {} pipe(s)", n_pipes);
		Ok(PipeFabric { pipes })
	}

	pub fn len(&self) -> usize {
		self.pipes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pipes.is_empty()
	}

	/// Read end feeding the stage at `index`, if it has a predecessor.
	pub fn left_of(&self, index: usize) -> Option<BorrowedFd<'_>> {
		let i = index.checked_sub(1)?;
		self.pipes.get(i)?.read.as_ref().map(|fd| fd.as_fd())
	}

	/// Write end fed by the stage at `index`, if it has a successor.
	pub fn right_of(&self, index: usize) -> Option<BorrowedFd<'_>> {
		self.pipes.get(index)?.write.as_ref().map(|fd| fd.as_fd())
	}

	/// Parent side after forking the stage at `index`: its write end and its
	/// read end now belong to the child alone.
	pub fn close_after_fork(&mut self, index: usize) {
		if let Some(pipe) = self.pipes.get_mut(index) {
			drop(pipe.write.take());
		}
		if let Some(pipe) = index.checked_sub(1).and_then(|i| self.pipes.get_mut(i)) {
			drop(pipe.read.take());
		}
	}

	/// Closes every endpoint that is still open.
	pub fn release(&mut self) {
		for pipe in self.pipes.iter_mut() {
			drop(pipe.read.take());
			drop(pipe.write.take());
		}
	}

	#[cfg(test)]
	fn open_endpoints(&self) -> usize {
		self.pipes.iter().map(|p| p.read.is_some() as usize + p.write.is_some() as usize).sum()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs::File;
	use std::io::{Read, Write};
	use std::os::fd::AsRawFd;

	#[test]
	fn single_stage_has_no_pipes() {
		let fabric = PipeFabric::create(0).unwrap();
		assert!(fabric.is_empty());
		assert!(fabric.left_of(0).is_none());
		assert!(fabric.right_of(0).is_none());
	}

	#[test]
	fn endpoints_per_stage() {
		let fabric = PipeFabric::create(2).unwrap();
		assert_eq!(fabric.len(), 2);
		assert_eq!(fabric.open_endpoints(), 4);

		// first stage: only a right end
		assert!(fabric.left_of(0).is_none());
		assert!(fabric.right_of(0).is_some());
		// middle stage: both
		assert!(fabric.left_of(1).is_some());
		assert!(fabric.right_of(1).is_some());
		// last stage: only a left end
		assert!(fabric.left_of(2).is_some());
		assert!(fabric.right_of(2).is_none());

		assert_ne!(fabric.left_of(1).unwrap().as_raw_fd(), fabric.left_of(2).unwrap().as_raw_fd());
	}

	#[test]
	fn parent_closes_as_stages_are_launched() {
		let mut fabric = PipeFabric::create(2).unwrap();

		fabric.close_after_fork(0);
		assert!(fabric.right_of(0).is_none());
		assert!(fabric.left_of(1).is_some(), "stage 1 still needs its input");
		assert_eq!(fabric.open_endpoints(), 3);

		fabric.close_after_fork(1);
		assert!(fabric.left_of(1).is_none());
		assert!(fabric.right_of(1).is_none());
		assert!(fabric.left_of(2).is_some());

		fabric.close_after_fork(2);
		assert_eq!(fabric.open_endpoints(), 0);

		// nothing left to close twice
		fabric.release();
		assert_eq!(fabric.open_endpoints(), 0);
	}

	#[test]
	fn bytes_flow_through_in_order() {
		let mut fabric = PipeFabric::create(1).unwrap();
		let mut writer = File::from(fabric.pipes[0].write.take().unwrap());
		let mut reader = File::from(fabric.pipes[0].read.take().unwrap());

		writer.write_all(b"first\nsecond\n").unwrap();
		drop(writer);
		let mut out = String::new();
		reader.read_to_string(&mut out).unwrap();
		assert_eq!(out, "first\nsecond\n");
	}

	#[test]
	fn release_closes_everything() {
		let mut fabric = PipeFabric::create(3).unwrap();
		fabric.release();
		assert_eq!(fabric.open_endpoints(), 0);
		assert!(fabric.left_of(1).is_none());
		assert!(fabric.right_of(0).is_none());
	}
}
