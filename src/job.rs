use std::fmt;

use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::logger::dev_debug;
use crate::types::Stage;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum JobState { Running, Suspended, Terminated }

impl fmt::Display for JobState {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match *self {
			JobState::Running => "Running",
			JobState::Suspended => "Suspended",
			JobState::Terminated => "Terminated",
		})
	}
}

pub trait WaitStatusExt {
	/// The job state this status reports, or `None` if nothing changed.
	fn job_state(&self) -> Option<JobState>;
	/// Shell status code: exit code, or 128 + signal number.
	fn code(&self) -> u8;
}

impl WaitStatusExt for WaitStatus {
	fn job_state(&self) -> Option<JobState> {
		match *self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => Some(JobState::Terminated),
			WaitStatus::Stopped(..) => Some(JobState::Suspended),
			WaitStatus::Continued(..) => Some(JobState::Running),
			WaitStatus::StillAlive => None,
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceEvent(..) | WaitStatus::PtraceSyscall(..) => Some(JobState::Suspended),
		}
	}

	fn code(&self) -> u8 {
		match *self {
			WaitStatus::Exited(_, code) => code as u8,
			WaitStatus::Signaled(_, sig, _) | WaitStatus::Stopped(_, sig) => 128u8.wrapping_add(sig as u8),
			_ => 0,
		}
	}
}

/// Bookkeeping for one process the shell spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
	pub pid: Pid,
	pub command: Stage,
	pub state: JobState,
}

/// Every child the shell has spawned and not yet reaped, in launch order.
#[derive(Debug, Default)]
pub struct ProcessTable {
	jobs: Vec<JobRecord>,
}

impl ProcessTable {
	pub fn new() -> ProcessTable {
		ProcessTable { jobs: vec![] }
	}

	pub fn insert(&mut self, command: Stage, pid: Pid) {
		dev_debug!("tracking {} as {}", pid, command.name());
		self.jobs.push(JobRecord { pid, command, state: JobState::Running });
	}

	/// Polls every live record without blocking and applies what it reports.
	pub fn refresh(&mut self) {
		let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
		self.refresh_with(|pid| wait::waitpid(pid, Some(flags)))
	}

	/// [`ProcessTable::refresh`] with the status query supplied by the caller.
	pub fn refresh_with<F>(&mut self, mut poll: F) where F: FnMut(Pid) -> nix::Result<WaitStatus> {
		for job in self.jobs.iter_mut().filter(|j| j.state != JobState::Terminated) {
			match poll(job.pid) {
				Ok(status) => Self::apply(job, status),
				// no event observed, so the state stays as it is
				Err(e) => dev_debug!("waitpid {} failed: {}", job.pid, e),
			}
		}
	}

	/// Index of the record `pid` currently names. The kernel may hand a pid
	/// out again while an old terminated record still holds it, so the newest
	/// live record wins, then the newest of any state.
	fn position(&self, pid: Pid) -> Option<usize> {
		self.jobs.iter().rposition(|j| j.pid == pid && j.state != JobState::Terminated)
			.or_else(|| self.jobs.iter().rposition(|j| j.pid == pid))
	}

	/// Applies a status the caller already collected for `pid`.
	pub fn record_status(&mut self, pid: Pid, status: WaitStatus) {
		if let Some(i) = self.position(pid) {
			Self::apply(&mut self.jobs[i], status);
		}
	}

	fn apply(job: &mut JobRecord, status: WaitStatus) {
		if job.state == JobState::Terminated {
			return;
		}
		if let Some(state) = status.job_state() {
			if state != job.state {
				dev_debug!("{} ({}): {} -> {}", job.pid, job.command.name(), job.state, state);
				job.state = state;
			}
		}
	}

	/// Removes the first terminated record, if any.
	pub fn reap_one(&mut self) -> bool {
		match self.jobs.iter().position(|j| j.state == JobState::Terminated) {
			Some(i) => {
				let job = self.jobs.remove(i);
				dev_debug!("reaped {} ({})", job.pid, job.command.name());
				true
			},
			None => false,
		}
	}

	pub fn lookup_name(&self, pid: Pid) -> Option<&str> {
		self.get(pid).map(|j| j.command.name())
	}

	pub fn get(&self, pid: Pid) -> Option<&JobRecord> {
		self.position(pid).map(|i| &self.jobs[i])
	}

	pub fn iter(&self) -> std::slice::Iter<'_, JobRecord> {
		self.jobs.iter()
	}

	pub fn len(&self) -> usize {
		self.jobs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}

	/// Drops every record together with its command.
	pub fn clear(&mut self) {
		self.jobs.clear();
	}
}
