use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::builtin;
use crate::config::StageWait;
use crate::error::ShellError;
use crate::global;
use crate::job::{ProcessTable, WaitStatusExt};
use crate::launch::{self, Group};
use crate::logger::{dev_debug, user_error, user_info, user_warn};
use crate::pipe::PipeFabric;
use crate::types::Pipeline;

/// Status reported when a pipeline could not be launched.
const LAUNCH_FAILED: u8 = 126;

/// Blocks until `pid` terminates or stops, and records what happened.
fn wait_foreground(table: &mut ProcessTable, pid: Pid) -> u8 {
	loop {
		match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
			Ok(status) => {
				dev_debug!("wait {}: {:?}", pid, status);
				table.record_status(pid, status);
				if let WaitStatus::Stopped(..) = status {
					user_info!("{} suspended", pid);
				}
				return status.code();
			},
			Err(Errno::EINTR) => continue,
			Err(e) => {
				user_error!("waitpid {} failed: {}", pid, e);
				return 1;
			},
		}
	}
}

fn spawn_pipeline(state: &mut global::State, pipeline: Pipeline) -> Result<u8, ShellError> {
	let blocking = pipeline.blocking;
	let wait_each = blocking && state.config.stage_wait == StageWait::Sequential;
	let mut fabric = if pipeline.len() == 1 {
		PipeFabric::default()
	} else {
		PipeFabric::create(pipeline.len() - 1)?
	};

	// background pipelines get a group of their own, led by the first stage
	let mut group = if blocking { Group::Shell } else { Group::Leader };
	let mut status = 0;
	let mut pending: Vec<Pid> = Vec::with_capacity(pipeline.len());
	for stage in pipeline.stages {
		// a failed fork drops the fabric, closing what the parent still holds
		let pid = launch::launch(&stage, &mut fabric, group)?;
		if group == Group::Leader {
			group = Group::Join(pid);
		}
		state.job_table.insert(stage, pid);
		if wait_each {
			status = wait_foreground(&mut state.job_table, pid);
		} else {
			pending.push(pid);
		}
	}
	fabric.release();

	if blocking {
		for pid in pending {
			status = wait_foreground(&mut state.job_table, pid);
		}
	}
	Ok(status)
}

/// Runs one parsed line and returns its shell status.
pub fn eval(state: &mut global::State, pipeline: Pipeline) -> u8 {
	let first = match pipeline.stages.first() {
		Some(stage) => stage,
		None => return 0,
	};
	if let Some(func) = builtin::match_builtin(first.name()) {
		if pipeline.len() > 1 {
			user_warn!("{}: cannot be part of a pipeline, remaining stages ignored", first.name());
		}
		return func(state, &first.arguments[1 ..]);
	}

	match spawn_pipeline(state, pipeline) {
		Ok(s) => s,
		Err(e) => {
			user_error!("{}", e);
			LAUNCH_FAILED
		},
	}
}
