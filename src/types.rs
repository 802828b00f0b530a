use std::path::PathBuf;

/// One command of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
	/// Program name followed by its arguments; never empty.
	pub arguments: Vec<String>,
	pub input_redirect: Option<PathBuf>,
	pub output_redirect: Option<PathBuf>,
	/// Position within the owning pipeline, starting at 0.
	pub index: usize,
}

impl Stage {
	pub fn name(&self) -> &str {
		self.arguments.first().map_or("", |s| s.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
	/// Foreground pipelines are waited for; background ones are not.
	pub blocking: bool,
}

impl Pipeline {
	pub fn len(&self) -> usize {
		self.stages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.stages.is_empty()
	}
}
