#![allow(unused_macros)]
use std::io::Write;
use std::ops::Deref;

use log::{Level, LevelFilter, Log, Metadata, Record};

macro_rules! logger_macro {
	($name:ident is $rule_level:ident to $target:expr, $d:tt) => {
		macro_rules! $name {
			($d($d arg:tt)+) => (::log::log!(target: $target, ::log::Level::$rule_level, $d($d arg)+));
		}

		pub(crate) use $name;
	};
	($name:ident is $rule_level:ident to $target:expr) => {
		logger_macro!($name is $rule_level to $target, $);
	};
}

logger_macro!(user_error is Error to "jobsh::user");
logger_macro!(user_warn is Warn to "jobsh::user");
logger_macro!(user_info is Info to "jobsh::user");
logger_macro!(dev_debug is Debug to "jobsh::debug");

/// Writes every record to `target`, prefixed.
pub struct SimpleLogger<W: Send + Sync>
where
	for<'a> &'a W: Write,
{
	target: W,
	prefix: &'static str,
}

impl<W: Send + Sync> Log for SimpleLogger<W>
where
	for<'a> &'a W: Write,
{
	fn enabled(&self, metadata: &Metadata) -> bool {
		metadata.level() <= log::max_level()
	}

	fn log(&self, record: &Record) {
		let _ = writeln!(&self.target, "{}{}", self.prefix, record.args());
	}

	fn flush(&self) {
		let _ = (&self.target).flush();
	}
}

impl SimpleLogger<std::io::Stderr> {
	pub fn to_stderr(prefix: &'static str) -> SimpleLogger<std::io::Stderr> {
		SimpleLogger { target: std::io::stderr(), prefix }
	}
}

/// Routes records to a logger chosen by target prefix.
#[derive(Default)]
pub struct ShellLogger(Vec<(String, Box<dyn Log>)>);

impl ShellLogger {
	pub fn new() -> Self {
		let mut logger: Self = Default::default();
		logger.add_logger("jobsh::user", SimpleLogger::to_stderr("jobsh: "));
		logger.add_logger("jobsh::debug", SimpleLogger::to_stderr("[debug] "));
		logger
	}

	/// Installs the logger; debug records only pass when `debug` is set.
	pub fn into_global_logger(self, debug: bool) {
		let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };
		if log::set_boxed_logger(Box::new(self)).is_ok() {
			log::set_max_level(level);
		}
	}

	fn add_logger(&mut self, prefix: impl ToString + Deref<Target = str>, logger: impl Log + 'static) {
		let prefix = if prefix.ends_with("::") {
			prefix.to_string()
		} else {
			format!("{}::", prefix.to_string())
		};
		self.0.push((prefix, Box::new(logger)))
	}
}

impl Log for ShellLogger {
	fn enabled(&self, metadata: &Metadata) -> bool {
		metadata.level() <= log::max_level() && metadata.level() <= Level::Debug
	}

	fn log(&self, record: &Record) {
		if !self.enabled(record.metadata()) {
			return;
		}
		for (prefix, l) in self.0.iter() {
			if record.target() == &prefix[..prefix.len() - 2] || record.target().starts_with(prefix) {
				l.log(record);
			}
		}
	}

	fn flush(&self) {
		for (_, l) in self.0.iter() {
			l.flush();
		}
	}
}

#[cfg(test)]
mod tests {
	use std::io;
	use std::sync::{Arc, RwLock};

	use super::*;
	use pretty_assertions::assert_eq;

	#[derive(Clone, Default)]
	struct Captured {
		inner: Arc<RwLock<String>>,
	}

	impl Captured {
		fn read(&self) -> String {
			self.inner.read().unwrap().clone()
		}
	}

	impl io::Write for &'_ Captured {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.inner.write().unwrap().push_str(std::str::from_utf8(buf).unwrap());
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	fn record<'a>(target: &'a str, args: std::fmt::Arguments<'a>) -> Record<'a> {
		Record::builder().args(args).level(Level::Error).target(target).build()
	}

	#[test]
	fn routes_by_target_prefix() {
		log::set_max_level(LevelFilter::Info);
		let user = Captured::default();
		let debug = Captured::default();
		let mut logger = ShellLogger::default();
		logger.add_logger("jobsh::user", SimpleLogger { target: user.clone(), prefix: "jobsh: " });
		logger.add_logger("jobsh::debug", SimpleLogger { target: debug.clone(), prefix: "[debug] " });

		logger.log(&record("jobsh::user", format_args!("cd: no such directory")));
		logger.log(&record("jobsh::userland", format_args!("not routed")));
		logger.log(&record("jobsh::debug", format_args!("PID: 42")));

		assert_eq!(user.read(), "jobsh: cd: no such directory\n");
		assert_eq!(debug.read(), "[debug] PID: 42\n");
	}
}
