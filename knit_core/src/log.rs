use std::fmt::Display;
use std::path::Path;

use crate::KnitError;

/// Destination for the events emitted while processing documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogSink {
	/// Plain lines on standard output, errors on standard error.
	Console,
	/// `tracing` events with structured fields.
	#[default]
	Tracing,
}

/// Run level log with the counters callers use to decide on failure.
#[derive(Debug, Default)]
pub struct KnitLog {
	sink: LogSink,
	has_warning_or_error: bool,
	n_outdated: usize,
}

impl KnitLog {
	pub fn new(sink: LogSink) -> Self {
		Self {
			sink,
			..Self::default()
		}
	}

	pub fn sink(&self) -> LogSink {
		self.sink
	}

	/// True once any warning, outdated file or error was reported.
	pub fn has_warning_or_error(&self) -> bool {
		self.has_warning_or_error
	}

	/// Number of generated files found missing or out of date in check mode.
	pub fn n_outdated(&self) -> usize {
		self.n_outdated
	}

	pub fn debug(&self, message: impl Display) {
		match self.sink {
			LogSink::Console => {}
			LogSink::Tracing => tracing::debug!("{message}"),
		}
	}

	pub fn info(&self, message: impl Display) {
		match self.sink {
			LogSink::Console => println!("{message}"),
			LogSink::Tracing => tracing::info!("{message}"),
		}
	}

	pub fn warn(&mut self, file: &Path, message: impl Display) {
		self.has_warning_or_error = true;

		match self.sink {
			LogSink::Console => println!("WARNING: {}: {message}", file.display()),
			LogSink::Tracing => tracing::warn!(file = %file.display(), "{message}"),
		}
	}

	/// Report a generated file that differs from what is on disk.
	pub fn outdated(&mut self, file: &Path, message: impl Display) {
		self.n_outdated += 1;
		self.warn(file, message);
	}

	pub fn error(&mut self, error: &KnitError) {
		self.has_warning_or_error = true;

		match self.sink {
			LogSink::Console => eprintln!("ERROR: {error}"),
			LogSink::Tracing => tracing::error!("{error}"),
		}
	}
}
