use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use crate::KnitError;
use crate::KnitLog;
use crate::KnitResult;
use crate::format_diff;

/// Line terminator used for files that do not exist yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineSeparator {
	#[default]
	Lf,
	CrLf,
}

impl LineSeparator {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Lf => "\n",
			Self::CrLf => "\r\n",
		}
	}
}

impl FromStr for LineSeparator {
	type Err = KnitError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"\n" | "lf" | "LF" => Ok(Self::Lf),
			"\r\n" | "crlf" | "CRLF" => Ok(Self::CrLf),
			other => Err(KnitError::InvalidLineSeparator(other.to_string())),
		}
	}
}

impl fmt::Display for LineSeparator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?}", self.as_str())
	}
}

/// What the synchronizer did with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
	UpToDate,
	/// Check mode: the file does not exist.
	Missing,
	/// Check mode: the file differs.
	Outdated,
	Written,
}

/// The terminator of the first line in `text`.
pub fn first_line_separator(text: &str) -> Option<&'static str> {
	let index = text.find(['\r', '\n'])?;

	if text[index..].starts_with("\r\n") {
		Some("\r\n")
	} else if text[index..].starts_with('\r') {
		Some("\r")
	} else {
		Some("\n")
	}
}

/// Split `text` on `\r\n`, `\n` or `\r`. A trailing terminator does not
/// start another line.
pub fn split_lines(text: &str) -> Vec<String> {
	let mut lines = Vec::new();
	let mut rest = text;

	while let Some(index) = rest.find(['\r', '\n']) {
		lines.push(rest[..index].to_string());
		let width = if rest[index..].starts_with("\r\n") { 2 } else { 1 };
		rest = &rest[index + width..];
	}

	if !rest.is_empty() {
		lines.push(rest.to_string());
	}

	lines
}

/// The lines and line separator of `path`, or `None` when it does not exist.
pub fn read_lines(path: &Path) -> KnitResult<Option<(Vec<String>, Option<&'static str>)>> {
	match std::fs::read_to_string(path) {
		Ok(text) => Ok(Some((split_lines(&text), first_line_separator(&text)))),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
		Err(source) => {
			Err(KnitError::FileIo {
				path: path.display().to_string(),
				source,
			})
		}
	}
}

/// Keeps files on disk in line with freshly computed content.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synchronizer {
	/// Report differences instead of writing.
	pub check: bool,
	pub line_separator: LineSeparator,
}

impl Synchronizer {
	/// Bring `path` up to date with `lines`, or report it in check mode.
	pub fn sync(&self, log: &mut KnitLog, path: &Path, lines: &[String]) -> KnitResult<SyncStatus> {
		let existing = read_lines(path)?;

		if let Some((old, _)) = &existing {
			if old.as_slice() == lines {
				return Ok(SyncStatus::UpToDate);
			}
		}

		if self.check {
			return Ok(match &existing {
				None => {
					log.outdated(path, "is missing");
					SyncStatus::Missing
				}
				Some((old, _)) => {
					log.outdated(path, format!("is not up-to-date, {}", diff_message(old, lines)));
					SyncStatus::Outdated
				}
			});
		}

		let separator = existing
			.and_then(|(_, separator)| separator)
			.unwrap_or(self.line_separator.as_str());
		self.write(log, path, lines, separator)?;

		Ok(SyncStatus::Written)
	}

	/// Write `lines` to `path` unconditionally, terminating every line.
	pub fn write(&self, log: &KnitLog, path: &Path, lines: &[String], separator: &str) -> KnitResult<()> {
		log.info(format!(" Writing {} ...", path.display()));

		let io_error = |source| {
			KnitError::FileIo {
				path: path.display().to_string(),
				source,
			}
		};

		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).map_err(io_error)?;
		}

		let mut content = String::with_capacity(lines.iter().map(|line| line.len() + 2).sum());

		for line in lines {
			content.push_str(line);
			content.push_str(separator);
		}

		std::fs::write(path, content).map_err(io_error)
	}
}

pub(crate) fn diff_message(old: &[String], new: &[String]) -> String {
	match format_diff(old, new) {
		Some(diff) => format!("diff:\n{diff}"),
		None => "diff is too large to show".to_string(),
	}
}
