use std::ops::Range;
use std::path::PathBuf;

use regex::Regex;

use crate::KNIT_DIR_PROP;
use crate::KNIT_PATTERN_PROP;
use crate::KnitError;
use crate::KnitProps;
use crate::KnitResult;
use crate::LineSeparator;
use crate::LogSink;

/// Placeholder for the autonumbered part of `knit.pattern`.
pub const AUTONUMBER_PLACEHOLDER: char = '#';
const AUTONUMBER_GROUP: &str = "([0-9a-z]+)";

/// Options for one processing run.
#[derive(Debug, Clone)]
pub struct KnitOptions {
	/// Upper bound of `knit.properties` discovery. `TOC_REF` targets must be
	/// among `files`.
	pub root_dir: PathBuf,
	/// Documents to process, in order.
	pub files: Vec<PathBuf>,
	/// Report missing and outdated files instead of writing them.
	pub check: bool,
	/// In check mode, also report documents whose table of contents or
	/// index is stale instead of rewriting them.
	pub strict_check: bool,
	/// Separator for files that do not exist yet.
	pub line_separator: LineSeparator,
	pub log_sink: LogSink,
}

impl KnitOptions {
	pub fn new(root_dir: impl Into<PathBuf>, files: Vec<PathBuf>) -> Self {
		Self {
			root_dir: root_dir.into(),
			files,
			check: false,
			strict_check: false,
			line_separator: LineSeparator::default(),
			log_sink: LogSink::default(),
		}
	}
}

/// Where knitted samples go and how their names look, from `knit.dir` and
/// `knit.pattern`.
#[derive(Debug, Clone)]
pub struct KnitConfig {
	pub dir: String,
	pub pattern: String,
	/// Width of the autonumber, zero when the pattern has no placeholder.
	pub autonumber_digits: usize,
	/// Matches `(dir/name)` links: the path, the name and the number.
	reference: Regex,
	/// Matches a bare name: the name and the number.
	file_name: Regex,
}

/// A knitted file name found in a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnitMatch {
	pub file_name: String,
	/// Span of the file name in the line.
	pub file: Range<usize>,
	/// Span of the autonumber in the line.
	pub number: Option<Range<usize>>,
}

impl KnitConfig {
	/// The knit configuration, or `None` when `knit.dir` is not set.
	pub fn from_props(props: &KnitProps) -> KnitResult<Option<Self>> {
		let Some(dir) = props.get(KNIT_DIR_PROP) else {
			return Ok(None);
		};
		let pattern = props.get_value(KNIT_PATTERN_PROP)?;
		let (expanded, autonumber_digits) = expand_autonumber(pattern)?;

		Ok(Some(Self {
			dir: dir.to_string(),
			pattern: pattern.to_string(),
			autonumber_digits,
			reference: compile_regex(&format!(r"\(({}({expanded}))\)", regex::escape(dir)))?,
			file_name: compile_regex(&format!("^({expanded})$"))?,
		}))
	}

	/// The first knitted file link in `line`.
	pub fn find_reference(&self, line: &str) -> Option<KnitMatch> {
		let captures = self.reference.captures(line)?;
		let file = captures.get(2)?;

		Some(KnitMatch {
			file_name: file.as_str().to_string(),
			file: file.range(),
			number: self.number(captures.get(3), 0),
		})
	}

	/// Match `name`, which starts at `offset` in its line, against the
	/// pattern.
	pub fn match_file_name(&self, name: &str, offset: usize) -> Option<KnitMatch> {
		let captures = self.file_name.captures(name)?;
		let file = captures.get(1)?;

		Some(KnitMatch {
			file_name: file.as_str().to_string(),
			file: offset + file.start()..offset + file.end(),
			number: self.number(captures.get(2), offset),
		})
	}

	/// Path of a knitted file relative to the document directory.
	pub fn target(&self, file_name: &str) -> String {
		format!("{}{file_name}", self.dir)
	}

	fn number(&self, group: Option<regex::Match<'_>>, offset: usize) -> Option<Range<usize>> {
		if self.autonumber_digits == 0 {
			return None;
		}

		group.map(|number| offset + number.start()..offset + number.end())
	}
}

/// Replace the `#` run in `pattern` with a capture group for the number.
fn expand_autonumber(pattern: &str) -> KnitResult<(String, usize)> {
	if pattern.contains(['(', ')']) {
		return Err(KnitError::InvalidKnitPattern {
			pattern: pattern.to_string(),
			reason: "the pattern cannot have match groups",
		});
	}

	let (Some(first), Some(last)) = (
		pattern.find(AUTONUMBER_PLACEHOLDER),
		pattern.rfind(AUTONUMBER_PLACEHOLDER),
	) else {
		return Ok((pattern.to_string(), 0));
	};

	if pattern[first..=last].chars().any(|c| c != AUTONUMBER_PLACEHOLDER) {
		return Err(KnitError::InvalidKnitPattern {
			pattern: pattern.to_string(),
			reason: "only a contiguous range of '#' can be used for auto-numbering",
		});
	}

	let expanded = format!("{}{AUTONUMBER_GROUP}{}", &pattern[..first], &pattern[last + 1..]);
	Ok((expanded, last - first + 1))
}

pub(crate) fn compile_regex(pattern: &str) -> KnitResult<Regex> {
	Regex::new(pattern).map_err(|e| {
		KnitError::InvalidRegex {
			pattern: pattern.to_string(),
			reason: e.to_string(),
		}
	})
}

/// A regex that must match a whole name.
pub(crate) fn compile_anchored(pattern: &str) -> KnitResult<Regex> {
	Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
		KnitError::InvalidRegex {
			pattern: pattern.to_string(),
			reason: e.to_string(),
		}
	})
}
