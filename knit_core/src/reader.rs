use std::mem;

use crate::CommentScanner;
use crate::DIRECTIVE_END;
use crate::DIRECTIVE_NEXT;
use crate::DIRECTIVE_START;
use crate::FileType;
use crate::KnitError;
use crate::KnitResult;
use crate::parse_directive;

/// Where the reader is relative to the table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentPart {
	PreToc,
	Toc,
	PostToc,
}

/// Line reader over a document that also records the rewritten output.
///
/// Every raw line read is copied to the output of the current part, unless
/// the reader is inside the table of contents or skipping a region that is
/// being replaced. Only lines eligible to hold directives are returned, with
/// their comment prefix stripped.
#[derive(Debug)]
pub struct DocumentReader {
	lines: Vec<String>,
	cursor: usize,
	comments: CommentScanner,
	part: DocumentPart,
	pre_toc: Vec<String>,
	post_toc: Vec<String>,
	toc_prefix: String,
	skip: bool,
	put_back: Option<String>,
	/// The pushed back line stands for a `----- NAME` continuation.
	put_back_continues: bool,
	/// The last line returned stands for a `----- NAME` continuation.
	continues: bool,
	prefix: String,
}

impl DocumentReader {
	pub fn new(lines: Vec<String>, file_type: FileType) -> Self {
		Self {
			lines,
			cursor: 0,
			comments: CommentScanner::new(file_type),
			part: DocumentPart::PreToc,
			pre_toc: Vec::new(),
			post_toc: Vec::new(),
			toc_prefix: String::new(),
			skip: false,
			put_back: None,
			put_back_continues: false,
			continues: false,
			prefix: String::new(),
		}
	}

	/// The original lines of the document.
	pub fn input(&self) -> &[String] {
		&self.lines
	}

	/// One based number of the last raw line read.
	pub fn line_number(&self) -> usize {
		self.cursor
	}

	pub fn part(&self) -> DocumentPart {
		self.part
	}

	/// Read the next eligible line, preferring a pushed back line.
	pub fn read_line(&mut self) -> Option<String> {
		if let Some(line) = self.put_back.take() {
			self.continues = mem::take(&mut self.put_back_continues);
			return Some(line);
		}

		self.continues = false;

		loop {
			let raw = self.lines.get(self.cursor)?;
			self.cursor += 1;

			if !self.skip {
				match self.part {
					DocumentPart::PreToc => self.pre_toc.push(raw.clone()),
					DocumentPart::PostToc => self.post_toc.push(raw.clone()),
					DocumentPart::Toc => {}
				}
			}

			if let Some(offset) = self.comments.content_offset(raw) {
				self.prefix = raw[..offset].to_string();
				return Some(raw[offset..].to_string());
			}
		}
	}

	/// Replace the last line in the output with `line` and read it again.
	///
	/// A line read from a `----- NAME` continuation keeps that marker in the
	/// output, so the payload it terminates stays terminated.
	pub fn update_line_and_retry(&mut self, line: String) {
		let raw = match line.strip_prefix(DIRECTIVE_START).filter(|_| self.continues) {
			Some(rest) => format!("{}{DIRECTIVE_NEXT}{rest}", self.prefix),
			None => format!("{}{line}", self.prefix),
		};

		if let Some(last) = self.output().and_then(|output| output.last_mut()) {
			*last = raw;
		}

		self.put_back = Some(line);
		self.put_back_continues = self.continues;
	}

	/// Start collecting the table of contents after the current line.
	pub fn begin_toc(&mut self) {
		self.toc_prefix = self.prefix.clone();
		self.part = DocumentPart::Toc;
	}

	/// Close the table of contents on the current directive line, which
	/// becomes the first line after it.
	pub fn end_toc(&mut self) {
		self.part = DocumentPart::PostToc;

		if let Some(raw) = self.cursor.checked_sub(1).and_then(|index| self.lines.get(index)) {
			self.post_toc.push(raw.clone());
		}
	}

	/// Drop everything up to the next directive and put `lines` in its place.
	/// The directive is pushed back to be processed next.
	pub fn replace_until_next_directive(&mut self, lines: Vec<String>, after: &str) -> KnitResult<()> {
		let prefix = self.prefix.clone();
		self.skip = true;

		let next = loop {
			let Some(line) = self.read_line() else {
				self.skip = false;
				return Err(KnitError::UnexpectedEndOfFile(after.to_string()));
			};

			if parse_directive(&line, 0).is_some() {
				break line;
			}
		};

		self.skip = false;
		let raw = self.lines.get(self.cursor - 1).cloned().unwrap_or_default();

		if let Some(output) = self.output() {
			output.extend(lines.into_iter().map(|line| format!("{prefix}{line}")));
			output.push(raw);
		}

		self.put_back = Some(next);
		self.put_back_continues = false;
		Ok(())
	}

	/// Read an open directive's payload into `out`.
	///
	/// The payload ends at a `-->` line. A `----- NAME` line also ends it and
	/// is read next as the directive `<!--- NAME`.
	pub fn read_payload(&mut self, out: &mut Vec<String>) {
		while let Some(line) = self.read_line() {
			if line.starts_with(DIRECTIVE_END) {
				return;
			}

			if let Some(rest) = line.strip_prefix(DIRECTIVE_NEXT) {
				self.put_back = Some(format!("{DIRECTIVE_START}{rest}"));
				self.put_back_continues = true;
				return;
			}

			out.push(line);
		}
	}

	/// Read the body of a fenced block up to the line starting with `end`.
	pub fn read_fence(&mut self, end: &str, out: &mut Vec<String>, keep: impl Fn(&str) -> bool) {
		while let Some(line) = self.read_line() {
			if line.starts_with(end) {
				return;
			}

			if keep(&line) {
				out.push(line);
			}
		}
	}

	/// The document rebuilt with a fresh table of contents.
	pub fn rebuild(&self, toc: &[String]) -> Vec<String> {
		let mut lines = self.pre_toc.clone();

		if !toc.is_empty() {
			lines.push(String::new());
			lines.extend(toc.iter().map(|line| format!("{}{line}", self.toc_prefix)));
			lines.push(String::new());
		}

		lines.extend(self.post_toc.iter().cloned());
		lines
	}

	fn output(&mut self) -> Option<&mut Vec<String>> {
		match self.part {
			DocumentPart::PreToc => Some(&mut self.pre_toc),
			DocumentPart::PostToc => Some(&mut self.post_toc),
			DocumentPart::Toc => None,
		}
	}
}
