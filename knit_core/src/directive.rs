use std::fmt;
use std::path::Path;

use logos::Logos;

/// Marker that starts a directive line.
pub const DIRECTIVE_START: &str = "<!--- ";
/// Marker that closes a directive, on the same line or on its own line.
pub const DIRECTIVE_END: &str = "-->";
/// Marker that closes an open directive and starts the next one.
pub const DIRECTIVE_NEXT: &str = "----- ";

/// Raw tokens for the head of a directive line.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
	#[token("<!---")]
	Open,
	#[token("-->")]
	Close,
	#[regex("[A-Z_]+")]
	Name,
	#[regex(r"[ \t]+")]
	Whitespace,
}

/// A directive parsed from a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
	pub name: String,
	/// The trimmed parameter, `None` when empty.
	pub param: Option<String>,
	/// Byte offset of the parameter in the raw line.
	pub param_offset: usize,
	/// Whether the closing `-->` is on the same line.
	pub single_line: bool,
}

impl Directive {
	pub fn param(&self) -> &str {
		self.param.as_deref().unwrap_or_default()
	}

	pub fn kind(&self) -> Option<DirectiveKind> {
		DirectiveKind::from_name(&self.name)
	}
}

/// Parse `line[offset..]` as a directive.
///
/// Returns `None` when the text does not start with `<!--- ` followed by an
/// uppercase name. Everything after the name up to an optional trailing
/// `-->` is the parameter.
pub fn parse_directive(line: &str, offset: usize) -> Option<Directive> {
	let text = line.get(offset..)?;

	if !text.starts_with(DIRECTIVE_START) {
		return None;
	}

	let mut tokens = RawToken::lexer(text).spanned();

	let (Ok(RawToken::Open), _) = tokens.next()? else {
		return None;
	};
	let (Ok(RawToken::Whitespace), _) = tokens.next()? else {
		return None;
	};
	let (Ok(RawToken::Name), name_span) = tokens.next()? else {
		return None;
	};

	match tokens.next() {
		None | Some((Ok(RawToken::Whitespace | RawToken::Close), _)) => {}
		Some(_) => return None,
	}

	let rest = &text[name_span.end..];
	let leading = rest.len() - rest.trim_start().len();
	let mut body = rest.trim();
	let single_line = body.ends_with(DIRECTIVE_END);

	if single_line {
		body = body[..body.len() - DIRECTIVE_END.len()].trim_end();
	}

	Some(Directive {
		name: text[name_span.clone()].to_string(),
		param: (!body.is_empty()).then(|| body.to_string()),
		param_offset: offset + name_span.end + leading,
		single_line,
	})
}

/// Every directive the document processor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
	Toc,
	TocRef,
	Include(IncludeKind),
	Clear,
	Knit,
	TestName,
	Test,
	Module,
	Index,
	End,
}

impl DirectiveKind {
	pub fn from_name(name: &str) -> Option<Self> {
		let kind = match name {
			"TOC" => Self::Toc,
			"TOC_REF" => Self::TocRef,
			"INCLUDE" => Self::Include(IncludeKind::Include),
			"PREFIX" => Self::Include(IncludeKind::Prefix),
			"SUFFIX" => Self::Include(IncludeKind::Suffix),
			"CLEAR" => Self::Clear,
			"KNIT" => Self::Knit,
			"TEST_NAME" => Self::TestName,
			"TEST" => Self::Test,
			"MODULE" => Self::Module,
			"INDEX" => Self::Index,
			"END" => Self::End,
			_ => return None,
		};

		Some(kind)
	}
}

/// The three flavours of included snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncludeKind {
	Include,
	Prefix,
	Suffix,
}

impl fmt::Display for IncludeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Include => write!(f, "INCLUDE"),
			Self::Prefix => write!(f, "PREFIX"),
			Self::Suffix => write!(f, "SUFFIX"),
		}
	}
}

/// How directives are embedded in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
	/// Every line may hold a directive and references are scanned.
	Markdown,
	/// Directives live in `//` line comments or `/* */` block comments.
	Source,
	/// Every line may hold a directive, no reference scanning.
	Unknown,
}

impl FileType {
	pub fn from_path(path: &Path) -> Self {
		let extension = path
			.extension()
			.and_then(|ext| ext.to_str())
			.map(str::to_ascii_lowercase);

		match extension.as_deref() {
			Some("md" | "markdown" | "mdx") => Self::Markdown,
			Some(
				"kt" | "kts" | "java" | "rs" | "ts" | "tsx" | "js" | "jsx" | "swift" | "scala"
				| "groovy" | "go" | "c" | "cc" | "cpp" | "h" | "hpp" | "cs" | "dart",
			) => Self::Source,
			_ => Self::Unknown,
		}
	}

	pub fn scans_references(self) -> bool {
		self == Self::Markdown
	}
}

/// Tracks comment state while reading a source file and locates the start
/// of comment content on each line.
#[derive(Debug, Clone)]
pub struct CommentScanner {
	file_type: FileType,
	in_block: bool,
}

impl CommentScanner {
	pub fn new(file_type: FileType) -> Self {
		Self {
			file_type,
			in_block: false,
		}
	}

	/// The offset at which directive scanning starts on this line, or `None`
	/// when the line is not eligible to hold directives.
	pub fn content_offset(&mut self, line: &str) -> Option<usize> {
		if self.file_type != FileType::Source {
			return Some(0);
		}

		let trimmed = line.trim_start();
		let indent = line.len() - trimmed.len();

		if self.in_block {
			if trimmed.contains("*/") {
				self.in_block = false;
				return None;
			}

			return match trimmed.strip_prefix('*') {
				Some(rest) => Some(indent + 1 + usize::from(rest.starts_with(' '))),
				None => Some(0),
			};
		}

		if let Some(rest) = trimmed.strip_prefix("//") {
			let marker = usize::from(rest.starts_with(['/', '!']));
			let space = usize::from(rest[marker..].starts_with(' '));
			return Some(indent + 2 + marker + space);
		}

		if let Some(start) = block_comment_start(trimmed) {
			self.in_block = !trimmed[start + 2..].contains("*/");
		}

		None
	}
}

/// Offset of a `/*` that opens a comment on a code line. Text inside double
/// quoted strings and after a `//` comment is skipped.
fn block_comment_start(line: &str) -> Option<usize> {
	let bytes = line.as_bytes();
	let mut in_string = false;
	let mut escaped = false;

	for (index, &byte) in bytes.iter().enumerate() {
		if in_string {
			match byte {
				_ if escaped => escaped = false,
				b'\\' => escaped = true,
				b'"' => in_string = false,
				_ => {}
			}
			continue;
		}

		match (byte, bytes.get(index + 1)) {
			(b'"', _) => in_string = true,
			(b'/', Some(b'*')) => return Some(index),
			(b'/', Some(b'/')) => return None,
			_ => {}
		}
	}

	None
}
