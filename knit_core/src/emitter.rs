use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;

use crate::FileInfo;
use crate::KnitProps;
use crate::KnitResult;
use crate::TEST_DIR_PROP;
use crate::TEST_LANGUAGE_PROP;
use crate::TEST_TEMPLATE_PROP;
use crate::render_template_lines;

/// Identity of a knitted sample: the package its entry point lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnitRef {
	pub package: String,
	pub name: String,
}

/// How a test compares captured output with the expected lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationMode {
	/// Every line matches exactly, in order.
	Exact,
	/// Each actual line starts with the expected one.
	StartsWith,
	/// Expected lines prefix actual lines in order, extra actual lines allowed.
	LinesStart,
	LinesStartUnordered,
	ArbitraryTime,
	FlexibleTime,
	FlexibleThread,
	/// Stack trace content may vary.
	Exception,
	/// A boolean expression over the captured `lines`.
	Predicate(String),
}

impl VerificationMode {
	pub fn parse(param: &str) -> Self {
		match param {
			"" => Self::Exact,
			"STARTS_WITH" => Self::StartsWith,
			"LINES_START" => Self::LinesStart,
			"LINES_START_UNORDERED" => Self::LinesStartUnordered,
			"ARBITRARY_TIME" => Self::ArbitraryTime,
			"FLEXIBLE_TIME" => Self::FlexibleTime,
			"FLEXIBLE_THREAD" => Self::FlexibleThread,
			"EXCEPTION" => Self::Exception,
			predicate => Self::Predicate(predicate.to_string()),
		}
	}

	/// Key of the `test.mode.<KEY>` property that overrides the verifier.
	pub fn key(&self) -> Option<&'static str> {
		let key = match self {
			Self::Exact => "EXACT",
			Self::StartsWith => "STARTS_WITH",
			Self::LinesStart => "LINES_START",
			Self::LinesStartUnordered => "LINES_START_UNORDERED",
			Self::ArbitraryTime => "ARBITRARY_TIME",
			Self::FlexibleTime => "FLEXIBLE_TIME",
			Self::FlexibleThread => "FLEXIBLE_THREAD",
			Self::Exception => "EXCEPTION",
			Self::Predicate(_) => return None,
		};

		Some(key)
	}

	fn default_method(&self) -> Option<&'static str> {
		let method = match self {
			Self::Exact => "verifyLines",
			Self::StartsWith => "verifyLinesStartWith",
			Self::LinesStart => "verifyLinesStart",
			Self::LinesStartUnordered => "verifyLinesStartUnordered",
			Self::ArbitraryTime => "verifyLinesArbitraryTime",
			Self::FlexibleTime => "verifyLinesFlexibleTime",
			Self::FlexibleThread => "verifyLinesFlexibleThread",
			Self::Exception => "verifyExceptions",
			Self::Predicate(_) => return None,
		};

		Some(method)
	}

	/// The verifier invoked on the captured output, `None` for predicates.
	pub fn method(&self, props: &KnitProps) -> Option<String> {
		let key = self.key()?;

		props
			.get(&format!("test.mode.{key}"))
			.or_else(|| self.default_method())
			.map(ToString::to_string)
	}
}

/// One generated test function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
	pub knit: KnitRef,
	pub function_name: String,
	pub mode: VerificationMode,
	pub lines: Vec<String>,
}

impl TestCase {
	pub fn new(knit: KnitRef, mode: VerificationMode, lines: Vec<String>) -> Self {
		let function_name = capitalize(&knit.name);

		Self {
			knit,
			function_name,
			mode,
			lines,
		}
	}
}

#[derive(Serialize)]
struct TestFileContext<'a> {
	file: FileInfo,
	test: BTreeMap<String, String>,
	cases: Vec<CaseContext<'a>>,
}

#[derive(Serialize)]
struct CaseContext<'a> {
	name: &'a str,
	knit: &'a KnitRef,
	method: Option<String>,
	predicate: Option<&'a str>,
	lines: Vec<String>,
}

/// Render the test file for `cases` of the test group `test_name`.
pub fn render_test_file(
	props: &KnitProps,
	source: &Path,
	test_name: &str,
	cases: &[TestCase],
) -> KnitResult<Vec<String>> {
	let mut test = props.get_map("test");
	test.insert("name".to_string(), test_name.to_string());

	let cases = cases
		.iter()
		.map(|case| {
			CaseContext {
				name: &case.function_name,
				knit: &case.knit,
				method: case.mode.method(props),
				predicate: match &case.mode {
					VerificationMode::Predicate(predicate) => Some(predicate.as_str()),
					_ => None,
				},
				lines: case.lines.iter().map(|line| escape_string(line)).collect(),
			}
		})
		.collect();

	let context = TestFileContext {
		file: FileInfo::new(source),
		test,
		cases,
	};

	render_template_lines(props, TEST_TEMPLATE_PROP, &context)
}

/// Where the test file for `test_name` is written.
pub fn test_file_path(props: &KnitProps, test_name: &str) -> KnitResult<PathBuf> {
	let dir = props.get_file(TEST_DIR_PROP)?;
	let language = props.get(TEST_LANGUAGE_PROP).unwrap_or("kotlin");

	Ok(dir.join(format!("{test_name}.{}", language_extension(language))))
}

/// File extension used for sources written in `language`.
pub fn language_extension(language: &str) -> &str {
	match language {
		"kotlin" => "kt",
		"java" => "java",
		"rust" => "rs",
		"swift" => "swift",
		"typescript" => "ts",
		"javascript" => "js",
		"python" => "py",
		other => other,
	}
}

/// Escape a line for use inside a double quoted string literal.
pub fn escape_string(line: &str) -> String {
	line.replace('\\', "\\\\").replace('"', "\\\"")
}

pub(crate) fn capitalize(name: &str) -> String {
	let mut chars = name.chars();

	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}
