//! The per document pass.
//!
//! A pass reads a document once, top to bottom. Directives and fenced blocks
//! fill the code, prefix, suffix and expected output buffers. Every knitted
//! file name found in the text (or named by `KNIT`) assembles one generated
//! source from those buffers. Section headers feed the table of contents and
//! bracketed names feed the API reference index.
//!
//! Generated files are only synchronized once the pass completes. A pass that
//! waits for another document's table of contents leaves no trace.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io;
use std::mem;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use derive_more::Deref;
use derive_more::DerefMut;
use regex::Regex;
use serde::Serialize;

use crate::Directive;
use crate::DirectiveKind;
use crate::DocumentPart;
use crate::DocumentReader;
use crate::FileInfo;
use crate::FileType;
use crate::IncludeKind;
use crate::KNIT_INCLUDE_PROP;
use crate::KNIT_LANGUAGE_PROP;
use crate::KNIT_PACKAGE_PROP;
use crate::KnitConfig;
use crate::KnitContext;
use crate::KnitError;
use crate::KnitMatch;
use crate::KnitProps;
use crate::KnitRef;
use crate::KnitResult;
use crate::MODULE_DOCS_PROP;
use crate::SITE_ROOT_PROP;
use crate::TEST_NAME_PROP;
use crate::TestCase;
use crate::VerificationMode;
use crate::config::compile_anchored;
use crate::config::compile_regex;
use crate::find_module_root;
use crate::normalize_path;
use crate::parse_directive;
use crate::read_lines;
use crate::render_template_lines;
use crate::render_test_file;
use crate::resolve_references;
use crate::sync::diff_message;
use crate::test_file_path;

const CODE_START: &str = "```";
const CODE_END: &str = "```";
const TEST_START: &str = "```text";
const SECTION_START: &str = "##";
const SAMPLE_START: &str = "//sampleStart";
const SAMPLE_END: &str = "//sampleEnd";

const API_REF_PATTERN: &str = r"(^|[ \](])\[([A-Za-z0-9_().]+)\]($|[^\[(])";
const LINK_DEF_PATTERN: &str = r"^\[([A-Za-z0-9_().]+)\]: .*$";

/// A section of a document as listed by its table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocRef {
	/// Markdown list marker indented for the section level.
	pub level_prefix: String,
	pub name: String,
	pub anchor: String,
}

/// Lines added to every knitted file whose name matches `pattern`.
#[derive(Debug, Clone)]
pub struct IncludeBlock {
	pub kind: IncludeKind,
	pub pattern: Regex,
	pub lines: Vec<String>,
}

impl IncludeBlock {
	/// Patterns may name the bare file or the file under `knit.dir`.
	pub fn matches(&self, file_name: &str, target: &str) -> bool {
		self.pattern.is_match(file_name) || self.pattern.is_match(target)
	}
}

/// Files generated by one pass.
#[derive(Debug, Default, Deref, DerefMut)]
pub struct GeneratedFiles(HashSet<PathBuf>);

impl GeneratedFiles {
	/// Claim `path`, failing when the pass already generated it.
	pub fn register(&mut self, path: &Path) -> KnitResult<()> {
		if self.0.insert(path.to_path_buf()) {
			Ok(())
		} else {
			Err(KnitError::DuplicateFile {
				path: path.display().to_string(),
			})
		}
	}
}

/// Finds link definitions and bracketed API references in markdown lines.
#[derive(Debug, Clone)]
pub struct ReferenceScanner {
	api_ref: Regex,
	link_def: Regex,
}

impl ReferenceScanner {
	pub fn new() -> KnitResult<Self> {
		Ok(Self {
			api_ref: compile_regex(API_REF_PATTERN)?,
			link_def: compile_regex(LINK_DEF_PATTERN)?,
		})
	}

	/// The name defined by a `[name]: link` line.
	pub fn link_definition<'a>(&self, line: &'a str) -> Option<&'a str> {
		self.link_def
			.captures(line)
			.and_then(|captures| captures.get(1))
			.map(|name| name.as_str())
	}

	/// Every `[name]` that is not itself a link or part of one.
	pub fn references<'a>(&self, line: &'a str) -> Vec<&'a str> {
		let mut names = Vec::new();
		let mut start = 0;

		while let Some(captures) = self.api_ref.captures_at(line, start) {
			let Some(name) = captures.get(2) else {
				break;
			};

			names.push(name.as_str());
			// Resume right after `]` so the next reference may use the
			// character that closed this one.
			start = name.end() + 1;
		}

		names
	}
}

/// Anchor of a section header: spaces become dashes and `.,()` and
/// backticks are dropped. Other punctuation is kept.
pub fn section_anchor(name: &str) -> String {
	name.chars()
		.filter_map(|c| {
			match c {
				' ' => Some('-'),
				'.' | ',' | '(' | ')' | '`' => None,
				c => Some(c),
			}
		})
		.collect::<String>()
		.to_lowercase()
}

/// Convert a knitted file name such as `example-basic-01.kt` into its
/// package name `exampleBasic01`.
pub fn to_knit_name(file_name: &str) -> String {
	let stem = file_name.split('.').next().unwrap_or_default();
	let mut name = String::with_capacity(stem.len());
	let mut upper = false;

	for c in stem.chars() {
		if c == '-' {
			upper = true;
			continue;
		}

		if upper {
			name.extend(c.to_uppercase());
		} else {
			name.push(c);
		}

		upper = false;
	}

	name
}

/// Result of one pass over a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PassOutcome {
	/// The pass completed and these sections can be referenced.
	Published(Vec<TocRef>),
	/// A referenced table of contents is not published yet.
	Retry,
}

#[derive(Debug)]
struct PendingOutput {
	path: PathBuf,
	lines: Vec<String>,
}

#[derive(Debug, Clone)]
struct ModuleDocs {
	name: String,
	/// Relative to the root directory.
	docs_root: PathBuf,
	root_scoped: bool,
}

#[derive(Serialize)]
struct IncludeContext {
	file: FileInfo,
	knit: BTreeMap<String, String>,
}

enum Flow {
	Continue,
	Retry,
}

/// Run one pass over the document at `path`.
pub(crate) fn knit_file(ctx: &mut KnitContext, path: &Path) -> KnitResult<PassOutcome> {
	let location = path.display().to_string();
	ctx.log.info(format!("*** Reading {location}"));

	let (lines, separator) = read_lines(path)?.ok_or_else(|| {
		KnitError::FileIo {
			path: location.clone(),
			source: io::ErrorKind::NotFound.into(),
		}
	})?;
	let props = ctx.props.find(path)?;
	let mut pass = KnitPass::new(ctx, path, props, lines, separator)?;

	match pass.read_document() {
		Ok(true) => pass.finish().map(PassOutcome::Published),
		Ok(false) => Ok(PassOutcome::Retry),
		Err(error) => Err(error.at_line(location, pass.reader.line_number())),
	}
}

struct KnitPass<'a> {
	ctx: &'a mut KnitContext,
	path: PathBuf,
	dir: PathBuf,
	props: Rc<KnitProps>,
	knit: Option<KnitConfig>,
	code_fence: String,
	file_type: FileType,
	separator: Option<&'static str>,
	reader: DocumentReader,
	toc: Vec<String>,
	toc_refs: Vec<TocRef>,
	code: Vec<String>,
	prefix: Vec<String>,
	suffix: Vec<String>,
	includes: Vec<IncludeBlock>,
	test_lines: Vec<String>,
	test_name: Option<String>,
	test_cases: Vec<TestCase>,
	last_knit: Option<KnitRef>,
	autonumber: HashMap<String, usize>,
	/// Line whose autonumber was last rewritten.
	renumbered_at: Option<usize>,
	generated: GeneratedFiles,
	pending: Vec<PendingOutput>,
	module: Option<ModuleDocs>,
	references: ReferenceScanner,
	first_seen: BTreeMap<String, usize>,
	remaining: BTreeSet<String>,
	resolved_case: HashMap<String, String>,
}

impl<'a> KnitPass<'a> {
	fn new(
		ctx: &'a mut KnitContext,
		path: &Path,
		props: Rc<KnitProps>,
		lines: Vec<String>,
		separator: Option<&'static str>,
	) -> KnitResult<Self> {
		let file_type = FileType::from_path(path);
		let knit = KnitConfig::from_props(&props)?;
		let language = props.get(KNIT_LANGUAGE_PROP).unwrap_or("kotlin");
		let code_fence = format!("{CODE_START}{language}");
		let test_name = props.get(TEST_NAME_PROP).map(ToString::to_string);

		Ok(Self {
			ctx,
			path: path.to_path_buf(),
			dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
			props,
			knit,
			code_fence,
			file_type,
			separator,
			reader: DocumentReader::new(lines, file_type),
			toc: Vec::new(),
			toc_refs: Vec::new(),
			code: Vec::new(),
			prefix: Vec::new(),
			suffix: Vec::new(),
			includes: Vec::new(),
			test_lines: Vec::new(),
			test_name,
			test_cases: Vec::new(),
			last_knit: None,
			autonumber: HashMap::new(),
			renumbered_at: None,
			generated: GeneratedFiles::default(),
			pending: Vec::new(),
			module: None,
			references: ReferenceScanner::new()?,
			first_seen: BTreeMap::new(),
			remaining: BTreeSet::new(),
			resolved_case: HashMap::new(),
		})
	}

	/// Read the whole document. Returns `false` when the pass must be
	/// retried later.
	fn read_document(&mut self) -> KnitResult<bool> {
		while let Some(line) = self.reader.read_line() {
			let directive = parse_directive(&line, 0);

			if self.reader.part() == DocumentPart::Toc {
				if directive.is_none() {
					continue;
				}

				self.reader.end_toc();
			}

			if let Some(directive) = directive {
				match self.directive(&line, &directive)? {
					Flow::Continue => continue,
					Flow::Retry => return Ok(false),
				}
			}

			self.content_line(&line)?;
		}

		if self.reader.part() == DocumentPart::Toc {
			return Err(KnitError::UnterminatedToc);
		}

		Ok(true)
	}

	fn directive(&mut self, line: &str, directive: &Directive) -> KnitResult<Flow> {
		let Some(kind) = directive.kind() else {
			return Err(KnitError::UnrecognizedDirective(directive.name.clone()));
		};

		match kind {
			DirectiveKind::Toc => {
				require_single_line(directive)?;
				require_no_param(directive)?;

				if self.reader.part() != DocumentPart::PreToc {
					return Err(KnitError::DuplicateToc);
				}

				self.reader.begin_toc();
			}
			DirectiveKind::TocRef => return self.toc_ref(directive),
			DirectiveKind::Include(include) => self.include(include, directive)?,
			DirectiveKind::Clear => {
				require_single_line(directive)?;
				require_no_param(directive)?;
				self.code.clear();
			}
			DirectiveKind::Knit => {
				require_single_line(directive)?;
				let name = require_param(directive, "file name")?;
				let Some(knit) = &self.knit else {
					return Err(KnitError::KnitNotConfigured(name.to_string()));
				};
				let found = knit
					.match_file_name(name, directive.param_offset)
					.ok_or_else(|| {
						KnitError::KnitNameMismatch {
							name: name.to_string(),
							pattern: knit.pattern.clone(),
						}
					})?;

				self.knit_sample(line, found)?;
			}
			DirectiveKind::TestName => {
				require_single_line(directive)?;
				let name = require_param(directive, "name parameter")?;
				self.flush_tests()?;
				self.test_name = Some(name.to_string());
			}
			DirectiveKind::Test => self.test(directive)?,
			DirectiveKind::Module => self.module(directive)?,
			DirectiveKind::Index => self.index(directive)?,
			DirectiveKind::End => {
				require_single_line(directive)?;
				require_no_param(directive)?;
			}
		}

		Ok(Flow::Continue)
	}

	fn toc_ref(&mut self, directive: &Directive) -> KnitResult<Flow> {
		require_single_line(directive)?;
		let ref_path = require_param(directive, "reference file path")?;
		let target = normalize_path(&self.dir.join(ref_path))?;

		if !self.ctx.file_set.contains(&target) {
			return Err(KnitError::ReferencedFileMissing {
				path: target.display().to_string(),
			});
		}

		let Some(refs) = self.ctx.toc_refs.get(&target) else {
			self.ctx.log.debug(format!(
				"{} waits for the table of contents of {}",
				self.path.display(),
				target.display()
			));
			return Ok(Flow::Retry);
		};

		let lines = refs
			.iter()
			.map(|toc_ref| {
				format!(
					"{} <a name='{anchor}'></a>[{}]({ref_path}#{anchor})",
					toc_ref.level_prefix,
					toc_ref.name,
					anchor = toc_ref.anchor,
				)
			})
			.collect();

		self.reader.replace_until_next_directive(lines, &directive.name)?;
		Ok(Flow::Continue)
	}

	fn include(&mut self, kind: IncludeKind, directive: &Directive) -> KnitResult<()> {
		let Some(pattern) = directive.param.as_deref() else {
			if directive.single_line {
				return Err(KnitError::RequireMultiLine {
					name: directive.name.clone(),
				});
			}

			let buffer = match kind {
				IncludeKind::Include => &mut self.code,
				IncludeKind::Prefix => &mut self.prefix,
				IncludeKind::Suffix => &mut self.suffix,
			};
			self.reader.read_payload(buffer);
			return Ok(());
		};

		let pattern = compile_anchored(pattern)?;
		let lines = if directive.single_line {
			mem::take(&mut self.code)
		} else {
			let mut lines = Vec::new();
			self.reader.read_payload(&mut lines);
			lines
		};

		self.includes.push(IncludeBlock {
			kind,
			pattern,
			lines,
		});

		Ok(())
	}

	fn test(&mut self, directive: &Directive) -> KnitResult<()> {
		let knit = self.last_knit.clone().ok_or(KnitError::TestWithoutKnit)?;

		if self.test_name.is_none() {
			return Err(KnitError::MissingTestName);
		}

		if !self.test_lines.is_empty() {
			require_single_line(directive)?;
		} else if !directive.single_line {
			self.reader.read_payload(&mut self.test_lines);
		} else if directive.param.is_none() {
			return Err(KnitError::MissingExpectedOutput);
		}

		let lines = mem::take(&mut self.test_lines);
		self.test_cases
			.push(TestCase::new(knit, VerificationMode::parse(directive.param()), lines));

		Ok(())
	}

	fn module(&mut self, directive: &Directive) -> KnitResult<()> {
		require_single_line(directive)?;
		let param = require_param(directive, "module name")?;
		let docs = self.props.get_value(MODULE_DOCS_PROP)?;

		let module = match param.strip_prefix('/') {
			Some(name) => {
				ModuleDocs {
					name: name.to_string(),
					docs_root: Path::new(docs).join(name),
					root_scoped: true,
				}
			}
			None => {
				let dir = find_module_root(&self.ctx.root_dir, &self.props, param)?;

				ModuleDocs {
					name: param.to_string(),
					docs_root: dir.join(docs).join(param),
					root_scoped: false,
				}
			}
		};

		self.ctx.log.debug(format!(
			"Module {} documented at {}",
			module.name,
			module.docs_root.display()
		));
		self.module = Some(module);

		Ok(())
	}

	fn index(&mut self, directive: &Directive) -> KnitResult<()> {
		require_single_line(directive)?;
		let site_root = self
			.props
			.get(SITE_ROOT_PROP)
			.ok_or(KnitError::MissingSiteRoot)?
			.to_string();
		let module = self.module.clone().ok_or(KnitError::MissingModule)?;
		let param = directive.param();
		let package = param.split_once('/').map_or(param, |(_, package)| package);

		let index = self.ctx.api_index(&module.docs_root, &module.name, package)?;
		let site_prefix = if module.root_scoped {
			site_root
		} else {
			format!("{site_root}/{}", module.name)
		};

		let lines = resolve_references(
			&index,
			&site_prefix,
			&mut self.remaining,
			&mut self.resolved_case,
			&mut self.ctx.log,
			&self.path,
		);

		self.reader.replace_until_next_directive(lines, &directive.name)
	}

	fn content_line(&mut self, line: &str) -> KnitResult<()> {
		if line.starts_with(&self.code_fence) {
			self.ensure_test_emitted()?;

			if self.code.last().is_some_and(|last| !last.trim().is_empty()) {
				self.code.push(String::new());
			}

			self.reader.read_fence(CODE_END, &mut self.code, |line| {
				let trimmed = line.trim_start();
				!trimmed.starts_with(SAMPLE_START) && !trimmed.starts_with(SAMPLE_END)
			});
			return Ok(());
		}

		if line.starts_with(TEST_START) {
			self.ensure_test_emitted()?;
			self.reader.read_fence(CODE_END, &mut self.test_lines, |_| true);
			return Ok(());
		}

		if line.starts_with(SECTION_START) && self.reader.part() == DocumentPart::PostToc {
			return self.section(line);
		}

		if self.file_type.scans_references() {
			self.scan_references(line);
		}

		if let Some(found) = self.knit.as_ref().and_then(|knit| knit.find_reference(line)) {
			self.knit_sample(line, found)?;
		}

		Ok(())
	}

	fn ensure_test_emitted(&self) -> KnitResult<()> {
		if self.test_name.is_some() && !self.test_lines.is_empty() {
			return Err(KnitError::PendingTest);
		}

		Ok(())
	}

	fn section(&mut self, line: &str) -> KnitResult<()> {
		let level = line
			.find(' ')
			.filter(|&index| index >= 2)
			.ok_or(KnitError::InvalidSectionHeader)?;
		let name = line[level + 1..].trim();
		let level_prefix = format!("{}*", "  ".repeat(level - 2));
		let anchor = section_anchor(name);

		self.toc.push(format!("{level_prefix} [{name}](#{anchor})"));
		self.toc_refs.push(TocRef {
			level_prefix,
			name: name.to_string(),
			anchor,
		});

		Ok(())
	}

	fn scan_references(&mut self, line: &str) {
		if let Some(name) = self.references.link_definition(line) {
			self.remaining.remove(name);
			return;
		}

		let number = self.reader.line_number();

		for name in self.references.references(line) {
			self.first_seen.entry(name.to_string()).or_insert(number);
			self.remaining.insert(name.to_string());
		}
	}

	/// Check the autonumber of a knitted file name and emit the file. A
	/// wrong number is fixed in place and the line is read again.
	fn knit_sample(&mut self, line: &str, found: KnitMatch) -> KnitResult<()> {
		if let Some(number) = found.number.clone() {
			let digits = self.knit.as_ref().map_or(0, |knit| knit.autonumber_digits);
			let key = format!(
				"{}{}",
				&line[found.file.start..number.start],
				&line[number.end..found.file.end]
			);
			let index = self.autonumber.get(&key).copied().unwrap_or(1);
			let expected = format!("{index:0digits$}");

			if line[number.clone()] != expected {
				let line_number = self.reader.line_number();

				// A rewritten number that still does not match will never
				// converge.
				if self.renumbered_at == Some(line_number) {
					return Err(KnitError::AutonumberDiverges {
						name: found.file_name,
						pattern: self.knit.as_ref().map(|knit| knit.pattern.clone()).unwrap_or_default(),
					});
				}

				self.renumbered_at = Some(line_number);
				let updated = format!("{}{expected}{}", &line[..number.start], &line[number.end..]);
				self.ctx.log.debug(format!(
					"{}:{}: renumbered {} to {expected}",
					self.path.display(),
					line_number,
					&line[number]
				));
				self.reader.update_line_and_retry(updated);
				return Ok(());
			}

			self.autonumber.insert(key, index + 1);
		}

		self.emit(&found.file_name)
	}

	fn emit(&mut self, file_name: &str) -> KnitResult<()> {
		let relative = self
			.knit
			.as_ref()
			.map(|knit| knit.target(file_name))
			.ok_or_else(|| KnitError::KnitNotConfigured(file_name.to_string()))?;
		let target = normalize_path(&self.dir.join(&relative))?;
		self.generated.register(&target)?;
		self.ctx.log.info(format!("Knitting {} ...", target.display()));

		let knit_name = to_knit_name(file_name);
		let mut knit = self.props.get_map("knit");
		knit.insert("name".to_string(), knit_name.clone());
		let context = IncludeContext {
			file: FileInfo::new(&self.path),
			knit,
		};
		let header = render_template_lines(&self.props, KNIT_INCLUDE_PROP, &context)?;

		let mut lines = self.matching(IncludeKind::Prefix, file_name, &relative);
		lines.append(&mut self.prefix);
		lines.extend(header);
		lines.push(String::new());
		lines.extend(self.matching(IncludeKind::Include, file_name, &relative));

		if lines.last().is_some_and(|last| !last.trim().is_empty()) {
			lines.push(String::new());
		}

		lines.extend(
			self.code
				.drain(..)
				.map(|line| line.replace("System.currentTimeMillis()", "currentTimeMillis()")),
		);
		lines.extend(self.matching(IncludeKind::Suffix, file_name, &relative));
		lines.append(&mut self.suffix);

		self.pending.push(PendingOutput {
			path: target,
			lines,
		});
		self.last_knit = Some(KnitRef {
			package: self.props.get_value(KNIT_PACKAGE_PROP)?.to_string(),
			name: knit_name,
		});

		Ok(())
	}

	fn matching(&self, kind: IncludeKind, file_name: &str, target: &str) -> Vec<String> {
		self.includes
			.iter()
			.filter(|block| block.kind == kind && block.matches(file_name, target))
			.flat_map(|block| block.lines.iter().cloned())
			.collect()
	}

	/// Queue the test file of the active group, if it has any cases.
	fn flush_tests(&mut self) -> KnitResult<()> {
		if self.test_cases.is_empty() {
			return Ok(());
		}

		let Some(test_name) = self.test_name.clone() else {
			return Err(KnitError::MissingTestName);
		};
		let cases = mem::take(&mut self.test_cases);
		let lines = render_test_file(&self.props, &self.path, &test_name, &cases)?;
		let path = normalize_path(&test_file_path(&self.props, &test_name)?)?;

		self.generated.register(&path)?;
		self.ctx.log.debug(format!(
			"{} test case(s) of {test_name} go to {}",
			cases.len(),
			path.display()
		));
		self.pending.push(PendingOutput { path, lines });

		Ok(())
	}

	fn finish(mut self) -> KnitResult<Vec<TocRef>> {
		self.flush_tests()?;

		let sync = self.ctx.sync;
		for output in mem::take(&mut self.pending) {
			sync.sync(&mut self.ctx.log, &output.path, &output.lines)?;
		}

		let rebuilt = self.reader.rebuild(&self.toc);

		if rebuilt != self.reader.input() {
			if sync.check && self.ctx.strict_check {
				let message = format!("is not up-to-date, {}", diff_message(self.reader.input(), &rebuilt));
				self.ctx.log.outdated(&self.path, message);
			} else {
				let separator = self.separator.unwrap_or(sync.line_separator.as_str());
				sync.write(&self.ctx.log, &self.path, &rebuilt, separator)?;
			}
		}

		let mut broken: Vec<(usize, &String)> = self
			.first_seen
			.iter()
			.filter(|(name, _)| self.remaining.contains(*name))
			.map(|(name, &line)| (line, name))
			.collect();
		broken.sort();

		for (line, name) in broken {
			self.ctx
				.log
				.warn(&self.path, format!("{line}: Broken reference to [{name}]"));
		}

		Ok(self.toc_refs)
	}
}

fn require_single_line(directive: &Directive) -> KnitResult<()> {
	if directive.single_line {
		Ok(())
	} else {
		Err(KnitError::RequireSingleLine {
			name: directive.name.clone(),
		})
	}
}

fn require_no_param(directive: &Directive) -> KnitResult<()> {
	match directive.param {
		None => Ok(()),
		Some(_) => {
			Err(KnitError::UnexpectedParameter {
				name: directive.name.clone(),
			})
		}
	}
}

fn require_param<'d>(directive: &'d Directive, what: &'static str) -> KnitResult<&'d str> {
	directive.param.as_deref().ok_or_else(|| {
		KnitError::MissingParameter {
			name: directive.name.clone(),
			what,
		}
	})
}
