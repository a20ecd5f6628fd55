use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::*;

const PROPS: &str = "knit.dir=example/\ntest.dir=test/\n";

fn doc(lines: &[&str]) -> String {
	lines.iter().map(|line| format!("{line}\n")).collect()
}

fn write_file(path: &Path, content: &str) {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create_dir_all: {e}"));
	}

	std::fs::write(path, content).unwrap_or_else(|e| panic!("write: {e}"));
}

fn read_file(path: &Path) -> String {
	std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

fn options(root: &Path, files: &[&str]) -> KnitOptions {
	KnitOptions::new(root, files.iter().map(|file| root.join(file)).collect())
}

fn run_knit(options: KnitOptions) -> KnitResult<KnitContext> {
	let mut ctx = KnitContext::new(options)?;
	ctx.try_process()?;
	Ok(ctx)
}

fn knit_error(files: &[(&str, String)]) -> KnitError {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));

	for (name, content) in files {
		write_file(&tmp.path().join(name), content);
	}

	let names: Vec<&str> = files
		.iter()
		.map(|(name, _)| *name)
		.filter(|name| name.ends_with(".md"))
		.collect();

	match run_knit(options(tmp.path(), &names)) {
		Ok(_) => panic!("expected knit to fail"),
		Err(error) => error,
	}
}

fn bundled_with(content: &str) -> KnitResult<KnitProps> {
	let bundled = Rc::new(KnitProps::bundled()?);
	KnitProps::parse(PropsLocation::Bundled, content, Some(bundled))
}

#[rstest]
#[case::empty(&[], &[], "")]
#[case::same(&["a", "b", "c"], &["a", "b", "c"], "")]
#[case::insert_end(&["a", "b", "c"], &["a", "b", "c", "d"], "3a4\n> d")]
#[case::insert_start(&["a", "b", "c"], &["_", "a", "b", "c"], "0a1\n> _")]
#[case::insert_many(&["a", "b", "c"], &["1", "2", "3", "a", "b", "c"], "0a1,3\n> 1\n> 2\n> 3")]
#[case::insert_middle(&["a", "b", "c"], &["a", "1", "b", "c"], "1a2\n> 1")]
#[case::insert_twice(&["a", "b", "c"], &["a", "1", "b", "2", "c"], "1a2\n> 1\n2a4\n> 2")]
#[case::delete_end(&["a", "b", "c", "d"], &["a", "b", "c"], "4d3\n< d")]
#[case::delete_range(&["a", "b", "c", "d"], &["a", "d"], "2,3d1\n< b\n< c")]
#[case::delete_twice(&["a", "b", "c", "d", "e"], &["a", "c", "e"], "2d1\n< b\n4d2\n< d")]
#[case::change(&["a", "b"], &["c", "d"], "1,2c1,2\n< a\n< b\n---\n> c\n> d")]
fn diff_cases(#[case] old: &[&str], #[case] new: &[&str], #[case] expected: &str) {
	assert_eq!(format_diff(old, new).as_deref(), Some(expected));
}

#[test]
fn diff_of_rewritten_document() {
	let old = [
		"This part of the",
		"document has stayed the",
		"same from version to",
		"version.  It shouldn't",
		"be shown if it doesn't",
		"change.  Otherwise, that",
		"would not be helping to",
		"compress the size of the",
		"changes.",
		"",
		"This paragraph contains",
		"text that is outdated.",
		"It will be deleted in the",
		"near future.",
		"",
		"It is important to spell",
		"check this dokument. On",
		"the other hand, a",
		"misspelled word isn't",
		"the end of the world.",
		"Nothing in the rest of",
		"this paragraph needs to",
		"be changed. Things can",
		"be added after it.",
	];
	let new = [
		"This is an important",
		"notice! It should",
		"therefore be located at",
		"the beginning of this",
		"document!",
		"",
		"This part of the",
		"document has stayed the",
		"same from version to",
		"version.  It shouldn't",
		"be shown if it doesn't",
		"change.  Otherwise, that",
		"would not be helping to",
		"compress the size of the",
		"changes.",
		"",
		"It is important to spell",
		"check this document. On",
		"the other hand, a",
		"misspelled word isn't",
		"the end of the world.",
		"Nothing in the rest of",
		"this paragraph needs to",
		"be changed. Things can",
		"be added after it.",
		"",
		"This paragraph contains",
		"important new additions",
		"to this document.",
	];
	let expected = [
		"0a1,6",
		"> This is an important",
		"> notice! It should",
		"> therefore be located at",
		"> the beginning of this",
		"> document!",
		"> ",
		"11,15d16",
		"< This paragraph contains",
		"< text that is outdated.",
		"< It will be deleted in the",
		"< near future.",
		"< ",
		"17c18",
		"< check this dokument. On",
		"---",
		"> check this document. On",
		"24a26,29",
		"> ",
		"> This paragraph contains",
		"> important new additions",
		"> to this document.",
	]
	.join("\n");

	assert_eq!(format_diff(&old, &new), Some(expected));
}

#[test]
fn diff_of_unrelated_files_is_too_large() {
	let mut seed: u64 = 1;
	let mut random_lines = || {
		(0..100_000)
			.map(|_| {
				(0..10)
					.map(|_| {
						seed ^= seed << 13;
						seed ^= seed >> 7;
						seed ^= seed << 17;
						char::from(b'a' + (seed % 26) as u8)
					})
					.collect::<String>()
			})
			.collect::<Vec<_>>()
	};
	let old = random_lines();
	let new = random_lines();

	assert_eq!(format_diff(&old, &new), None);
}

/// Apply a diff in the classic format to `old`.
fn apply_diff(old: &[String], diff: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut next = 0;

	for line in diff.lines() {
		if let Some(added) = line.strip_prefix("> ") {
			out.push(added.to_string());
			continue;
		}

		if line.starts_with("< ") || line == "---" {
			continue;
		}

		let command = line
			.find(['a', 'd', 'c'])
			.unwrap_or_else(|| panic!("bad hunk header: {line}"));
		let range = &line[..command];
		let (start, end) = match range.split_once(',') {
			Some((start, end)) => (start, end),
			None => (range, range),
		};
		let parse = |value: &str| -> usize {
			value
				.parse()
				.unwrap_or_else(|e| panic!("bad line number in {line}: {e}"))
		};
		let (start, end) = (parse(start), parse(end));
		let copy_until = if line[command..].starts_with('a') {
			end
		} else {
			start - 1
		};

		out.extend(old[next..copy_until].iter().cloned());
		next = end;
	}

	out.extend(old[next..].iter().cloned());
	out
}

#[test]
fn diff_reproduces_new_lines_from_old() {
	let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
	let mut next = move || {
		seed ^= seed << 13;
		seed ^= seed >> 7;
		seed ^= seed << 17;
		seed
	};

	fn random_lines(next: &mut impl FnMut() -> u64) -> Vec<String> {
		let len = (next() % 12) as usize;
		(0..len)
			.map(|_| char::from(b'a' + (next() % 4) as u8).to_string())
			.collect()
	}

	for _ in 0..500 {
		let old = random_lines(&mut next);
		let new = random_lines(&mut next);
		let diff = format_diff(&old, &new).unwrap_or_else(|| panic!("diff of {old:?} and {new:?}"));
		let edits = diff
			.lines()
			.filter(|line| line.starts_with("< ") || line.starts_with("> "))
			.count();

		assert_eq!(apply_diff(&old, &diff), new, "diff:\n{diff}");
		assert!(edits <= old.len() + new.len(), "{edits} edits for {old:?} -> {new:?}");
	}
}

#[rstest]
#[case::empty("", None)]
#[case::lf("\n", Some("\n"))]
#[case::cr("\r", Some("\r"))]
#[case::crlf("\r\n", Some("\r\n"))]
#[case::lf_cr("\n\r", Some("\n"))]
#[case::no_separator("abc", None)]
#[case::trailing_lf("abc\n", Some("\n"))]
#[case::trailing_crlf("abc\r\n", Some("\r\n"))]
#[case::first_wins("abc\nxyz\r", Some("\n"))]
#[case::first_crlf_wins("abc\r\nxyz\n\r", Some("\r\n"))]
fn first_line_separator_cases(#[case] input: &str, #[case] expected: Option<&str>) {
	assert_eq!(first_line_separator(input), expected);
}

#[test]
fn split_lines_ignores_trailing_terminator() {
	assert_eq!(split_lines("a\r\nb\rc\n"), vec!["a", "b", "c"]);
	assert_eq!(split_lines("a\n\n"), vec!["a", ""]);
	assert!(split_lines("").is_empty());
}

#[rstest]
#[case::closed("<!--- TOC -->", "TOC", None, true)]
#[case::closed_tight("<!--- TOC-->", "TOC", None, true)]
#[case::open("<!--- INCLUDE .*", "INCLUDE", Some(".*"), false)]
#[case::open_bare("<!--- PREFIX", "PREFIX", None, false)]
#[case::param("<!--- KNIT example-01.kt -->", "KNIT", Some("example-01.kt"), true)]
#[case::test_name("<!--- TEST_NAME   BasicTest -->", "TEST_NAME", Some("BasicTest"), true)]
#[case::predicate("<!--- TEST lines.size == 2 -->", "TEST", Some("lines.size == 2"), true)]
fn parse_directive_cases(
	#[case] line: &str,
	#[case] name: &str,
	#[case] param: Option<&str>,
	#[case] single_line: bool,
) {
	let directive = parse_directive(line, 0).unwrap_or_else(|| panic!("not a directive: {line}"));

	assert_eq!(directive.name, name);
	assert_eq!(directive.param.as_deref(), param);
	assert_eq!(directive.single_line, single_line);
}

#[rstest]
#[case::html_comment("<!-- TOC -->")]
#[case::missing_space("<!---TOC -->")]
#[case::lower_case("<!--- toc -->")]
#[case::name_with_digit("<!--- TOC2 -->")]
#[case::text("Some text")]
#[case::indented(" <!--- TOC -->")]
fn parse_directive_rejects(#[case] line: &str) {
	assert_eq!(parse_directive(line, 0), None);
}

#[test]
fn parse_directive_reports_parameter_offset() {
	let line = "<!--- TEST_NAME   BasicTest -->";
	let directive = parse_directive(line, 0).unwrap_or_else(|| panic!("not a directive"));
	assert_eq!(&line[directive.param_offset..directive.param_offset + 9], "BasicTest");

	let line = "// <!--- KNIT example-01.kt -->";
	let directive = parse_directive(line, 3).unwrap_or_else(|| panic!("not a directive"));
	assert_eq!(directive.param_offset, 14);
	assert_eq!(directive.kind(), Some(DirectiveKind::Knit));
}

#[test]
fn directive_kinds() {
	assert_eq!(DirectiveKind::from_name("TOC_REF"), Some(DirectiveKind::TocRef));
	assert_eq!(
		DirectiveKind::from_name("SUFFIX"),
		Some(DirectiveKind::Include(IncludeKind::Suffix))
	);
	assert_eq!(DirectiveKind::from_name("END"), Some(DirectiveKind::End));
	assert_eq!(DirectiveKind::from_name("UNKNOWN"), None);
}

#[rstest]
#[case::markdown("README.md", FileType::Markdown)]
#[case::kotlin("src/Main.kt", FileType::Source)]
#[case::rust("lib.rs", FileType::Source)]
#[case::text("notes.txt", FileType::Unknown)]
#[case::no_extension("LICENSE", FileType::Unknown)]
fn file_type_from_path(#[case] path: &str, #[case] expected: FileType) {
	assert_eq!(FileType::from_path(Path::new(path)), expected);
}

#[test]
fn comment_scanner_finds_comment_content() {
	let lines = [
		"/**",
		" * The answer:",
		" *",
		" */",
		"// <!--- PREFIX",
		"    /// doc",
		"//!inner",
		"val x = 1",
		"/* one line */",
		"fun f() = 1",
		"/* Include",
		"<!--- INCLUDE .*",
		"*/",
	];
	let mut scanner = CommentScanner::new(FileType::Source);
	let offsets: Vec<Option<usize>> = lines.iter().map(|line| scanner.content_offset(line)).collect();

	assert_eq!(
		offsets,
		vec![
			None,
			Some(3),
			Some(2),
			None,
			Some(3),
			Some(8),
			Some(3),
			None,
			None,
			None,
			None,
			Some(0),
			None,
		]
	);
}

#[test]
fn comment_scanner_accepts_every_markdown_line() {
	let mut scanner = CommentScanner::new(FileType::Markdown);

	assert_eq!(scanner.content_offset("/* not special */"), Some(0));
	assert_eq!(scanner.content_offset("text"), Some(0));
}

#[test]
fn comment_scanner_ignores_block_markers_in_strings() {
	let lines = [
		"val glob = \"src/*.kt\"",
		"<!--- INCLUDE .*",
		"val escaped = \"\\\"/*\"",
		"fun f() = 1 // not a /* block",
		"<!--- PREFIX",
		"val x = 1 /* opens",
		"<!--- SUFFIX",
		"*/",
	];
	let mut scanner = CommentScanner::new(FileType::Source);
	let offsets: Vec<Option<usize>> = lines.iter().map(|line| scanner.content_offset(line)).collect();

	assert_eq!(offsets, vec![None, None, None, None, None, None, Some(0), None]);
}

#[rstest]
#[case::words("Getting started", "getting-started")]
#[case::backticks("What's `new`?", "what's-new?")]
#[case::parentheses("Sub: part (one)", "sub:-part-one")]
#[case::dots("A.B, C!", "ab-c!")]
#[case::question("What's new?", "what's-new?")]
fn section_anchor_cases(#[case] name: &str, #[case] expected: &str) {
	assert_eq!(section_anchor(name), expected);
}

#[rstest]
#[case::numbered("example-basic-01.kt", "exampleBasic01")]
#[case::named("example-kdoc-num.kt", "exampleKdocNum")]
#[case::plain("test.kt", "test")]
#[case::double_dash("a--b.kt", "aB")]
fn knit_name_cases(#[case] file_name: &str, #[case] expected: &str) {
	assert_eq!(to_knit_name(file_name), expected);
}

#[test]
fn reference_scanner_finds_adjacent_references() -> KnitResult<()> {
	let scanner = ReferenceScanner::new()?;

	assert_eq!(scanner.references("[a] [b]"), vec!["a", "b"]);
	assert_eq!(scanner.references("text [Foo.bar()] end"), vec!["Foo.bar()"]);
	assert_eq!(scanner.references("[x][y]"), vec!["y"]);
	assert!(scanner.references("[link](http://example.com)").is_empty());
	assert_eq!(scanner.link_definition("[Foo]: https://example.com"), Some("Foo"));
	assert_eq!(scanner.link_definition("[Foo]:x"), None);

	Ok(())
}

#[test]
fn knit_config_requires_dir() -> KnitResult<()> {
	assert!(KnitConfig::from_props(&KnitProps::bundled()?)?.is_none());

	Ok(())
}

#[test]
fn knit_config_finds_numbered_reference() -> KnitResult<()> {
	let props = bundled_with("knit.dir=example/")?;
	let config = KnitConfig::from_props(&props)?.unwrap_or_else(|| panic!("no knit config"));
	let line = "See [here](example/example-basic-03.kt).";
	let found = config
		.find_reference(line)
		.unwrap_or_else(|| panic!("no reference"));

	assert_eq!(config.autonumber_digits, 2);
	assert_eq!(found.file_name, "example-basic-03.kt");
	assert_eq!(&line[found.file.clone()], "example-basic-03.kt");
	assert_eq!(found.number.map(|number| &line[number]), Some("03"));
	assert!(config.find_reference("See [here](other/example-basic-03.kt).").is_none());

	Ok(())
}

#[test]
fn knit_config_matches_directive_parameter() -> KnitResult<()> {
	let props = bundled_with("knit.dir=example/")?;
	let config = KnitConfig::from_props(&props)?.unwrap_or_else(|| panic!("no knit config"));
	let found = config
		.match_file_name("example-flow-12.kt", 11)
		.unwrap_or_else(|| panic!("no match"));

	assert_eq!(found.file, 11..29);
	assert_eq!(found.number, Some(24..26));
	assert!(config.match_file_name("sample-flow-12.kt", 0).is_none());

	Ok(())
}

#[rstest]
#[case::split_placeholder("knit.dir=example/\nknit.pattern=example-#-#.kt")]
#[case::match_group("knit.dir=example/\nknit.pattern=example-(a|b)-##.kt")]
fn knit_config_rejects_pattern(#[case] props: &str) -> KnitResult<()> {
	let props = bundled_with(props)?;
	let error = KnitConfig::from_props(&props).err();

	assert!(matches!(error, Some(KnitError::InvalidKnitPattern { .. })));

	Ok(())
}

#[test]
fn props_resolve_through_hierarchy() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = normalize_path(tmp.path())?;
	write_file(
		&root.join(KNIT_PROPERTIES),
		"# comment\nknit.package=root.pkg\ntest.dir=tests/\ntest.mode.EXACT=verifyOutputLines\n",
	);
	write_file(&root.join("sub").join(KNIT_PROPERTIES), "knit.package = sub.pkg\n");

	let mut resolver = PropsResolver::new(&root)?;
	let sub = resolver.find(&root.join("sub").join("doc.md"))?;
	let top = resolver.find(&root.join("doc.md"))?;

	assert_eq!(sub.get(KNIT_PACKAGE_PROP), Some("sub.pkg"));
	assert_eq!(top.get(KNIT_PACKAGE_PROP), Some("root.pkg"));
	assert_eq!(sub.get(KNIT_LANGUAGE_PROP), Some("kotlin"));
	assert_eq!(sub.get_file(TEST_DIR_PROP)?, root.join("tests/"));
	assert!(sub.get_file(TEST_TEMPLATE_PROP).is_err());
	assert_eq!(
		sub.get_list(MODULE_MARKERS_PROP),
		vec!["build.gradle", "build.gradle.kts", "Cargo.toml"]
	);
	assert_eq!(
		sub.get_map("test").get("mode.EXACT").map(String::as_str),
		Some("verifyOutputLines")
	);
	assert!(matches!(
		sub.get_value("missing.key"),
		Err(KnitError::MissingProperty { .. })
	));

	Ok(())
}

#[test]
fn bundled_pattern_unescapes_backslash() -> KnitResult<()> {
	let props = KnitProps::bundled()?;

	assert_eq!(props.get(KNIT_PATTERN_PROP), Some(r"example-[a-zA-Z0-9-]+-##\.kt"));

	Ok(())
}

#[test]
fn api_index_prefers_types_then_short_links() {
	let mut index = ApiIndex::default();
	index.add("foo", "pkg/foo.html", DocumentableType::Function);
	index.add("foo", "pkg/-foo/index.html", DocumentableType::Class);
	index.add("bar", "pkg/long/bar.html", DocumentableType::Function);
	index.add("bar", "pkg/bar.html", DocumentableType::Function);
	index.add("baz", "pkg/baz.html", DocumentableType::Class);
	index.add("baz", "../other/baz.html", DocumentableType::Module);

	assert_eq!(index.get("foo"), Some("pkg/-foo/index.html"));
	assert_eq!(index.get("bar"), Some("pkg/bar.html"));
	assert_eq!(index.get("baz"), Some("pkg/baz.html"));
	assert_eq!(index.get("qux"), None);
}

#[test]
fn api_index_from_link_entries() -> KnitResult<()> {
	let json = r#"[
		{"dri": {"packageName": "pkg", "classNames": "Flow"}, "location": "pkg/-flow/index.html", "type": "Interface"},
		{"dri": {"packageName": "pkg", "classNames": "Flow", "callable": {"name": "collect"}}, "location": "pkg/-flow/collect.html", "type": "Function"},
		{"dri": {"packageName": "pkg", "callable": {"name": "flowOf"}}, "location": "pkg/flow-of.html", "type": "Function"},
		{"dri": {"packageName": "pkg", "callable": {"name": "value"}}, "location": "pkg/value.html", "type": "Parameter"},
		{"dri": {"packageName": "other", "classNames": "Hidden"}, "location": "other/-hidden.html", "type": "Class"}
	]"#;
	let entries: Vec<LinkIndexEntry> =
		serde_json::from_str(json).unwrap_or_else(|e| panic!("json: {e}"));
	let index = ApiIndex::from_entries(&entries, "core", "pkg");

	assert_eq!(index.get("Flow"), Some("pkg/-flow/index.html"));
	assert_eq!(index.get("pkg.Flow"), Some("pkg/-flow/index.html"));
	assert_eq!(index.get("Flow.collect"), Some("pkg/-flow/collect.html"));
	assert_eq!(index.get("collect()"), Some("pkg/-flow/collect.html"));
	assert_eq!(index.get("flowOf()"), Some("pkg/flow-of.html"));
	assert_eq!(index.get("_flowOf"), Some("pkg/flow-of.html"));
	assert_eq!(index.get("value"), None);
	assert_eq!(index.get("Hidden"), None);

	Ok(())
}

#[test]
fn resolve_references_emits_sorted_link_definitions() {
	let mut index = ApiIndex::default();
	index.add("Flow", "pkg/-flow/index.html", DocumentableType::Interface);
	index.add("Channel", "pkg/-channel/index.html", DocumentableType::Interface);
	let mut remaining: BTreeSet<String> = ["Flow", "Channel", "Missing"]
		.into_iter()
		.map(String::from)
		.collect();
	let mut resolved_case = HashMap::new();
	let mut log = KnitLog::default();

	let lines = resolve_references(
		&index,
		"https://example.com/api",
		&mut remaining,
		&mut resolved_case,
		&mut log,
		Path::new("README.md"),
	);

	assert_eq!(
		lines,
		vec![
			"[Channel]: https://example.com/api/pkg/-channel/index.html",
			"[Flow]: https://example.com/api/pkg/-flow/index.html",
		]
	);
	assert_eq!(remaining.into_iter().collect::<Vec<_>>(), vec!["Missing"]);
	assert!(!log.has_warning_or_error());
}

#[rstest]
#[case::exact("", Some("verifyLines"))]
#[case::starts_with("STARTS_WITH", Some("verifyLinesStartWith"))]
#[case::lines_start("LINES_START", Some("verifyLinesStart"))]
#[case::unordered("LINES_START_UNORDERED", Some("verifyLinesStartUnordered"))]
#[case::arbitrary_time("ARBITRARY_TIME", Some("verifyLinesArbitraryTime"))]
#[case::flexible_time("FLEXIBLE_TIME", Some("verifyLinesFlexibleTime"))]
#[case::flexible_thread("FLEXIBLE_THREAD", Some("verifyLinesFlexibleThread"))]
#[case::exception("EXCEPTION", Some("verifyExceptions"))]
#[case::predicate("lines.isEmpty()", None)]
fn verification_mode_methods(#[case] param: &str, #[case] expected: Option<&str>) -> KnitResult<()> {
	let props = KnitProps::bundled()?;

	assert_eq!(VerificationMode::parse(param).method(&props).as_deref(), expected);

	Ok(())
}

#[test]
fn verification_method_can_be_overridden() -> KnitResult<()> {
	let props = bundled_with("test.mode.EXACT=verifyOutputLines")?;

	assert_eq!(
		VerificationMode::Exact.method(&props).as_deref(),
		Some("verifyOutputLines")
	);
	assert_eq!(
		VerificationMode::Exception.method(&props).as_deref(),
		Some("verifyExceptions")
	);

	Ok(())
}

#[test]
fn render_template_trims_block_lines() -> KnitResult<()> {
	#[derive(serde::Serialize)]
	struct Items {
		items: Vec<&'static str>,
	}

	let rendered = render_template(
		"{% for item in items %}\n- {{ item }}\n{% endfor %}\n",
		&Items {
			items: vec!["a", "b"],
		},
	)?;

	assert_eq!(rendered, "- a\n- b\n");

	Ok(())
}

#[test]
fn render_test_file_for_predicate() -> KnitResult<()> {
	let props = KnitProps::bundled()?;
	let knit = KnitRef {
		package: "knit.example".to_string(),
		name: "exampleBasic01".to_string(),
	};
	let cases = vec![
		TestCase::new(knit.clone(), VerificationMode::Exact, vec![
			"say \"hi\"".to_string(),
			"done".to_string(),
		]),
		TestCase::new(
			knit,
			VerificationMode::parse("lines.size == 1"),
			Vec::new(),
		),
	];

	let lines = render_test_file(&props, Path::new("docs/README.md"), "BasicTest", &cases)?;

	assert_eq!(lines[0], "// This file was automatically generated from README.md by Knit tool. Do not edit.");
	assert!(lines.contains(&"package knit.test".to_string()));
	assert!(lines.contains(&"class BasicTest {".to_string()));
	assert!(lines.contains(&"            \"say \\\"hi\\\"\",".to_string()));
	assert!(lines.contains(&"            \"done\"".to_string()));
	assert!(lines.contains(&"            check(lines.size == 1)".to_string()));
	assert_eq!(lines.last().map(String::as_str), Some("}"));

	Ok(())
}

#[test]
fn test_file_path_uses_language_extension() -> KnitResult<()> {
	let props = KnitProps::parse(
		PropsLocation::Directory(PathBuf::from("/project")),
		"test.dir=src/test/\ntest.language=java",
		Some(Rc::new(KnitProps::bundled()?)),
	)?;

	assert_eq!(
		test_file_path(&props, "GuideTest")?,
		PathBuf::from("/project/src/test/GuideTest.java")
	);

	Ok(())
}

#[test]
fn line_separator_from_str() {
	assert_eq!("crlf".parse::<LineSeparator>().ok(), Some(LineSeparator::CrLf));
	assert_eq!("\n".parse::<LineSeparator>().ok(), Some(LineSeparator::Lf));
	assert!(matches!(
		"\t".parse::<LineSeparator>(),
		Err(KnitError::InvalidLineSeparator(_))
	));
}

#[test]
fn synchronizer_check_never_writes() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let path = tmp.path().join("out").join("file.kt");
	let lines = vec!["a".to_string(), "b".to_string()];
	let mut log = KnitLog::default();
	let check = Synchronizer {
		check: true,
		..Synchronizer::default()
	};

	assert_eq!(check.sync(&mut log, &path, &lines)?, SyncStatus::Missing);
	assert!(!path.exists());

	Synchronizer::default().sync(&mut log, &path, &lines)?;
	assert_eq!(read_file(&path), "a\nb\n");
	assert_eq!(check.sync(&mut log, &path, &lines)?, SyncStatus::UpToDate);

	let changed = vec!["a".to_string(), "c".to_string()];
	assert_eq!(check.sync(&mut log, &path, &changed)?, SyncStatus::Outdated);
	assert_eq!(log.n_outdated(), 2);

	Ok(())
}

#[test]
fn synchronizer_keeps_existing_separator() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let path = tmp.path().join("file.kt");
	write_file(&path, "a\r\nb\r\n");
	let mut log = KnitLog::default();

	let status = Synchronizer::default().sync(&mut log, &path, &["a".to_string(), "c".to_string()])?;

	assert_eq!(status, SyncStatus::Written);
	assert_eq!(read_file(&path), "a\r\nc\r\n");

	Ok(())
}

#[test]
fn normalize_path_folds_components() -> KnitResult<()> {
	assert_eq!(
		normalize_path(Path::new("/a/b/../c/./d.md"))?,
		PathBuf::from("/a/c/d.md")
	);

	Ok(())
}

fn basic_readme() -> String {
	doc(&[
		"<!--- TEST_NAME BasicTest -->",
		"",
		"# Basic",
		"",
		"<!--- INCLUDE",
		"import foo.*",
		"-->",
		"",
		"```kotlin",
		"fun main() {",
		"    println(\"Hello\")",
		"}",
		"```",
		"",
		"> You can get the full code [here](example/example-basic-01.kt).",
		"",
		"```text",
		"Hello",
		"```",
		"",
		"<!--- TEST -->",
	])
}

#[test]
fn knits_sample_and_test() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join(KNIT_PROPERTIES), PROPS);
	write_file(&root.join("README.md"), &basic_readme());

	let ctx = run_knit(options(root, &["README.md"]))?;

	assert!(!ctx.log().has_warning_or_error());
	assert_eq!(
		read_file(&root.join("example/example-basic-01.kt")),
		doc(&[
			"// This file was automatically generated from README.md by Knit tool. Do not edit.",
			"package knit.example.exampleBasic01",
			"",
			"import foo.*",
			"",
			"fun main() {",
			"    println(\"Hello\")",
			"}",
		])
	);

	let test = read_file(&root.join("test/BasicTest.kt"));
	assert!(test.contains("class BasicTest {\n\n    @Test\n    fun testExampleBasic01() {\n"));
	assert!(test.contains(
		"        captureOutput(\"ExampleBasic01\") { knit.example.exampleBasic01.main() }.verifyLines(\n            \"Hello\"\n        )\n"
	));
	assert_eq!(read_file(&root.join("README.md")), basic_readme());

	Ok(())
}

#[test]
fn check_mode_reports_then_write_converges() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join(KNIT_PROPERTIES), PROPS);
	write_file(&root.join("README.md"), &basic_readme());

	let mut check = options(root, &["README.md"]);
	check.check = true;

	let ctx = run_knit(check.clone())?;
	assert_eq!(ctx.log().n_outdated(), 2);
	assert!(!root.join("example").exists());
	assert!(!root.join("test").exists());

	run_knit(options(root, &["README.md"]))?;

	let ctx = run_knit(check)?;
	assert_eq!(ctx.log().n_outdated(), 0);
	assert!(!ctx.log().has_warning_or_error());

	Ok(())
}

#[test]
fn autonumbers_are_rewritten_in_order() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join(KNIT_PROPERTIES), PROPS);
	write_file(
		&root.join("README.md"),
		&doc(&[
			"[one](example/example-basic-05.kt)",
			"[other](example/example-other-09.kt)",
			"[two](example/example-basic-01.kt)",
		]),
	);

	run_knit(options(root, &["README.md"]))?;

	assert_eq!(
		read_file(&root.join("README.md")),
		doc(&[
			"[one](example/example-basic-01.kt)",
			"[other](example/example-other-01.kt)",
			"[two](example/example-basic-02.kt)",
		])
	);

	for name in ["example-basic-01.kt", "example-basic-02.kt", "example-other-01.kt"] {
		assert!(root.join("example").join(name).is_file(), "{name} was not knitted");
	}

	assert!(!root.join("example/example-basic-05.kt").exists());

	Ok(())
}

#[test]
fn prefix_and_suffix_wrap_the_sample() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join(KNIT_PROPERTIES), PROPS);
	write_file(
		&root.join("README.md"),
		&doc(&[
			"<!--- PREFIX",
			"// prefix",
			"----- SUFFIX",
			"// suffix",
			"-->",
			"",
			"<!--- INCLUDE example-cont-.*",
			"import cont.*",
			"-->",
			"",
			"```kotlin",
			"fun main() = println(System.currentTimeMillis())",
			"```",
			"",
			"> [code](example/example-cont-01.kt)",
		]),
	);

	run_knit(options(root, &["README.md"]))?;

	assert_eq!(
		read_file(&root.join("example/example-cont-01.kt")),
		doc(&[
			"// prefix",
			"// This file was automatically generated from README.md by Knit tool. Do not edit.",
			"package knit.example.exampleCont01",
			"",
			"import cont.*",
			"",
			"fun main() = println(currentTimeMillis())",
			"// suffix",
		])
	);

	Ok(())
}

#[test]
fn knits_samples_from_source_comments() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(
		&root.join(KNIT_PROPERTIES),
		"knit.dir=example/\nknit.pattern=example-kdoc-[a-z]+\\\\.kt\n",
	);
	let source = doc(&[
		"/* Include the following snippet into all generated examples",
		"<!--- INCLUDE .*",
		"import kotlin.time.*",
		"-->",
		"*/",
		"",
		"// Prefix the following example with this annotation",
		"// <!--- PREFIX",
		"// @file:OptIn(ExperimentalTime::class)",
		"// -->",
		"",
		"/**",
		" * The ultimate answer to life, universe, and everything can be printed like this:",
		" * ```kotlin",
		" * fun main() {",
		" *     println(theAnswer())",
		" * }",
		" * ```",
		" * <!--- KNIT example-kdoc-num.kt -->",
		" */",
		"fun theAnswer() = 42",
	]);
	write_file(&root.join("example-kdoc.kt"), &source);

	run_knit(KnitOptions::new(root, vec![root.join("example-kdoc.kt")]))?;

	assert_eq!(
		read_file(&root.join("example/example-kdoc-num.kt")),
		doc(&[
			"@file:OptIn(ExperimentalTime::class)",
			"// This file was automatically generated from example-kdoc.kt by Knit tool. Do not edit.",
			"package knit.example.exampleKdocNum",
			"",
			"import kotlin.time.*",
			"",
			"fun main() {",
			"    println(theAnswer())",
			"}",
		])
	);
	assert_eq!(read_file(&root.join("example-kdoc.kt")), source);

	Ok(())
}

fn toc_document() -> String {
	doc(&[
		"# Title",
		"",
		"<!--- TOC -->",
		"",
		"<!--- END -->",
		"",
		"## First Section",
		"",
		"### Sub: part (one)",
		"",
		"## Second",
	])
}

fn toc_expected() -> String {
	doc(&[
		"# Title",
		"",
		"<!--- TOC -->",
		"",
		"* [First Section](#first-section)",
		"  * [Sub: part (one)](#sub:-part-one)",
		"* [Second](#second)",
		"",
		"<!--- END -->",
		"",
		"## First Section",
		"",
		"### Sub: part (one)",
		"",
		"## Second",
	])
}

#[test]
fn table_of_contents_is_maintained() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join("guide.md"), &toc_document());

	run_knit(options(root, &["guide.md"]))?;
	assert_eq!(read_file(&root.join("guide.md")), toc_expected());

	run_knit(options(root, &["guide.md"]))?;
	assert_eq!(read_file(&root.join("guide.md")), toc_expected());

	Ok(())
}

#[test]
fn table_of_contents_keeps_crlf() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join("guide.md"), &toc_document().replace('\n', "\r\n"));

	run_knit(options(root, &["guide.md"]))?;

	assert_eq!(read_file(&root.join("guide.md")), toc_expected().replace('\n', "\r\n"));

	Ok(())
}

#[test]
fn strict_check_reports_stale_table_of_contents() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join("guide.md"), &toc_document());

	let mut lenient = options(root, &["guide.md"]);
	lenient.check = true;
	let mut strict = lenient.clone();
	strict.strict_check = true;

	let ctx = run_knit(strict)?;
	assert_eq!(ctx.log().n_outdated(), 1);
	assert_eq!(read_file(&root.join("guide.md")), toc_document());

	let ctx = run_knit(lenient)?;
	assert_eq!(ctx.log().n_outdated(), 0);
	assert_eq!(read_file(&root.join("guide.md")), toc_expected());

	Ok(())
}

#[test]
fn toc_ref_waits_for_referenced_document() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(
		&root.join("index.md"),
		&doc(&["# Index", "", "<!--- TOC_REF guide.md -->", "<!--- END -->"]),
	);
	write_file(
		&root.join("guide.md"),
		&doc(&["# Guide", "", "<!--- TOC -->", "<!--- END -->", "", "## Intro", "", "## Next Steps"]),
	);

	run_knit(options(root, &["index.md", "guide.md"]))?;

	assert_eq!(
		read_file(&root.join("index.md")),
		doc(&[
			"# Index",
			"",
			"<!--- TOC_REF guide.md -->",
			"* <a name='intro'></a>[Intro](guide.md#intro)",
			"* <a name='next-steps'></a>[Next Steps](guide.md#next-steps)",
			"<!--- END -->",
		])
	);

	Ok(())
}

#[test]
fn mutual_toc_refs_are_a_cycle() {
	let error = knit_error(&[
		("a.md", doc(&["<!--- TOC_REF b.md -->", "<!--- END -->"])),
		("b.md", doc(&["<!--- TOC_REF a.md -->", "<!--- END -->"])),
	]);

	assert!(matches!(error, KnitError::TocRefCycle { .. }), "{error}");
}

#[test]
fn missing_toc_ref_target_reports_line() {
	let error = knit_error(&[(
		"index.md",
		doc(&["# Index", "", "<!--- TOC_REF missing.md -->", "<!--- END -->"]),
	)]);

	assert!(matches!(error, KnitError::AtLine { line: 3, .. }), "{error}");
	assert!(matches!(error.root(), KnitError::ReferencedFileMissing { .. }));
}

#[rstest]
#[case::unrecognized(&["<!--- FOO -->"], |e: &KnitError| matches!(e, KnitError::UnrecognizedDirective(name) if name == "FOO"))]
#[case::duplicate_toc(&["<!--- TOC -->", "<!--- END -->", "<!--- TOC -->"], |e: &KnitError| matches!(e, KnitError::DuplicateToc))]
#[case::unterminated_toc(&["<!--- TOC -->", "## Section"], |e: &KnitError| matches!(e, KnitError::UnterminatedToc))]
#[case::open_clear(&["<!--- CLEAR", "-->"], |e: &KnitError| matches!(e, KnitError::RequireSingleLine { .. }))]
#[case::closed_include(&["<!--- INCLUDE -->"], |e: &KnitError| matches!(e, KnitError::RequireMultiLine { .. }))]
#[case::toc_parameter(&["<!--- TOC here -->"], |e: &KnitError| matches!(e, KnitError::UnexpectedParameter { .. }))]
#[case::test_without_knit(&["<!--- TEST_NAME T -->", "<!--- TEST -->"], |e: &KnitError| matches!(e, KnitError::TestWithoutKnit))]
#[case::knit_without_dir(&["<!--- KNIT example-a-01.kt -->"], |e: &KnitError| matches!(e, KnitError::KnitNotConfigured(_)))]
#[case::index_without_site(&["<!--- INDEX -->"], |e: &KnitError| matches!(e, KnitError::MissingSiteRoot))]
#[case::toc_ref_at_end(&["<!--- TOC_REF index.md -->"], |e: &KnitError| matches!(e, KnitError::TocRefCycle { .. }))]
fn structural_errors(#[case] lines: &[&str], #[case] expected: fn(&KnitError) -> bool) {
	let error = knit_error(&[("index.md", doc(lines))]);

	assert!(expected(error.root()), "unexpected error: {error}");
}

#[test]
fn test_requires_expected_output() {
	let error = knit_error(&[
		(KNIT_PROPERTIES, PROPS.to_string()),
		(
			"README.md",
			doc(&[
				"<!--- TEST_NAME T -->",
				"[code](example/example-basic-01.kt)",
				"<!--- TEST -->",
			]),
		),
	]);

	assert!(matches!(error.root(), KnitError::MissingExpectedOutput), "{error}");
}

#[test]
fn expected_output_must_be_emitted() {
	let error = knit_error(&[
		(KNIT_PROPERTIES, PROPS.to_string()),
		(
			"README.md",
			doc(&[
				"<!--- TEST_NAME T -->",
				"```text",
				"Hello",
				"```",
				"```kotlin",
				"fun main() {}",
				"```",
			]),
		),
	]);

	assert!(matches!(error.root(), KnitError::PendingTest), "{error}");
}

#[test]
fn duplicate_knitted_file_is_an_error() {
	let error = knit_error(&[
		(KNIT_PROPERTIES, "knit.dir=example/\nknit.pattern=example-[a-z]+\\\\.kt\n".to_string()),
		(
			"README.md",
			doc(&["[a](example/example-dup.kt)", "[b](example/example-dup.kt)"]),
		),
	]);

	assert!(matches!(error.root(), KnitError::DuplicateFile { .. }), "{error}");
}

#[test]
fn knit_directive_must_match_pattern() {
	let error = knit_error(&[
		(KNIT_PROPERTIES, PROPS.to_string()),
		("README.md", doc(&["<!--- KNIT sample.kt -->"])),
	]);

	assert!(matches!(error.root(), KnitError::KnitNameMismatch { .. }), "{error}");
}

#[test]
fn knit_directive_is_renumbered() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join(KNIT_PROPERTIES), PROPS);
	write_file(
		&root.join("README.md"),
		&doc(&["<!--- KNIT example-flow-07.kt -->", "<!--- KNIT example-flow-01.kt -->"]),
	);

	run_knit(options(root, &["README.md"]))?;

	assert_eq!(
		read_file(&root.join("README.md")),
		doc(&["<!--- KNIT example-flow-01.kt -->", "<!--- KNIT example-flow-02.kt -->"])
	);
	assert!(root.join("example/example-flow-02.kt").is_file());

	Ok(())
}

#[test]
fn renumbered_continuation_keeps_its_marker() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join(KNIT_PROPERTIES), PROPS);
	write_file(
		&root.join("README.md"),
		&doc(&[
			"<!--- INCLUDE",
			"import foo.*",
			"----- KNIT example-basic-05.kt -->",
			"text after",
		]),
	);

	run_knit(options(root, &["README.md"]))?;

	let expected = doc(&[
		"<!--- INCLUDE",
		"import foo.*",
		"----- KNIT example-basic-01.kt -->",
		"text after",
	]);
	assert_eq!(read_file(&root.join("README.md")), expected);
	assert!(read_file(&root.join("example/example-basic-01.kt")).ends_with("\nimport foo.*\n"));

	let mut check = options(root, &["README.md"]);
	check.check = true;
	let ctx = run_knit(check)?;

	assert_eq!(ctx.log().n_outdated(), 0);
	assert_eq!(read_file(&root.join("README.md")), expected);

	Ok(())
}

#[test]
fn autonumber_that_cannot_converge_is_an_error() {
	let error = knit_error(&[
		(
			KNIT_PROPERTIES,
			"knit.dir=example/\nknit.pattern=example-[a-z0-9]+##\\\\.kt\n".to_string(),
		),
		("README.md", doc(&["[a](example/example-a7.kt)"])),
	]);

	assert!(matches!(error, KnitError::AtLine { line: 1, .. }), "{error}");
	assert!(
		matches!(error.root(), KnitError::AutonumberDiverges { name, .. } if name == "example-a01.kt"),
		"{error}"
	);
}

#[test]
#[traced_test]
fn reference_after_its_definition_is_outstanding_again() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(
		&root.join("README.md"),
		&doc(&["[Foo]: https://example.com/foo", "", "See [Foo]."]),
	);

	let ctx = run_knit(options(root, &["README.md"]))?;

	assert!(ctx.log().has_warning_or_error());
	assert!(logs_contain("3: Broken reference to [Foo]"));

	Ok(())
}

#[test]
fn test_predicates_and_modes() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(
		&root.join(KNIT_PROPERTIES),
		"knit.dir=example/\ntest.dir=test/\ntest.name=GuideTest\ntest.mode.EXACT=verifyOutputLines\n",
	);
	write_file(
		&root.join("README.md"),
		&doc(&[
			"[a](example/example-mode-01.kt)",
			"<!--- TEST lines.size == 1 -->",
			"[b](example/example-mode-02.kt)",
			"<!--- TEST LINES_START",
			"Started",
			"-->",
			"[c](example/example-mode-03.kt)",
			"```text",
			"Done",
			"```",
			"<!--- TEST -->",
		]),
	);

	run_knit(options(root, &["README.md"]))?;

	let test = read_file(&root.join("test/GuideTest.kt"));
	assert!(test.contains("            check(lines.size == 1)\n"));
	assert!(test.contains("knit.example.exampleMode02.main() }.verifyLinesStart(\n            \"Started\"\n"));
	assert!(test.contains("knit.example.exampleMode03.main() }.verifyOutputLines(\n            \"Done\"\n"));

	Ok(())
}

#[test]
fn clear_drops_collected_code() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join(KNIT_PROPERTIES), PROPS);
	write_file(
		&root.join("README.md"),
		&doc(&[
			"```kotlin",
			"val dropped = 1",
			"```",
			"<!--- CLEAR -->",
			"```kotlin",
			"//sampleStart",
			"val kept = 2",
			"//sampleEnd",
			"```",
			"[a](example/example-clear-01.kt)",
		]),
	);

	run_knit(options(root, &["README.md"]))?;

	let sample = read_file(&root.join("example/example-clear-01.kt"));
	assert!(sample.ends_with("\n\nval kept = 2\n"), "{sample}");
	assert!(!sample.contains("dropped"));
	assert!(!sample.contains("sampleStart"));

	Ok(())
}

fn api_index_fixture(root: &Path, docs_root: &Path) {
	write_file(
		&root.join(KNIT_PROPERTIES),
		"site.root=https://example.com/api\n",
	);
	write_file(
		&root.join(docs_root).join(LINK_INDEX_FILE),
		r#"[{"dri": {"packageName": "pkg", "classNames": "Foo"}, "location": "pkg/-foo/index.html", "type": "Class"}]"#,
	);
}

#[test]
#[traced_test]
fn index_resolves_api_references() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	api_index_fixture(root, Path::new("build/dokka/core"));
	write_file(
		&root.join("README.md"),
		&doc(&[
			"See [Foo] and [Missing].",
			"",
			"<!--- MODULE /core -->",
			"<!--- INDEX pkg -->",
			"[Stale]: https://example.com/old",
			"<!--- END -->",
		]),
	);

	let ctx = run_knit(options(root, &["README.md"]))?;

	assert_eq!(
		read_file(&root.join("README.md")),
		doc(&[
			"See [Foo] and [Missing].",
			"",
			"<!--- MODULE /core -->",
			"<!--- INDEX pkg -->",
			"[Foo]: https://example.com/api/pkg/-foo/index.html",
			"<!--- END -->",
		])
	);
	assert!(ctx.log().has_warning_or_error());
	assert!(logs_contain("1: Broken reference to [Missing]"));
	assert!(!logs_contain("Broken reference to [Foo]"));

	Ok(())
}

#[test]
fn index_uses_module_directory() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	api_index_fixture(root, Path::new("core/build/dokka/core"));
	write_file(&root.join("core/Cargo.toml"), "[package]\nname = \"core\"\n");
	write_file(
		&root.join("README.md"),
		&doc(&["[Foo]", "<!--- MODULE core -->", "<!--- INDEX -->", "<!--- END -->"]),
	);

	run_knit(options(root, &["README.md"]))?;

	assert!(
		read_file(&root.join("README.md"))
			.contains("[Foo]: https://example.com/api/core/pkg/-foo/index.html\n")
	);

	Ok(())
}

#[test]
fn missing_module_is_an_error() {
	let error = knit_error(&[("README.md", doc(&["<!--- MODULE nowhere -->"]))]);

	assert!(matches!(error.root(), KnitError::ModuleNotFound(name) if name == "nowhere"), "{error}");
}

#[test]
fn index_requires_module() {
	let error = knit_error(&[
		(KNIT_PROPERTIES, "site.root=https://example.com/api\n".to_string()),
		("README.md", doc(&["<!--- INDEX -->", "<!--- END -->"])),
	]);

	assert!(matches!(error.root(), KnitError::MissingModule), "{error}");
}

#[test]
#[traced_test]
fn knitting_is_logged() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join(KNIT_PROPERTIES), PROPS);
	write_file(&root.join("README.md"), &basic_readme());

	run_knit(options(root, &["README.md"]))?;

	assert!(logs_contain("*** Reading"));
	assert!(logs_contain("Knitting"));
	assert!(logs_contain("example-basic-01.kt ..."));

	Ok(())
}

#[test]
fn process_logs_fatal_error() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join("README.md"), &doc(&["<!--- FOO -->"]));

	let mut ctx = KnitContext::new(options(root, &["README.md"]))?;

	assert!(!ctx.process());
	assert!(ctx.log().has_warning_or_error());

	Ok(())
}

#[test]
fn discovery_skips_output_directories() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join("README.md"), "# Readme\n");
	write_file(&root.join("docs/guide.md"), "# Guide\n");
	write_file(&root.join("src/Main.kt"), "fun main() {}\n");
	write_file(&root.join("build/generated.md"), "# Generated\n");
	write_file(&root.join("target/out.kt"), "\n");
	write_file(&root.join("ignored/skip.md"), "\n");
	write_file(&root.join("notes.txt"), "\n");
	write_file(&root.join(".gitignore"), "ignored/\n");

	let files = Discovery::default().discover(root)?;

	assert_eq!(
		files,
		vec![
			root.join("README.md"),
			root.join("docs/guide.md"),
			root.join("src/Main.kt"),
		]
	);

	Ok(())
}

#[test]
fn discovery_keeps_valid_gitignore_rules() -> KnitResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let root = tmp.path();
	write_file(&root.join("README.md"), "# Readme\n");
	write_file(&root.join("ignored/skip.md"), "\n");
	write_file(&root.join(".gitignore"), "[\nignored/\n");

	let files = Discovery::default().discover(root)?;

	assert_eq!(files, vec![root.join("README.md")]);

	Ok(())
}
