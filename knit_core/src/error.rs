use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum KnitError {
	#[error(transparent)]
	#[diagnostic(code(knit::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to access `{path}`: {source}")]
	#[diagnostic(code(knit::file_io))]
	FileIo {
		path: String,
		source: std::io::Error,
	},

	/// A structural error with the location where it was raised.
	#[error("{path}:{line}: {error}")]
	#[diagnostic(code(knit::document))]
	AtLine {
		path: String,
		line: usize,
		error: Box<KnitError>,
	},

	#[error("`{name}` directive must end on the same line with `-->`")]
	#[diagnostic(code(knit::single_line), help("close the directive with ` -->` on the same line"))]
	RequireSingleLine { name: String },

	#[error("`{name}` directive without parameters must not be single line")]
	#[diagnostic(code(knit::multi_line))]
	RequireMultiLine { name: String },

	#[error("`{name}` directive must not have parameters")]
	#[diagnostic(code(knit::unexpected_parameter))]
	UnexpectedParameter { name: String },

	#[error("`{name}` directive must include {what}")]
	#[diagnostic(code(knit::missing_parameter))]
	MissingParameter { name: String, what: &'static str },

	#[error("unrecognized directive `{0}`")]
	#[diagnostic(
		code(knit::unrecognized_directive),
		help(
			"known directives: TOC, TOC_REF, INCLUDE, PREFIX, SUFFIX, CLEAR, KNIT, TEST_NAME, TEST, \
			 MODULE, INDEX, END"
		)
	)]
	UnrecognizedDirective(String),

	#[error("only one TOC directive is supported")]
	#[diagnostic(code(knit::duplicate_toc))]
	DuplicateToc,

	#[error("TOC section is not terminated by a directive")]
	#[diagnostic(code(knit::unterminated_toc), help("add `<!--- END -->` after the table of contents"))]
	UnterminatedToc,

	#[error("invalid section header")]
	#[diagnostic(code(knit::invalid_section))]
	InvalidSectionHeader,

	#[error("unexpected end of file after `{0}`")]
	#[diagnostic(code(knit::unexpected_eof), help("add `<!--- END -->` to terminate the generated section"))]
	UnexpectedEndOfFile(String),

	#[error("referenced file `{path}` is missing from the processed file set")]
	#[diagnostic(code(knit::missing_reference))]
	ReferencedFileMissing { path: String },

	#[error("`{path}` cannot make progress: its TOC_REF targets are never published")]
	#[diagnostic(
		code(knit::toc_ref_cycle),
		help("two or more files reference each other's table of contents with TOC_REF")
	)]
	TocRefCycle { path: String },

	#[error("duplicate file: `{path}`")]
	#[diagnostic(code(knit::duplicate_file), help("each generated file name must be unique in a document"))]
	DuplicateFile { path: String },

	#[error("TEST must be preceded by a knitted file")]
	#[diagnostic(code(knit::test_without_knit))]
	TestWithoutKnit,

	#[error("neither TEST_NAME directive nor `test.name` property was specified")]
	#[diagnostic(code(knit::missing_test_name))]
	MissingTestName,

	#[error("TEST must be preceded by a ```text block or contain a test predicate")]
	#[diagnostic(code(knit::missing_expected_output))]
	MissingExpectedOutput,

	#[error("previous test was not emitted with TEST")]
	#[diagnostic(code(knit::pending_test))]
	PendingTest,

	#[error("`knit.dir` is not configured, cannot KNIT `{0}`")]
	#[diagnostic(code(knit::knit_not_configured))]
	KnitNotConfigured(String),

	#[error("`{name}` does not match the knit pattern `{pattern}`")]
	#[diagnostic(code(knit::knit_name_mismatch))]
	KnitNameMismatch { name: String, pattern: String },

	#[error("autonumber of `{name}` does not converge for pattern `{pattern}`")]
	#[diagnostic(
		code(knit::autonumber_diverges),
		help("the text before the `#` placeholder in `knit.pattern` must not match digits")
	)]
	AutonumberDiverges { name: String, pattern: String },

	#[error("invalid `knit.pattern` `{pattern}`: {reason}")]
	#[diagnostic(code(knit::invalid_pattern))]
	InvalidKnitPattern { pattern: String, reason: &'static str },

	#[error("invalid regular expression `{pattern}`: {reason}")]
	#[diagnostic(code(knit::invalid_regex))]
	InvalidRegex { pattern: String, reason: String },

	#[error("missing property `{name}` in {location}")]
	#[diagnostic(code(knit::missing_property))]
	MissingProperty { name: String, location: String },

	#[error("failed to parse `{path}`: {reason}")]
	#[diagnostic(code(knit::properties), help("knit.properties must contain `key=value` lines"))]
	PropertiesParse { path: String, reason: String },

	#[error("template rendering failed: {0}")]
	#[diagnostic(code(knit::template_render))]
	TemplateRender(String),

	#[error("module `{0}` is not found in any of the module root dirs")]
	#[diagnostic(code(knit::module_not_found), help("check the `module.roots` and `module.markers` properties"))]
	ModuleNotFound(String),

	#[error("INDEX requires a preceding MODULE directive")]
	#[diagnostic(code(knit::missing_module))]
	MissingModule,

	#[error("missing `site.root` property, cannot do INDEX")]
	#[diagnostic(code(knit::missing_site_root))]
	MissingSiteRoot,

	#[error("failed to load API index `{path}`: {reason}")]
	#[diagnostic(code(knit::api_index))]
	ApiIndex { path: String, reason: String },

	#[error("unsupported line separator {0:?}")]
	#[diagnostic(code(knit::line_separator), help("use \"\\n\" or \"\\r\\n\""))]
	InvalidLineSeparator(String),

	#[error("invalid glob pattern `{pattern}`: {reason}")]
	#[diagnostic(code(knit::invalid_glob))]
	InvalidGlob { pattern: String, reason: String },
}

impl KnitError {
	/// Attach the document location to a structural error.
	pub fn at_line(self, path: impl Into<String>, line: usize) -> Self {
		match self {
			Self::AtLine { .. } | Self::TocRefCycle { .. } => self,
			error => {
				Self::AtLine {
					path: path.into(),
					line,
					error: Box::new(error),
				}
			}
		}
	}

	/// The underlying error with any location wrappers removed.
	pub fn root(&self) -> &Self {
		match self {
			Self::AtLine { error, .. } => error.root(),
			error => error,
		}
	}
}

pub type KnitResult<T> = Result<T, KnitError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
