use std::path::PathBuf;

use clap::Parser;
use knit_core::LineSeparator;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Generate compilable samples and tests from the code in your documentation.",
	long_about = "knit reads markdown documents (and the doc comments of source files), \
	              assembles every referenced code sample into a source file, turns expected \
	              output blocks into tests, and keeps tables of contents and API links up to \
	              date.\n\nQuick start:\n  knit              Write every generated file\n  \
	              knit --check      Verify generated files are up to date\n  knit README.md    \
	              Process a single document"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct KnitCli {
	/// Documents to process. Defaults to every markdown and Kotlin file under
	/// the root directory.
	pub files: Vec<PathBuf>,

	/// Report missing and outdated files without writing them. Exits with
	/// status 1 when anything needs to be written.
	#[arg(long, short, default_value_t = false)]
	pub check: bool,

	/// In check mode, also leave stale tables of contents and indexes in
	/// source documents untouched and report them as outdated.
	#[arg(long, default_value_t = false, requires = "check")]
	pub strict_check: bool,

	/// Path to the project root directory. `knit.properties` files are not
	/// looked up above it.
	#[arg(long, short)]
	pub path: Option<PathBuf>,

	/// Terminate lines of newly created files with `\r\n`.
	#[arg(long, default_value_t = false)]
	pub crlf: bool,

	/// Watch for file changes and run again.
	#[arg(long, default_value_t = false)]
	pub watch: bool,

	/// Enable verbose output.
	#[arg(long, short, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, default_value_t = false)]
	pub no_color: bool,
}

impl KnitCli {
	/// The root directory, defaulting to the current directory.
	pub fn root(&self) -> PathBuf {
		self.path
			.clone()
			.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
	}

	pub fn line_separator(&self) -> LineSeparator {
		if self.crlf {
			LineSeparator::CrLf
		} else {
			LineSeparator::Lf
		}
	}
}
