use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use crate::KnitError;
use crate::KnitResult;

/// Documents processed when no files are named explicitly.
pub const DEFAULT_INCLUDE: &[&str] = &["**/*.md", "**/*.kt", "**/*.kts"];
/// Output directories, in gitignore syntax.
pub const DEFAULT_EXCLUDE: &[&str] = &["build/", "target/"];

/// Which files under a root directory are documents.
#[derive(Debug, Clone)]
pub struct Discovery {
	pub include: Vec<String>,
	pub exclude: Vec<String>,
	/// Skip files matched by the root `.gitignore` unless set.
	pub disable_gitignore: bool,
}

impl Default for Discovery {
	fn default() -> Self {
		Self {
			include: DEFAULT_INCLUDE.iter().map(ToString::to_string).collect(),
			exclude: DEFAULT_EXCLUDE.iter().map(ToString::to_string).collect(),
			disable_gitignore: false,
		}
	}
}

impl Discovery {
	/// Every matching file under `root`, sorted.
	pub fn discover(&self, root: &Path) -> KnitResult<Vec<PathBuf>> {
		let include = build_glob_set(&self.include)?;
		let exclude = build_exclude_matcher(root, &self.exclude)?;
		let gitignore = if self.disable_gitignore {
			Gitignore::empty()
		} else {
			build_gitignore(root)
		};

		let mut walker = Walker {
			root,
			include: &include,
			ignores: [&gitignore, &exclude],
			visited: HashSet::new(),
			files: Vec::new(),
		};
		walker.walk(root)?;

		let mut files = walker.files;
		files.sort();
		Ok(files)
	}
}

struct Walker<'a> {
	root: &'a Path,
	include: &'a GlobSet,
	ignores: [&'a Gitignore; 2],
	visited: HashSet<PathBuf>,
	files: Vec<PathBuf>,
}

impl Walker<'_> {
	fn walk(&mut self, dir: &Path) -> KnitResult<()> {
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());

		// Symlinked directories may loop back.
		if !self.visited.insert(canonical) {
			return Ok(());
		}

		for entry in std::fs::read_dir(dir)? {
			let path = entry?.path();

			if path
				.file_name()
				.and_then(|name| name.to_str())
				.is_some_and(|name| name.starts_with('.'))
			{
				continue;
			}

			let is_dir = path.is_dir();

			if self
				.ignores
				.iter()
				.any(|ignore| ignore.matched(&path, is_dir).is_ignore())
			{
				continue;
			}

			if is_dir {
				self.walk(&path)?;
			} else if path
				.strip_prefix(self.root)
				.is_ok_and(|relative| self.include.is_match(relative))
			{
				self.files.push(path);
			}
		}

		Ok(())
	}
}

fn build_glob_set(patterns: &[String]) -> KnitResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();

	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| {
			KnitError::InvalidGlob {
				pattern: pattern.clone(),
				reason: e.to_string(),
			}
		})?;
		builder.add(glob);
	}

	builder.build().map_err(|e| {
		KnitError::InvalidGlob {
			pattern: patterns.join(", "),
			reason: e.to_string(),
		}
	})
}

fn build_exclude_matcher(root: &Path, patterns: &[String]) -> KnitResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);

	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			KnitError::InvalidGlob {
				pattern: pattern.clone(),
				reason: e.to_string(),
			}
		})?;
	}

	builder.build().map_err(|e| {
		KnitError::InvalidGlob {
			pattern: patterns.join(", "),
			reason: e.to_string(),
		}
	})
}

/// The rules of the root `.gitignore`. Lines that fail to parse are skipped
/// and the remaining rules still apply.
fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let path = root.join(".gitignore");

	if path.is_file() {
		let _ = builder.add(path);
	}

	builder.build().unwrap_or_else(|_| Gitignore::empty())
}
