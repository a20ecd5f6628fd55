use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::ApiIndex;
use crate::ApiIndexLoader;
use crate::KnitError;
use crate::KnitLog;
use crate::KnitOptions;
use crate::KnitProps;
use crate::KnitResult;
use crate::LINK_INDEX_FILE;
use crate::MODULE_MARKERS_PROP;
use crate::MODULE_ROOTS_PROP;
use crate::PathsIndexLoader;
use crate::PropsResolver;
use crate::Synchronizer;
use crate::TocRef;
use crate::knit::PassOutcome;
use crate::knit::knit_file;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ApiIndexKey {
	docs_root: PathBuf,
	module: String,
	package: String,
}

/// State of one run over a set of documents.
///
/// Documents are processed in queue order. A document that references the
/// table of contents of a document not processed yet goes back to the end
/// of the queue.
pub struct KnitContext {
	pub(crate) root_dir: PathBuf,
	pub(crate) file_set: HashSet<PathBuf>,
	queue: VecDeque<PathBuf>,
	pub(crate) toc_refs: HashMap<PathBuf, Vec<TocRef>>,
	retries: HashMap<PathBuf, usize>,
	pub(crate) props: PropsResolver,
	api_indexes: HashMap<ApiIndexKey, Rc<ApiIndex>>,
	index_loader: Box<dyn ApiIndexLoader>,
	pub(crate) log: KnitLog,
	pub(crate) sync: Synchronizer,
	pub(crate) strict_check: bool,
}

impl KnitContext {
	pub fn new(options: KnitOptions) -> KnitResult<Self> {
		let root_dir = normalize_path(&options.root_dir)?;
		let mut queue = VecDeque::with_capacity(options.files.len());
		let mut file_set = HashSet::with_capacity(options.files.len());

		for file in &options.files {
			let file = normalize_path(file)?;

			if file_set.insert(file.clone()) {
				queue.push_back(file);
			}
		}

		Ok(Self {
			props: PropsResolver::new(&root_dir)?,
			root_dir,
			file_set,
			queue,
			toc_refs: HashMap::new(),
			retries: HashMap::new(),
			api_indexes: HashMap::new(),
			index_loader: Box::new(PathsIndexLoader),
			log: KnitLog::new(options.log_sink),
			sync: Synchronizer {
				check: options.check,
				line_separator: options.line_separator,
			},
			strict_check: options.strict_check,
		})
	}

	/// Replace the source of API documentation indexes.
	#[must_use]
	pub fn with_index_loader(mut self, loader: impl ApiIndexLoader + 'static) -> Self {
		self.index_loader = Box::new(loader);
		self
	}

	pub fn log(&self) -> &KnitLog {
		&self.log
	}

	pub fn root_dir(&self) -> &Path {
		&self.root_dir
	}

	/// Process every document, logging the first fatal error. Returns
	/// `false` when the run failed.
	pub fn process(&mut self) -> bool {
		match self.try_process() {
			Ok(()) => true,
			Err(error) => {
				self.log.error(&error);
				false
			}
		}
	}

	/// Process every document, stopping at the first fatal error.
	pub fn try_process(&mut self) -> KnitResult<()> {
		while let Some(file) = self.queue.pop_front() {
			match knit_file(self, &file)? {
				PassOutcome::Published(refs) => {
					self.toc_refs.insert(file, refs);
				}
				PassOutcome::Retry => {
					let retries = self.retries.entry(file.clone()).or_default();
					*retries += 1;

					if *retries > self.file_set.len() {
						return Err(KnitError::TocRefCycle {
							path: file.display().to_string(),
						});
					}

					self.queue.push_back(file);
				}
			}
		}

		Ok(())
	}

	/// The API index of `module` in `package`, loaded once per run.
	pub(crate) fn api_index(
		&mut self,
		docs_root: &Path,
		module: &str,
		package: &str,
	) -> KnitResult<Rc<ApiIndex>> {
		let key = ApiIndexKey {
			docs_root: docs_root.to_path_buf(),
			module: module.to_string(),
			package: package.to_string(),
		};

		if let Some(index) = self.api_indexes.get(&key) {
			return Ok(Rc::clone(index));
		}

		let dir = self.root_dir.join(docs_root);
		let index = self
			.index_loader
			.load(&dir, module, package)?
			.ok_or_else(|| {
				KnitError::ApiIndex {
					path: dir.join(LINK_INDEX_FILE).display().to_string(),
					reason: "the index file does not exist".to_string(),
				}
			})?;

		self.log.debug(format!(
			"Parsed API docs at {}/{package}: {} definitions",
			dir.display(),
			index.len()
		));

		let index = Rc::new(index);
		self.api_indexes.insert(key, Rc::clone(&index));
		Ok(index)
	}
}

/// Make `path` absolute and fold `.` and `..` without touching the file
/// system.
pub fn normalize_path(path: &Path) -> KnitResult<PathBuf> {
	let absolute = std::path::absolute(path)?;
	let mut normalized = PathBuf::new();

	for component in absolute.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				normalized.pop();
			}
			component => normalized.push(component),
		}
	}

	Ok(normalized)
}

/// Directory of module `name`, relative to `root_dir`: the first
/// `<root>/<name>` holding one of the module marker files.
pub fn find_module_root(root_dir: &Path, props: &KnitProps, name: &str) -> KnitResult<PathBuf> {
	let markers = props.get_list(MODULE_MARKERS_PROP);

	for root in props.get_list(MODULE_ROOTS_PROP) {
		let dir = if root == "." {
			PathBuf::from(name)
		} else {
			Path::new(&root).join(name)
		};

		if markers
			.iter()
			.any(|marker| root_dir.join(&dir).join(marker).is_file())
		{
			return Ok(dir);
		}
	}

	Err(KnitError::ModuleNotFound(name.to_string()))
}
