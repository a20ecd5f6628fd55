use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::KnitError;
use crate::KnitResult;

/// Name of the per directory configuration file.
pub const KNIT_PROPERTIES: &str = "knit.properties";

pub const KNIT_PACKAGE_PROP: &str = "knit.package";
pub const KNIT_PATTERN_PROP: &str = "knit.pattern";
pub const KNIT_DIR_PROP: &str = "knit.dir";
pub const KNIT_INCLUDE_PROP: &str = "knit.include";
pub const KNIT_LANGUAGE_PROP: &str = "knit.language";
pub const TEST_NAME_PROP: &str = "test.name";
pub const TEST_DIR_PROP: &str = "test.dir";
pub const TEST_TEMPLATE_PROP: &str = "test.template";
pub const TEST_LANGUAGE_PROP: &str = "test.language";
pub const SITE_ROOT_PROP: &str = "site.root";
pub const MODULE_ROOTS_PROP: &str = "module.roots";
pub const MODULE_MARKERS_PROP: &str = "module.markers";
pub const MODULE_DOCS_PROP: &str = "module.docs";

/// Defaults used when no `knit.properties` file defines a key.
const BUNDLED_PROPERTIES: &str = r"
knit.package=knit.example
knit.pattern=example-[a-zA-Z0-9-]+-##\\.kt
knit.include=@knit-include
knit.language=kotlin
test.template=@knit-test
test.package=knit.test
test.language=kotlin
module.roots=.
module.markers=build.gradle,build.gradle.kts,Cargo.toml
module.docs=build/dokka
";

/// Where a set of properties was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropsLocation {
	Bundled,
	Directory(PathBuf),
}

impl fmt::Display for PropsLocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bundled => write!(f, "bundled defaults"),
			Self::Directory(dir) => write!(f, "{}", dir.join(KNIT_PROPERTIES).display()),
		}
	}
}

/// Properties of one directory layered over the properties of its parents.
#[derive(Debug)]
pub struct KnitProps {
	location: PropsLocation,
	values: HashMap<String, String>,
	parent: Option<Rc<KnitProps>>,
}

impl KnitProps {
	pub fn bundled() -> KnitResult<Self> {
		Self::parse(PropsLocation::Bundled, BUNDLED_PROPERTIES, None)
	}

	/// Load `dir/knit.properties` on top of `parent`.
	pub fn load(dir: &Path, parent: Option<Rc<Self>>) -> KnitResult<Self> {
		let path = dir.join(KNIT_PROPERTIES);
		let content = std::fs::read_to_string(&path).map_err(|source| {
			KnitError::FileIo {
				path: path.display().to_string(),
				source,
			}
		})?;

		Self::parse(PropsLocation::Directory(dir.to_path_buf()), &content, parent)
	}

	/// Parse `key=value` lines. Lines starting with `#` or `!` are comments
	/// and `\\` stands for a single backslash.
	pub fn parse(location: PropsLocation, content: &str, parent: Option<Rc<Self>>) -> KnitResult<Self> {
		let cleaned = content
			.lines()
			.map(str::trim)
			.filter(|line| !line.is_empty() && !line.starts_with(['#', '!']))
			.collect::<Vec<_>>()
			.join("\n");
		let raw: HashMap<String, String> = serde_ini::from_str(&cleaned).map_err(|e| {
			KnitError::PropertiesParse {
				path: location.to_string(),
				reason: e.to_string(),
			}
		})?;
		let values = raw
			.into_iter()
			.map(|(key, value)| (key.trim().to_string(), value.trim().replace("\\\\", "\\")))
			.collect();

		Ok(Self {
			location,
			values,
			parent,
		})
	}

	pub fn location(&self) -> &PropsLocation {
		&self.location
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		match self.values.get(name) {
			Some(value) => Some(value.as_str()),
			None => self.parent.as_deref().and_then(|parent| parent.get(name)),
		}
	}

	pub fn get_value(&self, name: &str) -> KnitResult<&str> {
		self.get(name).ok_or_else(|| self.missing(name))
	}

	/// A comma separated list with blank entries dropped.
	pub fn get_list(&self, name: &str) -> Vec<String> {
		self.get(name)
			.map(|value| {
				value
					.split(',')
					.map(str::trim)
					.filter(|item| !item.is_empty())
					.map(ToString::to_string)
					.collect()
			})
			.unwrap_or_default()
	}

	/// Resolve a path property relative to the directory of the properties
	/// file that defines it.
	pub fn get_file(&self, name: &str) -> KnitResult<PathBuf> {
		self.get_file_impl(name).ok_or_else(|| self.missing(name))
	}

	fn get_file_impl(&self, name: &str) -> Option<PathBuf> {
		match (self.values.get(name), &self.location) {
			(Some(value), PropsLocation::Directory(dir)) => Some(dir.join(value)),
			(Some(_), PropsLocation::Bundled) => None,
			(None, _) => self.parent.as_deref().and_then(|parent| parent.get_file_impl(name)),
		}
	}

	/// The properties defining `name`, from nearest to furthest.
	pub fn defining(&self, name: &str) -> Option<&Self> {
		if self.values.contains_key(name) {
			Some(self)
		} else {
			self.parent.as_deref().and_then(|parent| parent.defining(name))
		}
	}

	/// Every `prefix.*` property with the prefix removed. Nearer properties
	/// win over their parents.
	pub fn get_map(&self, prefix: &str) -> BTreeMap<String, String> {
		let mut map = self
			.parent
			.as_deref()
			.map(|parent| parent.get_map(prefix))
			.unwrap_or_default();
		let prefix = format!("{prefix}.");

		for (key, value) in &self.values {
			if let Some(name) = key.strip_prefix(&prefix) {
				map.insert(name.to_string(), value.clone());
			}
		}

		map
	}

	fn missing(&self, name: &str) -> KnitError {
		KnitError::MissingProperty {
			name: name.to_string(),
			location: self.location.to_string(),
		}
	}
}

/// Finds and caches the properties that apply to each document.
#[derive(Debug)]
pub struct PropsResolver {
	root_dir: PathBuf,
	bundled: Rc<KnitProps>,
	cache: HashMap<PathBuf, Rc<KnitProps>>,
}

impl PropsResolver {
	pub fn new(root_dir: impl Into<PathBuf>) -> KnitResult<Self> {
		Ok(Self {
			root_dir: root_dir.into(),
			bundled: Rc::new(KnitProps::bundled()?),
			cache: HashMap::new(),
		})
	}

	/// Properties for `file`, from its directory up to the root directory.
	pub fn find(&mut self, file: &Path) -> KnitResult<Rc<KnitProps>> {
		match file.parent() {
			Some(dir) => self.find_dir(dir),
			None => Ok(Rc::clone(&self.bundled)),
		}
	}

	fn find_dir(&mut self, dir: &Path) -> KnitResult<Rc<KnitProps>> {
		if !dir.starts_with(&self.root_dir) {
			return Ok(Rc::clone(&self.bundled));
		}

		if let Some(props) = self.cache.get(dir) {
			return Ok(Rc::clone(props));
		}

		let parent = match dir.parent() {
			Some(parent) if dir != self.root_dir => self.find_dir(parent)?,
			_ => Rc::clone(&self.bundled),
		};
		let props = if dir.join(KNIT_PROPERTIES).is_file() {
			Rc::new(KnitProps::load(dir, Some(parent))?)
		} else {
			parent
		};

		self.cache.insert(dir.to_path_buf(), Rc::clone(&props));
		Ok(props)
	}
}
