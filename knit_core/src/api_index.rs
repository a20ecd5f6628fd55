//! Resolution of `[Symbol]` references against a documentation index.
//!
//! The index is the `paths-index.json` sidecar written next to generated API
//! docs: a list of entries, each naming a declaration and the page that
//! documents it.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::KnitError;
use crate::KnitLog;
use crate::KnitResult;

/// File name of the documentation link index.
pub const LINK_INDEX_FILE: &str = "paths-index.json";

/// Kind of a documented declaration. Earlier kinds win when one name maps
/// to several links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum DocumentableType {
	Module,
	Package,
	Class,
	Interface,
	Object,
	Annotation,
	TypeAlias,
	Enum,
	EnumEntry,
	Function,
	TypeParameter,
	Property,
	Parameter,
	#[serde(other)]
	Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkIndexEntry {
	pub dri: Dri,
	#[serde(default)]
	pub source_set: Vec<String>,
	pub location: String,
	#[serde(rename = "type", default = "unknown_type")]
	pub kind: DocumentableType,
}

fn unknown_type() -> DocumentableType {
	DocumentableType::Unknown
}

/// Identifier of a documented declaration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dri {
	pub package_name: Option<String>,
	pub class_names: Option<String>,
	pub callable: Option<Callable>,
	pub extra: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Callable {
	pub name: String,
	pub receiver: Option<TypeReference>,
}

/// Receiver type of an extension. Nullable types wrap the actual type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeReference {
	pub fully_qualified_name: Option<String>,
	pub wrapped: Option<Box<TypeReference>>,
}

impl TypeReference {
	pub fn name(&self) -> &str {
		match (&self.fully_qualified_name, &self.wrapped) {
			(Some(name), _) => name,
			(None, Some(wrapped)) => wrapped.name(),
			(None, None) => "",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ApiLink {
	link: String,
	kind: DocumentableType,
}

/// Symbol names mapped to candidate documentation links.
#[derive(Debug, Default)]
pub struct ApiIndex {
	links: HashMap<String, Vec<ApiLink>>,
}

impl ApiIndex {
	pub fn len(&self) -> usize {
		self.links.len()
	}

	pub fn is_empty(&self) -> bool {
		self.links.is_empty()
	}

	/// Add a candidate link. Relative links never join an existing entry.
	pub fn add(&mut self, name: impl Into<String>, link: impl Into<String>, kind: DocumentableType) {
		let name = name.into();
		let link = link.into();
		let relative = link.contains("..");

		match self.links.get_mut(&name) {
			Some(_) if relative => {}
			Some(list) => list.push(ApiLink { link, kind }),
			None => {
				self.links.insert(name, vec![ApiLink { link, kind }]);
			}
		}
	}

	/// The best link for `name`: classes before functions, then the
	/// shortest link.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.links
			.get(name)?
			.iter()
			.min_by_key(|candidate| (candidate.kind, candidate.link.len()))
			.map(|candidate| candidate.link.as_str())
	}

	/// Build an index from link entries of `module` in `package`.
	pub fn from_entries(entries: &[LinkIndexEntry], module: &str, package: &str) -> Self {
		let mut index = Self::default();

		let selected = entries
			.iter()
			.filter(|entry| {
				entry
					.dri
					.extra
					.as_deref()
					.is_none_or(|extra| extra.eq_ignore_ascii_case(module))
			})
			.filter(|entry| {
				package.is_empty()
					|| entry
						.dri
						.package_name
						.as_deref()
						.is_none_or(|name| name.eq_ignore_ascii_case(package))
			})
			.filter(|entry| entry.kind != DocumentableType::Parameter);

		for entry in selected {
			index.add_entry(entry);
		}

		index
	}

	fn add_entry(&mut self, entry: &LinkIndexEntry) {
		let package = entry.dri.package_name.as_deref().unwrap_or_default();
		let link = entry.location.as_str();
		let kind = entry.kind;

		let Some(callable) = &entry.dri.callable else {
			if let Some(class_names) = &entry.dri.class_names {
				self.add_name(package, class_names, link, kind, "");
			}
			return;
		};

		let owner = match &entry.dri.class_names {
			Some(class_names) => format!("{class_names}."),
			None => {
				callable
					.receiver
					.as_ref()
					.map(TypeReference::name)
					.filter(|name| !name.trim().is_empty())
					.map(|name| format!("{name}."))
					.unwrap_or_default()
			}
		};
		let mut names = vec![callable.name.clone()];

		// `Unknown` entries point at external declarations that may be functions too.
		if matches!(kind, DocumentableType::Function | DocumentableType::Unknown) {
			names.push(format!("{}()", callable.name));
		}

		for name in &names {
			self.add_name(package, name, link, kind, "");

			if !owner.is_empty() {
				self.add_name(package, name, link, kind, &owner);
			}
		}
	}

	fn add_name(&mut self, package: &str, name: &str, link: &str, kind: DocumentableType, owner: &str) {
		let ref_name = format!("{owner}{name}");

		// Extensions of foreign classes also get their short owner name.
		if owner.starts_with(|c: char| c.is_ascii_lowercase()) {
			let trimmed = &owner[..owner.len() - 1];
			if let Some(index) = trimmed.rfind('.') {
				self.add(format!("{}{name}", &owner[index + 1..]), link, kind);
			}
			self.add(name, link, kind);
		}

		// Lower case names that clash with a class by case are reachable as `_name`.
		if owner.is_empty() && name.starts_with(|c: char| c.is_ascii_lowercase()) {
			self.add(format!("_{name}"), link, kind);
		}

		self.add(ref_name.clone(), link, kind);
		self.add(format!("{package}.{ref_name}"), link, kind);
	}
}

/// Source of documentation indexes, keyed by docs root, module and package.
pub trait ApiIndexLoader {
	/// Load the index under `docs_root`, or `None` when there is none.
	fn load(&self, docs_root: &Path, module: &str, package: &str) -> KnitResult<Option<ApiIndex>>;
}

/// Reads `paths-index.json` from the docs root.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathsIndexLoader;

impl ApiIndexLoader for PathsIndexLoader {
	fn load(&self, docs_root: &Path, module: &str, package: &str) -> KnitResult<Option<ApiIndex>> {
		let path = docs_root.join(LINK_INDEX_FILE);

		if !path.is_file() {
			return Ok(None);
		}

		let content = std::fs::read_to_string(&path).map_err(|source| {
			KnitError::FileIo {
				path: path.display().to_string(),
				source,
			}
		})?;
		let entries: Vec<LinkIndexEntry> = serde_json::from_str(&content).map_err(|e| {
			KnitError::ApiIndex {
				path: path.display().to_string(),
				reason: e.to_string(),
			}
		})?;

		Ok(Some(ApiIndex::from_entries(&entries, module, package)))
	}
}

/// Link definition lines for every outstanding name `index` resolves.
///
/// Resolved names leave `remaining`. Names that only differ in case from a
/// previously resolved one are reported, since markdown cannot tell them
/// apart.
pub fn resolve_references(
	index: &ApiIndex,
	site_prefix: &str,
	remaining: &mut BTreeSet<String>,
	resolved_case: &mut HashMap<String, String>,
	log: &mut KnitLog,
	file: &Path,
) -> Vec<String> {
	let mut lines = Vec::new();
	let resolved: Vec<(String, String)> = remaining
		.iter()
		.filter_map(|name| index.get(name).map(|link| (name.clone(), link.to_string())))
		.collect();

	for (name, link) in resolved {
		lines.push(format!("[{name}]: {site_prefix}/{link}"));
		remaining.remove(&name);

		if let Some(previous) = resolved_case.insert(name.to_uppercase(), name.clone()) {
			log.warn(
				file,
				format!(
					"References [{name}] and [{previous}] are different only in case, not distinguishable in \
					 markdown."
				),
			);
		}
	}

	lines
}
