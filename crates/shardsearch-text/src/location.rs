use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use shardsearch_core::config::expand_path;

/// Where a backend index keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
	Memory,
	Directory(PathBuf),
}

impl Location {
	/// Location of a named child index under this one.
	pub fn child(&self, name: &str) -> Location {
		match self {
			Location::Memory => Location::Memory,
			Location::Directory(dir) => Location::Directory(dir.join(name)),
		}
	}

	pub fn path(&self) -> Option<&Path> {
		match self {
			Location::Memory => None,
			Location::Directory(dir) => Some(dir),
		}
	}

	/// A directory holds an index once tantivy wrote its meta file.
	pub fn holds_index(&self) -> bool {
		self.path().is_some_and(|p| p.join("meta.json").is_file())
	}
}

impl FromStr for Location {
	type Err = std::convert::Infallible;

	/// `memory` (or `mem`, `:memory:`) selects an in-RAM index; anything else
	/// is a directory path with `~` and `$VAR` expansion.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s.trim() {
			"memory" | "mem" | ":memory:" => Location::Memory,
			other => Location::Directory(expand_path(other)),
		})
	}
}

impl fmt::Display for Location {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Location::Memory => f.write_str("memory"),
			Location::Directory(dir) => write!(f, "{}", dir.display()),
		}
	}
}
