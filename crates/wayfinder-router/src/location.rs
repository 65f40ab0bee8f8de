//! Raw and normalized navigation targets.
//!
//! A navigation target is either a plain string (`"/users/1?tab=posts#top"`)
//! or a structured [`Location`]. Before matching, targets are normalized:
//! relative paths are resolved against the current route, query strings are
//! parsed and merged, and params-only targets reuse the current route.

use crate::logging::warn_dev;
use crate::pattern::{PathPattern, PatternOptions};
use crate::query::{Query, QueryCodec, QueryValue};
use crate::route::Route;
use indexmap::IndexMap;

/// Route params by key, in declaration order.
pub type Params = IndexMap<String, String>;

/// A structured navigation target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Location {
	/// Target route name.
	pub name: Option<String>,
	/// Target path, absolute or relative to the current route.
	pub path: Option<String>,
	/// Hash fragment, with or without the leading `#`.
	pub hash: Option<String>,
	/// Query values, merged over any query embedded in `path`.
	pub query: Option<Query>,
	/// Params for named targets, or for relative params navigation.
	pub params: Option<Params>,
	/// Append a relative `path` to the current path instead of replacing its
	/// last segment.
	pub append: bool,
	/// Replace the current history entry when used as a guard redirect.
	pub replace: bool,
	pub(crate) normalized: bool,
}

impl Location {
	/// Creates a path target.
	pub fn path(path: impl Into<String>) -> Self {
		Self {
			path: Some(path.into()),
			..Self::default()
		}
	}

	/// Creates a named target.
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: Some(name.into()),
			..Self::default()
		}
	}

	/// Adds a param.
	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.params
			.get_or_insert_with(Params::new)
			.insert(key.into(), value.into());
		self
	}

	/// Adds a query value.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		self.query
			.get_or_insert_with(Query::new)
			.insert(key.into(), value.into());
		self
	}

	/// Sets the hash fragment.
	pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
		self.hash = Some(hash.into());
		self
	}

	/// Resolves a relative path by appending to the current path.
	pub fn appending(mut self) -> Self {
		self.append = true;
		self
	}

	/// Marks the target as a history replacement.
	pub fn replacing(mut self) -> Self {
		self.replace = true;
		self
	}

	/// Returns `true` once the location has been normalized.
	pub fn is_normalized(&self) -> bool {
		self.normalized
	}
}

/// A navigation target as supplied by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum RawLocation {
	/// A path string, possibly with query and hash.
	Path(String),
	/// A structured location.
	Structured(Location),
}

impl RawLocation {
	/// Returns `true` if the target asks for a history replacement.
	pub fn is_replace(&self) -> bool {
		matches!(self, Self::Structured(location) if location.replace)
	}

	/// Returns the structured form of this target.
	pub fn to_location(&self) -> Location {
		match self {
			Self::Path(path) => Location::path(path.clone()),
			Self::Structured(location) => location.clone(),
		}
	}
}

impl From<&str> for RawLocation {
	fn from(path: &str) -> Self {
		Self::Path(path.to_string())
	}
}

impl From<String> for RawLocation {
	fn from(path: String) -> Self {
		Self::Path(path)
	}
}

impl From<&String> for RawLocation {
	fn from(path: &String) -> Self {
		Self::Path(path.clone())
	}
}

impl From<Location> for RawLocation {
	fn from(location: Location) -> Self {
		Self::Structured(location)
	}
}

/// A path split into its path, query and hash parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedPath<'a> {
	/// Path part.
	pub path: &'a str,
	/// Query part without the leading `?`.
	pub query: &'a str,
	/// Hash part including the leading `#`.
	pub hash: &'a str,
}

/// Splits `path` into path, query and hash.
pub fn parse_path(path: &str) -> ParsedPath<'_> {
	let (path, hash) = match path.find('#') {
		Some(index) => (&path[..index], &path[index..]),
		None => (path, ""),
	};
	let (path, query) = match path.find('?') {
		Some(index) => (&path[..index], &path[index + 1..]),
		None => (path, ""),
	};
	ParsedPath { path, query, hash }
}

/// Collapses runs of slashes into one.
pub fn clean_path(path: &str) -> String {
	let mut cleaned = String::with_capacity(path.len());
	for c in path.chars() {
		if c == '/' && cleaned.ends_with('/') {
			continue;
		}
		cleaned.push(c);
	}
	cleaned
}

/// Resolves `relative` against `base`.
///
/// Without `append`, the last segment of `base` is replaced; `.` and `..`
/// segments are honored.
pub fn resolve_path(relative: &str, base: &str, append: bool) -> String {
	if relative.starts_with('/') {
		return relative.to_string();
	}
	if relative.starts_with('?') || relative.starts_with('#') {
		return format!("{base}{relative}");
	}

	let mut stack: Vec<&str> = base.split('/').collect();
	// A trailing slash leaves an empty last segment which is always dropped.
	if !append || stack.last().is_some_and(|last| last.is_empty()) {
		stack.pop();
	}

	for segment in relative.trim_start_matches('/').split('/') {
		match segment {
			".." => {
				stack.pop();
			}
			"." => {}
			segment => stack.push(segment),
		}
	}

	if stack.first() != Some(&"") {
		stack.insert(0, "");
	}
	stack.join("/")
}

/// Fills the params of `path` (a route pattern), returning `""` when a
/// required param is missing.
///
/// A `pathMatch` param stands in for the asterisk wildcard.
pub(crate) fn fill_params(path: &str, params: &Params, route_msg: &str) -> String {
	let mut filled = params.clone();
	let path_match = params.get("pathMatch").cloned();
	if let Some(path_match) = &path_match {
		filled.insert("0".to_string(), path_match.clone());
	}

	let result = PathPattern::compile(path, PatternOptions::default()).and_then(|pattern| pattern.fill(&filled));
	match result {
		Ok(path) => path,
		Err(err) => {
			if path_match.is_none() {
				warn_dev!("missing param for {}: {}", route_msg, err);
			}
			String::new()
		}
	}
}

/// Normalizes a raw target against the current route.
pub fn normalize_location(
	raw: &RawLocation,
	current: Option<&Route>,
	append: bool,
	codec: &QueryCodec,
) -> Location {
	let next = raw.to_location();
	if next.normalized || next.name.is_some() {
		return next;
	}

	let has_path = next.path.as_deref().is_some_and(|path| !path.is_empty());
	if let (false, Some(params), Some(current)) = (has_path, next.params.as_ref(), current) {
		let mut merged = current.params.clone();
		merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));

		let mut relative = next.clone();
		relative.normalized = true;
		if let Some(name) = &current.name {
			relative.name = Some(name.clone());
			relative.params = Some(merged);
		} else if let Some(record) = current.matched.last() {
			relative.path = Some(fill_params(
				record.path(),
				&merged,
				&format!("path {}", current.path),
			));
		} else {
			warn_dev!("relative params navigation requires a current route.");
		}
		return relative;
	}

	let parsed = parse_path(next.path.as_deref().unwrap_or_default());
	let base_path = current.map_or("/", |route| route.path.as_str());
	let path = if parsed.path.is_empty() {
		base_path.to_string()
	} else {
		resolve_path(parsed.path, base_path, append || next.append)
	};

	let mut query = codec.parse(parsed.query);
	if let Some(extra) = &next.query {
		for (key, value) in extra {
			query.insert(key.clone(), value.clone());
		}
	}

	let hash = match next.hash.as_deref().filter(|hash| !hash.is_empty()) {
		Some(hash) => hash,
		None => parsed.hash,
	};
	let hash = if hash.is_empty() || hash.starts_with('#') {
		hash.to_string()
	} else {
		format!("#{hash}")
	};

	Location {
		path: Some(path),
		query: Some(query),
		hash: (!hash.is_empty()).then_some(hash),
		normalized: true,
		..Location::default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_parse_path() {
		let parsed = parse_path("/a/b?x=1&y#frag?not-query");
		assert_eq!(parsed.path, "/a/b");
		assert_eq!(parsed.query, "x=1&y");
		assert_eq!(parsed.hash, "#frag?not-query");
	}

	#[rstest]
	#[case("/abs", "/a/b", false, "/abs")]
	#[case("c", "/a/b", false, "/a/c")]
	#[case("c", "/a/b", true, "/a/b/c")]
	#[case("c", "/a/b/", false, "/a/b/c")]
	#[case("../c", "/a/b", false, "/c")]
	#[case("./c", "/a/b", false, "/a/c")]
	#[case("?q=1", "/a/b", false, "/a/b?q=1")]
	#[case("#top", "/a", false, "/a#top")]
	fn test_resolve_path(
		#[case] relative: &str,
		#[case] base: &str,
		#[case] append: bool,
		#[case] expected: &str,
	) {
		assert_eq!(resolve_path(relative, base, append), expected);
	}

	#[rstest]
	fn test_clean_path() {
		assert_eq!(clean_path("/a//b"), "/a/b");
		assert_eq!(clean_path("//#/x"), "/#/x");
		assert_eq!(clean_path("/app///a"), "/app/a");
	}

	#[rstest]
	fn test_normalize_string_location() {
		let raw = RawLocation::from("/users?tab=posts#bio");
		let location = normalize_location(&raw, None, false, &QueryCodec::default());
		assert!(location.is_normalized());
		assert_eq!(location.path.as_deref(), Some("/users"));
		assert_eq!(location.hash.as_deref(), Some("#bio"));
		assert_eq!(
			location.query.unwrap().get("tab"),
			Some(&QueryValue::from("posts"))
		);
	}

	#[rstest]
	fn test_normalize_merges_structured_query_and_hash() {
		let raw: RawLocation = Location::path("/search?q=rust")
			.with_query("page", "2")
			.with_hash("results")
			.into();
		let location = normalize_location(&raw, None, false, &QueryCodec::default());
		let query = location.query.unwrap();
		assert_eq!(query.get("q"), Some(&QueryValue::from("rust")));
		assert_eq!(query.get("page"), Some(&QueryValue::from("2")));
		assert_eq!(location.hash.as_deref(), Some("#results"));
	}

	#[rstest]
	fn test_named_location_is_passed_through() {
		let raw: RawLocation = Location::named("user").with_param("id", "1").into();
		let location = normalize_location(&raw, None, false, &QueryCodec::default());
		assert_eq!(location.name.as_deref(), Some("user"));
		assert!(!location.is_normalized());
	}

	#[rstest]
	fn test_fill_params_uses_path_match() {
		let mut params = Params::new();
		params.insert("pathMatch".to_string(), "a/b".to_string());
		assert_eq!(fill_params("/docs/*", &params, "test"), "/docs/a/b");
		assert_eq!(fill_params("/users/:id", &Params::new(), "test"), "");
	}
}
