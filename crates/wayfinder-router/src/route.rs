//! Immutable route snapshots.

use crate::component::ComponentSlot;
use crate::location::{Location, Params};
use crate::query::{Query, QueryCodec};
use crate::record::RouteRecord;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

thread_local! {
	static START: Rc<Route> = Rc::new(Route::create(
		None,
		&Location::path("/"),
		None,
		&QueryCodec::default(),
	));
}

/// Returns the sentinel route standing for "nowhere" (`/`, nothing matched).
pub fn start_route() -> Rc<Route> {
	START.with(Rc::clone)
}

/// Returns `true` if `route` is the sentinel start route.
pub fn is_start_route(route: &Rc<Route>) -> bool {
	START.with(|start| Rc::ptr_eq(start, route))
}

/// A matched navigation target.
///
/// Routes are shared as `Rc<Route>` and never mutated once created.
#[derive(Clone)]
pub struct Route {
	/// Route name, from the location or the matched record.
	pub name: Option<String>,
	/// Path as requested; alias paths are kept.
	pub path: String,
	/// Hash fragment including `#`, or empty.
	pub hash: String,
	/// Parsed query.
	pub query: Query,
	/// Params extracted from the path.
	pub params: Params,
	/// `path + query + hash`.
	pub full_path: String,
	/// Matched records, root first.
	pub matched: Vec<Rc<RouteRecord>>,
	/// Meta of the deepest matched record.
	pub meta: Value,
	/// Full path of the location that redirected here.
	pub redirected_from: Option<String>,
	/// Canonical path when the route was reached through an alias.
	pub matched_as: Option<String>,
}

impl Route {
	/// Builds a route for `record` (or an unmatched route when `None`).
	pub(crate) fn create(
		record: Option<&Rc<RouteRecord>>,
		location: &Location,
		redirected_from: Option<&Location>,
		codec: &QueryCodec,
	) -> Self {
		let query = location.query.clone().unwrap_or_default();
		let path = location
			.path
			.clone()
			.filter(|path| !path.is_empty())
			.unwrap_or_else(|| "/".to_string());
		let hash = location.hash.clone().unwrap_or_default();

		Self {
			name: location
				.name
				.clone()
				.or_else(|| record.and_then(|record| record.name().map(str::to_string))),
			meta: record.map_or_else(
				|| Value::Object(Default::default()),
				|record| record.meta().clone(),
			),
			full_path: format!("{}{}{}", path, codec.stringify(&query), hash),
			path,
			hash,
			query,
			params: location.params.clone().unwrap_or_default(),
			matched: record.map(|record| record.chain()).unwrap_or_default(),
			redirected_from: redirected_from.map(|from| full_path(from, codec)),
			matched_as: None,
		}
	}

	/// Returns `true` if at least one record matched.
	pub fn is_matched(&self) -> bool {
		!self.matched.is_empty()
	}

	/// Returns the components of every matched record, root first.
	pub fn matched_components(&self) -> Vec<ComponentSlot> {
		self.matched
			.iter()
			.flat_map(|record| record.components().into_values())
			.collect()
	}
}

impl fmt::Debug for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let matched: Vec<&str> = self.matched.iter().map(|record| record.path()).collect();
		f.debug_struct("Route")
			.field("name", &self.name)
			.field("full_path", &self.full_path)
			.field("params", &self.params)
			.field("matched", &matched)
			.field("redirected_from", &self.redirected_from)
			.field("matched_as", &self.matched_as)
			.finish()
	}
}

/// `path + query + hash` of a location.
pub(crate) fn full_path(location: &Location, codec: &QueryCodec) -> String {
	let path = location
		.path
		.as_deref()
		.filter(|path| !path.is_empty())
		.unwrap_or("/");
	let query = location
		.query
		.as_ref()
		.map(|query| codec.stringify(query))
		.unwrap_or_default();
	format!("{}{}{}", path, query, location.hash.as_deref().unwrap_or_default())
}

/// Returns `true` if `a` and `b` designate the same location.
///
/// Paths compare without a trailing slash, together with hash, query, name
/// and params.
/// The start route only equals itself.
pub fn is_same_route(a: &Rc<Route>, b: &Rc<Route>) -> bool {
	if is_start_route(b) {
		return Rc::ptr_eq(a, b);
	}
	if !a.path.is_empty() && !b.path.is_empty() {
		return without_trailing_slash(&a.path) == without_trailing_slash(&b.path)
			&& a.hash == b.hash
			&& a.query == b.query
			&& a.name == b.name
			&& a.params == b.params;
	}
	match (&a.name, &b.name) {
		(Some(left), Some(right)) => {
			left == right && a.hash == b.hash && a.query == b.query && a.params == b.params
		}
		_ => false,
	}
}

fn without_trailing_slash(path: &str) -> &str {
	path.strip_suffix('/').unwrap_or(path)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::query::QueryValue;
	use rstest::rstest;

	fn route(location: Location) -> Rc<Route> {
		Rc::new(Route::create(None, &location, None, &QueryCodec::default()))
	}

	#[rstest]
	fn test_start_route() {
		let start = start_route();
		assert_eq!(start.path, "/");
		assert_eq!(start.full_path, "/");
		assert!(start.matched.is_empty());
		assert!(is_start_route(&start));
		assert!(!is_start_route(&route(Location::path("/"))));
	}

	#[rstest]
	fn test_full_path_includes_query_and_hash() {
		let r = route(
			Location::path("/search")
				.with_query("q", "a b")
				.with_hash("#top"),
		);
		assert_eq!(r.full_path, "/search?q=a%20b#top");
		assert_eq!(r.meta, Value::Object(Default::default()));
	}

	#[rstest]
	fn test_same_route_ignores_one_trailing_slash() {
		assert!(is_same_route(
			&route(Location::path("/a/")),
			&route(Location::path("/a"))
		));
		assert!(!is_same_route(
			&route(Location::path("/a//")),
			&route(Location::path("/a"))
		));
		assert!(!is_same_route(
			&route(Location::path("/a").with_query("x", QueryValue::Null)),
			&route(Location::path("/a"))
		));
		assert!(!is_same_route(
			&route(Location::path("/a").with_hash("#x")),
			&route(Location::path("/a"))
		));
	}

	#[rstest]
	fn test_same_route_against_start() {
		let start = start_route();
		assert!(is_same_route(&start, &start));
		assert!(!is_same_route(&route(Location::path("/")), &start));
	}
}
