//! Route map: compiles route declarations into records.
//!
//! Children are registered before their parent so that a nested path wins
//! over its parent when both match. Wildcard paths (`*`) always sort last.

use crate::config::RouteConfig;
use crate::error::RouterError;
use crate::location::clean_path;
use crate::logging::warn_dev;
use crate::pattern::{PathPattern, PatternOptions};
use crate::record::{RouteRecord, SharedComponents};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;

/// Matches child paths that render as the default child.
static DEFAULT_CHILD_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^/?$").expect("DEFAULT_CHILD_RE: invalid regex pattern"));

/// Compiled routes indexed by path and by name.
#[derive(Clone, Default)]
pub struct RouteMap {
	path_list: Vec<String>,
	path_map: HashMap<String, Rc<RouteRecord>>,
	name_map: HashMap<String, Rc<RouteRecord>>,
	// Keeps records alive when their path was already taken, since children
	// only hold weak parent links.
	records: Vec<Rc<RouteRecord>>,
}

impl RouteMap {
	/// Compiles `routes` into a new map.
	///
	/// # Errors
	///
	/// Returns [`RouterError::Pattern`] if a path does not compile.
	pub fn new(routes: &[RouteConfig]) -> Result<Self, RouterError> {
		let mut map = Self::default();
		map.add_routes(routes)?;
		Ok(map)
	}

	/// Adds `routes` to the map. Existing entries are never replaced.
	///
	/// On error the map is left unchanged.
	pub fn add_routes(&mut self, routes: &[RouteConfig]) -> Result<(), RouterError> {
		let mut next = self.clone();
		for route in routes {
			next.add_route_record(route, None, None, None)?;
		}

		let (mut paths, wildcards): (Vec<String>, Vec<String>) =
			next.path_list.drain(..).partition(|path| path != "*");
		paths.extend(wildcards);
		next.path_list = paths;

		if cfg!(debug_assertions) {
			let unnested: Vec<&str> = next
				.path_list
				.iter()
				.map(String::as_str)
				.filter(|path| !path.is_empty() && !path.starts_with('/') && !path.starts_with('*'))
				.collect();
			if !unnested.is_empty() {
				warn_dev!(
					"Non-nested routes must include a leading slash character. Fix the following routes: {}",
					unnested.join(", ")
				);
			}
		}

		*self = next;
		Ok(())
	}

	fn add_route_record(
		&mut self,
		route: &RouteConfig,
		parent: Option<&Rc<RouteRecord>>,
		match_as: Option<String>,
		shared_components: Option<SharedComponents>,
	) -> Result<Rc<RouteRecord>, RouterError> {
		let mut options = route.path_options.unwrap_or_default();
		let path = normalize_path(&route.path, parent.map(|p| p.path()), options.strict);
		if let Some(sensitive) = route.case_sensitive {
			options.sensitive = sensitive;
		}

		let record = Rc::new(RouteRecord {
			pattern: compile_record_pattern(&path, options)?,
			path,
			components: shared_components
				.unwrap_or_else(|| Rc::new(RefCell::new(route.components.clone()))),
			instances: RefCell::default(),
			name: route.name.clone(),
			parent: parent.map(Rc::downgrade),
			match_as: match_as.clone(),
			redirect: route.redirect.clone(),
			before_enter: route.before_enter.clone(),
			meta: route
				.meta
				.clone()
				.unwrap_or_else(|| serde_json::Value::Object(Default::default())),
			props: route.props.clone(),
		});
		self.records.push(Rc::clone(&record));

		if !route.children.is_empty() {
			if route.name.is_some()
				&& route.redirect.is_none()
				&& route
					.children
					.iter()
					.any(|child| DEFAULT_CHILD_RE.is_match(&child.path))
			{
				warn_dev!(
					"Named Route '{}' has a default child route. When navigating to this named route, the default child will not be rendered. Remove the name from this route and use the name of the default child route for named links instead.",
					route.name.as_deref().unwrap_or_default()
				);
			}
			for child in &route.children {
				let child_match_as = match_as
					.as_ref()
					.map(|match_as| clean_path(&format!("{}/{}", match_as, child.path)));
				self.add_route_record(child, Some(&record), child_match_as, None)?;
			}
		}

		if !self.path_map.contains_key(&record.path) {
			self.path_list.push(record.path.clone());
			self.path_map
				.insert(record.path.clone(), Rc::clone(&record));
		}

		for alias in &route.alias {
			if alias == &route.path {
				warn_dev!(
					"Found an alias with the same value as the path: \"{}\". You have to remove that alias. It will be ignored in development.",
					route.path
				);
				continue;
			}
			let alias_route = RouteConfig {
				path: alias.clone(),
				children: route.children.clone(),
				..RouteConfig::default()
			};
			let canonical = if record.path.is_empty() {
				"/".to_string()
			} else {
				record.path.clone()
			};
			self.add_route_record(
				&alias_route,
				parent,
				Some(canonical),
				Some(Rc::clone(&record.components)),
			)?;
		}

		if let Some(name) = &route.name {
			if !self.name_map.contains_key(name) {
				self.name_map.insert(name.clone(), Rc::clone(&record));
			} else if match_as.is_none() {
				warn_dev!(
					"Duplicate named routes definition: {{ name: \"{}\", path: \"{}\" }}",
					name,
					record.path
				);
			}
		}

		Ok(record)
	}

	/// Paths in matching order.
	pub fn path_list(&self) -> &[String] {
		&self.path_list
	}

	/// Record registered for `path`.
	pub fn get(&self, path: &str) -> Option<&Rc<RouteRecord>> {
		self.path_map.get(path)
	}

	/// Record registered under `name`.
	pub fn named(&self, name: &str) -> Option<&Rc<RouteRecord>> {
		self.name_map.get(name)
	}

	/// Records in matching order.
	pub fn records(&self) -> impl Iterator<Item = &Rc<RouteRecord>> {
		self.path_list
			.iter()
			.filter_map(|path| self.path_map.get(path))
	}

	/// Number of distinct paths.
	pub fn len(&self) -> usize {
		self.path_list.len()
	}

	/// Returns `true` if no route is registered.
	pub fn is_empty(&self) -> bool {
		self.path_list.is_empty()
	}
}

impl std::fmt::Debug for RouteMap {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RouteMap")
			.field("path_list", &self.path_list)
			.field("names", &self.name_map.keys().collect::<Vec<_>>())
			.finish()
	}
}

fn compile_record_pattern(
	path: &str,
	options: PatternOptions,
) -> Result<Rc<PathPattern>, RouterError> {
	Ok(PathPattern::compile(path, options)?)
}

/// Makes `path` absolute under `parent` and drops one trailing slash unless
/// `strict`.
fn normalize_path(path: &str, parent: Option<&str>, strict: bool) -> String {
	let path = if strict {
		path
	} else {
		path.strip_suffix('/').unwrap_or(path)
	};
	if path.starts_with('/') {
		return path.to_string();
	}
	match parent {
		Some(parent) => clean_path(&format!("{parent}/{path}")),
		None => path.to_string(),
	}
}
