//! Resolves locations to routes.
//!
//! Matching follows redirects and aliases. Both can chain, so resolution is
//! bounded by [`MAX_REDIRECT_DEPTH`].

use crate::config::{Redirect, RouteConfig};
use crate::error::RouterError;
use crate::location::{
	Location, Params, RawLocation, fill_params, normalize_location, parse_path, resolve_path,
};
use crate::logging::warn_dev;
use crate::map::RouteMap;
use crate::query::{QueryCodec, decode};
use crate::record::RouteRecord;
use crate::route::{Route, full_path};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// Maximum number of redirect or alias hops while resolving one location.
pub const MAX_REDIRECT_DEPTH: usize = 10;

/// Matches locations against a route map.
#[derive(Debug)]
pub struct Matcher {
	map: RefCell<RouteMap>,
	codec: QueryCodec,
}

impl Matcher {
	/// Compiles `routes` into a matcher.
	///
	/// # Errors
	///
	/// Returns [`RouterError::Pattern`] if a path does not compile.
	pub fn new(routes: &[RouteConfig], codec: QueryCodec) -> Result<Self, RouterError> {
		Ok(Self {
			map: RefCell::new(RouteMap::new(routes)?),
			codec,
		})
	}

	/// Adds routes; existing paths and names keep their first definition.
	pub fn add_routes(&self, routes: &[RouteConfig]) -> Result<(), RouterError> {
		self.map.borrow_mut().add_routes(routes)
	}

	/// Query codec used for every route this matcher creates.
	pub fn codec(&self) -> &QueryCodec {
		&self.codec
	}

	/// Read access to the route map.
	pub fn map(&self) -> Ref<'_, RouteMap> {
		self.map.borrow()
	}

	/// Resolves `raw` against the current route.
	///
	/// An unknown name or path yields an unmatched route, not an error.
	///
	/// # Errors
	///
	/// Returns [`RouterError::RedirectLimit`] when redirects or aliases do
	/// not settle within [`MAX_REDIRECT_DEPTH`] hops.
	pub fn match_location(
		&self,
		raw: &RawLocation,
		current: Option<&Route>,
		redirected_from: Option<&Location>,
	) -> Result<Route, RouterError> {
		self.match_at_depth(raw, current, redirected_from, 0)
	}

	fn match_at_depth(
		&self,
		raw: &RawLocation,
		current: Option<&Route>,
		redirected_from: Option<&Location>,
		depth: usize,
	) -> Result<Route, RouterError> {
		let mut location = normalize_location(raw, current, false, &self.codec);

		if let Some(name) = location.name.clone() {
			let record = self.map.borrow().named(&name).cloned();
			let Some(record) = record else {
				warn_dev!("Route with name '{}' does not exist", name);
				return Ok(self.unmatched(&location));
			};

			let params = location.params.get_or_insert_with(Params::new);
			if let Some(current) = current {
				let required = record.pattern().keys().iter().filter(|key| !key.optional);
				for key in required {
					if !params.contains_key(&key.name) {
						if let Some(value) = current.params.get(&key.name) {
							params.insert(key.name.clone(), value.clone());
						}
					}
				}
			}
			location.path = Some(fill_params(
				record.path(),
				params,
				&format!("named route \"{name}\""),
			));
			return self.create_route(Some(record), location, redirected_from, depth);
		}

		if let Some(path) = location.path.clone().filter(|path| !path.is_empty()) {
			let hit = {
				let map = self.map.borrow();
				map.records().find_map(|record| {
					record
						.pattern()
						.captures(&path)
						.map(|captures| (Rc::clone(record), captures))
				})
			};

			let mut params = Params::new();
			if let Some((record, captures)) = hit {
				for (key, value) in record.pattern().keys().iter().zip(captures) {
					let Some(value) = value else { continue };
					let name = if key.positional && key.name == "0" {
						"pathMatch"
					} else {
						key.name.as_str()
					};
					params.insert(name.to_string(), decode(&value));
				}
				location.params = Some(params);
				return self.create_route(Some(record), location, redirected_from, depth);
			}
			location.params = Some(params);
		}

		Ok(self.unmatched(&location))
	}

	fn create_route(
		&self,
		record: Option<Rc<RouteRecord>>,
		location: Location,
		redirected_from: Option<&Location>,
		depth: usize,
	) -> Result<Route, RouterError> {
		if let Some(record) = &record {
			if record.redirect().is_some() {
				return self.redirect(record, redirected_from.unwrap_or(&location), depth);
			}
			if let Some(match_as) = record.match_as() {
				return self.alias(location, match_as, depth);
			}
		}
		Ok(Route::create(
			record.as_ref(),
			&location,
			redirected_from,
			&self.codec,
		))
	}

	fn redirect(
		&self,
		record: &Rc<RouteRecord>,
		location: &Location,
		depth: usize,
	) -> Result<Route, RouterError> {
		self.check_depth(location, depth)?;

		let target = match record.redirect() {
			Some(Redirect::To(target)) => Some(target.clone()),
			Some(Redirect::Dynamic(compute)) => {
				let candidate = Route::create(Some(record), location, None, &self.codec);
				compute(&candidate)
			}
			None => None,
		};
		let Some(target) = target else {
			warn_dev!("invalid redirect option: redirect function returned nothing");
			return Ok(self.unmatched(location));
		};

		let mut redirect = target.to_location();
		if let RawLocation::Path(raw) = &target {
			let parsed = parse_path(raw);
			redirect.path = Some(parsed.path.to_string());
			if !parsed.query.is_empty() {
				redirect.query = Some(self.codec.parse(parsed.query));
			}
			if !parsed.hash.is_empty() {
				redirect.hash = Some(parsed.hash.to_string());
			}
		}

		let query = redirect.query.or_else(|| location.query.clone());
		let hash = redirect.hash.or_else(|| location.hash.clone());
		let params = redirect.params.or_else(|| location.params.clone());

		if let Some(name) = redirect.name {
			if self.map.borrow().named(&name).is_none() {
				warn_dev!("redirect failed: named route \"{}\" not found.", name);
			}
			let next = Location {
				name: Some(name),
				query,
				hash,
				params,
				normalized: true,
				..Location::default()
			};
			return self.match_at_depth(&next.into(), None, Some(location), depth + 1);
		}

		if let Some(path) = redirect.path.filter(|path| !path.is_empty()) {
			let base = record
				.parent()
				.map(|parent| parent.path().to_string())
				.unwrap_or_else(|| "/".to_string());
			let raw_path = resolve_path(&path, &base, true);
			let filled = fill_params(
				&raw_path,
				&params.unwrap_or_default(),
				&format!("redirect route with path \"{raw_path}\""),
			);
			let next = Location {
				path: Some(filled),
				query,
				hash,
				normalized: true,
				..Location::default()
			};
			return self.match_at_depth(&next.into(), None, Some(location), depth + 1);
		}

		warn_dev!("invalid redirect option: {:?}", target);
		Ok(self.unmatched(location))
	}

	fn alias(
		&self,
		mut location: Location,
		match_as: &str,
		depth: usize,
	) -> Result<Route, RouterError> {
		self.check_depth(&location, depth)?;

		let aliased_path = fill_params(
			match_as,
			location.params.as_ref().unwrap_or(&Params::new()),
			&format!("aliased route with path \"{match_as}\""),
		);
		let target = Location {
			path: Some(aliased_path),
			normalized: true,
			..Location::default()
		};
		let aliased = self.match_at_depth(&target.into(), None, None, depth + 1)?;

		let Some(aliased_record) = aliased.matched.last().cloned() else {
			return Ok(Route::create(None, &location, None, &self.codec));
		};
		location.params = Some(aliased.params.clone());
		if aliased_record.redirect().is_some() {
			return self.create_route(Some(aliased_record), location, None, depth + 1);
		}

		let mut route = Route::create(Some(&aliased_record), &location, None, &self.codec);
		route.matched_as = Some(aliased.matched_as.unwrap_or(aliased.path));
		Ok(route)
	}

	fn check_depth(&self, location: &Location, depth: usize) -> Result<(), RouterError> {
		if depth < MAX_REDIRECT_DEPTH {
			return Ok(());
		}
		let path = full_path(location, &self.codec);
		warn_dev!("redirect limit exceeded while resolving \"{}\"", path);
		Err(RouterError::RedirectLimit {
			path,
			limit: MAX_REDIRECT_DEPTH,
		})
	}

	fn unmatched(&self, location: &Location) -> Route {
		Route::create(None, location, None, &self.codec)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::component::Component;
	use crate::query::QueryValue;
	use proptest::prelude::*;
	use rstest::{fixture, rstest};
	use serde_json::json;

	fn matcher(routes: Vec<RouteConfig>) -> Matcher {
		Matcher::new(&routes, QueryCodec::default()).unwrap()
	}

	fn paths(route: &Route) -> Vec<&str> {
		route.matched.iter().map(|record| record.path()).collect()
	}

	#[fixture]
	fn nested() -> Matcher {
		matcher(vec![
			RouteConfig::new("/a").children(vec![RouteConfig::new("b"), RouteConfig::new("/c")]),
		])
	}

	#[rstest]
	fn test_nested_match(nested: Matcher) {
		let route = nested.match_location(&"/a/b/".into(), None, None).unwrap();
		assert_eq!(paths(&route), vec!["/a", "/a/b"]);
		assert_eq!(route.path, "/a/b/");

		let route = nested.match_location(&"/c".into(), None, None).unwrap();
		assert_eq!(paths(&route), vec!["/a", "/c"]);
	}

	#[rstest]
	fn test_unknown_path_is_unmatched(nested: Matcher) {
		let route = nested.match_location(&"/nope?x=1".into(), None, None).unwrap();
		assert!(!route.is_matched());
		assert_eq!(route.full_path, "/nope?x=1");
	}

	#[rstest]
	fn test_params_are_decoded() {
		let m = matcher(vec![RouteConfig::new("/users/:id").name("user")]);
		let route = m.match_location(&"/users/j%C3%B6rg".into(), None, None).unwrap();
		assert_eq!(route.params.get("id").map(String::as_str), Some("jörg"));
		assert_eq!(route.name.as_deref(), Some("user"));
	}

	#[rstest]
	fn test_named_match_fills_params_from_current() {
		let m = matcher(vec![
			RouteConfig::new("/org/:org/settings").name("settings"),
			RouteConfig::new("/org/:org/members").name("members"),
		]);
		let current = m.match_location(&"/org/acme/members".into(), None, None).unwrap();
		let route = m
			.match_location(&Location::named("settings").into(), Some(&current), None)
			.unwrap();
		assert_eq!(route.path, "/org/acme/settings");
	}

	#[rstest]
	fn test_unknown_name_is_unmatched() {
		let m = matcher(vec![RouteConfig::new("/a")]);
		let route = m.match_location(&Location::named("missing").into(), None, None).unwrap();
		assert!(!route.is_matched());
		assert_eq!(route.path, "/");
	}

	#[rstest]
	fn test_wildcard_exposes_path_match() {
		let m = matcher(vec![RouteConfig::new("/a"), RouteConfig::new("*").name("not-found")]);
		let route = m.match_location(&"/x/y".into(), None, None).unwrap();
		assert_eq!(route.name.as_deref(), Some("not-found"));
		assert_eq!(route.params.get("pathMatch").map(String::as_str), Some("/x/y"));
	}

	#[rstest]
	fn test_redirect_keeps_query_and_origin() {
		let m = matcher(vec![RouteConfig::new("/old").redirect("/new"), RouteConfig::new("/new")]);
		let route = m.match_location(&"/old?x=1".into(), None, None).unwrap();
		assert_eq!(route.path, "/new");
		assert_eq!(route.query.get("x"), Some(&QueryValue::from("1")));
		assert_eq!(route.redirected_from.as_deref(), Some("/old?x=1"));
		assert_eq!(route.full_path, "/new?x=1");
	}

	#[rstest]
	fn test_relative_redirect_resolves_against_parent() {
		let m = matcher(vec![RouteConfig::new("/p").children(vec![
			RouteConfig::new("old").redirect("fresh"),
			RouteConfig::new("fresh").meta(json!({ "fresh": true })),
		])]);
		let route = m.match_location(&"/p/old".into(), None, None).unwrap();
		assert_eq!(route.path, "/p/fresh");
		assert_eq!(route.meta, json!({ "fresh": true }));
	}

	#[rstest]
	fn test_named_redirect_carries_params() {
		let m = matcher(vec![
			RouteConfig::new("/u/:id").redirect(Location::named("profile")),
			RouteConfig::new("/profile/:id").name("profile"),
		]);
		let route = m.match_location(&"/u/9".into(), None, None).unwrap();
		assert_eq!(route.path, "/profile/9");
		assert_eq!(route.redirected_from.as_deref(), Some("/u/9"));
	}

	#[rstest]
	fn test_dynamic_redirect_returning_none_is_unmatched() {
		let m = matcher(vec![RouteConfig::new("/gone").redirect_with(|_| None)]);
		let route = m.match_location(&"/gone".into(), None, None).unwrap();
		assert!(!route.is_matched());
	}

	#[rstest]
	fn test_redirect_loop_hits_limit() {
		let m = matcher(vec![
			RouteConfig::new("/ping").redirect("/pong"),
			RouteConfig::new("/pong").redirect("/ping"),
		]);
		let err = m.match_location(&"/ping".into(), None, None).unwrap_err();
		assert!(matches!(
			err,
			RouterError::RedirectLimit { limit: MAX_REDIRECT_DEPTH, .. }
		));
	}

	#[rstest]
	fn test_alias_keeps_requested_path() {
		let m = matcher(vec![RouteConfig::new("/home").name("home").alias("/")]);
		let route = m.match_location(&"/".into(), None, None).unwrap();
		assert_eq!(route.path, "/");
		assert_eq!(paths(&route), vec!["/home"]);
		assert_eq!(route.matched_as.as_deref(), Some("/home"));
	}

	#[rstest]
	fn test_alias_with_params_and_children() {
		let m = matcher(vec![RouteConfig::new("/users/:id")
			.alias("/u/:id")
			.children(vec![RouteConfig::new("posts")])]);
		let route = m.match_location(&"/u/3/posts".into(), None, None).unwrap();
		assert_eq!(route.path, "/u/3/posts");
		assert_eq!(paths(&route), vec!["/users/:id", "/users/:id/posts"]);
		assert_eq!(route.params.get("id").map(String::as_str), Some("3"));
		assert_eq!(route.matched_as.as_deref(), Some("/users/3/posts"));
	}

	#[rstest]
	fn test_alias_under_alias_resolves_canonical_components() {
		let m = matcher(vec![RouteConfig::new("/p")
			.alias("/q")
			.component(Component::named("P"))
			.child(RouteConfig::new("c").alias("d").component(Component::named("C")))]);

		let route = m.match_location(&"/q/d".into(), None, None).unwrap();

		assert_eq!(route.path, "/q/d");
		assert_eq!(paths(&route), vec!["/p", "/p/c"]);
		let leaf = route.matched[1].component("default").unwrap();
		assert_eq!(leaf.resolved().unwrap().name(), Some("C"));
	}

	#[rstest]
	#[case("/u/a%20b?x=1&x=2&y#h")]
	#[case("/u/7")]
	#[case("/nowhere?q=1")]
	fn test_full_path_round_trips(#[case] raw: &str) {
		let m = matcher(vec![RouteConfig::new("/u/:id")]);
		let first = m.match_location(&raw.into(), None, None).unwrap();
		let second = m
			.match_location(&first.full_path.as_str().into(), None, None)
			.unwrap();
		assert_eq!(first.full_path, raw);
		assert_eq!(second.full_path, first.full_path);
	}

	#[rstest]
	fn test_case_sensitivity() {
		let m = matcher(vec![
			RouteConfig::new("/Exact").case_sensitive(true),
			RouteConfig::new("/loose"),
		]);
		assert!(!m.match_location(&"/exact".into(), None, None).unwrap().is_matched());
		assert!(m.match_location(&"/LOOSE".into(), None, None).unwrap().is_matched());
	}

	#[rstest]
	fn test_add_routes_extends_matching() {
		let m = matcher(vec![RouteConfig::new("*")]);
		m.add_routes(&[RouteConfig::new("/late").name("late")]).unwrap();
		let route = m.match_location(&"/late".into(), None, None).unwrap();
		assert_eq!(route.name.as_deref(), Some("late"));
		assert_eq!(m.map().path_list().last().map(String::as_str), Some("*"));
	}

	proptest! {
		#[test]
		fn prop_matched_full_path_round_trips(
			id in "[a-z0-9 ]{1,8}",
			values in proptest::collection::vec("[a-z0-9]{1,6}", 0..3),
			flag in any::<bool>(),
			hash in proptest::option::of("[a-z]{1,6}"),
		) {
			let m = matcher(vec![RouteConfig::new("/u/:id")]);
			let mut parts: Vec<String> = values.iter().map(|value| format!("x={value}")).collect();
			if flag {
				parts.push("y".to_string());
			}
			let mut raw = format!("/u/{}", id.replace(' ', "%20"));
			if !parts.is_empty() {
				raw.push('?');
				raw.push_str(&parts.join("&"));
			}
			if let Some(hash) = hash {
				raw.push('#');
				raw.push_str(&hash);
			}

			let first = m.match_location(&raw.as_str().into(), None, None).unwrap();
			let second = m.match_location(&first.full_path.as_str().into(), None, None).unwrap();

			prop_assert_eq!(&second.full_path, &first.full_path);
			prop_assert_eq!(&second.params, &first.params);
			prop_assert_eq!(first.params.get("id").map(String::as_str), Some(id.as_str()));
		}
	}
}
