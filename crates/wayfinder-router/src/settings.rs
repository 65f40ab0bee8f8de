//! Router settings and construction options
//!
//! [`RouterSettings`] holds the serializable part of the configuration and
//! can be loaded from TOML or JSON. [`RouterOptions`] adds what cannot be
//! serialized: routes, query functions, the browser and the local spawner.

use crate::component::Spawner;
use crate::config::RouteConfig;
use crate::error::RouterError;
use crate::history::Browser;
use crate::query::{ParseQueryFn, Query, StringifyQueryFn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// History mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterMode {
	/// Location kept after `#` in the URL.
	#[default]
	Hash,
	/// Location kept in the URL path through the History API.
	History,
	/// In-memory stack, used off-browser.
	Abstract,
}

impl fmt::Display for RouterMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Hash => write!(f, "hash"),
			Self::History => write!(f, "history"),
			Self::Abstract => write!(f, "abstract"),
		}
	}
}

/// Serializable router settings
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterSettings {
	/// Requested history mode
	#[serde(default)]
	pub mode: RouterMode,

	/// Base path; defaults to the document `<base href>` or `/`
	#[serde(default)]
	pub base: Option<String>,

	/// Fall back to hash mode when the History API is unavailable
	#[serde(default = "default_fallback")]
	pub fallback: bool,

	/// Class applied to links matching the current route
	#[serde(default = "default_link_active_class")]
	pub link_active_class: String,

	/// Class applied to links exactly matching the current route
	#[serde(default = "default_link_exact_active_class")]
	pub link_exact_active_class: String,
}

fn default_fallback() -> bool {
	true
}

fn default_link_active_class() -> String {
	"router-link-active".to_string()
}

fn default_link_exact_active_class() -> String {
	"router-link-exact-active".to_string()
}

impl Default for RouterSettings {
	fn default() -> Self {
		Self {
			mode: RouterMode::default(),
			base: None,
			fallback: default_fallback(),
			link_active_class: default_link_active_class(),
			link_exact_active_class: default_link_exact_active_class(),
		}
	}
}

impl RouterSettings {
	/// Parses settings from a TOML document.
	pub fn from_toml_str(contents: &str) -> Result<Self, RouterError> {
		toml::from_str(contents)
			.map_err(|e| RouterError::Settings(format!("TOML parse error: {}", e)))
	}

	/// Parses settings from a JSON document.
	pub fn from_json_str(contents: &str) -> Result<Self, RouterError> {
		serde_json::from_str(contents)
			.map_err(|e| RouterError::Settings(format!("JSON parse error: {}", e)))
	}

	/// Loads settings from a `.toml` or `.json` file.
	pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, RouterError> {
		let path = path.into();
		let contents = std::fs::read_to_string(&path).map_err(|e| {
			RouterError::Settings(format!("Failed to read {}: {}", path.display(), e))
		})?;

		match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Self::from_toml_str(&contents),
			Some("json") => Self::from_json_str(&contents),
			_ => Err(RouterError::Settings(
				"Supported formats: .toml, .json".to_string(),
			)),
		}
	}
}

/// Everything needed to build a [`Router`](crate::Router).
#[derive(Clone, Default)]
pub struct RouterOptions {
	pub(crate) settings: RouterSettings,
	pub(crate) routes: Vec<RouteConfig>,
	pub(crate) browser: Option<Rc<dyn Browser>>,
	pub(crate) spawner: Option<Spawner>,
	pub(crate) parse_query: Option<ParseQueryFn>,
	pub(crate) stringify_query: Option<StringifyQueryFn>,
}

impl RouterOptions {
	/// Creates options with default settings and no routes.
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the settings.
	pub fn settings(mut self, settings: RouterSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Sets the route table.
	pub fn routes(mut self, routes: Vec<RouteConfig>) -> Self {
		self.routes = routes;
		self
	}

	/// Adds one route.
	pub fn route(mut self, route: RouteConfig) -> Self {
		self.routes.push(route);
		self
	}

	/// Sets the history mode.
	pub fn mode(mut self, mode: RouterMode) -> Self {
		self.settings.mode = mode;
		self
	}

	/// Sets the base path.
	pub fn base(mut self, base: impl Into<String>) -> Self {
		self.settings.base = Some(base.into());
		self
	}

	/// Enables or disables the hash fallback.
	pub fn fallback(mut self, fallback: bool) -> Self {
		self.settings.fallback = fallback;
		self
	}

	/// Sets the browser environment; without one the router runs in abstract
	/// mode.
	pub fn browser<B: Browser + 'static>(mut self, browser: Rc<B>) -> Self {
		self.browser = Some(browser as Rc<dyn Browser>);
		self
	}

	/// Sets the spawner that drives future-based async components.
	pub fn spawner<S: futures::task::LocalSpawn + 'static>(mut self, spawner: S) -> Self {
		self.spawner = Some(Rc::new(spawner) as Spawner);
		self
	}

	/// Overrides query string parsing.
	pub fn parse_query<F>(mut self, parse: F) -> Self
	where
		F: Fn(&str) -> Query + 'static,
	{
		self.parse_query = Some(Rc::new(parse));
		self
	}

	/// Overrides query string serialization. The result must start with `?`
	/// when non-empty.
	pub fn stringify_query<F>(mut self, stringify: F) -> Self
	where
		F: Fn(&Query) -> String + 'static,
	{
		self.stringify_query = Some(Rc::new(stringify));
		self
	}
}

impl fmt::Debug for RouterOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouterOptions")
			.field("settings", &self.settings)
			.field("routes", &self.routes.len())
			.field("browser", &self.browser.is_some())
			.field("spawner", &self.spawner.is_some())
			.field("parse_query", &self.parse_query.is_some())
			.field("stringify_query", &self.stringify_query.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_defaults() {
		let settings = RouterSettings::default();
		assert_eq!(settings.mode, RouterMode::Hash);
		assert!(settings.fallback);
		assert_eq!(settings.link_active_class, "router-link-active");
		assert_eq!(settings.link_exact_active_class, "router-link-exact-active");
	}

	#[rstest]
	fn test_from_toml_fills_defaults() {
		let settings = RouterSettings::from_toml_str(
			r#"
			mode = "history"
			base = "/app/"
			"#,
		)
		.unwrap();
		assert_eq!(settings.mode, RouterMode::History);
		assert_eq!(settings.base.as_deref(), Some("/app/"));
		assert!(settings.fallback);
	}

	#[rstest]
	#[case(r#"mode = "sideways""#)]
	#[case(r#"fallback = "yes""#)]
	fn test_from_toml_rejects_invalid(#[case] contents: &str) {
		let err = RouterSettings::from_toml_str(contents).unwrap_err();
		assert!(matches!(err, RouterError::Settings(_)));
	}

	#[rstest]
	fn test_from_json() {
		let settings =
			RouterSettings::from_json_str(r#"{ "mode": "abstract", "fallback": false }"#).unwrap();
		assert_eq!(settings.mode, RouterMode::Abstract);
		assert!(!settings.fallback);
	}

	#[rstest]
	fn test_options_shortcuts() {
		let options = RouterOptions::new()
			.mode(RouterMode::History)
			.base("/app")
			.fallback(false);
		assert_eq!(options.settings.mode, RouterMode::History);
		assert_eq!(options.settings.base.as_deref(), Some("/app"));
		assert!(!options.settings.fallback);
	}
}
