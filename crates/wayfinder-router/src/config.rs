//! User-facing route declarations.

use crate::component::ComponentSlot;
use crate::guard::{GuardResult, NavigationGuard, Next};
use crate::location::{Location, RawLocation};
use crate::pattern::PatternOptions;
use crate::route::Route;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Outlet used by [`RouteConfig::component`].
pub const DEFAULT_OUTLET: &str = "default";

/// Where a route redirects to.
#[derive(Clone)]
pub enum Redirect {
	/// A fixed target; relative paths resolve against the parent record.
	To(RawLocation),
	/// A target computed from the matched route; `None` leaves the route
	/// unmatched.
	Dynamic(Rc<dyn Fn(&Route) -> Option<RawLocation>>),
}

impl fmt::Debug for Redirect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::To(target) => f.debug_tuple("To").field(target).finish(),
			Self::Dynamic(_) => write!(f, "Dynamic(..)"),
		}
	}
}

impl From<&str> for Redirect {
	fn from(path: &str) -> Self {
		Self::To(path.into())
	}
}

impl From<String> for Redirect {
	fn from(path: String) -> Self {
		Self::To(path.into())
	}
}

impl From<Location> for Redirect {
	fn from(location: Location) -> Self {
		Self::To(location.into())
	}
}

impl From<RawLocation> for Redirect {
	fn from(target: RawLocation) -> Self {
		Self::To(target)
	}
}

/// How a route passes props to its component.
#[derive(Clone)]
pub enum RouteProps {
	/// Route params become props.
	Params,
	/// Fixed props.
	Static(Value),
	/// Props computed from the route.
	Dynamic(Rc<dyn Fn(&Route) -> Value>),
}

impl RouteProps {
	/// Computes the props for `route`.
	pub fn resolve(&self, route: &Route) -> Value {
		match self {
			Self::Params => Value::Object(
				route
					.params
					.iter()
					.map(|(key, value)| (key.clone(), Value::String(value.clone())))
					.collect(),
			),
			Self::Static(value) => value.clone(),
			Self::Dynamic(props) => props(route),
		}
	}
}

impl fmt::Debug for RouteProps {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Params => write!(f, "Params"),
			Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
			Self::Dynamic(_) => write!(f, "Dynamic(..)"),
		}
	}
}

/// A route declaration.
///
/// # Examples
///
/// ```
/// use wayfinder_router::{Component, RouteConfig};
///
/// let routes = vec![
/// 	RouteConfig::new("/users/:id")
/// 		.name("user")
/// 		.component(Component::named("User"))
/// 		.children(vec![RouteConfig::new("posts").component(Component::named("Posts"))]),
/// 	RouteConfig::new("/home").alias("/"),
/// ];
/// assert_eq!(routes.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct RouteConfig {
	pub(crate) path: String,
	pub(crate) name: Option<String>,
	pub(crate) components: IndexMap<String, ComponentSlot>,
	pub(crate) children: Vec<RouteConfig>,
	pub(crate) redirect: Option<Redirect>,
	pub(crate) alias: Vec<String>,
	pub(crate) before_enter: Option<NavigationGuard>,
	pub(crate) meta: Option<Value>,
	pub(crate) props: IndexMap<String, RouteProps>,
	pub(crate) case_sensitive: Option<bool>,
	pub(crate) path_options: Option<PatternOptions>,
}

impl RouteConfig {
	/// Declares a route for `path`.
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			..Self::default()
		}
	}

	/// Names the route.
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Sets the component of the default outlet.
	pub fn component(self, component: impl Into<ComponentSlot>) -> Self {
		self.outlet(DEFAULT_OUTLET, component)
	}

	/// Sets the component of a named outlet.
	pub fn outlet(mut self, outlet: impl Into<String>, component: impl Into<ComponentSlot>) -> Self {
		self.components.insert(outlet.into(), component.into());
		self
	}

	/// Sets the nested routes.
	pub fn children(mut self, children: Vec<RouteConfig>) -> Self {
		self.children = children;
		self
	}

	/// Adds one nested route.
	pub fn child(mut self, child: RouteConfig) -> Self {
		self.children.push(child);
		self
	}

	/// Redirects to a fixed target.
	pub fn redirect(mut self, target: impl Into<Redirect>) -> Self {
		self.redirect = Some(target.into());
		self
	}

	/// Redirects to a target computed from the matched route.
	pub fn redirect_with<F>(mut self, target: F) -> Self
	where
		F: Fn(&Route) -> Option<RawLocation> + 'static,
	{
		self.redirect = Some(Redirect::Dynamic(Rc::new(target)));
		self
	}

	/// Adds an alias path.
	pub fn alias(mut self, alias: impl Into<String>) -> Self {
		self.alias.push(alias.into());
		self
	}

	/// Adds a guard run when the route is entered.
	pub fn before_enter<F>(mut self, guard: F) -> Self
	where
		F: Fn(&Route, &Route, Next) -> GuardResult + 'static,
	{
		self.before_enter = Some(Rc::new(guard));
		self
	}

	/// Attaches arbitrary metadata.
	pub fn meta(mut self, meta: Value) -> Self {
		self.meta = Some(meta);
		self
	}

	/// Sets the props of the default outlet.
	pub fn props(self, props: RouteProps) -> Self {
		self.outlet_props(DEFAULT_OUTLET, props)
	}

	/// Sets the props of a named outlet.
	pub fn outlet_props(mut self, outlet: impl Into<String>, props: RouteProps) -> Self {
		self.props.insert(outlet.into(), props);
		self
	}

	/// Matches the path case-sensitively.
	pub fn case_sensitive(mut self, sensitive: bool) -> Self {
		self.case_sensitive = Some(sensitive);
		self
	}

	/// Overrides the pattern compilation options.
	pub fn path_options(mut self, options: PatternOptions) -> Self {
		self.path_options = Some(options);
		self
	}

	/// Returns the declared path.
	pub fn path(&self) -> &str {
		&self.path
	}
}

impl fmt::Debug for RouteConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteConfig")
			.field("path", &self.path)
			.field("name", &self.name)
			.field("components", &self.components)
			.field("children", &self.children)
			.field("redirect", &self.redirect)
			.field("alias", &self.alias)
			.field("before_enter", &self.before_enter.is_some())
			.field("meta", &self.meta)
			.field("props", &self.props)
			.field("case_sensitive", &self.case_sensitive)
			.field("path_options", &self.path_options)
			.finish()
	}
}
