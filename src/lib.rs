//! # Wayfinder
//!
//! A client-side router with nested routes, navigation guards and pluggable
//! history back-ends.
//!
//! ## Core Principles
//!
//! - **Nested routes**: a route matches a chain of records, one per outlet level
//! - **Guards as functions**: every guard receives `(to, from, next)` and settles
//!   the navigation step through `next`
//! - **Latest navigation wins**: a newer navigation cancels any older one still
//!   running its guards
//! - **Host-driven rendering**: the router tells the host what changed; the host
//!   renders and registers component instances
//!
//! ## Feature Flags
//!
//! - `web` - browser bindings (`WebBrowser`, `WasmSpawner`) on `wasm32` targets
//!
//! ## Quick Example
//!
//! ```
//! use wayfinder::prelude::*;
//!
//! let router = Router::new(
//! 	RouterOptions::new()
//! 		.route(RouteConfig::new("/").component(Component::named("Home")))
//! 		.route(RouteConfig::new("/about").component(Component::named("About")))
//! 		.route(RouteConfig::new("*").component(Component::named("NotFound"))),
//! )
//! .unwrap();
//!
//! let visits = std::rc::Rc::new(std::cell::Cell::new(0));
//! let counter = visits.clone();
//! router.after_each(move |_to, _from| counter.set(counter.get() + 1));
//!
//! let route = futures::executor::block_on(router.push("/missing")).unwrap();
//! assert_eq!(route.params["pathMatch"], "/missing");
//! assert_eq!(visits.get(), 1);
//! ```

pub use wayfinder_router::*;

/// Commonly used types.
pub mod prelude {
	pub use wayfinder_router::{
		AsyncComponent, Component, ComponentInstance, Location, NavigationError,
		NavigationFailureKind, Next, RawLocation, Route, RouteConfig, Router, RouterError,
		RouterMode, RouterOptions, RouterSettings, SimulatedBrowser, is_navigation_failure,
	};
}
