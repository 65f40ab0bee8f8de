//! Wayfinder Router - client-side navigation pipeline
//!
//! Maps URLs to nested route records, runs navigation guards and keeps the
//! browser URL (or an in-memory stack) in sync with the current route.
//!
//! ## Architecture
//!
//! - [`pattern`]: path patterns (`/users/:id(\d+)?`, `*`) compiled to regexes
//! - [`map`]: route configs flattened into records with path and name lookup
//! - [`matcher`]: locations resolved to routes, following redirects and aliases
//! - [`guard`]: navigation guards and the `next` continuation
//! - [`component`]: components, in-component guards and lazy components
//! - [`history`]: hash, HTML5 and abstract history back-ends
//! - [`router`]: the [`Router`] facade tying everything together
//!
//! The router is single-threaded: it is built on `Rc` and `RefCell` and is
//! meant to run on the UI thread (or on the `wasm32` main thread).
//!
//! ## Example
//!
//! ```
//! use wayfinder_router::{Component, RouteConfig, Router, RouterOptions};
//!
//! let router = Router::new(RouterOptions::new().routes(vec![
//! 	RouteConfig::new("/parent")
//! 		.component(Component::named("Parent"))
//! 		.child(RouteConfig::new("child").component(Component::named("Child"))),
//! ]))
//! .unwrap();
//!
//! router.before_each(|to, _from, next| {
//! 	if to.path == "/parent/forbidden" {
//! 		next.abort();
//! 	} else {
//! 		next.proceed();
//! 	}
//! 	Ok(())
//! });
//!
//! let route = futures::executor::block_on(router.push("/parent/child")).unwrap();
//! assert_eq!(route.matched.len(), 2);
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod guard;
pub mod history;
pub mod location;
mod logging;
pub mod map;
pub mod matcher;
mod pipeline;
pub mod pattern;
pub mod query;
pub mod record;
pub mod route;
pub mod router;
pub mod settings;
mod transition;

pub use component::{
	AsyncComponent, Component, ComponentInstance, ComponentResolver, ComponentSlot, Spawner,
};
pub use config::{DEFAULT_OUTLET, Redirect, RouteConfig, RouteProps};
pub use error::{
	NavigationError, NavigationFailure, NavigationFailureKind, PatternError, RouterError,
	is_navigation_failure,
};
pub use guard::{
	AfterHook, ComponentGuard, GuardResult, NavigationGuard, Next, NextAction, PostEnterCallback,
	Unregister,
};
#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub use history::{WasmSpawner, WebBrowser};
pub use history::{Browser, BrowserEvent, ListenerHandle, SimulatedBrowser};
pub use location::{Location, Params, RawLocation};
pub use map::RouteMap;
pub use matcher::{MAX_REDIRECT_DEPTH, Matcher};
pub use pattern::{PathPattern, PatternKey, PatternOptions};
pub use query::{Query, QueryCodec, QueryValue};
pub use record::RouteRecord;
pub use route::{Route, is_same_route, start_route};
pub use router::{ErrorHook, Navigation, NavigationResult, Resolved, Router};
pub use settings::{RouterMode, RouterOptions, RouterSettings};
