//! The router facade.
//!
//! A [`Router`] owns the matcher, the global hooks, the history back-end and
//! the navigation state. It is a cheap handle: clones share one router.
//!
//! ## Example
//!
//! ```
//! use wayfinder_router::{Component, RouteConfig, Router, RouterOptions};
//!
//! let router = Router::new(
//! 	RouterOptions::new()
//! 		.route(RouteConfig::new("/").component(Component::named("Home")))
//! 		.route(RouteConfig::new("/users/:id").name("user").component(Component::named("User"))),
//! )
//! .unwrap();
//!
//! router.push_with("/users/7", |route| assert_eq!(route.params["id"], "7"), |_| {});
//! assert_eq!(router.current_route().full_path, "/users/7");
//! ```

use crate::component::{ComponentInstance, ComponentSlot, Spawner};
use crate::config::RouteConfig;
use crate::error::{NavigationError, RouterError};
use crate::guard::{AfterHook, GuardResult, HookList, Latch, NavigationGuard, Next, Unregister};
use crate::history::{
	AbortFn, AbstractHistory, Browser, CompleteFn, HashHistory, HistoryBackend, Html5History,
	create_href, normalize_base,
};
use crate::location::{Location, RawLocation, normalize_location};
use crate::matcher::Matcher;
use crate::query::QueryCodec;
use crate::record::RouteRecord;
use crate::route::{Route, is_start_route};
use crate::settings::{RouterMode, RouterOptions, RouterSettings};
use crate::transition::TransitionState;
use futures::FutureExt;
use futures::channel::oneshot;
use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

/// Outcome of a navigation.
pub type NavigationResult = Result<Rc<Route>, NavigationError>;

/// A subscriber to navigation errors.
pub type ErrorHook = Rc<dyn Fn(&RouterError)>;

pub(crate) struct RouterInner {
	pub(crate) matcher: Matcher,
	pub(crate) settings: RouterSettings,
	pub(crate) base: String,
	pub(crate) browser: Option<Rc<dyn Browser>>,
	pub(crate) spawner: Option<Spawner>,
	pub(crate) history: Box<dyn HistoryBackend>,
	pub(crate) state: TransitionState,
	pub(crate) before_hooks: HookList<NavigationGuard>,
	pub(crate) resolve_hooks: HookList<NavigationGuard>,
	pub(crate) after_hooks: HookList<AfterHook>,
	pub(crate) error_hooks: HookList<ErrorHook>,
	initialized: Cell<bool>,
}

/// A client-side router.
#[derive(Clone)]
pub struct Router {
	pub(crate) inner: Rc<RouterInner>,
}

/// A router reference that does not keep the router alive; held by browser
/// event handlers.
#[derive(Clone)]
pub(crate) struct WeakRouter {
	inner: Weak<RouterInner>,
}

impl WeakRouter {
	pub(crate) fn upgrade(&self) -> Option<Router> {
		self.inner.upgrade().map(|inner| Router { inner })
	}
}

/// A started navigation; resolves to its outcome.
///
/// Dropping it does not cancel the navigation.
#[derive(Debug)]
pub struct Navigation {
	receiver: oneshot::Receiver<NavigationResult>,
}

impl Future for Navigation {
	type Output = NavigationResult;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.receiver
			.poll_unpin(cx)
			.map(|result| result.unwrap_or(Err(NavigationError::Other(RouterError::Dropped))))
	}
}

/// Result of [`Router::resolve`].
#[derive(Debug, Clone)]
pub struct Resolved {
	/// The normalized target.
	pub location: Location,
	/// The matched route.
	pub route: Rc<Route>,
	/// Href for the target, honoring mode and base.
	pub href: String,
	/// Same as `location`.
	pub normalized_to: Location,
	/// Same as `route`.
	pub resolved: Rc<Route>,
}

impl Router {
	/// Builds a router.
	///
	/// The requested mode is downgraded to hash mode when the History API is
	/// unavailable and `fallback` is on, and to abstract mode when no browser
	/// is configured.
	///
	/// # Errors
	///
	/// Returns [`RouterError::Pattern`] if a route path does not compile.
	pub fn new(options: RouterOptions) -> Result<Self, RouterError> {
		let RouterOptions {
			settings,
			routes,
			browser,
			spawner,
			parse_query,
			stringify_query,
		} = options;

		let matcher = Matcher::new(&routes, QueryCodec::new(parse_query, stringify_query))?;

		let fallback = settings.mode == RouterMode::History
			&& settings.fallback
			&& browser
				.as_ref()
				.is_some_and(|browser| !browser.supports_push_state());
		let base = normalize_base(settings.base.as_deref(), browser.as_deref());
		let history: Box<dyn HistoryBackend> = match &browser {
			None => Box::new(AbstractHistory::default()),
			Some(browser) if fallback => Box::new(HashHistory::new(Rc::clone(browser), &base, true)),
			Some(browser) => match settings.mode {
				RouterMode::Hash => Box::new(HashHistory::new(Rc::clone(browser), &base, false)),
				RouterMode::History => Box::new(Html5History::new(Rc::clone(browser), base.clone())),
				RouterMode::Abstract => Box::new(AbstractHistory::default()),
			},
		};
		tracing::debug!(mode = %history.kind(), base = %base, "router created");

		Ok(Self {
			inner: Rc::new(RouterInner {
				matcher,
				settings,
				base,
				browser,
				spawner,
				history,
				state: TransitionState::default(),
				before_hooks: HookList::default(),
				resolve_hooks: HookList::default(),
				after_hooks: HookList::default(),
				error_hooks: HookList::default(),
				initialized: Cell::new(false),
			}),
		})
	}

	/// The history mode in effect.
	pub fn mode(&self) -> RouterMode {
		self.inner.history.kind()
	}

	/// The normalized base path (`""` or `/…`).
	pub fn base(&self) -> &str {
		&self.inner.base
	}

	/// The settings the router was built with.
	pub fn settings(&self) -> &RouterSettings {
		&self.inner.settings
	}

	/// The committed route.
	pub fn current_route(&self) -> Rc<Route> {
		self.state().current()
	}

	/// The location the history back-end points at.
	pub fn current_location(&self) -> String {
		self.history().current_location()
	}

	/// Returns `true` once the initial navigation settled.
	pub fn is_ready(&self) -> bool {
		self.state().is_ready()
	}

	/// Matches `raw` against the route map, relative to `current` (default:
	/// the current route).
	///
	/// # Errors
	///
	/// Returns [`RouterError::RedirectLimit`] when redirects do not settle.
	pub fn match_location(
		&self,
		raw: impl Into<RawLocation>,
		current: Option<&Route>,
	) -> Result<Route, RouterError> {
		let fallback = self.current_route();
		let current = current.unwrap_or(&*fallback);
		self.inner.matcher.match_location(&raw.into(), Some(current), None)
	}

	/// Resolves `to` without navigating.
	///
	/// # Errors
	///
	/// Returns [`RouterError::RedirectLimit`] when redirects do not settle.
	pub fn resolve(
		&self,
		to: impl Into<RawLocation>,
		current: Option<&Route>,
		append: bool,
	) -> Result<Resolved, RouterError> {
		let fallback = self.current_route();
		let current = current.unwrap_or(&*fallback);
		let location = normalize_location(
			&to.into(),
			Some(current),
			append,
			self.inner.matcher.codec(),
		);
		let route = Rc::new(self.inner.matcher.match_location(
			&RawLocation::Structured(location.clone()),
			Some(current),
			None,
		)?);
		let full_path = route.redirected_from.as_deref().unwrap_or(&route.full_path);
		let href = create_href(&self.inner.base, full_path, self.mode());
		Ok(Resolved {
			normalized_to: location.clone(),
			location,
			resolved: Rc::clone(&route),
			route,
			href,
		})
	}

	/// Navigates to `to`, adding a history entry.
	///
	/// The navigation starts immediately; the returned future reports how
	/// it ended.
	pub fn push(&self, to: impl Into<RawLocation>) -> Navigation {
		self.navigate(to.into(), false)
	}

	/// Navigates to `to`, replacing the current history entry.
	pub fn replace(&self, to: impl Into<RawLocation>) -> Navigation {
		self.navigate(to.into(), true)
	}

	/// Callback form of [`push`](Self::push).
	pub fn push_with<C, A>(&self, to: impl Into<RawLocation>, on_complete: C, on_abort: A)
	where
		C: FnOnce(&Rc<Route>) + 'static,
		A: FnOnce(NavigationError) + 'static,
	{
		self.history()
			.push(self, to.into(), Some(Box::new(on_complete)), Some(Box::new(on_abort)));
	}

	/// Callback form of [`replace`](Self::replace).
	pub fn replace_with<C, A>(&self, to: impl Into<RawLocation>, on_complete: C, on_abort: A)
	where
		C: FnOnce(&Rc<Route>) + 'static,
		A: FnOnce(NavigationError) + 'static,
	{
		self.history()
			.replace(self, to.into(), Some(Box::new(on_complete)), Some(Box::new(on_abort)));
	}

	fn navigate(&self, to: RawLocation, replace: bool) -> Navigation {
		let (sender, receiver) = oneshot::channel();
		let settle = Latch::new(move |result: NavigationResult| {
			let _ = sender.send(result);
		});
		let complete = settle.clone();
		let on_complete: CompleteFn = Box::new(move |route: &Rc<Route>| {
			complete.fire(Ok(Rc::clone(route)));
		});
		let on_abort: AbortFn = Box::new(move |err: NavigationError| {
			settle.fire(Err(err));
		});

		if replace {
			self.history().replace(self, to, Some(on_complete), Some(on_abort));
		} else {
			self.history().push(self, to, Some(on_complete), Some(on_abort));
		}

		Navigation { receiver }
	}

	/// Moves `n` entries through history.
	pub fn go(&self, n: i32) {
		self.history().go(self, n);
	}

	/// Same as `go(-1)`.
	pub fn back(&self) {
		self.go(-1);
	}

	/// Same as `go(1)`.
	pub fn forward(&self) {
		self.go(1);
	}

	/// Registers a guard run before every navigation.
	pub fn before_each<F>(&self, guard: F) -> Unregister
	where
		F: Fn(&Route, &Route, Next) -> GuardResult + 'static,
	{
		self.inner.before_hooks.register(Rc::new(guard))
	}

	/// Registers a guard run after in-component enter guards and async
	/// components resolved.
	pub fn before_resolve<F>(&self, guard: F) -> Unregister
	where
		F: Fn(&Route, &Route, Next) -> GuardResult + 'static,
	{
		self.inner.resolve_hooks.register(Rc::new(guard))
	}

	/// Registers a hook run after every confirmed navigation with `(to, from)`.
	pub fn after_each<F>(&self, hook: F) -> Unregister
	where
		F: Fn(&Route, &Route) + 'static,
	{
		self.inner.after_hooks.register(Rc::new(hook))
	}

	/// Subscribes to navigation errors. Navigation failures are never
	/// reported here.
	pub fn on_error<F>(&self, callback: F) -> Unregister
	where
		F: Fn(&RouterError) + 'static,
	{
		self.inner.error_hooks.register(Rc::new(callback))
	}

	/// Runs `callback` once the initial navigation committed, immediately if
	/// it already did.
	pub fn on_ready<F>(&self, callback: F)
	where
		F: FnOnce(&Rc<Route>) + 'static,
	{
		if self.is_ready() {
			callback(&self.current_route());
		} else {
			self.state().add_ready_callbacks(Box::new(callback), None);
		}
	}

	/// Like [`on_ready`](Self::on_ready), with `on_error` called instead if
	/// the initial navigation fails.
	pub fn on_ready_or_error<F, E>(&self, callback: F, on_error: E)
	where
		F: FnOnce(&Rc<Route>) + 'static,
		E: FnOnce(&NavigationError) + 'static,
	{
		if self.is_ready() {
			callback(&self.current_route());
		} else {
			self.state()
				.add_ready_callbacks(Box::new(callback), Some(Box::new(on_error)));
		}
	}

	/// Sets the listener told about every committed route. It replaces any
	/// previous listener.
	pub fn listen<F>(&self, listener: F)
	where
		F: Fn(&Rc<Route>) + 'static,
	{
		self.state().set_change_listener(Rc::new(listener));
	}

	/// Adds routes, then re-runs the navigation to the current location when
	/// the router has already navigated.
	///
	/// # Errors
	///
	/// Returns [`RouterError::Pattern`] if a route path does not compile; no
	/// route is added in that case.
	pub fn add_routes(&self, routes: Vec<RouteConfig>) -> Result<(), RouterError> {
		self.inner.matcher.add_routes(&routes)?;
		if !is_start_route(&self.current_route()) {
			let location = self.current_location();
			self.transition_to(RawLocation::Path(location), None, None);
		}
		Ok(())
	}

	/// Components of `to` (or of the current route), root first.
	///
	/// # Errors
	///
	/// Returns [`RouterError::RedirectLimit`] when `to` does not resolve.
	pub fn matched_components(
		&self,
		to: Option<RawLocation>,
	) -> Result<Vec<ComponentSlot>, RouterError> {
		let route = match to {
			Some(to) => self.resolve(to, None, false)?.route,
			None => self.current_route(),
		};
		Ok(route.matched_components())
	}

	/// Performs the initial navigation and starts listening to the browser.
	///
	/// Only the first call has an effect until [`teardown`](Self::teardown).
	/// In abstract mode nothing happens: the host navigates explicitly.
	pub fn init(&self) {
		if self.inner.initialized.replace(true) || self.mode() == RouterMode::Abstract {
			return;
		}
		let location = self.current_location();
		let on_complete = self.clone();
		let on_abort = self.clone();
		self.transition_to(
			RawLocation::Path(location),
			Some(Box::new(move |_route: &Rc<Route>| {
				on_complete.history().setup_listeners(&on_complete);
			})),
			Some(Box::new(move |_err: NavigationError| {
				on_abort.history().setup_listeners(&on_abort);
			})),
		);
	}

	/// Registers the live instance rendered for `outlet` of `record`, then
	/// flushes post-enter callbacks.
	pub fn register_instance(
		&self,
		record: &Rc<RouteRecord>,
		outlet: &str,
		instance: Rc<ComponentInstance>,
	) {
		record.set_instance(outlet, instance);
		self.flush_post_enter();
	}

	/// Unregisters `instance` from `outlet` of `record`; another instance
	/// registered since is left alone. Returns `true` if it was removed.
	pub fn unregister_instance(
		&self,
		record: &Rc<RouteRecord>,
		outlet: &str,
		instance: &Rc<ComponentInstance>,
	) -> bool {
		record.remove_instance(outlet, instance)
	}

	/// Runs queued post-enter callbacks whose instance is now available.
	/// Hosts call this after rendering a committed route.
	pub fn flush_post_enter_callbacks(&self) {
		self.flush_post_enter();
	}

	/// Number of post-enter callbacks still waiting for their instance.
	pub fn pending_post_enter_callbacks(&self) -> usize {
		self.state().pending_post_enter()
	}

	/// Removes browser listeners and resets the current route to the start
	/// route.
	pub fn teardown(&self) {
		self.teardown_state();
		self.inner.initialized.set(false);
		tracing::debug!("router torn down");
	}

	pub(crate) fn state(&self) -> &TransitionState {
		&self.inner.state
	}

	pub(crate) fn history(&self) -> &dyn HistoryBackend {
		&*self.inner.history
	}

	pub(crate) fn browser(&self) -> Option<Rc<dyn Browser>> {
		self.inner.browser.clone()
	}

	pub(crate) fn downgrade(&self) -> WeakRouter {
		WeakRouter {
			inner: Rc::downgrade(&self.inner),
		}
	}
}

impl fmt::Debug for Router {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Router")
			.field("mode", &self.mode())
			.field("base", &self.inner.base)
			.field("records", &self.inner.matcher.map().len())
			.field("before_hooks", &self.inner.before_hooks.len())
			.field("after_hooks", &self.inner.after_hooks.len())
			.field("current", &self.current_route().full_path)
			.field("ready", &self.is_ready())
			.finish()
	}
}
