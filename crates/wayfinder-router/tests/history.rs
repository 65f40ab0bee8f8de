//! History back-end integration tests
//!
//! Success Criteria:
//! 1. Hash mode keeps the route after `#/` and follows popstate/hashchange
//! 2. HTML5 mode keeps the route below `base` and restores the URL on abort
//! 3. Abstract mode keeps its own stack with clamped `go`
//! 4. Listeners are installed once by `init` and removed by `teardown`
//!
//! Browser behavior is simulated with [`SimulatedBrowser`]; queued events are
//! delivered by `dispatch_events`.

use futures::executor::block_on;
use rstest::*;
use std::cell::RefCell;
use std::rc::Rc;
use wayfinder_router::{
	Component, NavigationFailureKind, RouteConfig, Router, RouterError, RouterMode, RouterOptions,
	SimulatedBrowser,
};

// ============================================================================
// Fixtures
// ============================================================================

#[fixture]
fn routes() -> Vec<RouteConfig> {
	vec![
		RouteConfig::new("/").component(Component::named("Home")),
		RouteConfig::new("/a").component(Component::named("A")),
		RouteConfig::new("/b").component(Component::named("B")),
		RouteConfig::new("/users/:id").component(Component::named("User")),
	]
}

fn browser_router(
	url: &str,
	mode: RouterMode,
	base: &str,
	routes: Vec<RouteConfig>,
	configure: impl FnOnce(SimulatedBrowser) -> SimulatedBrowser,
) -> (Router, Rc<SimulatedBrowser>) {
	let browser = Rc::new(configure(SimulatedBrowser::new(url)));
	let router = Router::new(
		RouterOptions::new()
			.routes(routes)
			.mode(mode)
			.base(base)
			.browser(browser.clone()),
	)
	.unwrap();
	(router, browser)
}

// ============================================================================
// Hash Mode
// ============================================================================

/// Tests that init matches the hash and installs one popstate listener
#[rstest]
fn test_hash_init_and_push(routes: Vec<RouteConfig>) {
	let (router, browser) = browser_router("/", RouterMode::Hash, "", routes, |b| b);
	assert_eq!(browser.url(), "/#/");

	router.init();
	router.init();
	assert_eq!(router.current_route().path, "/");
	assert_eq!(browser.listener_count(), 1);

	block_on(router.push("/users/1?tab=posts")).unwrap();
	assert_eq!(browser.url(), "/#/users/1?tab=posts");
	assert_eq!(browser.history_len(), 2);

	block_on(router.replace("/a")).unwrap();
	assert_eq!(browser.url(), "/#/a");
	assert_eq!(browser.history_len(), 2);
}

/// Tests that back navigation through popstate re-matches the hash
#[rstest]
fn test_hash_back_follows_popstate(routes: Vec<RouteConfig>) {
	let (router, browser) = browser_router("/#/a", RouterMode::Hash, "", routes, |b| b);
	router.init();
	block_on(router.push("/b")).unwrap();

	router.back();
	assert_eq!(router.current_route().path, "/b");
	browser.dispatch_events();

	assert_eq!(router.current_route().path, "/a");
	assert_eq!(browser.url(), "/#/a");
}

/// Tests that following a hash link navigates
#[rstest]
fn test_hash_link_navigates(routes: Vec<RouteConfig>) {
	let (router, browser) = browser_router("/#/a", RouterMode::Hash, "", routes, |b| b);
	router.init();

	browser.visit("#/users/7");
	browser.dispatch_events();

	let route = router.current_route();
	assert_eq!(route.path, "/users/7");
	assert_eq!(route.params["id"], "7");
}

/// Tests hash mode on a browser without the History API
#[rstest]
fn test_hash_without_push_state(routes: Vec<RouteConfig>) {
	let (router, browser) = browser_router(
		"/#/",
		RouterMode::Hash,
		"",
		routes,
		SimulatedBrowser::without_push_state,
	);
	router.init();
	assert_eq!(browser.listener_count(), 1);

	block_on(router.push("/a")).unwrap();
	assert_eq!(browser.url(), "/#/a");
	assert_eq!(browser.history_len(), 2);
	browser.dispatch_events();
	assert_eq!(router.current_route().path, "/a");

	browser.visit("#/b");
	browser.dispatch_events();
	assert_eq!(router.current_route().path, "/b");
}

/// Tests that a hash without a leading slash is corrected before matching
#[rstest]
fn test_hash_without_slash_is_corrected(routes: Vec<RouteConfig>) {
	let (router, browser) = browser_router("/#/a", RouterMode::Hash, "", routes, |b| b);
	router.init();

	browser.visit("#b");
	browser.dispatch_events();

	assert_eq!(browser.url(), "/#/b");
	assert_eq!(browser.history_len(), 2);
}

// ============================================================================
// HTML5 Mode
// ============================================================================

/// Tests that the route is read below the base and pushed back under it
#[rstest]
fn test_html5_base_handling(routes: Vec<RouteConfig>) {
	let (router, browser) =
		browser_router("/app/users/1", RouterMode::History, "/app/", routes, |b| b);
	assert_eq!(router.base(), "/app");

	router.init();
	assert_eq!(router.current_route().params["id"], "1");
	assert_eq!(browser.history_len(), 1);

	block_on(router.push("/a#top")).unwrap();
	assert_eq!(browser.url(), "/app/a#top");
	assert_eq!(router.resolve("/b", None, false).unwrap().href, "/app/b");

	router.back();
	browser.dispatch_events();
	assert_eq!(router.current_route().path, "/users/1");
}

/// Tests that an aborted popstate navigation restores the URL
#[rstest]
fn test_html5_abort_restores_url(routes: Vec<RouteConfig>) {
	let (router, browser) = browser_router("/app/a", RouterMode::History, "/app", routes, |b| b);
	router.init();
	block_on(router.push("/b")).unwrap();
	router.before_each(|to, _from, next| {
		if to.path == "/a" {
			next.abort();
		} else {
			next.proceed();
		}
		Ok(())
	});

	router.back();
	assert_eq!(browser.url(), "/app/a");
	browser.dispatch_events();

	assert_eq!(router.current_route().path, "/b");
	assert_eq!(browser.url(), "/app/b");
	assert_eq!(browser.history_len(), 2);
}

/// Tests that returning to the start location is ignored until a route committed
#[rstest]
fn test_html5_ignores_start_location_popstate(routes: Vec<RouteConfig>) {
	let (router, browser) = browser_router("/app/a", RouterMode::History, "/app", routes, |b| b);
	let blocked = Rc::new(RefCell::new(true));
	let gate = blocked.clone();
	router.before_each(move |_to, _from, next| {
		if *gate.borrow() {
			next.abort();
		} else {
			next.proceed();
		}
		Ok(())
	});

	router.init();
	assert!(!router.current_route().is_matched());
	assert_eq!(browser.url(), "/app/");
	assert_eq!(browser.listener_count(), 1);
	*blocked.borrow_mut() = false;

	router.back();
	browser.dispatch_events();
	assert_eq!(browser.url(), "/app/a");
	assert!(!router.current_route().is_matched());

	browser.visit("/app/a#later");
	browser.dispatch_events();
	assert_eq!(router.current_route().full_path, "/a#later");
}

/// Tests that history mode falls back to hash mode without the History API
#[rstest]
fn test_history_falls_back_to_hash(routes: Vec<RouteConfig>) {
	let (router, browser) = browser_router(
		"/app/users/3",
		RouterMode::History,
		"/app",
		routes,
		SimulatedBrowser::without_push_state,
	);

	assert_eq!(router.mode(), RouterMode::Hash);
	assert_eq!(browser.url(), "/app/#/users/3");
	assert_eq!(browser.reloads(), 1);

	router.init();
	assert_eq!(router.current_route().params["id"], "3");
}

// ============================================================================
// Abstract Mode
// ============================================================================

fn abstract_router(routes: Vec<RouteConfig>) -> Router {
	Router::new(RouterOptions::new().routes(routes).mode(RouterMode::Abstract)).unwrap()
}

fn current_path(router: &Router) -> String {
	router.current_route().path.clone()
}

/// Tests the abstract stack under push, go, replace and truncation
#[rstest]
fn test_abstract_stack(routes: Vec<RouteConfig>) {
	let router = abstract_router(routes);
	assert_eq!(router.current_location(), "/");
	for path in ["/a", "/b", "/users/1"] {
		block_on(router.push(path)).unwrap();
	}

	router.back();
	assert_eq!(current_path(&router), "/b");
	assert_eq!(router.current_location(), "/b");

	router.go(-5);
	assert_eq!(current_path(&router), "/a");

	router.go(10);
	assert_eq!(current_path(&router), "/users/1");

	block_on(router.replace("/users/2")).unwrap();
	router.back();
	assert_eq!(current_path(&router), "/b");
	router.forward();
	assert_eq!(current_path(&router), "/users/2");

	router.go(-2);
	block_on(router.push("/users/9")).unwrap();
	router.forward();
	assert_eq!(current_path(&router), "/users/9");
	router.back();
	assert_eq!(current_path(&router), "/a");
}

/// Tests that `go` runs guards and after hooks
#[rstest]
fn test_abstract_go_runs_guards(routes: Vec<RouteConfig>) {
	let router = abstract_router(routes);
	block_on(router.push("/a")).unwrap();
	block_on(router.push("/b")).unwrap();

	let after = Rc::new(RefCell::new(Vec::new()));
	let seen = after.clone();
	router.after_each(move |to, from| {
		seen.borrow_mut().push(format!("{} <- {}", to.path, from.path));
	});
	let handle = router.before_each(|_to, _from, next| {
		next.abort();
		Ok(())
	});

	router.back();
	assert_eq!(current_path(&router), "/b");
	assert!(after.borrow().is_empty());

	handle.unregister();
	router.back();
	assert_eq!(current_path(&router), "/a");
	assert_eq!(after.take(), vec!["/a <- /b"]);
}

/// Tests that duplicated failures in abstract mode are reported to the caller
#[rstest]
fn test_abstract_duplicate(routes: Vec<RouteConfig>) {
	let router = abstract_router(routes);
	block_on(router.push("/a")).unwrap();

	let err = block_on(router.push("/a")).unwrap_err();

	assert_eq!(
		err.failure().map(|failure| failure.kind()),
		Some(NavigationFailureKind::Duplicated)
	);
	assert_eq!(router.current_location(), "/a");
}

// ============================================================================
// Teardown
// ============================================================================

/// Tests that teardown removes listeners and resets the current route
#[rstest]
fn test_teardown(routes: Vec<RouteConfig>) {
	let (router, browser) = browser_router("/#/a", RouterMode::Hash, "", routes, |b| b);
	router.init();
	assert_eq!(browser.listener_count(), 1);

	router.teardown();
	assert_eq!(browser.listener_count(), 0);
	assert!(!router.current_route().is_matched());

	browser.visit("#/b");
	browser.dispatch_events();
	assert!(!router.current_route().is_matched());

	router.init();
	assert_eq!(router.current_route().path, "/b");
	assert_eq!(browser.listener_count(), 1);
}

/// Tests that dropping the router detaches its browser listener callbacks
#[rstest]
fn test_dropped_router_ignores_events(routes: Vec<RouteConfig>) {
	let (router, browser) = browser_router("/#/a", RouterMode::Hash, "", routes, |b| b);
	router.init();
	drop(router);

	browser.visit("#/b");
	assert_eq!(browser.dispatch_events(), 2);
}

/// Tests that a listener the browser refuses is reported to `on_error`
#[rstest]
#[case::hash(RouterMode::Hash, "/#/a")]
#[case::history(RouterMode::History, "/a")]
fn test_listener_failure_is_reported(
	routes: Vec<RouteConfig>,
	#[case] mode: RouterMode,
	#[case] url: &str,
) {
	let (router, browser) =
		browser_router(url, mode, "", routes, SimulatedBrowser::without_listeners);
	let errors = Rc::new(RefCell::new(Vec::new()));
	let sink = errors.clone();
	router.on_error(move |err| sink.borrow_mut().push(err.clone()));

	router.init();

	assert_eq!(router.current_route().path, "/a");
	assert_eq!(browser.listener_count(), 0);
	assert_eq!(
		*errors.borrow(),
		vec![RouterError::Browser(
			"addEventListener(\"popstate\") is not available".to_string()
		)]
	);
}
