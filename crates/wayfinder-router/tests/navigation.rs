//! Navigation pipeline integration tests
//!
//! Success Criteria:
//! 1. Nested routes, wildcards, aliases and redirects match as configured
//! 2. Guards run in leave, before_each, update, before_enter, enter, before_resolve order
//! 3. Only the latest navigation commits; superseded ones are cancelled
//! 4. Failures reach the caller but never `on_error`; real errors reach both
//! 5. Ready callbacks fire once the initial navigation settles
//!
//! All tests run in abstract mode unless a browser is needed.

use futures::executor::block_on;
use rstest::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wayfinder_router::{
	AsyncComponent, Component, ComponentInstance, DEFAULT_OUTLET, Location, NavigationError,
	NavigationFailureKind, Next, RouteConfig, Router, RouterError, RouterMode, RouterOptions,
	SimulatedBrowser, is_navigation_failure,
};

// ============================================================================
// Fixtures
// ============================================================================

type Log = Rc<RefCell<Vec<String>>>;

#[fixture]
fn log() -> Log {
	Rc::new(RefCell::new(Vec::new()))
}

fn router(routes: Vec<RouteConfig>) -> Router {
	Router::new(RouterOptions::new().routes(routes)).unwrap()
}

fn failure_kind(err: &NavigationError) -> Option<NavigationFailureKind> {
	err.failure().map(|failure| failure.kind())
}

// ============================================================================
// Matching Scenarios
// ============================================================================

/// Tests that a relative child path is nested under its parent
#[rstest]
fn test_nested_route_matches_parent_and_child() {
	let router = router(vec![
		RouteConfig::new("/parent")
			.component(Component::named("Parent"))
			.child(RouteConfig::new("child").component(Component::named("Child"))),
	]);

	let route = block_on(router.push("/parent/child")).unwrap();

	let paths: Vec<&str> = route.matched.iter().map(|record| record.path()).collect();
	assert_eq!(paths, vec!["/parent", "/parent/child"]);
	assert_eq!(router.current_route().full_path, "/parent/child");
}

/// Tests that a wildcard declared first still matches last
#[rstest]
fn test_wildcard_has_lowest_priority() {
	let router = router(vec![
		RouteConfig::new("*").component(Component::named("NotFound")),
		RouteConfig::new("/a").component(Component::named("A")),
	]);

	let route = block_on(router.push("/a")).unwrap();
	assert_eq!(route.matched[0].path(), "/a");

	let route = block_on(router.push("/zzz")).unwrap();
	assert_eq!(route.matched[0].path(), "*");
	assert_eq!(route.params["pathMatch"], "/zzz");
}

/// Tests that an alias keeps the requested path but matches the canonical record
#[rstest]
fn test_alias_keeps_requested_path() {
	let router = router(vec![
		RouteConfig::new("/home")
			.alias("/")
			.component(Component::named("Home")),
	]);

	let route = block_on(router.push("/")).unwrap();

	assert_eq!(route.path, "/");
	assert_eq!(route.matched.len(), 1);
	assert_eq!(route.matched[0].path(), "/home");
}

/// Tests that a configured redirect keeps the query and records its origin
#[rstest]
fn test_config_redirect_keeps_query() {
	let router = router(vec![
		RouteConfig::new("/old").redirect("/new"),
		RouteConfig::new("/new").component(Component::named("New")),
	]);

	let route = block_on(router.push("/old?x=1")).unwrap();

	assert_eq!(route.full_path, "/new?x=1");
	assert_eq!(route.redirected_from.as_deref(), Some("/old?x=1"));
}

/// Tests that relative params navigation reuses the current route
#[rstest]
fn test_params_only_navigation_reuses_current_name() {
	let router = router(vec![
		RouteConfig::new("/users/:id/posts/:post")
			.name("post")
			.component(Component::named("Post")),
	]);
	block_on(router.push("/users/1/posts/2")).unwrap();

	let mut location = Location::default();
	location.params = Some([("post".to_string(), "3".to_string())].into_iter().collect());
	let route = block_on(router.push(location)).unwrap();

	assert_eq!(route.path, "/users/1/posts/3");
	assert_eq!(route.name.as_deref(), Some("post"));
}

// ============================================================================
// Guard Pipeline
// ============================================================================

/// Tests the full guard order across enter, update and leave
#[rstest]
fn test_guard_order(log: Log) {
	let entry = |log: &Log, name: &'static str| {
		let log = log.clone();
		move || log.borrow_mut().push(name.to_string())
	};

	let user = {
		let enter = entry(&log, "enter User");
		let update = entry(&log, "update User");
		let leave = entry(&log, "leave User");
		Component::named("User")
			.before_route_enter(move |_to, _from, next| {
				enter();
				next.proceed();
				Ok(())
			})
			.before_route_update(move |_instance, _to, _from, next| {
				update();
				next.proceed();
				Ok(())
			})
			.before_route_leave(move |_instance, _to, _from, next| {
				leave();
				next.proceed();
				Ok(())
			})
	};
	let about = {
		let enter = entry(&log, "enter About");
		Component::named("About").before_route_enter(move |_to, _from, next| {
			enter();
			next.proceed();
			Ok(())
		})
	};
	let users_enter = entry(&log, "beforeEnter users");
	let about_enter = entry(&log, "beforeEnter about");
	let router = router(vec![
		RouteConfig::new("/users/:id")
			.component(user)
			.before_enter(move |_to, _from, next| {
				users_enter();
				next.proceed();
				Ok(())
			}),
		RouteConfig::new("/about")
			.component(about)
			.before_enter(move |_to, _from, next| {
				about_enter();
				next.proceed();
				Ok(())
			}),
	]);
	let each = entry(&log, "beforeEach");
	let resolve = entry(&log, "beforeResolve");
	let after = entry(&log, "afterEach");
	router.before_each(move |_to, _from, next| {
		each();
		next.proceed();
		Ok(())
	});
	router.before_resolve(move |_to, _from, next| {
		resolve();
		next.proceed();
		Ok(())
	});
	router.after_each(move |_to, _from| after());

	let route = block_on(router.push("/users/1")).unwrap();
	router.register_instance(&route.matched[0], DEFAULT_OUTLET, ComponentInstance::new(String::from("user")));
	assert_eq!(
		log.take(),
		vec!["beforeEach", "beforeEnter users", "enter User", "beforeResolve", "afterEach"]
	);

	block_on(router.push("/users/2")).unwrap();
	assert_eq!(
		log.take(),
		vec!["beforeEach", "update User", "beforeResolve", "afterEach"]
	);

	block_on(router.push("/about")).unwrap();
	assert_eq!(
		log.take(),
		vec![
			"leave User",
			"beforeEach",
			"beforeEnter about",
			"enter About",
			"beforeResolve",
			"afterEach"
		]
	);
}

/// Tests that instance-bound guards are skipped without a registered instance
#[rstest]
fn test_leave_guard_needs_instance(log: Log) {
	let seen = log.clone();
	let router = router(vec![
		RouteConfig::new("/a").component(Component::named("A").before_route_leave(
			move |instance, _to, _from, next| {
				let name = instance.downcast_ref::<String>().map_or("?", String::as_str);
				seen.borrow_mut().push(format!("leave {name}"));
				next.proceed();
				Ok(())
			},
		)),
		RouteConfig::new("/b").component(Component::named("B")),
	]);

	block_on(router.push("/a")).unwrap();
	block_on(router.push("/b")).unwrap();
	assert!(log.borrow().is_empty());

	let route = block_on(router.push("/a")).unwrap();
	let instance = ComponentInstance::new(String::from("a-instance"));
	router.register_instance(&route.matched[0], DEFAULT_OUTLET, instance.clone());
	block_on(router.push("/b")).unwrap();
	assert_eq!(log.take(), vec!["leave a-instance"]);
	assert!(router.unregister_instance(&route.matched[0], DEFAULT_OUTLET, &instance));
	assert!(!router.unregister_instance(&route.matched[0], DEFAULT_OUTLET, &instance));
}

/// Tests that aborting keeps the current route and reports an aborted failure
#[rstest]
fn test_abort_keeps_current_route() {
	let router = router(vec![
		RouteConfig::new("/a").component(Component::named("A")),
		RouteConfig::new("/b").component(Component::named("B")),
	]);
	block_on(router.push("/a")).unwrap();
	router.before_each(|to, _from, next| {
		if to.path == "/b" {
			next.abort();
		} else {
			next.proceed();
		}
		Ok(())
	});

	let err = block_on(router.push("/b")).unwrap_err();

	assert_eq!(failure_kind(&err), Some(NavigationFailureKind::Aborted));
	assert_eq!(router.current_route().path, "/a");
}

/// Tests that a guard redirect aborts the navigation and starts a new one
#[rstest]
fn test_guard_redirect(log: Log) {
	let router = router(vec![
		RouteConfig::new("/private").component(Component::named("Private")),
		RouteConfig::new("/login").component(Component::named("Login")),
	]);
	router.before_each(|to, _from, next| {
		if to.path == "/private" {
			next.redirect("/login");
		} else {
			next.proceed();
		}
		Ok(())
	});
	let errors = log.clone();
	router.on_error(move |err| errors.borrow_mut().push(err.to_string()));

	let err = block_on(router.push("/private")).unwrap_err();

	assert!(is_navigation_failure(&err, Some(NavigationFailureKind::Redirected)));
	let failure = err.failure().unwrap();
	assert_eq!(failure.to().path, "/private");
	assert_eq!(router.current_route().path, "/login");
	assert!(log.borrow().is_empty());
}

/// Tests that a newer navigation cancels one still waiting on a guard
#[rstest]
fn test_newer_navigation_cancels_pending_one() {
	let router = router(vec![
		RouteConfig::new("/slow").component(Component::named("Slow")),
		RouteConfig::new("/fast").component(Component::named("Fast")),
	]);
	let parked: Rc<RefCell<Option<Next>>> = Rc::new(RefCell::new(None));
	let stash = parked.clone();
	router.before_each(move |to, _from, next| {
		if to.path == "/slow" {
			*stash.borrow_mut() = Some(next);
		} else {
			next.proceed();
		}
		Ok(())
	});

	let slow = router.push("/slow");
	let fast = block_on(router.push("/fast")).unwrap();
	assert_eq!(fast.path, "/fast");

	let next = parked.borrow_mut().take().unwrap();
	next.proceed();

	let err = block_on(slow).unwrap_err();
	assert_eq!(failure_kind(&err), Some(NavigationFailureKind::Cancelled));
	assert_eq!(router.current_route().path, "/fast");
}

/// Tests that only the latest of several waiting navigations commits,
/// whatever order their guards settle in
#[rstest]
#[case::in_order(vec![0, 1, 2, 3])]
#[case::latest_first(vec![3, 0, 1, 2])]
#[case::interleaved(vec![2, 3, 0, 1])]
fn test_only_latest_pending_navigation_commits(log: Log, #[case] settle_order: Vec<usize>) {
	let targets = ["/a", "/b", "/c", "/d"];
	let router = router(
		targets
			.iter()
			.map(|path| RouteConfig::new(*path).component(Component::named(*path)))
			.collect(),
	);
	let parked: Rc<RefCell<Vec<Option<Next>>>> = Rc::new(RefCell::new(Vec::new()));
	let stash = parked.clone();
	router.before_each(move |_to, _from, next| {
		stash.borrow_mut().push(Some(next));
		Ok(())
	});
	let commits = log.clone();
	router.after_each(move |to, _from| commits.borrow_mut().push(to.path.clone()));

	let navigations: Vec<_> = targets.iter().map(|path| router.push(*path)).collect();
	for index in settle_order {
		let next = parked.borrow_mut()[index].take().unwrap();
		next.proceed();
	}

	let outcomes: Vec<_> = navigations.into_iter().map(block_on).collect();
	for outcome in &outcomes[..3] {
		let err = outcome.as_ref().unwrap_err();
		assert_eq!(failure_kind(err), Some(NavigationFailureKind::Cancelled));
	}
	assert_eq!(outcomes[3].as_ref().unwrap().path, "/d");
	assert_eq!(log.take(), vec!["/d"]);
	assert_eq!(router.current_route().path, "/d");
}

/// Tests that navigating to the current location is a duplicated failure
#[rstest]
fn test_duplicate_navigation(log: Log) {
	let router = router(vec![RouteConfig::new("/a").component(Component::named("A"))]);
	let calls = log.clone();
	router.after_each(move |_to, _from| calls.borrow_mut().push("after".to_string()));

	block_on(router.push("/a")).unwrap();
	let err = block_on(router.push("/a/")).unwrap_err();

	assert_eq!(failure_kind(&err), Some(NavigationFailureKind::Duplicated));
	assert_eq!(log.borrow().len(), 1);
	assert_eq!(
		err.to_string(),
		"Avoided redundant navigation to current location: \"/a\"."
	);
}

/// Tests that a rejected async component reaches both the caller and `on_error`
#[rstest]
fn test_async_component_rejection(log: Log) {
	let router = router(vec![RouteConfig::new("/lazy").component(
		AsyncComponent::with_resolver(|resolver| {
			resolver.reject("boom");
			Ok(())
		}),
	)]);
	let errors = log.clone();
	router.on_error(move |err| errors.borrow_mut().push(err.to_string()));

	let err = block_on(router.push("/lazy")).unwrap_err();

	assert_eq!(
		err.router_error(),
		Some(&RouterError::AsyncComponent {
			outlet: DEFAULT_OUTLET.to_string(),
			reason: "boom".to_string(),
		})
	);
	assert_eq!(
		log.take(),
		vec!["Failed to resolve async component default: boom"]
	);
	assert_eq!(router.current_route().path, "/");
}

/// Tests that a guard returning `Err` aborts with that error
#[rstest]
fn test_guard_error_result(log: Log) {
	let router = router(vec![RouteConfig::new("/a").component(Component::named("A"))]);
	router.before_each(|_to, _from, _next| Err(RouterError::guard("not allowed")));
	let errors = log.clone();
	router.on_error(move |err| errors.borrow_mut().push(err.to_string()));

	let err = block_on(router.push("/a")).unwrap_err();

	assert_eq!(
		err.router_error(),
		Some(&RouterError::Guard("not allowed".to_string()))
	);
	assert_eq!(log.take(), vec!["Navigation guard error: not allowed"]);
}

/// Tests that unregistered hooks stop running
#[rstest]
fn test_unregistered_hook_is_skipped() {
	let router = router(vec![
		RouteConfig::new("/a").component(Component::named("A")),
		RouteConfig::new("/b").component(Component::named("B")),
	]);
	let calls = Rc::new(Cell::new(0));
	let counter = calls.clone();
	let handle = router.before_each(move |_to, _from, next| {
		counter.set(counter.get() + 1);
		next.proceed();
		Ok(())
	});

	block_on(router.push("/a")).unwrap();
	handle.unregister();
	block_on(router.push("/b")).unwrap();

	assert_eq!(calls.get(), 1);
}

/// Tests that a guard dropping its `next` settles the future as dropped
#[rstest]
fn test_dropped_next_settles_future() {
	let router = router(vec![RouteConfig::new("/a").component(Component::named("A"))]);
	router.before_each(|_to, _from, next| {
		drop(next);
		Ok(())
	});

	let err = block_on(router.push("/a")).unwrap_err();

	assert_eq!(err.router_error(), Some(&RouterError::Dropped));
}

// ============================================================================
// Route Table Changes
// ============================================================================

/// Tests that adding routes re-runs the navigation to the current location
#[rstest]
fn test_add_routes_rematches_current_location() {
	let router = router(vec![RouteConfig::new("/").component(Component::named("Home"))]);
	let route = block_on(router.push("/late")).unwrap();
	assert!(!route.is_matched());

	router
		.add_routes(vec![RouteConfig::new("/late").component(Component::named("Late"))])
		.unwrap();

	let current = router.current_route();
	assert_eq!(current.matched.len(), 1);
	assert_eq!(current.matched[0].path(), "/late");
}

// ============================================================================
// Readiness
// ============================================================================

fn hash_router(url: &str, routes: Vec<RouteConfig>) -> (Router, Rc<SimulatedBrowser>) {
	let browser = Rc::new(SimulatedBrowser::new(url));
	let router = Router::new(
		RouterOptions::new()
			.routes(routes)
			.mode(RouterMode::Hash)
			.browser(browser.clone()),
	)
	.unwrap();
	(router, browser)
}

/// Tests that ready callbacks fire after the initial navigation, and immediately afterwards
#[rstest]
fn test_on_ready_fires_once(log: Log) {
	let (router, _browser) = hash_router(
		"/#/a",
		vec![RouteConfig::new("/a").component(Component::named("A"))],
	);
	let ready = log.clone();
	router.on_ready(move |route| ready.borrow_mut().push(route.full_path.clone()));
	assert!(!router.is_ready());

	router.init();
	assert!(router.is_ready());
	assert_eq!(log.take(), vec!["/a"]);

	let late = log.clone();
	router.on_ready(move |route| late.borrow_mut().push(format!("late {}", route.full_path)));
	assert_eq!(log.take(), vec!["late /a"]);
}

/// Tests that an initial guard redirect marks the router ready, even when the
/// redirect target is rejected afterwards
#[rstest]
#[case::target_allowed(false, vec!["ready /start"], "/login")]
#[case::target_aborted(true, vec!["ready /start"], "/")]
fn test_initial_redirect_marks_ready(
	log: Log,
	#[case] abort_target: bool,
	#[case] expected: Vec<&str>,
	#[case] current: &str,
) {
	let (router, _browser) = hash_router(
		"/#/start",
		vec![
			RouteConfig::new("/start").component(Component::named("Start")),
			RouteConfig::new("/login").component(Component::named("Login")),
		],
	);
	router.before_each(move |to, _from, next| {
		if to.path == "/start" {
			next.redirect("/login");
		} else if abort_target {
			next.abort();
		} else {
			next.proceed();
		}
		Ok(())
	});
	let ready = log.clone();
	let failed = log.clone();
	router.on_ready_or_error(
		move |route| ready.borrow_mut().push(format!("ready {}", route.path)),
		move |err| failed.borrow_mut().push(format!("error {err}")),
	);

	router.init();

	assert_eq!(log.take(), expected);
	assert_eq!(router.current_route().path, current);
}

/// Tests that an aborted initial navigation fires the ready error callbacks
#[rstest]
fn test_initial_abort_fires_ready_error(log: Log) {
	let (router, _browser) = hash_router(
		"/#/a",
		vec![RouteConfig::new("/a").component(Component::named("A"))],
	);
	router.before_each(|_to, _from, next| {
		next.abort();
		Ok(())
	});
	let ready = log.clone();
	let failed = log.clone();
	router.on_ready_or_error(
		move |route| ready.borrow_mut().push(format!("ready {}", route.path)),
		move |err| {
			let kind = err.failure().map(|failure| failure.kind());
			failed.borrow_mut().push(format!("error {kind:?}"));
		},
	);

	router.init();

	assert!(router.is_ready());
	assert_eq!(log.take(), vec!["error Some(Aborted)"]);
}

/// Tests that the change listener sees every committed route
#[rstest]
fn test_listen_sees_commits(log: Log) {
	let router = router(vec![
		RouteConfig::new("/a").component(Component::named("A")),
		RouteConfig::new("/b").component(Component::named("B")),
	]);
	let seen = log.clone();
	router.listen(move |route| seen.borrow_mut().push(route.path.clone()));

	block_on(router.push("/a")).unwrap();
	let _ = block_on(router.push("/a"));
	block_on(router.replace("/b")).unwrap();

	assert_eq!(log.take(), vec!["/a", "/b"]);
}
