//! In-memory history for environments without a browser.

use super::{AbortFn, CompleteFn, HistoryBackend};
use crate::error::{NavigationError, NavigationFailureKind, is_navigation_failure};
use crate::location::RawLocation;
use crate::route::Route;
use crate::router::Router;
use crate::settings::RouterMode;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A stack of committed routes and a cursor into it.
#[derive(Default)]
pub(crate) struct AbstractHistory {
	stack: Rc<RefCell<Vec<Rc<Route>>>>,
	index: Rc<Cell<Option<usize>>>,
}

impl AbstractHistory {
	fn navigate(
		&self,
		router: &Router,
		location: RawLocation,
		on_complete: Option<CompleteFn>,
		on_abort: Option<AbortFn>,
		replace: bool,
	) {
		let stack = Rc::clone(&self.stack);
		let index = Rc::clone(&self.index);
		router.transition_to(
			location,
			Some(Box::new(move |route: &Rc<Route>| {
				{
					let mut stack = stack.borrow_mut();
					let keep = match (index.get(), replace) {
						(Some(current), false) => current + 1,
						(Some(current), true) => current,
						(None, _) => 0,
					};
					stack.truncate(keep);
					stack.push(Rc::clone(route));
					index.set(Some(stack.len() - 1));
				}
				if let Some(on_complete) = on_complete {
					on_complete(route);
				}
			})),
			on_abort,
		);
	}
}

impl HistoryBackend for AbstractHistory {
	fn kind(&self) -> RouterMode {
		RouterMode::Abstract
	}

	fn push(
		&self,
		router: &Router,
		location: RawLocation,
		on_complete: Option<CompleteFn>,
		on_abort: Option<AbortFn>,
	) {
		self.navigate(router, location, on_complete, on_abort, false);
	}

	fn replace(
		&self,
		router: &Router,
		location: RawLocation,
		on_complete: Option<CompleteFn>,
		on_abort: Option<AbortFn>,
	) {
		self.navigate(router, location, on_complete, on_abort, true);
	}

	/// Moves the cursor by `n`, clamped to the stack, once the target route
	/// is confirmed.
	fn go(&self, router: &Router, n: i32) {
		let (route, target) = {
			let stack = self.stack.borrow();
			if stack.is_empty() {
				return;
			}
			let current = self.index.get().unwrap_or(0) as i64;
			let target = (current + i64::from(n)).clamp(0, stack.len() as i64 - 1) as usize;
			(Rc::clone(&stack[target]), target)
		};

		let confirmed: CompleteFn = {
			let router = router.clone();
			let index = Rc::clone(&self.index);
			Box::new(move |route: &Rc<Route>| {
				let prev = router.current_route();
				index.set(Some(target));
				router.update_route(route);
				for hook in router.inner.after_hooks.snapshot() {
					hook(route, &prev);
				}
			})
		};
		let index = Rc::clone(&self.index);
		let aborted: AbortFn = Box::new(move |err: NavigationError| {
			if is_navigation_failure(&err, Some(NavigationFailureKind::Duplicated)) {
				index.set(Some(target));
			}
		});
		router.confirm_transition(route, confirmed, Some(aborted));
	}

	fn current_location(&self) -> String {
		let stack = self.stack.borrow();
		self.index
			.get()
			.and_then(|index| stack.get(index))
			.map_or_else(|| "/".to_string(), |route| route.full_path.clone())
	}

	fn ensure_url(&self, _router: &Router, _push: bool) {}

	fn setup_listeners(&self, _router: &Router) {}
}
