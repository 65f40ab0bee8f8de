//! The transition controller.
//!
//! Drives one navigation at a time through the guard pipeline. The route
//! being navigated to is kept as `pending`; any step that finds a different
//! pending route cancels its navigation, so only the latest navigation can
//! commit.

use crate::error::{
	NavigationError, NavigationFailure, NavigationFailureKind, RouterError, is_navigation_failure,
};
use crate::guard::{Latch, Next, NextAction};
use crate::history::{AbortFn, CompleteFn, ListenerHandle};
use crate::location::RawLocation;
use crate::logging::warn_dev;
use crate::pipeline::{
	PostEnterTask, Step, async_component_step, enter_guards, leave_guards, resolve_queue,
	run_queue, update_guards,
};
use crate::route::{Route, is_same_route, start_route};
use crate::router::Router;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type ReadyCallback = Box<dyn FnOnce(&Rc<Route>)>;
type ReadyErrorCallback = Box<dyn FnOnce(&NavigationError)>;
type ChangeListener = Rc<dyn Fn(&Rc<Route>)>;
type GuardIterator = Rc<dyn Fn(&Step, Box<dyn FnOnce()>)>;

/// Mutable navigation state of a router.
pub(crate) struct TransitionState {
	current: RefCell<Rc<Route>>,
	pending: RefCell<Option<Rc<Route>>>,
	ready: Cell<bool>,
	ready_callbacks: RefCell<Vec<ReadyCallback>>,
	ready_error_callbacks: RefCell<Vec<ReadyErrorCallback>>,
	change_listener: RefCell<Option<ChangeListener>>,
	listeners: RefCell<Vec<ListenerHandle>>,
	post_enter: RefCell<Vec<PostEnterTask>>,
}

impl Default for TransitionState {
	fn default() -> Self {
		Self {
			current: RefCell::new(start_route()),
			pending: RefCell::new(None),
			ready: Cell::new(false),
			ready_callbacks: RefCell::new(Vec::new()),
			ready_error_callbacks: RefCell::new(Vec::new()),
			change_listener: RefCell::new(None),
			listeners: RefCell::new(Vec::new()),
			post_enter: RefCell::new(Vec::new()),
		}
	}
}

impl TransitionState {
	pub(crate) fn current(&self) -> Rc<Route> {
		Rc::clone(&self.current.borrow())
	}

	pub(crate) fn is_ready(&self) -> bool {
		self.ready.get()
	}

	pub(crate) fn add_ready_callbacks(
		&self,
		callback: ReadyCallback,
		error_callback: Option<ReadyErrorCallback>,
	) {
		self.ready_callbacks.borrow_mut().push(callback);
		if let Some(error_callback) = error_callback {
			self.ready_error_callbacks.borrow_mut().push(error_callback);
		}
	}

	pub(crate) fn set_change_listener(&self, listener: ChangeListener) {
		*self.change_listener.borrow_mut() = Some(listener);
	}

	pub(crate) fn has_listeners(&self) -> bool {
		!self.listeners.borrow().is_empty()
	}

	pub(crate) fn add_listener(&self, handle: ListenerHandle) {
		self.listeners.borrow_mut().push(handle);
	}

	pub(crate) fn pending_post_enter(&self) -> usize {
		self.post_enter.borrow().len()
	}

	fn is_pending(&self, route: &Rc<Route>) -> bool {
		self.pending
			.borrow()
			.as_ref()
			.is_some_and(|pending| Rc::ptr_eq(pending, route))
	}
}

impl Router {
	/// Matches `raw` and navigates to it.
	///
	/// `on_complete` runs once the route is committed, before the URL is
	/// synchronized; `on_abort` receives the reason it was not.
	pub(crate) fn transition_to(
		&self,
		raw: RawLocation,
		on_complete: Option<CompleteFn>,
		on_abort: Option<AbortFn>,
	) {
		let prev = self.state().current();
		let route = match self.inner.matcher.match_location(&raw, Some(&prev), None) {
			Ok(route) => Rc::new(route),
			Err(err) => {
				self.report_error(&err);
				if let Some(on_abort) = on_abort {
					on_abort(NavigationError::Other(err));
				}
				return;
			}
		};
		tracing::debug!(from = %prev.full_path, to = %route.full_path, "navigation started");

		let confirm: CompleteFn = {
			let router = self.clone();
			let prev = Rc::clone(&prev);
			Box::new(move |route: &Rc<Route>| {
				router.update_route(route);
				if let Some(on_complete) = on_complete {
					on_complete(route);
				}
				router.history().ensure_url(&router, false);
				for hook in router.inner.after_hooks.snapshot() {
					hook(route, &prev);
				}
				router.mark_ready(route);
				tracing::debug!(from = %prev.full_path, to = %route.full_path, "navigation confirmed");
			})
		};

		let abort: AbortFn = {
			let router = self.clone();
			let route = Rc::clone(&route);
			Box::new(move |err: NavigationError| {
				tracing::debug!(from = %prev.full_path, reason = %err, "navigation aborted");
				if let Some(on_abort) = on_abort {
					on_abort(err.clone());
				}
				let state = router.state();
				if state.ready.get() {
					return;
				}
				// An initial redirect still counts as a successful start.
				if is_navigation_failure(&err, Some(NavigationFailureKind::Redirected)) {
					router.mark_ready(&route);
					return;
				}
				state.ready.set(true);
				state.ready_callbacks.borrow_mut().clear();
				let callbacks = std::mem::take(&mut *state.ready_error_callbacks.borrow_mut());
				for callback in callbacks {
					callback(&err);
				}
			})
		};

		self.confirm_transition(route, confirm, Some(abort));
	}

	/// Runs the guard pipeline for `route` and commits it through
	/// `on_complete`.
	pub(crate) fn confirm_transition(
		&self,
		route: Rc<Route>,
		on_complete: CompleteFn,
		on_abort: Option<AbortFn>,
	) {
		let current = self.state().current();
		*self.state().pending.borrow_mut() = Some(Rc::clone(&route));

		let abort = {
			let router = self.clone();
			Latch::new(move |err: NavigationError| {
				if let NavigationError::Other(err) = &err {
					router.report_error(err);
				}
				if let Some(on_abort) = on_abort {
					on_abort(err);
				}
			})
		};

		let same_tail = match (route.matched.last(), current.matched.last()) {
			(Some(next), Some(prev)) => Rc::ptr_eq(next, prev),
			(None, None) => true,
			_ => false,
		};
		if is_same_route(&route, &current)
			&& route.matched.len() == current.matched.len()
			&& same_tail
		{
			self.history().ensure_url(self, false);
			abort.fire(NavigationFailure::duplicated(&current, &route).into());
			return;
		}

		let diff = resolve_queue(&current.matched, &route.matched);
		let mut queue: Vec<Step> = leave_guards(&diff.deactivated);
		queue.extend(self.inner.before_hooks.snapshot());
		queue.extend(update_guards(&diff.updated));
		queue.extend(
			diff.activated
				.iter()
				.filter_map(|record| record.before_enter.clone()),
		);
		queue.push(async_component_step(
			diff.activated.clone(),
			self.inner.spawner.clone(),
		));

		let iterator = self.guard_iterator(&route, &current, &abort);
		let first = Rc::clone(&iterator);
		let router = self.clone();
		let activated = diff.activated;
		let finish = Box::new(move || {
			let tasks = Rc::new(RefCell::new(Vec::new()));
			let mut queue = enter_guards(&activated, &tasks, &route);
			queue.extend(router.inner.resolve_hooks.snapshot());

			run_queue(
				queue.into(),
				0,
				iterator,
				Box::new(move || {
					let state = router.state();
					if !state.is_pending(&route) {
						abort.fire(NavigationFailure::cancelled(&current, &route).into());
						return;
					}
					*state.pending.borrow_mut() = None;
					state.post_enter.borrow_mut().extend(tasks.take());
					on_complete(&route);
				}),
			);
		});
		run_queue(queue.into(), 0, first, finish);
	}

	/// Hands each step its `next` and turns the guard's decision into
	/// advancing, aborting or redirecting.
	fn guard_iterator(
		&self,
		route: &Rc<Route>,
		current: &Rc<Route>,
		abort: &Latch<NavigationError>,
	) -> GuardIterator {
		let router = self.clone();
		let route = Rc::clone(route);
		let current = Rc::clone(current);
		let abort = abort.clone();
		Rc::new(move |step: &Step, advance: Box<dyn FnOnce()>| {
			if !router.state().is_pending(&route) {
				abort.fire(NavigationFailure::cancelled(&current, &route).into());
				return;
			}

			let next = {
				let router = router.clone();
				let route = Rc::clone(&route);
				let current = Rc::clone(&current);
				let abort = abort.clone();
				Next::new(move |action| {
					if !router.state().is_pending(&route) {
						abort.fire(NavigationFailure::cancelled(&current, &route).into());
						return;
					}
					match action {
						NextAction::Proceed => advance(),
						NextAction::Abort => {
							router.history().ensure_url(&router, true);
							abort.fire(NavigationFailure::aborted(&current, &route).into());
						}
						NextAction::Error(err) => {
							router.history().ensure_url(&router, true);
							abort.fire(NavigationError::Other(err));
						}
						NextAction::Redirect { location, replace } => {
							abort.fire(NavigationFailure::redirected(&current, &route).into());
							if replace {
								router.history().replace(&router, location, None, None);
							} else {
								router.history().push(&router, location, None, None);
							}
						}
						NextAction::Callback(_) => {
							warn_dev!("next() with a callback is only supported in before_route_enter guards; continuing.");
							advance();
						}
					}
				})
			};

			if let Err(err) = step(&route, &current, next.clone()) {
				next.error(err);
			}
		})
	}

	/// Commits `route` as the current route and notifies the change listener.
	pub(crate) fn update_route(&self, route: &Rc<Route>) {
		*self.state().current.borrow_mut() = Rc::clone(route);
		let listener = self.state().change_listener.borrow().clone();
		if let Some(listener) = listener {
			listener(route);
		}
	}

	fn mark_ready(&self, route: &Rc<Route>) {
		let state = self.state();
		if state.ready.replace(true) {
			return;
		}
		state.ready_error_callbacks.borrow_mut().clear();
		let callbacks = std::mem::take(&mut *state.ready_callbacks.borrow_mut());
		for callback in callbacks {
			callback(route);
		}
	}

	/// Sends `err` to `on_error` subscribers, or logs it when nobody listens.
	pub(crate) fn report_error(&self, err: &RouterError) {
		let subscribers = self.inner.error_hooks.snapshot();
		if subscribers.is_empty() {
			warn_dev!("uncaught error during route navigation:");
			tracing::error!(error = %err, "navigation error");
			return;
		}
		for subscriber in subscribers {
			subscriber(err);
		}
	}

	/// Runs post-enter callbacks whose component instance is available.
	///
	/// Callbacks for the current route without a usable instance stay
	/// queued; callbacks for any other route are dropped.
	pub(crate) fn flush_post_enter(&self) {
		let tasks = std::mem::take(&mut *self.state().post_enter.borrow_mut());
		if tasks.is_empty() {
			return;
		}
		let current = self.state().current();
		let mut kept = Vec::new();
		for task in tasks {
			match task.record.instance(&task.outlet) {
				Some(instance) if !instance.is_being_destroyed() => (task.callback)(&instance),
				_ if Rc::ptr_eq(&task.route, &current) => kept.push(task),
				_ => {}
			}
		}
		let mut queue = self.state().post_enter.borrow_mut();
		kept.append(&mut queue);
		*queue = kept;
	}

	/// Releases listener registrations and resets navigation state.
	pub(crate) fn teardown_state(&self) {
		let state = self.state();
		let listeners = std::mem::take(&mut *state.listeners.borrow_mut());
		for remove in listeners {
			remove();
		}
		*state.current.borrow_mut() = start_route();
		*state.pending.borrow_mut() = None;
		state.post_enter.borrow_mut().clear();
	}
}
