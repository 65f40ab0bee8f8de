//! Navigation guards and the `next` continuation.
//!
//! Every guard receives `(to, from, next)` and must settle the navigation
//! step by calling one of the [`Next`] methods exactly once, either before
//! returning or at any later time. Returning `Err` is the same as calling
//! [`Next::error`].

use crate::component::ComponentInstance;
use crate::error::RouterError;
use crate::location::RawLocation;
use crate::logging::warn_dev;
use crate::route::Route;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Result returned by guards.
pub type GuardResult = Result<(), RouterError>;

/// A global or per-route guard.
pub type NavigationGuard = Rc<dyn Fn(&Route, &Route, Next) -> GuardResult>;

/// An in-component guard bound to a live component instance.
pub type ComponentGuard = Rc<dyn Fn(&ComponentInstance, &Route, &Route, Next) -> GuardResult>;

/// A hook run after a navigation is confirmed.
pub type AfterHook = Rc<dyn Fn(&Route, &Route)>;

/// A callback passed to `next` by a `before_route_enter` guard; it receives
/// the component instance once the host has registered it.
pub type PostEnterCallback = Box<dyn FnOnce(&Rc<ComponentInstance>)>;

/// What a guard decided.
pub enum NextAction {
	/// Continue with the next guard.
	Proceed,
	/// Abort the navigation and restore the URL.
	Abort,
	/// Abort the navigation with an error reported to `on_error` subscribers.
	Error(RouterError),
	/// Abort the navigation and navigate somewhere else.
	Redirect {
		/// New target.
		location: RawLocation,
		/// Replace the current history entry instead of pushing.
		replace: bool,
	},
	/// Continue, running the callback once the entered component exists.
	Callback(PostEnterCallback),
}

impl fmt::Debug for NextAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Proceed => write!(f, "Proceed"),
			Self::Abort => write!(f, "Abort"),
			Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
			Self::Redirect { location, replace } => f
				.debug_struct("Redirect")
				.field("location", location)
				.field("replace", replace)
				.finish(),
			Self::Callback(_) => write!(f, "Callback(..)"),
		}
	}
}

/// A callback that runs at most once, however many clones call it.
pub(crate) struct Latch<A> {
	slot: Rc<RefCell<Option<Box<dyn FnOnce(A)>>>>,
}

impl<A> Clone for Latch<A> {
	fn clone(&self) -> Self {
		Self {
			slot: Rc::clone(&self.slot),
		}
	}
}

impl<A: 'static> Latch<A> {
	pub(crate) fn new(f: impl FnOnce(A) + 'static) -> Self {
		Self {
			slot: Rc::new(RefCell::new(Some(Box::new(f)))),
		}
	}

	/// Runs the callback; returns `false` if it already ran.
	pub(crate) fn fire(&self, arg: A) -> bool {
		let callback = self.slot.borrow_mut().take();
		match callback {
			Some(callback) => {
				callback(arg);
				true
			}
			None => false,
		}
	}

	pub(crate) fn is_fired(&self) -> bool {
		self.slot.borrow().is_none()
	}
}

/// The continuation handed to each guard.
///
/// Clones share one latch: only the first call counts.
#[derive(Clone)]
pub struct Next {
	latch: Latch<NextAction>,
}

impl Next {
	pub(crate) fn new(f: impl FnOnce(NextAction) + 'static) -> Self {
		Self {
			latch: Latch::new(f),
		}
	}

	/// Settles the step with `action`.
	pub fn call(self, action: NextAction) {
		if !self.latch.fire(action) {
			warn_dev!("next() was called more than once in a navigation guard; the extra call is ignored.");
		}
	}

	/// Continues the navigation.
	pub fn proceed(self) {
		self.call(NextAction::Proceed);
	}

	/// Aborts the navigation.
	pub fn abort(self) {
		self.call(NextAction::Abort);
	}

	/// Aborts the navigation with an error.
	pub fn error(self, err: impl Into<RouterError>) {
		self.call(NextAction::Error(err.into()));
	}

	/// Redirects to another location; a structured location with
	/// `replace` set replaces the current history entry.
	pub fn redirect(self, location: impl Into<RawLocation>) {
		let location = location.into();
		let replace = location.is_replace();
		self.call(NextAction::Redirect { location, replace });
	}

	/// Continues and runs `callback` with the entered component instance.
	pub fn callback(self, callback: impl FnOnce(&Rc<ComponentInstance>) + 'static) {
		self.call(NextAction::Callback(Box::new(callback)));
	}

	/// Returns `true` once any clone of this continuation has been called.
	pub fn is_called(&self) -> bool {
		self.latch.is_fired()
	}
}

impl fmt::Debug for Next {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Next")
			.field("called", &self.is_called())
			.finish()
	}
}

/// Handle returned by hook registration; dropping it keeps the hook.
pub struct Unregister {
	remove: Box<dyn FnOnce()>,
}

impl Unregister {
	/// Removes the hook.
	pub fn unregister(self) {
		(self.remove)();
	}
}

impl fmt::Debug for Unregister {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Unregister").finish_non_exhaustive()
	}
}

/// An ordered list of hooks with removable entries.
pub(crate) struct HookList<T> {
	hooks: Rc<RefCell<Vec<(u64, T)>>>,
	next_id: Cell<u64>,
}

impl<T> Default for HookList<T> {
	fn default() -> Self {
		Self {
			hooks: Rc::new(RefCell::new(Vec::new())),
			next_id: Cell::new(0),
		}
	}
}

impl<T: Clone + 'static> HookList<T> {
	pub(crate) fn register(&self, hook: T) -> Unregister {
		let id = self.next_id.get();
		self.next_id.set(id + 1);
		self.hooks.borrow_mut().push((id, hook));

		let hooks: Weak<RefCell<Vec<(u64, T)>>> = Rc::downgrade(&self.hooks);
		Unregister {
			remove: Box::new(move || {
				if let Some(hooks) = hooks.upgrade() {
					hooks.borrow_mut().retain(|(hook_id, _)| *hook_id != id);
				}
			}),
		}
	}

	/// Copies the current hooks so none of them runs under a borrow.
	pub(crate) fn snapshot(&self) -> Vec<T> {
		self.hooks
			.borrow()
			.iter()
			.map(|(_, hook)| hook.clone())
			.collect()
	}

	pub(crate) fn len(&self) -> usize {
		self.hooks.borrow().len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_next_runs_once() {
		let calls = Rc::new(RefCell::new(Vec::new()));
		let log = calls.clone();
		let next = Next::new(move |action| log.borrow_mut().push(format!("{:?}", action)));

		let second = next.clone();
		next.abort();
		second.proceed();

		assert_eq!(*calls.borrow(), vec!["Abort".to_string()]);
	}

	#[rstest]
	fn test_redirect_reads_replace_flag() {
		let seen = Rc::new(Cell::new(None));
		let out = seen.clone();
		let next = Next::new(move |action| {
			if let NextAction::Redirect { replace, .. } = action {
				out.set(Some(replace));
			}
		});
		next.redirect(crate::location::Location::path("/login").replacing());
		assert_eq!(seen.get(), Some(true));
	}

	#[rstest]
	fn test_hook_list_unregister() {
		let hooks: HookList<&'static str> = HookList::default();
		let first = hooks.register("a");
		let _second = hooks.register("b");
		assert_eq!(hooks.snapshot(), vec!["a", "b"]);

		first.unregister();
		assert_eq!(hooks.snapshot(), vec!["b"]);
		assert_eq!(hooks.len(), 1);
	}
}
