//! HTML5 history: the location is the URL path below `base`.

use super::{AbortFn, Browser, BrowserEvent, CompleteFn, HistoryBackend};
use crate::location::{RawLocation, clean_path};
use crate::route::{Route, is_start_route};
use crate::router::Router;
use crate::settings::RouterMode;
use std::rc::Rc;

pub(crate) struct Html5History {
	browser: Rc<dyn Browser>,
	base: String,
	/// Location at creation; the popstate some browsers fire on load for it
	/// is ignored.
	start_location: String,
}

impl Html5History {
	pub(crate) fn new(browser: Rc<dyn Browser>, base: String) -> Self {
		let start_location = get_location(&*browser, &base);
		Self {
			browser,
			base,
			start_location,
		}
	}

	fn url_for(&self, full_path: &str) -> String {
		clean_path(&format!("{}{}", self.base, full_path))
	}
}

impl HistoryBackend for Html5History {
	fn kind(&self) -> RouterMode {
		RouterMode::History
	}

	fn push(
		&self,
		router: &Router,
		location: RawLocation,
		on_complete: Option<CompleteFn>,
		on_abort: Option<AbortFn>,
	) {
		let browser = Rc::clone(&self.browser);
		let base = self.base.clone();
		router.transition_to(
			location,
			Some(Box::new(move |route: &Rc<Route>| {
				browser.push_state(&clean_path(&format!("{}{}", base, route.full_path)));
				if let Some(on_complete) = on_complete {
					on_complete(route);
				}
			})),
			on_abort,
		);
	}

	fn replace(
		&self,
		router: &Router,
		location: RawLocation,
		on_complete: Option<CompleteFn>,
		on_abort: Option<AbortFn>,
	) {
		let browser = Rc::clone(&self.browser);
		let base = self.base.clone();
		router.transition_to(
			location,
			Some(Box::new(move |route: &Rc<Route>| {
				browser.replace_state(&clean_path(&format!("{}{}", base, route.full_path)));
				if let Some(on_complete) = on_complete {
					on_complete(route);
				}
			})),
			on_abort,
		);
	}

	fn go(&self, _router: &Router, n: i32) {
		self.browser.go(n);
	}

	fn current_location(&self) -> String {
		get_location(&*self.browser, &self.base)
	}

	fn ensure_url(&self, router: &Router, push: bool) {
		let current = router.current_route();
		if get_location(&*self.browser, &self.base) != current.full_path {
			let url = self.url_for(&current.full_path);
			if push {
				self.browser.push_state(&url);
			} else {
				self.browser.replace_state(&url);
			}
		}
	}

	fn setup_listeners(&self, router: &Router) {
		if router.state().has_listeners() {
			return;
		}
		let weak = router.downgrade();
		let base = self.base.clone();
		let start_location = self.start_location.clone();
		let handler: Rc<dyn Fn()> = Rc::new(move || {
			let Some(router) = weak.upgrade() else { return };
			let Some(browser) = router.browser() else { return };
			let location = get_location(&*browser, &base);
			if is_start_route(&router.current_route()) && location == start_location {
				return;
			}
			router.transition_to(RawLocation::Path(location), None, None);
		});
		match self.browser.add_listener(BrowserEvent::PopState, handler) {
			Ok(handle) => router.state().add_listener(handle),
			Err(err) => router.report_error(&err),
		}
	}
}

/// `pathname + search + hash` with `base` removed (case-insensitively).
pub(crate) fn get_location(browser: &dyn Browser, base: &str) -> String {
	let pathname = browser.pathname();
	let lower_path = pathname.to_lowercase();
	let lower_base = base.to_lowercase();
	let under_base = !base.is_empty()
		&& (lower_path == lower_base
			|| lower_path.starts_with(&clean_path(&format!("{lower_base}/"))));
	let path = if under_base {
		pathname.get(base.len()..).unwrap_or_default()
	} else {
		pathname.as_str()
	};
	let path = if path.is_empty() { "/" } else { path };
	format!("{}{}{}", path, browser.search(), browser.hash())
}
