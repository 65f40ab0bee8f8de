//! Hash history: the location lives after `#` in the URL.

use super::browser::get_hash;
use super::html5::get_location;
use super::{AbortFn, Browser, BrowserEvent, CompleteFn, HistoryBackend};
use crate::location::{RawLocation, clean_path};
use crate::route::Route;
use crate::router::Router;
use crate::settings::RouterMode;
use std::rc::Rc;

pub(crate) struct HashHistory {
	browser: Rc<dyn Browser>,
}

impl HashHistory {
	/// Creates the back-end and normalizes the URL.
	///
	/// With `fallback` (history mode requested without History API support)
	/// a history-style URL is first moved into the hash, which reloads the
	/// page.
	pub(crate) fn new(browser: Rc<dyn Browser>, base: &str, fallback: bool) -> Self {
		if !(fallback && migrate_to_hash(&*browser, base)) {
			ensure_slash(&*browser);
		}
		Self { browser }
	}
}

impl HistoryBackend for HashHistory {
	fn kind(&self) -> RouterMode {
		RouterMode::Hash
	}

	fn push(
		&self,
		router: &Router,
		location: RawLocation,
		on_complete: Option<CompleteFn>,
		on_abort: Option<AbortFn>,
	) {
		let browser = Rc::clone(&self.browser);
		router.transition_to(
			location,
			Some(Box::new(move |route: &Rc<Route>| {
				push_hash(&*browser, &route.full_path);
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
		router.transition_to(
			location,
			Some(Box::new(move |route: &Rc<Route>| {
				replace_hash(&*browser, &route.full_path);
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
		get_hash(&*self.browser)
	}

	fn ensure_url(&self, router: &Router, push: bool) {
		let current = router.current_route();
		if get_hash(&*self.browser) != current.full_path {
			if push {
				push_hash(&*self.browser, &current.full_path);
			} else {
				replace_hash(&*self.browser, &current.full_path);
			}
		}
	}

	fn setup_listeners(&self, router: &Router) {
		if router.state().has_listeners() {
			return;
		}
		let push_supported = self.browser.supports_push_state();
		let weak = router.downgrade();
		let handler: Rc<dyn Fn()> = Rc::new(move || {
			let Some(router) = weak.upgrade() else { return };
			let Some(browser) = router.browser() else { return };
			if !ensure_slash(&*browser) {
				return;
			}
			let location = get_hash(&*browser);
			router.transition_to(
				RawLocation::Path(location),
				Some(Box::new(move |route: &Rc<Route>| {
					if !push_supported {
						replace_hash(&*browser, &route.full_path);
					}
				})),
				None,
			);
		});
		let event = if push_supported {
			BrowserEvent::PopState
		} else {
			BrowserEvent::HashChange
		};
		match self.browser.add_listener(event, handler) {
			Ok(handle) => router.state().add_listener(handle),
			Err(err) => router.report_error(&err),
		}
	}
}

/// Rewrites `/base/path` into `/base/#/path`. Returns `true` if the page
/// had to be replaced.
fn migrate_to_hash(browser: &dyn Browser, base: &str) -> bool {
	let location = get_location(browser, base);
	if location.starts_with("/#") {
		return false;
	}
	browser.location_replace(&clean_path(&format!("{base}/#{location}")));
	true
}

/// Makes the hash start with `/`. Returns `false` if it had to be rewritten.
fn ensure_slash(browser: &dyn Browser) -> bool {
	let path = get_hash(browser);
	if path.starts_with('/') {
		return true;
	}
	replace_hash(browser, &format!("/{path}"));
	false
}

/// The current URL with its hash replaced by `path`.
fn url_with_hash(browser: &dyn Browser, path: &str) -> String {
	let href = browser.href();
	let base = href.split_once('#').map_or(href.as_str(), |(base, _)| base);
	format!("{base}#{path}")
}

fn push_hash(browser: &dyn Browser, path: &str) {
	if browser.supports_push_state() {
		browser.push_state(&url_with_hash(browser, path));
	} else {
		browser.set_hash(path);
	}
}

fn replace_hash(browser: &dyn Browser, path: &str) {
	if browser.supports_push_state() {
		browser.replace_state(&url_with_hash(browser, path));
	} else {
		browser.location_replace(&url_with_hash(browser, path));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::history::SimulatedBrowser;
	use rstest::rstest;

	#[rstest]
	#[case("/", "/#/")]
	#[case("/#foo", "/#/foo")]
	#[case("/#/already", "/#/already")]
	fn test_new_ensures_slash(#[case] url: &str, #[case] expected: &str) {
		let browser = Rc::new(SimulatedBrowser::new(url));
		HashHistory::new(browser.clone(), "", false);
		assert_eq!(browser.url(), expected);
		assert_eq!(browser.history_len(), 1);
	}

	#[rstest]
	fn test_fallback_moves_path_into_hash() {
		let browser = Rc::new(SimulatedBrowser::new("/app/users/1?tab=a").without_push_state());
		HashHistory::new(browser.clone(), "/app", true);
		assert_eq!(browser.url(), "/app/#/users/1?tab=a");
		assert_eq!(browser.reloads(), 1);
	}

	#[rstest]
	fn test_fallback_keeps_hash_urls() {
		let browser = Rc::new(SimulatedBrowser::new("/app/#/users").without_push_state());
		HashHistory::new(browser.clone(), "/app", true);
		assert_eq!(browser.url(), "/app/#/users");
		assert_eq!(browser.reloads(), 0);
	}

	#[rstest]
	fn test_push_hash_without_push_state_assigns_hash() {
		let browser = SimulatedBrowser::new("/#/").without_push_state();
		push_hash(&browser, "/a");
		assert_eq!(browser.url(), "/#/a");
		assert_eq!(browser.history_len(), 2);
		assert_eq!(browser.pending_events(), 2);
	}

	#[rstest]
	fn test_replace_hash_keeps_entry_count() {
		let browser = SimulatedBrowser::new("/?x=1#/a");
		replace_hash(&browser, "/b");
		assert_eq!(browser.url(), "/?x=1#/b");
		assert_eq!(browser.history_len(), 1);
		assert_eq!(browser.pending_events(), 0);
	}
}
