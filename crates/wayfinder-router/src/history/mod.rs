//! History back-ends.
//!
//! A back-end maps the router's current route to a URL (or an in-memory
//! stack) and feeds external location changes back into the transition
//! controller.

mod abstract_history;
mod browser;
mod hash;
mod html5;

pub(crate) use abstract_history::AbstractHistory;
#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub use browser::{WasmSpawner, WebBrowser};
pub use browser::{Browser, BrowserEvent, ListenerHandle, SimulatedBrowser};
pub(crate) use hash::HashHistory;
pub(crate) use html5::Html5History;

use crate::error::NavigationError;
use crate::location::RawLocation;
use crate::route::Route;
use crate::router::Router;
use crate::settings::RouterMode;
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;

/// Strips the scheme and host from an absolute base URL.
static ORIGIN_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^https?://[^/]+").expect("ORIGIN_RE: invalid regex pattern"));

/// Called with the committed route.
pub type CompleteFn = Box<dyn FnOnce(&Rc<Route>)>;

/// Called with the reason a navigation did not commit.
pub type AbortFn = Box<dyn FnOnce(NavigationError)>;

/// Operations every history back-end provides.
pub(crate) trait HistoryBackend {
	/// Mode this back-end implements.
	fn kind(&self) -> RouterMode;

	/// Navigates to `location`, adding a history entry.
	fn push(
		&self,
		router: &Router,
		location: RawLocation,
		on_complete: Option<CompleteFn>,
		on_abort: Option<AbortFn>,
	);

	/// Navigates to `location`, replacing the current history entry.
	fn replace(
		&self,
		router: &Router,
		location: RawLocation,
		on_complete: Option<CompleteFn>,
		on_abort: Option<AbortFn>,
	);

	/// Moves `n` entries through history.
	fn go(&self, router: &Router, n: i32);

	/// Location the back-end currently points at.
	fn current_location(&self) -> String;

	/// Makes the URL reflect the current route.
	fn ensure_url(&self, router: &Router, push: bool);

	/// Starts listening to external location changes. Calling it again is a
	/// no-op until the router is torn down.
	fn setup_listeners(&self, router: &Router);
}

/// Normalizes a base path: no origin, a leading slash and no trailing slash.
///
/// Without an explicit (non-empty) base, the document `<base href>` is used,
/// falling back to `/`. The result is `""` or `"/…"`.
pub(crate) fn normalize_base(base: Option<&str>, browser: Option<&dyn Browser>) -> String {
	let base = match base.filter(|base| !base.is_empty()) {
		Some(base) => base.to_string(),
		None => match browser {
			Some(browser) => browser
				.base_href()
				.map(|href| ORIGIN_RE.replace(&href, "").into_owned())
				.unwrap_or_else(|| "/".to_string()),
			None => "/".to_string(),
		},
	};
	let base = if base.starts_with('/') {
		base
	} else {
		format!("/{base}")
	};
	base.strip_suffix('/').unwrap_or(&base).to_string()
}

/// Builds an href for `full_path` under `base`.
pub(crate) fn create_href(base: &str, full_path: &str, mode: RouterMode) -> String {
	let path = if mode == RouterMode::Hash {
		format!("#{full_path}")
	} else {
		full_path.to_string()
	};
	if base.is_empty() {
		path
	} else {
		crate::location::clean_path(&format!("{base}/{path}"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(Some("/app/"), None, "/app")]
	#[case(Some("app"), None, "/app")]
	#[case(Some("/"), None, "")]
	#[case(None, None, "")]
	#[case(Some(""), Some("/docs/"), "/docs")]
	#[case(None, Some("http://example.com/shop/"), "/shop")]
	#[case(None, Some("https://example.com"), "")]
	fn test_normalize_base(
		#[case] base: Option<&str>,
		#[case] base_href: Option<&str>,
		#[case] expected: &str,
	) {
		let browser = base_href.map(|href| SimulatedBrowser::new("/").with_base_href(href));
		let browser = browser.as_ref().map(|b| b as &dyn Browser);
		assert_eq!(normalize_base(base, browser), expected);
	}

	#[rstest]
	#[case("", "/a?x=1", RouterMode::Hash, "#/a?x=1")]
	#[case("/app", "/a", RouterMode::Hash, "/app/#/a")]
	#[case("/app", "/a", RouterMode::History, "/app/a")]
	#[case("", "/a", RouterMode::Abstract, "/a")]
	fn test_create_href(
		#[case] base: &str,
		#[case] full_path: &str,
		#[case] mode: RouterMode,
		#[case] expected: &str,
	) {
		assert_eq!(create_href(base, full_path, mode), expected);
	}
}
