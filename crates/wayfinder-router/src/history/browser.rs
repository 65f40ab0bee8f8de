//! The browser surface used by the hash and HTML5 back-ends.
//!
//! [`Browser`] covers the few `window.location` / `window.history` calls the
//! router needs. [`SimulatedBrowser`] implements it in memory with an entry
//! list and an event queue, for tests and server-side use. On `wasm32` with
//! the `web` feature, [`WebBrowser`] forwards to the real DOM.

use crate::error::RouterError;
use crate::location::parse_path;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Events the router listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserEvent {
	/// `popstate`
	PopState,
	/// `hashchange`
	HashChange,
}

impl BrowserEvent {
	/// DOM event name.
	pub fn name(self) -> &'static str {
		match self {
			Self::PopState => "popstate",
			Self::HashChange => "hashchange",
		}
	}
}

/// Removes an event listener.
pub type ListenerHandle = Box<dyn FnOnce()>;

/// Access to the browser location and session history.
pub trait Browser {
	/// `location.pathname`
	fn pathname(&self) -> String;
	/// `location.search`, including `?` when non-empty.
	fn search(&self) -> String;
	/// `location.hash`, including `#` when non-empty.
	fn hash(&self) -> String;
	/// `location.href`
	fn href(&self) -> String;
	/// Returns `true` if `history.pushState` is available.
	fn supports_push_state(&self) -> bool;
	/// `history.pushState(_, "", url)`
	fn push_state(&self, url: &str);
	/// `history.replaceState(_, "", url)`
	fn replace_state(&self, url: &str);
	/// `location.hash = hash`
	fn set_hash(&self, hash: &str);
	/// `location.replace(url)`
	fn location_replace(&self, url: &str);
	/// `history.go(delta)`
	fn go(&self, delta: i32);
	/// `href` of the document `<base>` element.
	fn base_href(&self) -> Option<String>;
	/// Adds an event listener; the returned handle removes it.
	///
	/// # Errors
	///
	/// Returns [`RouterError::Browser`] if the listener could not be
	/// registered.
	fn add_listener(
		&self,
		event: BrowserEvent,
		handler: Rc<dyn Fn()>,
	) -> Result<ListenerHandle, RouterError>;
}

/// Returns the part of the URL after the first `#`.
pub(crate) fn get_hash(browser: &dyn Browser) -> String {
	let href = browser.href();
	match href.find('#') {
		Some(index) => href[index + 1..].to_string(),
		None => String::new(),
	}
}

struct Listener {
	id: u64,
	event: BrowserEvent,
	handler: Rc<dyn Fn()>,
}

/// An in-memory browser.
///
/// History calls update an entry list the way a browser would, without
/// firing events. Hash assignment, `location.replace` and `go` queue the
/// events a browser would fire; they are delivered by
/// [`dispatch_events`](Self::dispatch_events), standing in for the event
/// loop.
pub struct SimulatedBrowser {
	origin: String,
	entries: RefCell<Vec<String>>,
	index: Cell<usize>,
	push_state_supported: bool,
	listeners_supported: bool,
	base_href: Option<String>,
	listeners: Rc<RefCell<Vec<Listener>>>,
	next_listener_id: Cell<u64>,
	queued: RefCell<VecDeque<BrowserEvent>>,
	reloads: Cell<usize>,
}

impl SimulatedBrowser {
	/// Opens `url` (an absolute path, optionally with query and hash).
	pub fn new(url: &str) -> Self {
		Self {
			origin: "http://localhost".to_string(),
			entries: RefCell::new(vec![normalize_entry(url)]),
			index: Cell::new(0),
			push_state_supported: true,
			listeners_supported: true,
			base_href: None,
			listeners: Rc::new(RefCell::new(Vec::new())),
			next_listener_id: Cell::new(0),
			queued: RefCell::new(VecDeque::new()),
			reloads: Cell::new(0),
		}
	}

	/// Disables the History API.
	pub fn without_push_state(mut self) -> Self {
		self.push_state_supported = false;
		self
	}

	/// Makes every `addEventListener` call fail.
	pub fn without_listeners(mut self) -> Self {
		self.listeners_supported = false;
		self
	}

	/// Sets the `<base href>` of the document.
	pub fn with_base_href(mut self, href: impl Into<String>) -> Self {
		self.base_href = Some(href.into());
		self
	}

	/// Current URL relative to the origin.
	pub fn url(&self) -> String {
		self.entries.borrow()[self.index.get()].clone()
	}

	/// Number of session history entries.
	pub fn history_len(&self) -> usize {
		self.entries.borrow().len()
	}

	/// Index of the current entry.
	pub fn history_index(&self) -> usize {
		self.index.get()
	}

	/// Number of full page loads triggered through `location.replace`.
	pub fn reloads(&self) -> usize {
		self.reloads.get()
	}

	/// Number of registered listeners.
	pub fn listener_count(&self) -> usize {
		self.listeners.borrow().len()
	}

	/// Number of events waiting for dispatch.
	pub fn pending_events(&self) -> usize {
		self.queued.borrow().len()
	}

	/// Simulates the user following a link to `url`, which pushes an entry.
	///
	/// A change of the hash alone fires `popstate` and `hashchange`.
	pub fn visit(&self, url: &str) {
		let url = self.resolve(url);
		let previous = self.url();
		self.push_entry(url.clone());
		if same_document(&previous, &url) {
			self.queue_hash_events(&previous, &url);
		} else {
			self.reloads.set(self.reloads.get() + 1);
		}
	}

	/// Delivers queued events to listeners, including events queued while
	/// dispatching. Returns the number of events delivered.
	pub fn dispatch_events(&self) -> usize {
		let mut delivered = 0;
		loop {
			let Some(event) = self.queued.borrow_mut().pop_front() else {
				return delivered;
			};
			let handlers: Vec<Rc<dyn Fn()>> = self
				.listeners
				.borrow()
				.iter()
				.filter(|listener| listener.event == event)
				.map(|listener| Rc::clone(&listener.handler))
				.collect();
			for handler in handlers {
				handler();
			}
			delivered += 1;
		}
	}

	fn resolve(&self, url: &str) -> String {
		let url = url.strip_prefix(self.origin.as_str()).unwrap_or(url);
		if url.starts_with('#') {
			let current = self.url();
			let parsed = parse_path(&current);
			let search = if parsed.query.is_empty() {
				String::new()
			} else {
				format!("?{}", parsed.query)
			};
			return format!("{}{}{}", parsed.path, search, url);
		}
		if url.starts_with('?') {
			return format!("{}{}", parse_path(&self.url()).path, url);
		}
		normalize_entry(url)
	}

	fn push_entry(&self, url: String) {
		let mut entries = self.entries.borrow_mut();
		entries.truncate(self.index.get() + 1);
		entries.push(url);
		self.index.set(entries.len() - 1);
	}

	fn queue_hash_events(&self, previous: &str, next: &str) {
		let mut queued = self.queued.borrow_mut();
		queued.push_back(BrowserEvent::PopState);
		if parse_path(previous).hash != parse_path(next).hash {
			queued.push_back(BrowserEvent::HashChange);
		}
	}
}

/// Ensures an entry starts with `/`.
fn normalize_entry(url: &str) -> String {
	if url.starts_with('/') {
		url.to_string()
	} else {
		format!("/{url}")
	}
}

/// Returns `true` when two URLs differ at most in their hash.
fn same_document(a: &str, b: &str) -> bool {
	let a = parse_path(a);
	let b = parse_path(b);
	a.path == b.path && a.query == b.query
}

impl Browser for SimulatedBrowser {
	fn pathname(&self) -> String {
		parse_path(&self.url()).path.to_string()
	}

	fn search(&self) -> String {
		let url = self.url();
		let query = parse_path(&url).query;
		if query.is_empty() {
			String::new()
		} else {
			format!("?{query}")
		}
	}

	fn hash(&self) -> String {
		let url = self.url();
		let hash = parse_path(&url).hash;
		if hash == "#" { String::new() } else { hash.to_string() }
	}

	fn href(&self) -> String {
		format!("{}{}", self.origin, self.url())
	}

	fn supports_push_state(&self) -> bool {
		self.push_state_supported
	}

	fn push_state(&self, url: &str) {
		let url = self.resolve(url);
		self.push_entry(url);
	}

	fn replace_state(&self, url: &str) {
		let url = self.resolve(url);
		let index = self.index.get();
		self.entries.borrow_mut()[index] = url;
	}

	fn set_hash(&self, hash: &str) {
		let hash = hash.strip_prefix('#').unwrap_or(hash);
		let target = self.resolve(&format!("#{hash}"));
		if target != self.url() {
			self.visit(&target);
		}
	}

	fn location_replace(&self, url: &str) {
		let url = self.resolve(url);
		let previous = self.url();
		let index = self.index.get();
		self.entries.borrow_mut()[index] = url.clone();
		if !same_document(&previous, &url) {
			self.reloads.set(self.reloads.get() + 1);
		} else if previous != url {
			self.queue_hash_events(&previous, &url);
		}
	}

	fn go(&self, delta: i32) {
		let target = self.index.get() as i64 + i64::from(delta);
		if delta == 0 || target < 0 || target >= self.history_len() as i64 {
			return;
		}
		let previous = self.url();
		self.index.set(target as usize);
		let next = self.url();
		self.queue_hash_events(&previous, &next);
	}

	fn base_href(&self) -> Option<String> {
		self.base_href.clone()
	}

	fn add_listener(
		&self,
		event: BrowserEvent,
		handler: Rc<dyn Fn()>,
	) -> Result<ListenerHandle, RouterError> {
		if !self.listeners_supported {
			return Err(RouterError::Browser(format!(
				"addEventListener(\"{}\") is not available",
				event.name()
			)));
		}
		let id = self.next_listener_id.get();
		self.next_listener_id.set(id + 1);
		self.listeners.borrow_mut().push(Listener { id, event, handler });

		let listeners = Rc::downgrade(&self.listeners);
		Ok(Box::new(move || {
			if let Some(listeners) = listeners.upgrade() {
				listeners.borrow_mut().retain(|listener| listener.id != id);
			}
		}))
	}
}

impl fmt::Debug for SimulatedBrowser {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SimulatedBrowser")
			.field("entries", &self.entries.borrow())
			.field("index", &self.index.get())
			.field("push_state_supported", &self.push_state_supported)
			.field("listeners", &self.listeners.borrow().len())
			.field("queued", &self.queued.borrow())
			.finish()
	}
}

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod web {
	use super::{Browser, BrowserEvent, ListenerHandle};
	use crate::error::RouterError;
	use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
	use std::rc::Rc;
	use wasm_bindgen::JsCast;
	use wasm_bindgen::JsValue;
	use wasm_bindgen::closure::Closure;

	/// The real browser, through `web-sys`.
	#[derive(Debug, Clone)]
	pub struct WebBrowser {
		window: web_sys::Window,
	}

	impl WebBrowser {
		/// Returns the browser of the current window, if any.
		pub fn new() -> Option<Self> {
			web_sys::window().map(|window| Self { window })
		}

		fn location(&self) -> web_sys::Location {
			self.window.location()
		}

		fn history(&self) -> Option<web_sys::History> {
			self.window.history().ok()
		}
	}

	impl Browser for WebBrowser {
		fn pathname(&self) -> String {
			self.location().pathname().unwrap_or_default()
		}

		fn search(&self) -> String {
			self.location().search().unwrap_or_default()
		}

		fn hash(&self) -> String {
			self.location().hash().unwrap_or_default()
		}

		fn href(&self) -> String {
			self.location().href().unwrap_or_default()
		}

		fn supports_push_state(&self) -> bool {
			self.history().is_some()
		}

		fn push_state(&self, url: &str) {
			if let Some(history) = self.history() {
				if let Err(err) = history.push_state_with_url(&JsValue::NULL, "", Some(url)) {
					tracing::error!("pushState failed, falling back to location.assign: {:?}", err);
					if let Err(err) = self.location().assign(url) {
						tracing::error!("location.assign failed: {:?}", err);
					}
				}
			}
		}

		fn replace_state(&self, url: &str) {
			if let Some(history) = self.history() {
				if let Err(err) = history.replace_state_with_url(&JsValue::NULL, "", Some(url)) {
					tracing::error!("replaceState failed, falling back to location.replace: {:?}", err);
					self.location_replace(url);
				}
			}
		}

		fn set_hash(&self, hash: &str) {
			if let Err(err) = self.location().set_hash(hash) {
				tracing::error!("setting location.hash failed: {:?}", err);
			}
		}

		fn location_replace(&self, url: &str) {
			if let Err(err) = self.location().replace(url) {
				tracing::error!("location.replace failed: {:?}", err);
			}
		}

		fn go(&self, delta: i32) {
			if let Some(history) = self.history() {
				if let Err(err) = history.go_with_delta(delta) {
					tracing::error!("history.go({}) failed: {:?}", delta, err);
				}
			}
		}

		fn base_href(&self) -> Option<String> {
			let document = self.window.document()?;
			let base = document.query_selector("base").ok()??;
			base.get_attribute("href")
		}

		fn add_listener(
			&self,
			event: BrowserEvent,
			handler: Rc<dyn Fn()>,
		) -> Result<ListenerHandle, RouterError> {
			let closure = Closure::<dyn Fn()>::new(move || handler());
			let target: web_sys::EventTarget = self.window.clone().unchecked_into();
			target
				.add_event_listener_with_callback(event.name(), closure.as_ref().unchecked_ref())
				.map_err(|err| {
					RouterError::Browser(format!("addEventListener(\"{}\"): {:?}", event.name(), err))
				})?;
			Ok(Box::new(move || {
				if let Err(err) = target.remove_event_listener_with_callback(
					event.name(),
					closure.as_ref().unchecked_ref(),
				) {
					tracing::error!("removeEventListener(\"{}\") failed: {:?}", event.name(), err);
				}
				drop(closure);
			}))
		}
	}

	/// Spawns async component futures on the browser event loop.
	#[derive(Debug, Clone, Copy, Default)]
	pub struct WasmSpawner;

	impl LocalSpawn for WasmSpawner {
		fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
			wasm_bindgen_futures::spawn_local(future);
			Ok(())
		}
	}
}

#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub use web::{WasmSpawner, WebBrowser};
