//! Error types for navigation.
//!
//! Two families are kept apart:
//!
//! - [`NavigationFailure`]: well-typed, non-fatal outcomes of a transition
//!   (duplicated, cancelled, aborted, redirected). They reach the `on_abort`
//!   callback of the originating navigation and never the `on_error`
//!   subscribers.
//! - [`RouterError`]: real errors (guard errors, async component rejections,
//!   invalid patterns). They reach both.

use crate::route::Route;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Error raised while compiling or filling a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
	/// Pattern exceeds the maximum allowed length.
	#[error("Pattern length {length} exceeds maximum allowed length of {max} bytes")]
	TooLong {
		/// Actual length in bytes.
		length: usize,
		/// Maximum length in bytes.
		max: usize,
	},
	/// Pattern has too many path segments.
	#[error("Pattern has {count} path segments, exceeding maximum of {max}")]
	TooManySegments {
		/// Actual number of segments.
		count: usize,
		/// Maximum number of segments.
		max: usize,
	},
	/// The generated regex failed to compile.
	#[error("Failed to compile pattern regex: {0}")]
	InvalidRegex(String),
	/// A required parameter was not supplied when filling a pattern.
	#[error("Expected \"{0}\" to be defined")]
	MissingParameter(String),
	/// A parameter value does not satisfy its declared pattern.
	#[error("Expected \"{name}\" to match \"{pattern}\", but received \"{value}\"")]
	ParameterMismatch {
		/// Parameter name.
		name: String,
		/// Declared pattern.
		pattern: String,
		/// Encoded value that was rejected.
		value: String,
	},
}

/// Error type for router operations that are not navigation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouterError {
	/// A route path could not be compiled.
	#[error("Invalid route pattern: {0}")]
	Pattern(#[from] PatternError),
	/// A navigation guard reported an error.
	#[error("Navigation guard error: {0}")]
	Guard(String),
	/// An async component factory rejected.
	#[error("Failed to resolve async component {outlet}: {reason}")]
	AsyncComponent {
		/// Outlet whose component failed to load.
		outlet: String,
		/// Rejection reason.
		reason: String,
	},
	/// Redirect or alias resolution did not settle within the allowed depth.
	#[error("Redirect limit of {limit} exceeded while resolving \"{path}\"")]
	RedirectLimit {
		/// Location at which resolution gave up.
		path: String,
		/// Maximum depth.
		limit: usize,
	},
	/// A future-based async component needs a local spawner.
	#[error("No local spawner configured to drive async component futures")]
	NoSpawner,
	/// Spawning an async component future failed.
	#[error("Failed to spawn async component future: {0}")]
	Spawn(String),
	/// The navigation was dropped before it completed or aborted.
	#[error("Navigation dropped before completion")]
	Dropped,
	/// A `window.location` or `window.history` call failed.
	#[error("Browser API call failed: {0}")]
	Browser(String),
	/// Router settings could not be parsed.
	#[error("Invalid router settings: {0}")]
	Settings(String),
	/// Custom error message.
	#[error("{0}")]
	Custom(String),
}

impl RouterError {
	/// Creates a guard error from any displayable message.
	pub fn guard(message: impl fmt::Display) -> Self {
		Self::Guard(message.to_string())
	}
}

/// The four kinds of navigation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationFailureKind {
	/// A guard redirected to another location.
	Redirected,
	/// A guard aborted the navigation.
	Aborted,
	/// A newer navigation superseded this one.
	Cancelled,
	/// The target is the current location.
	Duplicated,
}

/// A non-fatal navigation outcome carrying the routes involved.
#[derive(Debug, Clone)]
pub struct NavigationFailure {
	kind: NavigationFailureKind,
	from: Rc<Route>,
	to: Rc<Route>,
}

impl NavigationFailure {
	pub(crate) fn new(kind: NavigationFailureKind, from: Rc<Route>, to: Rc<Route>) -> Self {
		Self { kind, from, to }
	}

	pub(crate) fn redirected(from: &Rc<Route>, to: &Rc<Route>) -> Self {
		Self::new(NavigationFailureKind::Redirected, from.clone(), to.clone())
	}

	pub(crate) fn aborted(from: &Rc<Route>, to: &Rc<Route>) -> Self {
		Self::new(NavigationFailureKind::Aborted, from.clone(), to.clone())
	}

	pub(crate) fn cancelled(from: &Rc<Route>, to: &Rc<Route>) -> Self {
		Self::new(NavigationFailureKind::Cancelled, from.clone(), to.clone())
	}

	pub(crate) fn duplicated(from: &Rc<Route>, to: &Rc<Route>) -> Self {
		Self::new(NavigationFailureKind::Duplicated, from.clone(), to.clone())
	}

	/// Returns the failure kind.
	pub fn kind(&self) -> NavigationFailureKind {
		self.kind
	}

	/// Returns the route the navigation started from.
	pub fn from(&self) -> &Rc<Route> {
		&self.from
	}

	/// Returns the route the navigation was heading to.
	pub fn to(&self) -> &Rc<Route> {
		&self.to
	}
}

impl fmt::Display for NavigationFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind {
			NavigationFailureKind::Redirected => write!(
				f,
				"Redirected when going from \"{}\" to \"{}\" via a navigation guard.",
				self.from.full_path, self.to.full_path
			),
			NavigationFailureKind::Aborted => write!(
				f,
				"Navigation aborted from \"{}\" to \"{}\" via a navigation guard.",
				self.from.full_path, self.to.full_path
			),
			NavigationFailureKind::Cancelled => write!(
				f,
				"Navigation cancelled from \"{}\" to \"{}\" with a new navigation.",
				self.from.full_path, self.to.full_path
			),
			NavigationFailureKind::Duplicated => write!(
				f,
				"Avoided redundant navigation to current location: \"{}\".",
				self.from.full_path
			),
		}
	}
}

impl std::error::Error for NavigationFailure {}

/// The outcome of a navigation that did not commit.
#[derive(Debug, Clone, Error)]
pub enum NavigationError {
	/// A navigation failure (never reported to `on_error` subscribers).
	#[error(transparent)]
	Failure(NavigationFailure),
	/// A real error (also reported to `on_error` subscribers).
	#[error(transparent)]
	Other(RouterError),
}

impl NavigationError {
	/// Returns the navigation failure, if this is one.
	pub fn failure(&self) -> Option<&NavigationFailure> {
		match self {
			Self::Failure(failure) => Some(failure),
			Self::Other(_) => None,
		}
	}

	/// Returns the underlying router error, if this is not a navigation failure.
	pub fn router_error(&self) -> Option<&RouterError> {
		match self {
			Self::Failure(_) => None,
			Self::Other(err) => Some(err),
		}
	}
}

impl From<NavigationFailure> for NavigationError {
	fn from(failure: NavigationFailure) -> Self {
		Self::Failure(failure)
	}
}

impl From<RouterError> for NavigationError {
	fn from(err: RouterError) -> Self {
		Self::Other(err)
	}
}

/// Returns `true` if `err` is a navigation failure, optionally of the given kind.
pub fn is_navigation_failure(err: &NavigationError, kind: Option<NavigationFailureKind>) -> bool {
	match (err.failure(), kind) {
		(Some(failure), Some(kind)) => failure.kind() == kind,
		(Some(_), None) => true,
		(None, _) => false,
	}
}
