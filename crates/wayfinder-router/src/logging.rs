//! Development diagnostics for the router.
//!
//! Configuration mistakes (duplicate route names, missing params, invalid
//! redirects) are reported through `tracing` while `debug_assertions` are
//! enabled. Release builds compile the macro to a no-op, matching the
//! "production is silent" contract of the matcher.
//!
//! ## Example
//!
//! ```ignore
//! warn_dev!("Duplicate named routes definition: {{ name: \"{}\", path: \"{}\" }}", name, path);
//! ```

/// Logs a development warning (requires `debug_assertions`).
#[cfg(debug_assertions)]
macro_rules! warn_dev {
	($($arg:tt)*) => {{
		::tracing::warn!(target: "wayfinder", "[wayfinder] {}", format!($($arg)*));
	}};
}

/// No-op warn_dev in release builds
#[cfg(not(debug_assertions))]
macro_rules! warn_dev {
	($($arg:tt)*) => {{
		let _ = format_args!($($arg)*);
	}};
}

pub(crate) use warn_dev;
