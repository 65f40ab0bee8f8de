//! Path pattern compilation.
//!
//! Patterns use the `path-to-regexp` 1.x syntax understood by most client
//! routers:
//!
//! - `/users` - Exact match
//! - `/users/:id` - Named segment (`[^/]+?`)
//! - `/users/:id(\\d+)` - Named segment with a custom class
//! - `/files/:path*` / `/files/:path+` - Zero or more / one or more segments
//! - `/users/:id?` - Optional segment (the preceding `/` is optional too)
//! - `/(\\d+)` - Unnamed group, keyed by its position (`0`, `1`, ...)
//! - `*` - Asterisk wildcard, matches any remainder including `/`
//!
//! Compiled patterns are cached per thread by `(pattern, options)`.

use crate::error::PatternError;
use crate::logging::warn_dev;
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::LazyLock;

/// Maximum allowed length for a route pattern string in bytes.
const MAX_PATTERN_LENGTH: usize = 1024;

/// Maximum allowed number of path segments in a route pattern.
const MAX_PATH_SEGMENTS: usize = 32;

/// Maximum allowed size for a compiled pattern regex (in bytes).
const MAX_REGEX_SIZE: usize = 1 << 20; // 1 MiB

/// Tokenizer for the pattern syntax.
///
/// Groups: 1 escaped char, 2 prefix, 3 name, 4 custom class, 5 unnamed group,
/// 6 modifier, 7 asterisk.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"(\\.)|([/.])?(?:(?::(\w+)(?:\(((?:\\.|[^\\()])+)\))?|\(((?:\\.|[^\\()])+)\))([+*?])?|(\*))",
	)
	.expect("TOKEN_RE: invalid regex pattern")
});

/// Characters `encodeURI` leaves alone, minus `/`, `?` and `#`.
const PRETTY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b';')
	.remove(b',')
	.remove(b':')
	.remove(b'@')
	.remove(b'&')
	.remove(b'=')
	.remove(b'+')
	.remove(b'$')
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'!')
	.remove(b'~')
	.remove(b'*')
	.remove(b'\'')
	.remove(b'(')
	.remove(b')');

/// Asterisk captures keep their `/` separators.
const ASTERISK_ENCODE_SET: &AsciiSet = &PRETTY_ENCODE_SET.remove(b'/');

thread_local! {
	static PATTERN_CACHE: RefCell<HashMap<(String, PatternOptions), Rc<PathPattern>>> =
		RefCell::new(HashMap::new());
}

/// Matching options for a compiled pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternOptions {
	/// Match case-sensitively.
	pub sensitive: bool,
	/// Disallow an optional trailing slash.
	pub strict: bool,
	/// Require the pattern to match the whole path.
	pub end: bool,
}

impl Default for PatternOptions {
	fn default() -> Self {
		Self {
			sensitive: false,
			strict: false,
			end: true,
		}
	}
}

/// A parameter declared by a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternKey {
	/// Parameter name, or its position for unnamed groups.
	pub name: String,
	/// `true` for unnamed groups and the asterisk wildcard.
	pub positional: bool,
	/// Literal prefix consumed with the parameter (`/` or `.`).
	pub prefix: String,
	/// Segment delimiter for repeated values.
	pub delimiter: String,
	/// Declared with `?` or `*`.
	pub optional: bool,
	/// Declared with `+` or `*`.
	pub repeat: bool,
	/// Followed by literal text inside the same segment.
	pub partial: bool,
	/// Bare `*` wildcard.
	pub asterisk: bool,
	/// Regex class of one value.
	pub pattern: String,
}

#[derive(Debug, Clone)]
enum Token {
	Literal(String),
	Key(usize),
}

/// A compiled path pattern.
#[derive(Debug)]
pub struct PathPattern {
	/// The original pattern string.
	source: String,
	/// Options the pattern was compiled with.
	options: PatternOptions,
	tokens: Vec<Token>,
	keys: Vec<PatternKey>,
	/// Compiled matcher.
	regex: Regex,
	/// One `^(?:class)$` validator per key, used when filling.
	validators: Vec<Regex>,
}

impl PathPattern {
	/// Compiles `pattern`, reusing a cached compilation when available.
	///
	/// # Errors
	///
	/// Returns [`PatternError`] if the pattern exceeds the length or segment
	/// limits, or compiles to an invalid regex.
	pub fn compile(pattern: &str, options: PatternOptions) -> Result<Rc<Self>, PatternError> {
		let cache_key = (pattern.to_string(), options);
		if let Some(cached) = PATTERN_CACHE.with(|cache| cache.borrow().get(&cache_key).cloned()) {
			return Ok(cached);
		}
		let compiled = Rc::new(Self::new(pattern, options)?);
		PATTERN_CACHE.with(|cache| cache.borrow_mut().insert(cache_key, compiled.clone()));
		Ok(compiled)
	}

	/// Compiles `pattern` without consulting the cache.
	pub fn new(pattern: &str, options: PatternOptions) -> Result<Self, PatternError> {
		// Reject patterns exceeding the maximum length to prevent ReDoS
		if pattern.len() > MAX_PATTERN_LENGTH {
			return Err(PatternError::TooLong {
				length: pattern.len(),
				max: MAX_PATTERN_LENGTH,
			});
		}

		let segment_count = pattern.split('/').count();
		if segment_count > MAX_PATH_SEGMENTS {
			return Err(PatternError::TooManySegments {
				count: segment_count,
				max: MAX_PATH_SEGMENTS,
			});
		}

		let (tokens, keys) = Self::parse(pattern);

		let mut seen = HashSet::new();
		for key in &keys {
			if !seen.insert(key.name.as_str()) {
				warn_dev!("Duplicate param keys in route with path: \"{}\"", pattern);
			}
		}

		let regex_str = Self::tokens_to_regex(&tokens, &keys, options);
		let regex = Self::build_regex(&regex_str, options.sensitive)?;
		let validators = keys
			.iter()
			.map(|key| Self::build_regex(&format!("^(?:{})$", key.pattern), options.sensitive))
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self {
			source: pattern.to_string(),
			options,
			tokens,
			keys,
			regex,
			validators,
		})
	}

	fn build_regex(source: &str, sensitive: bool) -> Result<Regex, PatternError> {
		// Use RegexBuilder with size limits to prevent memory exhaustion
		RegexBuilder::new(source)
			.case_insensitive(!sensitive)
			.size_limit(MAX_REGEX_SIZE)
			.build()
			.map_err(|e| PatternError::InvalidRegex(e.to_string()))
	}

	/// Splits a pattern into literal text and parameter keys.
	fn parse(pattern: &str) -> (Vec<Token>, Vec<PatternKey>) {
		let mut tokens = Vec::new();
		let mut keys = Vec::new();
		let mut positional = 0usize;
		let mut index = 0usize;
		let mut literal = String::new();

		for caps in TOKEN_RE.captures_iter(pattern) {
			let Some(whole) = caps.get(0) else { continue };
			literal.push_str(&pattern[index..whole.start()]);
			index = whole.end();

			if let Some(escaped) = caps.get(1) {
				literal.push_str(&escaped.as_str()[1..]);
				continue;
			}

			let next = pattern[index..].chars().next();
			let prefix = caps.get(2).map(|m| m.as_str());
			let name = caps.get(3).map(|m| m.as_str());
			let class = caps.get(4).or_else(|| caps.get(5)).map(|m| m.as_str());
			let modifier = caps.get(6).map(|m| m.as_str());
			let asterisk = caps.get(7).is_some();

			if !literal.is_empty() {
				tokens.push(Token::Literal(std::mem::take(&mut literal)));
			}

			let partial = match (prefix, next) {
				(Some(prefix), Some(next)) => !prefix.starts_with(next),
				_ => false,
			};
			let delimiter = prefix.unwrap_or("/").to_string();
			let pattern = match class {
				Some(class) => escape_group(class),
				None if asterisk => ".*".to_string(),
				None => format!("[^{}]+?", regex::escape(&delimiter)),
			};
			let (name, positional_key) = match name {
				Some(name) => (name.to_string(), false),
				None => {
					let name = positional.to_string();
					positional += 1;
					(name, true)
				}
			};

			tokens.push(Token::Key(keys.len()));
			keys.push(PatternKey {
				name,
				positional: positional_key,
				prefix: prefix.unwrap_or_default().to_string(),
				delimiter,
				optional: matches!(modifier, Some("?") | Some("*")),
				repeat: matches!(modifier, Some("+") | Some("*")),
				partial,
				asterisk,
				pattern,
			});
		}

		literal.push_str(&pattern[index..]);
		if !literal.is_empty() {
			tokens.push(Token::Literal(literal));
		}
		(tokens, keys)
	}

	/// Builds the matcher regex from parsed tokens.
	///
	/// The `regex` crate has no lookahead, so the boundary checks are written
	/// as consuming alternatives anchored at `$`.
	fn tokens_to_regex(tokens: &[Token], keys: &[PatternKey], options: PatternOptions) -> String {
		let mut route = String::new();
		for token in tokens {
			match token {
				Token::Literal(text) => route.push_str(&regex::escape(text)),
				Token::Key(i) => {
					let key = &keys[*i];
					let prefix = regex::escape(&key.prefix);
					let mut capture = format!("(?:{})", key.pattern);
					if key.repeat {
						capture = format!("{capture}(?:{prefix}{capture})*");
					}
					let capture = if key.optional {
						if key.partial {
							format!("{prefix}({capture})?")
						} else {
							format!("(?:{prefix}({capture}))?")
						}
					} else {
						format!("{prefix}({capture})")
					};
					route.push_str(&capture);
				}
			}
		}

		let delimiter = "/";
		let ends_with_delimiter = route.ends_with(delimiter);
		if !options.strict && ends_with_delimiter {
			route.truncate(route.len() - delimiter.len());
		}

		match (options.end, options.strict) {
			(true, false) => route.push_str("/?$"),
			(true, true) => route.push('$'),
			// A strict prefix ending in `/` already stops at a boundary.
			(false, true) if ends_with_delimiter => {}
			(false, _) => route.push_str("(?:/.*)?$"),
		}

		format!("^{route}")
	}

	/// Returns the original pattern string.
	pub fn source(&self) -> &str {
		&self.source
	}

	/// Returns the options the pattern was compiled with.
	pub fn options(&self) -> PatternOptions {
		self.options
	}

	/// Returns the declared parameter keys in order.
	pub fn keys(&self) -> &[PatternKey] {
		&self.keys
	}

	/// Returns `true` if `path` matches.
	pub fn is_match(&self, path: &str) -> bool {
		self.regex.is_match(path)
	}

	/// Matches `path` and returns the raw (still encoded) value of each key.
	///
	/// The returned vector is parallel to [`keys`](Self::keys); keys whose
	/// optional group did not participate are `None`.
	pub fn captures(&self, path: &str) -> Option<Vec<Option<String>>> {
		self.regex.captures(path).map(|caps| {
			(0..self.keys.len())
				.map(|i| caps.get(i + 1).map(|m| m.as_str().to_string()))
				.collect()
		})
	}

	/// Builds a path from `params`, the reverse of [`captures`](Self::captures).
	///
	/// Values are percent-encoded, keeping the characters `encodeURI` keeps
	/// except the segment separators. Values of repeated keys may contain
	/// several `/`-separated segments.
	///
	/// # Errors
	///
	/// Returns [`PatternError::MissingParameter`] when a required key has no
	/// value and [`PatternError::ParameterMismatch`] when a value does not
	/// satisfy its declared class.
	pub fn fill(&self, params: &IndexMap<String, String>) -> Result<String, PatternError> {
		let mut path = String::new();
		for token in &self.tokens {
			let i = match token {
				Token::Literal(text) => {
					path.push_str(text);
					continue;
				}
				Token::Key(i) => *i,
			};
			let key = &self.keys[i];
			let Some(value) = params.get(&key.name) else {
				if key.optional {
					if key.partial {
						path.push_str(&key.prefix);
					}
					continue;
				}
				return Err(PatternError::MissingParameter(key.name.clone()));
			};

			if key.repeat && !key.asterisk {
				let segments: Vec<&str> = value.split('/').filter(|s| !s.is_empty()).collect();
				if segments.is_empty() {
					if key.optional {
						continue;
					}
					return Err(PatternError::MissingParameter(key.name.clone()));
				}
				for (n, segment) in segments.iter().enumerate() {
					let encoded = utf8_percent_encode(segment, PRETTY_ENCODE_SET).to_string();
					self.validate(i, &encoded)?;
					path.push_str(if n == 0 { &key.prefix } else { &key.delimiter });
					path.push_str(&encoded);
				}
				continue;
			}

			let set = if key.asterisk {
				ASTERISK_ENCODE_SET
			} else {
				PRETTY_ENCODE_SET
			};
			let encoded = utf8_percent_encode(value, set).to_string();
			self.validate(i, &encoded)?;
			path.push_str(&key.prefix);
			path.push_str(&encoded);
		}
		Ok(path)
	}

	fn validate(&self, index: usize, segment: &str) -> Result<(), PatternError> {
		if self.validators[index].is_match(segment) {
			Ok(())
		} else {
			let key = &self.keys[index];
			Err(PatternError::ParameterMismatch {
				name: key.name.clone(),
				pattern: key.pattern.clone(),
				value: segment.to_string(),
			})
		}
	}
}

/// Escapes the characters of a custom class that would open groups or
/// break the enclosing expression.
fn escape_group(group: &str) -> String {
	let mut escaped = String::with_capacity(group.len());
	for c in group.chars() {
		if matches!(c, '=' | '!' | ':' | '$' | '/' | '(' | ')') {
			escaped.push('\\');
		}
		escaped.push(c);
	}
	escaped
}
