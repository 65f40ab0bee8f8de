//! Query string parsing and serialization.
//!
//! Keys keep their insertion order. A key without `=` parses to
//! [`QueryValue::Null`] and repeated keys collect into a list.

use crate::logging::warn_dev;
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// `encodeURIComponent` minus `!'()*`, with `,` left readable.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'~')
	.remove(b',');

/// A single query value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
	/// A key present without a value (`?flag`).
	Null,
	/// A single value.
	Value(String),
	/// A key repeated several times; `None` entries are bare keys.
	List(Vec<Option<String>>),
}

impl QueryValue {
	/// Returns the first value, if any.
	pub fn first(&self) -> Option<&str> {
		match self {
			Self::Null => None,
			Self::Value(value) => Some(value),
			Self::List(values) => values.iter().flatten().next().map(String::as_str),
		}
	}

	fn push(&mut self, value: Option<String>) {
		let previous = std::mem::replace(self, Self::Null);
		*self = match previous {
			Self::Null => Self::List(vec![None, value]),
			Self::Value(existing) => Self::List(vec![Some(existing), value]),
			Self::List(mut values) => {
				values.push(value);
				Self::List(values)
			}
		};
	}
}

impl From<&str> for QueryValue {
	fn from(value: &str) -> Self {
		Self::Value(value.to_string())
	}
}

impl From<String> for QueryValue {
	fn from(value: String) -> Self {
		Self::Value(value)
	}
}

impl From<Option<String>> for QueryValue {
	fn from(value: Option<String>) -> Self {
		value.map_or(Self::Null, Self::Value)
	}
}

impl From<Vec<String>> for QueryValue {
	fn from(values: Vec<String>) -> Self {
		Self::List(values.into_iter().map(Some).collect())
	}
}

/// An ordered query map.
pub type Query = IndexMap<String, QueryValue>;

/// Custom query parser.
pub type ParseQueryFn = Rc<dyn Fn(&str) -> Query>;

/// Custom query serializer; must include the leading `?` when non-empty.
pub type StringifyQueryFn = Rc<dyn Fn(&Query) -> String>;

/// Percent-encodes a query key or value.
pub fn encode(value: &str) -> String {
	utf8_percent_encode(value, QUERY_ENCODE_SET).to_string()
}

/// Decodes a percent-encoded component, returning the input unchanged when it
/// is not valid UTF-8.
pub fn decode(value: &str) -> String {
	match percent_decode_str(value).decode_utf8() {
		Ok(decoded) => decoded.into_owned(),
		Err(_) => {
			warn_dev!("Error decoding \"{}\". Leaving it intact.", value);
			value.to_string()
		}
	}
}

/// Parses a query string (with or without a leading `?`, `#` or `&`).
pub fn parse_query(query: &str) -> Query {
	let mut result = Query::new();
	let query = query.trim();
	let query = query
		.strip_prefix(['?', '#', '&'])
		.unwrap_or(query);
	if query.is_empty() {
		return result;
	}

	for param in query.split('&') {
		let param = param.replace('+', " ");
		let (key, value) = match param.split_once('=') {
			Some((key, value)) => (decode(key), Some(decode(value))),
			None => (decode(&param), None),
		};
		match result.get_mut(&key) {
			Some(existing) => existing.push(value),
			None => {
				result.insert(key, value.into());
			}
		}
	}
	result
}

/// Serializes a query map to `?a=1&b` form, or `""` when empty.
pub fn stringify_query(query: &Query) -> String {
	let parts: Vec<String> = query
		.iter()
		.map(|(key, value)| match value {
			QueryValue::Null => encode(key),
			QueryValue::Value(value) => format!("{}={}", encode(key), encode(value)),
			QueryValue::List(values) => values
				.iter()
				.map(|value| match value {
					Some(value) => format!("{}={}", encode(key), encode(value)),
					None => encode(key),
				})
				.collect::<Vec<_>>()
				.join("&"),
		})
		.filter(|part| !part.is_empty())
		.collect();

	if parts.is_empty() {
		String::new()
	} else {
		format!("?{}", parts.join("&"))
	}
}

/// Query parse/stringify pair used by the matcher, overridable per router.
#[derive(Clone, Default)]
pub struct QueryCodec {
	parse: Option<ParseQueryFn>,
	stringify: Option<StringifyQueryFn>,
}

impl QueryCodec {
	/// Creates a codec with optional custom functions.
	pub fn new(parse: Option<ParseQueryFn>, stringify: Option<StringifyQueryFn>) -> Self {
		Self { parse, stringify }
	}

	/// Parses a raw query string.
	pub fn parse(&self, query: &str) -> Query {
		match &self.parse {
			Some(parse) => parse(query),
			None => parse_query(query),
		}
	}

	/// Serializes a query map.
	pub fn stringify(&self, query: &Query) -> String {
		match &self.stringify {
			Some(stringify) => stringify(query),
			None => stringify_query(query),
		}
	}
}

impl fmt::Debug for QueryCodec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("QueryCodec")
			.field("custom_parse", &self.parse.is_some())
			.field("custom_stringify", &self.stringify.is_some())
			.finish()
	}
}
