//! Conversion between raw directory values and typed values.
//!
//! The directory transports every value as an octet string. How those octets
//! are to be read is decided by the syntax of the attribute, as published in
//! the server schema and resolved by [`SchemaDescription`].

use std::fmt;

use crate::{
	error::{Error, Result},
	schema::{syntax, SchemaDescription},
};

/// How values of a syntax are represented in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
	/// UTF-8 text: directory strings, DNs, OIDs, telephone numbers and the
	/// like.
	Text,
	/// Base-10 integers. Values outside the `i64` range decode as raw bytes.
	Integer,
	/// `TRUE` or `FALSE`.
	Boolean,
	/// Anything else, kept as raw bytes. Password hashes and certificates
	/// fall in here.
	Opaque,
}

impl SyntaxKind {
	/// Classify a syntax OID.
	#[must_use]
	pub fn from_oid(oid: &str) -> Self {
		match oid {
			syntax::DIRECTORY_STRING
			| syntax::IA5_STRING
			| syntax::OID
			| syntax::TELEPHONE_NUMBER
			| syntax::DN
			| syntax::PRINTABLE_STRING
			| syntax::NUMERIC_STRING => SyntaxKind::Text,
			syntax::INTEGER => SyntaxKind::Integer,
			syntax::BOOLEAN => SyntaxKind::Boolean,
			_ => SyntaxKind::Opaque,
		}
	}

	/// Whether a value may be written to an attribute of this kind. Raw bytes
	/// are always accepted.
	#[must_use]
	pub fn accepts(self, value: &Value) -> bool {
		matches!(
			(self, value),
			(_, Value::Bytes(_))
				| (SyntaxKind::Opaque, _)
				| (SyntaxKind::Text, Value::Text(_))
				| (SyntaxKind::Integer, Value::Integer(_))
				| (SyntaxKind::Boolean, Value::Boolean(_))
		)
	}
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
	/// A text value.
	Text(String),
	/// An integer value.
	Integer(i64),
	/// A boolean value.
	Boolean(bool),
	/// Uninterpreted bytes.
	Bytes(Vec<u8>),
}

impl Value {
	/// The value as text, if it is text.
	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Text(text) => Some(text),
			_ => None,
		}
	}

	/// The value as text, also reading uninterpreted bytes that happen to be
	/// valid UTF-8.
	#[must_use]
	pub fn as_utf8(&self) -> Option<&str> {
		match self {
			Value::Text(text) => Some(text),
			Value::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
			_ => None,
		}
	}

	/// The value as an integer, if it is one.
	#[must_use]
	pub fn as_integer(&self) -> Option<i64> {
		match self {
			Value::Integer(integer) => Some(*integer),
			_ => None,
		}
	}

	/// The value as a boolean, if it is one.
	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Boolean(boolean) => Some(*boolean),
			_ => None,
		}
	}

	/// The value as raw bytes, if it was left uninterpreted.
	#[must_use]
	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			Value::Bytes(bytes) => Some(bytes),
			_ => None,
		}
	}

	/// The wire form of the value.
	#[must_use]
	pub fn to_bytes(&self) -> Vec<u8> {
		match self {
			Value::Text(text) => text.clone().into_bytes(),
			Value::Integer(integer) => integer.to_string().into_bytes(),
			Value::Boolean(true) => b"TRUE".to_vec(),
			Value::Boolean(false) => b"FALSE".to_vec(),
			Value::Bytes(bytes) => bytes.clone(),
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Text(text) => f.write_str(text),
			Value::Integer(integer) => write!(f, "{integer}"),
			Value::Boolean(true) => f.write_str("TRUE"),
			Value::Boolean(false) => f.write_str("FALSE"),
			Value::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
		}
	}
}

impl From<&str> for Value {
	fn from(text: &str) -> Self {
		Value::Text(text.to_owned())
	}
}

impl From<String> for Value {
	fn from(text: String) -> Self {
		Value::Text(text)
	}
}

impl From<i64> for Value {
	fn from(integer: i64) -> Self {
		Value::Integer(integer)
	}
}

impl From<bool> for Value {
	fn from(boolean: bool) -> Self {
		Value::Boolean(boolean)
	}
}

impl From<Vec<u8>> for Value {
	fn from(bytes: Vec<u8>) -> Self {
		Value::Bytes(bytes)
	}
}

/// Interpret a single raw value according to a syntax kind.
pub fn decode_value(attribute: &str, kind: SyntaxKind, raw: Vec<u8>) -> Result<Value> {
	match kind {
		SyntaxKind::Opaque => Ok(Value::Bytes(raw)),
		SyntaxKind::Text => String::from_utf8(raw)
			.map(Value::Text)
			.map_err(|_| Error::invalid_value(attribute, "not valid UTF-8")),
		SyntaxKind::Integer => {
			let Some(text) = std::str::from_utf8(&raw).ok().map(str::trim) else {
				return Err(Error::invalid_value(attribute, "not a base-10 integer"));
			};
			if let Ok(integer) = text.parse() {
				return Ok(Value::Integer(integer));
			}
			// Directory integers are unbounded; whatever does not fit an i64 stays raw.
			let digits = text.strip_prefix('-').unwrap_or(text);
			if !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit()) {
				Ok(Value::Bytes(raw))
			} else {
				Err(Error::invalid_value(attribute, "not a base-10 integer"))
			}
		}
		SyntaxKind::Boolean => match raw.as_slice() {
			value if value.eq_ignore_ascii_case(b"TRUE") => Ok(Value::Boolean(true)),
			value if value.eq_ignore_ascii_case(b"FALSE") => Ok(Value::Boolean(false)),
			_ => Err(Error::invalid_value(attribute, "expected TRUE or FALSE")),
		},
	}
}

/// Decode the raw values of an attribute. Attributes unknown to the schema
/// are kept as raw bytes.
pub fn decode(attribute: &str, raw: Vec<Vec<u8>>, schema: &SchemaDescription) -> Result<Vec<Value>> {
	let kind = schema.kind(attribute);
	raw.into_iter().map(|value| decode_value(attribute, kind, value)).collect()
}

/// Encode the typed values of an attribute for the wire.
pub fn encode(attribute: &str, values: &[Value], schema: &SchemaDescription) -> Result<Vec<Vec<u8>>> {
	let kind = schema.kind(attribute);
	values
		.iter()
		.map(|value| {
			if kind.accepts(value) {
				Ok(value.to_bytes())
			} else {
				Err(Error::invalid_value(
					attribute,
					format!("{value:?} does not fit a {kind:?} attribute"),
				))
			}
		})
		.collect()
}
