//! Construction of search filters and relative distinguished names.
//!
//! Values interpolated into filters are escaped per RFC 4515 and values
//! interpolated into DNs per RFC 4514, so that user-supplied data can never
//! change the structure of a query or the position of an entry in the tree.

use crate::definition::EntityDefinition;

/// The filter used when a definition places no constraint on its entries.
pub const MATCH_ALL: &str = "(objectClass=*)";

/// The filter selecting every entry of a definition: each required attribute
/// must be present and each required object class must be set.
#[must_use]
pub fn base_filter(definition: &EntityDefinition) -> String {
	let clauses: String = definition
		.required_attributes()
		.iter()
		.map(|attribute| format!("({attribute}=*)"))
		.chain(
			definition
				.required_object_classes()
				.iter()
				.map(|class| format!("(objectClass={})", escape_value(class))),
		)
		.collect();

	if clauses.is_empty() {
		MATCH_ALL.to_owned()
	} else {
		format!("(&{clauses})")
	}
}

/// Narrow a filter to entries where `attribute` equals `value`.
#[must_use]
pub fn equality(base: &str, attribute: &str, value: &str) -> String {
	format!("(&{base}({attribute}={}))", escape_value(value))
}

/// Escape special characters in filter values (RFC 4515).
#[must_use]
pub fn escape_value(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'\\' => escaped.push_str("\\5c"),
			'*' => escaped.push_str("\\2a"),
			'(' => escaped.push_str("\\28"),
			')' => escaped.push_str("\\29"),
			'\0' => escaped.push_str("\\00"),
			c => escaped.push(c),
		}
	}
	escaped
}

/// Escape special characters in an RDN attribute value (RFC 4514).
#[must_use]
pub fn escape_dn_value(value: &str) -> String {
	let last = value.chars().count().saturating_sub(1);
	let mut escaped = String::with_capacity(value.len() * 2);
	for (i, c) in value.chars().enumerate() {
		match c {
			',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
				escaped.push('\\');
				escaped.push(c);
			}
			'\0' => escaped.push_str("\\00"),
			' ' if i == 0 || i == last => escaped.push_str("\\20"),
			'#' if i == 0 => escaped.push_str("\\23"),
			c => escaped.push(c),
		}
	}
	escaped
}
