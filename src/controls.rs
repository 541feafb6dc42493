//! BER encoding of the controls and extended operations this crate uses.
//!
//! Only the handful of constructs needed here are supported: definite-length
//! SEQUENCEs, OCTET STRINGs and context-specific primitive tags.
//!
//! * [Server side sorting](https://www.rfc-editor.org/rfc/rfc2891) control.
//! * [Password modify](https://www.rfc-editor.org/rfc/rfc3062) extended
//!   operation.

use crate::{
	directory::{Control, ExtendedRequest},
	error::{Error, Result},
};

/// Control type of the server side sort request.
pub const SERVER_SIDE_SORT_OID: &str = "1.2.840.113556.1.4.473";
/// Request name of the password modify extended operation.
pub const PASSWORD_MODIFY_OID: &str = "1.3.6.1.4.1.4203.1.11.1";
/// Request name of the "Who am I?" extended operation.
pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";

/// Universal tag of a constructed SEQUENCE.
const SEQUENCE: u8 = 0x30;
/// Universal tag of an OCTET STRING.
const OCTET_STRING: u8 = 0x04;
/// Class bits of a context-specific primitive tag.
const CONTEXT: u8 = 0x80;

/// Append a tag-length-value triple to `out`.
fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
	out.push(tag);
	write_length(out, content.len());
	out.extend_from_slice(content);
}

/// Append a definite length: short form below 128, long form otherwise.
fn write_length(out: &mut Vec<u8>, length: usize) {
	if length < 0x80 {
		out.push(length as u8);
		return;
	}
	let bytes = length.to_be_bytes();
	let skip = bytes.iter().take_while(|&&b| b == 0).count();
	let significant = &bytes[skip..];
	out.push(0x80 | significant.len() as u8);
	out.extend_from_slice(significant);
}

/// Read one tag-length-value triple from the front of `input`, returning the
/// tag, the content and the rest of the input.
fn read_tlv(input: &[u8]) -> Option<(u8, &[u8], &[u8])> {
	let (&tag, rest) = input.split_first()?;
	let (&first, rest) = rest.split_first()?;
	let (length, rest) = if first < 0x80 {
		(usize::from(first), rest)
	} else {
		let count = usize::from(first & 0x7f);
		if count == 0 || count > std::mem::size_of::<usize>() || rest.len() < count {
			return None;
		}
		let length = rest[..count].iter().fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
		(length, &rest[count..])
	};
	if rest.len() < length {
		return None;
	}
	let (content, rest) = rest.split_at(length);
	Some((tag, content, rest))
}

/// Request the server to sort search results by the given attributes, in
/// order of precedence.
///
/// Only the attribute type of each sort key is sent. Ordering rules and
/// reverse ordering are not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSideSort {
	/// Attributes to sort by.
	attributes: Vec<String>,
}

impl ServerSideSort {
	/// Sort by `attributes`, the first one taking precedence.
	pub fn new<I, S>(attributes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { attributes: attributes.into_iter().map(Into::into).collect() }
	}

	/// Encode the `SortKeyList`:
	///
	/// ```text
	/// SortKeyList ::= SEQUENCE OF SEQUENCE {
	///     attributeType   AttributeDescription,
	///     orderingRule    [0] MatchingRuleId OPTIONAL,
	///     reverseOrder    [1] BOOLEAN DEFAULT FALSE }
	/// ```
	#[must_use]
	pub fn encode(&self) -> Vec<u8> {
		let mut keys = Vec::new();
		for attribute in &self.attributes {
			let mut key = Vec::new();
			write_tlv(&mut key, OCTET_STRING, attribute.as_bytes());
			write_tlv(&mut keys, SEQUENCE, &key);
		}
		let mut out = Vec::new();
		write_tlv(&mut out, SEQUENCE, &keys);
		out
	}

	/// The non-critical control carrying this sort request.
	#[must_use]
	pub fn to_control(&self) -> Control {
		Control { oid: SERVER_SIDE_SORT_OID.to_owned(), critical: false, value: Some(self.encode()) }
	}
}

/// Change the password of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordModify {
	/// DN of the entry whose password changes.
	identity: String,
	/// The current password, if the server requires it.
	current: Option<String>,
	/// The new password, absent when the server is to generate one.
	new: Option<String>,
}

impl PasswordModify {
	/// Set the password of `identity` to `new`.
	pub fn new(identity: impl Into<String>, new: impl Into<String>) -> Self {
		Self { identity: identity.into(), current: None, new: Some(new.into()) }
	}

	/// Ask the server to generate a new password for `identity`. The
	/// generated password comes back in [`PasswordModifyResponse::generated`].
	pub fn generate(identity: impl Into<String>) -> Self {
		Self { identity: identity.into(), current: None, new: None }
	}

	/// Also send the current password.
	#[must_use]
	pub fn with_current(mut self, current: impl Into<String>) -> Self {
		self.current = Some(current.into());
		self
	}

	/// Encode the request value. The old password component is left out
	/// entirely when no current password was given, the new password one
	/// when the server generates it.
	///
	/// ```text
	/// PasswdModifyRequestValue ::= SEQUENCE {
	///     userIdentity    [0]  OCTET STRING OPTIONAL
	///     oldPasswd       [1]  OCTET STRING OPTIONAL
	///     newPasswd       [2]  OCTET STRING OPTIONAL }
	/// ```
	#[must_use]
	pub fn encode(&self) -> Vec<u8> {
		let mut fields = Vec::new();
		write_tlv(&mut fields, CONTEXT, self.identity.as_bytes());
		if let Some(current) = &self.current {
			write_tlv(&mut fields, CONTEXT | 1, current.as_bytes());
		}
		if let Some(new) = &self.new {
			write_tlv(&mut fields, CONTEXT | 2, new.as_bytes());
		}
		let mut out = Vec::new();
		write_tlv(&mut out, SEQUENCE, &fields);
		out
	}

	/// The extended request carrying this password change.
	#[must_use]
	pub fn to_request(&self) -> ExtendedRequest {
		ExtendedRequest { name: PASSWORD_MODIFY_OID.to_owned(), value: Some(self.encode()) }
	}
}

/// The server's answer to a [`PasswordModify`] request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordModifyResponse {
	/// A password generated by the server, sent when the request had no new
	/// password.
	pub generated: Option<Vec<u8>>,
}

impl PasswordModifyResponse {
	/// Decode `PasswdModifyResponseValue ::= SEQUENCE { genPasswd [0] OCTET
	/// STRING OPTIONAL }`. An absent response value means nothing was
	/// generated.
	pub fn decode(value: Option<&[u8]>) -> Result<Self> {
		let Some(value) = value else {
			return Ok(Self::default());
		};
		let malformed = || Error::invalid_value(PASSWORD_MODIFY_OID, "malformed response value");

		let (tag, fields, rest) = read_tlv(value).ok_or_else(malformed)?;
		if tag != SEQUENCE || !rest.is_empty() {
			return Err(malformed());
		}
		if fields.is_empty() {
			return Ok(Self::default());
		}
		match read_tlv(fields).ok_or_else(malformed)? {
			(CONTEXT, generated, []) => Ok(Self { generated: Some(generated.to_vec()) }),
			_ => Err(malformed()),
		}
	}
}
