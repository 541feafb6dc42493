//! The interface to the directory server.
//!
//! The mapping layer never talks to the network itself. Every round trip goes
//! through a [`Directory`], implemented for a live server by
//! [`LdapDirectory`](crate::ldap::LdapDirectory) and easily replaced by an
//! in-memory implementation in tests.

use std::{collections::BTreeMap, future::Future};

use crate::error::Result;

/// Raw attribute values as transported on the wire, keyed by attribute name.
pub type RawAttributes = BTreeMap<String, Vec<Vec<u8>>>;

/// An entry as returned by a search, before any decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
	/// Distinguished name of the entry.
	pub dn: String,
	/// Attribute values of the entry.
	pub attributes: RawAttributes,
}

impl RawEntry {
	/// Create an entry from a DN and `(attribute, values)` pairs.
	pub fn new<I, K, V>(dn: impl Into<String>, attributes: I) -> Self
	where
		I: IntoIterator<Item = (K, Vec<V>)>,
		K: Into<String>,
		V: Into<Vec<u8>>,
	{
		Self {
			dn: dn.into(),
			attributes: attributes
				.into_iter()
				.map(|(name, values)| (name.into(), values.into_iter().map(Into::into).collect()))
				.collect(),
		}
	}
}

/// How far below the base a search reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
	/// Only the base entry itself.
	Base,
	/// The immediate children of the base.
	OneLevel,
	/// The base and everything below it.
	Subtree,
}

/// A request control, attached to an operation to modify its behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
	/// The control type OID.
	pub oid: String,
	/// Whether the server must refuse the operation if it does not support
	/// the control.
	pub critical: bool,
	/// The BER-encoded control value.
	pub value: Option<Vec<u8>>,
}

/// What a modification does to its attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOp {
	/// Add values to the attribute, creating it if needed.
	Add,
	/// Remove the listed values, or the whole attribute if none are listed.
	Delete,
	/// Replace all values of the attribute.
	Replace,
}

/// One step of a modify request. Values are raw bytes by default, the entry
/// layer uses typed values before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification<V = Vec<u8>> {
	/// The kind of change.
	pub op: ModifyOp,
	/// The attribute to change.
	pub attribute: String,
	/// The values involved.
	pub values: Vec<V>,
}

/// An extended operation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedRequest {
	/// The request name OID.
	pub name: String,
	/// The BER-encoded request value.
	pub value: Option<Vec<u8>>,
}

/// The operations the mapping layer needs from a directory server.
///
/// Each call is one round trip; implementations must report an unreachable
/// server as [`Error::Connectivity`](crate::Error::Connectivity) and a missing
/// target as [`Error::NoSuchObject`](crate::Error::NoSuchObject).
pub trait Directory {
	/// Search below `base`. An empty `attributes` list requests all user
	/// attributes.
	fn search(
		&mut self,
		base: &str,
		scope: Scope,
		filter: &str,
		attributes: &[String],
		controls: &[Control],
	) -> impl Future<Output = Result<Vec<RawEntry>>> + Send;

	/// Create an entry.
	fn add(&mut self, dn: &str, attributes: RawAttributes) -> impl Future<Output = Result<()>> + Send;

	/// Apply changes to an entry, in order.
	fn modify(
		&mut self,
		dn: &str,
		changes: Vec<Modification>,
	) -> impl Future<Output = Result<()>> + Send;

	/// Remove an entry.
	fn delete(&mut self, dn: &str) -> impl Future<Output = Result<()>> + Send;

	/// Perform an extended operation, returning the response value.
	fn extended(
		&mut self,
		request: ExtendedRequest,
	) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

	/// Fetch the raw `attributeTypes` values of the server schema.
	fn fetch_schema(&mut self) -> impl Future<Output = Result<Vec<String>>> + Send;
}
