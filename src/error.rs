//! Error codes

use std::fmt;

/// A directory round trip, used to give context to failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	/// Authenticating the session.
	Bind,
	/// Searching for entries.
	Search,
	/// Creating an entry.
	Add,
	/// Changing the attributes of an entry.
	Modify,
	/// Removing an entry.
	Delete,
	/// An extended operation, such as a password change.
	Extended,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Operation::Bind => "bind",
			Operation::Search => "search",
			Operation::Add => "add",
			Operation::Modify => "modify",
			Operation::Delete => "delete",
			Operation::Extended => "extended operation",
		};
		f.write_str(name)
	}
}

/// Errors that can occur when using this library
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// The directory server could not be reached at the transport level.
	#[error("Cannot reach the directory server during {operation}: {reason}")]
	Connectivity {
		/// The round trip that failed.
		operation: Operation,
		/// The underlying transport failure.
		reason: String,
	},
	/// The server rejected the credentials used to bind.
	#[error("Authentication rejected for {identity:?}: {reason}")]
	Authentication {
		/// The identity the bind was attempted as. Empty for anonymous binds.
		identity: String,
		/// The reason reported by the server.
		reason: String,
	},
	/// A lookup that expects exactly one result found some other number.
	#[error("Expected exactly one entry matching {filter} under {base:?}, found {found}")]
	QueryShape {
		/// The search base.
		base: String,
		/// The search filter.
		filter: String,
		/// The number of entries returned.
		found: usize,
	},
	/// An entry lacks an attribute its definition requires.
	#[error(
		"Entry {} is missing required attribute {attribute}",
		dn.as_deref().unwrap_or("<unsaved>")
	)]
	MissingRequiredAttribute {
		/// The entry, if it has a distinguished name yet.
		dn: Option<String>,
		/// The missing attribute.
		attribute: String,
	},
	/// The server schema could not be resolved.
	#[error("Cannot resolve schema for {attribute}: {reason}")]
	SchemaResolution {
		/// The attribute type (or raw description) being resolved.
		attribute: String,
		/// What went wrong.
		reason: String,
	},
	/// The server reported a failure for a directory operation.
	#[error("{operation} on {target:?} failed with code {code}: {reason}")]
	DirectoryOperation {
		/// The round trip that failed.
		operation: Operation,
		/// The DN or request name the operation targeted.
		target: String,
		/// The LDAP result code.
		code: u32,
		/// The diagnostic message from the server.
		reason: String,
	},
	/// The target object does not exist in the directory.
	#[error("No such object: {dn}")]
	NoSuchObject {
		/// The DN that was not found.
		dn: String,
	},
	/// An attribute was read that the entry does not hold.
	#[error("Attribute not present: {0}")]
	AttributeNotPresent(String),
	/// An attribute value does not conform to its syntax.
	#[error("Malformed value for {attribute}: {reason}")]
	InvalidValue {
		/// The attribute holding the value.
		attribute: String,
		/// What is wrong with it.
		reason: String,
	},
	/// The entry has no distinguished name to operate on.
	#[error("Entry has no distinguished name")]
	NoDistinguishedName,
	/// A membership query was made for a type without a membership
	/// attribute.
	#[error("Entries under {base:?} have no membership attribute")]
	NoMembershipAttribute {
		/// The base of the definition lacking the attribute.
		base: String,
	},
	/// Invalid configuration.
	#[error("Invalid configuration: {0}")]
	Invalid(String),
	/// IO error, usually while reading TLS material.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Shorthand for an [`Error::InvalidValue`].
	pub(crate) fn invalid_value(attribute: &str, reason: impl Into<String>) -> Self {
		Error::InvalidValue { attribute: attribute.to_owned(), reason: reason.into() }
	}

	/// Shorthand for an [`Error::SchemaResolution`].
	pub(crate) fn schema(attribute: &str, reason: impl Into<String>) -> Self {
		Error::SchemaResolution { attribute: attribute.to_owned(), reason: reason.into() }
	}
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
