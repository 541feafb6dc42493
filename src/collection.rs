//! Lists of entries of one kind, and the queries that fill them.

use std::{slice, sync::Arc};

use crate::{
	controls::ServerSideSort,
	definition::EntityDefinition,
	directory::{Control, Directory, Scope},
	entry::Entry,
	error::{Error, Result},
	filter,
	session::Session,
};

/// Parameters shared by all searches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
	/// Attributes to return, all user attributes if empty.
	attributes: Vec<String>,
	/// Controls sent with the search.
	controls: Vec<Control>,
}

impl SearchOptions {
	/// Request all user attributes, no controls.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Only return the given attributes. `*` and `+` select all user and
	/// operational attributes respectively.
	#[must_use]
	pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.attributes = attributes.into_iter().map(Into::into).collect();
		self
	}

	/// Ask the server to sort the results by `attributes`.
	#[must_use]
	pub fn sorted_by<I, S>(self, attributes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.with_control(ServerSideSort::new(attributes).to_control())
	}

	/// Attach a control to the search.
	#[must_use]
	pub fn with_control(mut self, control: Control) -> Self {
		self.controls.push(control);
		self
	}

	/// Attributes requested.
	#[must_use]
	pub fn attributes(&self) -> &[String] {
		&self.attributes
	}

	/// Controls attached.
	#[must_use]
	pub fn controls(&self) -> &[Control] {
		&self.controls
	}
}

/// The entries of one [`EntityDefinition`] returned by the last query.
#[derive(Debug, Clone)]
pub struct Collection {
	/// Kind of the entries.
	definition: Arc<EntityDefinition>,
	/// Results of the last query.
	entries: Vec<Entry>,
}

impl Collection {
	/// An empty collection of entries of `definition`.
	#[must_use]
	pub fn new(definition: Arc<EntityDefinition>) -> Self {
		Self { definition, entries: Vec::new() }
	}

	/// The kind of entry listed.
	#[must_use]
	pub fn definition(&self) -> &Arc<EntityDefinition> {
		&self.definition
	}

	/// Every entry below the definition's base.
	pub async fn all<D: Directory>(
		&mut self,
		session: &mut Session<D>,
		options: &SearchOptions,
	) -> Result<&[Entry]> {
		let filter = filter::base_filter(&self.definition);
		self.query(session, &filter, options).await
	}

	/// Every entry whose `attribute` equals `value`.
	pub async fn by_attribute<D: Directory>(
		&mut self,
		session: &mut Session<D>,
		attribute: &str,
		value: &str,
		options: &SearchOptions,
	) -> Result<&[Entry]> {
		let filter = filter::equality(&filter::base_filter(&self.definition), attribute, value);
		self.query(session, &filter, options).await
	}

	/// Every entry that is a member of the group at `group_dn`.
	pub async fn by_membership_dn<D: Directory>(
		&mut self,
		session: &mut Session<D>,
		group_dn: &str,
		options: &SearchOptions,
	) -> Result<&[Entry]> {
		let attribute = self.membership_attribute()?;
		let filter = filter::equality(&filter::base_filter(&self.definition), &attribute, group_dn);
		self.query(session, &filter, options).await
	}

	/// Every entry that is a member of the group of `group` named
	/// `group_name`. The group must exist exactly once.
	pub async fn by_membership_name<D: Directory>(
		&mut self,
		session: &mut Session<D>,
		group_name: &str,
		group: &Arc<EntityDefinition>,
		options: &SearchOptions,
	) -> Result<&[Entry]> {
		self.membership_attribute()?;
		let name_attribute = group.name_attribute();
		let mut attributes = vec![name_attribute];
		for required in group.required_attributes() {
			if !attributes.iter().any(|known| known.eq_ignore_ascii_case(required)) {
				attributes.push(required);
			}
		}
		let lookup = SearchOptions::new().with_attributes(attributes);
		let group_entry = session.find_one(group, name_attribute, group_name, &lookup).await?;
		let group_dn = group_entry.dn().ok_or(Error::NoDistinguishedName)?;
		self.by_membership_dn(session, group_dn, options).await
	}

	/// The entries found by the last query.
	#[must_use]
	pub fn entries(&self) -> &[Entry] {
		&self.entries
	}

	/// Take the entries out of the collection.
	#[must_use]
	pub fn into_entries(self) -> Vec<Entry> {
		self.entries
	}

	/// Iterate over the entries found by the last query.
	pub fn iter(&self) -> slice::Iter<'_, Entry> {
		self.entries.iter()
	}

	/// Number of entries.
	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the last query found nothing.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The membership attribute, required for membership queries.
	fn membership_attribute(&self) -> Result<String> {
		self.definition
			.membership_attribute()
			.map(str::to_owned)
			.ok_or_else(|| Error::NoMembershipAttribute { base: self.definition.base().to_owned() })
	}

	/// Run a subtree search below the base, replacing the entries.
	async fn query<D: Directory>(
		&mut self,
		session: &mut Session<D>,
		filter: &str,
		options: &SearchOptions,
	) -> Result<&[Entry]> {
		self.entries = session
			.search_entries(&self.definition, self.definition.base(), Scope::Subtree, filter, options)
			.await?;
		Ok(&self.entries)
	}
}

impl<'a> IntoIterator for &'a Collection {
	type Item = &'a Entry;
	type IntoIter = slice::Iter<'a, Entry>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.iter()
	}
}

impl IntoIterator for Collection {
	type Item = Entry;
	type IntoIter = std::vec::IntoIter<Entry>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.into_iter()
	}
}
