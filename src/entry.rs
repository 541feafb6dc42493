//! Directory entries mapped to typed attributes, with change tracking.
//!
//! An [`Entry`] moves through three states:
//!
//! * [`State::New`]: built locally, not yet in the directory. Writes go
//!   straight to the attributes; [`Entry::persist`] creates the entry.
//! * [`State::Synced`]: identical to what the directory holds, as far as we
//!   know. The attributes are snapshotted on load and after every persist.
//! * [`State::Modified`]: attributes differ from the snapshot.
//!   [`Entry::persist`] sends the difference as one modify request.
//!
//! Setting an attribute to the value it already holds never changes state,
//! and a persist whose difference turns out empty makes no request at all.

use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
};

use crate::{
	definition::EntityDefinition,
	directory::{Directory, Modification, ModifyOp, RawAttributes, RawEntry},
	error::{Error, Result},
	filter,
	report::Event,
	schema::SchemaDescription,
	session::Session,
	value::{self, Value},
};

/// The attribute holding the object classes of an entry.
pub const OBJECT_CLASS: &str = "objectClass";

/// Typed attribute values keyed by attribute name. An attribute is either
/// absent or has at least one value.
pub type Attributes = BTreeMap<String, Vec<Value>>;

/// Lifecycle state of an [`Entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	/// Not yet stored in the directory.
	New,
	/// Matches the directory.
	Synced,
	/// Has local changes not yet written.
	Modified,
}

/// What [`Entry::set`] has to do for a given write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetAction {
	/// The attribute already holds these values.
	Unchanged,
	/// Overwrite the values.
	Write,
	/// Snapshot the attributes, switch to [`State::Modified`], then overwrite.
	SnapshotAndWrite,
}

/// Decide how a write of `new` over `current` is handled in `state`. An
/// absent attribute and an empty value list are the same thing.
#[must_use]
pub fn plan_set(state: State, current: Option<&[Value]>, new: &[Value]) -> SetAction {
	if same_values(current.unwrap_or_default(), new) {
		return SetAction::Unchanged;
	}
	match state {
		State::Synced => SetAction::SnapshotAndWrite,
		State::New | State::Modified => SetAction::Write,
	}
}

/// The modifications turning `original` into `current`, ordered by attribute
/// name: attributes that appeared are added, attributes that disappeared are
/// deleted and attributes whose values changed are replaced.
#[must_use]
pub fn diff(original: &Attributes, current: &Attributes) -> Vec<Modification<Value>> {
	let names: BTreeSet<&String> = original.keys().chain(current.keys()).collect();
	names
		.into_iter()
		.filter_map(|name| {
			let (op, values) = match (original.get(name), current.get(name)) {
				(None, Some(values)) => (ModifyOp::Add, values.clone()),
				(Some(_), None) => (ModifyOp::Delete, Vec::new()),
				(Some(old), Some(new)) if !same_values(old, new) => (ModifyOp::Replace, new.clone()),
				_ => return None,
			};
			Some(Modification { op, attribute: name.clone(), values })
		})
		.collect()
}

/// Whether two value lists hold the same values. Raw bytes equal any value
/// with the same wire form, so writing text over an uninterpreted attribute
/// that already holds those octets is not a change.
fn same_values(a: &[Value], b: &[Value]) -> bool {
	a.len() == b.len()
		&& a.iter().zip(b).all(|(a, b)| match (a, b) {
			(Value::Bytes(_), _) | (_, Value::Bytes(_)) => a.to_bytes() == b.to_bytes(),
			_ => a == b,
		})
}

/// One directory entry.
#[derive(Debug, Clone)]
pub struct Entry {
	/// What kind of entry this is.
	definition: Arc<EntityDefinition>,
	/// Distinguished name, absent for new entries until persisted.
	dn: Option<String>,
	/// Current attribute values.
	attributes: Attributes,
	/// The attributes as last seen in the directory, absent for new entries.
	original: Option<Attributes>,
	/// Lifecycle state.
	state: State,
}

impl Entry {
	/// A new, empty entry. Its DN is derived from the definition's name
	/// attribute when persisted.
	#[must_use]
	pub fn new(definition: Arc<EntityDefinition>) -> Self {
		Self { definition, dn: None, attributes: Attributes::new(), original: None, state: State::New }
	}

	/// A new, empty entry with an explicit DN.
	#[must_use]
	pub fn with_dn(definition: Arc<EntityDefinition>, dn: impl Into<String>) -> Self {
		Self { dn: Some(dn.into()), ..Self::new(definition) }
	}

	/// Build an entry from a search result.
	pub fn from_raw(
		definition: Arc<EntityDefinition>,
		raw: RawEntry,
		schema: &SchemaDescription,
	) -> Result<Self> {
		let mut entry = Self::new(definition);
		entry.load(raw, schema)?;
		Ok(entry)
	}

	/// Replace the contents of this entry with a search result: decode every
	/// attribute, apply the definition's post-load check and verify the
	/// required attributes are present. The entry is in sync afterwards.
	pub fn load(&mut self, raw: RawEntry, schema: &SchemaDescription) -> Result<()> {
		let mut attributes = Attributes::new();
		for (name, values) in raw.attributes {
			let values = value::decode(&name, values, schema)?;
			if !values.is_empty() {
				attributes.insert(name, values);
			}
		}
		self.definition.check_loaded(&mut attributes)?;
		if let Some(missing) = missing_required(&self.definition, &attributes) {
			return Err(Error::MissingRequiredAttribute {
				dn: Some(raw.dn),
				attribute: missing.to_owned(),
			});
		}

		self.dn = Some(raw.dn);
		self.original = Some(attributes.clone());
		self.attributes = attributes;
		self.state = State::Synced;
		Ok(())
	}

	/// The definition this entry belongs to.
	#[must_use]
	pub fn definition(&self) -> &EntityDefinition {
		&self.definition
	}

	/// The distinguished name, if known.
	#[must_use]
	pub fn dn(&self) -> Option<&str> {
		self.dn.as_deref()
	}

	/// The lifecycle state.
	#[must_use]
	pub fn state(&self) -> State {
		self.state
	}

	/// All current attributes.
	#[must_use]
	pub fn attributes(&self) -> &Attributes {
		&self.attributes
	}

	/// The attributes as last seen in the directory.
	#[must_use]
	pub fn original(&self) -> Option<&Attributes> {
		self.original.as_ref()
	}

	/// The values of an attribute. Attribute names are matched
	/// case-insensitively.
	pub fn get(&self, name: &str) -> Result<&[Value]> {
		self.lookup(name)
			.map(|(_, values)| values.as_slice())
			.ok_or_else(|| Error::AttributeNotPresent(name.to_owned()))
	}

	/// The first value of an attribute.
	#[must_use]
	pub fn first(&self, name: &str) -> Option<&Value> {
		self.lookup(name).and_then(|(_, values)| values.first())
	}

	/// Whether the entry holds the attribute.
	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.lookup(name).is_some()
	}

	/// Set the values of an attribute, returning whether anything changed.
	/// An empty list removes the attribute.
	pub fn set<I, V>(&mut self, name: &str, values: I) -> bool
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		let values: Vec<Value> = values.into_iter().map(Into::into).collect();
		let key = self.lookup(name).map_or_else(|| name.to_owned(), |(key, _)| key.clone());
		let current = self.attributes.get(&key).map(Vec::as_slice);

		match plan_set(self.state, current, &values) {
			SetAction::Unchanged => return false,
			SetAction::SnapshotAndWrite => {
				self.original = Some(self.attributes.clone());
				self.state = State::Modified;
			}
			SetAction::Write => {}
		}

		if values.is_empty() {
			self.attributes.remove(&key);
		} else {
			self.attributes.insert(key, values);
		}
		true
	}

	/// Remove an attribute, returning whether it was present.
	pub fn remove(&mut self, name: &str) -> bool {
		self.set(name, Vec::<Value>::new())
	}

	/// The modifications a persist would send, empty unless the entry is
	/// [`State::Modified`].
	#[must_use]
	pub fn changes(&self) -> Vec<Modification<Value>> {
		match (&self.original, self.state) {
			(Some(original), State::Modified) => diff(original, &self.attributes),
			_ => Vec::new(),
		}
	}

	/// Write the entry to the directory: create it if new, send the pending
	/// modifications if modified, nothing otherwise.
	pub async fn persist<D: Directory>(&mut self, session: &mut Session<D>) -> Result<()> {
		match self.state {
			State::New => self.create(session).await,
			State::Modified => self.update(session).await,
			State::Synced => Ok(()),
		}
	}

	/// Remove the entry from the directory. The entry is consumed, there is
	/// nothing left to operate on afterwards.
	pub async fn delete<D: Directory>(self, session: &mut Session<D>) -> Result<()> {
		let dn = self.dn.ok_or(Error::NoDistinguishedName)?;
		session.directory_mut().delete(&dn).await?;
		session.report(&Event::Deleted { dn: &dn });
		Ok(())
	}

	/// Create the entry in the directory.
	async fn create<D: Directory>(&mut self, session: &mut Session<D>) -> Result<()> {
		if let Some(missing) = missing_required(&self.definition, &self.attributes) {
			return Err(Error::MissingRequiredAttribute {
				dn: self.dn.clone(),
				attribute: missing.to_owned(),
			});
		}
		let dn = match &self.dn {
			Some(dn) => dn.clone(),
			None => self.synthesize_dn(session.schema())?,
		};
		// Default classes only become part of the entry once the add went through.
		let classes = self.definition.required_object_classes();
		let default_classes: Option<Vec<Value>> = (!self.contains(OBJECT_CLASS) && !classes.is_empty())
			.then(|| classes.iter().map(|class| Value::from(class.as_str())).collect());

		let mut raw = RawAttributes::new();
		for (name, values) in &self.attributes {
			raw.insert(name.clone(), value::encode(name, values, session.schema())?);
		}
		if let Some(classes) = &default_classes {
			raw.insert(OBJECT_CLASS.to_owned(), value::encode(OBJECT_CLASS, classes, session.schema())?);
		}
		session.directory_mut().add(&dn, raw).await?;

		session.report(&Event::Created { dn: &dn });
		session.report(&Event::Transition { dn: &dn, from: State::New, to: State::Synced });
		if let Some(classes) = default_classes {
			self.attributes.insert(OBJECT_CLASS.to_owned(), classes);
		}
		self.dn = Some(dn);
		self.mark_synced();
		Ok(())
	}

	/// Send the pending modifications.
	async fn update<D: Directory>(&mut self, session: &mut Session<D>) -> Result<()> {
		let dn = self.dn.clone().ok_or(Error::NoDistinguishedName)?;
		let changes = self.changes();
		if changes.is_empty() {
			session.report(&Event::Unchanged { dn: &dn });
		} else {
			let changes = changes
				.into_iter()
				.map(|change| encode_change(change, session.schema()))
				.collect::<Result<Vec<_>>>()?;
			let count = changes.len();
			session.directory_mut().modify(&dn, changes).await?;
			session.report(&Event::Modified { dn: &dn, changes: count });
		}
		session.report(&Event::Transition { dn: &dn, from: State::Modified, to: State::Synced });
		self.mark_synced();
		Ok(())
	}

	/// `name_attribute=<first value>,base`
	fn synthesize_dn(&self, schema: &SchemaDescription) -> Result<String> {
		let attribute = self.definition.name_attribute();
		let first = self.first(attribute).ok_or_else(|| Error::MissingRequiredAttribute {
			dn: None,
			attribute: attribute.to_owned(),
		})?;
		let encoded =
			value::encode(attribute, std::slice::from_ref(first), schema)?.into_iter().next();
		let name = encoded
			.and_then(|bytes| String::from_utf8(bytes).ok())
			.ok_or_else(|| Error::invalid_value(attribute, "cannot name an entry after binary data"))?;

		let rdn = format!("{attribute}={}", filter::escape_dn_value(&name));
		let base = self.definition.base();
		Ok(if base.is_empty() { rdn } else { format!("{rdn},{base}") })
	}

	/// Take the current attributes as the state of the directory.
	fn mark_synced(&mut self) {
		self.original = Some(self.attributes.clone());
		self.state = State::Synced;
	}

	/// Find an attribute by name, case-insensitively, returning the stored
	/// key with the values.
	fn lookup(&self, name: &str) -> Option<(&String, &Vec<Value>)> {
		self.attributes
			.get_key_value(name)
			.or_else(|| self.attributes.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)))
	}
}

/// The first required attribute of `definition` missing from `attributes`.
fn missing_required<'a>(definition: &'a EntityDefinition, attributes: &Attributes) -> Option<&'a str> {
	definition
		.required_attributes()
		.iter()
		.find(|required| !attributes.keys().any(|key| key.eq_ignore_ascii_case(required)))
		.map(String::as_str)
}

/// Encode the values of a typed modification.
fn encode_change(change: Modification<Value>, schema: &SchemaDescription) -> Result<Modification> {
	let values = value::encode(&change.attribute, &change.values, schema)?;
	Ok(Modification { op: change.op, attribute: change.attribute, values })
}
