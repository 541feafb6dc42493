//! Declarative description of a kind of entry.
//!
//! Every type of object mapped from the directory, users or groups for
//! instance, is described by one [`EntityDefinition`]: where its entries
//! live, what makes an entry one of them, and how to name new ones.
//! Customisation beyond that is injected as a [`PostLoadCheck`].

use std::{fmt, sync::Arc};

use crate::{entry::Attributes, error::Result};

/// The attribute used to name new entries when nothing else is configured.
pub const DEFAULT_NAME_ATTRIBUTE: &str = "cn";

/// Describes one kind of directory entry.
#[derive(Debug, Clone)]
pub struct EntityDefinition {
	/// The search root for entries of this kind.
	base: String,
	/// Attributes every entry must have, checked after load and before
	/// creation.
	required_attributes: Vec<String>,
	/// Object classes every entry has. Used in search filters and as the
	/// default classes of new entries.
	required_object_classes: Vec<String>,
	/// Attribute forming the RDN of new entries without an explicit DN.
	name_attribute: String,
	/// Attribute listing the groups an entry belongs to.
	membership_attribute: Option<String>,
	/// Hook run on freshly loaded attributes.
	post_load: Option<PostLoadCheck>,
}

impl EntityDefinition {
	/// A definition for entries below `base`, with no further constraints.
	#[must_use]
	pub fn new(base: impl Into<String>) -> Self {
		Self {
			base: base.into(),
			required_attributes: Vec::new(),
			required_object_classes: Vec::new(),
			name_attribute: DEFAULT_NAME_ATTRIBUTE.to_owned(),
			membership_attribute: None,
			post_load: None,
		}
	}

	/// Set the attributes every entry must carry.
	#[must_use]
	pub fn with_required_attributes<I, S>(mut self, attributes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required_attributes = attributes.into_iter().map(Into::into).collect();
		self
	}

	/// Set the object classes every entry has.
	#[must_use]
	pub fn with_required_object_classes<I, S>(mut self, classes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required_object_classes = classes.into_iter().map(Into::into).collect();
		self
	}

	/// Set the attribute used to name new entries.
	#[must_use]
	pub fn with_name_attribute(mut self, attribute: impl Into<String>) -> Self {
		self.name_attribute = attribute.into();
		self
	}

	/// Set the attribute listing group memberships, enabling membership
	/// queries.
	#[must_use]
	pub fn with_membership_attribute(mut self, attribute: impl Into<String>) -> Self {
		self.membership_attribute = Some(attribute.into());
		self
	}

	/// Run `check` on the attributes of every loaded entry.
	#[must_use]
	pub fn with_post_load(mut self, check: PostLoadCheck) -> Self {
		self.post_load = Some(check);
		self
	}

	/// Wrap the definition for sharing between entries.
	#[must_use]
	pub fn shared(self) -> Arc<Self> {
		Arc::new(self)
	}

	/// The search root.
	#[must_use]
	pub fn base(&self) -> &str {
		&self.base
	}

	/// Attributes every entry must carry.
	#[must_use]
	pub fn required_attributes(&self) -> &[String] {
		&self.required_attributes
	}

	/// Object classes every entry has.
	#[must_use]
	pub fn required_object_classes(&self) -> &[String] {
		&self.required_object_classes
	}

	/// The attribute naming new entries.
	#[must_use]
	pub fn name_attribute(&self) -> &str {
		&self.name_attribute
	}

	/// The attribute listing group memberships, if any.
	#[must_use]
	pub fn membership_attribute(&self) -> Option<&str> {
		self.membership_attribute.as_deref()
	}

	/// Run the post-load hook, if one is set.
	pub(crate) fn check_loaded(&self, attributes: &mut Attributes) -> Result<()> {
		match &self.post_load {
			Some(check) => check.run(attributes),
			None => Ok(()),
		}
	}
}

/// A validation or clean-up step applied to the attributes of an entry right
/// after it is loaded, before the entry is considered in sync. Changes made
/// here are part of the loaded state and never produce a modification.
#[derive(Clone)]
pub struct PostLoadCheck(Arc<dyn Fn(&mut Attributes) -> Result<()> + Send + Sync>);

impl PostLoadCheck {
	/// Wrap a function as a check.
	pub fn new<F>(check: F) -> Self
	where
		F: Fn(&mut Attributes) -> Result<()> + Send + Sync + 'static,
	{
		Self(Arc::new(check))
	}

	/// Drop every value of `attribute` that does not name an entry below
	/// `base`, for instance memberships in groups outside the group subtree.
	#[must_use]
	pub fn restrict_to_subtree(attribute: impl Into<String>, base: impl Into<String>) -> Self {
		let attribute = attribute.into();
		let suffix = format!(",{}", base.into().to_lowercase());
		Self::new(move |attributes| {
			let Some(key) = attributes.keys().find(|key| key.eq_ignore_ascii_case(&attribute)).cloned()
			else {
				return Ok(());
			};
			if let Some(values) = attributes.get_mut(&key) {
				values.retain(|value| {
					value.as_utf8().is_some_and(|dn| dn.to_lowercase().ends_with(&suffix))
				});
				if values.is_empty() {
					attributes.remove(&key);
				}
			}
			Ok(())
		})
	}

	/// Apply the check.
	fn run(&self, attributes: &mut Attributes) -> Result<()> {
		(self.0)(attributes)
	}
}

impl fmt::Debug for PostLoadCheck {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("PostLoadCheck")
	}
}
