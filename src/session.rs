//! A directory connection together with its resolved schema.

use std::{fmt, sync::Arc};

use crate::{
	collection::SearchOptions,
	controls::{PasswordModify, PasswordModifyResponse, WHOAMI_OID},
	definition::EntityDefinition,
	directory::{Directory, ExtendedRequest, RawEntry, Scope},
	entry::Entry,
	error::{Error, Result},
	filter,
	report::{Event, Reporter, TracingReporter},
	schema::SchemaDescription,
};

/// Binds a [`Directory`] to the schema its values are decoded with and to
/// the [`Reporter`] receiving events.
///
/// Operations take `&mut self` and await one round trip at a time.
pub struct Session<D> {
	/// The directory server.
	directory: D,
	/// The resolved server schema.
	schema: Arc<SchemaDescription>,
	/// Where events go.
	reporter: Arc<dyn Reporter>,
}

impl<D: fmt::Debug> fmt::Debug for Session<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("directory", &self.directory)
			.field("schema", &self.schema.len())
			.finish_non_exhaustive()
	}
}

impl<D: Directory> Session<D> {
	/// Fetch and resolve the schema of `directory` and start a session on it.
	pub async fn new(mut directory: D) -> Result<Self> {
		let dump = directory.fetch_schema().await?;
		let schema = SchemaDescription::from_dump(&dump)?;
		let session = Self::with_schema(directory, schema);
		session.report(&Event::SchemaLoaded { attributes: session.schema.len() });
		Ok(session)
	}

	/// Start a session with an already known schema.
	pub fn with_schema(directory: D, schema: impl Into<Arc<SchemaDescription>>) -> Self {
		Self { directory, schema: schema.into(), reporter: Arc::new(TracingReporter) }
	}

	/// Send events to `reporter` instead of `tracing`.
	#[must_use]
	pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
		self.reporter = reporter;
		self
	}

	/// The resolved schema.
	#[must_use]
	pub fn schema(&self) -> &SchemaDescription {
		&self.schema
	}

	/// The underlying directory.
	#[must_use]
	pub fn directory(&self) -> &D {
		&self.directory
	}

	/// The underlying directory, mutably.
	pub fn directory_mut(&mut self) -> &mut D {
		&mut self.directory
	}

	/// End the session, returning the directory.
	pub fn into_directory(self) -> D {
		self.directory
	}

	/// Hand an event to the reporter.
	pub(crate) fn report(&self, event: &Event<'_>) {
		self.reporter.report(event);
	}

	/// Find the one entry of `definition` whose `attribute` equals `value`.
	/// Zero or several matches are an [`Error::QueryShape`].
	pub async fn find_one(
		&mut self,
		definition: &Arc<EntityDefinition>,
		attribute: &str,
		value: &str,
		options: &SearchOptions,
	) -> Result<Entry> {
		let filter = filter::equality(&filter::base_filter(definition), attribute, value);
		let raw = self.search(definition.base(), Scope::Subtree, &filter, options).await?;
		self.load_single(definition, definition.base(), &filter, raw)
	}

	/// Read the entry at `dn` as an entry of `definition`.
	pub async fn find_by_dn(
		&mut self,
		definition: &Arc<EntityDefinition>,
		dn: &str,
		options: &SearchOptions,
	) -> Result<Entry> {
		let filter = filter::base_filter(definition);
		let raw = self.search(dn, Scope::Base, &filter, options).await?;
		self.load_single(definition, dn, &filter, raw)
	}

	/// Search and load every result as an entry of `definition`.
	pub(crate) async fn search_entries(
		&mut self,
		definition: &Arc<EntityDefinition>,
		base: &str,
		scope: Scope,
		filter: &str,
		options: &SearchOptions,
	) -> Result<Vec<Entry>> {
		let raw = self.search(base, scope, filter, options).await?;
		raw.into_iter().map(|entry| self.load(definition, entry)).collect()
	}

	/// The identity the session is bound as, without its `dn:` prefix. Empty
	/// for anonymous sessions.
	pub async fn whoami(&mut self) -> Result<String> {
		let request = ExtendedRequest { name: WHOAMI_OID.to_owned(), value: None };
		let response = self.directory.extended(request).await?.unwrap_or_default();
		let authzid = String::from_utf8(response)
			.map_err(|_| Error::invalid_value(WHOAMI_OID, "authorization identity is not UTF-8"))?;
		Ok(match authzid.strip_prefix("dn:") {
			Some(dn) => dn.to_owned(),
			None => authzid,
		})
	}

	/// Set the password of the entry at `dn`, optionally proving knowledge of
	/// the current one.
	pub async fn change_password(
		&mut self,
		dn: &str,
		new: &str,
		current: Option<&str>,
	) -> Result<PasswordModifyResponse> {
		self.modify_password(dn, PasswordModify::new(dn, new), current).await
	}

	/// Have the server generate a new password for the entry at `dn`. The
	/// response carries the generated password, if the server sent one back.
	pub async fn generate_password(
		&mut self,
		dn: &str,
		current: Option<&str>,
	) -> Result<PasswordModifyResponse> {
		self.modify_password(dn, PasswordModify::generate(dn), current).await
	}

	/// Send a password modify request, reported once the response decodes.
	async fn modify_password(
		&mut self,
		dn: &str,
		mut request: PasswordModify,
		current: Option<&str>,
	) -> Result<PasswordModifyResponse> {
		if let Some(current) = current {
			request = request.with_current(current);
		}
		let response = self.directory.extended(request.to_request()).await?;
		let response = PasswordModifyResponse::decode(response.as_deref())?;
		self.report(&Event::PasswordChanged { dn });
		Ok(response)
	}

	/// One search round trip, reported.
	async fn search(
		&mut self,
		base: &str,
		scope: Scope,
		filter: &str,
		options: &SearchOptions,
	) -> Result<Vec<RawEntry>> {
		let raw = self
			.directory
			.search(base, scope, filter, options.attributes(), options.controls())
			.await?;
		self.report(&Event::Search { base, scope, filter, found: raw.len() });
		Ok(raw)
	}

	/// Load the only entry of a result set.
	fn load_single(
		&self,
		definition: &Arc<EntityDefinition>,
		base: &str,
		filter: &str,
		mut raw: Vec<RawEntry>,
	) -> Result<Entry> {
		match raw.pop() {
			Some(entry) if raw.is_empty() => self.load(definition, entry),
			last => Err(Error::QueryShape {
				base: base.to_owned(),
				filter: filter.to_owned(),
				found: raw.len() + usize::from(last.is_some()),
			}),
		}
	}

	/// Decode one search result.
	fn load(&self, definition: &Arc<EntityDefinition>, raw: RawEntry) -> Result<Entry> {
		let entry = Entry::from_raw(Arc::clone(definition), raw, &self.schema)?;
		if let Some(dn) = entry.dn() {
			self.report(&Event::Loaded { dn });
		}
		Ok(entry)
	}
}
