//! [`Directory`] implementation backed by a live LDAP server via `ldap3`.

use std::{collections::HashSet, fmt};

use ldap3::{controls::RawControl, exop::Exop, LdapConnAsync, LdapError, Mod, SearchEntry};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
	config::{BindConfig, Config, DEFAULT_SCHEMA_BASE},
	directory::{
		Control, Directory, ExtendedRequest, Modification, ModifyOp, RawAttributes, RawEntry, Scope,
	},
	error::{Error, Operation, Result},
	session::Session,
};

/// LDAP result code for a missing target entry.
const NO_SUCH_OBJECT: u32 = 32;
/// LDAP result code for rejected credentials.
const INVALID_CREDENTIALS: u32 = 49;

/// An authenticated connection to a directory server.
pub struct LdapDirectory {
	/// The `ldap3` operation handle.
	ldap: ldap3::Ldap,
	/// The task driving the connection.
	driver: JoinHandle<()>,
	/// Configured subschema entry, overriding the root DSE.
	schema_base: Option<String>,
}

impl fmt::Debug for LdapDirectory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LdapDirectory").field("schema_base", &self.schema_base).finish_non_exhaustive()
	}
}

impl LdapDirectory {
	/// Connect to the server at `config.url` and bind as configured.
	pub async fn connect(config: &Config) -> Result<Self> {
		let settings = config.connection.to_settings().await?;
		let (conn, mut ldap) = LdapConnAsync::from_url_with_settings(settings, &config.url)
			.await
			.map_err(|err| map_error(Operation::Bind, config.url.as_str(), err))?;
		let driver = tokio::spawn(async move {
			if let Err(err) = conn.drive().await {
				warn!("Ldap connection error {err}");
			}
		});

		let identity = config.bind.identity();
		let bound = match &config.bind {
			BindConfig::Anonymous => Ok(()),
			BindConfig::Simple { dn, password } => {
				ldap.simple_bind(dn, password).await.and_then(ldap3::LdapResult::success).map(drop)
			}
			BindConfig::SaslExternal => {
				ldap.sasl_external_bind().await.and_then(ldap3::LdapResult::success).map(drop)
			}
		};
		if let Err(err) = bound {
			driver.abort();
			return Err(match err {
				LdapError::LdapResult { result } if result.rc == INVALID_CREDENTIALS => {
					Error::Authentication { identity: identity.to_owned(), reason: result.text }
				}
				err => map_error(Operation::Bind, identity, err),
			});
		}
		debug!("Connected to {} as {identity:?}", config.url);

		Ok(Self { ldap, driver, schema_base: config.schema_base.clone() })
	}

	/// Unbind and wait for the connection to shut down.
	pub async fn close(mut self) -> Result<()> {
		self.ldap.unbind().await.map_err(|err| map_error(Operation::Bind, "", err))?;
		if let Err(err) = self.driver.await {
			warn!("Failed to join background task: {err}");
		}
		Ok(())
	}

	/// The DN of the subschema entry: configured, announced by the root DSE,
	/// or the conventional default.
	async fn subschema_entry(&mut self) -> Result<String> {
		if let Some(base) = &self.schema_base {
			return Ok(base.clone());
		}
		let (entries, _) = self
			.ldap
			.search("", ldap3::Scope::Base, "(objectClass=*)", vec!["subschemaSubentry"])
			.await
			.and_then(ldap3::SearchResult::success)
			.map_err(|err| map_error(Operation::Search, "", err))?;
		let announced = entries
			.into_iter()
			.map(SearchEntry::construct)
			.find_map(|entry| entry.into_raw().take_text("subschemaSubentry"));
		Ok(announced.unwrap_or_else(|| DEFAULT_SCHEMA_BASE.to_owned()))
	}
}

impl Session<LdapDirectory> {
	/// Connect to the configured server and load its schema.
	pub async fn connect(config: &Config) -> Result<Self> {
		Session::new(LdapDirectory::connect(config).await?).await
	}
}

impl Directory for LdapDirectory {
	async fn search(
		&mut self,
		base: &str,
		scope: Scope,
		filter: &str,
		attributes: &[String],
		controls: &[Control],
	) -> Result<Vec<RawEntry>> {
		let attributes: Vec<&str> = if attributes.is_empty() {
			vec!["*"]
		} else {
			attributes.iter().map(String::as_str).collect()
		};
		if !controls.is_empty() {
			self.ldap.with_controls(controls.iter().map(raw_control).collect::<Vec<_>>());
		}
		let (entries, _) = self
			.ldap
			.search(base, ldap_scope(scope), filter, attributes)
			.await
			.and_then(ldap3::SearchResult::success)
			.map_err(|err| map_error(Operation::Search, base, err))?;
		Ok(entries.into_iter().map(|entry| SearchEntry::construct(entry).into_raw()).collect())
	}

	async fn add(&mut self, dn: &str, attributes: RawAttributes) -> Result<()> {
		let attributes: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attributes
			.into_iter()
			.map(|(name, values)| (name.into_bytes(), values.into_iter().collect()))
			.collect();
		self.ldap
			.add(dn, attributes)
			.await
			.and_then(ldap3::LdapResult::success)
			.map_err(|err| map_error(Operation::Add, dn, err))?;
		Ok(())
	}

	async fn modify(&mut self, dn: &str, changes: Vec<Modification>) -> Result<()> {
		let changes: Vec<Mod<Vec<u8>>> = changes
			.into_iter()
			.map(|change| {
				let attribute = change.attribute.into_bytes();
				let values: HashSet<Vec<u8>> = change.values.into_iter().collect();
				match change.op {
					ModifyOp::Add => Mod::Add(attribute, values),
					ModifyOp::Delete => Mod::Delete(attribute, values),
					ModifyOp::Replace => Mod::Replace(attribute, values),
				}
			})
			.collect();
		self.ldap
			.modify(dn, changes)
			.await
			.and_then(ldap3::LdapResult::success)
			.map_err(|err| map_error(Operation::Modify, dn, err))?;
		Ok(())
	}

	async fn delete(&mut self, dn: &str) -> Result<()> {
		self.ldap
			.delete(dn)
			.await
			.and_then(ldap3::LdapResult::success)
			.map_err(|err| map_error(Operation::Delete, dn, err))?;
		Ok(())
	}

	async fn extended(&mut self, request: ExtendedRequest) -> Result<Option<Vec<u8>>> {
		let target = request.name.clone();
		let exop = Exop { name: Some(request.name), val: request.value };
		let (response, _) = self
			.ldap
			.extended(exop)
			.await
			.and_then(ldap3::result::ExopResult::success)
			.map_err(|err| map_error(Operation::Extended, &target, err))?;
		Ok(response.val)
	}

	async fn fetch_schema(&mut self) -> Result<Vec<String>> {
		let base = self.subschema_entry().await?;
		let (entries, _) = self
			.ldap
			.search(&base, ldap3::Scope::Base, "(objectClass=subschema)", vec!["attributeTypes"])
			.await
			.and_then(ldap3::SearchResult::success)
			.map_err(|err| map_error(Operation::Search, &base, err))?;
		Ok(entries
			.into_iter()
			.map(SearchEntry::construct)
			.flat_map(|entry| entry.into_raw().take_all_text("attributeTypes"))
			.collect())
	}
}

/// Translate an `ldap3` failure. Result codes reported by the server become
/// [`Error::NoSuchObject`] or [`Error::DirectoryOperation`], everything else
/// is a transport problem.
fn map_error(operation: Operation, target: &str, err: LdapError) -> Error {
	match err {
		LdapError::LdapResult { result } if result.rc == NO_SUCH_OBJECT => {
			Error::NoSuchObject { dn: target.to_owned() }
		}
		LdapError::LdapResult { result } => Error::DirectoryOperation {
			operation,
			target: target.to_owned(),
			code: result.rc,
			reason: result.text,
		},
		err => Error::Connectivity { operation, reason: err.to_string() },
	}
}

/// The `ldap3` equivalent of a [`Scope`].
fn ldap_scope(scope: Scope) -> ldap3::Scope {
	match scope {
		Scope::Base => ldap3::Scope::Base,
		Scope::OneLevel => ldap3::Scope::OneLevel,
		Scope::Subtree => ldap3::Scope::Subtree,
	}
}

/// The `ldap3` equivalent of a [`Control`].
fn raw_control(control: &Control) -> RawControl {
	RawControl { ctype: control.oid.clone(), crit: control.critical, val: control.value.clone() }
}

/// Conversion of `ldap3` search results into [`RawEntry`] values.
pub trait SearchEntryExt {
	/// Merge the textual and binary attributes into one raw entry.
	fn into_raw(self) -> RawEntry;
}

impl SearchEntryExt for SearchEntry {
	fn into_raw(self) -> RawEntry {
		let mut attributes: RawAttributes = self
			.attrs
			.into_iter()
			.map(|(name, values)| (name, values.into_iter().map(String::into_bytes).collect()))
			.collect();
		for (name, values) in self.bin_attrs {
			attributes.entry(name).or_default().extend(values);
		}
		RawEntry { dn: self.dn, attributes }
	}
}

impl RawEntry {
	/// Remove an attribute, matched case-insensitively, returning its UTF-8
	/// values.
	fn take_all_text(&mut self, name: &str) -> Vec<String> {
		let key = self.attributes.keys().find(|key| key.eq_ignore_ascii_case(name)).cloned();
		key.and_then(|key| self.attributes.remove(&key))
			.unwrap_or_default()
			.into_iter()
			.filter_map(|value| String::from_utf8(value).ok())
			.collect()
	}

	/// The first UTF-8 value of an attribute, matched case-insensitively.
	fn take_text(&mut self, name: &str) -> Option<String> {
		self.take_all_text(name).into_iter().next()
	}
}
