#![allow(dead_code)]

use std::{
	collections::VecDeque,
	error::Error,
	sync::{Arc, Mutex},
};

use ldap_orm::{
	directory::RawAttributes, Control, Directory, EntityDefinition, Event,
	ExtendedRequest, Modification, RawEntry, Reporter, Scope, Session,
};

/// Schema dump served by [`MockDirectory::fetch_schema`].
pub const SCHEMA: &[&str] = &[
	"( 2.5.4.41 NAME 'name' EQUALITY caseIgnoreMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{32768} )",
	"( 2.5.4.3 NAME ( 'cn' 'commonName' ) SUP name )",
	"( 2.5.4.4 NAME ( 'sn' 'surname' ) SUP name )",
	"( 2.5.4.42 NAME ( 'givenName' 'gn' ) SUP name )",
	"( 2.5.4.13 NAME 'description' SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{1024} )",
	"( 0.9.2342.19200300.100.1.1 NAME ( 'uid' 'userid' ) SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{256} )",
	"( 0.9.2342.19200300.100.1.3 NAME ( 'mail' 'rfc822Mailbox' ) SYNTAX 1.3.6.1.4.1.1466.115.121.1.26{256} )",
	"( 1.3.6.1.1.1.1.0 NAME 'uidNumber' EQUALITY integerMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.27 SINGLE-VALUE )",
	"( 1.3.6.1.1.1.1.1 NAME 'gidNumber' EQUALITY integerMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.27 SINGLE-VALUE )",
	"( 2.5.4.31 NAME 'member' SYNTAX 1.3.6.1.4.1.1466.115.121.1.12 )",
	"( 2.5.4.0 NAME 'objectClass' SYNTAX 1.3.6.1.4.1.1466.115.121.1.38 )",
	"( 1.3.6.1.4.1.42.2.27.8.1.17 NAME 'pwdLockout' SYNTAX 1.3.6.1.4.1.1466.115.121.1.7 SINGLE-VALUE )",
];

pub const PEOPLE: &str = "ou=People,dc=example,dc=com";
pub const GROUPS: &str = "ou=Groups,dc=example,dc=com";

/// One round trip seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	Search {
		base: String,
		scope: Scope,
		filter: String,
		attributes: Vec<String>,
		controls: Vec<Control>,
	},
	Add { dn: String, attributes: RawAttributes },
	Modify { dn: String, changes: Vec<Modification> },
	Delete { dn: String },
	Extended(ExtendedRequest),
	FetchSchema,
}

/// An in-memory directory answering from scripted responses and recording
/// every call.
#[derive(Debug, Default)]
pub struct MockDirectory {
	pub calls: Vec<Call>,
	pub search_results: VecDeque<Vec<RawEntry>>,
	pub extended_results: VecDeque<Option<Vec<u8>>>,
	/// Make the next write fail with this error.
	pub fail_next_write: Option<ldap_orm::Error>,
}

impl MockDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queue the entries returned by the next search.
	pub fn respond(&mut self, entries: Vec<RawEntry>) -> &mut Self {
		self.search_results.push_back(entries);
		self
	}

	pub fn respond_extended(&mut self, value: Option<Vec<u8>>) -> &mut Self {
		self.extended_results.push_back(value);
		self
	}

	/// Calls other than searches and the schema fetch.
	pub fn writes(&self) -> Vec<&Call> {
		self.calls
			.iter()
			.filter(|call| matches!(call, Call::Add { .. } | Call::Modify { .. } | Call::Delete { .. }))
			.collect()
	}

	pub fn searches(&self) -> Vec<&Call> {
		self.calls.iter().filter(|call| matches!(call, Call::Search { .. })).collect()
	}

	fn write_result(&mut self) -> ldap_orm::Result<()> {
		match self.fail_next_write.take() {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}
}

impl Directory for MockDirectory {
	async fn search(
		&mut self,
		base: &str,
		scope: Scope,
		filter: &str,
		attributes: &[String],
		controls: &[Control],
	) -> ldap_orm::Result<Vec<RawEntry>> {
		self.calls.push(Call::Search {
			base: base.to_owned(),
			scope,
			filter: filter.to_owned(),
			attributes: attributes.to_vec(),
			controls: controls.to_vec(),
		});
		Ok(self.search_results.pop_front().unwrap_or_default())
	}

	async fn add(&mut self, dn: &str, attributes: RawAttributes) -> ldap_orm::Result<()> {
		self.calls.push(Call::Add { dn: dn.to_owned(), attributes });
		self.write_result()
	}

	async fn modify(&mut self, dn: &str, changes: Vec<Modification>) -> ldap_orm::Result<()> {
		self.calls.push(Call::Modify { dn: dn.to_owned(), changes });
		self.write_result()
	}

	async fn delete(&mut self, dn: &str) -> ldap_orm::Result<()> {
		self.calls.push(Call::Delete { dn: dn.to_owned() });
		self.write_result()
	}

	async fn extended(&mut self, request: ExtendedRequest) -> ldap_orm::Result<Option<Vec<u8>>> {
		self.calls.push(Call::Extended(request));
		Ok(self.extended_results.pop_front().flatten())
	}

	async fn fetch_schema(&mut self) -> ldap_orm::Result<Vec<String>> {
		self.calls.push(Call::FetchSchema);
		Ok(SCHEMA.iter().map(|s| (*s).to_owned()).collect())
	}
}

/// Collects the events a session reports.
#[derive(Debug, Default)]
pub struct RecordingReporter {
	pub events: Mutex<Vec<String>>,
}

impl RecordingReporter {
	pub fn events(&self) -> Vec<String> {
		self.events.lock().map(|events| events.clone()).unwrap_or_default()
	}
}

impl Reporter for RecordingReporter {
	fn report(&self, event: &Event<'_>) {
		if let Ok(mut events) = self.events.lock() {
			events.push(format!("{event:?}"));
		}
	}
}

/// A session on a fresh mock directory, its schema already loaded.
pub async fn session() -> Result<(Session<MockDirectory>, Arc<RecordingReporter>), Box<dyn Error>> {
	let reporter = Arc::new(RecordingReporter::default());
	let mut session = Session::new(MockDirectory::new()).await?.with_reporter(reporter.clone());
	session.directory_mut().calls.clear();
	Ok((session, reporter))
}

pub fn users() -> Arc<EntityDefinition> {
	EntityDefinition::new(PEOPLE)
		.with_required_attributes(["uid", "cn", "sn"])
		.with_required_object_classes(["inetOrgPerson", "posixAccount"])
		.with_name_attribute("uid")
		.with_membership_attribute("memberOf")
		.shared()
}

pub fn groups() -> Arc<EntityDefinition> {
	EntityDefinition::new(GROUPS)
		.with_required_attributes(["cn"])
		.with_required_object_classes(["groupOfNames"])
		.shared()
}

pub fn user_entry(uid: &str, uid_number: i64) -> RawEntry {
	RawEntry::new(
		format!("uid={uid},{PEOPLE}"),
		[
			("objectClass", vec!["inetOrgPerson".to_owned(), "posixAccount".to_owned()]),
			("uid", vec![uid.to_owned()]),
			("cn", vec![format!("User {uid}")]),
			("sn", vec![uid.to_uppercase()]),
			("uidNumber", vec![uid_number.to_string()]),
			("memberOf", vec![format!("cn=staff,{GROUPS}")]),
		],
	)
}

pub fn group_entry(cn: &str) -> RawEntry {
	RawEntry::new(
		format!("cn={cn},{GROUPS}"),
		[("objectClass", vec!["groupOfNames"]), ("cn", vec![cn])],
	)
}

/// Base DN of the docker test directory.
pub const LIVE_BASE: &str = "dc=example,dc=org";

pub fn live_config() -> ldap_orm::Config {
	ldap_orm::Config {
		url: url::Url::parse("ldap://localhost:1389").expect("static URL"),
		connection: ldap_orm::config::ConnectionConfig::default(),
		bind: ldap_orm::config::BindConfig::Simple {
			dn: format!("cn=admin,{LIVE_BASE}"),
			password: "adminpassword".to_owned(),
		},
		schema_base: None,
	}
}

pub async fn ldap_connect() -> Result<ldap3::Ldap, Box<dyn Error>> {
	let (conn, mut ldap) = ldap3::LdapConnAsync::new("ldap://localhost:1389").await?;
	let _handle = tokio::spawn(async move {
		if let Err(err) = conn.drive().await {
			panic!("Ldap connection error {err}");
		}
	});
	ldap.simple_bind(&format!("cn=admin,{LIVE_BASE}"), "adminpassword").await?.success()?;
	Ok(ldap)
}

pub async fn ldap_add_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("ou={ou},{LIVE_BASE}"),
		vec![("objectClass", ["organizationalUnit"].into()), ("ou", [ou].into())],
	)
	.await?
	.success()?;
	Ok(())
}

/// Remove an organizational unit and everything directly below it.
pub async fn ldap_delete_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	let base = format!("ou={ou},{LIVE_BASE}");
	let (children, _) = ldap
		.search(&base, ldap3::Scope::OneLevel, "(objectClass=*)", vec!["1.1"])
		.await?
		.success()?;
	for child in children {
		let child = ldap3::SearchEntry::construct(child);
		ldap.delete(&child.dn).await?.success()?;
	}
	ldap.delete(&base).await?.success()?;
	Ok(())
}
