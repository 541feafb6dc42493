//! Map LDAP directory entries onto typed objects with change tracking.
//!
//! The library resolves the server schema once per session, decodes attribute
//! values according to their syntax and tracks every change made to a loaded
//! entry, so that persisting it sends only the attributes that actually
//! differ. Kinds of entries (users, groups, ...) are described declaratively
//! by an [`EntityDefinition`] and listed through a [`Collection`].
//!
//! For a general primer on LDAP, the [introduction] in the `ldap3` crate which
//! is used here for interfacing with LDAP is an excellent resource.
//!
//! [introduction]: https://github.com/inejge/ldap3/blob/master/LDAP-primer.md
//!
//! # Getting started
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use url::Url;
//! use ldap_orm::{
//!     config::{BindConfig, Config, ConnectionConfig},
//!     Collection, EntityDefinition, Entry, SearchOptions, Session,
//! };
//!
//! // Configuration can also be deserialized with serde. It's hand-constructed
//! // here for demonstration purposes.
//! let config = Config {
//!     url: Url::parse("ldap://localhost")?,
//!     connection: ConnectionConfig::default(),
//!     bind: BindConfig::Simple {
//!         dn: "cn=admin,dc=example,dc=com".to_owned(),
//!         password: "verysecret".to_owned(),
//!     },
//!     schema_base: None,
//! };
//! let mut session = Session::connect(&config).await?;
//!
//! let users = EntityDefinition::new("ou=People,dc=example,dc=com")
//!     .with_required_attributes(["uid", "cn", "sn"])
//!     .with_required_object_classes(["inetOrgPerson"])
//!     .with_name_attribute("uid")
//!     .with_membership_attribute("memberOf")
//!     .shared();
//!
//! let mut user = session.find_one(&users, "uid", "jdoe", &SearchOptions::new()).await?;
//! user.set("mail", ["jdoe@example.com"]);
//! user.persist(&mut session).await?;
//!
//! let mut people = Collection::new(users.clone());
//! for user in people.all(&mut session, &SearchOptions::new().sorted_by(["sn"])).await? {
//!     println!("{:?}", user.first("cn"));
//! }
//!
//! let mut new_user = Entry::new(users);
//! new_user.set("uid", ["asmith"]);
//! new_user.set("cn", ["Alice Smith"]);
//! new_user.set("sn", ["Smith"]);
//! new_user.persist(&mut session).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//! * Calls are awaited one at a time; a session is not shared between tasks.
//! * Only equality queries are built. Arbitrary filters are out of scope.
//! * Entries cannot be renamed or moved.

pub mod collection;
pub mod config;
pub mod controls;
pub mod definition;
pub mod directory;
pub mod entry;
pub mod error;
pub mod filter;
pub mod ldap;
pub mod report;
pub mod schema;
pub mod session;
pub mod value;

pub use ldap3;

pub use crate::{
	collection::{Collection, SearchOptions},
	config::Config,
	definition::{EntityDefinition, PostLoadCheck},
	directory::{Control, Directory, ExtendedRequest, Modification, ModifyOp, RawEntry, Scope},
	entry::{Attributes, Entry, State},
	error::{Error, Result},
	ldap::LdapDirectory,
	report::{Event, NoopReporter, Reporter, TracingReporter},
	schema::SchemaDescription,
	session::Session,
	value::Value,
};
