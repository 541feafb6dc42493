#![allow(clippy::expect_used, clippy::missing_docs_in_private_items, clippy::unwrap_used)]
use std::{error::Error, sync::Arc};

use ldap_orm::{
	controls::{PasswordModify, PASSWORD_MODIFY_OID, WHOAMI_OID},
	schema::MEMBER_OF,
	value::SyntaxKind,
	ExtendedRequest, Session,
};

mod common;

use common::{session, Call, MockDirectory, RecordingReporter, SCHEMA};

#[tokio::test]
async fn schema_is_loaded_once() -> Result<(), Box<dyn Error>> {
	let reporter = Arc::new(RecordingReporter::default());
	let session = Session::new(MockDirectory::new()).await?.with_reporter(reporter.clone());

	assert_eq!(session.directory().calls, [Call::FetchSchema]);
	let schema = session.schema();
	assert_eq!(schema.kind("uidNumber"), SyntaxKind::Integer);
	assert_eq!(schema.kind("commonName"), SyntaxKind::Text);
	assert_eq!(schema.kind("CN"), SyntaxKind::Text);
	assert_eq!(schema.kind("pwdLockout"), SyntaxKind::Boolean);
	assert_eq!(schema.kind("jpegPhoto"), SyntaxKind::Opaque);
	assert_eq!(schema.kind(MEMBER_OF), SyntaxKind::Text);
	assert!(schema.len() > SCHEMA.len());

	// Events emitted before the reporter was swapped in went to tracing.
	assert!(reporter.events().is_empty());
	Ok(())
}

#[tokio::test]
async fn broken_schema_fails_the_session() {
	#[derive(Debug, Default)]
	struct Cyclic;

	impl ldap_orm::Directory for Cyclic {
		async fn search(
			&mut self,
			_: &str,
			_: ldap_orm::Scope,
			_: &str,
			_: &[String],
			_: &[ldap_orm::Control],
		) -> ldap_orm::Result<Vec<ldap_orm::RawEntry>> {
			Ok(Vec::new())
		}

		async fn add(&mut self, _: &str, _: ldap_orm::directory::RawAttributes) -> ldap_orm::Result<()> {
			Ok(())
		}

		async fn modify(
			&mut self,
			_: &str,
			_: Vec<ldap_orm::Modification>,
		) -> ldap_orm::Result<()> {
			Ok(())
		}

		async fn delete(&mut self, _: &str) -> ldap_orm::Result<()> {
			Ok(())
		}

		async fn extended(&mut self, _: ExtendedRequest) -> ldap_orm::Result<Option<Vec<u8>>> {
			Ok(None)
		}

		async fn fetch_schema(&mut self) -> ldap_orm::Result<Vec<String>> {
			Ok(vec![
				"( 1.1 NAME 'a' SUP b )".to_owned(),
				"( 1.2 NAME 'b' SUP a )".to_owned(),
			])
		}
	}

	assert!(matches!(
		Session::new(Cyclic).await,
		Err(ldap_orm::Error::SchemaResolution { .. })
	));
}

#[tokio::test]
async fn whoami_strips_prefix() -> Result<(), Box<dyn Error>> {
	let (mut session, _) = session().await?;
	session
		.directory_mut()
		.respond_extended(Some(b"dn:uid=jdoe,ou=People,dc=example,dc=com".to_vec()))
		.respond_extended(None);

	assert_eq!(session.whoami().await?, "uid=jdoe,ou=People,dc=example,dc=com");
	assert_eq!(session.whoami().await?, "");
	assert_eq!(
		session.directory().calls[0],
		Call::Extended(ExtendedRequest { name: WHOAMI_OID.to_owned(), value: None })
	);
	Ok(())
}

#[tokio::test]
async fn change_password() -> Result<(), Box<dyn Error>> {
	let (mut session, reporter) = session().await?;
	let dn = "uid=jdoe,ou=People,dc=example,dc=com";
	session.directory_mut().respond_extended(None).respond_extended(Some(vec![
		0x30, 0x06, 0x80, 0x04, b'g', b'e', b'n', b'!',
	]));

	let response = session.change_password(dn, "new", Some("old")).await?;
	assert_eq!(response.generated, None);
	let response = session.generate_password(dn, None).await?;
	assert_eq!(response.generated.as_deref(), Some(&b"gen!"[..]));

	assert_eq!(
		session.directory().calls,
		[
			Call::Extended(PasswordModify::new(dn, "new").with_current("old").to_request()),
			Call::Extended(PasswordModify::generate(dn).to_request()),
		]
	);
	let Call::Extended(request) = &session.directory().calls[1] else {
		panic!("expected an extended operation");
	};
	assert_eq!(request.name, PASSWORD_MODIFY_OID);
	// identity [0] only: no old password [1], no new password [2]
	let value = request.value.clone().unwrap_or_default();
	assert_eq!(value[2], 0x80);
	assert_eq!(usize::from(value[1]), value.len() - 2);
	assert_eq!(usize::from(value[3]), value.len() - 4);

	assert_eq!(
		reporter.events().iter().filter(|event| event.starts_with("PasswordChanged")).count(),
		2
	);
	Ok(())
}

#[tokio::test]
async fn malformed_password_response() -> Result<(), Box<dyn Error>> {
	let (mut session, reporter) = session().await?;
	session.directory_mut().respond_extended(Some(vec![0x04, 0x00]));

	assert!(matches!(
		session.change_password("uid=a", "x", None).await,
		Err(ldap_orm::Error::InvalidValue { .. })
	));
	assert!(reporter.events().is_empty());
	Ok(())
}
