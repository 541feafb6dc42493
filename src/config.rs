//! Config for the LDAP client.
use std::{
	io::BufReader,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};

use ldap3::LdapConnSettings;
use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Where the server schema is read from when the root DSE names no
/// `subschemaSubentry`.
pub const DEFAULT_SCHEMA_BASE: &str = "cn=schema";

/// LDAP configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
	/// The URL to connect to the server with. Supports ldap, ldaps, and ldapi
	/// schemes
	pub url: Url,
	/// Connection settings.
	#[serde(default)]
	pub connection: ConnectionConfig,
	/// How the session authenticates.
	#[serde(default)]
	pub bind: BindConfig,
	/// DN of the subschema entry, if the root DSE should not be asked
	#[serde(default)]
	pub schema_base: Option<String>,
}

/// Authentication performed right after connecting.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BindConfig {
	/// Do not bind, operate anonymously.
	#[default]
	Anonymous,
	/// Bind with a DN and password.
	Simple {
		/// The DN to bind as
		dn: String,
		/// The password of that DN
		password: String,
	},
	/// SASL EXTERNAL, using the TLS client certificate or the peer
	/// credentials of an `ldapi` socket.
	SaslExternal,
}

impl BindConfig {
	/// The identity reported in authentication errors.
	pub(crate) fn identity(&self) -> &str {
		match self {
			BindConfig::Simple { dn, .. } => dn,
			BindConfig::Anonymous | BindConfig::SaslExternal => "",
		}
	}
}

/// Configuration for how to connect to the LDAP server
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
	/// Timeout to establish a connection in seconds.
	pub timeout: u64,

	/// TLS config
	#[serde(default)]
	pub tls: TlsConfig,
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		Self { timeout: 5, tls: TlsConfig::default() }
	}
}

/// TLS Configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
	/// Use StartTLS extended operation for establishing a secure connection,
	/// rather than TLS on a dedicated port.
	pub starttls: bool,

	/// Disable verification of TLS certificates
	pub no_tls_verify: bool,

	/// TLS root certificates path, PEM
	pub root_certificates_path: Option<PathBuf>,

	/// Path of the TLS client key to use for the connection, PEM
	pub client_key_path: Option<PathBuf>,

	/// Path of the TLS client certificate to use for the connection, PEM
	pub client_certificate_path: Option<PathBuf>,
}

impl ConnectionConfig {
	/// Create a [`LdapConnSettings`] based on this [`ConnectionConfig`]
	pub(crate) async fn to_settings(&self) -> Result<LdapConnSettings, Error> {
		let mut settings = LdapConnSettings::new();

		settings = settings.set_conn_timeout(Duration::from_secs(self.timeout));
		settings = settings.set_starttls(self.tls.starttls);
		settings = settings.set_no_tls_verify(self.tls.no_tls_verify);

		let client_auth = match (&self.tls.client_key_path, &self.tls.client_certificate_path) {
			(Some(key_path), Some(cert_path)) => Some((key_path, cert_path)),
			(None, None) => None,
			_ => Err(Error::Invalid(
				"Both a client certificate and key file in PEM format must be specified"
					.to_owned(),
			))?,
		};

		if self.tls.root_certificates_path.is_none() && client_auth.is_none() {
			return Ok(settings);
		}

		let mut roots = RootCertStore::empty();
		if let Some(path) = &self.tls.root_certificates_path {
			for certificate in read_certificates(path).await? {
				roots
					.add(&certificate)
					.map_err(|_| Error::Invalid("Could not read root certificate".to_owned()))?;
			}
		}

		let builder = ClientConfig::builder().with_safe_defaults().with_root_certificates(roots);
		let config = match client_auth {
			Some((key_path, cert_path)) => {
				let certificates = read_certificates(cert_path).await?;
				let key = read_private_key(key_path).await?;
				builder
					.with_client_auth_cert(certificates, key)
					.map_err(|_| Error::Invalid("Could not read client certificates".to_owned()))?
			}
			None => builder.with_no_client_auth(),
		};

		Ok(settings.set_config(Arc::new(config)))
	}
}

/// Read every certificate from a PEM file. A file without any is invalid.
async fn read_certificates(path: &Path) -> Result<Vec<Certificate>, Error> {
	let pem = tokio::fs::read(path).await?;
	let certificates = rustls_pemfile::certs(&mut BufReader::new(pem.as_slice()))
		.map_err(|_| Error::Invalid(format!("Could not parse {}", path.display())))?;
	if certificates.is_empty() {
		return Err(Error::Invalid(format!("No certificate found in {}", path.display())));
	}
	Ok(certificates.into_iter().map(Certificate).collect())
}

/// Read the first private key from a PEM file.
async fn read_private_key(path: &Path) -> Result<PrivateKey, Error> {
	let pem = tokio::fs::read(path).await?;
	let mut reader = BufReader::new(pem.as_slice());
	loop {
		match rustls_pemfile::read_one(&mut reader) {
			Ok(Some(
				rustls_pemfile::Item::PKCS8Key(key)
				| rustls_pemfile::Item::RSAKey(key)
				| rustls_pemfile::Item::ECKey(key),
			)) => return Ok(PrivateKey(key)),
			Ok(Some(_)) => {}
			Ok(None) | Err(_) => {
				return Err(Error::Invalid(format!("No private key found in {}", path.display())))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use std::{io::ErrorKind, path::PathBuf};

	use serde::{de::value::MapDeserializer, Deserialize};

	use super::{BindConfig, Config, ConnectionConfig, TlsConfig};
	use crate::error;

	#[tokio::test]
	async fn test_tls_config() -> Result<(), Box<dyn std::error::Error>> {
		// no TLS material
		ConnectionConfig::default().to_settings().await?;

		// invalid crt test
		assert!(matches!(
			ConnectionConfig {
				tls: TlsConfig {
					root_certificates_path: Some(PathBuf::from("src/config.rs")),
					..TlsConfig::default()
				},
				timeout: 5,
			}
			.to_settings()
			.await
			.err()
			.unwrap(),
			error::Error::Invalid(_)
		));

		// key without certificate
		assert!(matches!(
			ConnectionConfig {
				tls: TlsConfig {
					client_key_path: Some(PathBuf::from("client.key")),
					..TlsConfig::default()
				},
				timeout: 5,
			}
			.to_settings()
			.await
			.err()
			.unwrap(),
			error::Error::Invalid(_)
		));

		// invalid path test
		assert!(matches!(
			ConnectionConfig {
				tls: TlsConfig {
					client_key_path: Some(PathBuf::from("invalid_path")),
					client_certificate_path: Some(PathBuf::from("invalid_path")),
					root_certificates_path: Some(PathBuf::from("invalid_path")),
					starttls: false,
					no_tls_verify: false,
				},
				timeout: 5,
			}
			.to_settings()
			.await
			.err()
			.unwrap(),
			error::Error::Io(io_err) if io_err.kind() == ErrorKind::NotFound
		));

		Ok(())
	}

	/// Deserialize from string key/value pairs.
	fn from_pairs<'de, T: Deserialize<'de>>(pairs: &'de [(&'de str, &'de str)]) -> T {
		let map = MapDeserializer::<_, serde::de::value::Error>::new(pairs.iter().copied());
		T::deserialize(map).unwrap()
	}

	#[test]
	fn bind_modes() {
		let anonymous: BindConfig = from_pairs(&[("method", "anonymous")]);
		assert!(matches!(anonymous, BindConfig::Anonymous));
		assert_eq!(anonymous.identity(), "");

		let simple: BindConfig =
			from_pairs(&[("method", "simple"), ("dn", "cn=admin"), ("password", "pw")]);
		assert_eq!(simple.identity(), "cn=admin");

		let external: BindConfig = from_pairs(&[("method", "sasl_external")]);
		assert!(matches!(external, BindConfig::SaslExternal));
	}

	#[test]
	fn defaults() {
		let config: Config = from_pairs(&[("url", "ldap://localhost:389")]);
		assert_eq!(config.connection.timeout, 5);
		assert!(!config.connection.tls.starttls);
		assert!(matches!(config.bind, BindConfig::Anonymous));
		assert_eq!(config.schema_base, None);
	}
}
