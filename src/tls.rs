//! TLS identity for the mock server and trust material for redirected clients.
//!
//! A keystore is a password-protected PKCS#12 file holding one private key
//! entry: the key and its certificate chain, leaf first. The server presents
//! the chain; clients trust every certificate in it, so a chain that carries
//! its issuing CA works without touching the system trust store.

use crate::error::{HarnessError, HarnessResult};
use crate::logging::log_debug;
use p12_keystore::{KeyStoreEntry, PrivateKeyChain};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Alias of the private key entry in generated keystores.
const KEY_ALIAS: &str = "googleapis";

/// Certificates and private key loaded from a PKCS#12 keystore.
#[derive(Clone)]
pub struct KeyStore {
    path: PathBuf,
    certificates: Vec<CertificateDer<'static>>,
    private_key: Arc<PrivateKeyDer<'static>>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("path", &self.path)
            .field("certificates", &self.certificates.len())
            .finish_non_exhaustive()
    }
}

impl KeyStore {
    /// Read a keystore from disk and open it with `password`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::KeyStore`] if the file cannot be read, the
    /// password does not open it, or it holds no private key entry.
    pub fn load(path: impl AsRef<Path>, password: &str) -> HarnessResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| HarnessError::key_store(path, "could not be read", Some(e)))?;
        Self::from_pkcs12(path, &bytes, password)
    }

    /// Parse a keystore from PKCS#12 bytes; `path` is only used for reporting.
    pub fn from_pkcs12(path: impl AsRef<Path>, der: &[u8], password: &str) -> HarnessResult<Self> {
        let path = path.as_ref();

        let store = p12_keystore::KeyStore::from_pkcs12(der, password)
            .map_err(|e| unreadable(path, e))?;
        let (alias, entry) = store
            .private_key_chain()
            .ok_or_else(|| HarnessError::key_store(path, "no private key entry found", None))?;

        let certificates = entry
            .chain()
            .iter()
            .map(|cert| CertificateDer::from(cert.as_der().to_vec()))
            .collect::<Vec<_>>();
        if certificates.is_empty() {
            return Err(HarnessError::key_store(
                path,
                format!("private key entry '{alias}' carries no certificate"),
                None,
            ));
        }
        let private_key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(entry.key().to_vec()));

        log_debug!(
            path = %path.display(),
            alias = alias,
            certificate_count = certificates.len(),
            "Loaded key store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            certificates,
            private_key: Arc::new(private_key),
        })
    }

    /// Generate a CA plus a server certificate for `hosts` and write them,
    /// protected by `password`, to `path`.
    pub fn generate_self_signed(
        path: impl AsRef<Path>,
        hosts: &[&str],
        password: &str,
    ) -> HarnessResult<Self> {
        let path = path.as_ref();
        let (key, chain) = generate_identity(hosts)
            .map_err(|e| HarnessError::key_store(path, format!("generation failed: {e}"), None))?;
        let bytes = encode_pkcs12(&key, &chain, password).map_err(|e| {
            HarnessError::key_store(path, format!("could not be encoded: {e}"), None)
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                HarnessError::key_store(path, "parent directory could not be created", Some(e))
            })?;
        }
        std::fs::write(path, &bytes)
            .map_err(|e| HarnessError::key_store(path, "could not be written", Some(e)))?;

        Self::from_pkcs12(path, &bytes, password)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certificates
    }

    /// rustls server configuration presenting this identity.
    pub fn server_config(&self) -> HarnessResult<rustls::ServerConfig> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let mut config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .and_then(|builder| {
                builder
                    .with_no_client_auth()
                    .with_single_cert(self.certificates.clone(), self.private_key.clone_key())
            })
            .map_err(|e| {
                HarnessError::key_store(&self.path, format!("TLS identity rejected: {e}"), None)
            })?;
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        Ok(config)
    }

    /// Certificates a client must trust to talk to a server using this keystore.
    pub fn trust_certificates(&self) -> HarnessResult<Vec<reqwest::Certificate>> {
        self.certificates
            .iter()
            .map(|der| {
                reqwest::Certificate::from_der(der.as_ref()).map_err(|e| {
                    HarnessError::key_store(
                        &self.path,
                        format!("certificate not usable as trust anchor: {e}"),
                        None,
                    )
                })
            })
            .collect()
    }
}

fn unreadable(path: &Path, error: p12_keystore::error::Error) -> HarnessError {
    let message = match error {
        p12_keystore::error::Error::MacError(_) => "wrong password or corrupted file".to_string(),
        other => format!("not a readable PKCS#12 file: {other}"),
    };
    HarnessError::key_store(path, message, None)
}

/// PKCS#8 key of the server certificate and the chain, leaf first.
fn generate_identity(hosts: &[&str]) -> Result<(Vec<u8>, Vec<Vec<u8>>), rcgen::Error> {
    let ca_key = KeyPair::generate()?;
    let mut ca_params = CertificateParams::default();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params.distinguished_name = distinguished_name("Sheets Harness Test CA");
    let ca_cert = ca_params.self_signed(&ca_key)?;
    let issuer = Issuer::new(ca_params, ca_key);

    let server_key = KeyPair::generate()?;
    let names = hosts.iter().map(|h| (*h).to_string()).collect::<Vec<_>>();
    let mut server_params = CertificateParams::new(names)?;
    server_params.distinguished_name = distinguished_name("Sheets Harness Mock Server");
    server_params.is_ca = IsCa::NoCa;
    let server_cert = server_params.signed_by(&server_key, &issuer)?;

    let chain = vec![server_cert.der().to_vec(), ca_cert.der().to_vec()];
    Ok((server_key.serialize_der(), chain))
}

fn encode_pkcs12(key: &[u8], chain: &[Vec<u8>], password: &str) -> p12_keystore::Result<Vec<u8>> {
    let certificates = chain
        .iter()
        .map(|der| p12_keystore::Certificate::from_der(der))
        .collect::<p12_keystore::Result<Vec<_>>>()?;
    let local_key_id = std::iter::repeat_with(|| fastrand::u8(..))
        .take(20)
        .collect::<Vec<_>>();

    let mut store = p12_keystore::KeyStore::new();
    store.add_entry(
        KEY_ALIAS,
        KeyStoreEntry::PrivateKeyChain(PrivateKeyChain::new(key, local_key_id, certificates)),
    );
    store.writer(password).write()
}

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    name
}
