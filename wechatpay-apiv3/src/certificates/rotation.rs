//! Platform certificate download and rotation.
//!
//! The platform publishes its verification certificates at
//! `GET /v3/certificates`, each entry AEAD-encrypted under the merchant's
//! APIv3 secret. Rotation is the only operation in this crate that touches
//! the network, and the only writer of the [`CertificateStore`].
//!
//! # Bootstrap
//!
//! The listing response is itself signed by a platform certificate which,
//! on the very first fetch, is not in the store yet. That circularity is
//! broken deliberately: when the store is empty the response is checked with
//! [`ResponseVerifier::Bootstrap`] (headers and clock skew only), the
//! downloaded certificates are installed, and the same response is then
//! re-verified against the freshly installed keys. A store pre-seeded with
//! an operator-supplied certificate never enters bootstrap at all.
//!
//! Rotation is triggered by the operator (or a periodic job the operator
//! owns); nothing here retries or re-rotates automatically on verification
//! failure, so a signature incident cannot be amplified into a request storm
//! against the platform.

use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::signer::RequestSigner;
use crate::auth::verifier::{ResponseVerifier, SecurityHeaders};
use crate::certificates::{CertificateStore, PlatformCertificate};
use crate::crypto::aesgcm::{self, ApiV3Key};
use crate::error::{PayError, Result};

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://api.mch.weixin.qq.com";

/// Request-target of the certificate listing endpoint.
pub const CERTIFICATES_PATH: &str = "/v3/certificates";

/// AEAD algorithm name the listing declares for its entries.
const AEAD_ALGORITHM: &str = "AEAD_AES_256_GCM";

static DEFAULT_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"));

/// Shared HTTP client with pooling and conservative timeouts.
///
/// A singleton keeps connection pooling effective across all downloader
/// instances; cancellation and timeouts are the client's, and an abandoned
/// fetch leaves the store untouched.
static DEFAULT_HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("default HTTP client configuration is valid")
});

#[derive(Debug, Deserialize)]
struct CertificateList {
    data: Vec<CertificateEntry>,
}

#[derive(Debug, Deserialize)]
struct CertificateEntry {
    serial_no: String,
    encrypt_certificate: EncryptedCertificate,
}

#[derive(Debug, Deserialize)]
struct EncryptedCertificate {
    #[serde(default)]
    algorithm: String,
    nonce: String,
    associated_data: String,
    ciphertext: String,
}

/// A certificate obtained from a successful rotation, for display and
/// persistence by operator tooling.
#[derive(Debug, Clone)]
pub struct DownloadedCertificate {
    /// Normalized serial number.
    pub serial_no: String,
    /// Start of the validity window.
    pub not_before: SystemTime,
    /// End of the validity window.
    pub not_after: SystemTime,
    /// The decrypted PEM, exactly as the platform issued it.
    pub pem: String,
}

/// Fetches, decrypts, validates and installs platform certificates.
#[derive(Debug)]
pub struct CertificateDownloader {
    client: Client,
    base_url: Url,
    signer: RequestSigner,
    apiv3_key: ApiV3Key,
    store: CertificateStore,
}

impl CertificateDownloader {
    /// Creates a downloader against the production host.
    #[must_use]
    pub fn new(signer: RequestSigner, apiv3_key: ApiV3Key, store: CertificateStore) -> Self {
        Self {
            client: DEFAULT_HTTP_CLIENT.clone(),
            base_url: DEFAULT_BASE.clone(),
            signer,
            apiv3_key,
            store,
        }
    }

    /// Overrides the API host, e.g. for a sandbox or a test double.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Overrides the HTTP client, inheriting its timeout and cancellation
    /// behavior.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// The store this downloader writes to.
    #[must_use]
    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    /// Runs one rotation: fetch, verify, decrypt, validate, install.
    ///
    /// Returns the downloaded certificates in listing order. The store is
    /// only written after the response has passed verification and every
    /// entry has decrypted and parsed cleanly; a failed rotation leaves it
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Transport failures surface as [`PayError::Http`] /
    /// [`PayError::Platform`]; verification failures as the corresponding
    /// integrity errors; per-entry decryption or parse failures abort the
    /// whole rotation.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn rotate(&self) -> Result<Vec<DownloadedCertificate>> {
        let token = self.signer.sign_request("GET", CERTIFICATES_PATH, "")?;
        let url = self.base_url.join(CERTIFICATES_PATH)?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, token.header_value())
            .header(
                USER_AGENT,
                concat!("wechatpay-apiv3-rust/", env!("CARGO_PKG_VERSION")),
            )
            .send()
            .await?;

        let status = response.status();
        let security_headers = read_security_headers(response.headers());
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PayError::Platform { status: status.as_u16(), body });
        }

        let security_headers = security_headers?;

        // Trust-on-first-fetch: an empty store cannot resolve any serial, so
        // the signature check is deferred until after installation.
        let bootstrap = self.store.is_empty();
        let verifier = if bootstrap {
            debug!("store is empty, verifying listing response in bootstrap mode");
            ResponseVerifier::Bootstrap
        } else {
            ResponseVerifier::platform(self.store.clone())
        };
        verifier.verify(&security_headers, &body)?;

        let listing: CertificateList = serde_json::from_str(&body)?;

        let mut downloaded = Vec::with_capacity(listing.data.len());
        let mut certificates = Vec::with_capacity(listing.data.len());
        for entry in &listing.data {
            let (certificate, pem) = self.decrypt_entry(entry)?;
            downloaded.push(DownloadedCertificate {
                serial_no: certificate.serial_no().to_owned(),
                not_before: certificate.not_before(),
                not_after: certificate.not_after(),
                pem,
            });
            certificates.push(certificate);
        }

        if bootstrap {
            // Close the bootstrap window: the response must verify against
            // the certificates it delivered, checked on a staging store so a
            // failure leaves the shared store untouched.
            let staging = CertificateStore::with_certificates(certificates.iter().cloned());
            ResponseVerifier::platform(staging).verify(&security_headers, &body)?;
        }

        self.store.install(certificates);
        debug!(count = downloaded.len(), "installed platform certificates");

        Ok(downloaded)
    }

    /// Decrypts and validates one listing entry.
    fn decrypt_entry(&self, entry: &CertificateEntry) -> Result<(PlatformCertificate, String)> {
        let encrypted = &entry.encrypt_certificate;
        if !encrypted.algorithm.is_empty() && encrypted.algorithm != AEAD_ALGORITHM {
            return Err(PayError::MalformedCertificate(format!(
                "unsupported certificate encryption algorithm `{}`",
                encrypted.algorithm
            )));
        }

        let plain = aesgcm::decrypt(
            &encrypted.ciphertext,
            self.apiv3_key.as_bytes(),
            encrypted.nonce.as_bytes(),
            encrypted.associated_data.as_bytes(),
        )?;
        let pem = String::from_utf8(plain)
            .map_err(|_| PayError::MalformedCertificate("decrypted payload is not UTF-8".to_owned()))?;

        let certificate = PlatformCertificate::from_pem(&pem)?;
        if !entry.serial_no.is_empty()
            && certificate.serial_no() != crate::pem::normalize_serial(&entry.serial_no)
        {
            warn!(
                listed = %entry.serial_no,
                parsed = %certificate.serial_no(),
                "listing serial disagrees with certificate serial; using the parsed one"
            );
        }

        Ok((certificate, pem))
    }
}

fn read_security_headers(headers: &reqwest::header::HeaderMap) -> Result<SecurityHeaders> {
    let get = |name: &'static str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    };
    SecurityHeaders::from_parts(
        get(crate::auth::verifier::HEADER_NONCE),
        get(crate::auth::verifier::HEADER_SERIAL),
        get(crate::auth::verifier::HEADER_SIGNATURE),
        get(crate::auth::verifier::HEADER_TIMESTAMP),
    )
}
