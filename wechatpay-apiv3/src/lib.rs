//! WeChat Pay APIv3 authentication and integrity layer.
//!
//! This crate proves a merchant's identity on every outbound request and
//! proves that every inbound response truly came from the payment platform:
//!
//! - **Request signing**: RSA-SHA256 (PKCS#1 v1.5) over a canonical message
//!   of method, request-target, timestamp, nonce and body, rendered into the
//!   `WECHATPAY2-SHA256-RSA2048` `Authorization` header.
//! - **Response verification**: the four `Wechatpay-*` security headers are
//!   checked for completeness, clock skew (±300 s), a known certificate
//!   serial, and finally the signature itself, in that order, stopping at
//!   the first failure.
//! - **Certificate rotation**: platform verification certificates are
//!   fetched from `/v3/certificates`, decrypted with AEAD_AES_256_GCM under
//!   the merchant's APIv3 secret, validated, and installed into a shared
//!   [`CertificateStore`] with atomic snapshot semantics.
//!
//! The HTTP transport, URL building, body serialization and the payment
//! business API are out of scope; this crate is only the envelope that
//! authenticates any request/response pair.
//!
//! # Quick Start
//!
//! ## Sign a request
//!
//! ```no_run
//! use wechatpay_apiv3::{pem, MerchantCredential, RequestSigner};
//!
//! # fn example() -> wechatpay_apiv3::Result<()> {
//! let key = pem::load_private_key_file("merchant_key.pem")?;
//! let credential = MerchantCredential::new("1900000001", "1DEA4218EC1B2D4F", key);
//! let signer = RequestSigner::new(credential);
//!
//! let token = signer.sign_request("POST", "/v3/pay/transactions/native", "{\"amount\":1}")?;
//! // Send the request with `Authorization: {token.header_value()}`.
//! # Ok(())
//! # }
//! ```
//!
//! ## Verify a response
//!
//! ```no_run
//! use wechatpay_apiv3::{
//!     CertificateStore, PlatformCertificate, ResponseVerifier, SecurityHeaders,
//! };
//!
//! # fn example() -> wechatpay_apiv3::Result<()> {
//! let store = CertificateStore::with_certificates([
//!     PlatformCertificate::from_file("wechatpay_cert.pem")?,
//! ]);
//! let verifier = ResponseVerifier::platform(store);
//!
//! // Header values and body exactly as received.
//! let headers = SecurityHeaders::from_parts(
//!     Some("nonce-from-header"),
//!     Some("serial-from-header"),
//!     Some("signature-from-header"),
//!     Some("1700000000"),
//! )?;
//! verifier.verify(&headers, "{\"code\":\"SUCCESS\"}")?;
//! // Only now is the body trustworthy.
//! # Ok(())
//! # }
//! ```
//!
//! ## Rotate platform certificates
//!
//! ```no_run
//! use wechatpay_apiv3::{
//!     ApiV3Key, CertificateDownloader, CertificateStore, MerchantCredential, RequestSigner, pem,
//! };
//!
//! # async fn example() -> wechatpay_apiv3::Result<()> {
//! let key = pem::load_private_key_file("merchant_key.pem")?;
//! let signer = RequestSigner::new(MerchantCredential::new("1900000001", "1DEA4218", key));
//! let apiv3_key = ApiV3Key::new(*b"0123456789abcdef0123456789abcdef")?;
//!
//! let downloader = CertificateDownloader::new(signer, apiv3_key, CertificateStore::new());
//! for certificate in downloader.rotate().await? {
//!     println!("installed {}", certificate.serial_no);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`formatter`]: canonical messages, nonces, the `Authorization` value
//! - [`crypto`]: RSA, AEAD, SM3 and the legacy keyed digests
//! - [`auth`]: [`RequestSigner`] and [`ResponseVerifier`]
//! - [`certificates`]: [`CertificateStore`] and the rotation flow
//! - [`pem`]: key and certificate loading
//! - [`error`]: the error taxonomy ([`ErrorKind`])
//!
//! # Concurrency
//!
//! Signing and verification are pure and thread-safe. The certificate store
//! is many-readers/one-writer with atomic snapshot swaps: a verification in
//! flight either sees the pre-rotation map or the post-rotation map, never a
//! partial one. Nothing in this crate retries on its own.
//!
//! # Security Considerations
//!
//! - Private keys and the APIv3 secret never appear in `Debug` output or
//!   logs; signatures are truncated when logged.
//! - "Could not attempt verification" and "verified and failed" are distinct
//!   error variants; see [`error`] for why that distinction matters.
//! - The trust-on-first-fetch exception for certificate bootstrap is an
//!   explicit enum variant ([`ResponseVerifier::Bootstrap`]), only exercised
//!   by the rotation flow, and immediately re-checked against the
//!   downloaded certificates.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod auth;
pub mod certificates;
pub mod crypto;
pub mod error;
pub mod formatter;
pub mod pem;

pub use auth::signer::{MerchantCredential, RequestSigner, SignatureToken};
pub use auth::verifier::{ResponseVerifier, SecurityHeaders};
pub use auth::AuthContext;
pub use certificates::rotation::{CertificateDownloader, DownloadedCertificate};
pub use certificates::{CertificateStore, PlatformCertificate};
pub use crypto::aesgcm::ApiV3Key;
pub use crypto::rsa::{MerchantPrivateKey, PlatformPublicKey};
pub use error::{ErrorKind, PayError, Result};
