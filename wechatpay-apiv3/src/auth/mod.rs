//! Request authentication and response verification.
//!
//! Outbound: [`RequestSigner`] turns a [`MerchantCredential`] and a request
//! into the `Authorization` header value the platform expects. Inbound:
//! [`ResponseVerifier`] decides whether a response's security headers prove
//! it came from the platform untampered. [`AuthContext`] bundles one of each
//! for the common case of a client holding a single merchant identity.
//!
//! Both operations are pure and stateless given their inputs; any number of
//! threads may sign and verify concurrently without coordination.

pub mod signer;
pub mod verifier;

pub use signer::{MerchantCredential, RequestSigner, SignatureToken};
pub use verifier::{ResponseVerifier, SecurityHeaders};

use crate::certificates::CertificateStore;
use crate::error::Result;

/// One merchant identity plus one certificate store, constructed once per
/// client configuration and reused for the client's lifetime.
///
/// The verifier handed out by [`AuthContext::verifier`] is always the
/// certificate-backed [`ResponseVerifier::Platform`]; the bootstrap variant
/// is not reachable from here.
#[derive(Debug)]
pub struct AuthContext {
    signer: RequestSigner,
    store: CertificateStore,
}

impl AuthContext {
    /// Bundles a merchant credential with a certificate store.
    #[must_use]
    pub fn new(credential: MerchantCredential, store: CertificateStore) -> Self {
        Self { signer: RequestSigner::new(credential), store }
    }

    /// The request signer for this merchant.
    #[must_use]
    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    /// The shared certificate store.
    #[must_use]
    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    /// A certificate-backed verifier over the shared store.
    #[must_use]
    pub fn verifier(&self) -> ResponseVerifier {
        ResponseVerifier::platform(self.store.clone())
    }

    /// Signs one outbound request. See [`RequestSigner::sign_request`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::PayError::Signing`] on a rejected key.
    pub fn sign_request(&self, method: &str, target: &str, body: &str) -> Result<SignatureToken> {
        self.signer.sign_request(method, target, body)
    }

    /// Verifies one inbound response. See [`ResponseVerifier::verify`].
    ///
    /// # Errors
    ///
    /// Propagates the verifier's integrity errors.
    pub fn verify_response(&self, headers: &SecurityHeaders, body: &str) -> Result<()> {
        self.verifier().verify(headers, body)
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;
    use crate::crypto::rsa::MerchantPrivateKey;

    const MERCHANT_KEY_PEM: &str = include_str!("../../tests/fixtures/merchant_key.pem");

    #[test]
    fn test_context_verifier_is_certificate_backed() {
        let key = MerchantPrivateKey::from_pem(MERCHANT_KEY_PEM).expect("fixture key");
        let credential = MerchantCredential::new("1900000001", "1DEA4218", key);
        let context = AuthContext::new(credential, CertificateStore::new());

        // Normal request paths can only ever obtain the Platform variant.
        assert!(matches!(context.verifier(), ResponseVerifier::Platform { .. }));
    }

    #[test]
    fn test_context_signs_like_its_signer() {
        let key = MerchantPrivateKey::from_pem(MERCHANT_KEY_PEM).expect("fixture key");
        let credential = MerchantCredential::new("1900000001", "1DEA4218", key);
        let context = AuthContext::new(credential, CertificateStore::new());

        let token = context.sign_request("GET", "/v3/certificates", "").expect("sign");
        assert_eq!(token.mchid, "1900000001");
    }
}

#[cfg(test)]
mod tests;
