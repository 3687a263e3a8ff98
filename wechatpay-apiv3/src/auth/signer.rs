//! Request signing: merchant identity to `Authorization` token.

use tracing::instrument;

use crate::crypto::rsa::MerchantPrivateKey;
use crate::error::Result;
use crate::formatter::{self, DEFAULT_NONCE_LENGTH};
use crate::pem::normalize_serial;

/// A merchant's signing identity: merchant id, merchant certificate serial,
/// and the RSA private key behind an opaque handle.
///
/// Immutable once constructed and owned exclusively by the signer built from
/// it. The private key never appears in logs or serialized output.
pub struct MerchantCredential {
    mchid: String,
    serial_no: String,
    private_key: MerchantPrivateKey,
}

impl MerchantCredential {
    /// Builds a credential from its parts. The serial is normalized to the
    /// platform's uppercase-hex spelling.
    #[must_use]
    pub fn new(
        mchid: impl Into<String>,
        serial_no: &str,
        private_key: MerchantPrivateKey,
    ) -> Self {
        Self {
            mchid: mchid.into(),
            serial_no: normalize_serial(serial_no),
            private_key,
        }
    }

    /// Merchant id.
    #[must_use]
    pub fn mchid(&self) -> &str {
        &self.mchid
    }

    /// Merchant certificate serial number.
    #[must_use]
    pub fn serial_no(&self) -> &str {
        &self.serial_no
    }
}

impl std::fmt::Debug for MerchantCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerchantCredential")
            .field("mchid", &self.mchid)
            .field("serial_no", &self.serial_no)
            .finish_non_exhaustive()
    }
}

/// One signed request, ready to be rendered into the `Authorization` header.
#[derive(Debug, Clone)]
pub struct SignatureToken {
    /// Merchant id the signature speaks for.
    pub mchid: String,
    /// Fresh nonce included in the signed message.
    pub nonce: String,
    /// Unix timestamp (seconds) of signing.
    pub timestamp: i64,
    /// Merchant certificate serial number.
    pub serial_no: String,
    /// Base64 RSA-SHA256 signature over the canonical request message.
    pub signature: String,
}

impl SignatureToken {
    /// Renders the `Authorization` header value, scheme included, fields in
    /// wire-contract order.
    #[must_use]
    pub fn header_value(&self) -> String {
        formatter::authorization(
            &self.mchid,
            &self.nonce,
            &self.signature,
            &self.timestamp.to_string(),
            &self.serial_no,
        )
    }
}

/// Signs outbound requests on behalf of one merchant.
///
/// # Examples
///
/// ```no_run
/// use wechatpay_apiv3::auth::{MerchantCredential, RequestSigner};
/// use wechatpay_apiv3::pem;
///
/// # fn example() -> wechatpay_apiv3::Result<()> {
/// let key = pem::load_private_key_file("merchant_key.pem")?;
/// let credential = MerchantCredential::new("1900000001", "1DEA4218EC1B2D4F", key);
/// let signer = RequestSigner::new(credential);
///
/// let token = signer.sign_request("POST", "/v3/pay/transactions/native", "{}")?;
/// let authorization = token.header_value();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RequestSigner {
    credential: MerchantCredential,
    nonce_length: usize,
}

impl RequestSigner {
    /// Creates a signer with the default 32-character nonce.
    #[must_use]
    pub fn new(credential: MerchantCredential) -> Self {
        Self { credential, nonce_length: DEFAULT_NONCE_LENGTH }
    }

    /// Overrides the nonce length.
    #[must_use]
    pub fn with_nonce_length(mut self, nonce_length: usize) -> Self {
        self.nonce_length = nonce_length;
        self
    }

    /// The credential this signer speaks for.
    #[must_use]
    pub fn credential(&self) -> &MerchantCredential {
        &self.credential
    }

    /// Signs one request.
    ///
    /// `target` is the request-target: path plus query string, exactly as it
    /// will go on the wire. `body` must be the exact bytes to be sent, or
    /// the empty string for bodyless and non-replayable requests.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PayError::Signing`] when the key is rejected at
    /// signing time. This is a fatal configuration error, not a retryable one.
    #[instrument(skip(self, body), fields(mchid = %self.credential.mchid, body_len = body.len()))]
    pub fn sign_request(&self, method: &str, target: &str, body: &str) -> Result<SignatureToken> {
        let nonce = formatter::nonce(self.nonce_length);
        let timestamp = formatter::timestamp();

        let message =
            formatter::request_message(method, target, &timestamp.to_string(), &nonce, body);
        let signature = self.credential.private_key.sign(message.as_bytes())?;

        Ok(SignatureToken {
            mchid: self.credential.mchid.clone(),
            nonce,
            timestamp,
            serial_no: self.credential.serial_no.clone(),
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rsa::PlatformPublicKey;
    use crate::formatter::AUTH_SCHEME;

    const MERCHANT_KEY_PEM: &str = include_str!("../../tests/fixtures/merchant_key.pem");
    const MERCHANT_PUB_PEM: &str = include_str!("../../tests/fixtures/merchant_pub.pem");
    const SERIAL: &str = "1DEA4218EC1B2D4F2C9F8A3B5D6E7F8091A2B3C4";

    fn signer() -> RequestSigner {
        let key = MerchantPrivateKey::from_pem(MERCHANT_KEY_PEM).expect("fixture key");
        RequestSigner::new(MerchantCredential::new("1900000001", SERIAL, key))
    }

    #[test]
    fn test_token_fields() {
        let token = signer().sign_request("POST", "/v3/pay", "{}").expect("sign");

        assert_eq!(token.mchid, "1900000001");
        assert_eq!(token.serial_no, SERIAL);
        assert_eq!(token.nonce.len(), 32);
        assert!(token.timestamp > 1_500_000_000);
        assert!(!token.signature.is_empty());
    }

    #[test]
    fn test_header_value_shape() {
        let token = signer().sign_request("GET", "/v3/certificates", "").expect("sign");
        let value = token.header_value();

        assert!(value.starts_with(&format!("{AUTH_SCHEME} mchid=\"1900000001\",nonce_str=\"")));
        let mchid_pos = value.find("mchid=").unwrap();
        let nonce_pos = value.find("nonce_str=").unwrap();
        let signature_pos = value.find("signature=").unwrap();
        let timestamp_pos = value.find("timestamp=").unwrap();
        let serial_pos = value.find("serial_no=").unwrap();
        assert!(mchid_pos < nonce_pos);
        assert!(nonce_pos < signature_pos);
        assert!(signature_pos < timestamp_pos);
        assert!(timestamp_pos < serial_pos);
    }

    #[test]
    fn test_signature_verifiable() {
        let signer = signer();
        let token = signer.sign_request("POST", "/v3/pay", "{\"amount\":1}").expect("sign");

        let message = crate::formatter::request_message(
            "POST",
            "/v3/pay",
            &token.timestamp.to_string(),
            &token.nonce,
            "{\"amount\":1}",
        );
        let public = PlatformPublicKey::from_pem(MERCHANT_PUB_PEM).expect("fixture pub");
        assert!(public.verify(message.as_bytes(), &token.signature).is_ok());
    }

    #[test]
    fn test_nonces_are_unique_per_request() {
        let signer = signer();
        let first = signer.sign_request("GET", "/v3/certificates", "").expect("sign");
        let second = signer.sign_request("GET", "/v3/certificates", "").expect("sign");

        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.signature, second.signature);
    }

    #[test]
    fn test_custom_nonce_length() {
        let signer = signer().with_nonce_length(16);
        let token = signer.sign_request("GET", "/v3/certificates", "").expect("sign");
        assert_eq!(token.nonce.len(), 16);
    }

    #[test]
    fn test_credential_debug_hides_key() {
        let credential = signer().credential().mchid().to_owned();
        assert_eq!(credential, "1900000001");

        let rendered = format!("{:?}", signer().credential());
        assert!(rendered.contains("1900000001"));
        assert!(!rendered.contains("private_key"));
    }

    #[test]
    fn test_serial_is_normalized() {
        let key = MerchantPrivateKey::from_pem(MERCHANT_KEY_PEM).expect("fixture key");
        let credential = MerchantCredential::new("m", &format!("00{}", SERIAL.to_lowercase()), key);
        assert_eq!(credential.serial_no(), SERIAL);
    }
}
