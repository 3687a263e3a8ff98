//! Response verification: security headers to an accept/reject decision.

use tracing::{debug, instrument, warn};

use crate::certificates::CertificateStore;
use crate::error::{PayError, Result};
use crate::formatter;

/// Response header carrying the nonce the signature covers.
pub const HEADER_NONCE: &str = "Wechatpay-Nonce";

/// Response header naming the platform certificate serial.
pub const HEADER_SERIAL: &str = "Wechatpay-Serial";

/// Response header carrying the base64 signature.
pub const HEADER_SIGNATURE: &str = "Wechatpay-Signature";

/// Response header carrying the Unix timestamp the signature covers.
pub const HEADER_TIMESTAMP: &str = "Wechatpay-Timestamp";

/// Maximum tolerated distance between a response timestamp and local time,
/// in seconds. Fixed by the protocol; not a tunable.
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 300;

/// The four security headers of a platform response, as received.
///
/// Values are kept verbatim; the signature covers the exact bytes the
/// platform sent, so nothing here is re-rendered or normalized.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    /// `Wechatpay-Nonce` value.
    pub nonce: String,
    /// `Wechatpay-Serial` value.
    pub serial: String,
    /// `Wechatpay-Signature` value.
    pub signature: String,
    /// `Wechatpay-Timestamp` value.
    pub timestamp: String,
}

impl SecurityHeaders {
    /// Collects the four headers, failing on the first absent one.
    ///
    /// # Errors
    ///
    /// Returns [`PayError::IncompleteHeaders`] naming the missing header.
    pub fn from_parts(
        nonce: Option<&str>,
        serial: Option<&str>,
        signature: Option<&str>,
        timestamp: Option<&str>,
    ) -> Result<Self> {
        let require = |value: Option<&str>, name: &'static str| {
            value
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .ok_or(PayError::IncompleteHeaders(name))
        };
        Ok(Self {
            nonce: require(nonce, HEADER_NONCE)?,
            serial: require(serial, HEADER_SERIAL)?,
            signature: require(signature, HEADER_SIGNATURE)?,
            timestamp: require(timestamp, HEADER_TIMESTAMP)?,
        })
    }
}

/// Decides whether a platform response is trustworthy.
///
/// The two modes are deliberately distinct variants rather than a flag on
/// one type, so "signature checking is off" can never hide inside an
/// innocent-looking verifier value:
///
/// - [`ResponseVerifier::Platform`] is the normal path and the only one
///   request code should ever hold.
/// - [`ResponseVerifier::Bootstrap`] exists for exactly one caller (the
///   certificate rotation flow fetching into an empty store) and skips the
///   serial resolution and signature steps while still enforcing header
///   completeness and clock skew. See
///   [`crate::certificates::rotation`] for how the bootstrap window is
///   closed immediately afterwards.
#[derive(Debug, Clone)]
pub enum ResponseVerifier {
    /// Verify against certificates resolved from the store.
    Platform {
        /// Store the serial is resolved against.
        store: CertificateStore,
    },
    /// Trust-on-first-fetch: headers and clock skew only.
    Bootstrap,
}

impl ResponseVerifier {
    /// Creates the normal, certificate-backed verifier.
    #[must_use]
    pub fn platform(store: CertificateStore) -> Self {
        Self::Platform { store }
    }

    /// Verifies one response.
    ///
    /// Checks run in order and stop at the first failure: header
    /// completeness, clock skew (±300 s), serial resolution, signature.
    /// On any error the response must be treated as untrusted in its
    /// entirety; an unknown serial is the usual cue for the operator to run
    /// a certificate rotation.
    ///
    /// # Errors
    ///
    /// [`PayError::IncompleteHeaders`], [`PayError::InvalidTimestamp`],
    /// [`PayError::ClockSkew`], [`PayError::UnknownSerial`],
    /// [`PayError::MalformedSignature`] or [`PayError::SignatureMismatch`].
    #[instrument(skip(self, headers, body), fields(serial = %headers.serial))]
    pub fn verify(&self, headers: &SecurityHeaders, body: &str) -> Result<()> {
        self.verify_at(headers, body, formatter::timestamp())
    }

    fn verify_at(&self, headers: &SecurityHeaders, body: &str, now: i64) -> Result<()> {
        // 1. Completeness: empty values are as untrustworthy as absent ones.
        for (value, name) in [
            (&headers.nonce, HEADER_NONCE),
            (&headers.serial, HEADER_SERIAL),
            (&headers.signature, HEADER_SIGNATURE),
            (&headers.timestamp, HEADER_TIMESTAMP),
        ] {
            if value.is_empty() {
                return Err(PayError::IncompleteHeaders(name));
            }
        }

        // 2. Clock skew: a stale (or future-dated) timestamp is the cheapest
        // replay signal available before touching any cryptography.
        let timestamp: i64 = headers
            .timestamp
            .trim()
            .parse()
            .map_err(|_| PayError::InvalidTimestamp(headers.timestamp.clone()))?;
        if (timestamp - now).abs() > CLOCK_SKEW_TOLERANCE_SECS {
            return Err(PayError::ClockSkew {
                timestamp,
                now,
                tolerance: CLOCK_SKEW_TOLERANCE_SECS,
            });
        }

        let store = match self {
            Self::Platform { store } => store,
            Self::Bootstrap => {
                warn!(
                    serial = %headers.serial,
                    "bootstrap verification: signature NOT checked; only valid inside the \
                     certificate rotation flow"
                );
                return Ok(());
            }
        };

        // 3. Serial resolution.
        let certificate = store
            .get(&headers.serial)
            .ok_or_else(|| PayError::UnknownSerial(headers.serial.clone()))?;

        // 4. Signature over the canonical response message.
        let message = formatter::response_message(&headers.timestamp, &headers.nonce, body);
        certificate
            .public_key()
            .verify(message.as_bytes(), &headers.signature)
            .map_err(|error| {
                warn!(
                    serial = %headers.serial,
                    signature = %formatter::redact(&headers.signature),
                    "response signature rejected"
                );
                error
            })?;

        debug!(serial = %headers.serial, "response signature verified");
        Ok(())
    }
}
