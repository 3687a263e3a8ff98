//! Error types for the WeChat Pay APIv3 client.
//!
//! All errors implement the standard [`std::error::Error`] trait via
//! [`thiserror::Error`]. Every failure mode a caller needs to react to is a
//! distinct variant; "could not attempt verification" and "verified and
//! failed" are never collapsed into one another, because they carry different
//! security implications.
//!
//! # Error Categories
//!
//! Each variant belongs to exactly one [`ErrorKind`]:
//!
//! - [`ErrorKind::Configuration`]: malformed key material, bad secrets. Fatal,
//!   never retryable, surfaced before any network call is made.
//! - [`ErrorKind::Integrity`]: the message failed authentication (missing
//!   headers, clock skew, unknown serial, signature mismatch, AEAD failure).
//!   The response must be discarded entirely; never fall back to unverified
//!   data.
//! - [`ErrorKind::Transient`]: the network or the platform misbehaved.
//!   Retryable, but only by the caller's own policy. This crate never
//!   retries on its own, because a blind retry on a signature failure can
//!   mask a real incident.

use thiserror::Error;

/// Result type alias for WeChat Pay operations.
pub type Result<T> = std::result::Result<T, PayError>;

/// Coarse classification of a [`PayError`], used to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Broken local setup: fix the configuration, do not retry.
    Configuration,
    /// The message failed authentication: discard it, do not trust its payload.
    Integrity,
    /// The network or the platform failed: the caller may retry.
    Transient,
}

/// Errors produced by signing, verification, decryption and certificate
/// rotation.
///
/// Error messages never contain private key material, full signatures, or
/// decrypted plaintext.
#[derive(Debug, Error)]
pub enum PayError {
    /// The RSA key material could not be parsed or is structurally unusable.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The APIv3 symmetric secret has the wrong length.
    #[error("invalid APIv3 key: expected 32 bytes, got {0}")]
    InvalidApiV3Key(usize),

    /// An AEAD nonce with an unsupported length was supplied.
    #[error("AEAD nonce must be 12 or 16 bytes, got {0}")]
    InvalidNonce(usize),

    /// Producing a signature failed.
    ///
    /// This is a fatal configuration error: either the digest is unavailable
    /// in the backing crypto implementation or the private key was rejected
    /// at signing time.
    #[error("signing failed: {0}")]
    Signing(String),

    /// RSA-OAEP encryption of a sensitive field failed, typically because the
    /// plaintext exceeds what a 2048-bit key can carry.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// RSA-OAEP decryption failed; wrong key or corrupted ciphertext.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// A required response security header is absent or empty.
    #[error("missing response security header `{0}`")]
    IncompleteHeaders(&'static str),

    /// The `Wechatpay-Timestamp` header is not a decimal Unix timestamp.
    #[error("malformed timestamp header: {0}")]
    InvalidTimestamp(String),

    /// The response timestamp is too far from local time to be trusted.
    #[error("response timestamp {timestamp} is more than {tolerance}s away from local time {now}")]
    ClockSkew {
        /// Timestamp claimed by the response.
        timestamp: i64,
        /// Local Unix time at verification.
        now: i64,
        /// The fixed protocol tolerance (300 seconds).
        tolerance: i64,
    },

    /// No certificate for this serial number is present in the store.
    ///
    /// This is the common trigger for an operator-driven certificate
    /// rotation.
    #[error("no platform certificate for serial {0}")]
    UnknownSerial(String),

    /// A signature could not even be decoded, so verification was never
    /// attempted.
    #[error("signature is not decodable: {0}")]
    MalformedSignature(String),

    /// Verification was attempted and the signature did not match.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The AEAD input is structurally broken (bad base64, impossible tag
    /// length) and decryption was not attempted.
    #[error("ciphertext incomplete: {0}")]
    IncompleteCiphertext(String),

    /// AEAD decryption ran and the authentication tag did not verify.
    #[error("AEAD authentication failed")]
    AeadAuthentication,

    /// Block-cipher padding was invalid after decryption.
    #[error("block cipher padding invalid")]
    InvalidPadding,

    /// An unsupported keyed-digest algorithm name was requested.
    #[error("unsupported digest algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    /// The hash input grew past the size its 64-bit length field can
    /// represent; processing stopped rather than truncating silently.
    #[error("input exceeds the hash precision ceiling")]
    PrecisionExceeded,

    /// A platform certificate failed to parse or is structurally invalid.
    #[error("certificate parse failed: {0}")]
    MalformedCertificate(String),

    /// An endpoint URL could not be built.
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP request to the platform failed at the transport level.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with a non-success status.
    #[error("platform returned status {status}: {body}")]
    Platform {
        /// HTTP status code of the response.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The certificate listing body did not match the documented schema.
    #[error("malformed certificate listing: {0}")]
    MalformedListing(#[from] serde_json::Error),

    /// Reading key material or hash input from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PayError {
    /// Returns the coarse classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKey(_)
            | Self::InvalidApiV3Key(_)
            | Self::InvalidNonce(_)
            | Self::Signing(_)
            | Self::Encryption(_)
            | Self::UnsupportedAlgorithm(_)
            | Self::InvalidUrl(_)
            | Self::Io(_) => ErrorKind::Configuration,

            Self::Decryption(_)
            | Self::IncompleteHeaders(_)
            | Self::InvalidTimestamp(_)
            | Self::ClockSkew { .. }
            | Self::UnknownSerial(_)
            | Self::MalformedSignature(_)
            | Self::SignatureMismatch
            | Self::IncompleteCiphertext(_)
            | Self::AeadAuthentication
            | Self::InvalidPadding
            | Self::PrecisionExceeded
            | Self::MalformedCertificate(_)
            | Self::MalformedListing(_) => ErrorKind::Integrity,

            Self::Http(_) | Self::Platform { .. } => ErrorKind::Transient,
        }
    }

    /// Whether the caller's own policy may retry the failed operation.
    ///
    /// Integrity failures are deliberately non-retryable here: retrying a
    /// signature mismatch without operator involvement can amplify an attack.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
