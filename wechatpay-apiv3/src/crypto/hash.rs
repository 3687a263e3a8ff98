//! Legacy APIv2 keyed digests.
//!
//! The v2 protocol signs the sorted `k=v&…` form of a request (see
//! [`crate::formatter::query_string_like`]) with one of two keyed digests:
//! plain MD5 over `message&key=<secret>`, or HMAC-SHA256 keyed with the
//! secret over the same concatenation. Both render as hex and the final
//! signature is uppercased. This path is kept as a parallel, lower-priority
//! variant of the RSA-based v3 protocol.

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{PayError, Result};

/// Algorithm name for the MD5 variant.
pub const ALGO_MD5: &str = "MD5";

/// Algorithm name for the HMAC-SHA256 variant.
pub const ALGO_HMAC_SHA256: &str = "HMAC-SHA256";

/// MD5 keyed digest: `md5(message + "&key=" + key)`, or plain `md5(message)`
/// when `key` is empty. Lowercase hex.
#[must_use]
pub fn md5(message: &str, key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(message.as_bytes());
    if !key.is_empty() {
        hasher.update(b"&key=");
        hasher.update(key.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// HMAC-SHA256 keyed digest over `message + "&key=" + key`, keyed with
/// `key`. Lowercase hex.
///
/// # Errors
///
/// Returns [`PayError::InvalidKey`] if the MAC rejects the key (it accepts
/// any length, so this does not occur in practice).
pub fn hmac_sha256(message: &str, key: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .map_err(|e| PayError::InvalidKey(e.to_string()))?;
    mac.update(message.as_bytes());
    mac.update(b"&key=");
    mac.update(key.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Produces the uppercase v2 signature for `message` under the named
/// algorithm.
///
/// # Errors
///
/// Returns [`PayError::UnsupportedAlgorithm`] for algorithm names other than
/// [`ALGO_MD5`] and [`ALGO_HMAC_SHA256`].
pub fn sign(algorithm: &str, message: &str, key: &str) -> Result<String> {
    let digest = match algorithm {
        ALGO_MD5 => md5(message, key),
        ALGO_HMAC_SHA256 => hmac_sha256(message, key)?,
        other => return Err(PayError::UnsupportedAlgorithm(other.to_owned())),
    };
    Ok(digest.to_uppercase())
}

/// Constant-time comparison of two signature strings.
///
/// Length differences return `false` immediately; equal-length comparison
/// does not short-circuit.
#[must_use]
pub fn equals(known: &str, user_supplied: &str) -> bool {
    known.as_bytes().ct_eq(user_supplied.as_bytes()).into()
}
