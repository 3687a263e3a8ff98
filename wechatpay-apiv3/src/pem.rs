//! PEM and X.509 loading for merchant keys and platform certificates.
//!
//! Turns PEM material into the crate's opaque key handles. Nothing outside
//! this module touches DER structures; the rest of the crate only ever sees
//! [`MerchantPrivateKey`], [`PlatformPublicKey`] and the parsed certificate
//! fields (serial, validity window).

use std::path::Path;
use std::time::SystemTime;

use x509_cert::der::DecodePem;
use x509_cert::Certificate;

use crate::crypto::rsa::{MerchantPrivateKey, PlatformPublicKey};
use crate::error::{PayError, Result};

/// Loads the merchant's RSA private key from a PEM string.
///
/// # Errors
///
/// Returns [`PayError::InvalidKey`] on malformed material.
pub fn load_private_key(pem: &str) -> Result<MerchantPrivateKey> {
    MerchantPrivateKey::from_pem(pem)
}

/// Loads the merchant's RSA private key from a PEM file.
///
/// # Errors
///
/// Returns [`PayError::Io`] if the file cannot be read and
/// [`PayError::InvalidKey`] on malformed material.
pub fn load_private_key_file(path: impl AsRef<Path>) -> Result<MerchantPrivateKey> {
    let pem = std::fs::read_to_string(path)?;
    MerchantPrivateKey::from_pem(&pem)
}

/// Fields extracted from an X.509 platform certificate.
pub(crate) struct ParsedCertificate {
    pub serial_no: String,
    pub public_key: PlatformPublicKey,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
}

/// Parses a PEM X.509 certificate, extracting the RSA public key, the
/// uppercase-hex serial number and the validity window.
pub(crate) fn parse_certificate(pem: &str) -> Result<ParsedCertificate> {
    let certificate = Certificate::from_pem(pem.as_bytes())
        .map_err(|e| PayError::MalformedCertificate(e.to_string()))?;
    let tbs = &certificate.tbs_certificate;

    let serial_no = normalize_serial(&hex::encode(tbs.serial_number.as_bytes()));
    if serial_no.is_empty() {
        return Err(PayError::MalformedCertificate("empty serial number".to_owned()));
    }

    let spki_bits = tbs
        .subject_public_key_info
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| {
            PayError::MalformedCertificate("unaligned subject public key".to_owned())
        })?;
    let public_key = PlatformPublicKey::from_pkcs1_der(spki_bits)?;

    let validity = &tbs.validity;
    let not_before = SystemTime::UNIX_EPOCH + validity.not_before.to_unix_duration();
    let not_after = SystemTime::UNIX_EPOCH + validity.not_after.to_unix_duration();

    Ok(ParsedCertificate { serial_no, public_key, not_before, not_after })
}

/// Normalizes a certificate serial number the way the platform renders it:
/// uppercase hex with leading zeros stripped.
///
/// Applied symmetrically on store insert and lookup so the two can never
/// disagree about a serial's spelling.
#[must_use]
pub fn normalize_serial(serial: &str) -> String {
    let trimmed = serial.trim_start_matches('0');
    if trimmed.is_empty() && !serial.is_empty() {
        // An all-zero serial still names one certificate.
        return "0".to_owned();
    }
    trimmed.to_uppercase()
}
