//! AEAD_AES_256_GCM for platform certificate bundles and callback resources.
//!
//! The platform encrypts rotated certificates (and webhook resources) with
//! AES-256-GCM under the merchant's APIv3 secret, a 32-byte symmetric key
//! that is distinct from the RSA keypair. The wire form is
//! `base64(ciphertext || tag)` with a 16-byte tag and a 12-byte nonce
//! (16-byte nonces are also accepted for tooling parity).
//!
//! Before any decryption is attempted the trailing tag length is validated
//! against the set the protocol allows ({4, 8, 12..=16} bytes); everything
//! else is rejected as malformed input rather than handed to the cipher.

use aes_gcm::aead::generic_array::typenum::{U12, U16};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::Aes256;
use aes_gcm::{Aes256Gcm, AesGcm, Nonce};
use zeroize::Zeroize;

use crate::error::{PayError, Result};

/// Required key length in bytes.
pub const KEY_LENGTH: usize = 32;

/// Authentication tag length in bytes.
pub const TAG_LENGTH: usize = 16;

/// The platform's standard 96-bit-nonce cipher.
type Aes256Gcm96 = Aes256Gcm;
/// 128-bit-nonce variant, accepted for tooling parity.
type Aes256Gcm128 = AesGcm<Aes256, U16>;

/// The merchant's APIv3 symmetric secret.
///
/// Exactly 32 bytes. The buffer is zeroized when the value is dropped and the
/// `Debug` representation never shows the key.
#[derive(Clone)]
pub struct ApiV3Key(Vec<u8>);

impl ApiV3Key {
    /// Wraps the 32-byte APIv3 secret.
    ///
    /// # Errors
    ///
    /// Returns [`PayError::InvalidApiV3Key`] for any other length.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.len() != KEY_LENGTH {
            return Err(PayError::InvalidApiV3Key(key.len()));
        }
        Ok(Self(key))
    }

    /// Raw key bytes, for handing to the cipher.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for ApiV3Key {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for ApiV3Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiV3Key(redacted)")
    }
}

/// Encrypts `plaintext` and returns `base64(ciphertext || tag)`.
///
/// `key` must be 32 bytes; `nonce` 12 or 16 bytes; `aad` may be empty.
///
/// # Errors
///
/// Returns [`PayError::InvalidApiV3Key`] / [`PayError::InvalidNonce`] for bad
/// parameters and [`PayError::Encryption`] if the cipher rejects the input.
pub fn encrypt(plaintext: &[u8], key: &[u8], nonce: &[u8], aad: &[u8]) -> Result<String> {
    let payload = Payload { msg: plaintext, aad };
    let sealed = match nonce.len() {
        12 => new_cipher::<Aes256Gcm96>(key)?.encrypt(Nonce::<U12>::from_slice(nonce), payload),
        16 => new_cipher::<Aes256Gcm128>(key)?.encrypt(Nonce::<U16>::from_slice(nonce), payload),
        other => return Err(PayError::InvalidNonce(other)),
    }
    .map_err(|_| PayError::Encryption("AEAD encryption rejected the input".to_owned()))?;

    Ok(base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        sealed,
    ))
}

/// Decrypts `base64(ciphertext || tag)` produced by the platform.
///
/// # Errors
///
/// - [`PayError::IncompleteCiphertext`]: undecodable base64, or a trailing
///   tag length outside {4, 8, 12..=16} bytes, rejected before the cipher
///   ever sees the input.
/// - [`PayError::AeadAuthentication`]: the tag did not verify (wrong key,
///   nonce, associated data, or tampered ciphertext).
pub fn decrypt(ciphertext_b64: &str, key: &[u8], nonce: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let sealed = base64::Engine::decode(
        &base64::engine::general_purpose::STANDARD,
        ciphertext_b64,
    )
    .map_err(|e| PayError::IncompleteCiphertext(e.to_string()))?;

    let tag_length = sealed.len().min(TAG_LENGTH);
    let acceptable = tag_length == TAG_LENGTH
        || tag_length == 4
        || tag_length == 8
        || (12..TAG_LENGTH).contains(&tag_length);
    if !acceptable {
        return Err(PayError::IncompleteCiphertext(format!(
            "trailing tag is {tag_length} bytes; must be one of 16, 15, 14, 13, 12, 8 or 4"
        )));
    }

    // The backing cipher only authenticates full 16-byte tags; a shorter
    // (but protocol-legal) tag can never verify.
    if sealed.len() < TAG_LENGTH {
        return Err(PayError::AeadAuthentication);
    }

    let payload = Payload { msg: &sealed, aad };
    match nonce.len() {
        12 => new_cipher::<Aes256Gcm96>(key)?.decrypt(Nonce::<U12>::from_slice(nonce), payload),
        16 => new_cipher::<Aes256Gcm128>(key)?.decrypt(Nonce::<U16>::from_slice(nonce), payload),
        other => return Err(PayError::InvalidNonce(other)),
    }
    .map_err(|_| PayError::AeadAuthentication)
}

fn new_cipher<C: KeyInit>(key: &[u8]) -> Result<C> {
    C::new_from_slice(key).map_err(|_| PayError::InvalidApiV3Key(key.len()))
}
