//! Legacy AES-256-ECB with PKCS#7 padding.
//!
//! APIv2 refund notifications carry their payload as
//! `base64(AES-256-ECB(plaintext))` under the MD5 of the v2 secret. ECB mode
//! offers no integrity protection, which is one of the reasons the v3
//! protocol replaced it with AEAD; it is kept only for that legacy surface.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes256;

use crate::error::{PayError, Result};

const BLOCK: usize = 16;
const KEY_LENGTH: usize = 32;

fn cipher(key: &[u8]) -> Result<Aes256> {
    if key.len() != KEY_LENGTH {
        return Err(PayError::InvalidKey(format!(
            "AES-256-ECB key must be 32 bytes, got {}",
            key.len()
        )));
    }
    Aes256::new_from_slice(key).map_err(|e| PayError::InvalidKey(e.to_string()))
}

/// Encrypts `plaintext` with AES-256-ECB/PKCS#7 and returns base64.
///
/// # Errors
///
/// Returns [`PayError::InvalidKey`] for a key that is not 32 bytes.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String> {
    let cipher = cipher(key)?;

    let pad = BLOCK - plaintext.len() % BLOCK;
    let mut buffer = Vec::with_capacity(plaintext.len() + pad);
    buffer.extend_from_slice(plaintext);
    buffer.resize(plaintext.len() + pad, pad as u8);

    for block in buffer.chunks_exact_mut(BLOCK) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }

    Ok(base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        buffer,
    ))
}

/// Decrypts base64 AES-256-ECB/PKCS#7 ciphertext.
///
/// # Errors
///
/// - [`PayError::IncompleteCiphertext`]: undecodable base64 or a length that
///   is not a positive multiple of the block size.
/// - [`PayError::InvalidPadding`]: the PKCS#7 trailer is inconsistent, which
///   with ECB is the only (weak) signal of a wrong key or tampering.
pub fn decrypt(ciphertext_b64: &str, key: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;

    let mut buffer = base64::Engine::decode(
        &base64::engine::general_purpose::STANDARD,
        ciphertext_b64,
    )
    .map_err(|e| PayError::IncompleteCiphertext(e.to_string()))?;

    if buffer.is_empty() || buffer.len() % BLOCK != 0 {
        return Err(PayError::IncompleteCiphertext(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK}",
            buffer.len()
        )));
    }

    for block in buffer.chunks_exact_mut(BLOCK) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    let pad = usize::from(*buffer.last().unwrap_or(&0));
    if pad == 0 || pad > BLOCK || buffer.len() < pad {
        return Err(PayError::InvalidPadding);
    }
    if buffer[buffer.len() - pad..].iter().any(|&b| usize::from(b) != pad) {
        return Err(PayError::InvalidPadding);
    }

    buffer.truncate(buffer.len() - pad);
    Ok(buffer)
}
