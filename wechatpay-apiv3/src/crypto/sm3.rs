//! SM3 cryptographic hash (GM/T 0004-2012), implemented from scratch.
//!
//! The regional compliance variant of the protocol requires SM3 digests, and
//! no digest backend is assumed to provide them, so the compression function is
//! implemented here directly from the standard: 8×32-bit state, 64-byte
//! blocks, Merkle–Damgård padding (a `1` bit, zero fill, then the 64-bit
//! big-endian bit length).
//!
//! [`Sm3`] is a streaming hasher; [`Sm3::digest`] and [`Sm3::file`] are
//! one-shot conveniences over the same core, guaranteed to produce identical
//! output for identical content. Input larger than the 64-bit length field
//! can represent is reported as [`PayError::PrecisionExceeded`] instead of
//! being silently truncated.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{PayError, Result};

/// Compression block size in bytes.
pub const BLOCK_SIZE: usize = 64;

/// Digest size in bytes.
pub const DIGEST_SIZE: usize = 32;

/// Largest total input, in bytes, whose bit length still fits the 64-bit
/// length field of the padding.
pub const MAX_MESSAGE_BYTES: u64 = u64::MAX >> 3;

/// Initial state vector (§4.1 of the standard).
const IV: [u32; 8] = [
    0x7380_166f,
    0x4914_b2b9,
    0x1724_42d7,
    0xda8a_0600,
    0xa96f_30bc,
    0x1631_38aa,
    0xe38d_ee4d,
    0xb0fb_0e4e,
];

/// Round constants T_j (§4.2): the first for rounds 0..16, the second for
/// rounds 16..64.
const T0: u32 = 0x79cc_4519;
const T1: u32 = 0x7a87_9d8a;

/// Streaming SM3 hasher.
///
/// # Examples
///
/// ```
/// use wechatpay_apiv3::crypto::sm3::Sm3;
///
/// let mut hasher = Sm3::new();
/// hasher.update(b"ab").unwrap();
/// hasher.update(b"c").unwrap();
/// assert_eq!(
///     hasher.finalize(),
///     "66c7f0f462eeedd9d1f2d46bdc10e4e24167c4875cf2f7a2297da02b8f4ba8e0"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Sm3 {
    state: [u32; 8],
    buffer: [u8; BLOCK_SIZE],
    buffered: usize,
    length: u64,
}

impl Default for Sm3 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sm3 {
    /// Creates a hasher in the initial state.
    #[must_use]
    pub fn new() -> Self {
        Self { state: IV, buffer: [0u8; BLOCK_SIZE], buffered: 0, length: 0 }
    }

    /// Absorbs `data` into the hash state.
    ///
    /// # Errors
    ///
    /// Returns [`PayError::PrecisionExceeded`] if the total input would
    /// overflow the 64-bit bit-length field; the hasher state is left
    /// untouched in that case.
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        let total = self
            .length
            .checked_add(data.len() as u64)
            .filter(|&t| t <= MAX_MESSAGE_BYTES)
            .ok_or(PayError::PrecisionExceeded)?;
        self.length = total;

        let mut rest = data;
        if self.buffered > 0 {
            let take = rest.len().min(BLOCK_SIZE - self.buffered);
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&rest[..take]);
            self.buffered += take;
            rest = &rest[take..];
            if self.buffered == BLOCK_SIZE {
                let block = self.buffer;
                compress(&mut self.state, &block);
                self.buffered = 0;
            }
        }

        let mut chunks = rest.chunks_exact(BLOCK_SIZE);
        for block in &mut chunks {
            compress(&mut self.state, block);
        }

        let tail = chunks.remainder();
        self.buffer[..tail.len()].copy_from_slice(tail);
        self.buffered = tail.len();
        Ok(())
    }

    /// Applies the final padding and returns the digest as lowercase hex.
    #[must_use]
    pub fn finalize(mut self) -> String {
        let bit_length = self.length << 3;

        let mut trailer = [0u8; 2 * BLOCK_SIZE];
        trailer[..self.buffered].copy_from_slice(&self.buffer[..self.buffered]);
        trailer[self.buffered] = 0x80;

        // One extra block when the length field no longer fits this one.
        let padded = if self.buffered + 1 + 8 <= BLOCK_SIZE { BLOCK_SIZE } else { 2 * BLOCK_SIZE };
        trailer[padded - 8..padded].copy_from_slice(&bit_length.to_be_bytes());

        for block in trailer[..padded].chunks_exact(BLOCK_SIZE) {
            compress(&mut self.state, block);
        }

        let mut out = [0u8; DIGEST_SIZE];
        for (i, word) in self.state.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        hex::encode(out)
    }

    /// Digests a whole buffer in one call.
    ///
    /// # Errors
    ///
    /// Returns [`PayError::PrecisionExceeded`] for input past
    /// [`MAX_MESSAGE_BYTES`].
    pub fn digest(data: &[u8]) -> Result<String> {
        let mut hasher = Self::new();
        hasher.update(data)?;
        Ok(hasher.finalize())
    }

    /// Digests a file by streaming it in block-sized chunks.
    ///
    /// Produces the same digest as [`Sm3::digest`] over the file's content.
    ///
    /// # Errors
    ///
    /// Returns [`PayError::Io`] if the file cannot be read and
    /// [`PayError::PrecisionExceeded`] past the input ceiling.
    pub fn file(path: impl AsRef<Path>) -> Result<String> {
        let mut reader = File::open(path)?;
        let mut hasher = Self::new();
        let mut chunk = [0u8; 128 * BLOCK_SIZE];
        loop {
            let read = reader.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            hasher.update(&chunk[..read])?;
        }
        Ok(hasher.finalize())
    }
}

/// Message-expansion permutation P1 (§4.4).
fn p1(x: u32) -> u32 {
    x ^ x.rotate_left(15) ^ x.rotate_left(23)
}

/// Compression permutation P0 (§4.4).
fn p0(x: u32) -> u32 {
    x ^ x.rotate_left(9) ^ x.rotate_left(17)
}

/// One application of the compression function CF (§5.3).
fn compress(state: &mut [u32; 8], block: &[u8]) {
    debug_assert_eq!(block.len(), BLOCK_SIZE);

    let mut w = [0u32; 68];
    for (i, word) in block.chunks_exact(4).enumerate() {
        w[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
    }
    for j in 16..68 {
        w[j] = p1(w[j - 16] ^ w[j - 9] ^ w[j - 3].rotate_left(15))
            ^ w[j - 13].rotate_left(7)
            ^ w[j - 6];
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    for j in 0..64 {
        let t = if j < 16 { T0 } else { T1 };
        let a12 = a.rotate_left(12);
        let ss1 = a12
            .wrapping_add(e)
            .wrapping_add(t.rotate_left(j as u32 % 32))
            .rotate_left(7);
        let ss2 = ss1 ^ a12;

        let (ff, gg) = if j < 16 {
            (a ^ b ^ c, e ^ f ^ g)
        } else {
            ((a & b) | (a & c) | (b & c), (e & f) | (!e & g))
        };

        let tt1 = ff
            .wrapping_add(d)
            .wrapping_add(ss2)
            .wrapping_add(w[j] ^ w[j + 4]);
        let tt2 = gg.wrapping_add(h).wrapping_add(ss1).wrapping_add(w[j]);

        d = c;
        c = b.rotate_left(9);
        b = a;
        a = tt1;
        h = g;
        g = f.rotate_left(19);
        f = e;
        e = p0(tt2);
    }

    state[0] ^= a;
    state[1] ^= b;
    state[2] ^= c;
    state[3] ^= d;
    state[4] ^= e;
    state[5] ^= f;
    state[6] ^= g;
    state[7] ^= h;
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // GM/T 0004-2012 appendix A reference vectors.
    const ABC_DIGEST: &str = "66c7f0f462eeedd9d1f2d46bdc10e4e24167c4875cf2f7a2297da02b8f4ba8e0";
    const ABCD16_DIGEST: &str = "debe9ff92275b8a138604889c18e5a4d6fdb70e5387e5765293dcba39c0c5732";

    #[test]
    fn test_reference_vector_abc() {
        assert_eq!(Sm3::digest(b"abc").unwrap(), ABC_DIGEST);
    }

    #[test]
    fn test_reference_vector_repeated_pattern() {
        let input = "abcd".repeat(16);
        assert_eq!(input.len(), 64);
        assert_eq!(Sm3::digest(input.as_bytes()).unwrap(), ABCD16_DIGEST);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            Sm3::digest(b"").unwrap(),
            "1ab21d8355cfa17f8e61194831e81a8f22bec8c728fabb75f8d43e9d42623d6c"
        );
    }

    #[test]
    fn test_streaming_matches_whole_buffer() {
        let input: Vec<u8> = (0..1_000u32).map(|i| (i % 253) as u8).collect();
        let whole = Sm3::digest(&input).unwrap();

        for chunk_size in [1, 3, 63, 64, 65, 127] {
            let mut hasher = Sm3::new();
            for chunk in input.chunks(chunk_size) {
                hasher.update(chunk).unwrap();
            }
            assert_eq!(hasher.finalize(), whole, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_padding_boundaries() {
        // Lengths around the 56-byte padding threshold and block edges.
        for len in [55usize, 56, 57, 63, 64, 65, 128] {
            let input = vec![0xa5u8; len];
            let whole = Sm3::digest(&input).unwrap();

            let mut hasher = Sm3::new();
            let (head, tail) = input.split_at(len / 2);
            hasher.update(head).unwrap();
            hasher.update(tail).unwrap();
            assert_eq!(hasher.finalize(), whole, "length {len}");
        }
    }

    #[test]
    fn test_file_matches_buffer() {
        let content = "abcd".repeat(16);
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");

        let digest = Sm3::file(file.path()).expect("file digest");
        assert_eq!(digest, ABCD16_DIGEST);
    }

    #[test]
    fn test_file_larger_than_chunk() {
        let content = vec![0x5au8; 3 * 128 * BLOCK_SIZE + 17];
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&content).expect("write");

        assert_eq!(Sm3::file(file.path()).unwrap(), Sm3::digest(&content).unwrap());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Sm3::file("/definitely/not/a/real/path");
        assert!(matches!(result, Err(PayError::Io(_))));
    }

    #[test]
    fn test_precision_ceiling_enforced() {
        let mut hasher = Sm3::new();
        hasher.length = MAX_MESSAGE_BYTES - 1;
        let result = hasher.update(b"ab");
        assert!(matches!(result, Err(PayError::PrecisionExceeded)));
    }

    #[test]
    fn test_digest_is_hex_of_expected_width() {
        let digest = Sm3::digest(b"anything").unwrap();
        assert_eq!(digest.len(), DIGEST_SIZE * 2);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
