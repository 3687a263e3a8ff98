//! Cryptographic primitives used by the APIv3 protocol.
//!
//! - [`rsa`]: RSA-2048 signing/verification (SHA-256, PKCS#1 v1.5) and
//!   small-payload field encryption (OAEP), behind opaque key handles.
//! - [`aesgcm`]: AEAD_AES_256_GCM for platform certificate bundles and
//!   encrypted callback resources.
//! - [`sm3`]: from-scratch SM3 hash (GM/T 0004-2012), required by the
//!   regional compliance variant of the protocol.
//! - [`hash`]: legacy APIv2 keyed digests (MD5, HMAC-SHA256).
//! - [`aesecb`]: legacy AES-256-ECB used by APIv2 refund notifications.
//!
//! Everything here is pure computation: no network access, no shared mutable
//! state, safe to call from any number of threads.

pub mod aesecb;
pub mod aesgcm;
pub mod hash;
pub mod rsa;
pub mod sm3;
