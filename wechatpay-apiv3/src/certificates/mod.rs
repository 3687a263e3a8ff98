//! Platform certificates and the shared certificate store.
//!
//! Response verification resolves the signing certificate by serial number
//! through a [`CertificateStore`]. The store is the one piece of shared
//! mutable state in this crate: many verifications read it concurrently
//! while, at most, one rotation writes it. Readers always operate on an
//! immutable snapshot (`Arc<HashMap>`) that the writer replaces atomically,
//! so a verification in flight either sees the old complete map or the new
//! complete map, never a half-updated one.

pub mod rotation;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use crate::crypto::rsa::PlatformPublicKey;
use crate::error::Result;
use crate::pem::{self, normalize_serial};

/// A platform verification certificate.
///
/// Only produced by a successful X.509 parse plus structural validation
/// (2048-bit RSA key, non-empty serial); there is no way to construct a
/// partially valid entry.
#[derive(Debug, Clone)]
pub struct PlatformCertificate {
    serial_no: String,
    public_key: PlatformPublicKey,
    not_before: SystemTime,
    not_after: SystemTime,
}

impl PlatformCertificate {
    /// Parses a certificate from PEM.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PayError::MalformedCertificate`] or
    /// [`crate::PayError::InvalidKey`] when the material is unusable.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let parsed = pem::parse_certificate(pem)?;
        Ok(Self {
            serial_no: parsed.serial_no,
            public_key: parsed.public_key,
            not_before: parsed.not_before,
            not_after: parsed.not_after,
        })
    }

    /// Parses a certificate from a PEM file.
    ///
    /// # Errors
    ///
    /// As [`PlatformCertificate::from_pem`], plus [`crate::PayError::Io`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pem(&pem)
    }

    /// Normalized (uppercase, no leading zeros) serial number.
    #[must_use]
    pub fn serial_no(&self) -> &str {
        &self.serial_no
    }

    /// Verification key handle.
    #[must_use]
    pub fn public_key(&self) -> &PlatformPublicKey {
        &self.public_key
    }

    /// Start of the validity window.
    #[must_use]
    pub fn not_before(&self) -> SystemTime {
        self.not_before
    }

    /// End of the validity window.
    #[must_use]
    pub fn not_after(&self) -> SystemTime {
        self.not_after
    }

    /// Whether `at` falls inside the certificate's validity window.
    #[must_use]
    pub fn is_valid_at(&self, at: SystemTime) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

type Snapshot = Arc<HashMap<String, PlatformCertificate>>;

/// Shared serial-number-to-certificate mapping.
///
/// Cloning the store is cheap and every clone observes the same entries:
/// hand one clone to each verifier and one to the rotation flow. Writers
/// build a fresh map off to the side and swap it in with a single pointer
/// store, so readers never block on a rotation in progress for longer than
/// the swap itself.
#[derive(Clone, Default)]
pub struct CertificateStore {
    snapshot: Arc<RwLock<Snapshot>>,
}

impl CertificateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with operator-supplied certificates.
    #[must_use]
    pub fn with_certificates(certificates: impl IntoIterator<Item = PlatformCertificate>) -> Self {
        let store = Self::new();
        store.install(certificates);
        store
    }

    /// Looks up a certificate by serial number.
    ///
    /// The serial is normalized before lookup, so case and leading zeros do
    /// not matter.
    #[must_use]
    pub fn get(&self, serial_no: &str) -> Option<PlatformCertificate> {
        self.current().get(&normalize_serial(serial_no)).cloned()
    }

    /// Returns the current immutable snapshot.
    ///
    /// A verification that must make several lookups against one consistent
    /// view should take a snapshot once and read from it.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.current()
    }

    /// Inserts or replaces the given certificates, preserving entries whose
    /// serials are not mentioned. One atomic swap; readers see either the
    /// old or the new map.
    pub fn install(&self, certificates: impl IntoIterator<Item = PlatformCertificate>) {
        let mut next: HashMap<_, _> = self.current().as_ref().clone();
        for certificate in certificates {
            next.insert(certificate.serial_no.clone(), certificate);
        }
        self.swap(next);
    }

    /// Replaces the entire contents of the store.
    pub fn replace(&self, certificates: impl IntoIterator<Item = PlatformCertificate>) {
        let next: HashMap<_, _> = certificates
            .into_iter()
            .map(|certificate| (certificate.serial_no.clone(), certificate))
            .collect();
        self.swap(next);
    }

    /// Number of stored certificates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current().len()
    }

    /// Whether the store holds no certificates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    fn current(&self) -> Snapshot {
        Arc::clone(&self.snapshot.read().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn swap(&self, next: HashMap<String, PlatformCertificate>) {
        let mut guard = self.snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(next);
    }
}

impl std::fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.current();
        f.debug_struct("CertificateStore")
            .field("serials", &snapshot.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    const PLATFORM_CERT_PEM: &str = include_str!("../../tests/fixtures/platform_cert.pem");
    const MERCHANT_CERT_PEM: &str = include_str!("../../tests/fixtures/merchant_cert.pem");
    const PLATFORM_SERIAL: &str = "3F6AD1C8B90E24657A8D9F0B1C2D3E4F50617283";
    const MERCHANT_SERIAL: &str = "1DEA4218EC1B2D4F2C9F8A3B5D6E7F8091A2B3C4";

    fn platform_cert() -> PlatformCertificate {
        PlatformCertificate::from_pem(PLATFORM_CERT_PEM).expect("fixture cert")
    }

    fn merchant_cert() -> PlatformCertificate {
        PlatformCertificate::from_pem(MERCHANT_CERT_PEM).expect("fixture cert")
    }

    #[test]
    fn test_certificate_fields() {
        let certificate = platform_cert();
        assert_eq!(certificate.serial_no(), PLATFORM_SERIAL);
        assert!(certificate.is_valid_at(SystemTime::now()));
        assert!(!certificate.is_valid_at(SystemTime::UNIX_EPOCH));
    }

    #[test]
    fn test_store_lookup_normalizes_serial() {
        let store = CertificateStore::with_certificates([platform_cert()]);

        assert!(store.get(PLATFORM_SERIAL).is_some());
        assert!(store.get(&PLATFORM_SERIAL.to_lowercase()).is_some());
        assert!(store.get(&format!("00{PLATFORM_SERIAL}")).is_some());
        assert!(store.get("DEADBEEF").is_none());
    }

    #[test]
    fn test_store_clones_share_entries() {
        let store = CertificateStore::new();
        let reader = store.clone();
        assert!(reader.is_empty());

        store.install([platform_cert()]);
        assert_eq!(reader.len(), 1);
    }

    #[test]
    fn test_install_merges_and_replace_clears() {
        let store = CertificateStore::with_certificates([platform_cert()]);
        store.install([merchant_cert()]);
        assert_eq!(store.len(), 2);

        store.replace([merchant_cert()]);
        assert_eq!(store.len(), 1);
        assert!(store.get(PLATFORM_SERIAL).is_none());
        assert!(store.get(MERCHANT_SERIAL).is_some());
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let store = CertificateStore::with_certificates([platform_cert()]);
        let snapshot = store.snapshot();

        store.replace([merchant_cert()]);

        // The old snapshot still answers consistently for in-flight work.
        assert!(snapshot.contains_key(PLATFORM_SERIAL));
        assert!(store.snapshot().contains_key(MERCHANT_SERIAL));
    }

    #[test]
    fn test_readers_never_observe_partial_maps() {
        // One writer flips between two complete sets while readers hammer
        // snapshots; every observed snapshot must be exactly one of the two
        // sets, all-or-nothing.
        let store = CertificateStore::with_certificates([platform_cert()]);
        let set_a = vec![platform_cert()];
        let set_b = vec![platform_cert(), merchant_cert()];

        let writer_store = store.clone();
        let writer = thread::spawn(move || {
            for round in 0..500 {
                if round % 2 == 0 {
                    writer_store.replace(set_b.clone());
                } else {
                    writer_store.replace(set_a.clone());
                }
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader_store = store.clone();
                thread::spawn(move || {
                    for _ in 0..2000 {
                        let snapshot = reader_store.snapshot();
                        let valid = (snapshot.len() == 1
                            && snapshot.contains_key(PLATFORM_SERIAL))
                            || (snapshot.len() == 2
                                && snapshot.contains_key(PLATFORM_SERIAL)
                                && snapshot.contains_key(MERCHANT_SERIAL));
                        assert!(valid, "observed a partial map: {:?}", snapshot.keys());
                    }
                })
            })
            .collect();

        writer.join().expect("writer panicked");
        for reader in readers {
            reader.join().expect("reader panicked");
        }

        // Quiesced store is one of the two complete sets.
        thread::sleep(Duration::from_millis(10));
        assert!(store.len() == 1 || store.len() == 2);
    }
}
