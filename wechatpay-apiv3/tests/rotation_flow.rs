//! End-to-end certificate rotation against a mock platform.
//!
//! The mock serves a `/v3/certificates` listing whose entry is a real
//! AEAD-encrypted certificate and whose response headers carry a real
//! platform signature, so the full fetch → verify → decrypt → install path
//! runs exactly as it would against production.

use url::Url;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wechatpay_apiv3::crypto::aesgcm;
use wechatpay_apiv3::error::{ErrorKind, PayError};
use wechatpay_apiv3::formatter;
use wechatpay_apiv3::{
    ApiV3Key, CertificateDownloader, CertificateStore, MerchantCredential, MerchantPrivateKey,
    PlatformCertificate, RequestSigner,
};

const MERCHANT_KEY_PEM: &str = include_str!("fixtures/merchant_key.pem");
const PLATFORM_KEY_PEM: &str = include_str!("fixtures/platform_key.pem");
const PLATFORM_CERT_PEM: &str = include_str!("fixtures/platform_cert.pem");
const PLATFORM_SERIAL: &str = "3F6AD1C8B90E24657A8D9F0B1C2D3E4F50617283";

const APIV3_KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";
const CERT_NONCE: &str = "aabbccddeeff";
const CERT_AAD: &str = "certificate";

/// Builds the listing body the platform would serve: one entry holding the
/// encrypted platform certificate.
fn listing_body() -> String {
    let ciphertext = aesgcm::encrypt(
        PLATFORM_CERT_PEM.as_bytes(),
        APIV3_KEY,
        CERT_NONCE.as_bytes(),
        CERT_AAD.as_bytes(),
    )
    .expect("encrypt fixture certificate");

    serde_json::json!({
        "data": [{
            "serial_no": PLATFORM_SERIAL,
            "effective_time": "2026-01-01T00:00:00+08:00",
            "expire_time": "2036-01-01T00:00:00+08:00",
            "encrypt_certificate": {
                "algorithm": "AEAD_AES_256_GCM",
                "nonce": CERT_NONCE,
                "associated_data": CERT_AAD,
                "ciphertext": ciphertext,
            },
        }],
    })
    .to_string()
}

/// Signs `body` with the platform key and attaches the security headers.
fn signed_response(body: &str) -> ResponseTemplate {
    let key = MerchantPrivateKey::from_pem(PLATFORM_KEY_PEM).expect("fixture key");
    let nonce = formatter::nonce(32);
    let timestamp = formatter::timestamp().to_string();
    let message = formatter::response_message(&timestamp, &nonce, body);
    let signature = key.sign(message.as_bytes()).expect("sign response");

    ResponseTemplate::new(200)
        .set_body_string(body.to_owned())
        .insert_header("Wechatpay-Nonce", nonce.as_str())
        .insert_header("Wechatpay-Serial", PLATFORM_SERIAL)
        .insert_header("Wechatpay-Signature", signature.as_str())
        .insert_header("Wechatpay-Timestamp", timestamp.as_str())
}

fn downloader(base: &str, store: CertificateStore) -> CertificateDownloader {
    let key = MerchantPrivateKey::from_pem(MERCHANT_KEY_PEM).expect("fixture key");
    let signer = RequestSigner::new(MerchantCredential::new("1900000001", "1DEA4218", key));
    let apiv3_key = ApiV3Key::new(APIV3_KEY.to_vec()).expect("fixture APIv3 key");

    CertificateDownloader::new(signer, apiv3_key, store)
        .with_base_url(Url::parse(base).expect("mock base URL"))
}

#[tokio::test]
async fn test_bootstrap_rotation_populates_empty_store() {
    let server = MockServer::start().await;
    let body = listing_body();

    Mock::given(method("GET"))
        .and(path("/v3/certificates"))
        .and(header_exists("Authorization"))
        .respond_with(signed_response(&body))
        .expect(1)
        .mount(&server)
        .await;

    let store = CertificateStore::new();
    let downloaded = downloader(&server.uri(), store.clone())
        .rotate()
        .await
        .expect("bootstrap rotation should succeed");

    assert_eq!(downloaded.len(), 1);
    assert_eq!(downloaded[0].serial_no, PLATFORM_SERIAL);
    assert!(downloaded[0].not_before < downloaded[0].not_after);
    assert!(downloaded[0].pem.contains("BEGIN CERTIFICATE"));

    // The store now resolves the platform serial for normal verification.
    assert_eq!(store.len(), 1);
    assert!(store.get(PLATFORM_SERIAL).is_some());
}

#[tokio::test]
async fn test_seeded_rotation_verifies_before_install() {
    let server = MockServer::start().await;
    let body = listing_body();

    Mock::given(method("GET"))
        .and(path("/v3/certificates"))
        .respond_with(signed_response(&body))
        .mount(&server)
        .await;

    let store = CertificateStore::with_certificates([
        PlatformCertificate::from_pem(PLATFORM_CERT_PEM).expect("fixture cert"),
    ]);
    let downloaded = downloader(&server.uri(), store.clone())
        .rotate()
        .await
        .expect("seeded rotation should succeed");

    assert_eq!(downloaded.len(), 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_tampered_listing_fails_even_in_bootstrap() {
    let server = MockServer::start().await;
    let body = listing_body();

    // Complete, fresh headers but a signature the platform key never made:
    // the bootstrap path must catch this on the post-install re-verification.
    let bad = ResponseTemplate::new(200)
        .set_body_string(body.clone())
        .insert_header("Wechatpay-Nonce", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
        .insert_header("Wechatpay-Serial", PLATFORM_SERIAL)
        .insert_header(
            "Wechatpay-Signature",
            // Structurally valid base64, cryptographically wrong.
            "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVphYmNkZWZnaGlqa2xtbm9wcXJzdHV2d3h5ejAxMjM0NTY3ODk=",
        )
        .insert_header("Wechatpay-Timestamp", formatter::timestamp().to_string().as_str());

    Mock::given(method("GET"))
        .and(path("/v3/certificates"))
        .respond_with(bad)
        .mount(&server)
        .await;

    let store = CertificateStore::new();
    let error = downloader(&server.uri(), store.clone())
        .rotate()
        .await
        .expect_err("tampered listing must be rejected");

    assert!(matches!(
        error,
        PayError::SignatureMismatch | PayError::MalformedSignature(_)
    ));
    assert_eq!(error.kind(), ErrorKind::Integrity);
    assert!(store.is_empty(), "failed bootstrap must leave the store unchanged");
}

#[tokio::test]
async fn test_unknown_serial_with_seeded_store_fails_closed() {
    let server = MockServer::start().await;
    let body = listing_body();

    Mock::given(method("GET"))
        .and(path("/v3/certificates"))
        .respond_with(signed_response(&body))
        .mount(&server)
        .await;

    // Seeded with a certificate that does NOT match the response serial:
    // rotation must fail with UnknownSerial rather than fall back to
    // bootstrap trust.
    let other = PlatformCertificate::from_pem(include_str!("fixtures/merchant_cert.pem"))
        .expect("fixture cert");
    let store = CertificateStore::with_certificates([other]);

    let error = downloader(&server.uri(), store.clone())
        .rotate()
        .await
        .expect_err("unknown serial must be rejected");

    assert!(matches!(error, PayError::UnknownSerial(_)));
    // The store is unchanged by the failed rotation.
    assert!(store.get(PLATFORM_SERIAL).is_none());
}

#[tokio::test]
async fn test_platform_error_status_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3/certificates"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let store = CertificateStore::new();
    let error = downloader(&server.uri(), store.clone())
        .rotate()
        .await
        .expect_err("500 must surface as an error");

    match &error {
        PayError::Platform { status, body } => {
            assert_eq!(*status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(error.is_retryable());
    assert!(store.is_empty(), "failed rotation must leave the store unchanged");
}

#[tokio::test]
async fn test_undecryptable_entry_aborts_rotation() {
    let server = MockServer::start().await;

    // Ciphertext encrypted under a *different* APIv3 key.
    let wrong_key = b"fedcba9876543210fedcba9876543210";
    let ciphertext = aesgcm::encrypt(
        PLATFORM_CERT_PEM.as_bytes(),
        wrong_key,
        CERT_NONCE.as_bytes(),
        CERT_AAD.as_bytes(),
    )
    .expect("encrypt with wrong key");

    let body = serde_json::json!({
        "data": [{
            "serial_no": PLATFORM_SERIAL,
            "encrypt_certificate": {
                "algorithm": "AEAD_AES_256_GCM",
                "nonce": CERT_NONCE,
                "associated_data": CERT_AAD,
                "ciphertext": ciphertext,
            },
        }],
    })
    .to_string();

    Mock::given(method("GET"))
        .and(path("/v3/certificates"))
        .respond_with(signed_response(&body))
        .mount(&server)
        .await;

    let store = CertificateStore::new();
    let error = downloader(&server.uri(), store.clone())
        .rotate()
        .await
        .expect_err("wrong APIv3 key must fail decryption");

    assert!(matches!(error, PayError::AeadAuthentication));
    assert!(store.is_empty());
}
