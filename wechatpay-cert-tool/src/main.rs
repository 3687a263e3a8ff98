//! One-shot downloader for WeChat Pay platform certificates.
//!
//! Fetches the certificate listing, decrypts each entry with the APIv3
//! secret, verifies the response signature, prints the certificate metadata
//! and saves the PEM files. Exits non-zero on any verification or
//! decryption failure; nothing is printed to stdout unless verification
//! succeeded.
//!
//! When `--wechatpay-cert` is given, the response is verified against that
//! operator-supplied certificate from the start. Without it, the first
//! fetch runs in the documented trust-on-first-fetch mode and is re-verified
//! against the certificates it downloaded.

mod observability;

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{error, info};
use url::Url;
use wechatpay_apiv3::{
    pem, ApiV3Key, CertificateDownloader, CertificateStore, MerchantCredential,
    PlatformCertificate, RequestSigner, Result,
};

/// Download and decrypt WeChat Pay platform certificates.
#[derive(Debug, Parser)]
#[command(name = "wechatpay-cert-tool", version, about)]
struct Cli {
    /// Merchant id.
    #[arg(short = 'm', long)]
    mchid: String,

    /// Serial number of the merchant certificate.
    #[arg(short = 's', long)]
    serialno: String,

    /// Path to the merchant private key PEM file.
    #[arg(short = 'f', long)]
    privatekey: PathBuf,

    /// The 32-byte APIv3 key.
    #[arg(short = 'k', long)]
    key: String,

    /// Optional platform certificate PEM used to verify the response
    /// instead of trust-on-first-fetch.
    #[arg(short = 'c', long)]
    wechatpay_cert: Option<PathBuf>,

    /// Directory the downloaded certificates are written to.
    #[arg(short = 'o', long, default_value = ".")]
    output: PathBuf,

    /// API base URL override (for sandboxes and testing).
    #[arg(long, default_value = wechatpay_apiv3::certificates::rotation::DEFAULT_BASE_URL)]
    base_url: Url,
}

#[tokio::main]
async fn main() {
    observability::init();
    let cli = Cli::parse();

    if let Err(error) = run(cli).await {
        error!(kind = ?error.kind(), "download failed");
        eprintln!("download failed: {error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let private_key = pem::load_private_key_file(&cli.privatekey)?;
    let credential = MerchantCredential::new(cli.mchid, &cli.serialno, private_key);
    let signer = RequestSigner::new(credential);
    let apiv3_key = ApiV3Key::new(cli.key.into_bytes())?;

    let store = match &cli.wechatpay_cert {
        Some(path) => {
            let trusted = PlatformCertificate::from_file(path)?;
            info!(serial = %trusted.serial_no(), "verifying against operator-supplied certificate");
            CertificateStore::with_certificates([trusted])
        }
        None => {
            info!("no trusted certificate supplied, first fetch runs in bootstrap mode");
            CertificateStore::new()
        }
    };

    let downloader = CertificateDownloader::new(signer, apiv3_key, store)
        .with_base_url(cli.base_url);
    let downloaded = downloader.rotate().await?;

    for certificate in &downloaded {
        println!("Certificate {{");
        println!("    Serial Number: {}", certificate.serial_no);
        println!("    Not Before: {}", format_time(certificate.not_before));
        println!("    Not After: {}", format_time(certificate.not_after));
        println!("}}");

        let path = cli.output.join(format!("wechatpay_{}.pem", certificate.serial_no));
        std::fs::write(&path, &certificate.pem)?;
        info!(path = %path.display(), "certificate saved");
    }

    Ok(())
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format("%Y-%m-%d %H:%M:%S").to_string()
}
