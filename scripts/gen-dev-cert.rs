//! Development certificate for the relay - run with `cargo run --manifest-path scripts/Cargo.toml`
//!
//! Writes a self-signed localhost certificate to `certs/` and prints the
//! SHA-256 hash that browsers and headless peers pin it by. Pass `--force`
//! to replace an existing pair.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use ring::digest::{digest, SHA256};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

const CERT_DIR: &str = "../certs";
const CERT_FILE: &str = "../certs/cert.pem";
const KEY_FILE: &str = "../certs/key.pem";

/// Upper bound browsers accept for `serverCertificateHashes`
const VALIDITY: Duration = Duration::from_secs(14 * 24 * 60 * 60);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let force = std::env::args().any(|a| a == "--force");
    let exists = Path::new(CERT_FILE).exists() && Path::new(KEY_FILE).exists();

    if exists && !force {
        println!("Relay certificate already present in {}/ (use --force to replace)", CERT_DIR);
    } else {
        generate()?;
    }

    let cert_pem = fs::read_to_string(CERT_FILE)?;
    let der = pem::parse(&cert_pem)?;
    let hash = STANDARD.encode(digest(&SHA256, der.contents()).as_ref());

    println!();
    println!("Headless peer (.env):");
    println!("  RELAY_URL=https://127.0.0.1:4433");
    println!("  RELAY_CERT_HASH={}", hash);
    println!();
    println!("Browser client:");
    println!("  serverCertificateHashes: [{{ algorithm: \"sha-256\", value: base64(\"{}\") }}]", hash);

    Ok(())
}

fn generate() -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(CERT_DIR)?;

    let mut params =
        CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])?;
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, "Horde Relay Dev");
    name.push(DnType::OrganizationName, "Development");
    params.distinguished_name = name;

    let now = SystemTime::now();
    params.not_before = now.into();
    params.not_after = (now + VALIDITY).into();

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    fs::write(CERT_FILE, cert.pem())?;
    fs::write(KEY_FILE, key_pair.serialize_pem())?;
    println!("Wrote {} and {}", CERT_FILE, KEY_FILE);
    Ok(())
}
