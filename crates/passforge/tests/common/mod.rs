//! Shared fixtures for integration tests.
//!
//! The certificates under `tests/fixtures/` were generated once with the
//! OpenSSL CLI: a self-signed stand-in WWDR CA and two pass-type leaf
//! certificates it issued (`pass.com.example.alpha`, `pass.com.example.beta`).

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use passforge::certificate::{
    BlobClient, CertificateRecord, CertificateRepository, CertificateResolver, CertificateSource,
    InMemoryCertificateRepository, SourceLoader,
};
use passforge::template::InMemoryTemplateRepository;
use passforge::{BlobStoreConfig, EngineConfig, PassGenerator, TemplateSnapshot};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ALPHA_ID: &str = "pass.com.example.alpha";
pub const BETA_ID: &str = "pass.com.example.beta";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn read_fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixture(name)).unwrap()
}

/// A tiny but well-formed 1x1 PNG.
pub fn png_base64() -> String {
    const PNG: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
        0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];
    STANDARD.encode(PNG)
}

/// A store card template bound to `pass_type_identifier`.
pub fn loyalty_template(id: &str, pass_type_identifier: &str) -> Value {
    json!({
        "id": id,
        "passTypeIdentifier": pass_type_identifier,
        "passJsonSnapshot": {
            "formatVersion": 1,
            "passTypeIdentifier": pass_type_identifier,
            "description": "${BUSINESS_NAME} loyalty card",
            "organizationName": "${BUSINESS_NAME}",
            "backgroundColor": "rgb(20, 20, 40)",
            "foregroundColor": "rgb(255, 255, 255)",
            "labelColor": "rgb(200, 200, 200)",
            "barcodes": [{
                "message": "${MEMBER_ID}",
                "format": "PKBarcodeFormatQR",
                "messageEncoding": "iso-8859-1",
                "altText": "${MEMBER_ID}"
            }],
            "storeCard": {
                "headerFields": [{ "key": "points", "label": "Points", "value": "${POINTS}" }],
                "primaryFields": [{ "key": "member", "label": "Member", "value": "${FIRST_NAME}" }],
                "backFields": [{ "key": "terms", "label": "Terms", "value": "Points expire after a year." }]
            },
            "placeholders": { "POINTS": "0" }
        },
        "placeholders": {
            "BUSINESS_NAME": "Corner Coffee",
            "FIRST_NAME": "Guest",
            "MEMBER_ID": "M-0000"
        },
        "images": {
            "icon": { "1x": format!("data:image/png;base64,{}", png_base64()), "2x": png_base64() },
            "logo": { "1x": png_base64() }
        }
    })
}

pub fn snapshot(value: &Value) -> TemplateSnapshot {
    TemplateSnapshot::from_json(value.to_string().as_bytes()).unwrap()
}

pub fn local_record(
    pass_type_identifier: &str,
    team_identifier: &str,
    tenant_id: Option<&str>,
    p12: &str,
    password: &str,
) -> CertificateRecord {
    CertificateRecord {
        pass_type_identifier: pass_type_identifier.into(),
        team_identifier: team_identifier.into(),
        tenant_id: tenant_id.map(str::to_string),
        organization_name: None,
        password: SecretString::new(password.into()),
        p12: CertificateSource::local_file(fixture(p12)),
        wwdr: CertificateSource::local_file(fixture("wwdr.der")),
    }
}

/// Repository holding the alpha (tenant `t-alpha`) and beta (tenant `t-beta`) certificates.
pub async fn certificates() -> Arc<InMemoryCertificateRepository> {
    let repository = Arc::new(InMemoryCertificateRepository::new());
    repository
        .add(local_record(ALPHA_ID, "ALPHA12345", Some("t-alpha"), "alpha.p12", "secret-alpha"))
        .await
        .unwrap();
    repository
        .add(local_record(BETA_ID, "BETA678901", Some("t-beta"), "beta.p12", "secret-beta"))
        .await
        .unwrap();
    repository
}

pub fn generator(
    templates: Arc<InMemoryTemplateRepository>,
    certificates: Arc<dyn CertificateRepository>,
    config: EngineConfig,
) -> PassGenerator {
    let loader = SourceLoader::new(BlobClient::new(&config.blob_store).unwrap());
    let resolver = CertificateResolver::new(
        certificates,
        loader,
        config.global_pass_type_identifier.clone(),
    );
    PassGenerator::new(templates, resolver, config)
}

pub fn blob_config(base_url: &str) -> BlobStoreConfig {
    BlobStoreConfig {
        base_url: Some(base_url.to_string()),
        bearer_token: Some(SecretString::new("test-token".into())),
        timeout_secs: 5,
        max_retries: 2,
        initial_backoff_ms: 10,
        allow_insecure_http: true,
    }
}
