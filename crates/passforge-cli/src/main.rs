//! Command-line interface for the passforge wallet pass signer.
//!
//! Generates signed `.pkpass` files from template snapshots, lists a
//! template's placeholders, inspects pass-type certificates, and verifies
//! existing packages.

use clap::{Args, Parser, Subcommand};
use passforge::bundle::MANIFEST_FILE;
use passforge::certificate::{
    CertificateRecord, CertificateRepository, CertificateSource, InMemoryCertificateRepository,
    JsonFileCertificateRepository,
};
use passforge::crypto::{verify_signature, CertificateIdentity};
use passforge::pkpass::{read_package, verify_manifest};
use passforge::template::InMemoryTemplateRepository;
use passforge::{
    extract_placeholders, validate_field_values, CompressionLevel, EngineConfig, PassGenerator,
    PassRequest, TemplateSnapshot,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "passforge")]
#[command(about = "Wallet pass packaging and signing tool")]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long, global = true, env = "PASSFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a signed pass from a template snapshot
    Generate(GenerateArgs),
    /// List the placeholders of a template and check field values against them
    Placeholders(PlaceholdersArgs),
    /// Show the pass-type identity of a certificate
    InspectCert(InspectArgs),
    /// Check a package's manifest digests and signature
    Verify(VerifyArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Template snapshot (JSON)
    template: PathBuf,

    /// Output file (default: <serial>.pkpass)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Certificate repository file (JSON)
    #[arg(long, conflicts_with = "pkcs12")]
    certificates: Option<PathBuf>,

    /// PKCS#12 file (.p12) to sign with
    #[arg(short = 'p', long, requires = "wwdr")]
    pkcs12: Option<PathBuf>,

    /// Password for the PKCS#12 file
    #[arg(long, env = "PASSFORGE_P12_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// WWDR intermediate certificate (PEM or DER)
    #[arg(short, long)]
    wwdr: Option<PathBuf>,

    /// Field value, KEY=VALUE (repeatable)
    #[arg(short, long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Field values from a JSON object file
    #[arg(long)]
    fields_file: Option<PathBuf>,

    /// Tenant the certificate belongs to
    #[arg(short, long)]
    tenant: Option<String>,

    /// ZIP compression level (0-9)
    #[arg(short = 'z', long)]
    zip_level: Option<u32>,
}

#[derive(Args)]
struct PlaceholdersArgs {
    /// Template snapshot (JSON)
    template: PathBuf,

    /// Field value to check, KEY=VALUE (repeatable)
    #[arg(short, long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,
}

#[derive(Args)]
struct InspectArgs {
    /// Certificate (PEM or DER) or PKCS#12 file
    file: PathBuf,

    /// Password when FILE is PKCS#12
    #[arg(long, env = "PASSFORGE_P12_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args)]
struct VerifyArgs {
    /// Package to verify
    package: PathBuf,
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))?;
    if key.is_empty() {
        return Err("field key must not be empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Generate(args) => generate(cli.config.as_deref(), args).await,
        Command::Placeholders(args) => placeholders(args),
        Command::InspectCert(args) => inspect_cert(args),
        Command::Verify(args) => verify(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn load_template(path: &Path) -> CliResult<TemplateSnapshot> {
    Ok(TemplateSnapshot::from_json(&std::fs::read(path)?)?)
}

async fn generate(config_path: Option<&Path>, args: GenerateArgs) -> CliResult<ExitCode> {
    let mut config = load_config(config_path)?;
    if let Some(level) = args.zip_level {
        config.compression_level = CompressionLevel::new(level).level();
    }

    let snapshot = load_template(&args.template)?;
    let template_id = snapshot.id.clone();

    let mut field_values = BTreeMap::new();
    if let Some(path) = &args.fields_file {
        let values: BTreeMap<String, Value> = serde_json::from_slice(&std::fs::read(path)?)?;
        for (key, value) in values {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            field_values.insert(key, text);
        }
    }
    field_values.extend(args.fields);

    let certificates: Arc<dyn CertificateRepository> = match (&args.certificates, &args.pkcs12, &args.wwdr) {
        (Some(path), _, _) => Arc::new(JsonFileCertificateRepository::open(path).await?),
        (None, Some(p12), Some(wwdr)) => {
            let password = SecretString::new(args.password.clone().unwrap_or_default());
            let identity = CertificateIdentity::from_pkcs12(&std::fs::read(p12)?, password.expose_secret())?;
            info!(
                pass_type_identifier = %identity.pass_type_identifier,
                team_identifier = %identity.team_identifier,
                "using certificate"
            );
            let repository = InMemoryCertificateRepository::new();
            repository
                .add(CertificateRecord::from_identity(
                    identity,
                    args.tenant.clone(),
                    password,
                    CertificateSource::local_file(p12),
                    CertificateSource::local_file(wwdr),
                ))
                .await?;
            Arc::new(repository)
        }
        _ => return Err("Provide either --certificates or both --pkcs12 and --wwdr".into()),
    };

    let templates = Arc::new(InMemoryTemplateRepository::new());
    templates.insert(snapshot).await;

    let generator = PassGenerator::from_config(templates, certificates, config)?;
    let mut request = PassRequest::new(template_id).field_values(field_values);
    if let Some(tenant) = args.tenant {
        request = request.tenant(tenant);
    }
    let pass = generator.generate(request).await?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.pkpass", pass.serial_number)));
    std::fs::write(&output, &pass.bytes)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "output": output.display().to_string(),
            "serialNumber": pass.serial_number,
            "passTypeIdentifier": pass.pass_type_identifier,
            "size": pass.bytes.len(),
            "fieldValues": pass.field_values,
        }))?
    );
    Ok(ExitCode::SUCCESS)
}

fn placeholders(args: PlaceholdersArgs) -> CliResult<ExitCode> {
    let snapshot = load_template(&args.template)?;
    let keys = extract_placeholders(&Value::Object(snapshot.pass_json_snapshot.clone()));

    if args.fields.is_empty() {
        let defaults = snapshot.default_placeholders();
        let listing: Vec<Value> = keys
            .iter()
            .map(|key| json!({ "key": key, "default": defaults.get(key) }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(ExitCode::SUCCESS);
    }

    let values: BTreeMap<String, String> = args.fields.into_iter().collect();
    let report = validate_field_values(&keys, &values);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "valid": report.is_valid(),
            "missing": report.missing,
            "empty": report.empty,
            "extraneous": report.extraneous,
        }))?
    );
    Ok(if report.is_valid() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn inspect_cert(args: InspectArgs) -> CliResult<ExitCode> {
    let data = std::fs::read(&args.file)?;
    let is_p12 = args
        .file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("p12") || e.eq_ignore_ascii_case("pfx"));

    let identity = if is_p12 {
        CertificateIdentity::from_pkcs12(&data, args.password.as_deref().unwrap_or(""))?
    } else {
        CertificateIdentity::from_certificate_bytes(&data)?
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "passTypeIdentifier": identity.pass_type_identifier,
            "teamIdentifier": identity.team_identifier,
            "organizationName": identity.organization_name,
        }))?
    );
    Ok(ExitCode::SUCCESS)
}

fn verify(args: VerifyArgs) -> CliResult<ExitCode> {
    let package = read_package(&std::fs::read(&args.package)?)?;
    let check = verify_manifest(&package)?;

    let signature = match (package.signature(), package.get(MANIFEST_FILE)) {
        (Some(signature), Some(manifest)) => match verify_signature(signature, manifest) {
            Ok(info) => json!({ "valid": true, "signers": info.signers, "certificates": info.certificates }),
            Err(e) => json!({ "valid": false, "error": e.to_string() }),
        },
        _ => json!({ "valid": false, "error": "package has no signature" }),
    };
    let signature_valid = signature["valid"] == true;

    let pass_type_identifier = package
        .pass_json()
        .ok()
        .and_then(|pass| pass.get("passTypeIdentifier").cloned());

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "files": package.names().collect::<Vec<_>>(),
            "passTypeIdentifier": pass_type_identifier,
            "manifest": {
                "valid": check.is_valid(),
                "mismatched": check.mismatched,
                "missing": check.missing,
                "unlisted": check.unlisted,
                "hostMetadata": check.host_metadata,
            },
            "signature": signature,
        }))?
    );

    Ok(if check.is_valid() && signature_valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
