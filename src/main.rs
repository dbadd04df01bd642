use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sane_verifier::config::VerifierConfig;
use sane_verifier::dns::{DomainName, RData, ResourceRecord, Tlsa};
use sane_verifier::roots::{FileRootStore, HnsdIngester, RootStore};
use sane_verifier::tls::{check_binding, load_certificates};
use sane_verifier::verifier::{CertificateInfo, Orchestrator};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Stateless DANE verification for Handshake names
#[derive(Parser, Debug)]
#[command(name = "sane-verify", author, version, about, long_about = None)]
struct Args {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML file with verifier settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a PEM certificate against a TLSA record
    Verify {
        /// End-entity certificate, PEM
        #[arg(long)]
        cert: PathBuf,

        /// Expected TLSA record: owner usage selector matching-type hex-data
        #[arg(long, num_args = 5, value_names = ["OWNER", "USAGE", "SELECTOR", "MATCHING", "DATA"])]
        tlsa: Vec<String>,

        /// Trusted tree roots JSON
        #[arg(long)]
        roots: Option<PathBuf>,

        /// Proof service used when the certificate lacks an extension
        #[arg(long = "external-service")]
        external_services: Vec<String>,
    },
    /// Manage the trusted tree roots
    Roots {
        #[command(subcommand)]
        command: RootsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RootsCommand {
    /// Append tree roots from hnsd output read on stdin
    Ingest {
        #[arg(long)]
        roots: Option<PathBuf>,
    },
}

fn parse_tlsa(fields: &[String]) -> Result<ResourceRecord, String> {
    let [owner, usage, selector, matching, data] = fields else {
        return Err("TLSA needs owner, usage, selector, matching type and data".to_string());
    };
    let owner: DomainName = owner.parse().map_err(|e| format!("TLSA owner: {}", e))?;
    let number = |s: &str, what: &str| s.parse::<u8>().map_err(|_| format!("bad {}: {}", what, s));
    let tlsa = Tlsa {
        usage: number(usage, "usage")?,
        selector: number(selector, "selector")?,
        matching_type: number(matching, "matching type")?,
        data: hex::decode(data).map_err(|e| format!("TLSA data: {}", e))?,
    };
    Ok(ResourceRecord::new(owner, 0, RData::Tlsa(tlsa)))
}

fn load_config(path: Option<&PathBuf>) -> Result<VerifierConfig, String> {
    match path {
        Some(path) => VerifierConfig::from_file(path),
        None => VerifierConfig::from_env(),
    }
    .map_err(|e| e.to_string())
}

async fn verify(
    mut config: VerifierConfig,
    cert: PathBuf,
    tlsa: Vec<String>,
    roots: Option<PathBuf>,
    external_services: Vec<String>,
) -> Result<bool, String> {
    if let Some(roots) = roots {
        config.roots_path = roots;
    }
    if !external_services.is_empty() {
        config.external_services = external_services;
    }
    config.validate().map_err(|e| e.to_string())?;

    let expected = parse_tlsa(&tlsa)?;
    let certs = load_certificates(&cert).map_err(|e| e.to_string())?;
    let info = CertificateInfo::from_der(certs[0].as_ref()).map_err(|e| e.to_string())?;
    if let Some(record) = expected.as_tlsa() {
        check_binding(record, &info).map_err(|e| e.to_string())?;
    }

    let store = FileRootStore::new(&config.roots_path);
    let window = store.current().map_err(|e| e.to_string())?;
    info!(
        "Loaded {} tree roots from {}",
        window.len(),
        config.roots_path.display()
    );

    let orchestrator = Orchestrator::from_config(&config).map_err(|e| e.to_string())?;
    let outcome = orchestrator.verify(&info, &expected, &window).await;
    println!("{}", outcome);
    Ok(outcome.is_accepted())
}

fn ingest(config: VerifierConfig, roots: Option<PathBuf>) -> Result<bool, String> {
    let path = roots.unwrap_or(config.roots_path);
    let store = FileRootStore::new(&path);
    let mut ingester = HnsdIngester::new(store.load().map_err(|e| e.to_string())?);

    let stdin = std::io::stdin();
    let mut committed = ingester.ingest_reader(BufReader::new(stdin.lock()));
    committed += usize::from(ingester.flush().is_some());
    let window = ingester.finish();
    store.save(&window).map_err(|e| e.to_string())?;

    println!(
        "{} new tree roots, {} stored in {}",
        committed,
        window.len(),
        path.display()
    );
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match load_config(args.config.as_ref()) {
        Ok(config) => match args.command {
            Command::Verify {
                cert,
                tlsa,
                roots,
                external_services,
            } => verify(config, cert, tlsa, roots, external_services).await,
            Command::Roots {
                command: RootsCommand::Ingest { roots },
            } => ingest(config, roots),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}
