use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ledger_core::{
    verify_chain, verify_signed_chain, ChainReport, Ed25519Scheme, KeyPair, Ledger, LedgerConfig,
    LedgerEntry, SharedLedger,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const PRIVATE_KEY_FILE: &str = "priv.key";
const PUBLIC_KEY_FILE: &str = "pub.key";

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Build and verify tamper-evident, signed ledgers")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an Ed25519 key pair as armored text files
    Keygen {
        /// Directory to write priv.key and pub.key into
        #[arg(long, default_value = "keys")]
        out_dir: PathBuf,
        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },
    /// Chain each non-empty input line as a plain entry
    Chain {
        /// Text file to read, or - for stdin
        #[arg(long, default_value = "-")]
        input: String,
        /// Where to write the ledger JSON (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Sign each non-empty input line and commit them as one block
    Sign {
        /// Text file to read, or - for stdin
        #[arg(long, default_value = "-")]
        input: String,
        /// Armored private key file
        #[arg(long)]
        private_key: PathBuf,
        /// Armored public key file
        #[arg(long)]
        public_key: PathBuf,
        /// Where to write the ledger JSON (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Verify a ledger JSON file and print the report
    Verify {
        /// Ledger JSON file produced by `chain` or `sign`
        #[arg(long)]
        ledger: PathBuf,
        /// Also verify the signed transactions carried by each entry
        #[arg(long)]
        signed: bool,
        #[command(flatten)]
        batch: BatchArgs,
    },
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Timeout for one batch of signature operations, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Maximum signature operations in flight
    #[arg(long)]
    concurrency: Option<usize>,
}

impl BatchArgs {
    fn config(&self) -> LedgerConfig {
        let mut config = LedgerConfig::default();
        if let Some(ms) = self.timeout_ms {
            config = config.with_signature_timeout(Duration::from_millis(ms));
        }
        if let Some(n) = self.concurrency {
            config.verify_concurrency = n;
        }
        config
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    entries: usize,
    valid: bool,
    failures: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ledger: Option<&'a Path>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Keygen { out_dir, force } => {
            keygen(&out_dir, force).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Chain { input, out } => {
            let lines = read_lines(&input).await?;
            let shared = SharedLedger::default();
            for line in lines {
                shared.append_payload(line).await?;
            }
            let ledger = shared.snapshot().await;
            let report = verify_chain(&ledger);
            emit_ledger(&ledger, &report, out.as_deref()).await
        }
        Command::Sign {
            input,
            private_key,
            public_key,
            out,
            batch,
        } => {
            let lines = read_lines(&input).await?;
            if lines.is_empty() {
                bail!("no input lines to sign");
            }
            let keys = read_keys(&private_key, &public_key).await?;
            let scheme = Arc::new(Ed25519Scheme);
            let shared = SharedLedger::new(Ledger::new(), batch.config());
            let block = shared
                .append_signed_block(lines, &keys, Arc::clone(&scheme))
                .await
                .context("signing the block")?;
            info!(index = block.index, hash = %block.hash, "block signed");
            let ledger = shared.snapshot().await;
            let report = verify_signed_chain(&ledger, scheme, shared.config()).await?;
            emit_ledger(&ledger, &report, out.as_deref()).await
        }
        Command::Verify {
            ledger,
            signed,
            batch,
        } => {
            let text = tokio::fs::read_to_string(&ledger)
                .await
                .with_context(|| format!("reading {}", ledger.display()))?;
            let entries: Vec<LedgerEntry> = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", ledger.display()))?;
            let loaded = Ledger::from_entries(entries);
            let report = if signed {
                verify_signed_chain(&loaded, Arc::new(Ed25519Scheme), &batch.config()).await?
            } else {
                verify_chain(&loaded)
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(exit_code(&report))
        }
    }
}

async fn keygen(out_dir: &Path, force: bool) -> Result<()> {
    let private_path = out_dir.join(PRIVATE_KEY_FILE);
    let public_path = out_dir.join(PUBLIC_KEY_FILE);
    if !force && (private_path.exists() || public_path.exists()) {
        bail!(
            "key files already exist in {} (pass --force to overwrite)",
            out_dir.display()
        );
    }
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let keys = Ed25519Scheme::generate_keypair();
    tokio::fs::write(&private_path, &keys.private_key).await?;
    tokio::fs::write(&public_path, &keys.public_key).await?;
    info!(dir = %out_dir.display(), "key pair written");
    println!("{}", public_path.display());
    Ok(())
}

async fn read_keys(private_key: &Path, public_key: &Path) -> Result<KeyPair> {
    let private_text = tokio::fs::read_to_string(private_key)
        .await
        .with_context(|| format!("reading {}", private_key.display()))?;
    let public_text = tokio::fs::read_to_string(public_key)
        .await
        .with_context(|| format!("reading {}", public_key.display()))?;
    let keys = KeyPair::new(private_text, public_text);
    Ed25519Scheme::check_keypair(&keys).with_context(|| {
        format!(
            "checking {} against {}",
            public_key.display(),
            private_key.display()
        )
    })?;
    Ok(keys)
}

/// Non-empty lines of a file, or of stdin for `-`.
async fn read_lines(input: &str) -> Result<Vec<String>> {
    let text = if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("reading {input}"))?
    };
    Ok(text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect())
}

async fn emit_ledger(ledger: &Ledger, report: &ChainReport, out: Option<&Path>) -> Result<ExitCode> {
    let json = serde_json::to_string_pretty(ledger.entries())?;
    match out {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            let summary = Summary {
                entries: ledger.len(),
                valid: report.is_valid(),
                failures: report.failures(),
                ledger: Some(path),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        None => {
            println!("{json}");
            eprintln!("{}", serde_json::to_string_pretty(report)?);
        }
    }
    Ok(exit_code(report))
}

fn exit_code(report: &ChainReport) -> ExitCode {
    if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
