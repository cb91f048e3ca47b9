// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PACT Devnet Node
//!
//! Entry point for the `pact-node` binary. Parses CLI arguments, initializes
//! logging and metrics, boots the configured hosts plus a notary and the
//! account directory in one process, and serves the HTTP gateway.
//!
//! The inter-host wire transport is out of scope for this binary — sessions
//! run over the in-process transport, which is exactly what a devnet wants:
//! the full agreement protocol, none of the network ops.
//!
//! Subcommands:
//!
//! - `run`     — boot the devnet hosts and serve the gateway
//! - `init`    — initialize the data directory and generate host keys
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;

use pact_protocol::agreement::LocalNetwork;
use pact_protocol::crypto::PactKeypair;
use pact_protocol::identity::InMemoryDirectory;
use pact_protocol::ledger::{LedgerStore, MemoryVault, SledVault};
use pact_protocol::notary::{Arbiter, Notary};
use pact_protocol::participant::Participant;

use cli::{Commands, PactNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = PactNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Boots the devnet hosts and serves the gateway until ctrl-c.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "pact_node=info,pact_protocol=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let data_dir = expand_home(&args.data_dir);
    tracing::info!(
        rpc_port = args.rpc_port,
        hosts = ?args.hosts,
        ephemeral = args.ephemeral,
        data_dir = %data_dir.display(),
        "starting pact-node"
    );

    // --- Shared infrastructure ---
    let network = Arc::new(LocalNetwork::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let arbiter: Arc<dyn Arbiter> = Arc::new(Notary::new());

    // --- Hosts ---
    let mut hosts = Vec::with_capacity(args.hosts.len());
    for label in &args.hosts {
        let vault: Arc<dyn LedgerStore> = if args.ephemeral {
            Arc::new(MemoryVault::new())
        } else {
            let path = data_dir.join(label).join("vault");
            std::fs::create_dir_all(&path)
                .with_context(|| format!("failed to create vault directory {}", path.display()))?;
            Arc::new(
                SledVault::open(&path)
                    .with_context(|| format!("failed to open vault at {}", path.display()))?,
            )
        };

        let keypair = load_or_generate_key(&data_dir, label)?;
        let participant = Participant::spawn_with_keypair(
            Arc::clone(&network),
            Arc::clone(&directory),
            Arc::clone(&arbiter),
            vault,
            Arc::new(pact_protocol::agreement::IouEndorsementPolicy),
            keypair,
        );
        tracing::info!(label = %label, host = ?participant.host(), "host online");
        hosts.push(api::HostEntry {
            label: label.clone(),
            participant: Arc::new(participant),
        });
    }

    // --- Gateway ---
    let state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            pact_protocol::config::PROTOCOL_VERSION
        ),
        started_at: Utc::now(),
        directory,
        hosts: Arc::new(hosts),
        metrics: Arc::new(NodeMetrics::new()),
    };
    let router = api::create_router(state);

    let addr = format!("0.0.0.0:{}", args.rpc_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server error")?;

    tracing::info!("pact-node shut down cleanly");
    Ok(())
}

/// Initializes the data directory: one hex-encoded host key per label.
fn init_node(args: cli::InitArgs) -> Result<()> {
    let data_dir = expand_home(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    for label in &args.hosts {
        let key_path = host_key_path(&data_dir, label);
        if key_path.exists() {
            println!("{}: key already exists, leaving it alone", label);
            continue;
        }
        std::fs::create_dir_all(key_path.parent().expect("key path has a parent"))?;
        let keypair = PactKeypair::generate();
        std::fs::write(&key_path, hex::encode(keypair.secret_key_bytes()))
            .with_context(|| format!("failed to write {}", key_path.display()))?;
        println!(
            "{}: generated host key ({})",
            label,
            pact_protocol::identity::HostId::from_public_key(&keypair.public_key())
        );
    }

    println!("initialized {}", data_dir.display());
    Ok(())
}

/// Loads the host key written by `init`, or generates an ephemeral one.
fn load_or_generate_key(data_dir: &Path, label: &str) -> Result<PactKeypair> {
    let key_path = host_key_path(data_dir, label);
    if key_path.exists() {
        let hex_key = std::fs::read_to_string(&key_path)
            .with_context(|| format!("failed to read {}", key_path.display()))?;
        let keypair = PactKeypair::from_hex(hex_key.trim())
            .map_err(|e| anyhow::anyhow!("bad host key in {}: {}", key_path.display(), e))?;
        Ok(keypair)
    } else {
        tracing::warn!(label, "no host key on disk; generating an ephemeral one");
        Ok(PactKeypair::generate())
    }
}

fn host_key_path(data_dir: &Path, label: &str) -> PathBuf {
    data_dir.join(label).join("host.key")
}

/// Expands a leading `~` to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

fn print_version() {
    println!(
        "pact-node {} (protocol {})",
        env!("CARGO_PKG_VERSION"),
        pact_protocol::config::PROTOCOL_VERSION
    );
}

/// Resolves when the process receives ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
