//! # CLI Interface
//!
//! Command-line argument structure for `pact-node` using `clap` derive.
//! Three subcommands: `run`, `init`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// PACT devnet node.
///
/// Boots the configured set of hosts, a notary, and the account directory
/// in one process over the in-process session transport, and exposes the
/// ledger flows through an HTTP gateway.
#[derive(Parser, Debug)]
#[command(
    name = "pact-node",
    about = "PACT ledger devnet node and HTTP gateway",
    version,
    propagate_version = true
)]
pub struct PactNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the PACT node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the devnet node and gateway.
    Run(RunArgs),
    /// Initialize a data directory — generates a keypair per host label.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the data directory where host keys and vaults are stored.
    #[arg(long, short = 'd', env = "PACT_DATA_DIR", default_value = "~/.pact")]
    pub data_dir: PathBuf,

    /// Port for the HTTP gateway.
    #[arg(long, env = "PACT_RPC_PORT", default_value_t = 8460)]
    pub rpc_port: u16,

    /// Comma-separated host labels to boot in this process.
    #[arg(long, env = "PACT_HOSTS", default_value = "bank-a,bank-b", value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Use in-memory vaults instead of on-disk storage. Nothing survives
    /// a restart; handy for demos and tests.
    #[arg(long, default_value_t = false)]
    pub ephemeral: bool,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "PACT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "PACT_DATA_DIR", default_value = "~/.pact")]
    pub data_dir: PathBuf,

    /// Comma-separated host labels to generate keys for.
    #[arg(long, default_value = "bank-a,bank-b", value_delimiter = ',')]
    pub hosts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        PactNodeCli::command().debug_assert();
    }

    #[test]
    fn hosts_flag_splits_on_commas() {
        let cli =
            PactNodeCli::parse_from(["pact-node", "run", "--hosts", "alpha,beta,gamma"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.hosts, vec!["alpha", "beta", "gamma"]);
    }
}
