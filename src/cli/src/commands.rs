use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use warden_client::auth::{self, AuthStore};
use warden_client::catalog::ApplicationCatalog;
use warden_client::monitor;
use warden_common::constants::{
    DEFAULT_APP_CONFIG_PATH, DEFAULT_LISTEN_ADDR, DEFAULT_SHADOW_PATH,
};
use warden_daemon::server::DaemonServer;
use warden_daemon::supervisor::Supervisor;

use crate::logging::setup_logging;

/// Keeps declared applications and the live process table in line:
/// scan, correlate, launch, capture output, kill — behind a
/// token-guarded API.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the operation surface.
    Run(RunArgs),
    /// Print a shadow line for a new account and exit.
    Register(RegisterArgs),
    /// Print the live process table and exit.
    Scan,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Address the daemon listens on.
    #[arg(long, env = "WARDEN_LISTEN", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: SocketAddr,

    /// The application catalog.
    #[arg(long, env = "WARDEN_APP_CONFIG", default_value = DEFAULT_APP_CONFIG_PATH)]
    pub app_config: PathBuf,

    /// The shadow file holding `username:hash` records.
    #[arg(long, env = "WARDEN_SHADOW", default_value = DEFAULT_SHADOW_PATH)]
    pub shadow: PathBuf,

    /// Append logs to this file instead of stderr.
    #[arg(long, env = "WARDEN_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub password: String,
}

#[tokio::main]
pub async fn run(args: RunArgs) -> Result<()> {
    setup_logging(args.log_file.as_deref())?;

    // A broken shadow file is fatal here; a broken catalog is fatal here
    // too, but stays recoverable over the reload operation later on.
    let accounts = auth::load_accounts(&args.shadow)?;
    let catalog =
        ApplicationCatalog::load(&args.app_config).context("load application catalog")?;
    let supervisor = Supervisor::new(AuthStore::new(accounts), catalog);

    DaemonServer::bind(supervisor, args.listen)
        .await?
        .run()
        .await
}

pub fn register(args: RegisterArgs) -> Result<()> {
    let line = auth::register(&args.username, &args.password)?;
    println!("{line}");
    Ok(())
}

pub fn scan() -> Result<()> {
    for process in monitor::scan()? {
        println!("{process}");
    }
    Ok(())
}
