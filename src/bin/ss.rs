//! Storage server binary.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scribefs::config::{self, StorageConfig};
use scribefs::storage::StorageServer;

#[derive(Parser)]
#[command(name = "scribefs-ss", about = "scribefs storage server")]
struct Args {
    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Naming server address, overriding the configuration.
    #[arg(long)]
    naming_addr: Option<String>,
    /// Address advertised for client redirects.
    #[arg(long)]
    advertise_ip: Option<String>,
    /// Base port; the client-facing listener binds one above it.
    #[arg(long)]
    base_port: Option<u16>,
    /// Root directory of the local byte store.
    #[arg(long)]
    storage_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => config::load::<StorageConfig>(path).expect("failed to load configuration"),
        None => StorageConfig::default(),
    };
    if let Some(addr) = args.naming_addr {
        cfg.naming_addr = addr;
    }
    if let Some(ip) = args.advertise_ip {
        cfg.advertise_ip = ip;
    }
    if let Some(port) = args.base_port {
        cfg.base_port = port;
    }
    if let Some(dir) = args.storage_dir {
        cfg.storage_dir = dir;
    }

    let server = StorageServer::new(cfg).expect("failed to initialize storage server");
    if let Err(err) = server.run().await {
        eprintln!("storage server terminated: {err}");
        std::process::exit(1);
    }
}
