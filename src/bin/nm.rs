//! Naming server binary.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scribefs::config::{self, NamingConfig};
use scribefs::naming::NamingServer;

#[derive(Parser)]
#[command(name = "scribefs-nm", about = "scribefs naming server")]
struct Args {
    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Listen address, overriding the configuration.
    #[arg(long)]
    bind: Option<String>,
    /// Access-control persistence file, overriding the configuration.
    #[arg(long)]
    access_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => config::load::<NamingConfig>(path).expect("failed to load configuration"),
        None => NamingConfig::default(),
    };
    if let Some(bind) = args.bind {
        cfg.bind = bind;
    }
    if let Some(path) = args.access_file {
        cfg.access_file = path;
    }

    let server = NamingServer::new(cfg).expect("failed to initialize naming server");
    if let Err(err) = server.run().await {
        eprintln!("naming server terminated: {err}");
        std::process::exit(1);
    }
}
