//! mirrorsync daemon: watch a set of directories and mirror their
//! changes into a target directory.

use clap::Parser;
use mirrorsync::cli::Args;
use mirrorsync::sync::{start_all, SyncOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let code = start_all(SyncOptions::from(args)).await;
    std::process::exit(code);
}
