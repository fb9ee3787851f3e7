use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use voxrelay::cli::Cli;
use voxrelay::config::Config;
use voxrelay::engines::mock::MockEngineProvider;
use voxrelay::engines::{EngineSlots, EvictionPolicy};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_env_overrides();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let policy = if cli.keep_resident {
        EvictionPolicy::KeepResident
    } else {
        EvictionPolicy::ExclusiveResidency
    };

    // Engine runtimes are integration points: downstream builds provide a
    // real EngineProvider. The stock binary serves loopback engines so the
    // wire protocol can be exercised end to end.
    tracing::warn!("no engine runtime linked, serving loopback engines");
    let slots = Arc::new(EngineSlots::new(Arc::new(MockEngineProvider::new()), policy));

    voxrelay::server::serve(config, slots).await
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
