// crates/warden-daemon/src/main.rs
//
// Binary entrypoint for the Warden daemon.
//
// Initializes tracing, parses CLI arguments, loads configuration, resolves
// the local identity, then replays a dry-run fixture through the
// coordinator and prints the resulting policy decisions as JSON.

use clap::Parser;

use warden_daemon::{expand_tilde, replay, resolve_local_id, Fixture, WardenConfig};

/// Warden daemon: replication and trust policy coordinator.
#[derive(Parser, Debug)]
#[command(name = "warden-daemon", version = "0.1.0", about = "Warden replication policy coordinator (dry run)")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.warden/config.toml")]
    config: String,

    /// JSON fixture to replay.
    #[arg(long)]
    fixture: String,

    /// Local feed identity, overriding the config and fixture.
    #[arg(long)]
    local_id: Option<String>,

    /// Prune pub peers whose announcers are no longer replicated.
    #[arg(long)]
    prune: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = expand_tilde(&args.config);
    let loaded = WardenConfig::load(&config_path);
    let mut config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => WardenConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", config_path),
        Err(e) => tracing::warn!("Could not load config: {}. Using defaults.", e),
    }

    // CLI flags override the config file.
    if args.prune {
        config.gossip.prune = true;
    }
    if args.local_id.is_some() {
        config.local_id = args.local_id.clone();
    }

    let fixture = Fixture::load(&expand_tilde(&args.fixture))?;
    let local = resolve_local_id(&config, &fixture)?;

    tracing::info!("Warden daemon v0.1.0");
    tracing::info!("Local identity: {}", local);
    tracing::info!(
        "Replicating up to {} hops, discovery after {}s (prune={})",
        config.hops,
        config.discovery_delay_secs,
        config.gossip.prune
    );

    tokio::select! {
        report = replay(fixture, local, &config) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
