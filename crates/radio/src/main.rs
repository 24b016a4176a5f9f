mod config;
mod console;
mod state;
mod watch;

use config::{config_path_from_env, load_or_create_config, resolve_path};
use state::RadioState;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let songs_root = resolve_path(&config_path, &config.songs_path);
    if !songs_root.exists() {
        std::fs::create_dir_all(&songs_root)?;
        info!("Created songs folder at {}", songs_root.display());
    }
    if config.remove_base_songs {
        info!("Base songs removed from the queue");
    }

    let state = RadioState::new(config, songs_root);
    state.transport.play();

    let initial = state.clone();
    tokio::spawn(async move {
        initial.orchestrator.reload().await;
    });
    watch::configure_watcher(&state);

    tokio::select! {
        _ = console::run(state.clone()) => info!("Console closed."),
        _ = shutdown_signal() => {},
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
