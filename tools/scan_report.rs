use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use codecs::ProbeDecoder;
use library::{LoaderSettings, MemoryTransport, Orchestrator};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Loads a songs folder once and prints what ended up in the queue.
/// Disposable duplicates are deleted just like in the player.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let songs_root = args
        .next()
        .or_else(|| env::var("SONGS_ROOT").ok())
        .ok_or("SONGS_ROOT not set and no path argument")?;
    let max_concurrent_loads = match args.next() {
        Some(value) => value.parse::<usize>()?,
        None => LoaderSettings::default().max_concurrent_loads,
    };

    let settings = LoaderSettings {
        max_concurrent_loads,
        ..LoaderSettings::default()
    };
    let transport = Arc::new(MemoryTransport::new(Vec::new()));
    let orchestrator = Orchestrator::new(
        PathBuf::from(&songs_root),
        settings,
        Arc::new(ProbeDecoder::new()),
        transport.clone(),
    );

    let summary = orchestrator.reload().await;
    info!("Scanned {}", songs_root);
    for (idx, track) in transport.snapshot().iter().enumerate() {
        println!("{:>4} {}", idx, track.display_key());
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
