use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pvs_bus::RedisBus;
use pvs_crypto::CredentialCipher;
use pvs_dedup::{Deduplicator, EventMaterializer};
use pvs_model::{InferenceDispatcher, SharedModel};
use pvs_store::PostgresStore;
use pvs_types::WorkerConfig;
use pvs_worker::{CameraSupervisor, NullDecoder, NullDetector, WorkerDeps};
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    let _guard = env_tracing_logger::init();

    let config = Arc::new(WorkerConfig::parse());
    info!("starting pvs-worker");

    let store = Arc::new(PostgresStore::connect(&config.database_url).await?);
    let bus = Arc::new(RedisBus::connect(&config.redis_url).await?);
    let cipher = Arc::new(CredentialCipher::from_env(&config.credential_key_env)?);

    let model = Arc::new(SharedModel::spawn(Box::new(NullDetector)));
    let warmup_size = config.inference_size_default_px;
    match tokio::time::timeout(
        Duration::from_secs(config.model_warmup_timeout_s),
        model.warmup(warmup_size),
    )
    .await
    {
        Ok(Ok(())) => info!("model warmup complete"),
        Ok(Err(err)) => error!(%err, "model warmup failed, continuing without it"),
        Err(_) => error!("model warmup timed out, continuing without it"),
    }
    let dispatcher = Arc::new(InferenceDispatcher::new(model));

    let dedup = Arc::new(Deduplicator::new(
        Duration::from_secs(config.dedup_cooldown_secs),
        config.dedup_grid,
    ));
    let materializer = Arc::new(EventMaterializer::new(
        dedup.clone(),
        store.clone(),
        bus.clone(),
        PathBuf::from(&config.thumbnail_dir),
    ));
    spawn_dedup_cleanup(dedup, store.clone(), Duration::from_secs(config.dedup_stale_age_secs));

    let font = pvs_frame_source::load_system_font();
    if font.is_none() {
        info!("no system font found, annotation labels will be skipped");
    }

    let deps = WorkerDeps {
        store: store.clone(),
        bus,
        dispatcher,
        materializer,
        cipher,
        decoder: Arc::new(NullDecoder),
        default_demo_url: None,
        config,
        font,
    };

    let supervisor = CameraSupervisor::new(store, deps);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let supervisor_handle = tokio::spawn(supervisor.run(shutdown_rx));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping camera workers");
    let _ = shutdown_tx.send(true);
    supervisor_handle.await?;

    info!("pvs-worker shut down cleanly");
    Ok(())
}

/// Periodically purges dedup entries older than the configured stale
/// threshold (spec.md §4.3 `cleanup_stale`), running for the lifetime of
/// the process independent of any single camera's worker task. Also prunes
/// the `event_tracking` durable projection (spec.md §9 Open Question (b))
/// on the same tick, so the two stay in sync instead of one outliving the
/// other.
fn spawn_dedup_cleanup<S>(dedup: Arc<Deduplicator>, store: Arc<S>, max_age: Duration)
where
    S: pvs_store::Store,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(max_age.max(Duration::from_secs(1)));
        let chrono_max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::seconds(300));
        loop {
            ticker.tick().await;
            let removed = dedup.cleanup_stale(max_age);
            if removed > 0 {
                tracing::debug!(removed, "purged stale dedup entries");
            }
            match store.prune_event_tracking(chrono_max_age).await {
                Ok(pruned) if pruned > 0 => tracing::debug!(pruned, "purged stale event_tracking rows"),
                Ok(_) => {}
                Err(err) => tracing::warn!(%err, "event_tracking prune failed"),
            }
        }
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
