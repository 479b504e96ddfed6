use anyhow::Result;
use dbcheckpoint::*;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let retention_days = app_config.retention_days()?;
    let (tx, _) =
        broadcast::channel::<models::Sample>(app_config.collection.broadcast_capacity);

    let store = Arc::new(
        store::Store::connect(
            &app_config.database.path,
            retention_days,
            app_config.database.max_pool_size,
        )
        .await?,
    );
    store.init().await?;

    let conditions = app_config.conditions();
    for c in &conditions {
        if let Err(e) = alert::expr::parse(&c.expression) {
            tracing::warn!(error = %e, condition_id = c.id, "alert condition will never fire");
        }
    }
    store.sync_conditions(&conditions).await?;

    let custom_metrics: Vec<_> = app_config
        .custom_metrics
        .iter()
        .filter(|m| m.enabled)
        .cloned()
        .collect();
    let registry = Arc::new(metrics::MetricRegistry::with_custom_metrics(&custom_metrics));
    tracing::info!(
        metrics = registry.len(),
        custom_metrics = custom_metrics.len(),
        alert_conditions = conditions.len(),
        "metric registry ready"
    );

    let collector = Arc::new(cycle::Collector::new(
        source::CommandSource::new(&app_config.source),
        notify::AppNotifier::from_config(&app_config.notify)?,
        store.clone(),
        registry.clone(),
        custom_metrics,
        cycle::CycleSettings {
            fetch_timeout: Duration::from_secs(app_config.collection.fetch_timeout_secs),
            monitored_name: app_config.collection.monitored_name.clone(),
            send_ok: app_config.notify.send_ok,
        },
    ));

    let ws_sample_connections = Arc::new(AtomicUsize::new(0));
    let stats = Arc::new(worker::WorkerStats::default());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            collector,
            tx: tx.clone(),
            ws_sample_connections: ws_sample_connections.clone(),
            stats: stats.clone(),
            shutdown_rx,
        },
        worker::WorkerConfig {
            interval_secs: app_config.collection.interval_secs,
            schedule: app_config.collection.schedule.clone(),
            stats_log_interval_secs: app_config.collection.stats_log_interval_secs,
        },
    );

    maintenance_worker::spawn(
        store.clone(),
        maintenance_worker::MaintenanceConfig {
            vacuum_schedule: app_config.database.vacuum_schedule.clone(),
            vacuum_interval_secs: app_config.database.vacuum_interval_secs,
        },
    );

    let reporter = Arc::new(report::Reporter::new(
        store.clone(),
        registry.clone(),
        app_config.report.clone(),
    ));
    let app = routes::app(tx, store, registry, reporter, ws_sample_connections, stats);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = worker_handle.await;
        }
    }

    Ok(())
}
