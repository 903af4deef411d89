use anyhow::Result;
use diskfree::announcer::{Announcer, SpeechConfig, SpeechQueue};
use diskfree::history::RecordStore;
use diskfree::models::VolumeClass;
use diskfree::poller::{self, Poller, PollerDeps, PollerStats};
use diskfree::preferences::PreferencesStore;
use diskfree::report_hub::{ReportHub, ReportSink};
use diskfree::volume_source::SystemVolumeSource;
use diskfree::*;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

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

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
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
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let preferences = Arc::new(PreferencesStore::load(&app_config.preferences_path()).await);
    let hub = Arc::new(ReportHub::new(app_config.publishing.broadcast_capacity));

    let (speech, speech_handle) = SpeechQueue::spawn(SpeechConfig {
        command: app_config
            .announcer
            .enabled
            .then(|| app_config.announcer.command.clone()),
        timeout: Duration::from_secs(app_config.announcer.timeout_secs),
    });
    let announcer: Arc<dyn Announcer> = Arc::new(speech);
    let sink: Arc<dyn ReportSink> = hub.clone();
    let source = Arc::new(SystemVolumeSource::new(Duration::from_secs(
        app_config.monitoring.command_timeout_secs,
    )));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut poller_handles = Vec::new();
    let mut writer_handles = Vec::new();
    let mut all_stats = Vec::new();

    for class in [VolumeClass::Local, VolumeClass::Network] {
        let records = Arc::new(RecordStore::for_class(
            &app_config.storage.data_dir,
            class,
            app_config.storage.record_format,
        ));
        let stats = Arc::new(PollerStats::default());
        let (write_tx, write_rx) = mpsc::channel(app_config.publishing.writer_channel_capacity);
        writer_handles.push(poller::spawn_record_writer(
            write_rx,
            records.clone(),
            stats.clone(),
        ));
        let poller = Poller::new(
            class,
            PollerDeps {
                source: source.clone(),
                preferences: preferences.clone(),
                sink: sink.clone(),
                announcer: announcer.clone(),
                write_tx,
                stats: stats.clone(),
            },
        );
        poller_handles.push(poller::spawn(poller, records, cancel_rx.clone()));
        all_stats.push((class, stats));
    }
    let stats_handle = poller::spawn_stats_logger(
        all_stats,
        Duration::from_secs(app_config.monitoring.stats_log_interval_secs),
        cancel_rx,
    );
    // Pollers hold the remaining announcer handles; the queue closes after they exit.
    drop(announcer);

    let app = routes::app(hub, preferences, Arc::new(AtomicUsize::new(0)));
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
    }

    let _ = cancel_tx.send(true);
    for handle in poller_handles {
        let _ = handle.await;
    }
    // Writers exit after saving whatever the pollers queued last.
    for handle in writer_handles {
        let _ = handle.await;
    }
    let _ = stats_handle.await;
    let _ = speech_handle.await;
    Ok(())
}
