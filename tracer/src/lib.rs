use tracing::subscriber::set_global_default;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

/// Installs a process-wide tracing subscriber. Every node process (Chord or
/// Pastry) calls this once on startup before spawning any tasks.
pub fn init_tracing(service_name: &'static str, log_level: Option<&str>) {
    let env_filter = EnvFilter::new(log_level.unwrap_or("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_names(true);

    let subscriber = Registry::default().with(env_filter).with(fmt_layer);
    set_global_default(subscriber).unwrap_or_else(|_| {
        log::debug!("tracing subscriber for {service_name} already set, skipping");
    });
    let _ = tracing_log::LogTracer::init();
}
