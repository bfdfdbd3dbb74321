use std::future::Future;

use envconfig::Envconfig;
use tokio::signal::unix::{signal, SignalKind};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use telemetry_server::config::Config;
use telemetry_server::server::serve;

/// Installs the SIGTERM and SIGINT handlers and returns a future resolving on the first
/// of either.
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    let mut term = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(async move {
        let received = tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = interrupt.recv() => "SIGINT",
        };
        tracing::info!(signal = received, "stopping channels and draining HTTP connections");
    })
}

fn setup_tracing() -> anyhow::Result<()> {
    // stdout with a level configured by the RUST_LOG envvar (default=INFO)
    let log_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
            .add_directive("rumqttc=warn".parse()?),
    );

    tracing_subscriber::registry().with(log_layer).init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing()?;

    let config = Config::init_from_env()?;

    let listener = tokio::net::TcpListener::bind(config.bind()).await?;
    serve(config, listener, shutdown_signal()?).await
}
