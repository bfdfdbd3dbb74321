use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use telemetry_ingest::{
    ChannelObserver, ChannelSupervisor, EntityQuery, IngestionChannel, MessageStore,
    MqttTransport, Record, TracingObserver,
};

use crate::config::Config;
use crate::metrics::setup_metrics_recorder;
use crate::router::{self, Queries};

/// Build the channel for `R` from the environment config and register it with the
/// supervisor, returning a query handle over its store.
fn add_channel<R: Record>(
    config: &Config,
    supervisor: &mut ChannelSupervisor,
    observer: &Arc<dyn ChannelObserver>,
) -> anyhow::Result<EntityQuery<R>> {
    let channel_config = config.channel_config(R::KIND)?;
    let transport = MqttTransport::new(&channel_config, R::KIND);
    let store = Arc::new(MessageStore::<R>::new(config.retention()));

    tracing::info!(
        channel = R::KIND.as_str(),
        broker = channel_config.broker_address(),
        port = channel_config.port(),
        topic = channel_config.topic(),
        "configured ingestion channel"
    );

    let channel = IngestionChannel::new(channel_config, transport, store.clone(), observer.clone());
    supervisor.register(Arc::new(channel));

    Ok(EntityQuery::new(store))
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let observer: Arc<dyn ChannelObserver> = Arc::new(TracingObserver);
    let mut supervisor = ChannelSupervisor::new();

    let queries = Queries {
        bins: add_channel(&config, &mut supervisor, &observer)?,
        houses: add_channel(&config, &mut supervisor, &observer)?,
        streets: add_channel(&config, &mut supervisor, &observer)?,
        suburbs: add_channel(&config, &mut supervisor, &observer)?,
        driveways: add_channel(&config, &mut supervisor, &observer)?,
    };

    let metrics = if config.export_prometheus {
        Some(setup_metrics_recorder()?)
    } else {
        None
    };

    let app = router::router(queries, supervisor.clone(), metrics);

    supervisor.start_all().await;

    tracing::info!("listening on {:?}", listener.local_addr()?);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    supervisor.stop_all().await;
    tracing::info!("all channels stopped");

    Ok(served?)
}
