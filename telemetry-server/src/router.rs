use std::future::ready;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use telemetry_ingest::{
    BinRecord, ChannelSupervisor, DrivewayRecord, EntityKind, EntityQuery, HouseRecord, Record,
    StreetRecord, SuburbRecord,
};

use crate::api;
use crate::metrics::track_metrics;

/// Query handles for every entity kind served over HTTP.
#[derive(Clone)]
pub struct Queries {
    pub bins: EntityQuery<BinRecord>,
    pub houses: EntityQuery<HouseRecord>,
    pub streets: EntityQuery<StreetRecord>,
    pub suburbs: EntityQuery<SuburbRecord>,
    pub driveways: EntityQuery<DrivewayRecord>,
}

async fn index() -> &'static str {
    "telemetry-ingest"
}

async fn liveness() -> &'static str {
    "ok"
}

async fn readiness(State(supervisor): State<ChannelSupervisor>) -> impl IntoResponse {
    let health = supervisor.health();
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(health))
}

/// Path prefix of the per-kind controllers the first dashboards were built against.
fn controller_prefix(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Bin => "/api/BinData",
        EntityKind::House => "/api/HouseData",
        EntityKind::Street => "/api/StreetData",
        EntityKind::Suburb => "/api/SuburbData",
        EntityKind::Driveway => "/api/DrivewayData",
    }
}

/// `/api/{plural}` lists and `/api/{plural}/:id` fetches the latest record. The controller
/// paths `/api/{Kind}Data/latest` and `/api/{Kind}Data/:id` are served as well.
fn entity_routes<R: Record>(query: EntityQuery<R>) -> Router {
    let plural = format!("/api/{}", R::KIND.plural());
    let controller = controller_prefix(R::KIND);

    Router::new()
        .route(&plural, get(api::list::<R>))
        .route(&format!("{plural}/:id"), get(api::latest::<R>))
        .route(&format!("{controller}/latest"), get(api::list::<R>))
        .route(&format!("{controller}/:id"), get(api::latest::<R>))
        .with_state(query)
}

pub fn router(
    queries: Queries,
    supervisor: ChannelSupervisor,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let router = Router::new()
        .route("/", get(index))
        .route("/_liveness", get(liveness))
        .route("/_readiness", get(readiness))
        .with_state(supervisor)
        .merge(entity_routes(queries.bins))
        .merge(entity_routes(queries.houses))
        .merge(entity_routes(queries.streets))
        .merge(entity_routes(queries.suburbs))
        .merge(entity_routes(queries.driveways))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics));

    // The recorder is process-global, so it is installed by the caller and only when asked
    match metrics {
        Some(recorder_handle) => {
            router.route("/metrics", get(move || ready(recorder_handle.render())))
        }
        None => router,
    }
}
