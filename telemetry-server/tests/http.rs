use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt; // for `collect`
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`

use telemetry_ingest::{
    decode, ChannelState, ChannelSupervisor, EntityQuery, Lifecycle, MessageStore, Record,
};
use telemetry_server::router::{router, Queries};

struct FixedChannel(&'static str, ChannelState);

#[async_trait]
impl Lifecycle for FixedChannel {
    fn name(&self) -> &str {
        self.0
    }

    async fn start(&self) {}

    async fn stop(&self) {}

    fn state(&self) -> ChannelState {
        self.1
    }
}

struct Stores {
    queries: Queries,
}

impl Stores {
    fn new() -> Self {
        fn empty<R: Record>() -> EntityQuery<R> {
            EntityQuery::new(Arc::new(MessageStore::default()))
        }

        Self {
            queries: Queries {
                bins: empty(),
                houses: empty(),
                streets: empty(),
                suburbs: empty(),
                driveways: empty(),
            },
        }
    }

    fn app(&self, supervisor: ChannelSupervisor) -> Router {
        router(self.queries.clone(), supervisor, None)
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn house(id: &str, address: &str) -> String {
    format!(
        r#"{{"property_id": "{id}", "address": "{address}", "driveway_ids": "D-1",
            "location": {{"latitude": -37.8, "longitude": 144.9}}}}"#
    )
}

#[tokio::test]
async fn index_and_liveness() {
    let stores = Stores::new();

    let (status, body) = get(stores.app(ChannelSupervisor::new()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"telemetry-ingest");

    let (status, _) = get(stores.app(ChannelSupervisor::new()), "/_liveness").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn empty_lists_are_not_found() {
    let stores = Stores::new();

    for (uri, message) in [
        ("/api/bins", "No bin data messages received yet."),
        ("/api/houses", "No house data messages received yet."),
        ("/api/streets", "No street data messages received yet."),
        ("/api/suburbs", "No suburb data messages received yet."),
        ("/api/driveways", "No driveway data messages received yet."),
    ] {
        let (status, body) = get(stores.app(ChannelSupervisor::new()), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(String::from_utf8(body).unwrap(), message);
    }
}

#[tokio::test]
async fn list_and_latest_houses() {
    let stores = Stores::new();
    let houses = Arc::new(MessageStore::default());
    let mut queries = stores.queries.clone();
    queries.houses = EntityQuery::new(houses.clone());
    let app = || router(queries.clone(), ChannelSupervisor::new(), None);

    houses.insert(decode(house("P-1", "1 Old Rd").as_bytes()).unwrap());
    houses.insert(decode(house("P-2", "2 Other St").as_bytes()).unwrap());
    houses.insert(decode(house("P-1", "1 New Rd").as_bytes()).unwrap());

    let (status, body) = get(app(), "/api/houses").await;
    assert_eq!(status, StatusCode::OK);
    let list: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 3);
    assert_eq!(list[0]["address"], "1 Old Rd");
    assert_eq!(list[0]["driveway_ids"], serde_json::json!(["D-1"]));

    let (status, body) = get(app(), "/api/houses/P-1").await;
    assert_eq!(status, StatusCode::OK);
    let latest: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(latest["address"], "1 New Rd");

    let (status, body) = get(app(), "/api/houses/P-404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "No house data found for id: P-404."
    );
}

#[tokio::test]
async fn controller_paths_serve_the_same_data() {
    let stores = Stores::new();
    let houses = Arc::new(MessageStore::default());
    let mut queries = stores.queries.clone();
    queries.houses = EntityQuery::new(houses.clone());
    let app = || router(queries.clone(), ChannelSupervisor::new(), None);

    let (status, body) = get(app(), "/api/HouseData/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "No house data messages received yet."
    );

    houses.insert(decode(house("P-1", "1 Old Rd").as_bytes()).unwrap());
    houses.insert(decode(house("P-1", "1 New Rd").as_bytes()).unwrap());

    let (status, body) = get(app(), "/api/HouseData/latest").await;
    assert_eq!(status, StatusCode::OK);
    let list: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 2);

    let (status, body) = get(app(), "/api/HouseData/P-1").await;
    assert_eq!(status, StatusCode::OK);
    let latest: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(latest["address"], "1 New Rd");

    let (status, _) = get(app(), "/api/BinData/B-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn readiness_requires_every_channel_subscribed() {
    let stores = Stores::new();

    let (status, _) = get(stores.app(ChannelSupervisor::new()), "/_readiness").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let mut supervisor = ChannelSupervisor::new();
    supervisor.register(Arc::new(FixedChannel("bin", ChannelState::Subscribed)));
    supervisor.register(Arc::new(FixedChannel("house", ChannelState::Connecting)));

    let (status, body) = get(stores.app(supervisor), "/_readiness").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["healthy"], false);
    assert_eq!(health["channels"]["house"], "connecting");

    let mut supervisor = ChannelSupervisor::new();
    supervisor.register(Arc::new(FixedChannel("bin", ChannelState::Subscribed)));

    let (status, _) = get(stores.app(supervisor), "/_readiness").await;
    assert_eq!(status, StatusCode::OK);
}
