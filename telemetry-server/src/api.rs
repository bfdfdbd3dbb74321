use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use telemetry_ingest::{EntityKind, EntityQuery, Record};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ApiError {
    #[error("No {0} data messages received yet.")]
    NoData(EntityKind),
    #[error("No {kind} data found for id: {id}.")]
    NotFound { kind: EntityKind, id: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::NOT_FOUND, self.to_string()).into_response()
    }
}

/// Every record received for the kind, oldest first.
pub async fn list<R: Record>(
    State(query): State<EntityQuery<R>>,
) -> Result<Json<Vec<R>>, ApiError> {
    let records = query.list_all();
    if records.is_empty() {
        return Err(ApiError::NoData(R::KIND));
    }

    Ok(Json(records))
}

pub async fn latest<R: Record>(
    State(query): State<EntityQuery<R>>,
    Path(id): Path<String>,
) -> Result<Json<R>, ApiError> {
    query
        .get_latest(&id)
        .map(Json)
        .ok_or(ApiError::NotFound { kind: R::KIND, id })
}
