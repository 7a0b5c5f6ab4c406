//! HTTP request handlers.
//!
//! The ingestion endpoint is deliberately uninformative: whatever the
//! reconciler decides (applied, duplicate, rate limited, rejected,
//! dropped) the client gets `202 Accepted`, because there is nothing a
//! client can usefully do differently and a retry loop keyed off error
//! statuses would amplify exactly the bursts the coalescing window
//! absorbs. The only non-2xx is `503` when the daemon is shutting down.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use pulse_core::DayKey;
use pulse_protocol::{
    ErrorResponse, HealthResponse, SampleRequest, UsageDay, UsageRangeResponse, UsageResponse,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::reconciler::ReconcilerError;
use crate::server::auth::Caller;
use crate::server::AppState;

/// POST /api/v1/activity
///
/// Takes the raw body rather than a typed JSON extractor so a
/// malformed payload still lands in the uniform-2xx path instead of an
/// axum rejection.
pub async fn ingest_activity(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Response {
    let received_at = Utc::now();

    let request: SampleRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "Malformed activity payload, ignoring");
            return StatusCode::ACCEPTED.into_response();
        }
    };

    let sample = match request.into_sample(
        state.telemetry.report_ceiling_secs,
        caller.user_id().cloned(),
        received_at,
    ) {
        Ok(sample) => sample,
        Err(err) => {
            debug!(error = %err, "Invalid activity sample, ignoring");
            return StatusCode::ACCEPTED.into_response();
        }
    };

    match state.reconciler.ingest(sample, received_at).await {
        Ok(outcome) => {
            debug!(outcome = outcome.label(), "Sample reconciled");
            StatusCode::ACCEPTED.into_response()
        }
        Err(ReconcilerError::ChannelClosed) => {
            warn!("Ingest refused: reconciler is gone");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        Err(err) => {
            warn!(error = %err, "Ingest failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

/// GET /api/v1/usage/:day
pub async fn get_usage_day(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(day): Path<String>,
) -> Response {
    let Some(user) = caller.user_id() else {
        return unauthorized();
    };
    let Ok(day) = day.parse::<NaiveDate>() else {
        return bad_request("day must be YYYY-MM-DD");
    };

    let key = DayKey::new(user.clone(), day);
    match state.reconciler.get_usage(key).await {
        Ok(entry) => Json(UsageResponse::from_entry(day, entry.as_ref())).into_response(),
        Err(err) => unavailable(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// GET /api/v1/usage?from=YYYY-MM-DD&to=YYYY-MM-DD
pub async fn get_usage_range(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<RangeParams>,
) -> Response {
    let Some(user) = caller.user_id() else {
        return unauthorized();
    };
    if params.from > params.to {
        return bad_request("from must not be after to");
    }

    match state
        .reconciler
        .get_usage_range(user.clone(), params.from, params.to)
        .await
    {
        Ok(days) => {
            let days = days
                .into_iter()
                .map(|(day, usage)| UsageDay {
                    day,
                    total_active_seconds: usage.total_active_seconds,
                })
                .collect();
            Json(UsageRangeResponse {
                from: params.from,
                to: params.to,
                days,
            })
            .into_response()
        }
        Err(err) => unavailable(err),
    }
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("authentication required")),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

fn unavailable(err: ReconcilerError) -> Response {
    warn!(error = %err, "Usage query failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::new("service unavailable")),
    )
        .into_response()
}
