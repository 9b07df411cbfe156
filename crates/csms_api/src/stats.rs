use crate::ApiState;
use crate::auth::{AuthUser, auth_error_to_response};
use crate::session::validation_response;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use csms_core::Period;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub period: Option<String>,
}

/// Per-station rollup for a period window
pub async fn station_stats(
    State(state): State<ApiState>,
    user: AuthUser,
    Path(station_name): Path<String>,
    Query(query): Query<StatsQuery>,
) -> impl IntoResponse {
    if let Err(error) = user.ensure_station(&station_name) {
        return auth_error_to_response(error).into_response();
    }
    let period = match query.period {
        Some(raw) => match Period::from_str(&raw) {
            Ok(period) => period,
            Err(message) => return validation_response(message).into_response(),
        },
        None => Period::All,
    };

    let store = state.store.lock().unwrap();
    Json(store.station_stats(&station_name, period, Utc::now())).into_response()
}

/// All-time network rollup, manager only
pub async fn network_aggregates(
    State(state): State<ApiState>,
    user: AuthUser,
) -> impl IntoResponse {
    if let Err(error) = user.ensure_manager() {
        return auth_error_to_response(error).into_response();
    }

    let store = state.store.lock().unwrap();
    Json(store.network_aggregates()).into_response()
}
