use crate::ApiState;
use crate::auth::{AuthUser, auth_error_to_response};
use crate::session::session_error_to_response;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// Autocomplete search over vehicle number and name
pub async fn search_vehicles(
    State(state): State<ApiState>,
    _user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();
    Json(store.search_vehicles(&query.query))
}

/// Look up a single vehicle record
pub async fn get_vehicle(
    State(state): State<ApiState>,
    _user: AuthUser,
    Path(vehicle_no): Path<String>,
) -> impl IntoResponse {
    let store = state.store.lock().unwrap();
    match store.get_vehicle(&vehicle_no) {
        Ok(vehicle) => Json(vehicle).into_response(),
        Err(error) => session_error_to_response(error).into_response(),
    }
}

/// Full session history for a vehicle, manager only
pub async fn vehicle_history(
    State(state): State<ApiState>,
    user: AuthUser,
    Path(vehicle_no): Path<String>,
) -> impl IntoResponse {
    if let Err(error) = user.ensure_manager() {
        return auth_error_to_response(error).into_response();
    }

    let store = state.store.lock().unwrap();
    Json(store.vehicle_history(&vehicle_no)).into_response()
}
