use crate::ApiState;
use crate::auth::{AuthUser, auth_error_to_response};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use csms_core::{
    ChargingSession, EndSession, FilteredSessions, PaymentMethod, Period, SessionError,
    SessionFilter, SessionStatus, StartSession, Vehicle,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub message: String,
    pub session_id: u64,
    pub vehicle: Vehicle,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub session_id: u64,
    pub soc_end: f64,
    pub unit_kwh: f64,
    pub price_paid: f64,
    pub payment_method: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionResponse {
    pub message: String,
    pub session: ChargingSession,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn session_error_to_response(
    error: SessionError,
) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        SessionError::Validation { .. } | SessionError::UnknownStation { .. } => {
            StatusCode::BAD_REQUEST
        }
        SessionError::SessionNotFound { .. } | SessionError::VehicleNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        SessionError::AlreadyCompleted { .. } | SessionError::AlreadyInProgress { .. } => {
            StatusCode::CONFLICT
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub(crate) fn validation_response(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    session_error_to_response(SessionError::Validation {
        message: message.into(),
    })
}

/// Treat an absent or literal "all" value as "no restriction".
fn normalize_all(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.eq_ignore_ascii_case("all"))
}

/// Open a new charging session
pub async fn start_session(
    State(state): State<ApiState>,
    user: AuthUser,
    Json(payload): Json<StartSession>,
) -> impl IntoResponse {
    if let Err(error) = user.ensure_station(&payload.station_name) {
        return auth_error_to_response(error).into_response();
    }

    let mut store = state.store.lock().unwrap();
    let session = match store.start_session(payload) {
        Ok(session) => session,
        Err(error) => return session_error_to_response(error).into_response(),
    };
    match store.get_vehicle(&session.vehicle_no) {
        Ok(vehicle) => (
            StatusCode::CREATED,
            Json(StartSessionResponse {
                message: "Session started".to_string(),
                session_id: session.session_id,
                vehicle,
            }),
        )
            .into_response(),
        Err(error) => session_error_to_response(error).into_response(),
    }
}

/// Complete an in-progress session
pub async fn end_session(
    State(state): State<ApiState>,
    user: AuthUser,
    Json(payload): Json<EndSessionRequest>,
) -> impl IntoResponse {
    let payment_method = match PaymentMethod::from_str(&payload.payment_method) {
        Ok(method) => method,
        Err(_) => {
            return validation_response("Payment method must be Cash or QR").into_response();
        }
    };

    let mut store = state.store.lock().unwrap();
    // The station scope check needs the session's station before the
    // transition runs
    let session = match store.get_session(payload.session_id) {
        Ok(session) => session,
        Err(error) => return session_error_to_response(error).into_response(),
    };
    if let Err(error) = user.ensure_station(&session.station_name) {
        return auth_error_to_response(error).into_response();
    }

    match store.end_session(EndSession {
        session_id: payload.session_id,
        soc_end: payload.soc_end,
        unit_kwh: payload.unit_kwh,
        price_paid: payload.price_paid,
        payment_method,
    }) {
        Ok(session) => (
            StatusCode::OK,
            Json(EndSessionResponse {
                message: "Session ended".to_string(),
                session,
            }),
        )
            .into_response(),
        Err(error) => session_error_to_response(error).into_response(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    pub station_name: Option<String>,
    pub status: Option<String>,
}

/// Plain station/status listing, newest first
pub async fn list_sessions(
    State(state): State<ApiState>,
    user: AuthUser,
    Query(query): Query<ListSessionsQuery>,
) -> impl IntoResponse {
    let mut station_name = normalize_all(query.station_name);
    if let Some(assigned) = user.station_scope() {
        if let Some(requested) = &station_name {
            if let Err(error) = user.ensure_station(requested) {
                return auth_error_to_response(error).into_response();
            }
        }
        station_name = Some(assigned.to_string());
    }

    let status = match normalize_all(query.status) {
        Some(raw) => match SessionStatus::from_str(&raw) {
            Ok(status) => Some(status),
            Err(message) => return validation_response(message).into_response(),
        },
        None => None,
    };

    let store = state.store.lock().unwrap();
    Json(store.list_sessions(station_name.as_deref(), status)).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredSessionsQuery {
    pub station_name: Option<String>,
    pub vehicle_no: Option<String>,
    pub payment_method: Option<String>,
    pub period: Option<String>,
    pub status: Option<String>,
}

/// Ad-hoc session query with a summary over the matched set
pub async fn filtered_sessions(
    State(state): State<ApiState>,
    user: AuthUser,
    Query(query): Query<FilteredSessionsQuery>,
) -> impl IntoResponse {
    let mut station_name = normalize_all(query.station_name);
    if let Some(assigned) = user.station_scope() {
        if let Some(requested) = &station_name {
            if let Err(error) = user.ensure_station(requested) {
                return auth_error_to_response(error).into_response();
            }
        }
        station_name = Some(assigned.to_string());
    }

    let payment_method = match normalize_all(query.payment_method) {
        Some(raw) => match PaymentMethod::from_str(&raw) {
            Ok(method) => Some(method),
            Err(message) => return validation_response(message).into_response(),
        },
        None => None,
    };
    let status = match normalize_all(query.status) {
        Some(raw) => match SessionStatus::from_str(&raw) {
            Ok(status) => Some(status),
            Err(message) => return validation_response(message).into_response(),
        },
        None => None,
    };
    let period = match query.period {
        Some(raw) => match Period::from_str(&raw) {
            Ok(period) => period,
            Err(message) => return validation_response(message).into_response(),
        },
        None => Period::All,
    };

    let filter = SessionFilter {
        station_name,
        vehicle_no: query.vehicle_no.filter(|v| !v.trim().is_empty()),
        payment_method,
        status,
        period,
    };

    let store = state.store.lock().unwrap();
    let result: FilteredSessions = store.filtered_sessions(&filter, Utc::now());
    Json(result).into_response()
}
