//! CSMS API Library
//!
//! This library provides the HTTP API for the Charging Station Management
//! Service: session lifecycle, station statistics, vehicle registry and the
//! auth gate in front of them.

mod auth;
mod session;
mod stats;
mod vehicle;

pub use auth::AuthGate;

use axum::{
    Router,
    routing::{get, post},
};
use csms_core::SessionStore;
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;

/// Shared application state: the session store behind a single-writer lock,
/// and the token gate.
#[derive(Clone)]
pub struct ApiState {
    store: Arc<Mutex<SessionStore>>,
    auth: Arc<AuthGate>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Create the application router with all endpoints
pub fn create_app(store: SessionStore, auth: AuthGate) -> Router {
    let state = ApiState {
        store: Arc::new(Mutex::new(store)),
        auth: Arc::new(auth),
    };
    Router::new()
        .route("/health", get(health_check))
        .route("/login", post(auth::login))
        .route("/sessions/start", post(session::start_session))
        .route("/sessions/end", post(session::end_session))
        .route("/sessions", get(session::list_sessions))
        .route("/sessions/filtered", get(session::filtered_sessions))
        .route("/stats/station/{station_name}", get(stats::station_stats))
        .route("/reports/aggregates", get(stats::network_aggregates))
        .route("/vehicles/search", get(vehicle::search_vehicles))
        .route("/vehicles/{vehicle_no}", get(vehicle::get_vehicle))
        .route(
            "/vehicles/{vehicle_no}/history",
            get(vehicle::vehicle_history),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, Response, StatusCode},
    };
    use csms_core::{AuthConfig, NetworkConfig, Role, UserAccount};
    use serde::Serialize;
    use serde::de::DeserializeOwned;
    use tower::util::ServiceExt;

    pub fn network_config() -> NetworkConfig {
        NetworkConfig {
            network_id: "TEST_NETWORK".into(),
            stations: vec!["Nagdhunga".into(), "Jamune".into()],
            auth: AuthConfig {
                jwt_secret: "test-secret".into(),
                token_ttl_hours: 24,
                users: vec![
                    UserAccount {
                        username: "manager".into(),
                        password_hash: bcrypt::hash("admin123", 4).unwrap(),
                        role: Role::Manager,
                    },
                    UserAccount {
                        username: "op_nagdhunga".into(),
                        password_hash: bcrypt::hash("pass123", 4).unwrap(),
                        role: Role::Operator("Nagdhunga".into()),
                    },
                    UserAccount {
                        username: "op_jamune".into(),
                        password_hash: bcrypt::hash("pass123", 4).unwrap(),
                        role: Role::Operator("Jamune".into()),
                    },
                ],
            },
        }
    }

    pub fn test_app() -> Router {
        let config = network_config();
        let auth = AuthGate::new(&config.auth);
        create_app(SessionStore::new(config), auth)
    }

    pub async fn post_json(
        app: &Router,
        uri: &str,
        token: Option<&str>,
        body: &impl Serialize,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        app.clone()
            .oneshot(
                builder
                    .body(Body::from(serde_json::to_string(body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        app.clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn body_json<T: DeserializeOwned>(response: Response<Body>) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn login(app: &Router, username: &str, password: &str) -> String {
        let response = post_json(
            app,
            "/login",
            None,
            &serde_json::json!({ "username": username, "password": password }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: crate::auth::LoginResponse = body_json(response).await;
        body.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{EndSessionResponse, StartSessionResponse};
    use crate::test_util::{body_json, get, login, post_json, test_app};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use csms_core::{SessionStatus, StationStats};
    use serde_json::json;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_bad_credentials() {
        let app = test_app();
        let response = post_json(
            &app,
            "/login",
            None,
            &json!({ "username": "manager", "password": "wrong" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_integration_operator_session_lifecycle() {
        let app = test_app();
        let token = login(&app, "op_nagdhunga", "pass123").await;

        // Start a session at the operator's own station
        let response = post_json(
            &app,
            "/sessions/start",
            Some(&token),
            &json!({
                "vehicleNo": "BA 1 PA 1234",
                "stationName": "Nagdhunga",
                "socStart": 20.0,
                "vehicleName": "Tata Nexon EV"
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let started: StartSessionResponse = body_json(response).await;

        // Complete it
        let response = post_json(
            &app,
            "/sessions/end",
            Some(&token),
            &json!({
                "sessionId": started.session_id,
                "socEnd": 80.0,
                "unitKwh": 25.5,
                "pricePaid": 500.0,
                "paymentMethod": "Cash"
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let ended: EndSessionResponse = body_json(response).await;
        assert_eq!(ended.session.status, SessionStatus::Completed);
        assert_eq!(ended.session.calculated_cost_rs, Some(500.0));

        // The completion shows up in the station rollup
        let response = get(&app, "/stats/station/Nagdhunga", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let stats: StationStats = body_json(response).await;
        assert_eq!(stats.stats.total_sessions, 1);
        assert_eq!(stats.stats.total_earnings, 500.0);
    }

    #[tokio::test]
    async fn test_integration_operator_cannot_cross_stations() {
        let app = test_app();
        let manager = login(&app, "manager", "admin123").await;
        let op_jamune = login(&app, "op_jamune", "pass123").await;

        // Manager opens a session at Nagdhunga
        let response = post_json(
            &app,
            "/sessions/start",
            Some(&manager),
            &json!({
                "vehicleNo": "BA 1 PA 1234",
                "stationName": "Nagdhunga",
                "socStart": 20.0
            }),
        )
        .await;
        let started: StartSessionResponse = body_json(response).await;

        // The Jamune operator may not complete it
        let response = post_json(
            &app,
            "/sessions/end",
            Some(&op_jamune),
            &json!({
                "sessionId": started.session_id,
                "socEnd": 80.0,
                "unitKwh": 25.5,
                "pricePaid": 500.0,
                "paymentMethod": "Cash"
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // And the record is untouched
        let response = get(&app, "/sessions?status=IN_PROGRESS", Some(&manager)).await;
        let sessions: Vec<csms_core::ChargingSession> = body_json(response).await;
        assert_eq!(sessions.len(), 1);
    }
}
