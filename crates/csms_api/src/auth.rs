use crate::ApiState;
use crate::session::ErrorResponse;
use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use csms_core::{AuthConfig, Role, UserAccount};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    // One message for unknown user and wrong password, to avoid
    // user enumeration
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Authorization token is missing")]
    MissingToken,
    #[error("Authorization token is invalid")]
    InvalidToken,
    #[error("Could not issue a token")]
    TokenCreation,
    #[error("{message}")]
    Forbidden { message: String },
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::TokenCreation => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }
}

pub(crate) fn auth_error_to_response(error: AuthError) -> (StatusCode, Json<ErrorResponse>) {
    (
        error.status(),
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Issues and validates the bearer tokens carried by every request.
pub struct AuthGate {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    users: HashMap<String, UserAccount>,
}

impl AuthGate {
    pub fn new(config: &AuthConfig) -> Self {
        AuthGate {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl: Duration::hours(config.token_ttl_hours),
            users: config
                .users
                .iter()
                .map(|account| (account.username.clone(), account.clone()))
                .collect(),
        }
    }

    /// Verify credentials and mint a signed token carrying the role.
    pub fn login(&self, username: &str, password: &str) -> Result<(String, Role), AuthError> {
        let Some(account) = self.users.get(username) else {
            return Err(AuthError::InvalidCredentials);
        };
        if !bcrypt::verify(password, &account.password_hash).unwrap_or(false) {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let claims = Claims {
            sub: account.username.clone(),
            role: account.role.to_string(),
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenCreation)?;

        tracing::info!("User {} logged in as {}", account.username, account.role);
        Ok((token, account.role.clone()))
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| AuthError::InvalidToken)?;
        let role =
            Role::try_from(data.claims.role).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthUser {
            username: data.claims.sub,
            role,
        })
    }
}

/// Authenticated identity extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// The station operator queries are forced to, `None` for managers.
    pub fn station_scope(&self) -> Option<&str> {
        self.role.station_scope()
    }

    /// Reject operators acting on a station other than their own.
    pub fn ensure_station(&self, station_name: &str) -> Result<(), AuthError> {
        match self.role.station_scope() {
            Some(assigned) if assigned != station_name => Err(AuthError::Forbidden {
                message: format!("You can only operate the {} station", assigned),
            }),
            _ => Ok(()),
        }
    }

    pub fn ensure_manager(&self) -> Result<(), AuthError> {
        if self.role.is_manager() {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                message: "Manager role required".to_string(),
            })
        }
    }
}

impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| auth_error_to_response(AuthError::MissingToken))?;

        state.auth.verify(token).map_err(auth_error_to_response)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: Role,
}

/// Exchange credentials for a bearer token
pub async fn login(
    State(state): State<ApiState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    match state.auth.login(&payload.username, &payload.password) {
        Ok((token, role)) => (
            StatusCode::OK,
            Json(LoginResponse {
                token,
                username: payload.username,
                role,
            }),
        )
            .into_response(),
        Err(error) => auth_error_to_response(error).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_auth_config(token_ttl_hours: i64) -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".into(),
            token_ttl_hours,
            users: vec![
                UserAccount {
                    username: "manager".into(),
                    password_hash: bcrypt::hash("admin123", 4).unwrap(),
                    role: Role::Manager,
                },
                UserAccount {
                    username: "op_jamune".into(),
                    password_hash: bcrypt::hash("pass123", 4).unwrap(),
                    role: Role::Operator("Jamune".into()),
                },
            ],
        }
    }

    #[test]
    fn test_login_and_verify_round_trip() {
        let gate = AuthGate::new(&test_auth_config(24));

        let (token, role) = gate.login("op_jamune", "pass123").unwrap();
        assert_eq!(role, Role::Operator("Jamune".into()));

        let user = gate.verify(&token).unwrap();
        assert_eq!(user.username, "op_jamune");
        assert_eq!(user.station_scope(), Some("Jamune"));
    }

    #[test]
    fn test_login_rejects_bad_credentials_uniformly() {
        let gate = AuthGate::new(&test_auth_config(24));

        let wrong_password = gate.login("manager", "nope").unwrap_err();
        let unknown_user = gate.login("ghost", "nope").unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_verify_rejects_garbage_and_foreign_tokens() {
        let gate = AuthGate::new(&test_auth_config(24));
        assert!(matches!(
            gate.verify("not-a-token"),
            Err(AuthError::InvalidToken)
        ));

        let other = AuthGate::new(&AuthConfig {
            jwt_secret: "other-secret".into(),
            ..test_auth_config(24)
        });
        let (token, _) = other.login("manager", "admin123").unwrap();
        assert!(matches!(gate.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let gate = AuthGate::new(&test_auth_config(-2));
        let (token, _) = gate.login("manager", "admin123").unwrap();
        assert!(matches!(gate.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_station_scope_checks() {
        let operator = AuthUser {
            username: "op_jamune".into(),
            role: Role::Operator("Jamune".into()),
        };
        assert!(operator.ensure_station("Jamune").is_ok());
        let error = operator.ensure_station("Nagdhunga").unwrap_err();
        assert_eq!(error.status(), StatusCode::FORBIDDEN);
        assert!(operator.ensure_manager().is_err());

        let manager = AuthUser {
            username: "manager".into(),
            role: Role::Manager,
        };
        assert!(manager.ensure_station("Nagdhunga").is_ok());
        assert!(manager.ensure_station("Jamune").is_ok());
        assert!(manager.ensure_manager().is_ok());
    }
}
