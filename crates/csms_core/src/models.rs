use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub network_id: String,
    /// Fixed set of station names sessions can be opened at.
    pub stations: Vec<String>,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    pub users: Vec<UserAccount>,
}

fn default_token_ttl_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub username: String,
    /// Bcrypt hash of the account password.
    pub password_hash: String,
    pub role: Role,
}

/// Identity scope of an authenticated user.
///
/// Serialized as `"Manager"` or `"Operator-<Station>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Manager,
    Operator(String),
}

impl Role {
    pub fn is_manager(&self) -> bool {
        matches!(self, Role::Manager)
    }

    /// The single station an operator is bound to, `None` for managers.
    pub fn station_scope(&self) -> Option<&str> {
        match self {
            Role::Manager => None,
            Role::Operator(station) => Some(station),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Manager => write!(f, "Manager"),
            Role::Operator(station) => write!(f, "Operator-{}", station),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "Manager" {
            return Ok(Role::Manager);
        }
        if let Some(station) = value.strip_prefix("Operator-") {
            if !station.is_empty() {
                return Ok(Role::Operator(station.to_string()));
            }
        }
        Err(format!("Unknown role '{}'", value))
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN_PROGRESS" | "IN PROGRESS" => Ok(SessionStatus::InProgress),
            "COMPLETED" => Ok(SessionStatus::Completed),
            _ => Err(format!("Unknown session status '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    #[serde(rename = "QR")]
    Qr,
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "qr" => Ok(PaymentMethod::Qr),
            _ => Err(format!("Unknown payment method '{}'", s)),
        }
    }
}

/// Relative aggregation window, anchored at the query instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl Period {
    /// Earliest instant still inside the window, `None` for `All`.
    ///
    /// Windows are rolling: day = last 24 hours, week = last 7 days,
    /// month = last 30 days, year = last 365 days.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::Day => Some(now - Duration::days(1)),
            Period::Week => Some(now - Duration::weeks(1)),
            Period::Month => Some(now - Duration::days(30)),
            Period::Year => Some(now - Duration::days(365)),
            Period::All => None,
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            "all" => Ok(Period::All),
            _ => Err(format!("Unknown period '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub vehicle_no: String,
    pub vehicle_name: String,
    pub phone_no: Option<String>,
    /// Battery capacity in kWh.
    pub battery_capacity: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingSession {
    pub session_id: u64,
    pub vehicle_no: String,
    pub station_name: String,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// State of charge at plug-in, percent.
    pub soc_start: f64,
    pub soc_end: Option<f64>,
    /// Energy delivered over the session, kWh.
    pub unit_kwh: Option<f64>,
    pub price_paid: Option<f64>,
    pub calculated_cost_rs: Option<f64>,
    pub payment_method: Option<PaymentMethod>,
}

/// Input for opening a session. The vehicle is upserted as a side effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSession {
    pub vehicle_no: String,
    pub station_name: String,
    pub soc_start: f64,
    #[serde(default)]
    pub vehicle_name: Option<String>,
    #[serde(default)]
    pub phone_no: Option<String>,
    #[serde(default)]
    pub battery_capacity: Option<f64>,
}

/// Input for completing a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSession {
    pub session_id: u64,
    pub soc_end: f64,
    pub unit_kwh: f64,
    pub price_paid: f64,
    pub payment_method: PaymentMethod,
}

/// Ad-hoc session query. `None` fields place no restriction.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub station_name: Option<String>,
    pub vehicle_no: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub status: Option<SessionStatus>,
    pub period: Period,
}

/// Rollup over a set of sessions. Earnings, energy and duration come from
/// completed sessions only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub total_sessions: usize,
    pub total_earnings: f64,
    pub total_energy_kwh: f64,
    pub avg_session_duration_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStats {
    pub station_name: String,
    pub period: Period,
    #[serde(flatten)]
    pub stats: PeriodStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredSessions {
    pub sessions: Vec<ChargingSession>,
    pub summary: PeriodStats,
}

/// Per-station slice of the network-wide rollup, with revenue split by
/// payment method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationBreakdown {
    pub kwh: f64,
    pub revenue: f64,
    pub cash: f64,
    pub qr: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAggregates {
    pub total_kwh: f64,
    pub total_revenue: f64,
    pub by_station: HashMap<String, StationBreakdown>,
}
