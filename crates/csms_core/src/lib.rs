mod models;
mod stats;

pub use crate::models::*;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

/// Upper bound on autocomplete results.
const VEHICLE_SEARCH_LIMIT: usize = 20;
/// Queries shorter than this return nothing, to keep autocomplete cheap.
const VEHICLE_SEARCH_MIN_LEN: usize = 2;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{message}")]
    Validation { message: String },
    #[error("Station '{station_name}' is not part of this network")]
    UnknownStation { station_name: String },
    #[error("Session {session_id} not found")]
    SessionNotFound { session_id: u64 },
    #[error("Vehicle '{vehicle_no}' not found")]
    VehicleNotFound { vehicle_no: String },
    #[error("Session {session_id} is already completed")]
    AlreadyCompleted { session_id: u64 },
    #[error("Vehicle '{vehicle_no}' already has a session in progress at {station_name}")]
    AlreadyInProgress {
        vehicle_no: String,
        station_name: String,
    },
}

fn validation(message: impl Into<String>) -> SessionError {
    SessionError::Validation {
        message: message.into(),
    }
}

/// Owns every charging session and vehicle record of the network.
///
/// The store is the single writer for session transitions; the API layer
/// wraps it in a mutex so each start/end is applied atomically and reads
/// always observe a consistent snapshot.
#[derive(Debug, Clone)]
pub struct SessionStore {
    config: NetworkConfig,
    sessions: BTreeMap<u64, ChargingSession>,
    vehicles: HashMap<String, Vehicle>,
    next_session_id: u64,
}

impl SessionStore {
    pub fn new(config: NetworkConfig) -> Self {
        SessionStore {
            config,
            sessions: BTreeMap::new(),
            vehicles: HashMap::new(),
            next_session_id: 1,
        }
    }

    pub fn get_config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Open a new session and upsert the vehicle record.
    ///
    /// At most one session per (vehicle, station) pair may be in progress.
    pub fn start_session(&mut self, request: StartSession) -> Result<ChargingSession, SessionError> {
        let vehicle_no = request.vehicle_no.trim().to_string();
        if vehicle_no.is_empty() {
            return Err(validation("Vehicle number is required"));
        }
        if !self
            .config
            .stations
            .iter()
            .any(|station| station == &request.station_name)
        {
            return Err(SessionError::UnknownStation {
                station_name: request.station_name,
            });
        }
        if !(0.0..=100.0).contains(&request.soc_start) {
            return Err(validation("State of charge must be between 0 and 100"));
        }

        if self.sessions.values().any(|session| {
            session.status == SessionStatus::InProgress
                && session.vehicle_no == vehicle_no
                && session.station_name == request.station_name
        }) {
            return Err(SessionError::AlreadyInProgress {
                vehicle_no,
                station_name: request.station_name,
            });
        }

        let now = Utc::now();
        self.upsert_vehicle(&vehicle_no, &request, now);

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        let session = ChargingSession {
            session_id,
            vehicle_no,
            station_name: request.station_name,
            status: SessionStatus::InProgress,
            start_time: now,
            end_time: None,
            soc_start: request.soc_start,
            soc_end: None,
            unit_kwh: None,
            price_paid: None,
            calculated_cost_rs: None,
            payment_method: None,
        };
        tracing::info!(
            "Starting session {} for vehicle {} at {}",
            session.session_id,
            session.vehicle_no,
            session.station_name
        );
        self.sessions.insert(session_id, session.clone());
        Ok(session)
    }

    fn upsert_vehicle(&mut self, vehicle_no: &str, request: &StartSession, now: DateTime<Utc>) {
        match self.vehicles.get_mut(vehicle_no) {
            Some(vehicle) => {
                if let Some(name) = &request.vehicle_name {
                    vehicle.vehicle_name = name.clone();
                }
                if let Some(phone) = &request.phone_no {
                    vehicle.phone_no = Some(phone.clone());
                }
                if let Some(capacity) = request.battery_capacity {
                    vehicle.battery_capacity = Some(capacity);
                }
                vehicle.last_updated = now;
            }
            None => {
                self.vehicles.insert(
                    vehicle_no.to_string(),
                    Vehicle {
                        vehicle_no: vehicle_no.to_string(),
                        vehicle_name: request.vehicle_name.clone().unwrap_or_default(),
                        phone_no: request.phone_no.clone(),
                        battery_capacity: request.battery_capacity,
                        last_updated: now,
                    },
                );
            }
        }
    }

    /// Complete an in-progress session.
    ///
    /// The operator-entered `price_paid` is the authoritative charge; no
    /// tariff is applied on top of it. All completion fields are written in
    /// one step, after validation, so a failed call leaves no partial state.
    pub fn end_session(&mut self, request: EndSession) -> Result<ChargingSession, SessionError> {
        if !(0.0..=100.0).contains(&request.soc_end) {
            return Err(validation("State of charge must be between 0 and 100"));
        }
        if request.unit_kwh < 0.0 {
            return Err(validation("Energy delivered cannot be negative"));
        }
        if request.price_paid < 0.0 {
            return Err(validation("Price paid cannot be negative"));
        }

        let Some(session) = self.sessions.get_mut(&request.session_id) else {
            return Err(SessionError::SessionNotFound {
                session_id: request.session_id,
            });
        };
        if session.status == SessionStatus::Completed {
            return Err(SessionError::AlreadyCompleted {
                session_id: request.session_id,
            });
        }

        let now = Utc::now();
        session.status = SessionStatus::Completed;
        session.end_time = Some(now);
        session.soc_end = Some(request.soc_end);
        session.unit_kwh = Some(request.unit_kwh);
        session.price_paid = Some(request.price_paid);
        session.calculated_cost_rs = Some(request.price_paid);
        session.payment_method = Some(request.payment_method);
        let completed = session.clone();

        if let Some(vehicle) = self.vehicles.get_mut(&completed.vehicle_no) {
            vehicle.last_updated = now;
        }

        tracing::info!(
            "Completed session {} for vehicle {} at {}",
            completed.session_id,
            completed.vehicle_no,
            completed.station_name
        );
        Ok(completed)
    }

    pub fn get_session(&self, session_id: u64) -> Result<ChargingSession, SessionError> {
        self.sessions
            .get(&session_id)
            .cloned()
            .ok_or(SessionError::SessionNotFound { session_id })
    }

    pub fn get_vehicle(&self, vehicle_no: &str) -> Result<Vehicle, SessionError> {
        self.vehicles
            .get(vehicle_no)
            .cloned()
            .ok_or_else(|| SessionError::VehicleNotFound {
                vehicle_no: vehicle_no.to_string(),
            })
    }

    /// Case-insensitive substring search over vehicle number and name,
    /// capped for autocomplete use.
    pub fn search_vehicles(&self, query: &str) -> Vec<Vehicle> {
        let query = query.trim().to_lowercase();
        if query.len() < VEHICLE_SEARCH_MIN_LEN {
            return Vec::new();
        }

        let mut matches: Vec<Vehicle> = self
            .vehicles
            .values()
            .filter(|vehicle| {
                vehicle.vehicle_no.to_lowercase().contains(&query)
                    || vehicle.vehicle_name.to_lowercase().contains(&query)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.vehicle_no.cmp(&b.vehicle_no));
        matches.truncate(VEHICLE_SEARCH_LIMIT);
        matches
    }

    /// Every session for a vehicle, any station or status, newest first.
    pub fn vehicle_history(&self, vehicle_no: &str) -> Vec<ChargingSession> {
        let mut sessions: Vec<ChargingSession> = self
            .sessions
            .values()
            .filter(|session| session.vehicle_no == vehicle_no)
            .cloned()
            .collect();
        sort_newest_first(&mut sessions);
        sessions
    }

    /// Plain station/status listing, newest first.
    pub fn list_sessions(
        &self,
        station_name: Option<&str>,
        status: Option<SessionStatus>,
    ) -> Vec<ChargingSession> {
        let mut sessions: Vec<ChargingSession> = self
            .sessions
            .values()
            .filter(|session| {
                station_name.is_none_or(|station| session.station_name == station)
                    && status.is_none_or(|status| session.status == status)
            })
            .cloned()
            .collect();
        sort_newest_first(&mut sessions);
        sessions
    }

    /// Ad-hoc query with a summary over exactly the matched set.
    ///
    /// The period window tests `end_time` for completed sessions and
    /// `start_time` for in-progress ones.
    pub fn filtered_sessions(
        &self,
        filter: &SessionFilter,
        now: DateTime<Utc>,
    ) -> FilteredSessions {
        let cutoff = filter.period.cutoff(now);
        let vehicle_query = filter.vehicle_no.as_ref().map(|v| v.to_lowercase());

        let mut matched: Vec<&ChargingSession> = self
            .sessions
            .values()
            .filter(|session| {
                filter
                    .station_name
                    .as_deref()
                    .is_none_or(|station| session.station_name == station)
                    && vehicle_query
                        .as_deref()
                        .is_none_or(|query| session.vehicle_no.to_lowercase().contains(query))
                    && filter
                        .payment_method
                        .is_none_or(|method| session.payment_method == Some(method))
                    && filter.status.is_none_or(|status| session.status == status)
                    && in_window(session, cutoff)
            })
            .collect();
        matched.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then(b.session_id.cmp(&a.session_id))
        });

        let summary = stats::summarize(&matched);
        FilteredSessions {
            sessions: matched.into_iter().cloned().collect(),
            summary,
        }
    }

    /// Per-station rollup over completed sessions inside the period window.
    pub fn station_stats(
        &self,
        station_name: &str,
        period: Period,
        now: DateTime<Utc>,
    ) -> StationStats {
        let cutoff = period.cutoff(now);
        let matched: Vec<&ChargingSession> = self
            .sessions
            .values()
            .filter(|session| {
                session.station_name == station_name
                    && session.status == SessionStatus::Completed
                    && in_window(session, cutoff)
            })
            .collect();

        StationStats {
            station_name: station_name.to_string(),
            period,
            stats: stats::summarize(&matched),
        }
    }

    /// All-time manager rollup across every station.
    pub fn network_aggregates(&self) -> NetworkAggregates {
        stats::aggregate_network(self.sessions.values())
    }
}

fn sort_newest_first(sessions: &mut [ChargingSession]) {
    sessions.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then(b.session_id.cmp(&a.session_id))
    });
}

fn in_window(session: &ChargingSession, cutoff: Option<DateTime<Utc>>) -> bool {
    let Some(cutoff) = cutoff else {
        return true;
    };
    match session.end_time {
        Some(end) => end >= cutoff,
        None => session.start_time >= cutoff,
    }
}
