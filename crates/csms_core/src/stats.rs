//! Pure aggregation over session records.
//!
//! All metric formulas live here so the store only deals with selection
//! and lifecycle.

use crate::models::{
    ChargingSession, NetworkAggregates, PaymentMethod, PeriodStats, SessionStatus,
    StationBreakdown,
};
use std::collections::HashMap;

/// Round to two decimals, matching the precision reported to clients.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Minutes between start and completion of a finished session.
fn duration_minutes(session: &ChargingSession) -> Option<f64> {
    let end = session.end_time?;
    Some((end - session.start_time).num_milliseconds() as f64 / 60_000.0)
}

/// Summarize a selection of sessions.
///
/// Every session counts toward `total_sessions`; earnings, energy and the
/// duration average only take completed sessions into account, so a
/// selection containing in-progress sessions never reports phantom revenue.
pub(crate) fn summarize(sessions: &[&ChargingSession]) -> PeriodStats {
    let total_earnings: f64 = sessions
        .iter()
        .filter_map(|session| session.price_paid)
        .sum();
    let total_energy_kwh: f64 = sessions
        .iter()
        .filter_map(|session| session.unit_kwh)
        .sum();

    let durations: Vec<f64> = sessions
        .iter()
        .filter_map(|session| duration_minutes(session))
        .collect();
    let avg_session_duration_minutes = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };

    PeriodStats {
        total_sessions: sessions.len(),
        total_earnings: round2(total_earnings),
        total_energy_kwh: round2(total_energy_kwh),
        avg_session_duration_minutes: round2(avg_session_duration_minutes),
    }
}

/// All-time rollup across every station, revenue split by payment method.
pub(crate) fn aggregate_network<'a, I>(sessions: I) -> NetworkAggregates
where
    I: Iterator<Item = &'a ChargingSession>,
{
    let mut total_kwh = 0.0;
    let mut total_revenue = 0.0;
    let mut by_station: HashMap<String, StationBreakdown> = HashMap::new();

    for session in sessions.filter(|s| s.status == SessionStatus::Completed) {
        let kwh = session.unit_kwh.unwrap_or(0.0);
        let revenue = session.price_paid.unwrap_or(0.0);
        total_kwh += kwh;
        total_revenue += revenue;

        let entry = by_station.entry(session.station_name.clone()).or_default();
        entry.kwh += kwh;
        entry.revenue += revenue;
        match session.payment_method {
            Some(PaymentMethod::Cash) => entry.cash += revenue,
            Some(PaymentMethod::Qr) => entry.qr += revenue,
            None => {}
        }
    }

    for entry in by_station.values_mut() {
        entry.kwh = round2(entry.kwh);
        entry.revenue = round2(entry.revenue);
        entry.cash = round2(entry.cash);
        entry.qr = round2(entry.qr);
    }

    NetworkAggregates {
        total_kwh: round2(total_kwh),
        total_revenue: round2(total_revenue),
        by_station,
    }
}
