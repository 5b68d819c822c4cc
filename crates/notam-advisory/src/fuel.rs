//! Fuel safety gate.
//!
//! Rules run in order:
//!
//! 1. Fuel on board must cover the estimated burn, otherwise the flight is
//!    rejected and nothing else is checked. Negative figures are rejected
//!    the same way.
//! 2. Fuel left after the burn below the minimum reserve is a warning only.
//! 3. The estimated burn must lie within the tolerance band around
//!    `flight minutes x type burn rate`. Unknown types and unreadable flight
//!    times skip this rule with a note.

use std::collections::HashMap;

use notam_proto::FlightLog;

/// Minimum fuel left after the planned burn, in liters.
pub const DEFAULT_MIN_RESERVE: i64 = 1000;

/// Allowed relative deviation from the expected burn.
pub const DEFAULT_BURN_TOLERANCE: f64 = 0.20;

/// Typical burn rates in liters per minute.
pub const DEFAULT_BURN_RATES: &[(&str, f64)] = &[
    ("A320", 40.0),
    ("A321", 50.0),
    ("A330", 95.0),
    ("B737", 42.0),
    ("B738", 45.0),
    ("B777", 125.0),
    ("B787", 90.0),
    ("CRJ9", 25.0),
    ("DH8D", 18.0),
    ("E175", 28.0),
    ("C172", 0.6),
];

/// Outcome of the fuel rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuelVerdict {
    /// The flight may proceed (warnings may still apply).
    Sufficient,
    /// Fuel on board is less than the estimated burn.
    Insufficient,
    /// The estimated burn is outside the tolerance band.
    Anomalous,
}

/// Verdict plus the findings that explain it.
#[derive(Debug, Clone, PartialEq)]
pub struct FuelAssessment {
    /// Overall outcome.
    pub verdict: FuelVerdict,
    /// Fuel left after the planned burn.
    pub remaining: i64,
    /// Expected burn for the type and flight time, when known.
    pub expected_burn: Option<f64>,
    /// Report lines, in rule order.
    pub findings: Vec<String>,
}

impl FuelAssessment {
    /// Whether the flight may proceed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict == FuelVerdict::Sufficient
    }
}

/// Fuel sufficiency, reserve and burn-rate rules.
#[derive(Debug, Clone)]
pub struct FuelGate {
    min_reserve: i64,
    tolerance: f64,
    burn_rates: HashMap<String, f64>,
}

impl FuelGate {
    /// Create a gate with the standard reserve, tolerance and rate table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_reserve: DEFAULT_MIN_RESERVE,
            tolerance: DEFAULT_BURN_TOLERANCE,
            burn_rates: DEFAULT_BURN_RATES
                .iter()
                .map(|(kind, rate)| ((*kind).to_string(), *rate))
                .collect(),
        }
    }

    /// Set the minimum reserve.
    #[must_use]
    pub const fn with_min_reserve(mut self, reserve: i64) -> Self {
        self.min_reserve = reserve;
        self
    }

    /// Set the burn tolerance as a fraction, e.g. `0.2`.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Add or replace the burn rate of an aircraft type.
    #[must_use]
    pub fn with_burn_rate(mut self, aircraft_type: &str, liters_per_minute: f64) -> Self {
        self.burn_rates
            .insert(aircraft_type.to_ascii_uppercase(), liters_per_minute);
        self
    }

    /// Burn rate of an aircraft type, if known.
    #[must_use]
    pub fn burn_rate(&self, aircraft_type: &str) -> Option<f64> {
        self.burn_rates
            .get(&aircraft_type.trim().to_ascii_uppercase())
            .copied()
    }

    /// Apply the rules to a flight log.
    #[must_use]
    pub fn evaluate(&self, log: &FlightLog, aircraft_type: &str) -> FuelAssessment {
        let remaining = log.fuel_on_board.saturating_sub(log.estimated_fuel_burn);
        let mut assessment = FuelAssessment {
            verdict: FuelVerdict::Sufficient,
            remaining,
            expected_burn: None,
            findings: Vec::new(),
        };

        if log.fuel_on_board < 0 || log.estimated_fuel_burn < 0 {
            assessment.verdict = FuelVerdict::Insufficient;
            assessment.findings.push(format!(
                "Invalid fuel figures: {} on board, {} required",
                log.fuel_on_board, log.estimated_fuel_burn
            ));
            return assessment;
        }

        if log.fuel_on_board < log.estimated_fuel_burn {
            assessment.verdict = FuelVerdict::Insufficient;
            assessment.findings.push(format!(
                "Insufficient fuel: {} on board, {} required",
                log.fuel_on_board, log.estimated_fuel_burn
            ));
            return assessment;
        }

        if remaining < self.min_reserve {
            assessment.findings.push(format!(
                "Warning: fuel reserve of {remaining} is below the minimum of {}",
                self.min_reserve
            ));
        }

        let Some(rate) = self.burn_rate(aircraft_type) else {
            assessment.findings.push(format!(
                "Note: burn rate check skipped, unknown aircraft type {aircraft_type:?}"
            ));
            return assessment;
        };
        let Some(minutes) = log.flight_minutes() else {
            assessment.findings.push(format!(
                "Note: burn rate check skipped, unreadable flight time {:?}",
                log.total_flight_time
            ));
            return assessment;
        };

        let expected = f64::from(minutes) * rate;
        assessment.expected_burn = Some(expected);
        let deviation = (log.estimated_fuel_burn as f64 - expected).abs();

        if deviation > expected * self.tolerance {
            assessment.verdict = FuelVerdict::Anomalous;
            assessment.findings.push(format!(
                "Fuel burn anomaly: estimated {} but expected {expected:.0} \u{b1}{:.0}% for {aircraft_type}",
                log.estimated_fuel_burn,
                self.tolerance * 100.0
            ));
        }
        assessment
    }
}

impl Default for FuelGate {
    fn default() -> Self {
        Self::new()
    }
}
