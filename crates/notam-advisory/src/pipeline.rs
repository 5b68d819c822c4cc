//! Flight submission decision pipeline.
//!
//! Stages run in a fixed order and each may end the evaluation early:
//!
//! 1. NOTAM relevance: no relevant NOTAMs ends with [`Decision::NoNotams`].
//! 2. Weather: any failed rule, or no weather data, rejects.
//! 3. Fuel: insufficient fuel or an anomalous burn rejects.
//!
//! The report accumulates each stage's findings and ends with a banner.

use std::fmt::{self, Write as _};

use notam_proto::{Coordinate, FlightLog, FlightPlan, Notam, WeatherConditions};
use tracing::{info, warn};

use crate::fuel::{FuelGate, FuelVerdict};
use crate::matcher::NotamMatcher;
use crate::notam::NotamIndex;
use crate::route::RouteCatalog;
use crate::weather::{WeatherGate, WeatherSource};

/// Banner closing an accepted report.
pub const ACCEPTED_BANNER: &str = "FLIGHT PLAN ACCEPTED";

/// Prefix of the banner closing a rejected report.
pub const REJECTED_BANNER: &str = "FLIGHT PLAN REJECTED";

/// Why a flight was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCause {
    /// One or more weather rules failed.
    UnsafeWeather,
    /// No weather data could be obtained.
    WeatherUnavailable,
    /// Fuel on board does not cover the planned burn.
    InsufficientFuel,
    /// Planned burn is implausible for the aircraft type.
    FuelAnomaly,
}

impl fmt::Display for RejectionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UnsafeWeather => "UNSAFE WEATHER",
            Self::WeatherUnavailable => "WEATHER UNAVAILABLE",
            Self::InsufficientFuel => "INSUFFICIENT FUEL",
            Self::FuelAnomaly => "FUEL ANOMALY",
        };
        f.write_str(label)
    }
}

/// Outcome of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Every gate passed; the plan is broadcast to ATC.
    Accepted,
    /// Nothing to report; later gates were not run.
    NoNotams,
    /// A gate failed.
    Rejected(RejectionCause),
}

/// Result of evaluating one submission.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The decision.
    pub decision: Decision,
    /// Text returned to the submitting client.
    pub report: String,
    /// The plan with its route airspaces resolved.
    pub plan: FlightPlan,
}

impl Evaluation {
    /// Whether the plan should be rebroadcast to ATC stations.
    #[must_use]
    pub fn should_broadcast(&self) -> bool {
        self.decision == Decision::Accepted
    }
}

/// Runs the decision pipeline for completed submissions.
#[derive(Debug)]
pub struct FlightEvaluator<W> {
    notams: NotamIndex,
    routes: RouteCatalog,
    weather_source: W,
    weather_gate: WeatherGate,
    fuel_gate: FuelGate,
}

impl<W: WeatherSource> FlightEvaluator<W> {
    /// Create an evaluator with the default route table and gates.
    #[must_use]
    pub fn new(notams: NotamIndex, weather_source: W) -> Self {
        Self {
            notams,
            routes: RouteCatalog::default(),
            weather_source,
            weather_gate: WeatherGate::default(),
            fuel_gate: FuelGate::default(),
        }
    }

    /// Replace the route table.
    #[must_use]
    pub fn with_routes(mut self, routes: RouteCatalog) -> Self {
        self.routes = routes;
        self
    }

    /// Replace the weather gate.
    #[must_use]
    pub fn with_weather_gate(mut self, gate: WeatherGate) -> Self {
        self.weather_gate = gate;
        self
    }

    /// Replace the fuel gate.
    #[must_use]
    pub fn with_fuel_gate(mut self, gate: FuelGate) -> Self {
        self.fuel_gate = gate;
        self
    }

    /// The NOTAM table in use.
    #[must_use]
    pub const fn notams(&self) -> &NotamIndex {
        &self.notams
    }

    /// Evaluate a completed submission.
    ///
    /// Route airspaces are resolved from the route table when the plan does
    /// not carry any.
    pub async fn evaluate(&self, mut plan: FlightPlan, log: &FlightLog) -> Evaluation {
        if plan.route_airspaces.is_empty() {
            plan.route_airspaces = self
                .routes
                .airspaces_for(&plan.departure_airport, &plan.arrival_airport);
        }

        let mut report = String::new();

        let relevant = NotamMatcher::new(&self.notams).relevant(&plan);
        if relevant.is_empty() {
            let _ = writeln!(
                report,
                "NO NOTAMS FOUND FOR FLIGHT {} ({} -> {})",
                plan.flight_id, plan.departure_airport, plan.arrival_airport
            );
            info!(flight_id = %plan.flight_id, "No relevant NOTAMs");
            return Evaluation {
                decision: Decision::NoNotams,
                report,
                plan,
            };
        }
        write_notams(&mut report, &relevant);

        let at = plan
            .route_airspaces
            .first()
            .map_or_else(Coordinate::default, |a| a.center);
        let conditions = match self.weather_source.current_conditions(at).await {
            Ok(conditions) => conditions,
            Err(e) => {
                warn!(flight_id = %plan.flight_id, error = %e, "Weather lookup failed");
                let _ = writeln!(report, "Weather data unavailable: {e}");
                return reject(report, plan, RejectionCause::WeatherUnavailable);
            }
        };

        let status = self.weather_gate.evaluate(&conditions);
        if !status.weather_good {
            report.push_str(&status.message);
            return reject(report, plan, RejectionCause::UnsafeWeather);
        }
        write_favorable_weather(&mut report, &conditions);

        let fuel = self.fuel_gate.evaluate(log, &plan.aircraft_type);
        for finding in &fuel.findings {
            let _ = writeln!(report, "{finding}");
        }
        match fuel.verdict {
            FuelVerdict::Insufficient => {
                return reject(report, plan, RejectionCause::InsufficientFuel);
            }
            FuelVerdict::Anomalous => return reject(report, plan, RejectionCause::FuelAnomaly),
            FuelVerdict::Sufficient => {
                let _ = writeln!(
                    report,
                    "Fuel sufficient: {} remaining after planned burn",
                    fuel.remaining
                );
            }
        }

        let _ = writeln!(report, "{ACCEPTED_BANNER}");
        info!(flight_id = %plan.flight_id, notams = relevant.len(), "Flight plan accepted");
        Evaluation {
            decision: Decision::Accepted,
            report,
            plan,
        }
    }
}

fn write_notams(report: &mut String, notams: &[&Notam]) {
    report.push_str("NOTAMS AFFECTING YOUR FLIGHT:\n");
    for notam in notams {
        let _ = writeln!(
            report,
            "NOTAM: {} for {} - {}",
            notam.identifier, notam.location, notam.description
        );
    }
}

fn write_favorable_weather(report: &mut String, conditions: &WeatherConditions) {
    let _ = writeln!(
        report,
        "Weather favorable: {}, visibility {} m, temperature {:.1} C, wind {:.1} km/h",
        conditions.description,
        conditions.visibility_meters,
        conditions.avg_temp,
        conditions.wind_speed_kmh
    );
}

fn reject(mut report: String, plan: FlightPlan, cause: RejectionCause) -> Evaluation {
    let _ = writeln!(report, "{REJECTED_BANNER}: {cause}");
    info!(flight_id = %plan.flight_id, cause = %cause, "Flight plan rejected");
    Evaluation {
        decision: Decision::Rejected(cause),
        report,
        plan,
    }
}
