//! # notam-advisory
//!
//! Decision pipeline for flight submissions.
//!
//! A completed submission (flight plan plus flight log) is checked against the
//! NOTAM table, current weather at the first route airspace, and fuel rules.
//! [`FlightEvaluator`] runs the stages in that order and produces the report
//! sent back to the submitting station.
//!
//! ```rust,no_run
//! use notam_advisory::{FlightEvaluator, NotamIndex, StaticWeatherSource};
//! use notam_proto::{FlightLog, FlightPlan};
//!
//! # async fn run(plan: FlightPlan, log: FlightLog) {
//! let notams = NotamIndex::load_or_empty("notam_database.txt");
//! let evaluator = FlightEvaluator::new(notams, StaticWeatherSource::fair());
//! let evaluation = evaluator.evaluate(plan, &log).await;
//! println!("{}", evaluation.report);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod fuel;
pub mod matcher;
pub mod notam;
pub mod pipeline;
pub mod route;
pub mod weather;

pub use error::{AdvisoryError, AdvisoryResult};
pub use fuel::{FuelAssessment, FuelGate, FuelVerdict};
pub use matcher::NotamMatcher;
pub use notam::{parse_notam_line, NotamIndex};
pub use pipeline::{Decision, Evaluation, FlightEvaluator, RejectionCause};
pub use route::RouteCatalog;
pub use weather::{
    parse_weather_json, HttpWeatherSource, StaticWeatherSource, WeatherConfig, WeatherGate,
    WeatherSource, WeatherStatus,
};
