//! Domain records shared by the advisory pipeline and the server.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// An airspace along a route or affected by a NOTAM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirspaceInfo {
    /// Airspace identifier, usually an ICAO code.
    pub identifier: String,
    /// Center point.
    pub center: Coordinate,
    /// Radius in kilometers.
    pub radius_km: f64,
}

impl AirspaceInfo {
    /// Create an airspace.
    #[must_use]
    pub fn new(identifier: impl Into<String>, center: Coordinate, radius_km: f64) -> Self {
        Self {
            identifier: identifier.into(),
            center,
            radius_km,
        }
    }
}

/// Flight plan half of a submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightPlan {
    /// Flight number.
    pub flight_id: String,
    /// Departure ICAO code.
    pub departure_airport: String,
    /// Arrival ICAO code.
    pub arrival_airport: String,
    /// Aircraft registration.
    pub aircraft_reg: String,
    /// Aircraft type designator, e.g. `A321`.
    pub aircraft_type: String,
    /// Operator name.
    pub operator_name: String,
    /// Free-form route string.
    pub route: String,
    /// Cruise altitude in feet.
    pub cruise_altitude: i32,
    /// Cruise speed in knots.
    pub speed: i32,
    /// Estimated time of departure.
    pub etd: String,
    /// Estimated time of arrival.
    pub eta: String,
    /// Airspaces traversed, in route order.
    pub route_airspaces: Vec<AirspaceInfo>,
}

/// Current weather at a point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherConditions {
    /// Provider condition code (OpenWeatherMap style).
    pub condition_code: i32,
    /// Provider description.
    pub description: String,
    /// Visibility in meters.
    pub visibility_meters: i32,
    /// Average temperature in Celsius.
    pub avg_temp: f64,
    /// Minimum temperature in Celsius.
    pub temp_min: f64,
    /// Maximum temperature in Celsius.
    pub temp_max: f64,
    /// Wind speed in km/h.
    pub wind_speed_kmh: f64,
    /// Offset from UTC in seconds.
    pub timezone_offset_seconds: i32,
}

/// Flight log half of a submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightLog {
    /// Flight number.
    pub flight_id: String,
    /// Planned flight time as `HH:MM`.
    pub total_flight_time: String,
    /// Fuel on board in liters.
    pub fuel_on_board: i64,
    /// Estimated fuel burn in liters.
    pub estimated_fuel_burn: i64,
    /// Total weight in kilograms.
    pub total_weight: i64,
    /// Pilot in command.
    pub pic_name: String,
    /// Free-form remarks.
    pub remarks: String,
    /// Weather as transcribed by the crew.
    pub weather_info: WeatherConditions,
}

/// A notice to airmen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notam {
    /// NOTAM identifier.
    pub identifier: String,
    /// Flight information region.
    pub fir: String,
    /// Location ICAO code.
    pub location: String,
    /// Start of validity.
    pub start_time: String,
    /// End of validity.
    pub end_time: String,
    /// Airspace the notice applies to.
    pub affected_airspace: AirspaceInfo,
    /// Free-form text.
    pub description: String,
}
