//! `KEY=value` parsing and serialization of flight plans and logs.
//!
//! Submissions arrive as two payloads, one `FLIGHT_PLAN` and one
//! `FLIGHT_LOG`. Each parser reads only the keys it knows. Accepted plans are
//! rebroadcast to ATC stations in a separate, more verbose layout.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::{MessageError, MessageResult};
use crate::message::{key_values, FLIGHT_LOG_MARKER, FLIGHT_PLAN_MARKER};
use crate::types::{AirspaceInfo, Coordinate, FlightLog, FlightPlan, WeatherConditions};

/// Keys read from a `FLIGHT_PLAN` payload.
pub mod plan_keys {
    /// Flight number.
    pub const FLIGHT_NUMBER: &str = "FLIGHT_NUMBER";
    /// Aircraft registration.
    pub const AIRCRAFT_REG: &str = "AIRCRAFT_REG";
    /// Aircraft type.
    pub const AIRCRAFT_TYPE: &str = "AIRCRAFT_TYPE";
    /// Operator.
    pub const OPERATOR: &str = "OPERATOR";
    /// Departure airport.
    pub const DEP: &str = "DEP";
    /// Arrival airport.
    pub const ARR: &str = "ARR";
    /// Route string.
    pub const ROUTE: &str = "ROUTE";
    /// Cruise altitude.
    pub const CRUISE_ALT: &str = "CRUISE_ALT";
    /// Cruise speed.
    pub const SPEED: &str = "SPEED";
    /// Estimated off-block time.
    pub const EOBT: &str = "EOBT";
    /// Estimated time of arrival.
    pub const ETA: &str = "ETA";
}

/// Keys read from a `FLIGHT_LOG` payload.
pub mod log_keys {
    /// Flight number.
    pub const FLIGHT_NUMBER: &str = "FLIGHT_NUMBER";
    /// Planned flight time, `HH:MM`.
    pub const TOTAL_FLIGHT_TIME: &str = "TOTAL_FLIGHT_TIME";
    /// Fuel on board.
    pub const FUEL_ON_BOARD: &str = "FUEL_ON_BOARD";
    /// Estimated fuel burn.
    pub const ESTIMATED_FUEL_BURN: &str = "ESTIMATED_FUEL_BURN";
    /// Total weight.
    pub const TOTAL_WEIGHT: &str = "TOTAL_WEIGHT";
    /// Pilot in command.
    pub const PIC: &str = "PIC";
    /// Remarks.
    pub const REMARKS: &str = "REMARKS";
    /// Weather condition code.
    pub const WEATHER_CODE: &str = "WEATHER_CODE";
    /// Weather description.
    pub const WEATHER_DESC: &str = "WEATHER_DESC";
    /// Visibility in meters.
    pub const WEATHER_VISIBILITY: &str = "WEATHER_VISIBILITY";
    /// Average temperature.
    pub const WEATHER_TEMP: &str = "WEATHER_TEMP";
    /// Minimum temperature.
    pub const WEATHER_TEMP_MIN: &str = "WEATHER_TEMP_MIN";
    /// Maximum temperature.
    pub const WEATHER_TEMP_MAX: &str = "WEATHER_TEMP_MAX";
    /// Wind speed in km/h.
    pub const WEATHER_WIND_SPEED: &str = "WEATHER_WIND_SPEED";
    /// UTC offset in seconds.
    pub const WEATHER_TIMEZONE: &str = "WEATHER_TIMEZONE";
}

/// Keys written to an ATC broadcast.
pub mod broadcast_keys {
    /// Flight number.
    pub const FLIGHT_ID: &str = "FLIGHT_ID";
    /// Departure airport.
    pub const DEPARTURE_AIRPORT: &str = "DEPARTURE_AIRPORT";
    /// Arrival airport.
    pub const ARRIVAL_AIRPORT: &str = "ARRIVAL_AIRPORT";
    /// Aircraft registration.
    pub const AIRCRAFT_REG: &str = "AIRCRAFT_REG";
    /// Aircraft type.
    pub const AIRCRAFT_TYPE: &str = "AIRCRAFT_TYPE";
    /// Operator.
    pub const OPERATOR: &str = "OPERATOR";
    /// Route string.
    pub const ROUTE: &str = "ROUTE";
    /// Cruise altitude.
    pub const CRUISE_ALTITUDE: &str = "CRUISE_ALTITUDE";
    /// Cruise speed.
    pub const SPEED: &str = "SPEED";
    /// Estimated time of departure.
    pub const ETD: &str = "ETD";
    /// Estimated time of arrival.
    pub const ETA: &str = "ETA";
    /// Starts a route airspace block.
    pub const AIRSPACE_ID: &str = "AIRSPACE_ID";
    /// Airspace center latitude.
    pub const AIRSPACE_CENTER_LAT: &str = "AIRSPACE_CENTER_LAT";
    /// Airspace center longitude.
    pub const AIRSPACE_CENTER_LON: &str = "AIRSPACE_CENTER_LON";
    /// Airspace radius in kilometers.
    pub const AIRSPACE_RADIUS: &str = "AIRSPACE_RADIUS";
}

/// Field lookup over one payload.
struct Fields<'a> {
    map: HashMap<&'a str, &'a str>,
}

impl<'a> Fields<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            map: key_values(text).collect(),
        }
    }

    fn text(&self, key: &str) -> String {
        self.map.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
    }

    fn required(&self, key: &'static str) -> MessageResult<String> {
        let value = self.text(key);
        if value.is_empty() {
            return Err(MessageError::MissingField(key));
        }
        Ok(value)
    }

    fn number<T: FromStr + Default>(&self, key: &'static str) -> MessageResult<T> {
        match self.map.get(key).map(|v| v.trim()) {
            None | Some("") => Ok(T::default()),
            Some(raw) => parse_number(key, raw),
        }
    }

    fn required_number<T: FromStr>(&self, key: &'static str) -> MessageResult<T> {
        parse_number(key, &self.required(key)?)
    }

    /// A required fuel quantity; negative amounts are invalid.
    fn fuel(&self, key: &'static str) -> MessageResult<i64> {
        let value: i64 = self.required_number(key)?;
        if value < 0 {
            return Err(MessageError::InvalidField {
                key,
                value: value.to_string(),
            });
        }
        Ok(value)
    }
}

fn parse_number<T: FromStr>(key: &'static str, raw: &str) -> MessageResult<T> {
    raw.trim().parse().map_err(|_| MessageError::InvalidField {
        key,
        value: raw.to_string(),
    })
}

impl FlightPlan {
    /// Parse the `FLIGHT_PLAN` half of a submission.
    ///
    /// `FLIGHT_NUMBER`, `DEP` and `ARR` are required. Numeric fields default
    /// to zero when absent. Route airspaces are not part of the submission
    /// and are left empty.
    pub fn from_submission(text: &str) -> MessageResult<Self> {
        use plan_keys as k;
        let fields = Fields::new(text);

        Ok(Self {
            flight_id: fields.required(k::FLIGHT_NUMBER)?,
            departure_airport: fields.required(k::DEP)?,
            arrival_airport: fields.required(k::ARR)?,
            aircraft_reg: fields.text(k::AIRCRAFT_REG),
            aircraft_type: fields.text(k::AIRCRAFT_TYPE),
            operator_name: fields.text(k::OPERATOR),
            route: fields.text(k::ROUTE),
            cruise_altitude: fields.number(k::CRUISE_ALT)?,
            speed: fields.number(k::SPEED)?,
            etd: fields.text(k::EOBT),
            eta: fields.text(k::ETA),
            route_airspaces: Vec::new(),
        })
    }

    /// Render as a `FLIGHT_PLAN` submission payload.
    #[must_use]
    pub fn to_submission_payload(&self) -> String {
        use plan_keys as k;
        let mut out = format!("{FLIGHT_PLAN_MARKER}\n");
        for (key, value) in [
            (k::FLIGHT_NUMBER, self.flight_id.as_str()),
            (k::AIRCRAFT_REG, self.aircraft_reg.as_str()),
            (k::AIRCRAFT_TYPE, self.aircraft_type.as_str()),
            (k::OPERATOR, self.operator_name.as_str()),
            (k::DEP, self.departure_airport.as_str()),
            (k::ARR, self.arrival_airport.as_str()),
            (k::ROUTE, self.route.as_str()),
        ] {
            let _ = writeln!(out, "{key}={value}");
        }
        let _ = writeln!(out, "{}={}", k::CRUISE_ALT, self.cruise_altitude);
        let _ = writeln!(out, "{}={}", k::SPEED, self.speed);
        let _ = writeln!(out, "{}={}", k::EOBT, self.etd);
        let _ = writeln!(out, "{}={}", k::ETA, self.eta);
        out
    }

    /// Render as an ATC broadcast payload.
    #[must_use]
    pub fn to_broadcast_payload(&self) -> String {
        use broadcast_keys as k;
        let mut out = String::new();
        for (key, value) in [
            (k::FLIGHT_ID, self.flight_id.as_str()),
            (k::DEPARTURE_AIRPORT, self.departure_airport.as_str()),
            (k::ARRIVAL_AIRPORT, self.arrival_airport.as_str()),
            (k::AIRCRAFT_REG, self.aircraft_reg.as_str()),
            (k::AIRCRAFT_TYPE, self.aircraft_type.as_str()),
            (k::OPERATOR, self.operator_name.as_str()),
            (k::ROUTE, self.route.as_str()),
        ] {
            let _ = writeln!(out, "{key}={value}");
        }
        let _ = writeln!(out, "{}={}", k::CRUISE_ALTITUDE, self.cruise_altitude);
        let _ = writeln!(out, "{}={}", k::SPEED, self.speed);
        let _ = writeln!(out, "{}={}", k::ETD, self.etd);
        let _ = writeln!(out, "{}={}", k::ETA, self.eta);

        for airspace in &self.route_airspaces {
            let _ = writeln!(out, "{}={}", k::AIRSPACE_ID, airspace.identifier);
            let _ = writeln!(out, "{}={}", k::AIRSPACE_CENTER_LAT, airspace.center.lat);
            let _ = writeln!(out, "{}={}", k::AIRSPACE_CENTER_LON, airspace.center.lon);
            let _ = writeln!(out, "{}={}", k::AIRSPACE_RADIUS, airspace.radius_km);
        }
        out
    }

    /// Parse an ATC broadcast payload.
    ///
    /// Each `AIRSPACE_ID` line opens a new airspace; the coordinate and
    /// radius lines that follow apply to it.
    pub fn from_broadcast_payload(text: &str) -> MessageResult<Self> {
        use broadcast_keys as k;
        let mut plan = Self::default();

        for (key, value) in key_values(text) {
            let value = value.trim();
            match key {
                k::FLIGHT_ID => plan.flight_id = value.to_string(),
                k::DEPARTURE_AIRPORT => plan.departure_airport = value.to_string(),
                k::ARRIVAL_AIRPORT => plan.arrival_airport = value.to_string(),
                k::AIRCRAFT_REG => plan.aircraft_reg = value.to_string(),
                k::AIRCRAFT_TYPE => plan.aircraft_type = value.to_string(),
                k::OPERATOR => plan.operator_name = value.to_string(),
                k::ROUTE => plan.route = value.to_string(),
                k::CRUISE_ALTITUDE => plan.cruise_altitude = parse_number(k::CRUISE_ALTITUDE, value)?,
                k::SPEED => plan.speed = parse_number(k::SPEED, value)?,
                k::ETD => plan.etd = value.to_string(),
                k::ETA => plan.eta = value.to_string(),
                k::AIRSPACE_ID => plan
                    .route_airspaces
                    .push(AirspaceInfo::new(value, Coordinate::default(), 0.0)),
                k::AIRSPACE_CENTER_LAT | k::AIRSPACE_CENTER_LON | k::AIRSPACE_RADIUS => {
                    let Some(airspace) = plan.route_airspaces.last_mut() else {
                        return Err(MessageError::InvalidField {
                            key: k::AIRSPACE_ID,
                            value: format!("{key} before any airspace"),
                        });
                    };
                    match key {
                        k::AIRSPACE_CENTER_LAT => {
                            airspace.center.lat = parse_number(k::AIRSPACE_CENTER_LAT, value)?;
                        }
                        k::AIRSPACE_CENTER_LON => {
                            airspace.center.lon = parse_number(k::AIRSPACE_CENTER_LON, value)?;
                        }
                        _ => airspace.radius_km = parse_number(k::AIRSPACE_RADIUS, value)?,
                    }
                }
                _ => {}
            }
        }

        if plan.flight_id.is_empty() {
            return Err(MessageError::MissingField(k::FLIGHT_ID));
        }
        Ok(plan)
    }
}

impl FlightLog {
    /// Parse the `FLIGHT_LOG` half of a submission.
    ///
    /// `FUEL_ON_BOARD` and `ESTIMATED_FUEL_BURN` are required and must not be
    /// negative; the fuel gate cannot run without them.
    pub fn from_submission(text: &str) -> MessageResult<Self> {
        use log_keys as k;
        let fields = Fields::new(text);

        Ok(Self {
            flight_id: fields.text(k::FLIGHT_NUMBER),
            total_flight_time: fields.text(k::TOTAL_FLIGHT_TIME),
            fuel_on_board: fields.fuel(k::FUEL_ON_BOARD)?,
            estimated_fuel_burn: fields.fuel(k::ESTIMATED_FUEL_BURN)?,
            total_weight: fields.number(k::TOTAL_WEIGHT)?,
            pic_name: fields.text(k::PIC),
            remarks: fields.text(k::REMARKS),
            weather_info: WeatherConditions {
                condition_code: fields.number(k::WEATHER_CODE)?,
                description: fields.text(k::WEATHER_DESC),
                visibility_meters: fields.number(k::WEATHER_VISIBILITY)?,
                avg_temp: fields.number(k::WEATHER_TEMP)?,
                temp_min: fields.number(k::WEATHER_TEMP_MIN)?,
                temp_max: fields.number(k::WEATHER_TEMP_MAX)?,
                wind_speed_kmh: fields.number(k::WEATHER_WIND_SPEED)?,
                timezone_offset_seconds: fields.number(k::WEATHER_TIMEZONE)?,
            },
        })
    }

    /// Render as a `FLIGHT_LOG` submission payload.
    #[must_use]
    pub fn to_submission_payload(&self) -> String {
        use log_keys as k;
        let w = &self.weather_info;
        let mut out = format!("{FLIGHT_LOG_MARKER}\n");
        let _ = writeln!(out, "{}={}", k::FLIGHT_NUMBER, self.flight_id);
        let _ = writeln!(out, "{}={}", k::TOTAL_FLIGHT_TIME, self.total_flight_time);
        let _ = writeln!(out, "{}={}", k::FUEL_ON_BOARD, self.fuel_on_board);
        let _ = writeln!(out, "{}={}", k::ESTIMATED_FUEL_BURN, self.estimated_fuel_burn);
        let _ = writeln!(out, "{}={}", k::TOTAL_WEIGHT, self.total_weight);
        let _ = writeln!(out, "{}={}", k::PIC, self.pic_name);
        let _ = writeln!(out, "{}={}", k::REMARKS, self.remarks);
        let _ = writeln!(out, "{}={}", k::WEATHER_CODE, w.condition_code);
        let _ = writeln!(out, "{}={}", k::WEATHER_DESC, w.description);
        let _ = writeln!(out, "{}={}", k::WEATHER_VISIBILITY, w.visibility_meters);
        let _ = writeln!(out, "{}={}", k::WEATHER_TEMP, w.avg_temp);
        let _ = writeln!(out, "{}={}", k::WEATHER_TEMP_MIN, w.temp_min);
        let _ = writeln!(out, "{}={}", k::WEATHER_TEMP_MAX, w.temp_max);
        let _ = writeln!(out, "{}={}", k::WEATHER_WIND_SPEED, w.wind_speed_kmh);
        let _ = writeln!(out, "{}={}", k::WEATHER_TIMEZONE, w.timezone_offset_seconds);
        out
    }

    /// Planned flight time in minutes, if `total_flight_time` is `HH:MM`.
    #[must_use]
    pub fn flight_minutes(&self) -> Option<u32> {
        let (hours, minutes) = self.total_flight_time.trim().split_once(':')?;
        let hours: u32 = hours.parse().ok()?;
        let minutes: u32 = minutes.parse().ok()?;
        if minutes >= 60 {
            return None;
        }
        hours.checked_mul(60)?.checked_add(minutes)
    }
}
