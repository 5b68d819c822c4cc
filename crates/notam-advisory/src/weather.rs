//! Weather lookup and the weather safety gate.
//!
//! Conditions come from a [`WeatherSource`]. The production source queries an
//! OpenWeatherMap-style HTTP endpoint; [`StaticWeatherSource`] serves fixed
//! conditions for tests and offline runs.

use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;

use notam_proto::{Coordinate, WeatherConditions};
use serde::Deserialize;
use tracing::debug;

use crate::error::{AdvisoryError, AdvisoryResult};

/// Default weather endpoint.
pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Default deadline for one weather request.
pub const DEFAULT_WEATHER_TIMEOUT: Duration = Duration::from_secs(5);

/// Visibility at or below this many meters (three statute miles) is unsafe.
pub const MIN_VISIBILITY_METERS: i32 = 4828;

/// Minimum temperatures below this are unsafe.
pub const MIN_TEMPERATURE_C: f64 = -40.0;

/// Wind speeds above this are unsafe.
pub const MAX_WIND_SPEED_KMH: f64 = 60.0;

/// Visibility reported by the provider when the field is omitted.
const UNLIMITED_VISIBILITY_METERS: i32 = 10_000;

/// Conversion from m/s to km/h.
const MS_TO_KMH: f64 = 3.6;

/// Source of current weather conditions.
pub trait WeatherSource: Send + Sync + 'static {
    /// Fetch current conditions at a point.
    fn current_conditions(
        &self,
        at: Coordinate,
    ) -> impl Future<Output = AdvisoryResult<WeatherConditions>> + Send;
}

/// Connection settings for the HTTP weather service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherConfig {
    /// Endpoint URL, without query string.
    pub base_url: String,
    /// API key sent as `appid`.
    pub api_key: String,
    /// Deadline for one request.
    pub request_timeout: Duration,
}

impl WeatherConfig {
    /// Create a configuration for the default endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_WEATHER_URL.to_string(),
            api_key: api_key.into(),
            request_timeout: DEFAULT_WEATHER_TIMEOUT,
        }
    }

    /// Set the endpoint URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request deadline.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Weather source backed by an HTTP JSON API.
#[derive(Debug, Clone)]
pub struct HttpWeatherSource {
    client: reqwest::Client,
    config: WeatherConfig,
}

impl HttpWeatherSource {
    /// Build a source with its own HTTP client.
    pub fn new(config: WeatherConfig) -> AdvisoryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &WeatherConfig {
        &self.config
    }
}

impl WeatherSource for HttpWeatherSource {
    async fn current_conditions(&self, at: Coordinate) -> AdvisoryResult<WeatherConditions> {
        debug!(lat = at.lat, lon = at.lon, "Fetching weather");
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("lat", at.lat.to_string()),
                ("lon", at.lon.to_string()),
                ("appid", self.config.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        parse_weather_json(&body)
    }
}

/// Weather source that always returns the same answer.
#[derive(Debug, Clone)]
pub struct StaticWeatherSource {
    result: Result<WeatherConditions, String>,
}

impl StaticWeatherSource {
    /// Always return `conditions`.
    #[must_use]
    pub const fn new(conditions: WeatherConditions) -> Self {
        Self {
            result: Ok(conditions),
        }
    }

    /// Clear skies, good visibility, light wind.
    #[must_use]
    pub fn fair() -> Self {
        Self::new(WeatherConditions {
            condition_code: 800,
            description: "clear sky".to_string(),
            visibility_meters: UNLIMITED_VISIBILITY_METERS,
            avg_temp: 15.0,
            temp_min: 10.0,
            temp_max: 20.0,
            wind_speed_kmh: 12.0,
            timezone_offset_seconds: 0,
        })
    }

    /// Always fail with `reason`.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            result: Err(reason.into()),
        }
    }
}

impl WeatherSource for StaticWeatherSource {
    async fn current_conditions(&self, _at: Coordinate) -> AdvisoryResult<WeatherConditions> {
        self.result
            .clone()
            .map_err(AdvisoryError::WeatherRequest)
    }
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    weather: Vec<ProviderCondition>,
    visibility: Option<i32>,
    main: Option<ProviderMain>,
    wind: Option<ProviderWind>,
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct ProviderCondition {
    id: i32,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ProviderMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct ProviderWind {
    #[serde(default)]
    speed: f64,
}

/// Interpret a provider response body.
///
/// `weather[0]` and `main` are required. Missing visibility means unlimited
/// and missing wind means calm. Wind arrives in m/s and is converted to km/h.
pub fn parse_weather_json(body: &str) -> AdvisoryResult<WeatherConditions> {
    let response: ProviderResponse = serde_json::from_str(body)?;

    let condition = response
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| AdvisoryError::WeatherParse("no weather entries".into()))?;
    let main = response
        .main
        .ok_or_else(|| AdvisoryError::WeatherParse("missing main block".into()))?;

    Ok(WeatherConditions {
        condition_code: condition.id,
        description: condition.description,
        visibility_meters: response.visibility.unwrap_or(UNLIMITED_VISIBILITY_METERS),
        avg_temp: main.temp,
        temp_min: main.temp_min,
        temp_max: main.temp_max,
        wind_speed_kmh: response.wind.map_or(0.0, |w| w.speed * MS_TO_KMH),
        timezone_offset_seconds: response.timezone,
    })
}

/// Whether a provider condition code is on the severe-weather blocklist.
///
/// Covers every thunderstorm (2xx), heavy and freezing rain, heavy snow,
/// smoke, dust, sand, volcanic ash, squalls and tornadoes.
#[must_use]
pub const fn is_severe_condition(code: i32) -> bool {
    matches!(
        code,
        200..=299 | 502..=504 | 511 | 602 | 622 | 711 | 731 | 751 | 761 | 762 | 771 | 781
    )
}

/// Verdict of the weather gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherStatus {
    /// True when no rule failed.
    pub weather_good: bool,
    /// One line per failed rule; empty when the weather is good.
    pub message: String,
}

/// Threshold rules over current conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherGate {
    /// Visibility at or below this is unsafe.
    pub min_visibility_meters: i32,
    /// Minimum temperature below this is unsafe.
    pub min_temperature_c: f64,
    /// Wind speed above this is unsafe.
    pub max_wind_speed_kmh: f64,
}

impl WeatherGate {
    /// Create a gate with the standard thresholds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_visibility_meters: MIN_VISIBILITY_METERS,
            min_temperature_c: MIN_TEMPERATURE_C,
            max_wind_speed_kmh: MAX_WIND_SPEED_KMH,
        }
    }

    /// Set the wind ceiling.
    #[must_use]
    pub const fn with_max_wind_speed(mut self, kmh: f64) -> Self {
        self.max_wind_speed_kmh = kmh;
        self
    }

    /// Evaluate every rule and collect all failures.
    #[must_use]
    pub fn evaluate(&self, conditions: &WeatherConditions) -> WeatherStatus {
        let mut message = String::new();

        if is_severe_condition(conditions.condition_code) {
            let _ = writeln!(
                message,
                "Dangerous weather: {} (condition code {})",
                conditions.description, conditions.condition_code
            );
        }
        if conditions.visibility_meters <= self.min_visibility_meters {
            let _ = writeln!(
                message,
                "Reduced visibility: {} m (must exceed {} m)",
                conditions.visibility_meters, self.min_visibility_meters
            );
        }
        if conditions.temp_min < self.min_temperature_c {
            let _ = writeln!(
                message,
                "Extreme cold: minimum temperature {:.1} C",
                conditions.temp_min
            );
        }
        if conditions.wind_speed_kmh > self.max_wind_speed_kmh {
            let _ = writeln!(
                message,
                "High wind speed: {:.1} km/h (limit {:.0} km/h)",
                conditions.wind_speed_kmh, self.max_wind_speed_kmh
            );
        }

        WeatherStatus {
            weather_good: message.is_empty(),
            message,
        }
    }
}

impl Default for WeatherGate {
    fn default() -> Self {
        Self::new()
    }
}
