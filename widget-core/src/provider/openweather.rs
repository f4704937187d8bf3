use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::instrument;

use crate::model::{Condition, ForecastPoint, RawForecast, Unit, WeatherSnapshot};

use super::{SourceError, WeatherSource, truncate_body, unix_to_utc};

const OPENWEATHER_BASE: &str = "https://api.openweathermap.org/data/2.5";
const ICON_BASE: &str = "https://openweathermap.org/img/wn";

/// The 5-day forecast endpoint reports one entry every three hours.
pub const FORECAST_INTERVAL_HOURS: u32 = 3;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_client(api_key, Client::new())
    }

    pub fn with_client(api_key: String, http: Client) -> Self {
        Self {
            api_key,
            http,
            base_url: OPENWEATHER_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// GET one endpoint and return the body once its status says success.
    async fn get(&self, endpoint: &str, location: &str, unit: Unit) -> Result<String, SourceError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", unit.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        check_status(location, status, &body)?;
        Ok(body)
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_current(
        &self,
        location: &str,
        unit: Unit,
    ) -> Result<WeatherSnapshot, SourceError> {
        let body = self.get("weather", location, unit).await?;
        let parsed: OwCurrentResponse = serde_json::from_str(&body)?;

        let condition = parsed
            .weather
            .first()
            .map(condition_from)
            .unwrap_or_else(unknown_condition);

        Ok(WeatherSnapshot {
            location_name: parsed.name,
            country: parsed.sys.country.unwrap_or_default(),
            condition,
            temperature: parsed.main.temp,
            feels_like: parsed.main.feels_like,
            humidity_pct: parsed.main.humidity,
            wind_speed: parsed.wind.speed,
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_forecast(&self, location: &str, unit: Unit) -> Result<RawForecast, SourceError> {
        let body = self.get("forecast", location, unit).await?;
        let parsed: OwForecastResponse = serde_json::from_str(&body)?;

        let entries = parsed
            .list
            .into_iter()
            .map(|entry| -> Result<ForecastPoint, SourceError> {
                let timestamp = unix_to_utc(entry.dt).ok_or_else(|| {
                    SourceError::Malformed(format!("invalid timestamp {}", entry.dt))
                })?;
                let condition = entry
                    .weather
                    .first()
                    .map(condition_from)
                    .unwrap_or_else(unknown_condition);

                Ok(ForecastPoint {
                    timestamp,
                    temperature: entry.main.temp,
                    condition,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("OpenWeather forecast returned {} entries", entries.len());

        Ok(RawForecast {
            interval_hours: FORECAST_INTERVAL_HOURS,
            entries,
        })
    }
}

/// OpenWeather carries its own status in `cod`, a number on the current
/// endpoint and a string on the forecast endpoint and on errors.
fn check_status(location: &str, http_status: StatusCode, body: &str) -> Result<(), SourceError> {
    let envelope: OwStatus = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !http_status.is_success() => {
            return Err(SourceError::Api {
                code: http_status.as_u16().to_string(),
                message: format!(
                    "request failed with status {}: {}",
                    http_status,
                    truncate_body(body)
                ),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let code = envelope.code().unwrap_or(http_status.as_u16());

    match code {
        200 => Ok(()),
        404 => Err(SourceError::NotFound { location: location.to_string() }),
        other => Err(SourceError::Api {
            code: other.to_string(),
            message: envelope
                .message()
                .unwrap_or_else(|| format!("request failed with status {other}")),
        }),
    }
}

fn condition_from(weather: &OwWeather) -> Condition {
    Condition {
        label: weather.main.clone(),
        description: weather.description.clone(),
        icon_url: format!("{}/{}@2x.png", ICON_BASE, weather.icon),
    }
}

fn unknown_condition() -> Condition {
    Condition {
        label: "Unknown".to_string(),
        description: "Unknown".to_string(),
        icon_url: String::new(),
    }
}

#[derive(Debug, Deserialize)]
struct OwStatus {
    #[serde(default)]
    cod: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

impl OwStatus {
    fn code(&self) -> Option<u16> {
        match self.cod.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    // Successful forecast responses carry `"message": 0`.
    fn message(&self) -> Option<String> {
        match self.message.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    sys: OwSys,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

#[async_trait]
impl WeatherSource for OpenWeatherProvider {
    async fn current(&self, location: &str, unit: Unit) -> Result<WeatherSnapshot, SourceError> {
        self.fetch_current(location, unit).await
    }

    async fn forecast(&self, location: &str, unit: Unit) -> Result<RawForecast, SourceError> {
        self.fetch_forecast(location, unit).await
    }
}
