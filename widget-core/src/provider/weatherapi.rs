use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::instrument;

use crate::model::{Condition, ForecastPoint, RawForecast, Unit, WeatherSnapshot};

use super::{SourceError, WeatherSource, truncate_body, unix_to_utc};

const WEATHERAPI_BASE: &str = "https://api.weatherapi.com/v1";

/// WeatherAPI.com error code for "No matching location found."
const NO_MATCHING_LOCATION: u32 = 1006;

/// Forecast days are split into hourly entries.
pub const FORECAST_INTERVAL_HOURS: u32 = 1;
const FORECAST_DAYS: &str = "5";

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    http: Client,
    base_url: String,
}

impl WeatherApiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_client(api_key, Client::new())
    }

    pub fn with_client(api_key: String, http: Client) -> Self {
        Self {
            api_key,
            http,
            base_url: WEATHERAPI_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get(
        &self,
        endpoint: &str,
        location: &str,
        extra: &[(&str, &str)],
    ) -> Result<String, SourceError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", location)])
            .query(extra)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(classify_error(location, status, &body));
        }

        Ok(body)
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_current(
        &self,
        location: &str,
        unit: Unit,
    ) -> Result<WeatherSnapshot, SourceError> {
        let body = self.get("current.json", location, &[("aqi", "no")]).await?;
        let parsed: WaResponse = serde_json::from_str(&body)?;
        let current = parsed.current;

        let (temperature, feels_like, wind_speed) = match unit {
            Unit::Metric => (current.temp_c, current.feelslike_c, current.wind_kph / 3.6),
            Unit::Imperial => (current.temp_f, current.feelslike_f, current.wind_mph),
        };

        Ok(WeatherSnapshot {
            location_name: parsed.location.name,
            country: parsed.location.country,
            condition: condition_from(&current.condition),
            temperature,
            feels_like,
            humidity_pct: current.humidity,
            wind_speed,
        })
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_forecast(&self, location: &str, unit: Unit) -> Result<RawForecast, SourceError> {
        let query = [("days", FORECAST_DAYS), ("aqi", "no"), ("alerts", "no")];
        let body = self.get("forecast.json", location, &query).await?;
        let parsed: WaForecastResponse = serde_json::from_str(&body)?;

        let entries = parsed
            .forecast
            .forecastday
            .iter()
            .flat_map(|day| day.hour.iter())
            .map(|hour| -> Result<ForecastPoint, SourceError> {
                let timestamp = unix_to_utc(hour.time_epoch).ok_or_else(|| {
                    SourceError::Malformed(format!("invalid timestamp {}", hour.time_epoch))
                })?;

                Ok(ForecastPoint {
                    timestamp,
                    temperature: match unit {
                        Unit::Metric => hour.temp_c,
                        Unit::Imperial => hour.temp_f,
                    },
                    condition: condition_from(&hour.condition),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RawForecast {
            interval_hours: FORECAST_INTERVAL_HOURS,
            entries,
        })
    }
}

fn classify_error(location: &str, status: StatusCode, body: &str) -> SourceError {
    match serde_json::from_str::<WaErrorResponse>(body) {
        Ok(parsed) if parsed.error.code == NO_MATCHING_LOCATION => SourceError::NotFound {
            location: location.to_string(),
        },
        Ok(parsed) => SourceError::Api {
            code: parsed.error.code.to_string(),
            message: parsed.error.message,
        },
        Err(_) => SourceError::Api {
            code: status.as_u16().to_string(),
            message: format!("request failed with status {}: {}", status, truncate_body(body)),
        },
    }
}

fn condition_from(condition: &WaCondition) -> Condition {
    let icon_url = if condition.icon.starts_with("//") {
        format!("https:{}", condition.icon)
    } else {
        condition.icon.clone()
    };

    Condition {
        label: condition.text.clone(),
        description: condition.text.clone(),
        icon_url,
    }
}

#[derive(Debug, Deserialize)]
struct WaErrorDetail {
    code: u32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    temp_f: f64,
    feelslike_c: f64,
    feelslike_f: f64,
    humidity: u8,
    wind_kph: f64,
    wind_mph: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaForecastHour {
    time_epoch: i64,
    temp_c: f64,
    temp_f: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    hour: Vec<WaForecastHour>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    forecast: WaForecast,
}

#[async_trait]
impl WeatherSource for WeatherApiProvider {
    async fn current(&self, location: &str, unit: Unit) -> Result<WeatherSnapshot, SourceError> {
        self.fetch_current(location, unit).await
    }

    async fn forecast(&self, location: &str, unit: Unit) -> Result<RawForecast, SourceError> {
        self.fetch_forecast(location, unit).await
    }
}
