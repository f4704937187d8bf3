use crate::{
    Config,
    model::{RawForecast, Unit, WeatherSnapshot},
    provider::{openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};

pub mod openweather;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi."
            )),
        }
    }
}

/// Failure of a single request to the data source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// The response was well formed but the location could not be resolved.
    #[error("location not found: {location}")]
    NotFound { location: String },

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    /// Any other status the source reported, with its own message.
    #[error("{message}")]
    Api { code: String, message: String },
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Malformed(err.to_string())
    }
}

/// The two read-only endpoints the widget consumes.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn current(&self, location: &str, unit: Unit) -> Result<WeatherSnapshot, SourceError>;

    async fn forecast(&self, location: &str, unit: Unit) -> Result<RawForecast, SourceError>;
}

/// Construct a source from config and explicit ProviderId.
pub fn source_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherSource>> {
    let api_key = config.resolve_api_key(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `city-weather configure {id}` and enter your API key."
        )
    })?;

    let http = http_client(config.widget.request_timeout())?;

    let source: Arc<dyn WeatherSource> = match id {
        ProviderId::OpenWeather => Arc::new(OpenWeatherProvider::with_client(api_key, http)),
        ProviderId::WeatherApi => Arc::new(WeatherApiProvider::with_client(api_key, http)),
    };

    Ok(source)
}

/// Construct the default source from config, using `default_provider` field.
pub fn default_source_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherSource>> {
    let id = config.default_provider_id()?;
    source_from_config(id, config)
}

fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

pub(crate) fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn default_source_from_config_errors_when_not_set() {
        let cfg = Config::default();
        let err = default_source_from_config(&cfg).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No default provider configured"));
        assert!(msg.contains("Hint: run `city-weather configure"));
    }

    #[test]
    fn default_source_from_config_works_when_set_and_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "KEY".to_string());

        let source = default_source_from_config(&cfg);
        assert!(source.is_ok());
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let short = "city not found";
        assert_eq!(truncate_body(short), short);

        let long = "é".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }

    #[test]
    fn source_error_messages() {
        let not_found = SourceError::NotFound {
            location: "Atlantis".into(),
        };
        assert_eq!(not_found.to_string(), "location not found: Atlantis");

        let api = SourceError::Api {
            code: "401".into(),
            message: "Invalid API key".into(),
        };
        assert_eq!(api.to_string(), "Invalid API key");
    }
}
