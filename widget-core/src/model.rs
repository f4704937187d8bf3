use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit system used both for the request to the data source and for labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Metric,
    Imperial,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Unit::Metric => Unit::Imperial,
            Unit::Imperial => Unit::Metric,
        }
    }

    pub fn temperature_label(&self) -> &'static str {
        match self {
            Unit::Metric => "°C",
            Unit::Imperial => "°F",
        }
    }

    pub fn speed_label(&self) -> &'static str {
        match self {
            Unit::Metric => "m/s",
            Unit::Imperial => "mph",
        }
    }
}

/// Color theme of the rendered widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored preference value that is not one of the known spellings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {kind} value '{value}'")]
pub struct ParsePreferenceError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Unit {
    type Err = ParsePreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "metric" => Ok(Unit::Metric),
            "imperial" => Ok(Unit::Imperial),
            other => Err(ParsePreferenceError {
                kind: "unit",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for Theme {
    type Err = ParsePreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(ParsePreferenceError {
                kind: "theme",
                value: other.to_string(),
            }),
        }
    }
}

/// Weather condition as reported by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Short group label, e.g. "Clouds".
    pub label: String,
    /// Longer text, e.g. "broken clouds".
    pub description: String,
    pub icon_url: String,
}

/// Current conditions for the resolved location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_name: String,
    pub country: String,
    pub condition: Condition,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity_pct: u8,
    pub wind_speed: f64,
}

impl WeatherSnapshot {
    /// "Name, CC", or just the name when the source gave no country.
    pub fn display_name(&self) -> String {
        if self.country.is_empty() {
            self.location_name.clone()
        } else {
            format!("{}, {}", self.location_name, self.country)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub condition: Condition,
}

/// Forecast feed as delivered by a source, before daily sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct RawForecast {
    /// Hours between consecutive entries.
    pub interval_hours: u32,
    pub entries: Vec<ForecastPoint>,
}

/// At most [`ForecastSeries::MAX_POINTS`] daily points.
///
/// Longer inputs are truncated, so it never exceeds the limit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastSeries {
    points: Vec<ForecastPoint>,
}

impl ForecastSeries {
    pub const MAX_POINTS: usize = 5;

    pub fn new(mut points: Vec<ForecastPoint>) -> Self {
        points.truncate(Self::MAX_POINTS);
        Self { points }
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Result of one refresh cycle. A failure of either request collapses the
/// whole outcome; there is no partial success.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success {
        weather: WeatherSnapshot,
        forecast: ForecastSeries,
    },
    NotFound { location: String },
    NetworkError { message: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}
