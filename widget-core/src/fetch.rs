//! Fetch orchestration: two concurrent requests, one combined outcome.

use crate::{
    model::{FetchOutcome, ForecastPoint, ForecastSeries, RawForecast, Unit, WeatherSnapshot},
    provider::{SourceError, WeatherSource},
};

const HOURS_PER_DAY: u32 = 24;

/// Issue the current-conditions and forecast requests concurrently and
/// collapse their results into one [`FetchOutcome`].
///
/// Both requests always run to completion before an outcome is produced.
pub async fn fetch_outcome(source: &dyn WeatherSource, location: &str, unit: Unit) -> FetchOutcome {
    let (current, forecast) =
        tokio::join!(source.current(location, unit), source.forecast(location, unit));

    combine(location, current, forecast)
}

/// Merge the two request results.
///
/// The current-conditions result is inspected first: a transport failure
/// there is a network error, and a "not found" there wins over anything the
/// forecast reported. Otherwise any forecast failure is a network error.
pub fn combine(
    location: &str,
    current: Result<WeatherSnapshot, SourceError>,
    forecast: Result<RawForecast, SourceError>,
) -> FetchOutcome {
    let weather = match current {
        Ok(weather) => weather,
        Err(SourceError::NotFound { .. }) => {
            tracing::debug!("Location '{location}' not found");
            return FetchOutcome::NotFound {
                location: location.to_string(),
            };
        }
        Err(e) => return network_error("current conditions", e),
    };

    match forecast {
        Ok(raw) => FetchOutcome::Success {
            weather,
            forecast: sample_daily(raw),
        },
        Err(e) => network_error("forecast", e),
    }
}

fn network_error(request: &str, err: SourceError) -> FetchOutcome {
    tracing::warn!("Weather {request} request failed: {err}");
    FetchOutcome::NetworkError {
        message: err.to_string(),
    }
}

/// Entries to skip between daily samples for a feed reporting every
/// `interval_hours` hours. A 3-hour feed gives 8.
pub fn daily_stride(interval_hours: u32) -> usize {
    if interval_hours == 0 {
        return 1;
    }
    let stride = (HOURS_PER_DAY as f64 / interval_hours as f64).round() as usize;
    stride.max(1)
}

/// One reading per day, starting at the first entry, at most five.
pub fn sample_daily(raw: RawForecast) -> ForecastSeries {
    let stride = daily_stride(raw.interval_hours);
    let points: Vec<ForecastPoint> = raw
        .entries
        .into_iter()
        .step_by(stride)
        .take(ForecastSeries::MAX_POINTS)
        .collect();

    ForecastSeries::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Condition;
    use async_trait::async_trait;
    use chrono::DateTime;

    fn condition() -> Condition {
        Condition {
            label: "Clouds".into(),
            description: "scattered clouds".into(),
            icon_url: "https://openweathermap.org/img/wn/03d@2x.png".into(),
        }
    }

    fn snapshot(location: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            location_name: location.into(),
            country: "US".into(),
            condition: condition(),
            temperature: 21.4,
            feels_like: 20.9,
            humidity_pct: 40,
            wind_speed: 3.6,
        }
    }

    fn raw(len: usize, interval_hours: u32) -> RawForecast {
        RawForecast {
            interval_hours,
            entries: (0..len)
                .map(|i| ForecastPoint {
                    timestamp: DateTime::from_timestamp(1_700_000_000 + i as i64 * 3600, 0)
                        .unwrap(),
                    temperature: i as f64,
                    condition: condition(),
                })
                .collect(),
        }
    }

    #[test]
    fn stride_follows_interval() {
        assert_eq!(daily_stride(3), 8);
        assert_eq!(daily_stride(1), 24);
        assert_eq!(daily_stride(24), 1);
        assert_eq!(daily_stride(48), 1);
        assert_eq!(daily_stride(0), 1);
    }

    #[test]
    fn sampling_forty_three_hour_entries() {
        let series = sample_daily(raw(40, 3));

        let picked: Vec<f64> = series.points().iter().map(|p| p.temperature).collect();
        assert_eq!(picked, vec![0.0, 8.0, 16.0, 24.0, 32.0]);
    }

    #[test]
    fn sampling_short_and_hourly_feeds() {
        assert_eq!(sample_daily(raw(10, 3)).len(), 2);
        assert!(sample_daily(raw(0, 3)).is_empty());

        let hourly = sample_daily(raw(120, 1));
        let picked: Vec<f64> = hourly.points().iter().map(|p| p.temperature).collect();
        assert_eq!(picked, vec![0.0, 24.0, 48.0, 72.0, 96.0]);
    }

    #[test]
    fn forecast_failure_discards_weather() {
        let outcome = combine(
            "Los Angeles",
            Ok(snapshot("Los Angeles")),
            Err(SourceError::Timeout),
        );
        assert_eq!(
            outcome,
            FetchOutcome::NetworkError {
                message: "request timed out".into()
            }
        );
    }

    #[test]
    fn not_found_wins_over_forecast_result() {
        let outcome = combine(
            "Atlantis",
            Err(SourceError::NotFound {
                location: "Atlantis".into(),
            }),
            Ok(raw(40, 3)),
        );
        assert_eq!(
            outcome,
            FetchOutcome::NotFound {
                location: "Atlantis".into()
            }
        );

        let outcome = combine(
            "Atlantis",
            Err(SourceError::NotFound {
                location: "Atlantis".into(),
            }),
            Err(SourceError::Transport("connection refused".into())),
        );
        assert_eq!(
            outcome,
            FetchOutcome::NotFound {
                location: "Atlantis".into()
            }
        );
    }

    #[test]
    fn current_transport_failure_is_network_error() {
        let outcome = combine(
            "Paris",
            Err(SourceError::Transport("connection refused".into())),
            Ok(raw(40, 3)),
        );
        assert_eq!(
            outcome,
            FetchOutcome::NetworkError {
                message: "connection refused".into()
            }
        );
    }

    #[derive(Debug)]
    struct SlowForecast;

    #[async_trait]
    impl WeatherSource for SlowForecast {
        async fn current(
            &self,
            location: &str,
            _unit: Unit,
        ) -> Result<WeatherSnapshot, SourceError> {
            Ok(snapshot(location))
        }

        async fn forecast(&self, _location: &str, _unit: Unit) -> Result<RawForecast, SourceError> {
            tokio::task::yield_now().await;
            Ok(raw(40, 3))
        }
    }

    #[tokio::test]
    async fn fetch_waits_for_both_requests() {
        let outcome = fetch_outcome(&SlowForecast, "Los Angeles", Unit::Metric).await;

        match outcome {
            FetchOutcome::Success { weather, forecast } => {
                assert_eq!(weather.location_name, "Los Angeles");
                assert_eq!(forecast.len(), 5);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }
}
