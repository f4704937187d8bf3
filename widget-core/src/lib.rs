//! Core library for the city weather widget.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Weather data sources (OpenWeather, WeatherAPI.com)
//! - Preference storage
//! - The widget state store, fetch orchestration and rendering
//!
//! It is used by `widget-cli`, but any host that can insert markup and
//! forward attribute changes and control events can mount a [`Widget`].

pub mod config;
pub mod fetch;
pub mod model;
pub mod provider;
pub mod render;
pub mod state;
pub mod storage;
pub mod widget;

pub use config::{Config, ProviderConfig, WidgetConfig};
pub use model::{FetchOutcome, ForecastPoint, ForecastSeries, Theme, Unit, WeatherSnapshot};
pub use provider::{ProviderId, SourceError, WeatherSource};
pub use render::{Binding, Control, Rendered, View};
pub use state::WidgetState;
pub use storage::{FileStore, MemoryStore, PreferenceStore};
pub use widget::{Host, Settled, UiEvent, Widget};
