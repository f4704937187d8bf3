//! Widget state - single source of truth for rendering decisions

use serde::{Deserialize, Serialize};

use crate::model::{Theme, Unit};

pub const DEFAULT_LOCATION: &str = "Los Angeles";

/// Location, unit and theme of one mounted widget.
///
/// Always fully populated. Fields are private so every change goes through
/// one of the setters below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetState {
    location: String,
    unit: Unit,
    theme: Theme,
}

impl WidgetState {
    /// Build the initial state. A missing or blank `location` falls back to
    /// `default_location`, and a blank default to [`DEFAULT_LOCATION`].
    pub fn new(location: Option<&str>, default_location: &str, unit: Unit, theme: Theme) -> Self {
        let location = [location, Some(default_location)]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LOCATION)
            .to_string();

        Self {
            location,
            unit,
            theme,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Accept `next` as the new location unless it is blank after trimming.
    /// Returns whether the input was accepted.
    pub fn set_location(&mut self, next: &str) -> bool {
        let next = next.trim();
        if next.is_empty() {
            return false;
        }
        self.location = next.to_string();
        true
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggle();
        self.theme
    }

    pub fn toggle_unit(&mut self) -> Unit {
        self.unit = self.unit.toggle();
        self.unit
    }
}

impl Default for WidgetState {
    fn default() -> Self {
        Self::new(None, DEFAULT_LOCATION, Unit::default(), Theme::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let state = WidgetState::default();
        assert_eq!(state.location(), "Los Angeles");
        assert_eq!(state.unit(), Unit::Metric);
        assert_eq!(state.theme(), Theme::Light);
    }

    #[test]
    fn blank_host_attribute_uses_default() {
        let state = WidgetState::new(Some("   "), DEFAULT_LOCATION, Unit::Imperial, Theme::Dark);
        assert_eq!(state.location(), DEFAULT_LOCATION);
        assert_eq!(state.unit(), Unit::Imperial);
        assert_eq!(state.theme(), Theme::Dark);

        let state = WidgetState::new(Some(" Paris "), DEFAULT_LOCATION, Unit::Metric, Theme::Light);
        assert_eq!(state.location(), "Paris");
    }

    #[test]
    fn blank_configured_default_falls_back() {
        let state = WidgetState::new(None, "   ", Unit::Metric, Theme::Light);
        assert_eq!(state.location(), DEFAULT_LOCATION);

        let state = WidgetState::new(Some(""), " Oslo ", Unit::Metric, Theme::Light);
        assert_eq!(state.location(), "Oslo");
    }

    #[test]
    fn set_location_rejects_blank_input() {
        let mut state = WidgetState::default();

        assert!(!state.set_location(""));
        assert!(!state.set_location(" \t\n"));
        assert_eq!(state.location(), "Los Angeles");

        assert!(state.set_location("  Kyiv "));
        assert_eq!(state.location(), "Kyiv");
    }

    #[test]
    fn toggles_flip_back() {
        let mut state = WidgetState::default();

        assert_eq!(state.toggle_theme(), Theme::Dark);
        assert_eq!(state.toggle_theme(), Theme::Light);

        assert_eq!(state.toggle_unit(), Unit::Imperial);
        assert_eq!(state.toggle_unit(), Unit::Metric);
    }
}
