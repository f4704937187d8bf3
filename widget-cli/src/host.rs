use std::collections::BTreeMap;

use widget_core::{Binding, FetchOutcome, Host, View, WidgetState, render::whole};

/// Host that keeps the latest markup in memory so it can be printed or
/// written out as a standalone page.
#[derive(Debug, Default)]
pub struct PageHost {
    tag: String,
    attributes: BTreeMap<String, String>,
    markup: String,
    bindings: Vec<Binding>,
}

impl PageHost {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// The widget markup wrapped in its element inside a minimal document.
    pub fn page(&self) -> String {
        let attributes: String = self
            .attributes
            .iter()
            .map(|(name, value)| format!(" {name}=\"{}\"", value.replace('"', "&quot;")))
            .collect();

        format!(
            "<!DOCTYPE html>\n<html>\n<body>\n<{tag}{attributes}>\n{markup}</{tag}>\n</body>\n</html>\n",
            tag = self.tag,
            markup = self.markup,
        )
    }
}

impl Host for PageHost {
    fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    fn replace_content(&mut self, markup: &str) {
        self.markup = markup.to_string();
        self.bindings.clear();
    }

    fn bind(&mut self, bindings: &[Binding]) {
        tracing::trace!(count = bindings.len(), "Binding widget controls");
        self.bindings = bindings.to_vec();
    }
}

/// Plain-text rendering of the current view for terminal output.
pub fn summary(state: &WidgetState, view: &View) -> String {
    let unit = state.unit();
    let header = format!("[{} | {} | {}]", state.location(), unit, state.theme());

    match view {
        View::Idle | View::Loading => format!("{header}\nLoading..."),
        View::Settled(FetchOutcome::NotFound { location }) => {
            format!("{header}\nLocation \"{location}\" not found.")
        }
        View::Settled(FetchOutcome::NetworkError { message }) => {
            format!("{header}\nError: {message}")
        }
        View::Settled(FetchOutcome::Success { weather, forecast }) => {
            let t = unit.temperature_label();
            let mut lines = vec![
                header,
                weather.display_name(),
                format!(
                    "{}{t}  {} ({})",
                    whole(weather.temperature),
                    weather.condition.label,
                    weather.condition.description
                ),
                format!(
                    "Feels like {}{t}  Humidity {}%  Wind {:.1} {}",
                    whole(weather.feels_like),
                    weather.humidity_pct,
                    weather.wind_speed,
                    unit.speed_label()
                ),
            ];
            for point in forecast.points() {
                lines.push(format!(
                    "  {}  {}{t}  {}",
                    point.timestamp.format("%a, %b %-d"),
                    whole(point.temperature),
                    point.condition.label
                ));
            }
            lines.join("\n")
        }
    }
}
