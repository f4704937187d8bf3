//! Render reconciler - pure function: (state, view) -> markup + bindings
//!
//! Every render produces the whole subtree. Nothing from a previous render is
//! reused, so the host must attach the returned bindings again each time.

use crate::{
    model::{Condition, FetchOutcome, ForecastPoint, ForecastSeries, Theme, Unit, WeatherSnapshot},
    state::WidgetState,
};

/// What the data region currently shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum View {
    /// Mounted, no refresh issued yet.
    #[default]
    Idle,
    Loading,
    Settled(FetchOutcome),
}

/// Interactive controls a render can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    LocationForm,
    ThemeToggle,
    UnitToggle,
}

impl Control {
    pub fn selector(&self) -> &'static str {
        match self {
            Control::LocationForm => "form.location-form",
            Control::ThemeToggle => "button.theme-toggle",
            Control::UnitToggle => "button.unit-toggle",
        }
    }

    pub fn event(&self) -> &'static str {
        match self {
            Control::LocationForm => "submit",
            Control::ThemeToggle | Control::UnitToggle => "click",
        }
    }
}

/// An event listener the host must attach after inserting the markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub control: Control,
    pub selector: &'static str,
    pub event: &'static str,
}

impl From<Control> for Binding {
    fn from(control: Control) -> Self {
        Self {
            control,
            selector: control.selector(),
            event: control.event(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub markup: String,
    pub bindings: Vec<Binding>,
}

impl Rendered {
    pub fn binds(&self, control: Control) -> bool {
        self.bindings.iter().any(|b| b.control == control)
    }
}

/// Build the complete markup for `state` and `view`.
pub fn render(state: &WidgetState, view: &View) -> Rendered {
    let theme = state.theme().as_str();
    let mut out = Builder::default();

    out.push(&format!(
        r#"<div class="widget theme-{theme}" data-theme="{theme}" data-unit="{}">"#,
        state.unit().as_str()
    ));

    match view {
        View::Idle => {}
        View::Loading => out.push(r#"<p class="loading">Loading...</p>"#),
        View::Settled(FetchOutcome::NotFound { location }) => out.push(&format!(
            r#"<p class="not-found">Location "{}" not found.</p>"#,
            escape(location)
        )),
        View::Settled(FetchOutcome::NetworkError { message }) => {
            out.push(&format!(r#"<p class="error">Error: {}</p>"#, escape(message)))
        }
        View::Settled(FetchOutcome::Success { weather, forecast }) => {
            toggles(&mut out, state);
            details(&mut out, state.unit(), weather, forecast);
        }
    }

    location_form(&mut out, state);
    out.push("</div>");

    out.finish()
}

#[derive(Default)]
struct Builder {
    markup: String,
    bindings: Vec<Binding>,
}

impl Builder {
    fn push(&mut self, line: &str) {
        self.markup.push_str(line);
        self.markup.push('\n');
    }

    fn bind(&mut self, control: Control) {
        self.bindings.push(control.into());
    }

    fn finish(self) -> Rendered {
        Rendered {
            markup: self.markup,
            bindings: self.bindings,
        }
    }
}

fn toggles(out: &mut Builder, state: &WidgetState) {
    let theme_label = match state.theme() {
        Theme::Light => "Dark mode",
        Theme::Dark => "Light mode",
    };

    out.push(r#"<div class="controls">"#);
    out.push(&format!(
        r#"<button type="button" class="theme-toggle">{theme_label}</button>"#
    ));
    out.push(&format!(
        r#"<button type="button" class="unit-toggle">Show {}</button>"#,
        state.unit().toggle().temperature_label()
    ));
    out.push("</div>");

    out.bind(Control::ThemeToggle);
    out.bind(Control::UnitToggle);
}

fn details(out: &mut Builder, unit: Unit, weather: &WeatherSnapshot, forecast: &ForecastSeries) {
    let temp = unit.temperature_label();

    out.push(r#"<div class="weather-details">"#);

    out.push(&format!(
        r#"<h3 class="location">{}</h3>"#,
        escape(&weather.display_name())
    ));

    out.push(&icon("condition-icon", &weather.condition));
    out.push(&format!(
        r#"<p class="condition">{}</p>"#,
        escape(&weather.condition.description)
    ));
    out.push(&format!(
        r#"<p class="temperature"><span class="value">{}{temp}</span> <span class="label">{}</span></p>"#,
        whole(weather.temperature),
        escape(&weather.condition.label)
    ));

    out.push(r#"<div class="grid">"#);
    grid_cell(out, "Temperature", &format!("{}{temp}", whole(weather.temperature)));
    grid_cell(out, "Feels like", &format!("{}{temp}", whole(weather.feels_like)));
    grid_cell(out, "Humidity", &format!("{}%", weather.humidity_pct));
    grid_cell(
        out,
        "Wind",
        &format!("{:.1} {}", weather.wind_speed, unit.speed_label()),
    );
    out.push("</div>");

    out.push(r#"<ul class="forecast">"#);
    for point in forecast.points() {
        forecast_day(out, unit, point);
    }
    out.push("</ul>");

    out.push("</div>");
}

fn grid_cell(out: &mut Builder, name: &str, value: &str) {
    out.push(&format!(
        r#"<div class="cell"><span class="name">{name}</span><span class="value">{value}</span></div>"#
    ));
}

fn forecast_day(out: &mut Builder, unit: Unit, point: &ForecastPoint) {
    out.push(&format!(
        r#"<li class="forecast-day"><span class="date">{}</span>{}<span class="temp">{}{}</span><span class="label">{}</span></li>"#,
        point.timestamp.format("%a, %b %-d"),
        icon("forecast-icon", &point.condition),
        whole(point.temperature),
        unit.temperature_label(),
        escape(&point.condition.label)
    ));
}

fn icon(class: &str, condition: &Condition) -> String {
    format!(
        r#"<img class="{class}" src="{}" alt="{}" />"#,
        escape(&condition.icon_url),
        escape(&condition.description)
    )
}

fn location_form(out: &mut Builder, state: &WidgetState) {
    out.push(&format!(
        r#"<form class="location-form theme-{}"><input type="text" name="location" placeholder="Enter city" value="{}" /><button type="submit">Search</button></form>"#,
        state.theme().as_str(),
        escape(state.location())
    ));
    out.bind(Control::LocationForm);
}

/// Round to a whole degree, so -0.4 reads as 0.
pub fn whole(value: f64) -> i64 {
    value.round() as i64
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn condition(label: &str, description: &str) -> Condition {
        Condition {
            label: label.into(),
            description: description.into(),
            icon_url: "https://openweathermap.org/img/wn/01d@2x.png".into(),
        }
    }

    fn success() -> FetchOutcome {
        let points = (0..5)
            .map(|day| ForecastPoint {
                // 2023-11-14T22:13:20Z plus whole days
                timestamp: DateTime::from_timestamp(1_700_000_000 + day * 86_400, 0).unwrap(),
                temperature: 18.5 + day as f64,
                condition: condition("Clouds", "few clouds"),
            })
            .collect();

        FetchOutcome::Success {
            weather: WeatherSnapshot {
                location_name: "Los Angeles".into(),
                country: "US".into(),
                condition: condition("Clear", "clear sky"),
                temperature: 22.6,
                feels_like: 21.2,
                humidity_pct: 48,
                wind_speed: 3.62,
            },
            forecast: ForecastSeries::new(points),
        }
    }

    fn position(markup: &str, needle: &str) -> usize {
        markup
            .find(needle)
            .unwrap_or_else(|| panic!("'{needle}' missing from:\n{markup}"))
    }

    #[test]
    fn loading_shows_indicator_only() {
        let rendered = render(&WidgetState::default(), &View::Loading);

        assert!(rendered.markup.contains("Loading..."));
        assert!(!rendered.markup.contains("class=\"error\""));
        assert!(!rendered.markup.contains("weather-details"));
        assert_eq!(rendered.bindings, vec![Binding::from(Control::LocationForm)]);
    }

    #[test]
    fn success_sections_in_order() {
        let rendered = render(&WidgetState::default(), &View::Settled(success()));
        let m = &rendered.markup;

        let order = [
            "theme-toggle",
            "unit-toggle",
            "Los Angeles, US",
            "condition-icon",
            "<span class=\"value\">23°C</span> <span class=\"label\">Clear</span>",
            "class=\"grid\"",
            "class=\"forecast\"",
            "location-form",
        ];
        let positions: Vec<usize> = order.iter().map(|n| position(m, n)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "out of order: {positions:?}");

        assert!(m.contains("Feels like</span><span class=\"value\">21°C"));
        assert!(m.contains("48%"));
        assert!(m.contains("3.6 m/s"));
        assert_eq!(m.matches("class=\"forecast-day\"").count(), 5);
        assert!(m.contains("<span class=\"date\">Tue, Nov 14</span>"));
        assert!(!m.contains("Loading..."));

        assert!(rendered.binds(Control::ThemeToggle));
        assert!(rendered.binds(Control::UnitToggle));
        assert!(rendered.binds(Control::LocationForm));
    }

    #[test]
    fn imperial_labels() {
        let mut state = WidgetState::default();
        state.toggle_unit();

        let rendered = render(&state, &View::Settled(success()));
        assert!(rendered.markup.contains("23°F"));
        assert!(rendered.markup.contains("3.6 mph"));
        assert!(rendered.markup.contains("Show °C"));
        assert!(!rendered.markup.contains("23°C"));
    }

    #[test]
    fn not_found_prefills_form() {
        let mut state = WidgetState::default();
        state.toggle_theme();
        state.set_location("Atlantis");

        let rendered = render(
            &state,
            &View::Settled(FetchOutcome::NotFound {
                location: "Atlantis".into(),
            }),
        );

        assert!(rendered.markup.contains(r#"Location "Atlantis" not found."#));
        assert!(rendered.markup.contains(r#"value="Atlantis""#));
        assert!(rendered.markup.contains(r#"class="location-form theme-dark""#));
        assert!(!rendered.binds(Control::ThemeToggle));
        assert!(rendered.binds(Control::LocationForm));
    }

    #[test]
    fn network_error_is_prefixed_and_escaped() {
        let rendered = render(
            &WidgetState::default(),
            &View::Settled(FetchOutcome::NetworkError {
                message: "bad <gateway>".into(),
            }),
        );

        assert!(rendered.markup.contains("Error: bad &lt;gateway&gt;"));
        assert!(!rendered.markup.contains("weather-details"));
        assert!(rendered.binds(Control::LocationForm));
    }

    #[test]
    fn render_is_deterministic() {
        let state = WidgetState::default();
        let view = View::Settled(success());

        assert_eq!(render(&state, &view), render(&state, &view));
    }

    #[test]
    fn rounding_and_escaping_helpers() {
        assert_eq!(whole(22.5), 23);
        assert_eq!(whole(-0.4), 0);
        assert_eq!(whole(-3.6), -4);
        assert_eq!(escape(r#"Tom & "Jerry's""#), "Tom &amp; &quot;Jerry&#39;s&quot;");
    }
}
