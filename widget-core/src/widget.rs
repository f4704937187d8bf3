//! The mounted widget: state store, refresh sequencing and host glue.
//!
//! A [`Widget`] is a plain state machine with four entry points: mount,
//! attribute change, form submit and toggle. Each entry point mutates the
//! state synchronously, renders, and spawns a refresh. Refreshes are collected
//! in a [`JoinSet`] and applied by [`Widget::settle_next`], which drops any
//! outcome that is not from the most recently issued refresh.

use std::{collections::VecDeque, sync::Arc};

use tokio::task::JoinSet;

use crate::{
    config::WidgetConfig,
    fetch::fetch_outcome,
    model::{FetchOutcome, Theme, Unit},
    provider::WeatherSource,
    render::{Binding, Control, Rendered, View, render},
    state::WidgetState,
    storage::{PreferenceStore, THEME_KEY, UNIT_KEY, load_preference},
};

/// The page (or any other embedder) the widget lives in.
pub trait Host: Send {
    fn set_attribute(&mut self, name: &str, value: &str);

    /// Replace the widget's whole subtree.
    fn replace_content(&mut self, markup: &str);

    /// Attach listeners for the controls of the subtree just inserted.
    fn bind(&mut self, bindings: &[Binding]);
}

/// Event raised by one of the bound controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Submit(String),
    ToggleTheme,
    ToggleUnit,
}

impl UiEvent {
    pub fn control(&self) -> Control {
        match self {
            UiEvent::Submit(_) => Control::LocationForm,
            UiEvent::ToggleTheme => Control::ThemeToggle,
            UiEvent::ToggleUnit => Control::UnitToggle,
        }
    }
}

/// Result of applying one settled refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Rendered(u64),
    /// A newer refresh was issued after this one.
    Discarded(u64),
}

/// Mirrored attribute writes not yet echoed back by the host.
const MAX_PENDING_ECHOES: usize = 16;

#[derive(Debug)]
struct Settlement {
    sequence: u64,
    outcome: FetchOutcome,
}

pub struct Widget<H: Host> {
    state: WidgetState,
    view: View,
    rendered: Option<Rendered>,
    host: H,
    source: Arc<dyn WeatherSource>,
    prefs: Arc<dyn PreferenceStore>,
    config: WidgetConfig,
    issued: u64,
    refreshes: JoinSet<Settlement>,
    pending_echoes: VecDeque<String>,
}

impl<H: Host> Widget<H> {
    /// Mount a widget and issue its first refresh.
    ///
    /// `location_attribute` is the host-supplied value of the location
    /// attribute, if any. Must be called within a tokio runtime.
    pub fn mount(
        host: H,
        source: Arc<dyn WeatherSource>,
        prefs: Arc<dyn PreferenceStore>,
        config: WidgetConfig,
        location_attribute: Option<&str>,
    ) -> Self {
        let unit = load_preference::<Unit>(prefs.as_ref(), UNIT_KEY).unwrap_or_default();
        let theme = load_preference::<Theme>(prefs.as_ref(), THEME_KEY).unwrap_or_default();
        let state = WidgetState::new(location_attribute, &config.default_location, unit, theme);

        tracing::info!(
            location = state.location(),
            unit = %unit,
            theme = %theme,
            "Mounting weather widget"
        );

        let mut widget = Self {
            state,
            view: View::Idle,
            rendered: None,
            host,
            source,
            prefs,
            config,
            issued: 0,
            refreshes: JoinSet::new(),
            pending_echoes: VecDeque::new(),
        };

        widget.refresh();
        widget
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Output of the latest render.
    pub fn rendered(&self) -> Option<&Rendered> {
        self.rendered.as_ref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Sequence number of the most recently issued refresh.
    pub fn latest_sequence(&self) -> u64 {
        self.issued
    }

    pub fn in_flight(&self) -> usize {
        self.refreshes.len()
    }

    /// Tear the widget down and hand the host back. Refreshes still in
    /// flight are abandoned.
    pub fn unmount(self) -> H {
        tracing::debug!(in_flight = self.in_flight(), "Unmounting weather widget");
        self.host
    }

    /// The host reports that one of the widget's attributes changed.
    ///
    /// Returns the sequence number of the refresh it triggered, if any.
    pub fn attribute_changed(&mut self, name: &str, value: Option<&str>) -> Option<u64> {
        if name != self.config.location_attribute {
            return None;
        }

        let value = value.map(str::trim).unwrap_or_default();
        if self.take_echo(value) || value == self.state.location() {
            return None;
        }

        if !self.state.set_location(value) {
            return None;
        }
        Some(self.refresh())
    }

    /// Location form submission.
    pub fn submit_location(&mut self, input: &str) -> Option<u64> {
        if !self.state.set_location(input) {
            tracing::debug!("Ignoring blank location input");
            return None;
        }

        let location = self.state.location().to_string();
        self.host.set_attribute(&self.config.location_attribute, &location);
        if self.pending_echoes.len() == MAX_PENDING_ECHOES {
            self.pending_echoes.pop_front();
        }
        self.pending_echoes.push_back(location);
        Some(self.refresh())
    }

    /// Hosts deliver echoes of our own attribute writes in write order, so a
    /// match also retires every older pending write.
    fn take_echo(&mut self, value: &str) -> bool {
        match self.pending_echoes.iter().position(|v| v == value) {
            Some(index) => {
                self.pending_echoes.drain(..=index);
                true
            }
            None => false,
        }
    }

    /// Flip the theme and persist it. Re-fetches unless `refetch_on_theme`
    /// is off, in which case the current view is only re-rendered.
    pub fn toggle_theme(&mut self) -> Option<u64> {
        let theme = self.state.toggle_theme();
        self.persist(THEME_KEY, theme.as_str());

        if self.config.refetch_on_theme {
            Some(self.refresh())
        } else {
            self.render();
            None
        }
    }

    /// Flip the unit, persist it, and re-fetch.
    pub fn toggle_unit(&mut self) -> u64 {
        let unit = self.state.toggle_unit();
        self.persist(UNIT_KEY, unit.as_str());
        self.refresh()
    }

    /// Route an event from a bound control to its operation.
    pub fn activate(&mut self, event: UiEvent) -> Option<u64> {
        let bound = self.rendered.as_ref().is_some_and(|r| r.binds(event.control()));
        if !bound {
            tracing::debug!("Ignoring {:?}: control not rendered", event.control());
            return None;
        }

        match event {
            UiEvent::Submit(input) => self.submit_location(&input),
            UiEvent::ToggleTheme => self.toggle_theme(),
            UiEvent::ToggleUnit => Some(self.toggle_unit()),
        }
    }

    /// Wait for the next refresh to settle and apply it.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn settle_next(&mut self) -> Option<Settled> {
        loop {
            match self.refreshes.join_next().await? {
                Ok(settlement) => return Some(self.apply(settlement)),
                Err(e) => tracing::warn!("Refresh task ended without an outcome: {e}"),
            }
        }
    }

    /// Wait for every in-flight refresh and apply them in settlement order.
    pub async fn settle(&mut self) -> Vec<Settled> {
        let mut applied = Vec::new();
        while let Some(settled) = self.settle_next().await {
            applied.push(settled);
        }
        applied
    }

    fn apply(&mut self, settlement: Settlement) -> Settled {
        let Settlement { sequence, outcome } = settlement;

        if sequence != self.issued {
            tracing::debug!(sequence, latest = self.issued, "Discarding stale weather outcome");
            return Settled::Discarded(sequence);
        }

        self.view = View::Settled(outcome);
        self.render();
        Settled::Rendered(sequence)
    }

    /// Show the loading view and start fetching for the current state.
    fn refresh(&mut self) -> u64 {
        self.issued += 1;
        let sequence = self.issued;

        self.view = View::Loading;
        self.render();

        let source = Arc::clone(&self.source);
        let location = self.state.location().to_string();
        let unit = self.state.unit();

        tracing::debug!(sequence, location = %location, unit = %unit, "Refreshing weather");

        self.refreshes.spawn(async move {
            let fetch = tokio::spawn(async move {
                fetch_outcome(source.as_ref(), &location, unit).await
            });
            let outcome = match fetch.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(sequence, "Weather fetch task failed: {e}");
                    FetchOutcome::NetworkError {
                        message: "weather fetch failed".to_string(),
                    }
                }
            };
            Settlement { sequence, outcome }
        });

        sequence
    }

    /// Render, then bind the controls of the new subtree.
    fn render(&mut self) {
        let rendered = render(&self.state, &self.view);
        self.host.replace_content(&rendered.markup);
        self.host.bind(&rendered.bindings);
        self.rendered = Some(rendered);
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.prefs.set(key, value) {
            tracing::warn!("Failed to persist {key}: {e:#}");
        }
    }
}
