use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use inquire::{Password, Select, Text};
use widget_core::{
    Config, FileStore, Host, PreferenceStore, ProviderId, Widget,
    provider::default_source_from_config,
};

use crate::host::{PageHost, summary};

const ELEMENT_TAG: &str = "city-weather";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "city-weather", version, about = "City weather widget")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ToggleTarget {
    Theme,
    Unit,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: String,
    },

    /// Render the widget for a location.
    Show {
        /// Location name; falls back to the configured default.
        location: Option<String>,

        /// Write a standalone HTML page instead of printing the markup.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Flip a stored preference and render the widget with it.
    Toggle {
        #[arg(value_enum)]
        target: ToggleTarget,

        location: Option<String>,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Drive the widget from prompts.
    Interactive {
        location: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { location, out } => {
                let mut widget = mount(location.as_deref())?;
                widget.settle().await;
                emit(widget.host(), out)
            }
            Command::Toggle { target, location, out } => {
                let mut widget = mount(location.as_deref())?;
                widget.settle().await;
                match target {
                    ToggleTarget::Theme => {
                        widget.toggle_theme();
                    }
                    ToggleTarget::Unit => {
                        widget.toggle_unit();
                    }
                }
                widget.settle().await;
                emit(widget.host(), out)
            }
            Command::Interactive { location } => interactive(location.as_deref()).await,
        }
    }
}

fn configure(provider: &str) -> Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut cfg = Config::load()?;

    let api_key = Password::new(&format!("{id} API key:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    cfg.upsert_provider_api_key(id, api_key.trim().to_string());
    cfg.save()?;

    println!("Saved API key for {id} to {}", Config::config_file_path()?.display());
    Ok(())
}

fn mount(location: Option<&str>) -> Result<Widget<PageHost>> {
    let cfg = Config::load()?;
    let source = default_source_from_config(&cfg)?;
    let prefs: Arc<dyn PreferenceStore> = Arc::new(FileStore::open_default()?);

    let mut host = PageHost::new(ELEMENT_TAG);
    if let Some(location) = location {
        host.set_attribute(&cfg.widget.location_attribute, location);
    }

    Ok(Widget::mount(host, source, prefs, cfg.widget, location))
}

fn emit(host: &PageHost, out: Option<PathBuf>) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(&path, host.page())
                .with_context(|| format!("Failed to write page: {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", host.markup()),
    }
    Ok(())
}

async fn interactive(location: Option<&str>) -> Result<()> {
    const SEARCH: &str = "Search location";
    const THEME: &str = "Toggle theme";
    const UNIT: &str = "Toggle unit";
    const QUIT: &str = "Quit";

    let mut widget = mount(location)?;

    loop {
        widget.settle().await;
        println!("\n{}\n", summary(widget.state(), widget.view()));

        let choice = Select::new("Action:", vec![SEARCH, THEME, UNIT, QUIT]).prompt()?;
        match choice {
            SEARCH => {
                let input = Text::new("Location:")
                    .with_initial_value(widget.state().location())
                    .prompt()?;
                if widget.submit_location(&input).is_none() {
                    println!("Location must not be empty.");
                }
            }
            THEME => {
                widget.toggle_theme();
            }
            UNIT => {
                widget.toggle_unit();
            }
            _ => break,
        }
    }

    Ok(())
}
