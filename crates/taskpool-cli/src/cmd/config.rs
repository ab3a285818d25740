use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use taskpool_core::config::{AppConfig, ConfigSource, EffectiveConfig};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show the resolved configuration and where it came from
    Show,
    /// Print the built-in defaults as a starter `taskpool.toml`
    Defaults,
}

pub fn run_config(args: &ConfigArgs, effective: &EffectiveConfig, output: OutputMode) -> Result<()> {
    match args.command {
        ConfigCommand::Show => render_mode(output, effective, render_text, render_pretty),
        ConfigCommand::Defaults => {
            let defaults = AppConfig::default();
            if output.is_json() {
                println!("{}", serde_json::to_string_pretty(&defaults)?);
            } else {
                print!("{}", to_toml(&defaults)?);
            }
            Ok(())
        }
    }
}

fn to_toml(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config as TOML")
}

fn source_label(source: &ConfigSource) -> String {
    match source {
        ConfigSource::Explicit(path) => format!("--config {}", path.display()),
        ConfigSource::WorkingDir(path) | ConfigSource::UserDir(path) => {
            path.display().to_string()
        }
        ConfigSource::Defaults => "built-in defaults".to_string(),
    }
}

fn render_text(effective: &EffectiveConfig, w: &mut dyn Write) -> io::Result<()> {
    let app = &effective.app;
    writeln!(w, "source={}", source_label(&effective.source))?;
    writeln!(w, "output={}", effective.resolved_output)?;
    writeln!(w, "search_debounce_ms={}", app.search_debounce_ms)?;
    writeln!(w, "toast_duration_ms={}", app.toast_duration_ms)?;
    writeln!(w, "toast_tick_ms={}", app.toast_tick_ms)?;
    writeln!(w, "max_redirects={}", app.max_redirects)?;
    writeln!(w, "theme={}", app.theme)?;
    writeln!(w, "locale={}", app.locale)
}

fn render_pretty(effective: &EffectiveConfig, w: &mut dyn Write) -> io::Result<()> {
    let app = &effective.app;
    pretty_section(w, "Configuration")?;
    pretty_kv(w, "Source", source_label(&effective.source))?;
    pretty_kv(w, "Output", &effective.resolved_output)?;
    pretty_kv(w, "Debounce", format!("{}ms", app.search_debounce_ms))?;
    pretty_kv(
        w,
        "Toasts",
        format!("{}ms (tick {}ms)", app.toast_duration_ms, app.toast_tick_ms),
    )?;
    pretty_kv(w, "Redirects", format!("at most {}", app.max_redirects))?;
    pretty_kv(w, "Theme", app.theme.to_string())?;
    pretty_kv(w, "Locale", app.locale.to_string())
}
