//! `tp plan`: run the hydration planner against a saved snapshot.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use taskpool_core::command::Command;
use taskpool_core::error::ErrorCode;
use taskpool_core::plan;
use taskpool_core::route::{self, Location, ParseResult, Route};
use taskpool_core::snapshot::Snapshot;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Location to plan for.
    pub url: String,

    /// Snapshot JSON file, or `-` for stdin. Defaults to a fresh session.
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    route: Route,
    canonical: String,
    /// Set when the URL was not canonical.
    #[serde(skip_serializing_if = "Option::is_none")]
    redirected_from: Option<String>,
    commands: Vec<Command>,
}

pub fn run_plan(args: &PlanArgs, output: OutputMode) -> Result<()> {
    let snapshot = match args.snapshot.as_deref() {
        Some(source) => load_snapshot(source)?,
        None => Snapshot::default(),
    };
    let out = plan_for(&args.url, &snapshot);
    tracing::info!(route = %out.canonical, commands = out.commands.len(), "planned");
    render_mode(output, &out, render_text, render_pretty)
}

fn plan_for(url: &str, snapshot: &Snapshot) -> PlanOutput {
    let (route, redirected_from) = match route::parse(&Location::parse_url(url)) {
        ParseResult::Parsed(route) => (route, None),
        ParseResult::Redirect(route) => (route, Some(url.to_string())),
    };
    PlanOutput {
        commands: plan(&route, snapshot),
        canonical: route::format(&route),
        route,
        redirected_from,
    }
}

fn load_snapshot(source: &str) -> Result<Snapshot> {
    let content = if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read snapshot from stdin")?;
        buf
    } else {
        let path = Path::new(source);
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&content)
        .with_context(|| format!("snapshot {source}"))
        .context(ErrorCode::SnapshotParseError)
}

fn render_text(out: &PlanOutput, w: &mut dyn Write) -> io::Result<()> {
    if let Some(from) = &out.redirected_from {
        writeln!(w, "redirect from={from} to={}", out.canonical)?;
    }
    for command in &out.commands {
        writeln!(w, "{command}")?;
    }
    Ok(())
}

fn render_pretty(out: &PlanOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Hydration plan")?;
    pretty_kv(w, "Route", &out.canonical)?;
    if let Some(from) = &out.redirected_from {
        pretty_kv(w, "Redirected", from)?;
    }
    if out.commands.is_empty() {
        return pretty_kv(w, "Commands", "none (settled)");
    }
    pretty_kv(w, "Commands", out.commands.len().to_string())?;
    for command in &out.commands {
        writeln!(w, "  - {command}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpool_core::model::Role;
    use taskpool_core::snapshot::AuthState;

    #[test]
    fn fresh_session_fetches_me() {
        let out = plan_for("/app/pool", &Snapshot::default());
        assert_eq!(out.commands, vec![Command::FetchMe]);
        assert!(out.redirected_from.is_none());
    }

    #[test]
    fn deprecated_slug_is_reported() {
        let out = plan_for("/app/bar", &Snapshot::default());
        assert_eq!(out.redirected_from.as_deref(), Some("/app/bar"));
        assert_eq!(out.canonical, "/app/my-bar");
    }

    #[test]
    fn snapshot_file_is_loaded() {
        let snapshot = Snapshot {
            auth: AuthState::Authed(Role::Member),
            ..Snapshot::default()
        };
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "{}", serde_json::to_string(&snapshot).expect("json")).expect("write");
        let path = file.path().to_string_lossy().into_owned();
        assert_eq!(load_snapshot(&path).expect("load"), snapshot);
    }

    #[test]
    fn malformed_snapshot_carries_code() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "{{ not json").expect("write");
        let path = file.path().to_string_lossy().into_owned();
        let err = load_snapshot(&path).expect_err("malformed");
        assert_eq!(
            err.downcast_ref::<ErrorCode>(),
            Some(&ErrorCode::SnapshotParseError)
        );
    }
}
