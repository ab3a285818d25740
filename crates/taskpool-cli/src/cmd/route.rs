//! `tp route`: inspect the location codec.
//!
//! `tp route parse <url>` shows the route a URL maps to and whether the
//! address bar would be rewritten. `tp route format <json>` goes the other
//! way.

use std::io::Write;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Subcommand};
use serde::Serialize;
use taskpool_core::error::ErrorCode;
use taskpool_core::route::{self, Location, ParseResult, Route};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct RouteArgs {
    #[command(subcommand)]
    pub command: RouteCommand,
}

#[derive(Subcommand, Debug)]
pub enum RouteCommand {
    /// Parse a URL into a route.
    #[command(
        after_help = "EXAMPLES:\n    # Canonical member URL\n    tp route parse '/app/pool?project=2'\n\n\
                      # Legacy hash URL, reported as a redirect\n    tp route parse '/#/admin/members'"
    )]
    Parse {
        /// Path with optional `?query` and `#fragment`.
        url: String,
    },

    /// Format a route (JSON) as its canonical URL.
    #[command(
        after_help = "EXAMPLES:\n    tp route format '{\"route\":\"org\",\"section\":\"invites\"}'"
    )]
    Format {
        /// Route as JSON, tagged by `route`.
        route: String,
    },
}

#[derive(Debug, Serialize)]
struct RouteOutput {
    input: String,
    /// `parsed` when the input is canonical, `redirect` otherwise.
    outcome: &'static str,
    route: Route,
    canonical: String,
    title: String,
}

impl RouteOutput {
    fn new(input: String, outcome: &'static str, route: Route) -> Self {
        Self {
            input,
            outcome,
            canonical: route::format(&route),
            title: route.title(),
            route,
        }
    }
}

pub fn run_route(args: &RouteArgs, output: OutputMode) -> Result<()> {
    let out = match &args.command {
        RouteCommand::Parse { url } => parse_url(url)?,
        RouteCommand::Format { route } => {
            let parsed: Route = serde_json::from_str(route)
                .with_context(|| format!("route JSON {route:?}"))
                .context(ErrorCode::InvalidLocation)?;
            RouteOutput::new(route.clone(), "formatted", parsed)
        }
    };
    render_mode(output, &out, render_text, render_pretty)
}

fn parse_url(url: &str) -> Result<RouteOutput> {
    if url.trim().is_empty() {
        return Err(anyhow!("empty URL")).context(ErrorCode::InvalidLocation);
    }
    let location = Location::parse_url(url);
    if !location.path.starts_with('/') {
        return Err(anyhow!("{url:?} is not an absolute path")).context(ErrorCode::InvalidLocation);
    }
    let out = match route::parse(&location) {
        ParseResult::Parsed(route) => RouteOutput::new(url.to_string(), "parsed", route),
        ParseResult::Redirect(route) => RouteOutput::new(url.to_string(), "redirect", route),
    };
    tracing::debug!(input = url, outcome = out.outcome, canonical = %out.canonical, "parsed location");
    Ok(out)
}

fn render_text(out: &RouteOutput, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "route outcome={} canonical={} title={:?}",
        out.outcome, out.canonical, out.title
    )
}

fn render_pretty(out: &RouteOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Route")?;
    pretty_kv(w, "Input", &out.input)?;
    pretty_kv(w, "Outcome", out.outcome)?;
    pretty_kv(w, "Canonical", &out.canonical)?;
    pretty_kv(w, "Title", &out.title)
}
