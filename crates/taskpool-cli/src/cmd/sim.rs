//! `tp sim`: deterministic simulation campaigns.
//!
//! Without `--replay` a campaign runs across a seed range; with it, one
//! seed is re-run and its full trace printed.

use std::io::{self, Write};

use anyhow::{Result, anyhow};
use clap::Args;
use serde::Serialize;
use taskpool_core::error::ErrorCode;
use taskpool_sim::campaign::{self, CampaignConfig, CampaignReport, DetailedTrace};
use taskpool_sim::TraceEventKind;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Failures listed before the output is truncated.
const FAILURE_SAMPLES: usize = 5;

#[derive(Args, Debug)]
pub struct SimArgs {
    /// Number of seeds to run.
    #[arg(long, default_value = "100")]
    pub seeds: u64,

    /// Starting seed value.
    #[arg(long, default_value = "0")]
    pub seed_start: u64,

    /// Re-run one seed and print its trace.
    #[arg(long, value_name = "SEED")]
    pub replay: Option<u64>,

    /// Rounds of user activity per seed.
    #[arg(long, default_value = "60")]
    pub rounds: u64,

    /// Chance per round that the user does something, in percent.
    #[arg(long, default_value = "40")]
    pub action_rate: u8,

    /// Maximum reply delay in rounds.
    #[arg(long, default_value = "4")]
    pub max_delay: u8,

    /// Chance a reply is delivered twice, in percent.
    #[arg(long, default_value = "5")]
    pub duplicate: u8,

    /// Chance a round's deliveries are shuffled, in percent.
    #[arg(long, default_value = "30")]
    pub reorder: u8,

    /// Chance per request that the session expires, in percent.
    #[arg(long, default_value = "0")]
    pub expiry: u8,
}

impl SimArgs {
    fn campaign_config(&self) -> CampaignConfig {
        let start = self.replay.unwrap_or(self.seed_start);
        let count = if self.replay.is_some() { 1 } else { self.seeds };
        CampaignConfig {
            seed_range: start..start.saturating_add(count),
            rounds: self.rounds,
            action_rate_percent: self.action_rate,
            fault_max_delay: self.max_delay,
            fault_duplicate_percent: self.duplicate,
            fault_reorder_percent: self.reorder,
            session_expiry_percent: self.expiry,
            ..CampaignConfig::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct RunOutput {
    seeds_run: usize,
    seeds_passed: usize,
    seeds_failed: usize,
    first_failure: Option<u64>,
    interesting_states_reached: usize,
    all_passed: bool,
    failures: Vec<FailureOutput>,
}

#[derive(Debug, Serialize)]
struct FailureOutput {
    seed: u64,
    violations: Vec<String>,
}

impl From<&CampaignReport> for RunOutput {
    fn from(report: &CampaignReport) -> Self {
        Self {
            seeds_run: report.seeds_run,
            seeds_passed: report.seeds_passed,
            seeds_failed: report.failures.len(),
            first_failure: report.first_failure,
            interesting_states_reached: report.interesting_states_reached,
            all_passed: report.all_passed(),
            failures: report
                .failures
                .iter()
                .map(|failure| FailureOutput {
                    seed: failure.seed,
                    violations: failure.violations.clone(),
                })
                .collect(),
        }
    }
}

/// Returns an error tagged [`ErrorCode::SimulationFailed`] when any seed
/// breaks an invariant, after the report has been printed.
pub fn run_sim(args: &SimArgs, output: OutputMode) -> Result<()> {
    let config = args.campaign_config();
    match args.replay {
        Some(seed) => run_replay(seed, &config, output),
        None => run_campaign(args, &config, output),
    }
}

fn run_campaign(args: &SimArgs, config: &CampaignConfig, output: OutputMode) -> Result<()> {
    let report = campaign::run_campaign(config)?;
    let out = RunOutput::from(&report);
    render_mode(
        output,
        &out,
        |out, w| render_run_text(out, args, w),
        |out, w| render_run_pretty(out, args, w),
    )?;

    match out.first_failure {
        None => Ok(()),
        Some(seed) => Err(anyhow!(
            "{} of {} seeds failed, first at seed {seed}",
            out.seeds_failed,
            out.seeds_run
        )
        .context(ErrorCode::SimulationFailed)),
    }
}

fn run_replay(seed: u64, config: &CampaignConfig, output: OutputMode) -> Result<()> {
    let trace = campaign::replay_seed(seed, config)?;
    render_mode(output, &trace, render_replay_text, render_replay_pretty)?;
    if trace.violations.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("seed {seed} broke {} invariants", trace.violations.len())
            .context(ErrorCode::SimulationFailed))
    }
}

fn render_run_text(out: &RunOutput, args: &SimArgs, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "campaign seeds_run={} rounds={} max_delay={} duplicate_pct={} reorder_pct={} expiry_pct={}",
        out.seeds_run, args.rounds, args.max_delay, args.duplicate, args.reorder, args.expiry
    )?;
    writeln!(
        w,
        "results passed={} failed={} interesting_states={} all_passed={}",
        out.seeds_passed, out.seeds_failed, out.interesting_states_reached, out.all_passed
    )?;
    for failure in out.failures.iter().take(FAILURE_SAMPLES) {
        writeln!(
            w,
            "failure seed={} violations={}",
            failure.seed,
            failure.violations.len()
        )?;
    }
    if out.failures.len() > FAILURE_SAMPLES {
        writeln!(
            w,
            "failures_truncated count={}",
            out.failures.len() - FAILURE_SAMPLES
        )?;
    }
    if let Some(seed) = out.first_failure {
        writeln!(w, "hint replay_seed={seed} rounds={}", args.rounds)?;
    }
    Ok(())
}

fn render_run_pretty(out: &RunOutput, args: &SimArgs, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Simulation Campaign")?;
    pretty_kv(w, "Seeds", out.seeds_run.to_string())?;
    pretty_kv(w, "Rounds", args.rounds.to_string())?;
    pretty_kv(
        w,
        "Faults",
        format!(
            "delay<={} dup {}% reorder {}% expiry {}%",
            args.max_delay, args.duplicate, args.reorder, args.expiry
        ),
    )?;
    pretty_kv(
        w,
        "Results",
        format!(
            "{} passed / {} failed ({} interesting states)",
            out.seeds_passed, out.seeds_failed, out.interesting_states_reached
        ),
    )?;

    let Some(first) = out.first_failure else {
        return pretty_kv(w, "Status", "all seeds passed");
    };
    pretty_kv(
        w,
        "Status",
        format!("{} failures (first at seed {first})", out.seeds_failed),
    )?;
    writeln!(w)?;
    pretty_section(w, "Failure Samples")?;
    for failure in out.failures.iter().take(FAILURE_SAMPLES) {
        writeln!(w, "seed {:<8} violations={}", failure.seed, failure.violations.len())?;
        for violation in &failure.violations {
            writeln!(w, "  - {violation}")?;
        }
    }
    if out.failures.len() > FAILURE_SAMPLES {
        writeln!(w, "... and {} more failures", out.failures.len() - FAILURE_SAMPLES)?;
    }
    writeln!(w)?;
    pretty_kv(
        w,
        "Replay",
        format!("tp sim --replay {first} --rounds {}", args.rounds),
    )
}

fn render_replay_text(trace: &DetailedTrace, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "replay seed={} events={} fetches={} stale={} url={}",
        trace.seed,
        trace.trace.len(),
        trace.stats.fetches,
        trace.stats.stale_deliveries,
        trace.url
    )?;
    for violation in &trace.violations {
        writeln!(w, "violation {violation}")?;
    }
    Ok(())
}

fn render_replay_pretty(trace: &DetailedTrace, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Replay seed {}", trace.seed))?;
    for event in &trace.trace {
        writeln!(
            w,
            "r{:<4} t={:<6} {}",
            event.round,
            event.now,
            describe(&event.kind)
        )?;
    }
    writeln!(w)?;
    pretty_section(w, "Outcome")?;
    pretty_kv(w, "Address", &trace.url)?;
    pretty_kv(w, "Fetches", trace.stats.fetches.to_string())?;
    pretty_kv(
        w,
        "Stale",
        format!(
            "{} of {} deliveries",
            trace.stats.stale_deliveries, trace.stats.delivered
        ),
    )?;
    if trace.violations.is_empty() {
        return pretty_kv(w, "Oracle", "passed");
    }
    pretty_kv(w, "Oracle", format!("{} violations", trace.violations.len()))?;
    for violation in &trace.violations {
        writeln!(w, "  - {violation}")?;
    }
    Ok(())
}

fn describe(kind: &TraceEventKind) -> String {
    match kind {
        TraceEventKind::Action { msg } => format!("action {msg:?}"),
        TraceEventKind::Fetch { request, token } => format!("fetch {request:?} as {token}"),
        TraceEventKind::Delivered { token, stale } => {
            if *stale {
                format!("deliver {token} (stale)")
            } else {
                format!("deliver {token}")
            }
        }
        TraceEventKind::Duplicated { token } => format!("duplicate {token}"),
        TraceEventKind::Reordered { count } => format!("reorder {count} replies"),
        TraceEventKind::Timer { msg } => format!("timer {msg:?}"),
        TraceEventKind::Url { url } => format!("url {url}"),
    }
}
