//! Campaign runner: many seeds, one report.
//!
//! Executes every seed in a range, checks each settled run against the
//! [`Oracle`], and records the first failing seed for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::backend::WorldConfig;
use crate::network::FaultConfig;
use crate::oracle::{InvariantViolation, Oracle, OracleResult};
use crate::{SimulationConfig, SimulationResult, SimulationStats, Simulator, TraceEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Seeds to execute, e.g. `0..100`.
    pub seed_range: Range<u64>,
    /// Rounds of user activity per seed.
    pub rounds: u64,
    pub round_ms: u64,
    pub action_rate_percent: u8,
    pub fault_max_delay: u8,
    pub fault_duplicate_percent: u8,
    pub fault_reorder_percent: u8,
    pub max_projects: u64,
    pub max_tasks_per_project: u64,
    pub session_expiry_percent: u8,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            rounds: sim.rounds,
            round_ms: sim.round_ms,
            action_rate_percent: sim.action_rate_percent,
            fault_max_delay: sim.fault.max_delay_rounds,
            fault_duplicate_percent: sim.fault.duplicate_rate_percent,
            fault_reorder_percent: sim.fault.reorder_rate_percent,
            max_projects: sim.world.max_projects,
            max_tasks_per_project: sim.world.max_tasks_per_project,
            session_expiry_percent: sim.world.session_expiry_percent,
        }
    }
}

impl CampaignConfig {
    #[must_use]
    pub const fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            rounds: self.rounds,
            round_ms: self.round_ms,
            action_rate_percent: self.action_rate_percent,
            fault: FaultConfig {
                max_delay_rounds: self.fault_max_delay,
                duplicate_rate_percent: self.fault_duplicate_percent,
                reorder_rate_percent: self.fault_reorder_percent,
            },
            world: WorldConfig {
                max_projects: self.max_projects,
                max_tasks_per_project: self.max_tasks_per_project,
                session_expiry_percent: self.session_expiry_percent,
            },
        }
    }

    /// # Errors
    ///
    /// Returns an error if any parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        for (name, percent) in [
            ("action_rate_percent", self.action_rate_percent),
            ("fault_duplicate_percent", self.fault_duplicate_percent),
            ("fault_reorder_percent", self.fault_reorder_percent),
            ("session_expiry_percent", self.session_expiry_percent),
        ] {
            if percent > 100 {
                bail!("{name} must be <= 100, got {percent}");
            }
        }
        self.sim_config_for_seed(self.seed_range.start).validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First failing seed, for prioritized replay.
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds where some reply arrived stale, duplicated or reordered.
    pub interesting_states_reached: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Replay of a single seed with everything needed to debug it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailedTrace {
    pub seed: u64,
    pub url: String,
    pub stats: SimulationStats,
    pub violations: Vec<String>,
    pub trace: Vec<TraceEvent>,
}

/// Run every seed in the config.
///
/// # Errors
///
/// Returns an error if the config is invalid.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut seeds_run = 0_usize;
    let mut seeds_passed = 0_usize;
    let mut failures = Vec::new();
    let mut interesting_states_reached = 0_usize;

    for seed in config.seed_range.clone() {
        seeds_run += 1;
        let (result, oracle) = simulate(seed, config)?;
        if result.interesting_state_reached {
            interesting_states_reached += 1;
        }
        if oracle.passed {
            seeds_passed += 1;
        } else {
            tracing::warn!(seed, violations = oracle.violations.len(), "seed failed");
            failures.push(SeedFailure {
                seed,
                violations: oracle.violations.iter().map(format_violation).collect(),
            });
        }
    }

    Ok(CampaignReport {
        seeds_run,
        seeds_passed,
        first_failure: failures.first().map(|failure| failure.seed),
        failures,
        interesting_states_reached,
    })
}

/// `Ok(())` on pass, `Err(violations)` on failure.
///
/// # Errors
///
/// The outer error is reserved for an invalid config; the inner one
/// separates a pass from invariant violations.
pub fn run_single_seed(
    seed: u64,
    config: &CampaignConfig,
) -> Result<std::result::Result<(), Vec<InvariantViolation>>> {
    let (_, oracle) = simulate(seed, config)?;
    if oracle.passed {
        Ok(Ok(()))
    } else {
        Ok(Err(oracle.violations))
    }
}

/// Re-run one seed and keep the full trace.
///
/// # Errors
///
/// Returns an error when config validation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    config.validate()?;
    let (result, oracle) = simulate(seed, config)?;
    Ok(DetailedTrace {
        seed,
        url: result.url,
        stats: result.stats,
        violations: oracle.violations.iter().map(format_violation).collect(),
        trace: result.trace,
    })
}

fn simulate(seed: u64, config: &CampaignConfig) -> Result<(SimulationResult, OracleResult)> {
    let result = Simulator::new(config.sim_config_for_seed(seed))?.run();
    let oracle = Oracle::check_all(&result);
    Ok((result, oracle))
}

#[must_use]
pub fn format_violation(violation: &InvariantViolation) -> String {
    match violation {
        InvariantViolation::FanIn {
            resource,
            keys,
            expected,
            actual,
        } => {
            let keys: Vec<u64> = keys.iter().map(|key| key.get()).collect();
            format!(
                "FanIn: {resource} for keys {keys:?} is {actual:?}, \
                 backend union is {expected:?}"
            )
        }
        InvariantViolation::Search {
            query,
            expected,
            actual,
        } => {
            let expected: Vec<u64> = expected.iter().map(|id| id.0).collect();
            let actual: Vec<u64> = actual.iter().map(|id| id.0).collect();
            format!("Search: results for {query:?} are {actual:?}, expected {expected:?}")
        }
        InvariantViolation::NotQuiescent {
            pending_replies,
            pending_timers,
        } => format!(
            "NotQuiescent: {pending_replies} replies and {pending_timers} timers outstanding"
        ),
        InvariantViolation::Unsettled { route, commands } => {
            format!("Unsettled: {route} still plans [{}]", commands.join(", "))
        }
        InvariantViolation::StillLoading { what } => format!("StillLoading: {what}"),
        InvariantViolation::AddressBar { url, route } => {
            format!("AddressBar: url {url} does not parse to route {route}")
        }
    }
}
