#![forbid(unsafe_code)]

use anyhow::Result;
use taskpool_sim::campaign::{CampaignConfig, run_campaign};

fn main() -> Result<()> {
    let report = run_campaign(&CampaignConfig::default())?;

    println!(
        "campaign complete: seeds={} passed={} interesting={} first_failure={}",
        report.seeds_run,
        report.seeds_passed,
        report.interesting_states_reached,
        report
            .first_failure
            .map_or_else(|| "none".to_string(), |seed| seed.to_string()),
    );

    if report.all_passed() {
        Ok(())
    } else {
        anyhow::bail!("{} seed(s) failed", report.failures.len())
    }
}
