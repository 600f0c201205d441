//! Configuration validation

use super::*;
use crate::sampler::Problem;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_group(&config.group)?;
    validate_run(&config.run)?;

    let collector = config.collector();
    if collector >= config.group.ranks {
        anyhow::bail!(
            "collector {} is not a rank of a {}-rank group",
            collector,
            config.group.ranks
        );
    }

    let ranks = config.group.ranks as u64;
    if config.run.problem == Problem::Integral && config.run.trials.checked_mul(ranks).is_none() {
        anyhow::bail!(
            "{} cells on each of {} ranks overflows the integral's cell count",
            config.run.trials,
            ranks
        );
    }

    for strategy in config.strategies() {
        if config.policy_for(strategy).producers(config.group.ranks) == 0 {
            tracing::warn!(
                %strategy,
                "no rank samples: the only rank is an excluded collector"
            );
        }
    }

    Ok(())
}

/// Validate group configuration
pub fn validate_group(group: &GroupConfig) -> Result<()> {
    if group.ranks == 0 {
        anyhow::bail!("ranks must be at least 1");
    }

    if group.stall_timeout_ms == Some(0) {
        anyhow::bail!("stall_timeout_ms must be greater than 0");
    }

    Ok(())
}

/// Validate run configuration
pub fn validate_run(run: &RunConfig) -> Result<()> {
    if run.rounds == 0 {
        anyhow::bail!("rounds must be at least 1");
    }

    if run.trials == 0 {
        tracing::warn!("trials is 0: every round will report a degenerate estimate");
    }

    Ok(())
}
