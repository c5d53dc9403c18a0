//! Independent replications run concurrently.
//!
//! 并发运行的独立重复实验。

use super::results::RunReport;
use super::simulation::Simulation;
use crate::config::SimulationConfig;
use crate::error::Result;
use tokio::task::JoinSet;
use tracing::info;

/// Runs one simulation per seed on the blocking pool and returns the
/// reports ordered by seed. Runs share nothing.
///
/// 每个种子在阻塞线程池上运行一次仿真，并按种子顺序返回报告。各次运行互不共享状态。
pub async fn run_replications(
    config: SimulationConfig,
    seeds: impl IntoIterator<Item = u64>,
) -> Result<Vec<RunReport>> {
    config.validate()?;
    let mut tasks = JoinSet::new();
    for seed in seeds {
        let config = SimulationConfig {
            seed,
            ..config.clone()
        };
        tasks.spawn_blocking(move || Simulation::new(config).map(Simulation::run));
    }
    info!(replications = tasks.len(), "replications spawned");

    let mut reports = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        reports.push(joined??);
    }
    reports.sort_by_key(|report| report.seed);
    Ok(reports)
}
