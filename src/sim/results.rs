//! 结果汇总：追踪事件的聚合与运行报告。
//! Results: trace aggregation and run reports.

use crate::mac::{StationCounters, StationId, TraceEvent, TraceKind, TraceSink};
use crate::time::SimTime;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// What the trace stream says about one station.
///
/// 追踪事件流所反映的单个站点情况。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationResults {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub collisions: u64,
    pub backoffs_assigned: u64,
    pub bitmaps_evaluated: u64,
    pub sr_reduction_attempts: u64,
    pub sr_reductions: u64,
    pub sr_reductions_failed: u64,
    pub fs_aggregations: u64,
    pub fs_aggregated_msdus: u64,
    pub last_success: Option<SimTime>,
    pub last_failure: Option<SimTime>,
    pub last_collision: Option<SimTime>,
    success_gap_total: Duration,
    success_gaps: u32,
}

impl StationResults {
    pub fn mean_time_between_successes(&self) -> Option<Duration> {
        (self.success_gaps > 0).then(|| self.success_gap_total / self.success_gaps)
    }
}

/// A [`TraceSink`] that folds events into per-station results.
///
/// 将追踪事件折叠为单站点结果的 [`TraceSink`]。
#[derive(Debug, Default)]
pub struct ResultsAggregator {
    stations: BTreeMap<StationId, StationResults>,
}

impl ResultsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn station(&self, id: StationId) -> Option<&StationResults> {
        self.stations.get(&id)
    }

    pub fn stations(&self) -> impl Iterator<Item = (&StationId, &StationResults)> {
        self.stations.iter()
    }

    /// Forgets everything recorded for `network`.
    pub fn reset_network(&mut self, network: u32) {
        self.stations.retain(|id, _| id.network != network);
    }
}

impl TraceSink for ResultsAggregator {
    fn record(&mut self, event: TraceEvent) {
        let at = event.at;
        let results = self.stations.entry(event.station).or_default();
        match event.kind {
            TraceKind::TxAttempts(n) => results.attempts = n,
            TraceKind::TxSuccesses(n) => {
                results.successes = n;
                if let Some(previous) = results.last_success {
                    results.success_gap_total += at - previous;
                    results.success_gaps += 1;
                }
                results.last_success = Some(at);
            }
            TraceKind::TxFailures(n) => {
                results.failures = n;
                results.last_failure = Some(at);
            }
            TraceKind::TxCollisions(n) => {
                results.collisions = n;
                results.last_collision = Some(at);
            }
            TraceKind::BackoffCounter(_) => results.backoffs_assigned += 1,
            TraceKind::Bitmap(_) => results.bitmaps_evaluated += 1,
            TraceKind::SrReductionAttempts(n) => results.sr_reduction_attempts = n,
            TraceKind::SrReductions(n) => results.sr_reductions = n,
            TraceKind::SrReductionFailed(n) => results.sr_reductions_failed = n,
            TraceKind::FsAggregated(count) => {
                results.fs_aggregations += 1;
                results.fs_aggregated_msdus += u64::from(count);
            }
        }
    }
}

/// Jain's fairness index `(Σx)² / (n·Σx²)`. Zero if any share is zero.
///
/// Jain 公平性指数。只要有一个份额为零即为零。
pub fn jain_fairness(shares: &[f64]) -> f64 {
    if shares.is_empty() || shares.iter().any(|&x| x == 0.0) {
        return 0.0;
    }
    let sum: f64 = shares.iter().sum();
    let squares: f64 = shares.iter().map(|x| x * x).sum();
    sum * sum / (shares.len() as f64 * squares)
}

/// `(failures + collisions) / (successes + failures + collisions)`.
pub fn failure_fraction(counters: &StationCounters) -> f64 {
    let unsuccessful = counters.failures + counters.collisions;
    let total = counters.successes + unsuccessful;
    if total == 0 {
        0.0
    } else {
        unsuccessful as f64 / total as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationReport {
    pub id: StationId,
    pub counters: StationCounters,
    pub cw: u32,
    pub sr_reductions: u64,
    pub mean_time_between_successes: Option<Duration>,
}

/// Summary of one network at the end of a run.
///
/// 运行结束时单个网络的汇总。
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkReport {
    pub network: u32,
    pub stations: Vec<StationReport>,
    /// Jain's index over per-station successes.
    pub fairness: f64,
    pub failure_fraction: f64,
    pub throughput_mbps: f64,
}

impl NetworkReport {
    pub fn from_stations(network: u32, stations: Vec<StationReport>, measured: Duration) -> Self {
        let totals = sum_counters(stations.iter().map(|s| &s.counters));
        let shares: Vec<f64> = stations
            .iter()
            .map(|s| s.counters.successes as f64)
            .collect();
        let seconds = measured.as_secs_f64();
        let throughput_mbps = if seconds > 0.0 {
            totals.delivered_bytes as f64 * 8.0 / seconds / 1e6
        } else {
            0.0
        };
        Self {
            network,
            fairness: jain_fairness(&shares),
            failure_fraction: failure_fraction(&totals),
            throughput_mbps,
            stations,
        }
    }

    pub fn totals(&self) -> StationCounters {
        sum_counters(self.stations.iter().map(|s| &s.counters))
    }
}

impl fmt::Display for NetworkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NetworkReport {{ network: {}, stations: {}, {}, fairness: {:.4}, failure_fraction: {:.4}, throughput: {:.2} Mbps }}",
            self.network,
            self.stations.len(),
            self.totals(),
            self.fairness,
            self.failure_fraction,
            self.throughput_mbps
        )
    }
}

/// Everything a run produced.
///
/// 一次运行的全部产出。
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub seed: u64,
    /// Interval over which counters were accumulated.
    pub measured: Duration,
    pub networks: Vec<NetworkReport>,
}

impl RunReport {
    pub fn totals(&self) -> StationCounters {
        sum_counters(self.networks.iter().flat_map(|n| n.stations.iter().map(|s| &s.counters)))
    }

    pub fn failure_fraction(&self) -> f64 {
        failure_fraction(&self.totals())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RunReport {{ seed: {}, measured: {:?} }}", self.seed, self.measured)?;
        for network in &self.networks {
            writeln!(f, "  {network}")?;
        }
        Ok(())
    }
}

fn sum_counters<'a>(counters: impl Iterator<Item = &'a StationCounters>) -> StationCounters {
    counters.fold(StationCounters::default(), |mut acc, c| {
        acc.tx_attempts += c.tx_attempts;
        acc.successes += c.successes;
        acc.failures += c.failures;
        acc.collisions += c.collisions;
        acc.delivered_msdus += c.delivered_msdus;
        acc.delivered_bytes += c.delivered_bytes;
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jain_fairness() {
        assert!((jain_fairness(&[5.0, 5.0, 5.0]) - 1.0).abs() < 1e-12);
        assert!((jain_fairness(&[1.0, 3.0]) - 0.8).abs() < 1e-12);
        assert_eq!(jain_fairness(&[4.0, 0.0]), 0.0);
        assert_eq!(jain_fairness(&[]), 0.0);
    }

    #[test]
    fn test_failure_fraction() {
        let counters = StationCounters {
            successes: 6,
            failures: 1,
            collisions: 3,
            ..Default::default()
        };
        assert!((failure_fraction(&counters) - 0.4).abs() < 1e-12);
        assert_eq!(failure_fraction(&StationCounters::default()), 0.0);
    }

    #[test]
    fn test_aggregator_tracks_gaps_and_resets() {
        let mut results = ResultsAggregator::new();
        let a = StationId::new(0, 0);
        let b = StationId::new(1, 0);
        for (micros, n) in [(10, 1), (30, 2), (60, 3)] {
            results.record(TraceEvent {
                at: SimTime::from_micros(micros),
                station: a,
                kind: TraceKind::TxSuccesses(n),
            });
        }
        results.record(TraceEvent {
            at: SimTime::from_micros(5),
            station: b,
            kind: TraceKind::FsAggregated(4),
        });

        let station = results.station(a).unwrap();
        assert_eq!(station.successes, 3);
        assert_eq!(
            station.mean_time_between_successes(),
            Some(Duration::from_micros(25))
        );
        assert_eq!(results.station(b).unwrap().fs_aggregated_msdus, 4);

        results.reset_network(0);
        assert!(results.station(a).is_none());
        assert!(results.station(b).is_some());
    }
}
