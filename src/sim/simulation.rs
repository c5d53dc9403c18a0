//! The simulation driver: saturated stations over slotted channels.
//!
//! 仿真驱动：在时隙信道上运行的饱和站点。

use super::channel::SlottedChannel;
use super::rate_control::RetryLimitManager;
use super::results::{NetworkReport, ResultsAggregator, RunReport, StationReport};
use super::scheduler::EventQueue;
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::mac::{Frame, MacAddress, MacContext, MacEvent, SeededDeviate, Station, StationId};
use crate::time::SimTime;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug)]
enum Event {
    Slot {
        network: u32,
    },
    TxEnd {
        network: u32,
        outcomes: Vec<(StationId, MacEvent)>,
    },
}

#[derive(Debug)]
struct Network {
    channel: SlottedChannel,
    stations: Vec<Station>,
    remote: RetryLimitManager,
    access_point: MacAddress,
    stats_reset_pending: bool,
}

/// Address every station of `network` sends to.
pub fn access_point(network: u32) -> MacAddress {
    MacAddress::local(network, 0x00ff_ffff)
}

fn station_seed(seed: u64, id: StationId) -> u64 {
    seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ ((u64::from(id.network) << 32) | u64::from(id.station))
}

/// One run of the reference harness.
///
/// 参考仿真框架的一次运行。
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    queue: EventQueue<Event>,
    networks: Vec<Network>,
    results: ResultsAggregator,
    payload: Bytes,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut networks = Vec::with_capacity(config.networks as usize);
        for n in 0..config.networks {
            let stations = (0..config.stations_per_network)
                .map(|s| {
                    let id = StationId::new(n, s);
                    Station::new(
                        id,
                        MacAddress::local(n, s),
                        config.mac.clone(),
                        Box::new(SeededDeviate::new(station_seed(config.seed, id))),
                    )
                })
                .collect::<Result<Vec<_>>>()?;
            networks.push(Network {
                channel: SlottedChannel::new(
                    n,
                    stations.len(),
                    config.phy.clone(),
                    config.frame_error_rate,
                    !station_seed(config.seed, StationId::new(n, u32::MAX)),
                ),
                stations,
                remote: RetryLimitManager::new(config.retry.clone()),
                access_point: access_point(n),
                stats_reset_pending: config.stats_reset_at.is_some(),
            });
        }
        Ok(Self {
            payload: Bytes::from(vec![0u8; config.traffic.payload_size]),
            config,
            queue: EventQueue::new(),
            networks,
            results: ResultsAggregator::new(),
        })
    }

    /// Runs until the configured duration and reports.
    /// 运行至配置的时长并生成报告。
    pub fn run(mut self) -> RunReport {
        info!(
            seed = self.config.seed,
            networks = self.config.networks,
            stations = self.config.stations_per_network,
            eca = self.config.mac.eca.enabled,
            schedule_reset = self.config.mac.schedule_reset.enabled,
            "simulation started"
        );
        for n in 0..self.networks.len() {
            self.start_network(n);
            self.queue.schedule(SimTime::ZERO, Event::Slot { network: n as u32 });
        }

        let end = SimTime::from(self.config.duration);
        while self.queue.peek_time().is_some_and(|at| at < end) {
            let Some((now, event)) = self.queue.pop() else {
                break;
            };
            match event {
                Event::Slot { network } => self.on_slot(network as usize, now),
                Event::TxEnd { network, outcomes } => {
                    self.on_tx_end(network as usize, now, outcomes)
                }
            }
        }

        let report = self.report();
        info!(
            seed = report.seed,
            totals = %report.totals(),
            failure_fraction = report.failure_fraction(),
            "simulation finished"
        );
        report
    }

    fn start_network(&mut self, n: usize) {
        let network = &mut self.networks[n];
        let (arbiter, low) = network.channel.parts();
        let mut ctx = MacContext {
            now: SimTime::ZERO,
            arbiter,
            low,
            remote: &mut network.remote,
            trace: &mut self.results,
        };
        for station in &mut network.stations {
            station.start(&mut ctx);
        }
    }

    fn on_slot(&mut self, n: usize, now: SimTime) {
        let reset_at = self.config.stats_reset_at;
        let backlog = self.config.traffic.backlog;
        let network = &mut self.networks[n];

        if network.stats_reset_pending && reset_at.is_some_and(|at| now >= SimTime::from(at)) {
            network.stats_reset_pending = false;
            network.stations.iter_mut().for_each(Station::reset_counters);
            self.results.reset_network(n as u32);
            debug!(network = n, %now, "statistics reset");
        }

        {
            let (arbiter, low) = network.channel.parts();
            let mut ctx = MacContext {
                now,
                arbiter,
                low,
                remote: &mut network.remote,
                trace: &mut self.results,
            };
            for station in &mut network.stations {
                while station.queue_len() < backlog {
                    let frame = Frame::new(
                        station.address(),
                        network.access_point,
                        0,
                        self.payload.clone(),
                    );
                    station.enqueue(frame, &mut ctx);
                }
            }
        }

        let granted = network.channel.begin_slot();
        {
            let (arbiter, low) = network.channel.parts();
            let mut ctx = MacContext {
                now,
                arbiter,
                low,
                remote: &mut network.remote,
                trace: &mut self.results,
            };
            for id in granted {
                network.stations[id.station as usize].handle_event(MacEvent::AccessGranted, &mut ctx);
            }
        }

        let resolution = network.channel.resolve_slot();
        let next = now + resolution.duration;
        let event = if resolution.outcomes.is_empty() {
            Event::Slot { network: n as u32 }
        } else {
            Event::TxEnd {
                network: n as u32,
                outcomes: resolution.outcomes,
            }
        };
        self.queue.schedule(next, event);
    }

    fn on_tx_end(&mut self, n: usize, now: SimTime, outcomes: Vec<(StationId, MacEvent)>) {
        let network = &mut self.networks[n];
        let (arbiter, low) = network.channel.parts();
        let mut ctx = MacContext {
            now,
            arbiter,
            low,
            remote: &mut network.remote,
            trace: &mut self.results,
        };
        for (id, event) in outcomes {
            network.stations[id.station as usize].handle_event(event, &mut ctx);
        }
        self.queue.schedule(now, Event::Slot { network: n as u32 });
    }

    fn report(&self) -> RunReport {
        let measured = self
            .config
            .duration
            .saturating_sub(self.config.stats_reset_at.unwrap_or(Duration::ZERO));
        let networks = self
            .networks
            .iter()
            .enumerate()
            .map(|(n, network)| {
                let stations = network
                    .stations
                    .iter()
                    .map(|station| StationReport {
                        id: station.id(),
                        counters: *station.counters(),
                        cw: station.cw(),
                        sr_reductions: station.schedule_reset().reductions(),
                        mean_time_between_successes: self
                            .results
                            .station(station.id())
                            .and_then(|r| r.mean_time_between_successes()),
                    })
                    .collect();
                NetworkReport::from_stations(n as u32, stations, measured)
            })
            .collect();
        RunReport {
            seed: self.config.seed,
            measured,
            networks,
        }
    }
}
