//! tests/common/harness.rs
use csma_eca::config::{Config, SimulationConfig};
use csma_eca::sim::{RunReport, Simulation};
use std::sync::Once;
use std::time::Duration;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "csma_eca=info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// A test harness to simplify building and running saturated scenarios.
pub struct TestHarness {
    pub config: SimulationConfig,
}

impl TestHarness {
    /// Legacy DCF with `stations` saturated stations in one network.
    pub fn dcf(stations: u32) -> Self {
        init_tracing();
        Self {
            config: SimulationConfig {
                stations_per_network: stations,
                duration: Duration::from_millis(500),
                stats_reset_at: Some(Duration::from_millis(100)),
                seed: 7,
                ..SimulationConfig::default()
            },
        }
    }

    /// CSMA/ECA without hysteresis, otherwise like [`TestHarness::dcf`].
    pub fn eca(stations: u32) -> Self {
        let mut harness = Self::dcf(stations);
        harness.config.mac = eca_mac();
        harness
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn run(&self) -> RunReport {
        Simulation::new(self.config.clone())
            .expect("valid scenario")
            .run()
    }
}

pub fn eca_mac() -> Config {
    let mut mac = Config::default();
    mac.eca.enabled = true;
    mac
}
