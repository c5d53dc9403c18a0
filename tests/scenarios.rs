//! End-to-end scenarios over the slotted channel.

pub mod common;

use common::harness::TestHarness;
use csma_eca::config::AggregationConfig;
use csma_eca::mac::ScheduleResetMode;

#[test]
fn test_eca_collides_less_than_dcf() {
    let dcf = TestHarness::dcf(8).run();
    let mut eca = TestHarness::eca(8);
    eca.config.mac.eca.hysteresis = true;
    let eca = eca.run();
    tracing::info!(%dcf, %eca, "dcf vs eca");

    assert!(dcf.totals().collisions > 0);
    assert!(eca.failure_fraction() < dcf.failure_fraction());
    assert!(eca.totals().delivered_bytes > dcf.totals().delivered_bytes);
}

#[test]
fn test_eca_converges_to_collision_free_schedule() {
    // 4 stations fit in one cw_min cycle of 8 deterministic slots.
    let report = TestHarness::eca(4).run();
    assert!(report.totals().successes > 500);
    assert!(report.failure_fraction() < 0.05, "{report}");
    assert!(report.networks[0].fairness > 0.95, "{report}");
}

#[test]
fn test_per_station_conservation() {
    let report = TestHarness::eca(6).run();
    for station in &report.networks[0].stations {
        let c = station.counters;
        let resolved = c.successes + c.failures + c.collisions;
        assert!(c.tx_attempts - resolved <= 1, "{} {c}", station.id);
        assert!(station.cw >= 15 && station.cw <= 1023);
    }
}

#[test]
fn test_same_seed_same_report() {
    let a = TestHarness::dcf(5).with_seed(11).run();
    let b = TestHarness::dcf(5).with_seed(11).run();
    let c = TestHarness::dcf(5).with_seed(12).run();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_schedule_reset_keeps_windows_in_range() {
    for mode in [ScheduleResetMode::Halving, ScheduleResetMode::Reset] {
        let mut harness = TestHarness::eca(12);
        harness.config.mac.eca.hysteresis = true;
        harness.config.mac.schedule_reset.enabled = true;
        harness.config.mac.schedule_reset.mode = mode;
        let report = harness.run();
        for station in &report.networks[0].stations {
            assert_eq!(station.cw % 2, 1);
            assert!((15..=1023).contains(&station.cw));
        }
        assert!(report.totals().successes > 0);
    }
}

#[test]
fn test_fair_share_aggregation_delivers_more_msdus_than_transmissions() {
    let mut harness = TestHarness::eca(8);
    harness.config.mac.eca.hysteresis = true;
    harness.config.mac.aggregation = AggregationConfig {
        enabled: true,
        fair_share: true,
        ..AggregationConfig::default()
    };
    harness.config.traffic.backlog = 32;
    let report = harness.run();
    let totals = report.totals();
    assert!(totals.delivered_msdus > totals.successes);
}
