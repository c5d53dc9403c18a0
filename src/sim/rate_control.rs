//! Retry-limit rate control.
//!
//! 基于重传上限的速率控制。

use crate::config::RetryConfig;
use crate::mac::{Frame, RemoteStationManager, StationId};
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default)]
struct RetryCounters {
    /// Station short retry count (RTS).
    ssrc: u32,
    /// Station long retry count (data).
    slrc: u32,
}

/// Counts retries per station and gives up after the configured limits.
/// Frames are never fragmented.
///
/// 按站点统计重传次数，并在达到配置上限后放弃。帧从不分片。
#[derive(Debug, Clone)]
pub struct RetryLimitManager {
    config: RetryConfig,
    counters: HashMap<StationId, RetryCounters>,
    dropped: u64,
}

impl RetryLimitManager {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            counters: HashMap::new(),
            dropped: 0,
        }
    }

    /// Frames given up on after exhausting a retry limit.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn counters(&self, station: StationId) -> RetryCounters {
        self.counters.get(&station).copied().unwrap_or_default()
    }

    fn counters_mut(&mut self, station: StationId) -> &mut RetryCounters {
        self.counters.entry(station).or_default()
    }
}

impl RemoteStationManager for RetryLimitManager {
    fn need_rts(&self, _station: StationId, frame: &Frame) -> bool {
        frame.len() > self.config.rts_threshold
    }

    fn need_rts_retransmission(&self, station: StationId, _frame: &Frame) -> bool {
        self.counters(station).ssrc < self.config.max_rts_retries
    }

    fn need_data_retransmission(&self, station: StationId, _frame: &Frame) -> bool {
        self.counters(station).slrc < self.config.max_data_retries
    }

    fn fragment_count(&self, _station: StationId, _frame: &Frame) -> u8 {
        1
    }

    fn report_rts_failed(&mut self, station: StationId, _frame: &Frame) {
        self.counters_mut(station).ssrc += 1;
    }

    fn report_data_failed(&mut self, station: StationId, _frame: &Frame) {
        self.counters_mut(station).slrc += 1;
    }

    fn report_data_ok(&mut self, station: StationId, _frame: &Frame) {
        *self.counters_mut(station) = RetryCounters::default();
    }

    fn report_final_rts_failed(&mut self, station: StationId, frame: &Frame) {
        self.counters_mut(station).ssrc = 0;
        self.dropped += 1;
        trace!(%station, seq = frame.sequence, "rts retry limit exhausted");
    }

    fn report_final_data_failed(&mut self, station: StationId, frame: &Frame) {
        self.counters_mut(station).slrc = 0;
        self.dropped += 1;
        trace!(%station, seq = frame.sequence, "data retry limit exhausted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::MacAddress;
    use bytes::Bytes;

    #[test]
    fn test_data_retry_limit() {
        let mut manager = RetryLimitManager::new(RetryConfig {
            max_data_retries: 2,
            ..RetryConfig::default()
        });
        let station = StationId::new(0, 0);
        let frame = Frame::new(
            MacAddress::local(0, 0),
            MacAddress::local(0, 1),
            0,
            Bytes::from_static(b"x"),
        );

        manager.report_data_failed(station, &frame);
        assert!(manager.need_data_retransmission(station, &frame));
        manager.report_data_failed(station, &frame);
        assert!(!manager.need_data_retransmission(station, &frame));

        manager.report_final_data_failed(station, &frame);
        assert!(manager.need_data_retransmission(station, &frame));
        assert_eq!(manager.dropped(), 1);
    }

    #[test]
    fn test_rts_threshold() {
        let manager = RetryLimitManager::new(RetryConfig {
            rts_threshold: 10,
            ..RetryConfig::default()
        });
        let station = StationId::new(0, 0);
        let small = Frame::new(
            MacAddress::local(0, 0),
            MacAddress::local(0, 1),
            0,
            Bytes::from(vec![0; 10]),
        );
        let large = Frame {
            payload: Bytes::from(vec![0; 11]),
            ..small.clone()
        };
        assert!(!manager.need_rts(station, &small));
        assert!(manager.need_rts(station, &large));
    }
}
