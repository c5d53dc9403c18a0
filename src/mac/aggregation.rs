//! A-MSDU assembly and the fair-share aggregation policy.
//!
//! A-MSDU 组装与公平份额聚合策略。

use super::contention_window::ContentionWindow;
use super::frame::{Frame, MacAddress};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::VecDeque;
use std::fmt::Debug;
use tracing::trace;

/// Upper bound on the fair-share stage, i.e. at most 64 MSDUs per aggregate.
pub const MAX_FAIR_SHARE_STAGE: u32 = 6;

/// DA (6) + SA (6) + length (2).
pub const AMSDU_SUBFRAME_HEADER_LEN: usize = 14;

/// Packs MSDUs into an aggregate buffer.
///
/// 将 MSDU 打包进聚合缓冲区。
pub trait MsduAggregator: Debug + Send {
    /// Appends `msdu` as a new subframe. Returns `false`, leaving `aggregate`
    /// untouched, when it does not fit.
    fn aggregate(
        &self,
        msdu: &Bytes,
        source: MacAddress,
        destination: MacAddress,
        aggregate: &mut BytesMut,
    ) -> bool;
}

/// Builds A-MSDUs of 4-byte-aligned subframes up to `max_size` bytes.
///
/// 构建按 4 字节对齐子帧、最大 `max_size` 字节的 A-MSDU。
#[derive(Debug, Clone)]
pub struct SizeLimitedAggregator {
    max_size: usize,
}

impl SizeLimitedAggregator {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl MsduAggregator for SizeLimitedAggregator {
    fn aggregate(
        &self,
        msdu: &Bytes,
        source: MacAddress,
        destination: MacAddress,
        aggregate: &mut BytesMut,
    ) -> bool {
        // Every subframe but the last is padded; pad the previous one now.
        let padding = (4 - aggregate.len() % 4) % 4;
        let Ok(length) = u16::try_from(msdu.len()) else {
            return false;
        };
        if aggregate.len() + padding + AMSDU_SUBFRAME_HEADER_LEN + msdu.len() > self.max_size {
            return false;
        }
        aggregate.put_bytes(0, padding);
        aggregate.put_slice(&destination.0);
        aggregate.put_slice(&source.0);
        aggregate.put_u16(length);
        aggregate.put_slice(msdu);
        true
    }
}

/// Ties the number of MSDUs per transmission opportunity to the backoff stage.
///
/// 将每次传输机会聚合的 MSDU 数量与退避阶段挂钩。
#[derive(Debug, Clone, Default)]
pub struct FairShareAggregationPolicy {
    enabled: bool,
    stage: u32,
}

impl FairShareAggregationPolicy {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, stage: 0 }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The stage computed at the last grant.
    pub fn stage(&self) -> u32 {
        self.stage
    }

    /// `log2((cw+1)/(cw_min+1))` capped at six. `None` without a success
    /// streak or at the minimum window, where the stage stays at zero.
    pub fn stage_for(window: &ContentionWindow, consecutive_successes: u32) -> Option<u32> {
        (consecutive_successes > 0 && window.cw() > window.cw_min())
            .then(|| window.backoff_stage().min(MAX_FAIR_SHARE_STAGE))
    }

    /// Aggregates queued MSDUs for the same receiver and TID behind `head`.
    ///
    /// 将队列中与 `head` 目的地址和 TID 相同的 MSDU 聚合在其后。
    ///
    /// Returns the frame to send and, when fair share computed a stage for
    /// this grant, the number of MSDUs it carries. A single MSDU is returned
    /// unchanged.
    pub fn assemble(
        &mut self,
        head: Frame,
        queue: &mut VecDeque<Frame>,
        aggregator: &dyn MsduAggregator,
        window: &ContentionWindow,
        consecutive_successes: u32,
    ) -> (Frame, Option<u32>) {
        let same_flow = |f: &Frame| f.destination == head.destination && f.tid == head.tid;
        if !queue.iter().any(same_flow) {
            return (head, None);
        }

        let (budget, computed) = if self.enabled {
            let stage = Self::stage_for(window, consecutive_successes);
            self.stage = stage.unwrap_or(0);
            assert!(
                self.stage <= MAX_FAIR_SHARE_STAGE,
                "fair-share stage {} above {MAX_FAIR_SHARE_STAGE}",
                self.stage
            );
            (1usize << self.stage, stage.is_some())
        } else {
            (usize::MAX, false)
        };

        let mut buffer = BytesMut::new();
        if !aggregator.aggregate(&head.payload, head.source, head.destination, &mut buffer) {
            return (head, computed.then_some(1));
        }
        let mut count = 1u32;
        let mut msdu_bytes = head.payload.len();
        let mut index = 0;
        while (count as usize) < budget && index < queue.len() {
            if !same_flow(&queue[index]) {
                index += 1;
                continue;
            }
            let candidate = &queue[index];
            if !aggregator.aggregate(
                &candidate.payload,
                candidate.source,
                candidate.destination,
                &mut buffer,
            ) {
                break;
            }
            msdu_bytes += candidate.payload.len();
            count += 1;
            queue.remove(index);
        }

        trace!(
            count,
            budget = ?self.enabled.then_some(budget),
            bytes = buffer.len(),
            "msdus aggregated"
        );
        let reported = computed.then_some(count);
        if count == 1 {
            return (head, reported);
        }
        let aggregate = Frame {
            payload: buffer.freeze(),
            msdu_count: count,
            msdu_bytes,
            amsdu: true,
            ..head
        };
        (aggregate, reported)
    }
}
