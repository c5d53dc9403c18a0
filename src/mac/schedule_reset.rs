//! Schedule Reset: opportunistic contention window reduction.
//!
//! Schedule Reset：机会性地缩减竞争窗口。
//!
//! After enough consecutive successes a station asks the arbiter to record,
//! slot by slot, whether anyone else transmitted during one of its
//! deterministic cycles. If the slots a smaller window would land on were
//! free, the station jumps to that window. The reduction stays provisional
//! until the next success; a failure in between puts the old window back.

use super::backoff::BackoffEngine;
use super::contention_window::ContentionWindow;
use super::trace::{StationId, TraceKind};
use super::traits::MacContext;
use crate::config::ScheduleResetConfig;
use tracing::debug;

/// How the reduced window is chosen.
/// 缩减后窗口的选择方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleResetMode {
    /// Halve the window when the midpoint slot is free.
    Halving,
    /// Jump to the smallest stage whose deterministic slot is free.
    Reset,
}

/// Slot occupancy observed after a station's own transmission.
/// Slot `i` is the `i`-th slot after it.
///
/// 站点自身传输之后观察到的时隙占用情况。第 `i` 位对应其后的第 `i` 个时隙。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EcaBitmap(Vec<bool>);

impl EcaBitmap {
    /// The bitmap length used for window `cw`: one deterministic cycle plus one.
    pub fn size_for(cw: u32) -> usize {
        ((cw + 1) / 2 + 1) as usize
    }

    pub fn new(size: usize) -> Self {
        Self(vec![false; size])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// # Panics
    /// If `slot` is out of range.
    pub fn get(&self, slot: usize) -> bool {
        assert!(
            slot < self.0.len(),
            "bitmap slot {slot} out of range {}",
            self.0.len()
        );
        self.0[slot]
    }

    /// Marks `slot` as used. Out-of-range slots are ignored.
    pub fn mark(&mut self, slot: usize) {
        if let Some(bit) = self.0.get_mut(slot) {
            *bit = true;
        }
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<bool> {
        self.0
    }
}

impl From<Vec<bool>> for EcaBitmap {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

/// An observation period in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleResetSession {
    pub iterations_start: u32,
    pub reset_threshold: u32,
    pub bitmap_size: usize,
}

/// What a success did to the tracker.
/// 一次成功对跟踪器产生的影响。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleResetStep {
    /// Not enough consecutive successes yet.
    Idle,
    Started { bitmap_size: usize },
    /// Session running, threshold not reached.
    Observing,
    Reduced { from: u32, to: u32 },
    NotReducible,
}

impl ScheduleResetStep {
    /// The session ended with an evaluation.
    pub fn evaluated(&self) -> bool {
        matches!(self, Self::Reduced { .. } | Self::NotReducible)
    }
}

/// Per-station Schedule Reset state.
///
/// 单个站点的 Schedule Reset 状态。
#[derive(Debug, Clone)]
pub struct ScheduleResetTracker {
    mode: ScheduleResetMode,
    conservative: bool,
    activation_threshold: u32,
    session: Option<ScheduleResetSession>,
    /// Window before the last reduction, until a success commits it.
    provisional: Option<u32>,
    attempts: u64,
    reductions: u64,
    failed: u64,
}

impl ScheduleResetTracker {
    pub fn new(config: &ScheduleResetConfig) -> Self {
        Self {
            mode: config.mode,
            conservative: config.conservative,
            activation_threshold: config.activation_threshold,
            session: None,
            provisional: None,
            attempts: 0,
            reductions: 0,
            failed: 0,
        }
    }

    pub fn session(&self) -> Option<&ScheduleResetSession> {
        self.session.as_ref()
    }

    pub fn being_filled(&self) -> bool {
        self.session.is_some()
    }

    pub fn provisional_previous_cw(&self) -> Option<u32> {
        self.provisional
    }

    pub fn reduction_attempts(&self) -> u64 {
        self.attempts
    }

    pub fn reductions(&self) -> u64 {
        self.reductions
    }

    pub fn reductions_failed(&self) -> u64 {
        self.failed
    }

    pub fn reset_counters(&mut self) {
        self.attempts = 0;
        self.reductions = 0;
        self.failed = 0;
    }

    /// Successes required before observing. `0` derives it from the window.
    pub fn activation_threshold(&self, window: &ContentionWindow) -> u32 {
        match self.activation_threshold {
            0 => (window.cw_max() + 1) / (window.cw() + 1),
            n => n,
        }
    }

    fn reset_threshold(&self, window: &ContentionWindow) -> u32 {
        if self.conservative {
            let half_max = (window.cw_max() + 1) / 2;
            half_max.div_ceil(BackoffEngine::deterministic_backoff(window.cw()))
        } else {
            2
        }
    }

    /// Runs the tracker after a successful exchange.
    /// 在一次成功交换之后运行跟踪器。
    ///
    /// The caller zeroes its consecutive-success counter when the returned
    /// step [`evaluated`](ScheduleResetStep::evaluated).
    pub fn on_success(
        &mut self,
        station: StationId,
        consecutive: u32,
        window: &mut ContentionWindow,
        ctx: &mut MacContext<'_>,
    ) -> ScheduleResetStep {
        if let Some(previous_cw) = self.provisional.take() {
            debug!(%station, previous_cw, cw = window.cw(), "schedule reset reduction kept");
        }

        let Some(session) = self.session else {
            if consecutive < self.activation_threshold(window) {
                return ScheduleResetStep::Idle;
            }
            let bitmap_size = EcaBitmap::size_for(window.cw());
            let session = ScheduleResetSession {
                iterations_start: consecutive,
                reset_threshold: self.reset_threshold(window),
                bitmap_size,
            };
            debug!(
                %station,
                cw = window.cw(),
                bitmap_size,
                reset_threshold = session.reset_threshold,
                "schedule reset session started"
            );
            ctx.arbiter.start_eca_bitmap(station, bitmap_size);
            self.session = Some(session);
            return ScheduleResetStep::Started { bitmap_size };
        };

        if consecutive.saturating_sub(session.iterations_start) < session.reset_threshold {
            return ScheduleResetStep::Observing;
        }

        let bitmap = ctx.arbiter.eca_bitmap(station);
        assert_eq!(
            bitmap.len(),
            session.bitmap_size,
            "bitmap size changed during the session"
        );
        ctx.emit(station, TraceKind::Bitmap(bitmap.as_slice().to_vec()));
        self.attempts += 1;
        ctx.emit(station, TraceKind::SrReductionAttempts(self.attempts));

        let step = match self.reduction_factor(&bitmap, window) {
            Some(factor) => {
                let from = window.cw();
                let to = ((from + 1) / factor - 1).max(window.cw_min());
                assert!(to % 2 == 1, "reduced contention window {to} is even");
                window.set(to);
                self.provisional = Some(from);
                self.reductions += 1;
                ctx.emit(station, TraceKind::SrReductions(self.reductions));
                debug!(%station, from, to, factor, "schedule reset reduced the window");
                ScheduleResetStep::Reduced { from, to }
            }
            None => {
                self.failed += 1;
                ctx.emit(station, TraceKind::SrReductionFailed(self.failed));
                debug!(%station, cw = window.cw(), "schedule reset found no free schedule");
                ScheduleResetStep::NotReducible
            }
        };
        ctx.arbiter.stop_eca_bitmap(station);
        self.session = None;
        step
    }

    /// The divisor applied to `cw + 1`, or `None` when no smaller schedule is free.
    fn reduction_factor(&self, bitmap: &EcaBitmap, window: &ContentionWindow) -> Option<u32> {
        let cw = window.cw();
        match self.mode {
            ScheduleResetMode::Halving => (!bitmap.get((bitmap.len() - 1) / 2)).then_some(2),
            ScheduleResetMode::Reset => {
                let cw_min = window.cw_min();
                let max_stage = window.backoff_stage();
                match max_stage {
                    0 => None,
                    1 => Some(1),
                    _ => {
                        let base = (cw_min + 1).div_ceil(2);
                        (0..=max_stage).find_map(|i| {
                            let position = (base << i) as usize;
                            assert!(position < bitmap.len(), "probe {position} beyond bitmap");
                            (!bitmap.get(position)).then(|| (cw + 1) / ((cw_min + 1) << i))
                        })
                    }
                }
            }
        }
    }

    /// Applies a failure that stickiness did not absorb: abandons the session
    /// and either reverts a provisional reduction or grows the window.
    ///
    /// 处理未被粘性吸收的失败：放弃会话，并撤销临时缩减或增大窗口。
    ///
    /// Returns `true` when a reduction was reverted.
    pub fn on_failure(
        &mut self,
        station: StationId,
        window: &mut ContentionWindow,
        ctx: &mut MacContext<'_>,
    ) -> bool {
        self.cancel_session(station, ctx);
        match self.provisional.take() {
            Some(previous_cw) => {
                debug!(%station, from = window.cw(), to = previous_cw, "schedule reset reduction reverted");
                window.set(previous_cw);
                true
            }
            None => {
                window.update_on_failure();
                false
            }
        }
    }

    /// Drops any session and outstanding reduction without touching the window.
    pub fn cancel(&mut self, station: StationId, ctx: &mut MacContext<'_>) {
        self.cancel_session(station, ctx);
        self.provisional = None;
    }

    fn cancel_session(&mut self, station: StationId, ctx: &mut MacContext<'_>) {
        if self.session.take().is_some() {
            ctx.arbiter.stop_eca_bitmap(station);
            debug!(%station, "schedule reset session cancelled");
        }
    }
}
