//! The per-station channel-access state machine.
//!
//! 单站点信道接入状态机。

use super::aggregation::{FairShareAggregationPolicy, MsduAggregator, SizeLimitedAggregator};
use super::backoff::{BackoffEngine, BackoffMode};
use super::contention_window::ContentionWindow;
use super::frame::{Frame, MacAddress, TxParams};
use super::random::RandomDeviate;
use super::schedule_reset::{ScheduleResetStep, ScheduleResetTracker};
use super::trace::{StationId, TraceKind};
use super::traits::MacContext;
use crate::config::Config;
use crate::error::Result;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace, warn};

/// Events delivered to a station by the arbiter and the data path.
///
/// 由仲裁者与数据通路投递给站点的事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacEvent {
    AccessGranted,
    Collision,
    InternalCollision,
    ChannelSwitching,
    Sleep,
    WakeUp,
    GotAck,
    MissedAck,
    GotCts,
    MissedCts,
    EndTxNoAck,
    StartNext,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AccessRequested,
    Transmitting,
}

/// How the last transmission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Acked,
    Collided,
    AckMissed,
    CtsMissed,
    NoAckRequiredDone,
}

/// Transmission counters of one station.
///
/// 单个站点的传输计数器。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationCounters {
    pub tx_attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub collisions: u64,
    pub delivered_msdus: u64,
    pub delivered_bytes: u64,
}

impl fmt::Display for StationCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempts={}, successes={}, failures={}, collisions={}, delivered={} msdus / {} bytes",
            self.tx_attempts,
            self.successes,
            self.failures,
            self.collisions,
            self.delivered_msdus,
            self.delivered_bytes
        )
    }
}

/// A contending station: queue, contention window, backoff and Schedule Reset.
///
/// 一个参与竞争的站点：队列、竞争窗口、退避与 Schedule Reset。
#[derive(Debug)]
pub struct Station {
    id: StationId,
    address: MacAddress,
    config: Config,
    window: ContentionWindow,
    backoff: BackoffEngine,
    schedule_reset: ScheduleResetTracker,
    fair_share: FairShareAggregationPolicy,
    aggregator: Option<Box<dyn MsduAggregator>>,
    queue: VecDeque<Frame>,
    current: Option<Frame>,
    phase: Phase,
    last_outcome: Option<Outcome>,
    consecutive_successes: u32,
    stickiness: u32,
    stickiness_limit: u32,
    next_sequence: u16,
    /// A counted attempt is on air and has not been resolved yet.
    in_flight: bool,
    counters: StationCounters,
}

impl Station {
    /// Creates a station after validating `config`.
    pub fn new(
        id: StationId,
        address: MacAddress,
        config: Config,
        rng: Box<dyn RandomDeviate>,
    ) -> Result<Self> {
        config.validate()?;
        let aggregator = config.aggregation.enabled.then(|| {
            Box::new(SizeLimitedAggregator::new(config.aggregation.max_amsdu_size))
                as Box<dyn MsduAggregator>
        });
        Ok(Self {
            id,
            address,
            window: ContentionWindow::new(config.contention.cw_min, config.contention.cw_max),
            backoff: BackoffEngine::new(rng),
            schedule_reset: ScheduleResetTracker::new(&config.schedule_reset),
            fair_share: FairShareAggregationPolicy::new(config.aggregation.fair_share),
            aggregator,
            queue: VecDeque::new(),
            current: None,
            phase: Phase::Idle,
            last_outcome: None,
            consecutive_successes: 0,
            stickiness: config.eca.stickiness,
            stickiness_limit: config.eca.stickiness,
            next_sequence: 0,
            in_flight: false,
            counters: StationCounters::default(),
            config,
        })
    }

    /// Replaces the installed aggregator.
    pub fn with_aggregator(mut self, aggregator: Box<dyn MsduAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn window(&self) -> &ContentionWindow {
        &self.window
    }

    pub fn cw(&self) -> u32 {
        self.window.cw()
    }

    pub fn assigned_backoff(&self) -> Option<u32> {
        self.backoff.assigned()
    }

    pub fn schedule_reset(&self) -> &ScheduleResetTracker {
        &self.schedule_reset
    }

    pub fn fair_share_stage(&self) -> u32 {
        self.fair_share.stage()
    }

    pub fn counters(&self) -> &StationCounters {
        &self.counters
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn stickiness(&self) -> u32 {
        self.stickiness
    }

    pub fn stickiness_limit(&self) -> u32 {
        self.stickiness_limit
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn has_work(&self) -> bool {
        self.current.is_some() || !self.queue.is_empty()
    }

    /// Zeroes the transmission and Schedule Reset counters.
    /// 清零传输计数器与 Schedule Reset 计数器。
    pub fn reset_counters(&mut self) {
        self.counters = StationCounters::default();
        self.schedule_reset.reset_counters();
    }

    /// Draws the initial random backoff.
    pub fn start(&mut self, ctx: &mut MacContext<'_>) {
        self.window.reset();
        self.assign_backoff(BackoffMode::Random, ctx);
    }

    /// Queues `frame` and asks for access if nothing is pending.
    /// 将帧加入队列，若无待处理请求则申请接入。
    pub fn enqueue(&mut self, frame: Frame, ctx: &mut MacContext<'_>) {
        self.queue.push_back(frame);
        if self.current.is_none() && !ctx.arbiter.is_access_requested(self.id) {
            ctx.arbiter.request_access(self.id);
            self.phase = Phase::AccessRequested;
        }
    }

    /// Dispatches one event.
    /// 分发一个事件。
    pub fn handle_event(&mut self, event: MacEvent, ctx: &mut MacContext<'_>) {
        trace!(station = %self.id, ?event, phase = ?self.phase, "mac event");
        match event {
            MacEvent::AccessGranted => self.on_access_granted(ctx),
            MacEvent::GotAck => self.on_got_ack(ctx),
            MacEvent::MissedAck => self.on_missed_ack(ctx),
            MacEvent::Collision | MacEvent::InternalCollision => self.on_collision(ctx),
            MacEvent::MissedCts => self.on_missed_cts(ctx),
            MacEvent::EndTxNoAck => self.on_end_tx_no_ack(ctx),
            MacEvent::StartNext => self.on_start_next(ctx),
            MacEvent::ChannelSwitching => self.on_channel_switching(ctx),
            MacEvent::Sleep => self.on_sleep(ctx),
            MacEvent::WakeUp => self.restart_access_if_needed(ctx),
            MacEvent::GotCts => debug!(station = %self.id, "got cts"),
            MacEvent::Cancel => debug!(station = %self.id, "transmission cancelled"),
        }
    }

    fn on_access_granted(&mut self, ctx: &mut MacContext<'_>) {
        let frame = match self.current.take() {
            Some(frame) => frame,
            None => {
                let Some(head) = self.queue.pop_front() else {
                    warn!(station = %self.id, "access granted with an empty queue");
                    self.phase = Phase::Idle;
                    return;
                };
                let mut frame = self.maybe_aggregate(head, ctx);
                frame.sequence = self.next_sequence;
                self.next_sequence = (self.next_sequence + 1) & 0x0fff;
                frame.fragment = 0;
                frame.retry = false;
                frame
            }
        };
        self.phase = Phase::Transmitting;

        let params = if frame.is_group() {
            self.in_flight = false;
            TxParams::default()
        } else {
            self.counters.tx_attempts += 1;
            self.in_flight = true;
            ctx.emit(self.id, TraceKind::TxAttempts(self.counters.tx_attempts));
            TxParams {
                ack: true,
                rts: ctx.remote.need_rts(self.id, &frame),
                next_fragment: false,
            }
        };
        debug!(
            station = %self.id,
            seq = frame.sequence,
            msdus = frame.msdu_count,
            retry = frame.retry,
            ?params,
            "starting transmission"
        );
        ctx.low.start_transmission(self.id, &frame, params);
        self.current = Some(frame);
    }

    fn maybe_aggregate(&mut self, head: Frame, ctx: &mut MacContext<'_>) -> Frame {
        // Retries and re-queued aggregates go out as they are.
        if head.is_group() || head.retry || head.amsdu {
            return head;
        }
        let Some(aggregator) = self.aggregator.as_deref() else {
            return head;
        };
        let (frame, fs_count) = self.fair_share.assemble(
            head,
            &mut self.queue,
            aggregator,
            &self.window,
            self.consecutive_successes,
        );
        if let Some(count) = fs_count {
            ctx.emit(self.id, TraceKind::FsAggregated(count));
        }
        frame
    }

    fn on_got_ack(&mut self, ctx: &mut MacContext<'_>) {
        let Some(frame) = self.current.as_ref() else {
            warn!(station = %self.id, "ack without a frame in flight");
            return;
        };
        if frame.fragment.saturating_add(1) < ctx.remote.fragment_count(self.id, frame) {
            trace!(station = %self.id, fragment = frame.fragment, "tx not done");
            return;
        }
        self.in_flight = false;
        self.last_outcome = Some(Outcome::Acked);
        self.counters.successes += 1;
        ctx.emit(self.id, TraceKind::TxSuccesses(self.counters.successes));
        self.consecutive_successes += 1;
        self.stickiness = self.stickiness_limit;
        ctx.remote.report_data_ok(self.id, frame);
        self.counters.delivered_msdus += u64::from(frame.msdu_count);
        self.counters.delivered_bytes += frame.msdu_bytes as u64;
        self.current = None;

        if self.config.eca.enabled {
            if !self.config.eca.hysteresis {
                self.window.reset();
            }
            if self.config.schedule_reset.enabled {
                let step = self.schedule_reset.on_success(
                    self.id,
                    self.consecutive_successes,
                    &mut self.window,
                    ctx,
                );
                if matches!(step, ScheduleResetStep::Reduced { .. })
                    && self.config.eca.dynamic_stickiness
                {
                    self.stickiness_limit += 1;
                    self.stickiness = self.stickiness_limit;
                }
                if step.evaluated() {
                    self.consecutive_successes = 0;
                }
            }
            self.assign_backoff(BackoffMode::Deterministic, ctx);
        } else {
            self.window.reset();
            self.assign_backoff(BackoffMode::Random, ctx);
        }
        self.restart_access_if_needed(ctx);
    }

    fn on_missed_ack(&mut self, ctx: &mut MacContext<'_>) {
        if self.current.is_none() {
            warn!(station = %self.id, "missed ack without a frame in flight");
            return;
        }
        self.last_outcome = Some(Outcome::AckMissed);
        self.resolve_as_failure(ctx);
        let Some(frame) = self.current.as_mut() else {
            return;
        };
        ctx.remote.report_data_failed(self.id, frame);

        if ctx.remote.need_data_retransmission(self.id, frame) {
            frame.retry = true;
            debug!(station = %self.id, seq = frame.sequence, "missed ack, retransmitting");
            self.absorb_or_grow(ctx);
        } else {
            ctx.remote.report_final_data_failed(self.id, frame);
            debug!(station = %self.id, seq = frame.sequence, "retry limit reached, frame dropped");
            self.current = None;
            self.consecutive_successes = 0;
            self.schedule_reset.cancel(self.id, ctx);
            self.window.reset();
            self.assign_backoff(BackoffMode::Random, ctx);
        }
        self.restart_access_if_needed(ctx);
    }

    fn on_collision(&mut self, ctx: &mut MacContext<'_>) {
        self.last_outcome = Some(Outcome::Collided);
        if self.in_flight {
            self.in_flight = false;
            self.counters.collisions += 1;
            ctx.emit(self.id, TraceKind::TxCollisions(self.counters.collisions));
        }
        debug!(station = %self.id, cw = self.window.cw(), "collision");
        self.absorb_or_grow(ctx);
        self.restart_access_if_needed(ctx);
    }

    fn on_missed_cts(&mut self, ctx: &mut MacContext<'_>) {
        self.last_outcome = Some(Outcome::CtsMissed);
        self.resolve_as_failure(ctx);
        if let Some(frame) = self.current.as_ref() {
            ctx.remote.report_rts_failed(self.id, frame);
            if ctx.remote.need_rts_retransmission(self.id, frame) {
                self.apply_failure_rule(ctx);
            } else {
                ctx.remote.report_final_rts_failed(self.id, frame);
                debug!(station = %self.id, seq = frame.sequence, "rts retry limit reached, frame dropped");
                self.current = None;
                self.schedule_reset.cancel(self.id, ctx);
                self.window.reset();
            }
        }
        self.consecutive_successes = 0;
        self.assign_backoff(BackoffMode::Random, ctx);
        self.restart_access_if_needed(ctx);
    }

    fn on_end_tx_no_ack(&mut self, ctx: &mut MacContext<'_>) {
        self.current = None;
        self.last_outcome = Some(Outcome::NoAckRequiredDone);
        if self.config.eca.enabled {
            if !self.config.eca.hysteresis {
                self.window.reset();
            }
            self.assign_backoff(BackoffMode::Deterministic, ctx);
        } else {
            self.window.reset();
            self.assign_backoff(BackoffMode::Random, ctx);
        }
        self.restart_access_if_needed(ctx);
    }

    fn on_start_next(&mut self, ctx: &mut MacContext<'_>) {
        let Some(frame) = self.current.as_mut() else {
            warn!(station = %self.id, "start next without a frame");
            return;
        };
        frame.fragment += 1;
        let params = TxParams {
            ack: true,
            rts: false,
            next_fragment: true,
        };
        ctx.low.start_transmission(self.id, frame, params);
    }

    fn on_channel_switching(&mut self, ctx: &mut MacContext<'_>) {
        debug!(station = %self.id, dropped = self.queue.len(), "channel switching, flushing queue");
        self.resolve_as_failure(ctx);
        self.queue.clear();
        self.current = None;
        ctx.arbiter.cancel_access(self.id);
        self.phase = Phase::Idle;
    }

    fn on_sleep(&mut self, ctx: &mut MacContext<'_>) {
        self.resolve_as_failure(ctx);
        if let Some(frame) = self.current.take() {
            self.queue.push_front(frame);
        }
        ctx.arbiter.cancel_access(self.id);
        self.phase = Phase::Idle;
        debug!(station = %self.id, queued = self.queue.len(), "sleeping");
    }

    /// Closes the attempt on air, if any, as a failure. The window and
    /// backoff are left alone.
    fn resolve_as_failure(&mut self, ctx: &mut MacContext<'_>) {
        if std::mem::take(&mut self.in_flight) {
            self.counters.failures += 1;
            ctx.emit(self.id, TraceKind::TxFailures(self.counters.failures));
        }
    }

    /// Stickiness absorbs the failure with a deterministic backoff, otherwise
    /// the window grows (or a provisional reduction reverts).
    fn absorb_or_grow(&mut self, ctx: &mut MacContext<'_>) {
        if self.config.eca.enabled && self.stickiness > 0 {
            self.stickiness -= 1;
            trace!(station = %self.id, stickiness = self.stickiness, "failure absorbed by stickiness");
            self.assign_backoff(BackoffMode::Deterministic, ctx);
        } else {
            self.consecutive_successes = 0;
            self.apply_failure_rule(ctx);
            self.assign_backoff(BackoffMode::Random, ctx);
        }
    }

    fn apply_failure_rule(&mut self, ctx: &mut MacContext<'_>) {
        if self.config.schedule_reset.enabled {
            self.schedule_reset.on_failure(self.id, &mut self.window, ctx);
        } else {
            self.window.update_on_failure();
        }
    }

    fn assign_backoff(&mut self, mode: BackoffMode, ctx: &mut MacContext<'_>) {
        self.backoff.assign(mode, self.window.cw(), self.id, ctx);
    }

    fn restart_access_if_needed(&mut self, ctx: &mut MacContext<'_>) {
        if self.has_work() {
            if !ctx.arbiter.is_access_requested(self.id) {
                ctx.arbiter.request_access(self.id);
            }
            self.phase = Phase::AccessRequested;
        } else {
            self.phase = Phase::Idle;
        }
    }
}
