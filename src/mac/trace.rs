//! 观察者接口：站点向外发出的类型化追踪事件。
//! Observer interface: typed trace events emitted by stations.

use crate::time::SimTime;
use std::fmt;

/// Identifies a station by its network and its index inside that network.
///
/// 以网络序号与网络内站点序号标识一个站点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StationId {
    pub network: u32,
    pub station: u32,
}

impl StationId {
    pub const fn new(network: u32, station: u32) -> Self {
        Self { network, station }
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.network, self.station)
    }
}

/// What happened. Counter kinds carry the counter's new running value.
///
/// 事件类型。计数类事件携带计数器的新累计值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    TxAttempts(u64),
    TxSuccesses(u64),
    TxFailures(u64),
    TxCollisions(u64),
    /// A freshly assigned backoff, in slots.
    BackoffCounter(u32),
    /// Snapshot of the Schedule Reset bitmap at evaluation time.
    Bitmap(Vec<bool>),
    SrReductionAttempts(u64),
    SrReductions(u64),
    SrReductionFailed(u64),
    /// Number of MSDUs packed under fair-share aggregation.
    FsAggregated(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub at: SimTime,
    pub station: StationId,
    pub kind: TraceKind,
}

/// Receives trace events. Observers cannot affect the engine.
///
/// 接收追踪事件。观察者无法影响引擎。
pub trait TraceSink {
    fn record(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn record(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&mut self, _event: TraceEvent) {}
}
