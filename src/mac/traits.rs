//! Collaborator interfaces consumed by the contention engine.
//!
//! 竞争引擎所依赖的协作者接口。

use super::frame::{Frame, TxParams};
use super::schedule_reset::EcaBitmap;
use super::trace::{StationId, TraceEvent, TraceKind, TraceSink};
use crate::time::SimTime;

/// Grants channel access and counts backoff slots down on the stations' behalf.
///
/// 代表站点授予信道接入并倒数退避时隙。
pub trait ChannelArbiter {
    /// Ask to be granted access once the backoff has elapsed.
    fn request_access(&mut self, station: StationId);

    fn is_access_requested(&self, station: StationId) -> bool;

    /// Withdraw a pending request.
    fn cancel_access(&mut self, station: StationId);

    /// Start counting down `slots` idle slots.
    fn start_backoff(&mut self, station: StationId, slots: u32);

    /// Start recording which slots after the station's own transmission were
    /// used by other stations.
    fn start_eca_bitmap(&mut self, station: StationId, size: usize);

    fn stop_eca_bitmap(&mut self, station: StationId);

    /// An owned snapshot of the bitmap being filled. Empty if none is active.
    fn eca_bitmap(&self, station: StationId) -> EcaBitmap;
}

/// The data path that puts frames on air.
///
/// 将帧发送到空口的数据通路。
pub trait MacLow {
    fn start_transmission(&mut self, station: StationId, frame: &Frame, params: TxParams);
}

/// Rate control and retry bookkeeping for the remote receivers.
///
/// 针对远端接收者的速率控制与重传记账。
pub trait RemoteStationManager {
    fn need_rts(&self, station: StationId, frame: &Frame) -> bool;
    fn need_rts_retransmission(&self, station: StationId, frame: &Frame) -> bool;
    fn need_data_retransmission(&self, station: StationId, frame: &Frame) -> bool;
    /// How many fragments `frame` is split into. At least one.
    fn fragment_count(&self, station: StationId, frame: &Frame) -> u8;

    fn report_rts_failed(&mut self, station: StationId, frame: &Frame);
    fn report_data_failed(&mut self, station: StationId, frame: &Frame);
    fn report_data_ok(&mut self, station: StationId, frame: &Frame);
    fn report_final_rts_failed(&mut self, station: StationId, frame: &Frame);
    fn report_final_data_failed(&mut self, station: StationId, frame: &Frame);
}

/// Borrowed collaborators for the duration of one event handler.
///
/// 在单个事件处理期间借用的协作者。
pub struct MacContext<'a> {
    pub now: SimTime,
    pub arbiter: &'a mut dyn ChannelArbiter,
    pub low: &'a mut dyn MacLow,
    pub remote: &'a mut dyn RemoteStationManager,
    pub trace: &'a mut dyn TraceSink,
}

impl MacContext<'_> {
    pub(crate) fn emit(&mut self, station: StationId, kind: TraceKind) {
        self.trace.record(TraceEvent {
            at: self.now,
            station,
            kind,
        });
    }
}
