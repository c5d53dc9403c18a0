//! An idealised slotted channel (Bianchi-style virtual slots).
//!
//! 理想化的时隙信道（Bianchi 式虚拟时隙）。
//!
//! Each virtual slot is either idle, a single transmission or a collision.
//! Every backoff counter moves one slot per virtual slot, busy or not.

use crate::config::PhyConfig;
use crate::mac::random::SeededDeviate;
use crate::mac::{ChannelArbiter, EcaBitmap, Frame, MacEvent, MacLow, StationId, TxParams};
use std::time::Duration;
use tracing::trace;

/// MAC header and FCS added to every payload on air.
pub const MAC_OVERHEAD_BYTES: usize = 36;

#[derive(Debug, Clone)]
struct BitmapRecorder {
    bitmap: EcaBitmap,
    /// Slot of the owner's latest transmission.
    anchor: Option<u64>,
}

#[derive(Debug, Clone, Default)]
struct AccessState {
    requested: bool,
    backoff: u32,
    last_tx_slot: Option<u64>,
    recorder: Option<BitmapRecorder>,
}

/// Per-station access requests, backoff counters and ECA bitmaps.
///
/// 每个站点的接入请求、退避计数器与 ECA 位图。
#[derive(Debug, Default)]
pub struct SlotArbiter {
    network: u32,
    stations: Vec<AccessState>,
}

impl SlotArbiter {
    fn state(&self, station: StationId) -> &AccessState {
        debug_assert_eq!(station.network, self.network);
        &self.stations[station.station as usize]
    }

    fn state_mut(&mut self, station: StationId) -> &mut AccessState {
        debug_assert_eq!(station.network, self.network);
        &mut self.stations[station.station as usize]
    }

    /// Remaining backoff slots of `station`.
    pub fn backoff(&self, station: StationId) -> u32 {
        self.state(station).backoff
    }
}

impl ChannelArbiter for SlotArbiter {
    fn request_access(&mut self, station: StationId) {
        self.state_mut(station).requested = true;
    }

    fn is_access_requested(&self, station: StationId) -> bool {
        self.state(station).requested
    }

    fn cancel_access(&mut self, station: StationId) {
        self.state_mut(station).requested = false;
    }

    fn start_backoff(&mut self, station: StationId, slots: u32) {
        self.state_mut(station).backoff = slots;
    }

    fn start_eca_bitmap(&mut self, station: StationId, size: usize) {
        let state = self.state_mut(station);
        state.recorder = Some(BitmapRecorder {
            bitmap: EcaBitmap::new(size),
            anchor: state.last_tx_slot,
        });
    }

    fn stop_eca_bitmap(&mut self, station: StationId) {
        self.state_mut(station).recorder = None;
    }

    fn eca_bitmap(&self, station: StationId) -> EcaBitmap {
        self.state(station)
            .recorder
            .as_ref()
            .map(|r| r.bitmap.clone())
            .unwrap_or_default()
    }
}

/// A frame put on air during the current slot.
#[derive(Debug, Clone)]
pub struct Transmission {
    pub station: StationId,
    pub frame: Frame,
    pub params: TxParams,
}

/// Collects the transmissions started in the current slot.
///
/// 收集当前时隙中开始的传输。
#[derive(Debug, Default)]
pub struct Medium {
    transmissions: Vec<Transmission>,
}

impl MacLow for Medium {
    fn start_transmission(&mut self, station: StationId, frame: &Frame, params: TxParams) {
        self.transmissions.push(Transmission {
            station,
            frame: frame.clone(),
            params,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Idle,
    Success,
    Collision,
}

/// The result of one virtual slot.
#[derive(Debug, Clone)]
pub struct SlotResolution {
    pub kind: SlotKind,
    pub duration: Duration,
    /// Events to deliver when the slot ends.
    pub outcomes: Vec<(StationId, MacEvent)>,
}

/// One shared channel of a network.
///
/// 一个网络的共享信道。
#[derive(Debug)]
pub struct SlottedChannel {
    arbiter: SlotArbiter,
    medium: Medium,
    phy: PhyConfig,
    frame_error_rate: f64,
    errors: SeededDeviate,
    slot: u64,
}

impl SlottedChannel {
    pub fn new(
        network: u32,
        stations: usize,
        phy: PhyConfig,
        frame_error_rate: f64,
        seed: u64,
    ) -> Self {
        Self {
            arbiter: SlotArbiter {
                network,
                stations: vec![AccessState::default(); stations],
            },
            medium: Medium::default(),
            phy,
            frame_error_rate,
            errors: SeededDeviate::new(seed),
            slot: 0,
        }
    }

    pub fn arbiter(&self) -> &SlotArbiter {
        &self.arbiter
    }

    /// Split borrows for building a [`MacContext`](crate::mac::MacContext).
    pub fn parts(&mut self) -> (&mut SlotArbiter, &mut Medium) {
        (&mut self.arbiter, &mut self.medium)
    }

    /// Number of slots begun so far.
    pub fn slots(&self) -> u64 {
        self.slot
    }

    /// Opens the next slot: counts every backoff down, then grants the
    /// requesters whose backoff is exhausted. A backoff of `b` slots after a
    /// transmission therefore lands on the `b`-th slot after it.
    ///
    /// 开启下一个时隙：所有退避计数减一，然后授予退避已结束的请求者。
    pub fn begin_slot(&mut self) -> Vec<StationId> {
        self.slot += 1;
        let network = self.arbiter.network;
        let mut granted = Vec::new();
        for (index, state) in self.arbiter.stations.iter_mut().enumerate() {
            state.backoff = state.backoff.saturating_sub(1);
            if state.requested && state.backoff == 0 {
                state.requested = false;
                granted.push(StationId::new(network, index as u32));
            }
        }
        granted
    }

    /// Closes the current slot, fills ECA bitmaps and decides the outcomes.
    /// 关闭当前时隙，填充 ECA 位图并判定结果。
    pub fn resolve_slot(&mut self) -> SlotResolution {
        let transmissions = std::mem::take(&mut self.medium.transmissions);
        let slot = self.slot;
        self.record_bitmaps(&transmissions, slot);

        let resolution = match transmissions.as_slice() {
            [] => SlotResolution {
                kind: SlotKind::Idle,
                duration: self.phy.slot_time,
                outcomes: Vec::new(),
            },
            [single] => {
                let event = if !single.params.ack {
                    MacEvent::EndTxNoAck
                } else if self.frame_error_rate > 0.0
                    && self.errors.next_f64() < self.frame_error_rate
                {
                    if single.params.rts {
                        MacEvent::MissedCts
                    } else {
                        MacEvent::MissedAck
                    }
                } else {
                    MacEvent::GotAck
                };
                SlotResolution {
                    kind: SlotKind::Success,
                    duration: self.airtime(&single.frame) + self.phy.ack_overhead,
                    outcomes: vec![(single.station, event)],
                }
            }
            many => {
                let longest = many
                    .iter()
                    .map(|t| self.airtime(&t.frame))
                    .max()
                    .unwrap_or_default();
                let outcomes = many
                    .iter()
                    .map(|t| {
                        let event = if t.params.ack {
                            MacEvent::Collision
                        } else {
                            MacEvent::EndTxNoAck
                        };
                        (t.station, event)
                    })
                    .collect();
                SlotResolution {
                    kind: SlotKind::Collision,
                    duration: longest + self.phy.collision_overhead,
                    outcomes,
                }
            }
        };
        trace!(slot, kind = ?resolution.kind, duration = ?resolution.duration, "slot resolved");
        resolution
    }

    /// Slot `i` of a bitmap is the `i`-th slot after its owner's latest
    /// transmission; slot 0 is that transmission itself.
    fn record_bitmaps(&mut self, transmissions: &[Transmission], slot: u64) {
        for t in transmissions {
            let state = &mut self.arbiter.stations[t.station.station as usize];
            state.last_tx_slot = Some(slot);
            if let Some(recorder) = state.recorder.as_mut() {
                recorder.anchor = Some(slot);
            }
        }
        for (index, state) in self.arbiter.stations.iter_mut().enumerate() {
            let Some(recorder) = state.recorder.as_mut() else {
                continue;
            };
            let Some(anchor) = recorder.anchor else {
                continue;
            };
            if transmissions
                .iter()
                .any(|t| t.station.station as usize != index)
            {
                recorder.bitmap.mark((slot - anchor) as usize);
            }
        }
    }

    /// Preamble plus the frame's bits at the data rate.
    pub fn airtime(&self, frame: &Frame) -> Duration {
        let bits = ((frame.len() + MAC_OVERHEAD_BYTES) * 8) as u64;
        self.phy.phy_header + Duration::from_nanos(bits * 1_000_000_000 / self.phy.data_rate_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::MacAddress;
    use bytes::Bytes;

    fn frame(destination: MacAddress) -> Frame {
        Frame::new(MacAddress::local(0, 1), destination, 0, Bytes::from(vec![0; 100]))
    }

    fn send(channel: &mut SlottedChannel, station: u32, destination: MacAddress) {
        let ack = !destination.is_group();
        let (_, medium) = channel.parts();
        medium.start_transmission(
            StationId::new(0, station),
            &frame(destination),
            TxParams {
                ack,
                ..Default::default()
            },
        );
    }

    fn channel(stations: usize) -> SlottedChannel {
        SlottedChannel::new(0, stations, PhyConfig::default(), 0.0, 1)
    }

    #[test]
    fn test_grants_only_exhausted_requesters() {
        let mut channel = channel(3);
        let (arbiter, _) = channel.parts();
        arbiter.request_access(StationId::new(0, 0));
        arbiter.request_access(StationId::new(0, 1));
        arbiter.start_backoff(StationId::new(0, 1), 2);
        arbiter.start_backoff(StationId::new(0, 2), 1);

        assert_eq!(channel.begin_slot(), vec![StationId::new(0, 0)]);
        assert_eq!(channel.arbiter().backoff(StationId::new(0, 1)), 1);
        assert_eq!(channel.arbiter().backoff(StationId::new(0, 2)), 0);
        assert!(!channel.arbiter().is_access_requested(StationId::new(0, 0)));

        channel.resolve_slot();
        assert_eq!(channel.begin_slot(), vec![StationId::new(0, 1)]);
        channel.resolve_slot();
        // Station 2 exhausted its backoff without asking for access.
        assert!(channel.begin_slot().is_empty());
    }

    #[test]
    fn test_slot_outcomes() {
        let ap = MacAddress::local(0, 9);
        let mut channel = channel(3);

        channel.begin_slot();
        let idle = channel.resolve_slot();
        assert_eq!(idle.kind, SlotKind::Idle);
        assert_eq!(idle.duration, Duration::from_micros(9));

        channel.begin_slot();
        send(&mut channel, 0, ap);
        let success = channel.resolve_slot();
        assert_eq!(success.kind, SlotKind::Success);
        assert_eq!(success.outcomes, vec![(StationId::new(0, 0), MacEvent::GotAck)]);
        assert!(success.duration > Duration::from_micros(100));

        channel.begin_slot();
        send(&mut channel, 0, ap);
        send(&mut channel, 1, MacAddress::BROADCAST);
        send(&mut channel, 2, ap);
        let collision = channel.resolve_slot();
        assert_eq!(collision.kind, SlotKind::Collision);
        assert_eq!(
            collision.outcomes,
            vec![
                (StationId::new(0, 0), MacEvent::Collision),
                (StationId::new(0, 1), MacEvent::EndTxNoAck),
                (StationId::new(0, 2), MacEvent::Collision),
            ]
        );
    }

    #[test]
    fn test_bitmap_marks_relative_to_own_transmission() {
        let ap = MacAddress::local(0, 9);
        let me = StationId::new(0, 0);
        let mut channel = channel(2);

        // Slot 1: own transmission.
        channel.begin_slot();
        send(&mut channel, 0, ap);
        channel.resolve_slot();
        channel.parts().0.start_eca_bitmap(me, 5);

        // Slots 2..=4: idle, other, idle.
        for other_transmits in [false, true, false] {
            channel.begin_slot();
            if other_transmits {
                send(&mut channel, 1, ap);
            }
            channel.resolve_slot();
        }
        assert_eq!(
            channel.arbiter().eca_bitmap(me).as_slice(),
            &[false, false, true, false, false]
        );

        // Own transmission re-anchors; marks accumulate.
        channel.begin_slot();
        send(&mut channel, 0, ap);
        channel.resolve_slot();
        channel.begin_slot();
        send(&mut channel, 1, ap);
        channel.resolve_slot();
        assert_eq!(
            channel.arbiter().eca_bitmap(me).as_slice(),
            &[false, true, true, false, false]
        );

        channel.parts().0.stop_eca_bitmap(me);
        assert!(channel.arbiter().eca_bitmap(me).is_empty());
    }

    #[test]
    fn test_frame_errors_follow_rts() {
        let ap = MacAddress::local(0, 9);
        let mut channel = SlottedChannel::new(0, 1, PhyConfig::default(), 0.999_999, 3);
        channel.begin_slot();
        let (_, medium) = channel.parts();
        medium.start_transmission(
            StationId::new(0, 0),
            &frame(ap),
            TxParams {
                ack: true,
                rts: true,
                next_fragment: false,
            },
        );
        let resolution = channel.resolve_slot();
        assert_eq!(resolution.outcomes[0].1, MacEvent::MissedCts);
    }
}
