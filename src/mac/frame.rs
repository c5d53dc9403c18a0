//! MAC addresses, frames and per-transmission parameters.
//!
//! MAC 地址、帧以及单次传输参数。

use bytes::Bytes;
use std::fmt;

/// A 48-bit IEEE MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// A locally administered unicast address derived from a network and station index.
    /// 由网络与站点序号派生的本地管理单播地址。
    pub fn local(network: u32, station: u32) -> Self {
        let n = network.to_be_bytes();
        let s = station.to_be_bytes();
        MacAddress([0x02, n[2], n[3], s[1], s[2], s[3]])
    }

    /// Group (multicast or broadcast) addresses have the I/G bit set.
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// A data frame as seen by the contention engine.
///
/// 竞争引擎所见的数据帧。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub destination: MacAddress,
    pub source: MacAddress,
    /// Traffic identifier; only frames with the same TID are aggregated together.
    pub tid: u8,
    pub payload: Bytes,
    /// Number of MSDUs carried. Greater than one only for an A-MSDU.
    pub msdu_count: u32,
    /// Sum of the carried MSDU payload lengths, excluding subframe framing.
    pub msdu_bytes: usize,
    /// 12-bit sequence number, assigned when the frame is first granted access.
    pub sequence: u16,
    pub retry: bool,
    pub fragment: u8,
    pub amsdu: bool,
}

impl Frame {
    pub fn new(source: MacAddress, destination: MacAddress, tid: u8, payload: Bytes) -> Self {
        let msdu_bytes = payload.len();
        Self {
            destination,
            source,
            tid,
            payload,
            msdu_count: 1,
            msdu_bytes,
            sequence: 0,
            retry: false,
            fragment: 0,
            amsdu: false,
        }
    }

    pub fn is_group(&self) -> bool {
        self.destination.is_group()
    }

    /// Size of the MAC payload on air.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Parameters handed to the data path with each transmission.
///
/// 每次传输随帧交给数据通路的参数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxParams {
    /// The receiver is expected to acknowledge.
    pub ack: bool,
    /// Protect the exchange with RTS/CTS.
    pub rts: bool,
    /// This is a continuation fragment of a frame already on air.
    pub next_fragment: bool,
}
