//! 单站点信道接入竞争引擎。
//! The per-station channel-access contention engine.
//!
//! A [`Station`] reacts to [`MacEvent`]s delivered by the surrounding
//! simulator. Every handler borrows its collaborators through a
//! [`MacContext`], so the engine itself never holds references to the channel,
//! the data path or the rate-control manager.

pub mod aggregation;
pub mod backoff;
pub mod contention_window;
pub mod frame;
pub mod random;
pub mod schedule_reset;
pub mod station;
pub mod trace;
pub mod traits;


pub use aggregation::{FairShareAggregationPolicy, MsduAggregator, SizeLimitedAggregator};
pub use backoff::{BackoffEngine, BackoffMode};
pub use contention_window::ContentionWindow;
pub use frame::{Frame, MacAddress, TxParams};
pub use random::{RandomDeviate, SeededDeviate};
pub use schedule_reset::{EcaBitmap, ScheduleResetMode, ScheduleResetTracker};
pub use station::{MacEvent, Outcome, Phase, Station, StationCounters};
pub use trace::{NullSink, StationId, TraceEvent, TraceKind, TraceSink};
pub use traits::{ChannelArbiter, MacContext, MacLow, RemoteStationManager};
