//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the contention engine and its simulation harness.
/// 竞争引擎及其仿真框架的主要错误类型。
///
/// Protocol exhaustion (retry limits) and broken invariants are not represented
/// here: the former is ordinary state-machine vocabulary, the latter panics.
#[derive(Debug, Error)]
pub enum Error {
    /// The contention window bounds cannot describe a binary exponential backoff.
    /// 竞争窗口边界无法构成二进制指数退避。
    #[error("invalid contention window bounds cw_min={cw_min}, cw_max={cw_max}: {reason}")]
    InvalidContentionWindow {
        cw_min: u32,
        cw_max: u32,
        reason: &'static str,
    },

    /// Schedule Reset was enabled while CSMA/ECA is disabled.
    /// 在未启用 CSMA/ECA 的情况下启用了 Schedule Reset。
    #[error("schedule reset requires CSMA/ECA to be enabled")]
    ScheduleResetWithoutEca,

    /// The A-MSDU size limit leaves no room for a single subframe.
    /// A-MSDU 大小上限不足以容纳任何子帧。
    #[error("aggregate size limit of {0} bytes is too small")]
    InvalidAggregateLimit(usize),

    /// A simulation harness parameter is out of range.
    /// 仿真参数超出范围。
    #[error("invalid simulation parameter: {0}")]
    InvalidSimulation(&'static str),

    /// A replication task panicked or was cancelled.
    /// 某个重复实验任务发生 panic 或被取消。
    #[error("replication task failed: {0}")]
    ReplicationFailed(#[from] tokio::task::JoinError),
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;
