//! 定义了竞争引擎与仿真框架的可配置参数。
//! Defines configurable parameters for the contention engine and the simulation harness.

use crate::error::{Error, Result};
use crate::mac::aggregation::AMSDU_SUBFRAME_HEADER_LEN;
use crate::mac::schedule_reset::ScheduleResetMode;
use std::time::Duration;

/// A structure containing all configurable parameters of one station's MAC.
///
/// 包含单个站点 MAC 所有可配置参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Contention window bounds.
    /// 竞争窗口边界。
    pub contention: ContentionConfig,

    /// CSMA/ECA behaviour (deterministic backoff, hysteresis, stickiness).
    /// CSMA/ECA 行为（确定性退避、迟滞、粘性）。
    pub eca: EcaConfig,

    /// Schedule Reset parameters.
    /// Schedule Reset 参数。
    pub schedule_reset: ScheduleResetConfig,

    /// Frame aggregation parameters.
    /// 帧聚合参数。
    pub aggregation: AggregationConfig,
}

/// Contention window bounds. Both `cw_min + 1` and `cw_max + 1` must be powers of two.
///
/// 竞争窗口边界。`cw_min + 1` 与 `cw_max + 1` 必须为 2 的幂。
#[derive(Debug, Clone)]
pub struct ContentionConfig {
    /// The minimum contention window.
    /// 最小竞争窗口。
    pub cw_min: u32,
    /// The maximum contention window.
    /// 最大竞争窗口。
    pub cw_max: u32,
}

/// CSMA/ECA parameters.
///
/// CSMA/ECA 参数。
#[derive(Debug, Clone, Default)]
pub struct EcaConfig {
    /// Use a deterministic backoff after every successful transmission.
    /// 每次成功传输后使用确定性退避。
    pub enabled: bool,
    /// Keep the current contention window after a success instead of resetting it.
    /// 成功后保留当前竞争窗口而不是重置。
    pub hysteresis: bool,
    /// Number of failures absorbed with a deterministic backoff before the
    /// contention window is allowed to grow.
    /// 在允许竞争窗口增长之前，以确定性退避吸收的失败次数。
    pub stickiness: u32,
    /// Grow the stickiness limit by one after every Schedule Reset reduction.
    /// 每次 Schedule Reset 缩减后将粘性上限加一。
    pub dynamic_stickiness: bool,
}

/// Schedule Reset parameters.
///
/// Schedule Reset 参数。
#[derive(Debug, Clone)]
pub struct ScheduleResetConfig {
    /// Enable opportunistic contention window reduction.
    /// 启用机会性竞争窗口缩减。
    pub enabled: bool,
    /// Stretch the observation period to cover a whole maximal cycle.
    /// 延长观察周期以覆盖完整的最大周期。
    pub conservative: bool,
    /// Halve the window, or jump back to the smallest safe stage.
    /// 将窗口减半，或跳回最小的安全阶段。
    pub mode: ScheduleResetMode,
    /// Consecutive successes required before a session starts.
    /// `0` derives it from the current window as `(cw_max + 1) / (cw + 1)`.
    ///
    /// 会话开始前所需的连续成功次数。
    /// `0` 表示根据当前窗口动态计算为 `(cw_max + 1) / (cw + 1)`。
    pub activation_threshold: u32,
}

/// Frame aggregation parameters.
///
/// 帧聚合参数。
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    /// Install an A-MSDU aggregator on the station.
    /// 为站点安装 A-MSDU 聚合器。
    pub enabled: bool,
    /// Bound the aggregate by `2^stage` frames instead of aggregating greedily.
    /// 以 `2^stage` 帧限制聚合数量，而不是贪婪聚合。
    pub fair_share: bool,
    /// The maximum A-MSDU size in bytes.
    /// A-MSDU 的最大字节数。
    pub max_amsdu_size: usize,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            cw_min: 15,
            cw_max: 1023,
        }
    }
}

impl Default for ScheduleResetConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            conservative: false,
            mode: ScheduleResetMode::Halving,
            activation_threshold: 1,
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fair_share: false,
            max_amsdu_size: 7935, // 802.11n maximum A-MSDU length
        }
    }
}

impl Config {
    /// Rejects parameter combinations the contention engine cannot honour.
    ///
    /// 拒绝竞争引擎无法满足的参数组合。
    pub fn validate(&self) -> Result<()> {
        let ContentionConfig { cw_min, cw_max } = self.contention;
        let invalid = |reason| Error::InvalidContentionWindow {
            cw_min,
            cw_max,
            reason,
        };
        // cw_min >= 1 keeps the deterministic backoff, a divisor in conservative
        // Schedule Reset, strictly positive.
        if cw_min == 0 {
            return Err(invalid("cw_min must be at least 1"));
        }
        if cw_min > cw_max {
            return Err(invalid("cw_min must not exceed cw_max"));
        }
        if !cw_min.wrapping_add(1).is_power_of_two() || !cw_max.wrapping_add(1).is_power_of_two()
        {
            return Err(invalid("cw_min + 1 and cw_max + 1 must be powers of two"));
        }
        if self.schedule_reset.enabled && !self.eca.enabled {
            return Err(Error::ScheduleResetWithoutEca);
        }
        if self.aggregation.enabled && self.aggregation.max_amsdu_size <= AMSDU_SUBFRAME_HEADER_LEN
        {
            return Err(Error::InvalidAggregateLimit(self.aggregation.max_amsdu_size));
        }
        if self.aggregation.fair_share && !self.aggregation.enabled {
            return Err(Error::InvalidSimulation(
                "fair-share aggregation requires an aggregator",
            ));
        }
        Ok(())
    }
}

/// Parameters of a simulation run driven by the reference harness.
///
/// 参考仿真框架运行参数。
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// MAC configuration shared by every station.
    /// 所有站点共享的 MAC 配置。
    pub mac: Config,
    /// Number of independent networks (one shared channel each).
    /// 独立网络的数量（每个网络一个共享信道）。
    pub networks: u32,
    /// Contending stations per network.
    /// 每个网络中的竞争站点数。
    pub stations_per_network: u32,
    /// Simulated duration of the run.
    /// 仿真运行时长。
    pub duration: Duration,
    /// Instant at which counters are cleared to exclude warm-up noise.
    /// 清零计数器的时刻，用于排除预热阶段的噪声。
    pub stats_reset_at: Option<Duration>,
    /// Seed for every random decision in the run.
    /// 本次运行中所有随机决策的种子。
    pub seed: u64,
    /// Physical-layer timing.
    /// 物理层时序。
    pub phy: PhyConfig,
    /// Offered traffic.
    /// 业务负载。
    pub traffic: TrafficConfig,
    /// Retry limits applied by the rate-control collaborator.
    /// 速率控制协作者使用的重传上限。
    pub retry: RetryConfig,
    /// Probability that a lone transmission loses its ACK.
    /// 单独传输丢失 ACK 的概率。
    pub frame_error_rate: f64,
}

/// Physical-layer timing of the slotted channel.
///
/// 时隙信道的物理层时序。
#[derive(Debug, Clone)]
pub struct PhyConfig {
    /// Duration of one idle backoff slot.
    /// 一个空闲退避时隙的时长。
    pub slot_time: Duration,
    /// Payload bit rate.
    /// 载荷比特率。
    pub data_rate_bps: u64,
    /// Preamble and PLCP header duration.
    /// 前导码和 PLCP 头时长。
    pub phy_header: Duration,
    /// SIFS + ACK + DIFS following a successful exchange.
    /// 成功交换之后的 SIFS + ACK + DIFS。
    pub ack_overhead: Duration,
    /// EIFS-like silence following a collision.
    /// 碰撞之后类似 EIFS 的静默时长。
    pub collision_overhead: Duration,
}

/// Offered traffic. Queues are kept saturated.
///
/// 业务负载。队列保持饱和。
#[derive(Debug, Clone)]
pub struct TrafficConfig {
    /// MSDU payload size in bytes.
    /// MSDU 载荷字节数。
    pub payload_size: usize,
    /// Frames kept queued at every station.
    /// 每个站点保持排队的帧数。
    pub backlog: usize,
}

/// Retry limits used by the rate-control collaborator.
///
/// 速率控制协作者使用的重传上限。
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Long retry limit for data frames.
    /// 数据帧的长重传上限。
    pub max_data_retries: u32,
    /// Short retry limit for RTS frames.
    /// RTS 帧的短重传上限。
    pub max_rts_retries: u32,
    /// Frames larger than this are protected by RTS/CTS.
    /// 大于此值的帧使用 RTS/CTS 保护。
    pub rts_threshold: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mac: Config::default(),
            networks: 1,
            stations_per_network: 4,
            duration: Duration::from_secs(1),
            stats_reset_at: None,
            seed: 1,
            phy: PhyConfig::default(),
            traffic: TrafficConfig::default(),
            retry: RetryConfig::default(),
            frame_error_rate: 0.0,
        }
    }
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            slot_time: Duration::from_micros(9),
            data_rate_bps: 54_000_000,
            phy_header: Duration::from_micros(20),
            ack_overhead: Duration::from_micros(94), // SIFS 16 + ACK 44 + DIFS 34
            collision_overhead: Duration::from_micros(94),
        }
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            payload_size: 1470,
            backlog: 8,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_data_retries: 7,
            max_rts_retries: 7,
            rts_threshold: usize::MAX,
        }
    }
}

impl SimulationConfig {
    /// Validates the harness parameters and the embedded MAC configuration.
    ///
    /// 校验仿真参数以及内嵌的 MAC 配置。
    pub fn validate(&self) -> Result<()> {
        self.mac.validate()?;
        if self.networks == 0 || self.stations_per_network == 0 {
            return Err(Error::InvalidSimulation("at least one station is required"));
        }
        if self.duration.is_zero() {
            return Err(Error::InvalidSimulation("duration must be positive"));
        }
        if self.stats_reset_at.is_some_and(|at| at >= self.duration) {
            return Err(Error::InvalidSimulation(
                "stats reset must happen before the end of the run",
            ));
        }
        if self.phy.slot_time.is_zero() || self.phy.data_rate_bps == 0 {
            return Err(Error::InvalidSimulation("slot time and data rate must be positive"));
        }
        if self.traffic.payload_size == 0 || self.traffic.backlog == 0 {
            return Err(Error::InvalidSimulation("traffic must be non-empty"));
        }
        if !(0.0..1.0).contains(&self.frame_error_rate) {
            return Err(Error::InvalidSimulation("frame error rate must lie in [0, 1)"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_power_of_two_window() {
        let mut config = Config::default();
        config.contention.cw_min = 16;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidContentionWindow { cw_min: 16, .. })
        ));
    }

    #[test]
    fn test_rejects_zero_cw_min() {
        let mut config = Config::default();
        config.contention.cw_min = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidContentionWindow { .. })
        ));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut config = Config::default();
        config.contention.cw_min = 63;
        config.contention.cw_max = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_schedule_reset_requires_eca() {
        let mut config = Config::default();
        config.schedule_reset.enabled = true;
        assert!(matches!(config.validate(), Err(Error::ScheduleResetWithoutEca)));

        config.eca.enabled = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fair_share_requires_aggregator() {
        let mut config = Config::default();
        config.aggregation.fair_share = true;
        assert!(config.validate().is_err());

        config.aggregation.enabled = true;
        assert!(config.validate().is_ok());

        config.aggregation.max_amsdu_size = AMSDU_SUBFRAME_HEADER_LEN;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidAggregateLimit(_))
        ));
    }

    #[test]
    fn test_simulation_rejects_bad_parameters() {
        let mut config = SimulationConfig::default();
        config.frame_error_rate = 1.0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.stats_reset_at = Some(config.duration);
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.stations_per_network = 0;
        assert!(config.validate().is_err());
    }
}
