//! The binary-exponential contention window.
//!
//! 二进制指数退避的竞争窗口。

use tracing::trace;

/// Contention window bounded by `[cw_min, cw_max]`.
///
/// 以 `[cw_min, cw_max]` 为界的竞争窗口。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentionWindow {
    cw_min: u32,
    cw_max: u32,
    cw: u32,
}

impl ContentionWindow {
    /// Creates a window starting at `cw_min`. Bounds are validated by
    /// [`Config::validate`](crate::config::Config::validate).
    pub fn new(cw_min: u32, cw_max: u32) -> Self {
        assert!(cw_min <= cw_max, "cw_min {cw_min} exceeds cw_max {cw_max}");
        Self {
            cw_min,
            cw_max,
            cw: cw_min,
        }
    }

    pub fn cw(&self) -> u32 {
        self.cw
    }

    pub fn cw_min(&self) -> u32 {
        self.cw_min
    }

    pub fn cw_max(&self) -> u32 {
        self.cw_max
    }

    /// Back to the minimum window.
    /// 重置为最小窗口。
    pub fn reset(&mut self) {
        self.cw = self.cw_min;
        trace!(cw = self.cw, "contention window reset");
    }

    /// Doubles the window size, saturating at `cw_max`.
    /// 将窗口大小加倍，在 `cw_max` 处饱和。
    pub fn update_on_failure(&mut self) {
        self.cw = self.cw.saturating_mul(2).saturating_add(1).min(self.cw_max);
        trace!(cw = self.cw, "contention window grown");
    }

    /// Sets the window directly.
    ///
    /// # Panics
    /// If `value` is even or lies outside `[cw_min, cw_max]`.
    pub fn set(&mut self, value: u32) {
        assert!(value % 2 == 1, "contention window {value} must be odd");
        assert!(
            (self.cw_min..=self.cw_max).contains(&value),
            "contention window {value} outside [{}, {}]",
            self.cw_min,
            self.cw_max
        );
        self.cw = value;
    }

    /// `log2((cw + 1) / (cw_min + 1))`, i.e. how many doublings above `cw_min`.
    /// 当前窗口相对 `cw_min` 的加倍次数。
    pub fn backoff_stage(&self) -> u32 {
        ((self.cw + 1) / (self.cw_min + 1)).ilog2()
    }
}
