//! 随机与确定性退避。
//! Random and deterministic backoff.

use super::random::RandomDeviate;
use super::trace::{StationId, TraceKind};
use super::traits::MacContext;
use tracing::trace;

/// How the next backoff value is chosen.
/// 下一个退避值的选择方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffMode {
    /// Uniform over `[0, cw]`.
    Random,
    /// Half the window size, the CSMA/ECA post-success backoff.
    Deterministic,
}

/// Chooses backoff values and hands them to the channel arbiter.
///
/// 选择退避值并将其交给信道仲裁者。
#[derive(Debug)]
pub struct BackoffEngine {
    rng: Box<dyn RandomDeviate>,
    assigned: Option<u32>,
}

impl BackoffEngine {
    pub fn new(rng: Box<dyn RandomDeviate>) -> Self {
        Self {
            rng,
            assigned: None,
        }
    }

    /// The deterministic backoff for window `cw`: `cw / 2 + 1`.
    ///
    /// For the odd windows a binary exponential backoff produces this is
    /// `(cw + 1) / 2`, half the number of slots in the window.
    pub fn deterministic_backoff(cw: u32) -> u32 {
        cw / 2 + 1
    }

    /// The last value handed to the arbiter, if any.
    pub fn assigned(&self) -> Option<u32> {
        self.assigned
    }

    /// Computes the next backoff for `cw` without assigning it.
    pub fn draw(&mut self, mode: BackoffMode, cw: u32) -> u32 {
        match mode {
            BackoffMode::Random => self.rng.next_in(0, cw),
            BackoffMode::Deterministic => Self::deterministic_backoff(cw),
        }
    }

    /// Draws, records, starts the countdown and reports the value.
    /// 抽取、记录、启动倒计时并上报退避值。
    pub fn assign(
        &mut self,
        mode: BackoffMode,
        cw: u32,
        station: StationId,
        ctx: &mut MacContext<'_>,
    ) -> u32 {
        let value = self.draw(mode, cw);
        self.assigned = Some(value);
        trace!(%station, ?mode, cw, backoff = value, "backoff assigned");
        ctx.arbiter.start_backoff(station, value);
        ctx.emit(station, TraceKind::BackoffCounter(value));
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::random::SeededDeviate;

    #[test]
    fn test_deterministic_backoff_is_half_the_window() {
        assert_eq!(BackoffEngine::deterministic_backoff(15), 8);
        assert_eq!(BackoffEngine::deterministic_backoff(63), 32);
        assert_eq!(BackoffEngine::deterministic_backoff(1023), 512);
        for cw in [1u32, 3, 7, 31, 127] {
            assert_eq!(BackoffEngine::deterministic_backoff(cw), (cw + 1) / 2);
        }
    }

    #[test]
    fn test_deterministic_draw_ignores_rng() {
        let mut a = BackoffEngine::new(Box::new(SeededDeviate::new(1)));
        let mut b = BackoffEngine::new(Box::new(SeededDeviate::new(2)));
        for _ in 0..10 {
            assert_eq!(
                a.draw(BackoffMode::Deterministic, 31),
                b.draw(BackoffMode::Deterministic, 31)
            );
        }
    }

    #[test]
    fn test_random_draw_within_window_and_reproducible() {
        let mut a = BackoffEngine::new(Box::new(SeededDeviate::new(9)));
        let mut b = BackoffEngine::new(Box::new(SeededDeviate::new(9)));
        for _ in 0..100 {
            let x = a.draw(BackoffMode::Random, 63);
            assert!(x <= 63);
            assert_eq!(x, b.draw(BackoffMode::Random, 63));
        }
    }
}
