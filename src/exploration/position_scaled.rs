use super::{Exploration, ExplorationContext};

/// Curriculum-style exploration: explore more the further right the player is, and less in the
/// part of the level recent episodes already got through
///
/// rate = clamp(x_scale·x − progress_scale·(recent_avg_x − progress_offset), rate_min, rate_max)
#[derive(Debug, Clone, PartialEq)]
pub struct PositionScaled {
    x_scale: f64,
    progress_scale: f64,
    progress_offset: f64,
    rate_min: f64,
    rate_max: f64,
}

impl PositionScaled {
    /// **Panics** if the rates are not in `[0,1]` or `rate_min > rate_max`
    pub fn new(
        x_scale: f64,
        progress_scale: f64,
        progress_offset: f64,
        rate_min: f64,
        rate_max: f64,
    ) -> Self {
        crate::assert_interval!(rate_min, 0.0, 1.0);
        crate::assert_interval!(rate_max, rate_min, 1.0);
        Self {
            x_scale,
            progress_scale,
            progress_offset,
            rate_min,
            rate_max,
        }
    }
}

impl Exploration for PositionScaled {
    fn rate(&self, ctx: &ExplorationContext) -> f64 {
        let raw =
            self.x_scale * ctx.x - self.progress_scale * (ctx.recent_avg_x - self.progress_offset);
        // NaN inputs fall through to rate_min
        raw.max(self.rate_min).min(self.rate_max)
    }
}
