//! Objective sizing.

use critcast_domain::CampaignEventConfig;

use crate::infrastructure::ports::ObjectiveCalculator;

/// Scales the objective with audience size.
///
/// `target = max(minimum_objective, ceil(viewer_count * objective_coefficient), 1)`
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardObjectiveCalculator;

impl ObjectiveCalculator for StandardObjectiveCalculator {
    fn compute(&self, viewer_count: u32, config: &CampaignEventConfig) -> u32 {
        let coefficient = if config.objective_coefficient.is_finite() {
            config.objective_coefficient.max(0.0)
        } else {
            0.0
        };
        let scaled = (f64::from(viewer_count) * coefficient).ceil();
        // `as` saturates for out-of-range floats
        let scaled = scaled as u32;
        scaled.max(config.minimum_objective).max(1)
    }
}
