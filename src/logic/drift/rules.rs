//! Drift Thresholds
//!
//! Constants and configuration only, no cascade logic.
//! Values are calibrated to the output scale of the deployed classifier.
//! Thresholds are `f64` and scores are widened before comparison, so a
//! boundary like `0.61` means the real number, not its nearest `f32`.

// ============================================================================
// THRESHOLDS
// ============================================================================

/// Below this engagement score = Disengagement
pub const ENGAGEMENT_MIN: f64 = 2.5;

/// Above this frustration score = Frustration
pub const FRUSTRATION_MAX: f64 = 0.5;

/// Above this confusion score = Confusion
pub const CONFUSION_MAX: f64 = 0.61;

/// Above this boredom score = Boredom
pub const BOREDOM_MAX: f64 = 1.05;

// ============================================================================
// CONFIGURABLE THRESHOLDS
// ============================================================================

/// Thresholds for the drift cascade (configurable)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftThresholds {
    /// Engagement strictly below = Disengagement
    pub engagement_min: f64,
    /// Frustration strictly above = Frustration
    pub frustration_max: f64,
    /// Confusion strictly above = Confusion
    pub confusion_max: f64,
    /// Boredom strictly above = Boredom
    pub boredom_max: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            engagement_min: ENGAGEMENT_MIN,
            frustration_max: FRUSTRATION_MAX,
            confusion_max: CONFUSION_MAX,
            boredom_max: BOREDOM_MAX,
        }
    }
}
