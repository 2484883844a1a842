//! Drift Policy Engine
//!
//! Reduces a ScoreVector to at most one DriftLabel.
//! Input: ScoreVector + DriftThresholds
//! Output: Option<DriftLabel>
//!
//! Rules are evaluated in order and the first match wins. Order encodes
//! urgency, not score magnitude: disengagement masks everything else.

use crate::models::{DriftLabel, ScoreVector};
use super::rules::DriftThresholds;

/// One step of the cascade
pub struct DriftRule {
    pub label: DriftLabel,
    pub matches: fn(&ScoreVector, &DriftThresholds) -> bool,
}

/// Cascade in priority order
pub const CASCADE: [DriftRule; 4] = [
    DriftRule { label: DriftLabel::Disengagement, matches: is_disengaged },
    DriftRule { label: DriftLabel::Frustration, matches: is_frustrated },
    DriftRule { label: DriftLabel::Confusion, matches: is_confused },
    DriftRule { label: DriftLabel::Boredom, matches: is_bored },
];

fn is_disengaged(s: &ScoreVector, t: &DriftThresholds) -> bool {
    f64::from(s.engagement) < t.engagement_min
}

fn is_frustrated(s: &ScoreVector, t: &DriftThresholds) -> bool {
    f64::from(s.frustration) > t.frustration_max
}

fn is_confused(s: &ScoreVector, t: &DriftThresholds) -> bool {
    f64::from(s.confusion) > t.confusion_max
}

fn is_bored(s: &ScoreVector, t: &DriftThresholds) -> bool {
    f64::from(s.boredom) > t.boredom_max
}

// ============================================================================
// MAIN DECISION FUNCTION
// ============================================================================

/// Classify with default thresholds
#[cfg(test)]
pub fn detect(scores: &ScoreVector) -> Option<DriftLabel> {
    detect_with_thresholds(scores, &DriftThresholds::default())
}

/// Classify with custom thresholds
pub fn detect_with_thresholds(
    scores: &ScoreVector,
    thresholds: &DriftThresholds,
) -> Option<DriftLabel> {
    CASCADE
        .iter()
        .find(|rule| (rule.matches)(scores, thresholds))
        .map(|rule| rule.label)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Values that trip no rule at default thresholds
    fn calm() -> ScoreVector {
        ScoreVector::new(0.5, 0.3, 3.0, 0.1)
    }

    #[test]
    fn test_disengagement_has_priority() {
        // Every other signal is also over its threshold
        let scores = ScoreVector::new(5.0, 5.0, 2.49, 5.0);
        assert_eq!(detect(&scores), Some(DriftLabel::Disengagement));

        let scores = ScoreVector::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(detect(&scores), Some(DriftLabel::Disengagement));
    }

    #[test]
    fn test_frustration_beats_confusion_and_boredom() {
        let scores = ScoreVector { frustration: 0.51, confusion: 3.0, boredom: 3.0, ..calm() };
        assert_eq!(detect(&scores), Some(DriftLabel::Frustration));
    }

    #[test]
    fn test_confusion_beats_boredom() {
        let scores = ScoreVector { confusion: 0.62, boredom: 3.0, ..calm() };
        assert_eq!(detect(&scores), Some(DriftLabel::Confusion));
    }

    #[test]
    fn test_boredom() {
        let scores = ScoreVector { boredom: 1.06, ..calm() };
        assert_eq!(detect(&scores), Some(DriftLabel::Boredom));
    }

    #[test]
    fn test_no_drift() {
        assert_eq!(detect(&calm()), None);
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        // These four are exact in f32, so they sit on the threshold
        let scores = ScoreVector::new(1.0, 0.25, 2.5, 0.5);
        let t = DriftThresholds {
            boredom_max: 1.0,
            confusion_max: 0.25,
            ..Default::default()
        };
        assert_eq!(detect_with_thresholds(&scores, &t), None);
    }

    #[test]
    fn test_boundary_compares_real_values() {
        // 0.61f32 is 0.6100000143..., strictly above the 0.61 threshold
        let scores = ScoreVector { confusion: 0.61, ..calm() };
        assert_eq!(detect(&scores), Some(DriftLabel::Confusion));

        // 1.05f32 is 1.0499999523..., just below the boredom threshold
        let scores = ScoreVector { boredom: 1.05, ..calm() };
        assert_eq!(detect(&scores), None);

        let scores = ScoreVector { confusion: 0.609_999, ..calm() };
        assert_eq!(detect(&scores), None);
    }

    #[test]
    fn test_priority_ignores_magnitude() {
        // Boredom far above its threshold still loses to a marginal frustration
        let scores = ScoreVector { frustration: 0.500_1, boredom: 100.0, ..calm() };
        assert_eq!(detect(&scores), Some(DriftLabel::Frustration));
    }

    #[test]
    fn test_exactly_one_branch_fires() {
        let grid = [0.0f32, 0.5, 0.6, 1.0, 1.1, 2.4, 2.5, 2.6, 4.0];
        for &b in &grid {
            for &c in &grid {
                for &e in &grid {
                    for &f in &grid {
                        let scores = ScoreVector::new(b, c, e, f);
                        let t = DriftThresholds::default();
                        let expected = if f64::from(e) < t.engagement_min {
                            Some(DriftLabel::Disengagement)
                        } else if f64::from(f) > t.frustration_max {
                            Some(DriftLabel::Frustration)
                        } else if f64::from(c) > t.confusion_max {
                            Some(DriftLabel::Confusion)
                        } else if f64::from(b) > t.boredom_max {
                            Some(DriftLabel::Boredom)
                        } else {
                            None
                        };
                        assert_eq!(detect(&scores), expected, "scores {:?}", scores);
                    }
                }
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let scores = ScoreVector::new(1.2, 0.7, 2.7, 0.2);
        let first = detect(&scores);
        let second = detect(&scores);
        assert_eq!(first, second);
        assert_eq!(first, Some(DriftLabel::Confusion));
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = DriftThresholds {
            engagement_min: 1.0,
            ..Default::default()
        };
        let scores = ScoreVector { engagement: 2.0, ..calm() };

        assert_eq!(detect(&scores), Some(DriftLabel::Disengagement));
        assert_eq!(detect_with_thresholds(&scores, &thresholds), None);
    }

    #[test]
    fn test_cascade_order() {
        let order: Vec<DriftLabel> = CASCADE.iter().map(|r| r.label).collect();
        assert_eq!(order, DriftLabel::ALL.to_vec());
    }
}
