//! Drift data model

use serde::Serialize;

use crate::error::ClassificationError;

/// Number of classifier outputs
pub const SCORE_COUNT: usize = 4;

/// Raw classifier scores for one image.
///
/// Slot order matches the model output:
/// `[boredom, confusion, engagement, frustration]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreVector {
    pub boredom: f32,
    pub confusion: f32,
    pub engagement: f32,
    pub frustration: f32,
}

impl ScoreVector {
    pub fn new(boredom: f32, confusion: f32, engagement: f32, frustration: f32) -> Self {
        Self { boredom, confusion, engagement, frustration }
    }

    /// Build from raw model output, rejecting anything that is not
    /// exactly four finite non-negative values.
    pub fn from_slice(raw: &[f32]) -> Result<Self, ClassificationError> {
        if raw.len() != SCORE_COUNT {
            return Err(ClassificationError::MalformedOutput(format!(
                "expected {} scores, got {}",
                SCORE_COUNT,
                raw.len()
            )));
        }

        if let Some((idx, value)) = raw
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(ClassificationError::MalformedOutput(format!(
                "score {} is {}",
                idx, value
            )));
        }

        Ok(Self::new(raw[0], raw[1], raw[2], raw[3]))
    }
}

/// Detected cognitive drift. Absence of drift is `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftLabel {
    Disengagement,
    Frustration,
    Confusion,
    Boredom,
}

impl DriftLabel {
    pub const ALL: [DriftLabel; 4] = [
        DriftLabel::Disengagement,
        DriftLabel::Frustration,
        DriftLabel::Confusion,
        DriftLabel::Boredom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DriftLabel::Disengagement => "disengagement",
            DriftLabel::Frustration => "frustration",
            DriftLabel::Confusion => "confusion",
            DriftLabel::Boredom => "boredom",
        }
    }
}

impl std::fmt::Display for DriftLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_keeps_order() {
        let scores = ScoreVector::from_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(scores.boredom, 1.0);
        assert_eq!(scores.confusion, 2.0);
        assert_eq!(scores.engagement, 3.0);
        assert_eq!(scores.frustration, 4.0);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(matches!(
            ScoreVector::from_slice(&[1.0, 2.0, 3.0]),
            Err(ClassificationError::MalformedOutput(_))
        ));
        assert!(matches!(
            ScoreVector::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            Err(ClassificationError::MalformedOutput(_))
        ));
        assert!(ScoreVector::from_slice(&[]).is_err());
    }

    #[test]
    fn test_from_slice_rejects_bad_values() {
        assert!(ScoreVector::from_slice(&[1.0, f32::NAN, 3.0, 0.1]).is_err());
        assert!(ScoreVector::from_slice(&[1.0, 0.2, f32::INFINITY, 0.1]).is_err());
        assert!(ScoreVector::from_slice(&[1.0, 0.2, 3.0, -0.1]).is_err());
    }

    #[test]
    fn test_label_names() {
        assert_eq!(DriftLabel::Disengagement.to_string(), "disengagement");
        assert_eq!(
            serde_json::to_string(&DriftLabel::Boredom).unwrap(),
            "\"boredom\""
        );
    }
}
