//! Experimental condition types and assignment
//!
//! Conditions are drawn uniformly and frozen on the participant record.
//! The factorial (valence x support) variant applies under the multiplier
//! engagement strategy; the Gaussian strategy is valence-only.

use serde::{Deserialize, Serialize};

use crate::study::rng::StudyRng;

/// Emotional framing of the focal comment bucket a participant sees
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Valence {
    Sympathetic,
    Condemning,
    Neutral,
}

impl Valence {
    pub const ALL: [Valence; 3] = [Valence::Sympathetic, Valence::Condemning, Valence::Neutral];

    pub fn as_str(&self) -> &'static str {
        match self {
            Valence::Sympathetic => "sympathetic",
            Valence::Condemning => "condemning",
            Valence::Neutral => "neutral",
        }
    }
}

/// Social support manipulation (engagement magnitude)
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    High,
    Low,
}

impl SupportLevel {
    pub const ALL: [SupportLevel; 2] = [SupportLevel::High, SupportLevel::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportLevel::High => "high",
            SupportLevel::Low => "low",
        }
    }
}

/// A participant's assigned experimental condition
///
/// Immutable after assignment. `support` is present only in the factorial
/// design.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExperimentalCondition {
    pub valence: Valence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support: Option<SupportLevel>,
}

impl ExperimentalCondition {
    /// Draw a condition uniformly at random
    pub fn draw(rng: &mut StudyRng, factorial: bool) -> Self {
        let valence = Valence::ALL[rng.pick_index(Valence::ALL.len())];
        let support = if factorial {
            Some(SupportLevel::ALL[rng.pick_index(SupportLevel::ALL.len())])
        } else {
            None
        };
        Self { valence, support }
    }

    /// Condition label used in exports, e.g. "condemning" or "condemning-high"
    pub fn label(&self) -> String {
        match self.support {
            Some(support) => format!("{}-{}", self.valence.as_str(), support.as_str()),
            None => self.valence.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valence_only_draw_has_no_support() {
        let mut rng = StudyRng::seeded(1);
        for _ in 0..50 {
            let condition = ExperimentalCondition::draw(&mut rng, false);
            assert!(condition.support.is_none());
        }
    }

    #[test]
    fn factorial_draw_always_has_support() {
        let mut rng = StudyRng::seeded(2);
        for _ in 0..50 {
            let condition = ExperimentalCondition::draw(&mut rng, true);
            assert!(condition.support.is_some());
        }
    }

    #[test]
    fn all_valences_are_reachable() {
        let mut rng = StudyRng::seeded(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(ExperimentalCondition::draw(&mut rng, false).valence);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn label_formats() {
        let plain = ExperimentalCondition {
            valence: Valence::Condemning,
            support: None,
        };
        assert_eq!(plain.label(), "condemning");

        let factorial = ExperimentalCondition {
            valence: Valence::Sympathetic,
            support: Some(SupportLevel::High),
        };
        assert_eq!(factorial.label(), "sympathetic-high");
    }
}
