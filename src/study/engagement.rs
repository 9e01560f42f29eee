//! Engagement synthesis
//!
//! Generates the fabricated like/share counts shown next to every post and
//! comment. Counts are drawn once at assignment time, persisted with the
//! participant, and never recomputed mid-session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::study::condition::{ExperimentalCondition, SupportLevel};
use crate::study::content::CatalogPost;
use crate::study::rng::StudyRng;

/// Engagement boost applied under high social support
const HIGH_SUPPORT_MULTIPLIER: f64 = 2.0;
/// Engagement suppression applied under low social support
const LOW_SUPPORT_MULTIPLIER: f64 = 0.3;
/// Uniform jitter band around the multiplied base value (+/- 25%)
const JITTER_FRACTION: f64 = 0.25;

/// Synthesized counts for one content item
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngagementStats {
    pub like_count: u64,
    pub share_count: u64,
    pub display_like_count: String,
    pub display_share_count: String,
}

impl EngagementStats {
    pub fn from_counts(like_count: u64, share_count: u64) -> Self {
        Self {
            like_count,
            share_count,
            display_like_count: abbreviate(like_count),
            display_share_count: abbreviate(share_count),
        }
    }
}

/// How counts are drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngagementStrategy {
    /// Catalog base counts scaled by the support multiplier with uniform jitter
    MultiplierJitter,
    /// Independent clamped Gaussian draw per item (Box-Muller)
    Gaussian,
}

impl EngagementStrategy {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "multiplier" => Some(Self::MultiplierJitter),
            "gaussian" => Some(Self::Gaussian),
            _ => None,
        }
    }
}

/// Parameters for one clamped Gaussian draw
#[derive(Clone, Copy, Debug)]
pub struct GaussianSpec {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

pub const POST_LIKES: GaussianSpec = GaussianSpec {
    mean: 530_000.0,
    std_dev: 150_000.0,
    min: 80_000.0,
    max: 980_000.0,
};

pub const POST_SHARES: GaussianSpec = GaussianSpec {
    mean: 30_000.0,
    std_dev: 5_000.0,
    min: 15_000.0,
    max: 45_000.0,
};

pub const COMMENT_LIKES: GaussianSpec = GaussianSpec {
    mean: 7_500.0,
    std_dev: 2_500.0,
    min: 0.0,
    max: 15_000.0,
};

pub const COMMENT_SHARES: GaussianSpec = GaussianSpec {
    mean: 1_000.0,
    std_dev: 333.0,
    min: 0.0,
    max: 2_000.0,
};

/// One clamped Gaussian sample via the Box-Muller transform
pub fn gaussian_sample(rng: &mut StudyRng, spec: GaussianSpec) -> u64 {
    let u1 = rng.uniform().max(f64::EPSILON);
    let u2 = rng.uniform();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    (spec.mean + z * spec.std_dev).clamp(spec.min, spec.max).round() as u64
}

/// Base count scaled by the support multiplier with +/- 25% uniform jitter,
/// floored at zero
fn jittered(rng: &mut StudyRng, base: u64, multiplier: f64) -> u64 {
    let jitter = 1.0 + (rng.uniform() * 2.0 - 1.0) * JITTER_FRACTION;
    let value = (base as f64 * multiplier * jitter).round();
    value.max(0.0) as u64
}

fn support_multiplier(condition: &ExperimentalCondition) -> f64 {
    match condition.support {
        Some(SupportLevel::High) => HIGH_SUPPORT_MULTIPLIER,
        Some(SupportLevel::Low) => LOW_SUPPORT_MULTIPLIER,
        None => 1.0,
    }
}

/// Draw engagement stats for every post and comment in the catalog
///
/// Keys are item ids ("p1", "p1c3", ...). Comments draw from the comment
/// bucket the condition selects, so the frozen map covers exactly the items
/// the participant will see.
pub fn synthesize(
    catalog: &[CatalogPost],
    condition: &ExperimentalCondition,
    strategy: EngagementStrategy,
    rng: &mut StudyRng,
) -> HashMap<String, EngagementStats> {
    let multiplier = support_multiplier(condition);
    let mut stats = HashMap::new();

    for post in catalog {
        let post_stats = match strategy {
            EngagementStrategy::Gaussian => EngagementStats::from_counts(
                gaussian_sample(rng, POST_LIKES),
                gaussian_sample(rng, POST_SHARES),
            ),
            EngagementStrategy::MultiplierJitter => EngagementStats::from_counts(
                jittered(rng, post.base_likes, multiplier),
                jittered(rng, post.base_shares, multiplier),
            ),
        };
        stats.insert(post.id.to_string(), post_stats);

        for comment in post.bucket(condition.valence) {
            let comment_stats = match strategy {
                EngagementStrategy::Gaussian => EngagementStats::from_counts(
                    gaussian_sample(rng, COMMENT_LIKES),
                    gaussian_sample(rng, COMMENT_SHARES),
                ),
                EngagementStrategy::MultiplierJitter => EngagementStats::from_counts(
                    jittered(rng, comment.base_likes, multiplier),
                    jittered(rng, comment.base_shares, multiplier),
                ),
            };
            stats.insert(format!("{}{}", post.id, comment.id_suffix), comment_stats);
        }
    }

    stats
}

/// Abbreviate a count for display
///
/// Millions render with one decimal, dropping a trailing ".0"; thousands
/// render with no decimal; smaller counts render literally.
pub fn abbreviate(count: u64) -> String {
    if count >= 1_000_000 {
        let millions = count as f64 / 1_000_000.0;
        let text = format!("{:.1}M", millions);
        if let Some(stripped) = text.strip_suffix(".0M") {
            format!("{}M", stripped)
        } else {
            text
        }
    } else if count >= 1_000 {
        format!("{}K", count / 1_000)
    } else {
        count.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::condition::Valence;
    use crate::study::content;

    #[test]
    fn abbreviation_cases() {
        assert_eq!(abbreviate(999), "999");
        assert_eq!(abbreviate(1_000), "1K");
        assert_eq!(abbreviate(1_500_000), "1.5M");
        assert_eq!(abbreviate(2_000_000), "2M");
    }

    #[test]
    fn abbreviation_edge_values() {
        assert_eq!(abbreviate(0), "0");
        assert_eq!(abbreviate(1_999), "1K");
        assert_eq!(abbreviate(999_999), "999K");
        // 1.049999 rounds to 1.0, which renders without the decimal
        assert_eq!(abbreviate(1_049_999), "1M");
        assert_eq!(abbreviate(2_350_000), "2.4M");
    }

    #[test]
    fn gaussian_samples_respect_clamps() {
        let mut rng = StudyRng::seeded(11);
        for spec in [POST_LIKES, POST_SHARES, COMMENT_LIKES, COMMENT_SHARES] {
            for _ in 0..10_000 {
                let sample = gaussian_sample(&mut rng, spec) as f64;
                assert!(sample >= spec.min && sample <= spec.max);
            }
        }
    }

    #[test]
    fn jitter_stays_within_band() {
        let mut rng = StudyRng::seeded(12);
        for _ in 0..10_000 {
            let value = jittered(&mut rng, 1_000, 2.0) as f64;
            // base 1000 * 2.0 jittered by +/- 25%, plus rounding
            assert!((1_499.0..=2_501.0).contains(&value));
        }
    }

    #[test]
    fn synthesize_covers_every_post_and_selected_comment() {
        let mut rng = StudyRng::seeded(13);
        let condition = ExperimentalCondition {
            valence: Valence::Condemning,
            support: None,
        };
        let stats = synthesize(
            content::catalog(),
            &condition,
            EngagementStrategy::Gaussian,
            &mut rng,
        );

        for post in content::catalog() {
            assert!(stats.contains_key(post.id), "missing stats for {}", post.id);
            for comment in post.bucket(condition.valence) {
                let item_id = format!("{}{}", post.id, comment.id_suffix);
                assert!(stats.contains_key(&item_id), "missing stats for {}", item_id);
            }
        }
    }

    #[test]
    fn low_support_suppresses_counts() {
        let mut rng = StudyRng::seeded(14);
        let low = ExperimentalCondition {
            valence: Valence::Neutral,
            support: Some(SupportLevel::Low),
        };
        let stats = synthesize(
            content::catalog(),
            &low,
            EngagementStrategy::MultiplierJitter,
            &mut rng,
        );
        for post in content::catalog() {
            let generated = stats[post.id].like_count as f64;
            // 0.3 multiplier with +25% jitter at most
            assert!(generated <= post.base_likes as f64 * 0.3 * 1.26);
        }
    }
}
