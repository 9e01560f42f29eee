//! Session pipeline
//!
//! Stage machine, advancement gates, honeypot check, and the auto-export
//! gate. Gates are evaluated on state updates, never on a background timer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{FeedlabError, Result};

/// Auto-export fires only after this much session time
pub const MIN_ELAPSED_MS: i64 = 120_000;
/// ... and at least this many deliberate interactions
pub const MIN_INTERACTIONS: usize = 5;
/// ... and comment views on at least this many distinct posts
pub const MIN_DISTINCT_VIEWS: usize = 3;

/// Completions faster than this are flagged as speeders in the admin view
pub const SPEEDER_THRESHOLD_MS: i64 = 30_000;

/// Number of simulation sections
pub const SECTION_COUNT: usize = 2;

/// Stages of a participant session
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Landed,
    Consented,
    Declined,
    PreSurvey,
    Instructions,
    Tutorial,
    Simulation,
    PostSurvey1,
    PostSurvey2,
    Demographics,
    Debriefed,
    Redirected,
    FailedCheck,
    Completed,
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Landed
    }
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Landed => "landed",
            Stage::Consented => "consented",
            Stage::Declined => "declined",
            Stage::PreSurvey => "pre_survey",
            Stage::Instructions => "instructions",
            Stage::Tutorial => "tutorial",
            Stage::Simulation => "simulation",
            Stage::PostSurvey1 => "post_survey_1",
            Stage::PostSurvey2 => "post_survey_2",
            Stage::Demographics => "demographics",
            Stage::Debriefed => "debriefed",
            Stage::Redirected => "redirected",
            Stage::FailedCheck => "failed_check",
            Stage::Completed => "completed",
        }
    }

    /// Terminal stages accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Declined | Stage::FailedCheck | Stage::Completed)
    }

    /// Whether `to` is a legal next stage from `self`
    pub fn allows(&self, to: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (Stage::Landed, Stage::Consented)
            | (Stage::Landed, Stage::Declined)
            | (Stage::Landed, Stage::FailedCheck)
            | (Stage::Consented, Stage::PreSurvey)
            | (Stage::PreSurvey, Stage::Instructions)
            | (Stage::Instructions, Stage::Tutorial)
            | (Stage::Tutorial, Stage::Simulation)
            // Section advance re-enters simulation
            | (Stage::Simulation, Stage::Simulation)
            | (Stage::Simulation, Stage::PostSurvey1)
            | (Stage::PostSurvey1, Stage::PostSurvey2)
            | (Stage::PostSurvey2, Stage::Demographics)
            | (Stage::Demographics, Stage::Debriefed)
            | (Stage::Debriefed, Stage::Redirected)
            | (Stage::Redirected, Stage::Completed) => true,
            _ => false,
        }
    }
}

/// Survey pages participants submit
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SurveyPage {
    Pre,
    Post1,
    Post2,
    Demographics,
}

impl SurveyPage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyPage::Pre => "pre",
            SurveyPage::Post1 => "post_1",
            SurveyPage::Post2 => "post_2",
            SurveyPage::Demographics => "demographics",
        }
    }

    /// The stage a participant must be in to submit this page
    pub fn submitted_at(&self) -> Stage {
        match self {
            SurveyPage::Pre => Stage::PreSurvey,
            SurveyPage::Post1 => Stage::PostSurvey1,
            SurveyPage::Post2 => Stage::PostSurvey2,
            SurveyPage::Demographics => Stage::Demographics,
        }
    }

    /// The stage submission advances to
    pub fn advances_to(&self) -> Stage {
        match self {
            SurveyPage::Pre => Stage::Instructions,
            SurveyPage::Post1 => Stage::PostSurvey2,
            SurveyPage::Post2 => Stage::Demographics,
            SurveyPage::Demographics => Stage::Debriefed,
        }
    }
}

/// Hidden-field honeypot: real browsers leave it empty
pub fn honeypot_tripped(website: Option<&str>) -> bool {
    website.map(|w| !w.trim().is_empty()).unwrap_or(false)
}

fn require_field<'a>(responses: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    match responses.get(key) {
        Some(value) if !value.is_null() => match value {
            Value::String(s) if s.trim().is_empty() => {
                Err(FeedlabError::Validation(format!("'{}' must not be empty", key)))
            }
            _ => Ok(value),
        },
        _ => Err(FeedlabError::Validation(format!("'{}' is required", key))),
    }
}

/// Validate a survey page submission
///
/// Demographics enforces the required field set (age bounds, gender,
/// education, ethnicity, race); other pages reject empty submissions and
/// blank answers.
pub fn validate_survey(page: SurveyPage, responses: &Map<String, Value>) -> Result<()> {
    if responses.is_empty() {
        return Err(FeedlabError::Validation(
            "survey submission is empty".to_string(),
        ));
    }

    if page == SurveyPage::Demographics {
        let age = require_field(responses, "age")?;
        let age = age
            .as_i64()
            .or_else(|| age.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| FeedlabError::Validation("'age' must be a number".to_string()))?;
        if !(18..=120).contains(&age) {
            return Err(FeedlabError::Validation(
                "'age' must be between 18 and 120".to_string(),
            ));
        }
        for key in ["gender", "education", "ethnicity", "race"] {
            require_field(responses, key)?;
        }
        return Ok(());
    }

    for (key, value) in responses {
        if let Value::String(s) = value {
            if s.trim().is_empty() {
                return Err(FeedlabError::Validation(format!(
                    "'{}' must not be empty",
                    key
                )));
            }
        }
    }
    Ok(())
}

/// Whether a simulation section may advance yet
pub fn section_gate(section_entered_ms: i64, now_ms: i64, delay_ms: u64) -> bool {
    now_ms.saturating_sub(section_entered_ms) >= delay_ms as i64
}

/// Whether the auto-export gate fires
pub fn export_gate(elapsed_ms: i64, interactions: usize, views: usize) -> bool {
    elapsed_ms >= MIN_ELAPSED_MS && interactions >= MIN_INTERACTIONS && views >= MIN_DISTINCT_VIEWS
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn terminal_stages_accept_nothing() {
        for terminal in [Stage::Declined, Stage::FailedCheck, Stage::Completed] {
            assert!(terminal.is_terminal());
            assert!(!terminal.allows(Stage::Simulation));
            assert!(!terminal.allows(Stage::Landed));
        }
    }

    #[test]
    fn pipeline_order_is_enforced() {
        assert!(Stage::Landed.allows(Stage::Consented));
        assert!(Stage::Tutorial.allows(Stage::Simulation));
        assert!(Stage::Simulation.allows(Stage::Simulation));
        assert!(Stage::Simulation.allows(Stage::PostSurvey1));
        assert!(!Stage::Landed.allows(Stage::Simulation));
        assert!(!Stage::PostSurvey1.allows(Stage::Simulation));
        assert!(!Stage::Consented.allows(Stage::Debriefed));
    }

    #[test]
    fn honeypot_detects_filled_field() {
        assert!(!honeypot_tripped(None));
        assert!(!honeypot_tripped(Some("")));
        assert!(!honeypot_tripped(Some("   ")));
        assert!(honeypot_tripped(Some("http://spam.example")));
    }

    #[test]
    fn export_gate_boundaries() {
        // Plenty of time but too few interactions
        assert!(!export_gate(130_000, 4, 3));
        // Everything at or past threshold
        assert!(export_gate(121_000, 5, 3));
        // Time short
        assert!(!export_gate(119_999, 10, 10));
        // Views short
        assert!(!export_gate(200_000, 10, 2));
    }

    #[test]
    fn section_gate_requires_delay() {
        assert!(!section_gate(1_000, 5_000, 10_000));
        assert!(section_gate(1_000, 11_000, 10_000));
        assert!(section_gate(1_000, 11_001, 10_000));
    }

    #[test]
    fn demographics_requires_all_fields() {
        let complete = map(&[
            ("age", json!(30)),
            ("gender", json!("woman")),
            ("education", json!("bachelors")),
            ("ethnicity", json!("not_hispanic")),
            ("race", json!("asian")),
        ]);
        assert!(validate_survey(SurveyPage::Demographics, &complete).is_ok());

        let mut missing = complete.clone();
        missing.remove("race");
        assert!(validate_survey(SurveyPage::Demographics, &missing).is_err());

        let mut underage = complete.clone();
        underage.insert("age".to_string(), json!(17));
        assert!(validate_survey(SurveyPage::Demographics, &underage).is_err());

        let mut age_as_string = complete;
        age_as_string.insert("age".to_string(), json!("45"));
        assert!(validate_survey(SurveyPage::Demographics, &age_as_string).is_ok());
    }

    #[test]
    fn other_pages_reject_blank_answers() {
        assert!(validate_survey(SurveyPage::Pre, &Map::new()).is_err());

        let blank = map(&[("q1", json!(""))]);
        assert!(validate_survey(SurveyPage::Pre, &blank).is_err());

        let filled = map(&[("q1", json!("5")), ("q2", json!(3))]);
        assert!(validate_survey(SurveyPage::Pre, &filled).is_ok());
    }

    #[test]
    fn survey_pages_map_to_stages() {
        assert_eq!(SurveyPage::Pre.submitted_at(), Stage::PreSurvey);
        assert_eq!(SurveyPage::Pre.advances_to(), Stage::Instructions);
        assert_eq!(SurveyPage::Demographics.advances_to(), Stage::Debriefed);
    }
}
