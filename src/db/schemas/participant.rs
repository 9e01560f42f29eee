//! Participant document schema
//!
//! One document per study participant, holding the frozen condition and
//! engagement stats, the append-only event log, the derived per-post
//! interaction map, and survey responses.

use std::collections::HashMap;

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::study::{
    EngagementStats, ExperimentalCondition, InteractionEvent, ItemInteractions, Stage,
};

/// Collection name for participants
pub const PARTICIPANT_COLLECTION: &str = "participants";

/// Current document schema version
pub const SCHEMA_VERSION: i32 = 2;

fn default_schema_version() -> i32 {
    SCHEMA_VERSION
}

/// Recruitment-platform handoff parameters captured at landing
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PlatformParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prolific_pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// SONA participant id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sona_id: Option<String>,
}

/// Survey responses by page
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SurveyResponses {
    #[serde(default)]
    pub pre: Map<String, Value>,
    #[serde(default)]
    pub post_1: Map<String, Value>,
    #[serde(default)]
    pub post_2: Map<String, Value>,
    #[serde(default)]
    pub demographics: Map<String, Value>,
}

/// Participant document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ParticipantDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Resolved participant identifier
    pub participant_id: String,

    #[serde(default = "default_schema_version")]
    pub schema_version: i32,

    #[serde(default)]
    pub platform: PlatformParams,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub stage: Stage,

    /// Current simulation section index
    #[serde(default)]
    pub section: usize,

    #[serde(default)]
    pub is_bot: bool,

    /// Consent given
    #[serde(default)]
    pub is_verified: bool,

    /// Frozen once assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ExperimentalCondition>,

    /// Frozen once generated, keyed by item id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement: Option<HashMap<String, EngagementStats>>,

    /// Derived per-post interaction state
    #[serde(default)]
    pub interactions: HashMap<String, ItemInteractions>,

    /// Append-only event log, timestamp-monotonic
    #[serde(default)]
    pub events: Vec<InteractionEvent>,

    #[serde(default)]
    pub surveys: SurveyResponses,

    /// Epoch-milliseconds each stage was entered, keyed by stage label
    #[serde(default)]
    pub stage_times: HashMap<String, i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_simulation_time_ms: Option<i64>,

    /// Auto-export gate already fired
    #[serde(default)]
    pub exported: bool,
}

impl ParticipantDoc {
    /// Create a fresh record at landing
    pub fn new(
        participant_id: String,
        platform: PlatformParams,
        user_agent: Option<String>,
        landed_at_ms: i64,
    ) -> Self {
        let mut stage_times = HashMap::new();
        stage_times.insert(Stage::Landed.as_str().to_string(), landed_at_ms);

        Self {
            _id: None,
            metadata: Metadata::new(),
            participant_id,
            schema_version: SCHEMA_VERSION,
            platform,
            user_agent,
            stage: Stage::Landed,
            section: 0,
            is_bot: false,
            is_verified: false,
            condition: None,
            engagement: None,
            interactions: HashMap::new(),
            events: Vec::new(),
            surveys: SurveyResponses::default(),
            stage_times,
            total_simulation_time_ms: None,
            exported: false,
        }
    }

    /// Milliseconds spent in the session, from landing to `now_ms`
    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        self.stage_times
            .get(Stage::Landed.as_str())
            .map(|landed| (now_ms - *landed).max(0))
            .unwrap_or(0)
    }
}

impl IntoIndexes for ParticipantDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on participant_id
            (
                doc! { "participant_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("participant_id_unique".to_string())
                        .build(),
                ),
            ),
            // Index on stage for admin listing
            (
                doc! { "stage": 1 },
                Some(
                    IndexOptions::builder()
                        .name("stage_index".to_string())
                        .build(),
                ),
            ),
            // Index on creation time for export ordering
            (
                doc! { "metadata.created_at": 1 },
                Some(
                    IndexOptions::builder()
                        .name("created_at_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ParticipantDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_doc_starts_landed() {
        let doc = ParticipantDoc::new("abc123".to_string(), PlatformParams::default(), None, 1_000);
        assert_eq!(doc.stage, Stage::Landed);
        assert_eq!(doc.stage_times["landed"], 1_000);
        assert_eq!(doc.schema_version, SCHEMA_VERSION);
        assert!(!doc.is_bot);
        assert!(doc.condition.is_none());
    }

    #[test]
    fn elapsed_counts_from_landing() {
        let doc = ParticipantDoc::new("abc123".to_string(), PlatformParams::default(), None, 1_000);
        assert_eq!(doc.elapsed_ms(125_000), 124_000);
        assert_eq!(doc.elapsed_ms(500), 0);
    }
}
