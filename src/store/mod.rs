//! Participant store
//!
//! All record mutations go through typed `RecordPatch` operations so the
//! same field-level merge semantics apply to both backends: MongoDB updates
//! translate to `$set`/`$push` documents (never whole-document replacement),
//! and the in-memory fallback applies the identical mutation to a DashMap.
//! When MongoDB is unreachable at startup the service degrades to the
//! in-memory backend instead of blocking sessions.

use std::collections::HashMap;

use bson::{doc, DateTime, Document};
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::info;

use crate::db::schemas::{ParticipantDoc, PlatformParams, PARTICIPANT_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::study::condition::ExperimentalCondition;
use crate::study::engagement::{EngagementStats, EngagementStrategy};
use crate::study::interactions::{EventKind, InteractionEvent, ItemInteractions};
use crate::study::session::{Stage, SurveyPage};
use crate::study::{content, engagement, rng::StudyRng};
use crate::types::{FeedlabError, Result};

/// One field-level mutation of a participant record
#[derive(Clone, Debug)]
pub enum RecordPatch {
    SetStage { stage: Stage, at_ms: i64 },
    SetSection(usize),
    SetConsent { verified: bool },
    MarkBot,
    SetUserAgent(String),
    SetCondition {
        condition: ExperimentalCondition,
        engagement: HashMap<String, EngagementStats>,
    },
    SetItem { post_id: String, item: ItemInteractions },
    PushEvent(InteractionEvent),
    SetSurvey { page: SurveyPage, responses: Map<String, Value> },
    SetSimulationTime(i64),
    /// Record a named timestamp outside the stage machine
    StampTime { key: String, at_ms: i64 },
    MarkExported,
}

impl RecordPatch {
    /// Apply this patch to an in-memory record
    pub fn apply(&self, doc: &mut ParticipantDoc) {
        match self {
            RecordPatch::SetStage { stage, at_ms } => {
                doc.stage = *stage;
                doc.stage_times.insert(stage.as_str().to_string(), *at_ms);
            }
            RecordPatch::SetSection(section) => doc.section = *section,
            RecordPatch::SetConsent { verified } => doc.is_verified = *verified,
            RecordPatch::MarkBot => doc.is_bot = true,
            RecordPatch::SetUserAgent(ua) => doc.user_agent = Some(ua.clone()),
            RecordPatch::SetCondition {
                condition,
                engagement,
            } => {
                doc.condition = Some(*condition);
                doc.engagement = Some(engagement.clone());
            }
            RecordPatch::SetItem { post_id, item } => {
                doc.interactions.insert(post_id.clone(), item.clone());
            }
            RecordPatch::PushEvent(event) => doc.events.push(event.clone()),
            RecordPatch::SetSurvey { page, responses } => {
                let slot = match page {
                    SurveyPage::Pre => &mut doc.surveys.pre,
                    SurveyPage::Post1 => &mut doc.surveys.post_1,
                    SurveyPage::Post2 => &mut doc.surveys.post_2,
                    SurveyPage::Demographics => &mut doc.surveys.demographics,
                };
                *slot = responses.clone();
            }
            RecordPatch::SetSimulationTime(ms) => doc.total_simulation_time_ms = Some(*ms),
            RecordPatch::StampTime { key, at_ms } => {
                doc.stage_times.insert(key.clone(), *at_ms);
            }
            RecordPatch::MarkExported => doc.exported = true,
        }
    }

    /// Merge this patch into a Mongo update ($set fields and $push events)
    fn merge_into(&self, set: &mut Document, pushed_events: &mut Vec<bson::Bson>) -> Result<()> {
        match self {
            RecordPatch::SetStage { stage, at_ms } => {
                set.insert("stage", stage.as_str());
                set.insert(format!("stage_times.{}", stage.as_str()), at_ms);
            }
            RecordPatch::SetSection(section) => {
                set.insert("section", *section as i64);
            }
            RecordPatch::SetConsent { verified } => {
                set.insert("is_verified", verified);
            }
            RecordPatch::MarkBot => {
                set.insert("is_bot", true);
            }
            RecordPatch::SetUserAgent(ua) => {
                set.insert("user_agent", ua);
            }
            RecordPatch::SetCondition {
                condition,
                engagement,
            } => {
                set.insert("condition", bson::to_bson(condition)?);
                set.insert("engagement", bson::to_bson(engagement)?);
            }
            RecordPatch::SetItem { post_id, item } => {
                set.insert(format!("interactions.{}", post_id), bson::to_bson(item)?);
            }
            RecordPatch::PushEvent(event) => {
                pushed_events.push(bson::to_bson(event)?);
            }
            RecordPatch::SetSurvey { page, responses } => {
                set.insert(
                    format!("surveys.{}", page.as_str()),
                    bson::to_bson(responses)?,
                );
            }
            RecordPatch::SetSimulationTime(ms) => {
                set.insert("total_simulation_time_ms", ms);
            }
            RecordPatch::StampTime { key, at_ms } => {
                set.insert(format!("stage_times.{}", key), at_ms);
            }
            RecordPatch::MarkExported => {
                set.insert("exported", true);
            }
        }
        Ok(())
    }
}

/// Build one combined update document from a patch batch
fn combined_update(patches: &[RecordPatch]) -> Result<Document> {
    let mut set = Document::new();
    let mut pushed_events = Vec::new();

    for patch in patches {
        patch.merge_into(&mut set, &mut pushed_events)?;
    }
    set.insert("metadata.updated_at", DateTime::now());

    let mut update = doc! { "$set": set };
    if !pushed_events.is_empty() {
        update.insert("$push", doc! { "events": { "$each": pushed_events } });
    }
    Ok(update)
}

/// Participant persistence, MongoDB-backed or in-memory
pub enum ParticipantStore {
    Mongo(MongoCollection<ParticipantDoc>),
    Memory(DashMap<String, ParticipantDoc>),
}

impl ParticipantStore {
    /// Open the MongoDB-backed store
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        let collection = client
            .collection::<ParticipantDoc>(PARTICIPANT_COLLECTION)
            .await?;
        Ok(Self::Mongo(collection))
    }

    /// Open the in-memory store (degraded mode)
    pub fn memory() -> Self {
        info!("Participant store running in-memory; records will not survive restart");
        Self::Memory(DashMap::new())
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Mongo(_))
    }

    /// Fetch a participant record
    pub async fn get(&self, participant_id: &str) -> Result<Option<ParticipantDoc>> {
        match self {
            Self::Mongo(collection) => {
                collection
                    .find_one(doc! { "participant_id": participant_id })
                    .await
            }
            Self::Memory(map) => Ok(map.get(participant_id).map(|r| r.clone())),
        }
    }

    /// Fetch a participant record or fail with NotFound
    pub async fn require(&self, participant_id: &str) -> Result<ParticipantDoc> {
        self.get(participant_id).await?.ok_or_else(|| {
            FeedlabError::NotFound(format!("participant '{}' not found", participant_id))
        })
    }

    /// Create the record at landing if absent; returns the stored record
    pub async fn create_if_absent(
        &self,
        participant_id: &str,
        platform: PlatformParams,
        user_agent: Option<String>,
        landed_at_ms: i64,
    ) -> Result<ParticipantDoc> {
        if let Some(existing) = self.get(participant_id).await? {
            return Ok(existing);
        }

        let doc = ParticipantDoc::new(
            participant_id.to_string(),
            platform,
            user_agent,
            landed_at_ms,
        );
        match self {
            Self::Mongo(collection) => {
                collection.insert_one(doc.clone()).await?;
            }
            Self::Memory(map) => {
                map.insert(participant_id.to_string(), doc.clone());
            }
        }
        Ok(doc)
    }

    /// Apply a patch batch and return the updated record
    pub async fn apply(
        &self,
        participant_id: &str,
        patches: Vec<RecordPatch>,
    ) -> Result<ParticipantDoc> {
        match self {
            Self::Mongo(collection) => {
                let mut doc = self.require(participant_id).await?;
                let update = combined_update(&patches)?;
                collection
                    .update_one(doc! { "participant_id": participant_id }, update)
                    .await?;
                for patch in &patches {
                    patch.apply(&mut doc);
                }
                Ok(doc)
            }
            Self::Memory(map) => {
                let mut entry = map.get_mut(participant_id).ok_or_else(|| {
                    FeedlabError::NotFound(format!("participant '{}' not found", participant_id))
                })?;
                for patch in &patches {
                    patch.apply(entry.value_mut());
                }
                // Mirror the updated_at stamp the Mongo update carries
                entry.value_mut().metadata.touch();
                Ok(entry.clone())
            }
        }
    }

    /// Assign the experimental condition, generating engagement stats once
    ///
    /// Idempotent: a participant who already holds a condition gets the
    /// stored assignment back unchanged, stats included.
    pub async fn assign_condition(
        &self,
        participant_id: &str,
        strategy: EngagementStrategy,
        factorial: bool,
        rng: &mut StudyRng,
        now_ms: i64,
    ) -> Result<(ExperimentalCondition, HashMap<String, EngagementStats>)> {
        let doc = self.require(participant_id).await?;
        if let (Some(condition), Some(stats)) = (doc.condition, doc.engagement) {
            return Ok((condition, stats));
        }

        let condition = ExperimentalCondition::draw(rng, factorial);
        let stats = engagement::synthesize(content::catalog(), &condition, strategy, rng);
        info!(
            participant_id,
            condition = %condition.label(),
            "condition assigned"
        );

        let event = InteractionEvent::new(EventKind::ConditionAssigned, "session", now_ms)
            .with_payload(serde_json::json!({ "condition": condition.label() }));
        self.apply(
            participant_id,
            vec![
                RecordPatch::SetCondition {
                    condition,
                    engagement: stats.clone(),
                },
                RecordPatch::PushEvent(event),
            ],
        )
        .await?;

        Ok((condition, stats))
    }

    /// List every participant record
    pub async fn list(&self) -> Result<Vec<ParticipantDoc>> {
        match self {
            Self::Mongo(collection) => collection.find_many(doc! {}).await,
            Self::Memory(map) => Ok(map.iter().map(|r| r.clone()).collect()),
        }
    }

    /// Soft-delete a single participant record
    pub async fn remove(&self, participant_id: &str) -> Result<bool> {
        match self {
            Self::Mongo(collection) => {
                let result = collection
                    .soft_delete(doc! { "participant_id": participant_id })
                    .await?;
                Ok(result.modified_count > 0)
            }
            Self::Memory(map) => Ok(map.remove(participant_id).is_some()),
        }
    }

    /// Hard-delete the entire dataset; returns the number of records removed
    pub async fn wipe(&self) -> Result<u64> {
        match self {
            Self::Mongo(collection) => {
                let result = collection.delete_many(doc! {}).await?;
                Ok(result.deleted_count)
            }
            Self::Memory(map) => {
                let count = map.len() as u64;
                map.clear();
                Ok(count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn landed_store(pid: &str) -> ParticipantStore {
        let store = ParticipantStore::memory();
        store
            .create_if_absent(pid, PlatformParams::default(), None, 0)
            .await
            .expect("create");
        store
    }

    #[tokio::test]
    async fn create_if_absent_is_idempotent() {
        let store = landed_store("p-1").await;
        let doc = store
            .create_if_absent("p-1", PlatformParams::default(), None, 99)
            .await
            .expect("second create");
        // Original landing time survives
        assert_eq!(doc.stage_times["landed"], 0);
    }

    #[tokio::test]
    async fn patches_apply_in_order() {
        let store = landed_store("p-2").await;
        let event = InteractionEvent::new(EventKind::Like, "p1", 5);
        let doc = store
            .apply(
                "p-2",
                vec![
                    RecordPatch::SetStage {
                        stage: Stage::Consented,
                        at_ms: 10,
                    },
                    RecordPatch::SetConsent { verified: true },
                    RecordPatch::PushEvent(event),
                ],
            )
            .await
            .expect("apply");

        assert_eq!(doc.stage, Stage::Consented);
        assert!(doc.is_verified);
        assert_eq!(doc.events.len(), 1);
        assert_eq!(doc.stage_times["consented"], 10);
    }

    #[tokio::test]
    async fn assign_condition_is_idempotent() {
        let store = landed_store("p-3").await;
        let mut rng = StudyRng::seeded(5);

        let (first, first_stats) = store
            .assign_condition("p-3", EngagementStrategy::Gaussian, false, &mut rng, 100)
            .await
            .expect("first assignment");
        let (second, second_stats) = store
            .assign_condition("p-3", EngagementStrategy::Gaussian, false, &mut rng, 200)
            .await
            .expect("second assignment");

        assert_eq!(first, second);
        assert_eq!(first_stats, second_stats);

        // Only the first assignment logs an event
        let doc = store.require("p-3").await.expect("fetch");
        let assigned = doc
            .events
            .iter()
            .filter(|e| e.kind == EventKind::ConditionAssigned)
            .count();
        assert_eq!(assigned, 1);
    }

    #[tokio::test]
    async fn engagement_is_frozen_after_assignment() {
        let store = landed_store("p-4").await;
        let mut rng = StudyRng::seeded(6);
        let (_, stats) = store
            .assign_condition("p-4", EngagementStrategy::Gaussian, false, &mut rng, 0)
            .await
            .expect("assign");

        let stored = store.require("p-4").await.expect("fetch");
        assert_eq!(stored.engagement.as_ref(), Some(&stats));
    }

    #[tokio::test]
    async fn wipe_clears_everything() {
        let store = landed_store("p-5").await;
        store
            .create_if_absent("p-6", PlatformParams::default(), None, 0)
            .await
            .expect("create second");

        let removed = store.wipe().await.expect("wipe");
        assert_eq!(removed, 2);
        assert!(store.get("p-5").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn combined_update_merges_set_and_push() {
        let patches = vec![
            RecordPatch::SetStage {
                stage: Stage::Simulation,
                at_ms: 42,
            },
            RecordPatch::PushEvent(InteractionEvent::new(EventKind::Like, "p1", 43)),
            RecordPatch::PushEvent(InteractionEvent::new(EventKind::Share, "p3", 44)),
        ];
        let update = combined_update(&patches).expect("update doc");
        let set = update.get_document("$set").expect("$set");
        assert_eq!(set.get_str("stage").expect("stage"), "simulation");
        let push = update.get_document("$push").expect("$push");
        let each = push
            .get_document("events")
            .expect("events")
            .get_array("$each")
            .expect("$each");
        assert_eq!(each.len(), 2);
    }
}
