//! Interaction log
//!
//! Every participant action is captured twice: as an append-only event and
//! as a per-item interaction map derived from those events. Aggregate
//! summaries are always recomputed from state, never incremented on their
//! own, so a summary folded from the raw event list must equal one read off
//! the maintained map.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::study::condition::Valence;
use crate::study::content;

/// Kinds of captured participant actions
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Like,
    Unlike,
    Share,
    Unshare,
    Comment,
    Reply,
    Dwell,
    ViewComments,
    SurveyResponse,
    ConditionAssigned,
}

/// One appended interaction event
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub kind: EventKind,
    pub item_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl InteractionEvent {
    pub fn new(kind: EventKind, item_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            kind,
            item_id: item_id.into(),
            timestamp,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }

    fn payload_u64(&self, key: &str) -> Option<u64> {
        self.payload.as_ref()?.get(key)?.as_u64()
    }
}

/// A comment or reply authored by the participant
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserComment {
    pub text: String,
    /// The post or comment the text was attached to
    pub target: String,
    pub timestamp: i64,
}

/// Derived interaction state for one post
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemInteractions {
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub reposted: bool,
    #[serde(default)]
    pub viewed_comments: bool,
    #[serde(default)]
    pub dwell_times: Vec<u64>,
    #[serde(default)]
    pub user_comments: Vec<UserComment>,
}

/// Merge one event into the per-post interaction map
///
/// Like/share events toggle final state; dwell samples accumulate as a
/// multiset; comments and replies append. Survey and assignment events
/// carry no item state.
pub fn apply_event(map: &mut HashMap<String, ItemInteractions>, event: &InteractionEvent) {
    let post_id = content::post_of(&event.item_id).to_string();

    match event.kind {
        EventKind::Like => map.entry(post_id).or_default().liked = true,
        EventKind::Unlike => map.entry(post_id).or_default().liked = false,
        EventKind::Share => map.entry(post_id).or_default().reposted = true,
        EventKind::Unshare => map.entry(post_id).or_default().reposted = false,
        EventKind::ViewComments => map.entry(post_id).or_default().viewed_comments = true,
        EventKind::Dwell => {
            if let Some(ms) = event.payload_u64("ms") {
                map.entry(post_id).or_default().dwell_times.push(ms);
            }
        }
        EventKind::Comment => {
            if let Some(text) = event.payload_str("text") {
                let comment = UserComment {
                    text: text.to_string(),
                    target: event.item_id.clone(),
                    timestamp: event.timestamp,
                };
                map.entry(post_id).or_default().user_comments.push(comment);
            }
        }
        EventKind::Reply => {
            if let Some(text) = event.payload_str("text") {
                let reply = UserComment {
                    text: text.to_string(),
                    target: event.item_id.clone(),
                    timestamp: event.timestamp,
                };
                map.entry(post_id).or_default().user_comments.push(reply);
            }
        }
        EventKind::SurveyResponse | EventKind::ConditionAssigned => {}
    }
}

/// Aggregate interaction summary
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_likes: u32,
    pub total_shares: u32,
    pub total_comments: u32,
    pub total_replies: u32,
    pub total_comment_views: u32,
    pub focal_likes: u32,
    pub non_focal_likes: u32,
    pub focal_shares: u32,
    pub non_focal_shares: u32,
    pub focal_comments: u32,
    pub non_focal_comments: u32,
    pub dwell_focal_ms: u64,
    pub dwell_non_focal_ms: u64,
    /// Focal engagement counts keyed by valence label; only the session's
    /// assigned valence accrues
    pub valence_engagements: BTreeMap<String, u32>,
}

fn empty_valence_map() -> BTreeMap<String, u32> {
    Valence::ALL
        .iter()
        .map(|v| (v.as_str().to_string(), 0))
        .collect()
}

/// Read a summary off the maintained interaction map
pub fn summarize_items(
    map: &HashMap<String, ItemInteractions>,
    valence: Option<Valence>,
) -> Summary {
    let mut summary = Summary {
        valence_engagements: empty_valence_map(),
        ..Default::default()
    };

    for (post_id, item) in map {
        let focal = content::is_focal(post_id);
        let mut engagements = 0u32;

        if item.liked {
            summary.total_likes += 1;
            engagements += 1;
            if focal {
                summary.focal_likes += 1;
            } else {
                summary.non_focal_likes += 1;
            }
        }
        if item.reposted {
            summary.total_shares += 1;
            engagements += 1;
            if focal {
                summary.focal_shares += 1;
            } else {
                summary.non_focal_shares += 1;
            }
        }
        if item.viewed_comments {
            summary.total_comment_views += 1;
        }

        for comment in &item.user_comments {
            // A top-level comment targets the post itself; a reply targets a
            // comment within it.
            if comment.target == *post_id {
                summary.total_comments += 1;
                engagements += 1;
                if focal {
                    summary.focal_comments += 1;
                } else {
                    summary.non_focal_comments += 1;
                }
            } else {
                summary.total_replies += 1;
            }
        }

        let dwell: u64 = item.dwell_times.iter().sum();
        if focal {
            summary.dwell_focal_ms += dwell;
        } else {
            summary.dwell_non_focal_ms += dwell;
        }

        if focal && engagements > 0 {
            if let Some(valence) = valence {
                if let Some(count) = summary.valence_engagements.get_mut(valence.as_str()) {
                    *count += engagements;
                }
            }
        }
    }

    summary
}

/// Fold a summary from scratch over the raw event list
pub fn summarize_events(events: &[InteractionEvent], valence: Option<Valence>) -> Summary {
    let mut map = HashMap::new();
    for event in events {
        apply_event(&mut map, event);
    }
    summarize_items(&map, valence)
}

/// Count of events that count as deliberate interactions (gate input)
pub fn interaction_count(events: &[InteractionEvent]) -> usize {
    events
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                EventKind::Like
                    | EventKind::Unlike
                    | EventKind::Share
                    | EventKind::Unshare
                    | EventKind::Comment
                    | EventKind::Reply
                    | EventKind::ViewComments
            )
        })
        .count()
}

/// Number of distinct posts with a recorded comment view (gate input)
pub fn distinct_views(map: &HashMap<String, ItemInteractions>) -> usize {
    map.values().filter(|item| item.viewed_comments).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;

    fn like(item: &str, ts: i64) -> InteractionEvent {
        InteractionEvent::new(EventKind::Like, item, ts)
    }

    #[test]
    fn like_toggle_ends_liked() {
        let mut map = HashMap::new();
        apply_event(&mut map, &like("p1", 1));
        apply_event(&mut map, &InteractionEvent::new(EventKind::Unlike, "p1", 2));
        apply_event(&mut map, &like("p1", 3));

        assert!(map["p1"].liked);
        let summary = summarize_items(&map, None);
        assert_eq!(summary.total_likes, 1);
    }

    #[test]
    fn reply_appends_without_touching_liked() {
        let mut map = HashMap::new();
        apply_event(&mut map, &like("p1", 1));
        let reply = InteractionEvent::new(EventKind::Reply, "p1c3", 2)
            .with_payload(json!({ "text": "test" }));
        apply_event(&mut map, &reply);

        let item = &map["p1"];
        assert!(item.liked);
        assert_eq!(
            item.user_comments,
            vec![UserComment {
                text: "test".to_string(),
                target: "p1c3".to_string(),
                timestamp: 2,
            }]
        );
    }

    #[test]
    fn comments_and_replies_are_counted_separately() {
        let events = vec![
            InteractionEvent::new(EventKind::Comment, "p1", 1)
                .with_payload(json!({ "text": "a comment" })),
            InteractionEvent::new(EventKind::Reply, "p1c2", 2)
                .with_payload(json!({ "text": "a reply" })),
        ];
        let summary = summarize_events(&events, None);
        assert_eq!(summary.total_comments, 1);
        assert_eq!(summary.total_replies, 1);
    }

    #[test]
    fn dwell_samples_are_a_multiset() {
        let events = vec![
            InteractionEvent::new(EventKind::Dwell, "p1", 1).with_payload(json!({ "ms": 500 })),
            InteractionEvent::new(EventKind::Dwell, "p1", 2).with_payload(json!({ "ms": 500 })),
            InteractionEvent::new(EventKind::Dwell, "p2", 3).with_payload(json!({ "ms": 300 })),
        ];
        let summary = summarize_events(&events, None);
        assert_eq!(summary.dwell_focal_ms, 1_000);
        assert_eq!(summary.dwell_non_focal_ms, 300);
    }

    #[test]
    fn valence_engagements_accrue_to_session_valence() {
        let events = vec![like("p1", 1), like("p2", 2)];
        let summary = summarize_events(&events, Some(Valence::Condemning));
        assert_eq!(summary.valence_engagements["condemning"], 1);
        assert_eq!(summary.valence_engagements["sympathetic"], 0);
        assert_eq!(summary.focal_likes, 1);
        assert_eq!(summary.non_focal_likes, 1);
    }

    fn random_event(rng: &mut StdRng, ts: i64) -> InteractionEvent {
        let posts = ["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8"];
        let post = posts[rng.gen_range(0..posts.len())];
        match rng.gen_range(0..8) {
            0 => InteractionEvent::new(EventKind::Like, post, ts),
            1 => InteractionEvent::new(EventKind::Unlike, post, ts),
            2 => InteractionEvent::new(EventKind::Share, post, ts),
            3 => InteractionEvent::new(EventKind::Unshare, post, ts),
            4 => InteractionEvent::new(EventKind::ViewComments, post, ts),
            5 => InteractionEvent::new(EventKind::Dwell, post, ts)
                .with_payload(json!({ "ms": rng.gen_range(100u64..5_000) })),
            6 => InteractionEvent::new(EventKind::Comment, post, ts)
                .with_payload(json!({ "text": "note" })),
            _ => InteractionEvent::new(EventKind::Reply, format!("{}c1", post), ts)
                .with_payload(json!({ "text": "echo" })),
        }
    }

    #[test]
    fn fold_from_scratch_matches_incremental_state() {
        let mut rng = StdRng::seed_from_u64(99);
        for len in [1usize, 2, 5, 17, 64, 200, 500] {
            let events: Vec<InteractionEvent> = (0..len)
                .map(|i| random_event(&mut rng, i as i64))
                .collect();

            // Incrementally maintained map, one event at a time
            let mut incremental = HashMap::new();
            for event in &events {
                apply_event(&mut incremental, event);
            }

            let from_scratch = summarize_events(&events, Some(Valence::Neutral));
            let from_state = summarize_items(&incremental, Some(Valence::Neutral));
            assert_eq!(from_scratch, from_state, "length {}", len);
        }
    }

    #[test]
    fn interaction_count_ignores_dwell_and_survey() {
        let events = vec![
            like("p1", 1),
            InteractionEvent::new(EventKind::Dwell, "p1", 2).with_payload(json!({ "ms": 10 })),
            InteractionEvent::new(EventKind::SurveyResponse, "pre", 3),
            InteractionEvent::new(EventKind::ViewComments, "p3", 4),
        ];
        assert_eq!(interaction_count(&events), 2);
    }
}
