//! Participant session API
//!
//! Handlers for the participant-facing flow: landing, consent (with the
//! honeypot check), survey pages, condition assignment, feed fetch, event
//! ingestion, stage advancement, and completion.
//!
//! Stage-transition writes are awaited and their errors surfaced; event
//! telemetry is best-effort (a failed write is logged and swallowed so
//! navigation never blocks on the store).

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::db::schemas::{ParticipantDoc, PlatformParams};
use crate::export;
use crate::server::AppState;
use crate::store::RecordPatch;
use crate::study::content;
use crate::study::interactions::{
    self, apply_event, EventKind, InteractionEvent,
};
use crate::study::session::{self, Stage, SurveyPage, SECTION_COUNT};
use crate::types::FeedlabError;

type FullBody = Full<Bytes>;

/// Query keys tried, in order, when resolving the participant identity
const IDENTITY_KEYS: [&str; 3] = ["id", "PROLIFIC_PID", "participantId"];

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub(crate) fn feedlab_error_response(err: FeedlabError) -> Response<FullBody> {
    let (status, body) = err.into_status_code_and_body();
    json_response(status, &ErrorResponse { error: body })
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    req: Request<Incoming>,
) -> Result<T, Response<FullBody>> {
    let body_bytes = match req.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(_) => {
            return Err(json_response(
                StatusCode::BAD_REQUEST,
                &ErrorResponse {
                    error: "Invalid body".to_string(),
                },
            ))
        }
    };

    serde_json::from_slice(&body_bytes).map_err(|e| {
        json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: format!("Invalid JSON: {}", e),
            },
        )
    })
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Landing
// =============================================================================

#[derive(Deserialize)]
struct LandRequest {
    /// Query parameters captured from the recruitment-platform handoff URL
    #[serde(default)]
    params: HashMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LandResponse {
    participant_id: String,
    stage: Stage,
}

fn resolve_identity(params: &HashMap<String, String>, dev_mode: bool) -> Result<String, FeedlabError> {
    for key in IDENTITY_KEYS {
        if let Some(value) = params.get(key) {
            if !value.trim().is_empty() {
                return Ok(value.trim().to_string());
            }
        }
    }

    if dev_mode {
        let synthetic = format!("dev_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        warn!("No participant identity in handoff; synthesized '{}'", synthetic);
        return Ok(synthetic);
    }

    Err(FeedlabError::IdentityMissing(
        "no participant identifier in handoff parameters".to_string(),
    ))
}

fn platform_params(params: &HashMap<String, String>) -> PlatformParams {
    let get = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();
    PlatformParams {
        prolific_pid: get("PROLIFIC_PID"),
        study_id: get("STUDY_ID"),
        session_id: get("SESSION_ID"),
        assignment_id: get("assignmentId"),
        project_id: get("projectId"),
        sona_id: get("id"),
    }
}

/// POST /api/v1/session/land
pub async fn handle_land(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let user_agent = req
        .headers()
        .get(hyper::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let request: LandRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let participant_id = match resolve_identity(&request.params, state.args.dev_mode) {
        Ok(id) => id,
        Err(e) => return feedlab_error_response(e),
    };

    let platform = platform_params(&request.params);
    let doc = match state
        .store
        .create_if_absent(&participant_id, platform, user_agent, now_ms())
        .await
    {
        Ok(d) => d,
        Err(e) => return feedlab_error_response(e),
    };

    info!(participant_id = %doc.participant_id, stage = doc.stage.as_str(), "participant landed");
    json_response(
        StatusCode::OK,
        &LandResponse {
            participant_id: doc.participant_id,
            stage: doc.stage,
        },
    )
}

// =============================================================================
// Consent (honeypot)
// =============================================================================

#[derive(Deserialize)]
struct ConsentRequest {
    consented: bool,
    /// Hidden honeypot field; real browsers submit it empty
    #[serde(default)]
    website: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsentResponse {
    stage: Stage,
    is_bot: bool,
}

/// POST /api/v1/session/{pid}/consent
pub async fn handle_consent(
    req: Request<Incoming>,
    state: Arc<AppState>,
    participant_id: &str,
) -> Response<FullBody> {
    let request: ConsentRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let doc = match state.store.require(participant_id).await {
        Ok(d) => d,
        Err(e) => return feedlab_error_response(e),
    };
    if doc.stage.is_terminal() {
        return feedlab_error_response(FeedlabError::StageTransition(format!(
            "session already ended at '{}'",
            doc.stage.as_str()
        )));
    }

    // The honeypot overrides whatever the visible consent radio said
    let patches = if session::honeypot_tripped(request.website.as_deref()) {
        warn!(participant_id, "honeypot tripped; flagging as bot");
        vec![
            RecordPatch::MarkBot,
            RecordPatch::SetStage {
                stage: Stage::FailedCheck,
                at_ms: now_ms(),
            },
        ]
    } else if !request.consented {
        vec![RecordPatch::SetStage {
            stage: Stage::Declined,
            at_ms: now_ms(),
        }]
    } else {
        vec![
            RecordPatch::SetConsent { verified: true },
            RecordPatch::SetStage {
                stage: Stage::Consented,
                at_ms: now_ms(),
            },
        ]
    };

    match state.store.apply(participant_id, patches).await {
        Ok(updated) => json_response(
            StatusCode::OK,
            &ConsentResponse {
                stage: updated.stage,
                is_bot: updated.is_bot,
            },
        ),
        Err(e) => feedlab_error_response(e),
    }
}

// =============================================================================
// Surveys
// =============================================================================

#[derive(Deserialize)]
struct SurveyRequest {
    responses: Map<String, Value>,
}

fn parse_survey_page(name: &str) -> Option<SurveyPage> {
    match name {
        "pre" => Some(SurveyPage::Pre),
        "post_1" => Some(SurveyPage::Post1),
        "post_2" => Some(SurveyPage::Post2),
        "demographics" => Some(SurveyPage::Demographics),
        _ => None,
    }
}

/// POST /api/v1/session/{pid}/survey/{page}
pub async fn handle_survey(
    req: Request<Incoming>,
    state: Arc<AppState>,
    participant_id: &str,
    page_name: &str,
) -> Response<FullBody> {
    let page = match parse_survey_page(page_name) {
        Some(p) => p,
        None => {
            return feedlab_error_response(FeedlabError::NotFound(format!(
                "unknown survey page '{}'",
                page_name
            )))
        }
    };

    let request: SurveyRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let doc = match state.store.require(participant_id).await {
        Ok(d) => d,
        Err(e) => return feedlab_error_response(e),
    };
    if doc.stage != page.submitted_at() {
        return feedlab_error_response(FeedlabError::StageTransition(format!(
            "survey '{}' is submitted at stage '{}', participant is at '{}'",
            page.as_str(),
            page.submitted_at().as_str(),
            doc.stage.as_str()
        )));
    }

    if let Err(e) = session::validate_survey(page, &request.responses) {
        return feedlab_error_response(e);
    }

    let ts = now_ms();
    let event = InteractionEvent::new(EventKind::SurveyResponse, page.as_str(), ts)
        .with_payload(Value::Object(request.responses.clone()));
    let patches = vec![
        RecordPatch::SetSurvey {
            page,
            responses: request.responses,
        },
        RecordPatch::PushEvent(event),
        RecordPatch::SetStage {
            stage: page.advances_to(),
            at_ms: ts,
        },
    ];

    match state.store.apply(participant_id, patches).await {
        Ok(updated) => json_response(StatusCode::OK, &json!({ "stage": updated.stage })),
        Err(e) => feedlab_error_response(e),
    }
}

// =============================================================================
// Condition assignment and feed
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BeginResponse {
    condition: String,
    valence: crate::study::Valence,
    engagement: HashMap<String, crate::study::EngagementStats>,
}

fn begin_check(doc: &ParticipantDoc) -> Result<(), FeedlabError> {
    if doc.is_bot || !doc.is_verified {
        return Err(FeedlabError::StageTransition(
            "participant has not passed consent".to_string(),
        ));
    }
    // A participant who already holds a condition may re-fetch it from any
    // later stage; a fresh draw happens only at the instructions page.
    if doc.condition.is_none() && doc.stage != Stage::Instructions {
        return Err(FeedlabError::StageTransition(format!(
            "condition is drawn at '{}', participant is at '{}'",
            Stage::Instructions.as_str(),
            doc.stage.as_str()
        )));
    }
    Ok(())
}

/// POST /api/v1/session/{pid}/begin
///
/// Assigns the experimental condition and freezes the engagement stats.
/// Idempotent: repeat calls return the stored assignment.
pub async fn handle_begin(state: Arc<AppState>, participant_id: &str) -> Response<FullBody> {
    let doc = match state.store.require(participant_id).await {
        Ok(d) => d,
        Err(e) => return feedlab_error_response(e),
    };
    if let Err(e) = begin_check(&doc) {
        return feedlab_error_response(e);
    }

    let strategy = state.engagement_strategy();
    let factorial = state.args.factorial_design();
    let mut rng = state.rng.lock().await;
    let result = state
        .store
        .assign_condition(participant_id, strategy, factorial, &mut rng, now_ms())
        .await;
    drop(rng);

    match result {
        Ok((condition, engagement)) => json_response(
            StatusCode::OK,
            &BeginResponse {
                condition: condition.label(),
                valence: condition.valence,
                engagement,
            },
        ),
        Err(e) => feedlab_error_response(e),
    }
}

/// GET /api/v1/session/{pid}/feed
pub async fn handle_feed(state: Arc<AppState>, participant_id: &str) -> Response<FullBody> {
    let doc = match state.store.require(participant_id).await {
        Ok(d) => d,
        Err(e) => return feedlab_error_response(e),
    };

    let (condition, stats) = match (doc.condition, doc.engagement) {
        (Some(c), Some(s)) => (c, s),
        _ => {
            return feedlab_error_response(FeedlabError::BadRequest(
                "condition not assigned yet".to_string(),
            ))
        }
    };

    let posts = content::materialize_feed(content::catalog(), &condition, &stats);
    json_response(StatusCode::OK, &json!({ "posts": posts }))
}

// =============================================================================
// Event ingestion
// =============================================================================

#[derive(Deserialize)]
struct EventsRequest {
    events: Vec<IncomingEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingEvent {
    kind: EventKind,
    item_id: String,
    timestamp: Option<i64>,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    recorded: usize,
    exported: bool,
    summary: interactions::Summary,
}

/// POST /api/v1/session/{pid}/events
///
/// Appends events and merges the derived per-post state. Store failures on
/// this path are telemetry losses, not session errors: logged, swallowed,
/// and answered with 202.
pub async fn handle_events(
    req: Request<Incoming>,
    state: Arc<AppState>,
    participant_id: &str,
) -> Response<FullBody> {
    let request: EventsRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    if request.events.is_empty() {
        return feedlab_error_response(FeedlabError::BadRequest("no events".to_string()));
    }

    let mut doc = match state.store.require(participant_id).await {
        Ok(d) => d,
        Err(e @ FeedlabError::NotFound(_)) => return feedlab_error_response(e),
        Err(e) => {
            warn!(participant_id, "event batch dropped, store unavailable: {}", e);
            return json_response(StatusCode::ACCEPTED, &json!({ "recorded": 0 }));
        }
    };

    let mut patches = Vec::new();
    let mut last_ts = doc.events.last().map(|e| e.timestamp).unwrap_or(0);
    let mut touched: Vec<String> = Vec::new();

    for incoming in request.events {
        // Events are append-only and timestamp-monotonic per participant
        let ts = incoming.timestamp.unwrap_or_else(now_ms).max(last_ts);
        last_ts = ts;

        let mut event = InteractionEvent::new(incoming.kind, incoming.item_id, ts);
        if let Some(payload) = incoming.payload {
            event = event.with_payload(payload);
        }

        apply_event(&mut doc.interactions, &event);
        let post_id = content::post_of(&event.item_id).to_string();
        if !touched.contains(&post_id) {
            touched.push(post_id);
        }
        doc.events.push(event.clone());
        patches.push(RecordPatch::PushEvent(event));
    }

    for post_id in touched {
        if let Some(item) = doc.interactions.get(&post_id) {
            patches.push(RecordPatch::SetItem {
                post_id: post_id.clone(),
                item: item.clone(),
            });
        }
    }

    // Auto-export gate, evaluated on every update rather than a timer
    let mut exported = doc.exported;
    if !exported {
        let elapsed = doc.elapsed_ms(now_ms());
        let interactions_n = interactions::interaction_count(&doc.events);
        let views = interactions::distinct_views(&doc.interactions);
        if session::export_gate(elapsed, interactions_n, views) {
            info!(
                participant_id,
                elapsed, interactions_n, views, "auto-export gate fired"
            );
            patches.push(RecordPatch::MarkExported);
            exported = true;
        }
    }

    let recorded = patches
        .iter()
        .filter(|p| matches!(p, RecordPatch::PushEvent(_)))
        .count();

    match state.store.apply(participant_id, patches).await {
        Ok(updated) => {
            let valence = updated.condition.map(|c| c.valence);
            json_response(
                StatusCode::OK,
                &EventsResponse {
                    recorded,
                    exported,
                    summary: interactions::summarize_items(&updated.interactions, valence),
                },
            )
        }
        Err(e) => {
            warn!(participant_id, "event batch write failed: {}", e);
            json_response(StatusCode::ACCEPTED, &json!({ "recorded": 0 }))
        }
    }
}

// =============================================================================
// Stage advancement
// =============================================================================

#[derive(Deserialize)]
struct AdvanceRequest {
    to: Stage,
    section: Option<usize>,
}

fn section_entered(doc: &ParticipantDoc) -> i64 {
    doc.stage_times
        .get(Stage::Simulation.as_str())
        .copied()
        .unwrap_or(0)
}

fn section_advance_check(
    doc: &ParticipantDoc,
    next: usize,
    now_ms: i64,
    delay_ms: u64,
) -> Result<(), FeedlabError> {
    if next != doc.section + 1 || next >= SECTION_COUNT {
        return Err(FeedlabError::BadRequest(format!(
            "invalid section {} from {}",
            next, doc.section
        )));
    }
    if !session::section_gate(section_entered(doc), now_ms, delay_ms) {
        return Err(FeedlabError::Validation(format!(
            "section {} has not been shown for {}ms yet",
            doc.section, delay_ms
        )));
    }
    Ok(())
}

/// Leaving the simulation requires the last section, dwelled for the delay
fn simulation_exit_check(
    doc: &ParticipantDoc,
    now_ms: i64,
    delay_ms: u64,
) -> Result<(), FeedlabError> {
    if doc.section + 1 < SECTION_COUNT {
        return Err(FeedlabError::StageTransition(format!(
            "cannot leave the simulation from section {} of {}",
            doc.section, SECTION_COUNT
        )));
    }
    if !session::section_gate(section_entered(doc), now_ms, delay_ms) {
        return Err(FeedlabError::Validation(format!(
            "section {} has not been shown for {}ms yet",
            doc.section, delay_ms
        )));
    }
    Ok(())
}

/// POST /api/v1/session/{pid}/advance
pub async fn handle_advance(
    req: Request<Incoming>,
    state: Arc<AppState>,
    participant_id: &str,
) -> Response<FullBody> {
    let request: AdvanceRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let doc = match state.store.require(participant_id).await {
        Ok(d) => d,
        Err(e) => return feedlab_error_response(e),
    };
    if !doc.stage.allows(request.to) {
        return feedlab_error_response(FeedlabError::StageTransition(format!(
            "cannot advance from '{}' to '{}'",
            doc.stage.as_str(),
            request.to.as_str()
        )));
    }

    let ts = now_ms();
    let mut patches = Vec::new();

    if doc.stage == Stage::Simulation && request.to == Stage::Simulation {
        // Section advance within the simulation
        let next = match request.section {
            Some(s) => s,
            None => doc.section + 1,
        };
        if let Err(e) = section_advance_check(&doc, next, ts, state.args.section_delay_ms) {
            return feedlab_error_response(e);
        }
        patches.push(RecordPatch::SetSection(next));
    }
    if doc.stage == Stage::Simulation && request.to == Stage::PostSurvey1 {
        if let Err(e) = simulation_exit_check(&doc, ts, state.args.section_delay_ms) {
            return feedlab_error_response(e);
        }
    }

    if request.to == Stage::Simulation && doc.stage == Stage::Tutorial {
        patches.push(RecordPatch::StampTime {
            key: "simulation_started".to_string(),
            at_ms: ts,
        });
    }
    if request.to == Stage::PostSurvey1 {
        let started = doc.stage_times.get("simulation_started").copied().unwrap_or(ts);
        patches.push(RecordPatch::SetSimulationTime(ts - started));
    }

    patches.push(RecordPatch::SetStage {
        stage: request.to,
        at_ms: ts,
    });

    match state.store.apply(participant_id, patches).await {
        Ok(updated) => json_response(
            StatusCode::OK,
            &json!({ "stage": updated.stage, "section": updated.section }),
        ),
        Err(e) => feedlab_error_response(e),
    }
}

// =============================================================================
// Completion and redirect handoff
// =============================================================================

fn redirect_url(base: &str, doc: &ParticipantDoc) -> String {
    let mut pairs: Vec<(String, String)> = vec![(
        "participantId".to_string(),
        doc.participant_id.clone(),
    )];
    if let Some(condition) = doc.condition {
        pairs.push(("valence".to_string(), condition.valence.as_str().to_string()));
    }
    let platform = &doc.platform;
    let captured = [
        ("PROLIFIC_PID", &platform.prolific_pid),
        ("STUDY_ID", &platform.study_id),
        ("SESSION_ID", &platform.session_id),
        ("assignmentId", &platform.assignment_id),
        ("projectId", &platform.project_id),
        ("id", &platform.sona_id),
    ];
    for (key, value) in captured {
        if let Some(v) = value {
            pairs.push((key.to_string(), v.clone()));
        }
    }

    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if base.contains('?') { "&" } else { "?" };
    format!("{}{}{}", base, separator, query)
}

/// POST /api/v1/session/{pid}/complete
///
/// Awaited export: marks the session complete and hands back the redirect
/// URL. When the store write fails the captured record is returned as a
/// local-download fallback instead of being lost.
pub async fn handle_complete(state: Arc<AppState>, participant_id: &str) -> Response<FullBody> {
    let doc = match state.store.require(participant_id).await {
        Ok(d) => d,
        Err(e) => return feedlab_error_response(e),
    };
    if !matches!(doc.stage, Stage::Debriefed | Stage::Redirected) {
        return feedlab_error_response(FeedlabError::StageTransition(format!(
            "cannot complete from '{}'",
            doc.stage.as_str()
        )));
    }

    let ts = now_ms();
    let mut patches = Vec::new();
    if doc.stage == Stage::Debriefed {
        patches.push(RecordPatch::SetStage {
            stage: Stage::Redirected,
            at_ms: ts,
        });
    }
    patches.push(RecordPatch::SetStage {
        stage: Stage::Completed,
        at_ms: ts,
    });

    match state.store.apply(participant_id, patches.clone()).await {
        Ok(updated) => {
            let url = redirect_url(&state.args.redirect_url, &updated);
            let record = export::nested_json(&updated).unwrap_or(Value::Null);
            info!(participant_id, "session completed");
            json_response(
                StatusCode::OK,
                &json!({ "redirectUrl": url, "record": record }),
            )
        }
        Err(e) => {
            // Surface the failure but hand the caller everything needed for
            // a local download; captured history must never be lost.
            warn!(participant_id, "completion write failed: {}", e);
            let mut fallback = doc;
            for patch in &patches {
                patch.apply(&mut fallback);
            }
            let record = export::nested_json(&fallback).unwrap_or(Value::Null);
            json_response(
                StatusCode::BAD_GATEWAY,
                &json!({ "exportFallback": true, "record": record }),
            )
        }
    }
}

/// GET /api/v1/session/{pid}
pub async fn handle_get_session(state: Arc<AppState>, participant_id: &str) -> Response<FullBody> {
    match state.store.require(participant_id).await {
        Ok(doc) => {
            let valence = doc.condition.map(|c| c.valence);
            let summary = interactions::summarize_items(&doc.interactions, valence);
            let record = export::nested_json(&doc).unwrap_or(Value::Null);
            json_response(StatusCode::OK, &json!({ "record": record, "summary": summary }))
        }
        Err(e) => feedlab_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_precedence_follows_key_order() {
        let mut params = HashMap::new();
        params.insert("participantId".to_string(), "third".to_string());
        params.insert("PROLIFIC_PID".to_string(), "second".to_string());
        assert_eq!(resolve_identity(&params, false).unwrap(), "second");

        params.insert("id".to_string(), "first".to_string());
        assert_eq!(resolve_identity(&params, false).unwrap(), "first");
    }

    #[test]
    fn missing_identity_errors_in_production() {
        let params = HashMap::new();
        let err = resolve_identity(&params, false).unwrap_err();
        assert!(matches!(err, FeedlabError::IdentityMissing(_)));
    }

    #[test]
    fn missing_identity_synthesizes_in_dev() {
        let params = HashMap::new();
        let id = resolve_identity(&params, true).unwrap();
        assert!(id.starts_with("dev_"));
    }

    #[test]
    fn redirect_reattaches_captured_params() {
        let mut doc = ParticipantDoc::new(
            "abc".to_string(),
            PlatformParams {
                prolific_pid: Some("PX9".to_string()),
                study_id: Some("S1".to_string()),
                ..Default::default()
            },
            None,
            0,
        );
        doc.condition = Some(crate::study::ExperimentalCondition {
            valence: crate::study::Valence::Condemning,
            support: None,
        });

        let url = redirect_url("https://survey.example/done", &doc);
        assert!(url.starts_with("https://survey.example/done?"));
        assert!(url.contains("participantId=abc"));
        assert!(url.contains("valence=condemning"));
        assert!(url.contains("PROLIFIC_PID=PX9"));
        assert!(url.contains("STUDY_ID=S1"));
        assert!(!url.contains("assignmentId"));
    }

    #[test]
    fn redirect_url_encodes_values() {
        let doc = ParticipantDoc::new(
            "a b&c".to_string(),
            PlatformParams::default(),
            None,
            0,
        );
        let url = redirect_url("https://survey.example/done", &doc);
        assert!(url.contains("participantId=a%20b%26c"));
    }

    fn simulation_doc() -> ParticipantDoc {
        let mut doc =
            ParticipantDoc::new("abc".to_string(), PlatformParams::default(), None, 0);
        doc.is_verified = true;
        doc.stage = Stage::Simulation;
        doc.stage_times
            .insert(Stage::Simulation.as_str().to_string(), 100_000);
        doc
    }

    #[test]
    fn simulation_exit_requires_last_section() {
        let doc = simulation_doc();
        // Still on the first section; dwell alone does not open the exit
        let err = simulation_exit_check(&doc, 500_000, 10_000).unwrap_err();
        assert!(matches!(err, FeedlabError::StageTransition(_)));
    }

    #[test]
    fn simulation_exit_requires_section_dwell() {
        let mut doc = simulation_doc();
        doc.section = SECTION_COUNT - 1;
        let err = simulation_exit_check(&doc, 105_000, 10_000).unwrap_err();
        assert!(matches!(err, FeedlabError::Validation(_)));
        assert!(simulation_exit_check(&doc, 110_000, 10_000).is_ok());
    }

    #[test]
    fn section_advance_rejects_skips_and_short_dwell() {
        let doc = simulation_doc();
        assert!(section_advance_check(&doc, 2, 500_000, 10_000).is_err());
        assert!(section_advance_check(&doc, SECTION_COUNT, 500_000, 10_000).is_err());
        assert!(section_advance_check(&doc, 1, 105_000, 10_000).is_err());
        assert!(section_advance_check(&doc, 1, 110_000, 10_000).is_ok());
    }

    #[test]
    fn begin_is_gated_to_the_instructions_page() {
        let mut doc =
            ParticipantDoc::new("abc".to_string(), PlatformParams::default(), None, 0);
        assert!(begin_check(&doc).is_err());

        doc.is_verified = true;
        doc.stage = Stage::PreSurvey;
        assert!(begin_check(&doc).is_err());

        doc.stage = Stage::Instructions;
        assert!(begin_check(&doc).is_ok());

        // Already-assigned participants may re-fetch from later stages
        doc.condition = Some(crate::study::ExperimentalCondition {
            valence: crate::study::Valence::Sympathetic,
            support: None,
        });
        doc.stage = Stage::Simulation;
        assert!(begin_check(&doc).is_ok());
    }

    #[test]
    fn survey_page_names() {
        assert_eq!(parse_survey_page("pre"), Some(SurveyPage::Pre));
        assert_eq!(parse_survey_page("post_2"), Some(SurveyPage::Post2));
        assert_eq!(parse_survey_page("bogus"), None);
    }
}
