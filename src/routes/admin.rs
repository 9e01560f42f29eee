//! Admin API endpoints for the researcher dashboard
//!
//! ## Endpoints
//!
//! - `GET /admin/participants` - List records with monitoring stats
//! - `GET /admin/export/csv` - Flat one-row-per-participant CSV
//! - `GET /admin/export/spss` - SPSS import syntax for the CSV
//! - `POST /admin/participants/wipe` - Hard-delete the dataset (confirmed)
//! - `DELETE /admin/participants/{id}` - Soft-delete one record
//!
//! All endpoints require the `X-Admin-Key` header except in dev mode.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::db::schemas::ParticipantDoc;
use crate::export;
use crate::routes::session::{feedlab_error_response, json_response};
use crate::server::AppState;
use crate::study::session::SPEEDER_THRESHOLD_MS;
use crate::types::FeedlabError;

type FullBody = Full<Bytes>;

/// Check the admin key header; dev mode waves requests through
pub fn authorize(req: &Request<Incoming>, state: &AppState) -> Result<(), FeedlabError> {
    if state.args.dev_mode {
        return Ok(());
    }

    let expected = state
        .args
        .api_key_admin
        .as_deref()
        .ok_or_else(|| FeedlabError::Unauthorized("admin API not configured".to_string()))?;

    let provided = req
        .headers()
        .get("X-Admin-Key")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == expected => Ok(()),
        _ => Err(FeedlabError::Unauthorized("invalid admin key".to_string())),
    }
}

// ============================================================================
// Participant listing
// ============================================================================

/// One row of the monitoring table
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantOverview {
    participant_id: String,
    stage: String,
    condition: Option<String>,
    is_bot: bool,
    is_verified: bool,
    exported: bool,
    total_simulation_time_ms: Option<i64>,
    /// Finished the simulation suspiciously fast
    speeder: bool,
    event_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantsResponse {
    total: usize,
    humans: usize,
    bots: usize,
    by_condition: std::collections::BTreeMap<String, usize>,
    avg_simulation_time_ms: Option<i64>,
    participants: Vec<ParticipantOverview>,
}

fn overview(doc: &ParticipantDoc) -> ParticipantOverview {
    let speeder = doc
        .total_simulation_time_ms
        .map(|ms| ms < SPEEDER_THRESHOLD_MS)
        .unwrap_or(false);
    ParticipantOverview {
        participant_id: doc.participant_id.clone(),
        stage: doc.stage.as_str().to_string(),
        condition: doc.condition.map(|c| c.label()),
        is_bot: doc.is_bot,
        is_verified: doc.is_verified,
        exported: doc.exported,
        total_simulation_time_ms: doc.total_simulation_time_ms,
        speeder,
        event_count: doc.events.len(),
    }
}

/// GET /admin/participants
pub async fn handle_list_participants(state: Arc<AppState>) -> Response<FullBody> {
    let docs = match state.store.list().await {
        Ok(d) => d,
        Err(e) => return feedlab_error_response(e),
    };

    let mut by_condition = std::collections::BTreeMap::new();
    let mut bots = 0usize;
    let mut times = Vec::new();

    for doc in &docs {
        if doc.is_bot {
            bots += 1;
        }
        if let Some(condition) = doc.condition {
            *by_condition.entry(condition.label()).or_insert(0) += 1;
        }
        if let Some(ms) = doc.total_simulation_time_ms {
            times.push(ms);
        }
    }

    let avg_simulation_time_ms = if times.is_empty() {
        None
    } else {
        Some(times.iter().sum::<i64>() / times.len() as i64)
    };

    let response = ParticipantsResponse {
        total: docs.len(),
        humans: docs.len() - bots,
        bots,
        by_condition,
        avg_simulation_time_ms,
        participants: docs.iter().map(overview).collect(),
    };
    json_response(StatusCode::OK, &response)
}

// ============================================================================
// Dataset export
// ============================================================================

fn attachment_response(body: String, content_type: &str, filename: &str) -> Response<FullBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", filename),
        )
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// GET /admin/export/csv
pub async fn handle_export_csv(state: Arc<AppState>) -> Response<FullBody> {
    match state.store.list().await {
        Ok(docs) => {
            info!(participants = docs.len(), "CSV export generated");
            attachment_response(
                export::csv_export(&docs),
                "text/csv; charset=utf-8",
                export::CSV_FILENAME,
            )
        }
        Err(e) => feedlab_error_response(e),
    }
}

/// GET /admin/export/spss
pub async fn handle_export_spss() -> Response<FullBody> {
    attachment_response(
        export::spss_syntax(),
        "text/plain; charset=utf-8",
        "import_simulation_data.sps",
    )
}

// ============================================================================
// Deletion
// ============================================================================

#[derive(Deserialize)]
struct WipeRequest {
    confirm: String,
}

/// POST /admin/participants/wipe
///
/// Requires the literal confirmation string; a bare POST must never be able
/// to destroy a dataset.
pub async fn handle_wipe(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let body_bytes = match req.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(_) => {
            return feedlab_error_response(FeedlabError::BadRequest("Invalid body".to_string()))
        }
    };
    let request: WipeRequest = match serde_json::from_slice(&body_bytes) {
        Ok(r) => r,
        Err(e) => {
            return feedlab_error_response(FeedlabError::BadRequest(format!("Invalid JSON: {}", e)))
        }
    };

    if request.confirm != "DELETE" {
        return feedlab_error_response(FeedlabError::BadRequest(
            "wipe requires confirm: \"DELETE\"".to_string(),
        ));
    }

    match state.store.wipe().await {
        Ok(removed) => {
            warn!(removed, "participant dataset wiped");
            json_response(StatusCode::OK, &json!({ "removed": removed }))
        }
        Err(e) => feedlab_error_response(e),
    }
}

/// DELETE /admin/participants/{id}
pub async fn handle_delete_participant(
    state: Arc<AppState>,
    participant_id: &str,
) -> Response<FullBody> {
    match state.store.remove(participant_id).await {
        Ok(true) => {
            info!(participant_id, "participant record deleted");
            json_response(StatusCode::OK, &json!({ "deleted": true }))
        }
        Ok(false) => feedlab_error_response(FeedlabError::NotFound(format!(
            "participant '{}' not found",
            participant_id
        ))),
        Err(e) => feedlab_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::PlatformParams;

    #[test]
    fn speeder_flag_uses_threshold() {
        let mut doc = ParticipantDoc::new("s1".to_string(), PlatformParams::default(), None, 0);
        doc.total_simulation_time_ms = Some(SPEEDER_THRESHOLD_MS - 1);
        assert!(overview(&doc).speeder);

        doc.total_simulation_time_ms = Some(SPEEDER_THRESHOLD_MS);
        assert!(!overview(&doc).speeder);

        doc.total_simulation_time_ms = None;
        assert!(!overview(&doc).speeder);
    }
}
