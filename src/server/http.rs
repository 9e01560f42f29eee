//! HTTP server implementation
//!
//! hyper http1 with TokioIo for async handling; routing is a plain match
//! over (method, path).

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::db::MongoClient;
use crate::routes;
use crate::store::ParticipantStore;
use crate::study::engagement::EngagementStrategy;
use crate::study::rng::StudyRng;
use crate::types::FeedlabError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    /// Participant records, MongoDB-backed or in-memory degraded
    pub store: Arc<ParticipantStore>,
    /// Study RNG behind an async lock so seeded runs stay deterministic
    pub rng: Mutex<StudyRng>,
}

impl AppState {
    pub fn new(args: Args, mongo: Option<MongoClient>, store: Arc<ParticipantStore>) -> Self {
        let rng = Mutex::new(StudyRng::from_config(args.rng_seed));
        Self {
            args,
            mongo,
            store,
            rng,
        }
    }

    /// The configured engagement synthesis strategy
    ///
    /// The strategy name is validated at startup, so the fallback never
    /// fires in practice.
    pub fn engagement_strategy(&self) -> EngagementStrategy {
        EngagementStrategy::parse(&self.args.engagement_strategy)
            .unwrap_or(EngagementStrategy::Gaussian)
    }
}

/// Main server run loop
pub async fn run(state: Arc<AppState>) -> Result<(), FeedlabError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Feedlab listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - admin authentication disabled");
    }
    if state.args.rng_seed.is_some() {
        warn!("Fixed RNG seed configured - condition assignment is deterministic");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    // Admin surface is gated as a whole
    if path.starts_with("/admin") {
        if let Err(e) = routes::admin::authorize(&req, &state) {
            return Ok(to_boxed(routes::session::feedlab_error_response(e)));
        }
        return Ok(handle_admin_request(state, req, &path).await);
    }

    let response = match (method, path.as_str()) {
        // Liveness probe - returns 200 if the service is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)))
        }

        // Readiness probe - the in-memory fallback still takes traffic
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            to_boxed(routes::readiness_check(Arc::clone(&state)))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        // Participant session API
        (Method::POST, "/api/v1/session/land") => {
            to_boxed(routes::handle_land(req, Arc::clone(&state)).await)
        }
        (method, p) if p.starts_with("/api/v1/session/") => {
            handle_session_request(state, req, method, p).await
        }

        // Not found
        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Route /api/v1/session/{id}[/...] requests
async fn handle_session_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: Method,
    path: &str,
) -> Response<BoxBody> {
    let remainder = path.strip_prefix("/api/v1/session/").unwrap_or("");
    let mut parts = remainder.splitn(2, '/');
    let participant_id = parts.next().unwrap_or("").to_string();
    let action = parts.next().unwrap_or("").to_string();

    if participant_id.is_empty() {
        return to_boxed(bad_request_response("Missing participant id in path"));
    }

    let response = match (method, action.as_str()) {
        (Method::GET, "") => routes::handle_get_session(state, &participant_id).await,
        (Method::POST, "consent") => routes::handle_consent(req, state, &participant_id).await,
        (Method::POST, "begin") => routes::handle_begin(state, &participant_id).await,
        (Method::GET, "feed") => routes::handle_feed(state, &participant_id).await,
        (Method::POST, "events") => routes::handle_events(req, state, &participant_id).await,
        (Method::POST, "advance") => routes::handle_advance(req, state, &participant_id).await,
        (Method::POST, "complete") => routes::handle_complete(state, &participant_id).await,
        (Method::POST, p) if p.starts_with("survey/") => {
            let page = p.strip_prefix("survey/").unwrap_or("");
            routes::handle_survey(req, state, &participant_id, page).await
        }
        _ => not_found_response(path),
    };
    to_boxed(response)
}

/// Route /admin/* requests (already authorized)
async fn handle_admin_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
    path: &str,
) -> Response<BoxBody> {
    let method = req.method().clone();

    let response = match (method, path) {
        (Method::GET, "/admin/participants") => {
            routes::handle_list_participants(Arc::clone(&state)).await
        }
        (Method::GET, "/admin/export/csv") => routes::handle_export_csv(Arc::clone(&state)).await,
        (Method::GET, "/admin/export/spss") => routes::handle_export_spss().await,
        (Method::POST, "/admin/participants/wipe") => {
            routes::handle_wipe(req, Arc::clone(&state)).await
        }
        (Method::DELETE, p) if p.starts_with("/admin/participants/") => {
            let participant_id = p.strip_prefix("/admin/participants/").unwrap_or("");
            routes::handle_delete_participant(Arc::clone(&state), participant_id).await
        }
        _ => not_found_response(path),
    };
    to_boxed(response)
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Bad Request",
        "message": message
    });

    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
