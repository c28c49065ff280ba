//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling.

use bytes::Bytes;
use chrono::FixedOffset;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{extract_token_from_header, HdbSettings, JwtValidator, Session};
use crate::config::Args;
use crate::routes::{self, ApiRequest, METHOD_PREFIX};
use crate::services::{DeviceService, DirectoryService};
use crate::store::{DeviceStore, DirectoryStore};
use crate::types::HdbError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Delegation codes and the site authorization code
    pub settings: Arc<dyn HdbSettings>,
    pub directory: DirectoryService,
    pub devices: DeviceService,
    pub jwt: Arc<JwtValidator>,
    /// Backend name reported by `/health`
    pub storage: &'static str,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        settings: Arc<dyn HdbSettings>,
        device_store: Arc<dyn DeviceStore>,
        directory_store: Arc<dyn DirectoryStore>,
        jwt: Arc<JwtValidator>,
        storage: &'static str,
    ) -> Result<Self, HdbError> {
        let local_offset: FixedOffset = args.local_offset().ok_or_else(|| {
            HdbError::Config(format!(
                "UTC offset out of range: {} minutes",
                args.utc_offset_minutes
            ))
        })?;
        let directory = DirectoryService::new(Arc::clone(&directory_store), Arc::clone(&jwt));
        let devices = DeviceService::new(device_store, directory_store, local_offset);

        Ok(Self {
            args,
            settings,
            directory,
            devices,
            jwt,
            storage,
            started_at: Instant::now(),
        })
    }

    /// Session for a request: the bearer token's user, or Guest
    pub fn session_for(&self, headers: &HeaderMap, params: crate::auth::RequestParams) -> Session {
        let auth_header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
        match extract_token_from_header(auth_header).and_then(|t| self.jwt.verify_token(t)) {
            Some(claims) => Session::for_user(claims.sub, params),
            None => Session::guest(params),
        }
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), HdbError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "HDB gateway listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - dev JWT secret in use");
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

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let (parts, body) = req.into_parts();
    info!("[{}] {} {}", addr, parts.method, parts.uri.path());

    let body = body.collect().await?.to_bytes();
    let response = route(&state, parts.method, &parts.uri, parts.headers, body).await;
    Ok(to_boxed(response))
}

/// Route one fully-read request
pub async fn route(
    state: &AppState,
    method: Method,
    uri: &Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let path = uri.path();

    if method == Method::OPTIONS {
        return preflight_response();
    }

    if path == "/health" || path == "/healthz" {
        if method != Method::GET {
            return error_response(&HdbError::MethodNotAllowed(format!(
                "{} not allowed on {}",
                method, path
            )));
        }
        return json_response(StatusCode::OK, &routes::health_response(state));
    }

    let Some(op) = path.strip_prefix(METHOD_PREFIX) else {
        return not_found_response(path);
    };
    if method != Method::GET && method != Method::POST {
        return error_response(&HdbError::MethodNotAllowed(format!(
            "{} not allowed on {}",
            method, path
        )));
    }

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let params = routes::parse_params(uri.query(), content_type, &body);
    let session = state.session_for(&headers, params);
    let request = ApiRequest::new(method, headers, body);

    match routes::dispatch(state, op, session, &request).await {
        Ok(message) => json_response(StatusCode::OK, &serde_json::json!({ "message": message })),
        Err(e) => {
            if e.status_code().is_server_error() {
                error!(op = %op, "HDB API call failed: {}", e);
            } else {
                warn!(op = %op, "HDB API call rejected: {}", e);
            }
            error_response(&e)
        }
    }
}

/// Convert Full<Bytes> response to BoxBody response
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// JSON error body carrying the message and a short code
fn error_response(err: &HdbError) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": err.to_string(),
        "code": err.code(),
    });
    json_response(err.status_code(), &body)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, HDB-AuthorizationCode",
        )
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "code": "NOT_FOUND",
        "path": path,
        "hint": "HDB API operations live under /api/method/iot.hdb_api.<operation>"
    });
    json_response(StatusCode::NOT_FOUND, &body)
}
