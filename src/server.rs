//! HTTP serving.
//!
//! Builds one axum route per configured resource and answers live
//! requests by running conversation selection, response rotation and
//! body resolution. The axum router performs the path routing and
//! placeholder extraction; everything after that is this module.

use crate::config::{Resource, ResponseDefinition, ServerConfig, Settings};
use crate::error::MockError;
use crate::rotation::RotatorState;
use crate::{body, matcher};
use anyhow::Context;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// State injected into the handler of one resource's route.
#[derive(Clone)]
struct RouteState {
    resource: Arc<Resource>,
    /// Position of the resource in the configuration, keying rotation cursors
    index: usize,
    rotator: Arc<RotatorState>,
    settings: Settings,
    default_response: Option<Arc<ResponseDefinition>>,
}

/// Build the axum router, one route per configured resource.
///
/// Resource path templates use the router's own placeholder syntax
/// (`/users/{id}`), so extraction is delegated entirely to axum.
pub fn build_router(config: &ServerConfig) -> Router {
    let rotator = Arc::new(RotatorState::new(config));
    let default_response = config.default_response.clone().map(Arc::new);

    let mut router = Router::new();
    for (index, resource) in config.resources.iter().enumerate() {
        let verbs: Vec<&str> = resource.methods.iter().map(|m| m.verb.as_str()).collect();
        info!(
            path = %resource.path,
            name = resource.name.as_deref().unwrap_or("-"),
            verbs = ?verbs,
            "resource registered"
        );

        let state = RouteState {
            resource: Arc::new(resource.clone()),
            index,
            rotator: rotator.clone(),
            settings: config.settings.clone(),
            default_response: default_response.clone(),
        };
        router = router.route(&resource.path, any(handle).with_state(state));
    }
    router
}

/// Bind the listener and serve until ctrl-c.
pub async fn run(config: ServerConfig, port: u16) -> anyhow::Result<()> {
    let router = build_router(&config);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        address = %addr,
        resources = config.resources.len(),
        "mock server listening"
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // no signal handler available: serve until the process is killed
        std::future::pending::<()>().await;
    }
}

/// Answer one live request routed to a resource.
async fn handle(
    State(state): State<RouteState>,
    method: Method,
    uri: Uri,
    Path(path_params): Path<HashMap<String, String>>,
    RawQuery(raw_query): RawQuery,
) -> Response {
    let query = raw_query
        .as_deref()
        .map(matcher::parse_query)
        .unwrap_or_default();

    match answer(&state, method.as_str(), &path_params, &query) {
        Ok((response, bytes)) => {
            if state.settings.log_matches {
                info!(
                    method = %method,
                    path = %uri.path(),
                    status = response.status,
                    "request matched"
                );
            }
            reply(response.status, &response.content_type, bytes)
        }
        Err(MockError::NoMatch) => {
            if state.settings.log_unmatched {
                warn!(method = %method, path = %uri.path(), "no matching conversation");
            }
            not_found(&state)
        }
        Err(err) => {
            error!(method = %method, path = %uri.path(), error = %err, "body resolution failed");
            resolution_failure(&err)
        }
    }
}

/// Selection, rotation and resolution for one request.
///
/// The rotation cursor is advanced before any file I/O happens, so the
/// lock is never held across body resolution.
fn answer<'a>(
    state: &'a RouteState,
    verb: &str,
    path_params: &HashMap<String, String>,
    query: &HashMap<String, Vec<String>>,
) -> Result<(&'a ResponseDefinition, Vec<u8>), MockError> {
    let (method_index, method) =
        matcher::find_method(&state.resource, verb).ok_or(MockError::NoMatch)?;
    let (conversation_index, conversation) =
        matcher::select_conversation(method, path_params, query).ok_or(MockError::NoMatch)?;

    let request_has_params = !path_params.is_empty() || !query.is_empty();
    let response = state.rotator.next(
        (state.index, method_index, conversation_index),
        conversation,
        request_has_params,
    );

    let bytes = body::resolve(response)?;
    Ok((response, bytes))
}

/// 404 for unmatched requests: empty unless a default response is configured.
fn not_found(state: &RouteState) -> Response {
    match &state.default_response {
        Some(default) => match body::resolve(default) {
            Ok(bytes) => reply(default.status, &default.content_type, bytes),
            Err(err) => {
                error!(error = %err, "default response failed to resolve");
                resolution_failure(&err)
            }
        },
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn resolution_failure(err: &MockError) -> Response {
    (
        err.status(),
        [(header::CONTENT_TYPE, "text/plain".to_string())],
        err.to_string(),
    )
        .into_response()
}

fn reply(status: u16, content_type: &str, bytes: Vec<u8>) -> Response {
    // validation keeps configured codes inside the accepted range
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, content_type.to_string())],
        bytes,
    )
        .into_response()
}
