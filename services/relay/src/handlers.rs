//! Axum Handlers
//!
//! `/test` places an outbound call whose media stream points back at us, and
//! `/media-stream` is where the telephony provider opens that stream.

use crate::{
    calls::{self, CallOutcome},
    instructions,
    state::AppState,
    ws::{SessionOptions, run_session, wire::Connection},
};
use axum::{
    Json,
    extract::{
        Query, State,
        ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use callbridge_core::{agent_settings::AgentSettings, telephony::DEFAULT_PENDING_LIMIT};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

pub enum ApiError {
    BadRequest(&'static str),
    NotFound,
    Upgrade(WebSocketUpgradeRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            ApiError::Upgrade(rejection) => rejection.into_response(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TestCallQuery {
    pub secret: Option<String>,
}

/// Places a call to the configured target number, guarded by a shared secret.
pub async fn test_call(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TestCallQuery>,
) -> Result<Json<CallOutcome>, ApiError> {
    let authorized = matches!(
        (&state.config.test_secret, &query.secret),
        (Some(expected), Some(given)) if expected == given
    );
    if !authorized {
        return Err(ApiError::NotFound);
    }

    let config = &state.config;
    info!(instructions_url = ?config.instructions_url, "Placing test call");
    let outcome = calls::place_stream_call(
        state.calls.as_ref(),
        &config.target_phone_number,
        &config.twilio.from_number,
        &config.stream_url(),
    )
    .await;
    Ok(Json(outcome))
}

/// Accepts the provider's media stream and relays it to the voice agent.
///
/// Instructions are fetched before the upgrade is accepted so the agent's
/// settings are ready the moment its socket opens.
pub async fn media_stream(
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    info!("Received /media-stream");
    let source = state
        .instructions
        .clone()
        .ok_or(ApiError::BadRequest("No instructions given"))?;
    let ws = ws.map_err(ApiError::Upgrade)?;

    let instructions = instructions::resolve(source.as_ref()).await;
    let settings = AgentSettings::new(&state.config.agent_profile, &instructions);
    let options = SessionOptions {
        chunk_len: state.config.chunk_len,
        pending_limit: DEFAULT_PENDING_LIMIT,
        teardown_grace: state.config.teardown_grace,
    };
    let connector = state.agent.clone();

    Ok(ws.on_upgrade(move |socket| {
        let session_id = Uuid::new_v4();
        async move {
            info!("Media stream accepted");
            let telephony = Connection::spawn(socket, "telephony");
            let report = run_session(telephony, connector, settings, options).await;
            info!(?report, "Media session finished");
        }
        .instrument(info_span!("media_session", %session_id))
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
