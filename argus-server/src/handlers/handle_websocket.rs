use argus_core::{Unauthenticated, VerifiedIdentity};
use axum::{
    body::Bytes,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    auth::extract_bearer_token,
    infra::{
        app_state::AppState,
        websocket::{Admission, Connection, Effect, Ignored, Outbound, OutboundEvent, messages},
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct WebSocketParams {
    pub token: Option<String>,
}

/// Handle WebSocket upgrade request. The credential is checked before the
/// upgrade completes; a rejected client gets a policy-violation close.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WebSocketParams>,
    headers: HeaderMap,
) -> Response {
    let verified = match credential(&params, &headers) {
        Some(token) => state.identity.verify(token).await,
        None => Err(Unauthenticated::MissingCredential),
    };

    ws.on_upgrade(move |socket| async move {
        match verified {
            Ok(identity) => handle_socket(socket, state, identity).await,
            Err(err) => {
                debug!(error = %err, "websocket authentication failed");
                reject(socket, &err).await;
            }
        }
    })
}

/// Query parameter first, then the `Authorization` header.
pub fn credential<'a>(params: &'a WebSocketParams, headers: &'a HeaderMap) -> Option<&'a str> {
    params
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .or_else(|| extract_bearer_token(headers))
}

pub fn close_reason(err: &Unauthenticated) -> &'static str {
    match err {
        Unauthenticated::MissingCredential => "No authentication token provided",
        Unauthenticated::InvalidCredential(_) | Unauthenticated::MissingSubject => {
            "Invalid authentication token"
        }
    }
}

async fn reject(mut socket: WebSocket, err: &Unauthenticated) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: Utf8Bytes::from_static(close_reason(err)),
    };
    if let Err(send_err) = socket.send(Message::Close(Some(frame))).await {
        debug!(error = %send_err, "failed to send policy close");
    }
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, identity: VerifiedIdentity) {
    let Admission {
        connection,
        outbound,
    } = match state.registry.admit(identity) {
        Ok(admission) => admission,
        Err(err) => {
            reject(socket, &err).await;
            return;
        }
    };
    let session_id = connection.session_id().to_string();

    let (ws_sender, mut ws_receiver) = socket.split();
    let cancel = connection.cancellation().clone();

    // Spawn task to handle outgoing frames
    let writer = tokio::spawn(write_outbound(ws_sender, outbound, cancel.clone()));

    // Handle incoming frames
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    apply_effect(&state, &connection, messages::dispatch(text.as_str()));
                }
                Some(Ok(Message::Pong(_))) => connection.mark_alive(),
                Some(Ok(Message::Ping(_))) => {}
                Some(Ok(Message::Binary(_))) => {
                    debug!(session_id, "ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    debug!(session_id, error = %err, "websocket receive error");
                    break;
                }
            }
        }
    }

    // Clean up on disconnect
    state.registry.remove(&session_id);
    if let Err(err) = writer.await {
        warn!(session_id, error = %err, "websocket writer task failed");
    }
    info!(session_id, "client disconnected");
}

async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = outbound.recv() => frame,
        };

        let result = match frame {
            Some(Outbound::Text(text)) => sink.send(Message::Text(text)).await,
            Some(Outbound::Ping) => sink.send(Message::Ping(Bytes::new())).await,
            Some(Outbound::Close { code, reason }) => {
                let frame = CloseFrame {
                    code,
                    reason: Utf8Bytes::from_static(reason),
                };
                if let Err(err) = sink.send(Message::Close(Some(frame))).await {
                    debug!(error = %err, "failed to send close frame");
                }
                break;
            }
            None => break,
        };

        if result.is_err() {
            break;
        }
    }

    cancel.cancel();
}

fn apply_effect(state: &AppState, connection: &Arc<Connection>, effect: Effect) {
    let session_id = connection.session_id();
    match effect {
        Effect::Reply(event) => {
            state.fanout.unicast(session_id, &event);
        }
        Effect::Subscribe { camera_id } => {
            connection.subscribe(&camera_id);
            debug!(session_id, camera_id = %camera_id, "client subscribed");
            state
                .fanout
                .unicast(session_id, &OutboundEvent::Subscribed { camera_id });
        }
        Effect::Ignore(Ignored::UnknownType(kind)) => {
            debug!(session_id, kind = %kind, "ignoring unknown message type");
        }
        Effect::Ignore(Ignored::Malformed(reason)) => {
            warn!(session_id, reason = %reason, "ignoring malformed message");
        }
    }
}
