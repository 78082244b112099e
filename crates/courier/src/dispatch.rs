//! Inbound dispatch: the loop that turns transport payloads into
//! handler invocations and resolved pending replies.
//!
//! One task owns `transport.recv()`; every arriving envelope is
//! dispatched on its own spawned task, so independent requests are
//! processed in parallel and a slow handler never stalls the loop.
//! Handlers must therefore be safe to run concurrently with themselves
//! and each other.

use std::sync::Arc;

use serde_json::Value;

use courier_protocol::{
    from_document, no_handler_message, to_document, wire, Codec, Envelope,
    ErrorBody, Header, ReplyStatus,
};
use courier_registry::InvokeError;
use courier_transport::Transport;

use crate::messenger::MessengerState;
use crate::CourierError;

/// Receives payloads until the transport closes, then fails every
/// outstanding pending request so no caller is left hanging.
pub(crate) async fn run_inbound<T: Transport, C: Codec>(
    state: Arc<MessengerState<T, C>>,
) {
    loop {
        match state.transport.recv().await {
            Ok(Some(data)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    dispatch(state, data).await;
                });
            }
            Ok(None) => {
                tracing::info!(addr = %state.local_addr, "transport closed, messenger stopping");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "transport receive failed, messenger stopping");
                break;
            }
        }
    }

    let mut pending = state.pending.lock().expect("pending table poisoned");
    for (correlation_id, tx) in pending.drain() {
        tracing::debug!(%correlation_id, "failing pending request on shutdown");
        let _ = tx.send(Err(CourierError::Stopped));
    }
}

/// Routes one inbound envelope: reply → resolve pending, request →
/// invoke handler and answer.
async fn dispatch<T: Transport, C: Codec>(
    state: Arc<MessengerState<T, C>>,
    data: Vec<u8>,
) {
    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable envelope, dropping");
            return;
        }
    };

    // Without a well-formed header there is no correlation identity and
    // no reply address — nothing useful can be done but log and drop.
    let header: Header = match from_document(&envelope.header) {
        Ok(header) => header,
        Err(e) => {
            tracing::warn!(
                message_type = %envelope.message_type,
                error = %e,
                "envelope header malformed, dropping"
            );
            return;
        }
    };

    if header.is_reply() {
        resolve_reply(&state, envelope, header);
    } else {
        handle_request(&state, envelope, header).await;
    }
}

/// Completes the pending request matching the reply's correlation
/// identity. Unknown or expired identities are dropped, not fatal.
fn resolve_reply<T: Transport, C: Codec>(
    state: &MessengerState<T, C>,
    envelope: Envelope,
    header: Header,
) {
    let Some(tx) = state
        .pending
        .lock()
        .expect("pending table poisoned")
        .remove(&header.correlation_id)
    else {
        tracing::debug!(
            correlation_id = %header.correlation_id,
            "reply for unknown or expired correlation identity, dropping"
        );
        return;
    };

    let outcome = match header.status {
        Some(ReplyStatus::Ok) => Ok(envelope.body),
        Some(ReplyStatus::NoHandler) => {
            Err(CourierError::NoHandler(failure_detail(&envelope.body)))
        }
        Some(ReplyStatus::HandlerFailed) => {
            Err(CourierError::Handler(failure_detail(&envelope.body)))
        }
        Some(ReplyStatus::BadRequest) => {
            Err(CourierError::BadRequest(failure_detail(&envelope.body)))
        }
        // is_reply() guaranteed a status; treat a vanished one as
        // malformed rather than panicking.
        None => Err(CourierError::Protocol(
            courier_protocol::ProtocolError::InvalidEnvelope(
                "reply without status".into(),
            ),
        )),
    };

    // The caller may have timed out and dropped its receiver; fine.
    let _ = tx.send(outcome);
}

/// Extracts the failure message from a failure body, falling back to
/// the raw document if it doesn't match the `{ "message": … }` shape.
fn failure_detail(body: &Value) -> String {
    from_document::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.to_string())
}

/// Looks up and invokes the handler for a request, then transmits the
/// reply (success or synthesized failure) back to the requester.
async fn handle_request<T: Transport, C: Codec>(
    state: &MessengerState<T, C>,
    envelope: Envelope,
    header: Header,
) {
    let Some(reply_to) = header.reply_to else {
        tracing::warn!(
            message_type = %envelope.message_type,
            correlation_id = %header.correlation_id,
            "request without reply-to address, dropping"
        );
        return;
    };

    let (status, body) = match state.registry.lookup(&envelope.message_type) {
        None => {
            tracing::debug!(
                message_type = %envelope.message_type,
                "no handler bound, synthesizing failure reply"
            );
            (
                ReplyStatus::NoHandler,
                failure_body(no_handler_message(&envelope.message_type)),
            )
        }
        Some(handler) => match handler.invoke(&envelope.body) {
            Ok(result) => (ReplyStatus::Ok, result),
            Err(e @ InvokeError::BadInput { .. }) => {
                tracing::debug!(
                    message_type = %envelope.message_type,
                    error = %e,
                    "request body rejected"
                );
                (ReplyStatus::BadRequest, failure_body(e.to_string()))
            }
            Err(InvokeError::Failed(detail)) => {
                tracing::debug!(
                    message_type = %envelope.message_type,
                    error = %detail,
                    "handler failed"
                );
                (ReplyStatus::HandlerFailed, failure_body(detail))
            }
        },
    };

    let reply_header = Header::reply(header.correlation_id.clone(), status);
    let header_doc = match to_document(&reply_header) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode reply header");
            return;
        }
    };
    let reply = Envelope::new(envelope.message_type.clone(), header_doc, body);

    let bytes = match state.codec.encode(&reply) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode reply envelope");
            return;
        }
    };

    if let Err(e) = state.transport.transmit(&reply_to, &bytes).await {
        tracing::warn!(
            %reply_to,
            correlation_id = %header.correlation_id,
            error = %e,
            "failed to deliver reply"
        );
    } else {
        tracing::debug!(
            %reply_to,
            message_type = %envelope.message_type,
            correlation_id = %header.correlation_id,
            ?status,
            "reply sent"
        );
    }
}

/// Builds the `{ "message": … }` failure body.
fn failure_body(message: String) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(wire::MESSAGE.to_string(), Value::String(message));
    Value::Object(body)
}
