//! One connected viewer: an inbound reader task and an outbound writer task.
//!
//! The two tasks share nothing but the viewer id and the hub handle. The
//! writer drains the viewer's bounded queue into the transport; the reader
//! applies subscribe/unsubscribe frames to the hub. When either side ends
//! the other is aborted and the viewer is unregistered.

use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use tracing::{debug, info};

use super::broadcast::BroadcastHub;

/// A frame read from the viewer's transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    /// The peer closed the connection
    Close,
    /// Pings, binary frames and anything else the hub does not interpret
    Other,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The viewer closed the connection or its stream ended
    ClientClosed,
    /// Reading from or writing to the transport failed
    TransportError,
    /// The hub closed the outbound queue (eviction or explicit unregister)
    Dropped,
}

/// Drive one viewer until it disconnects.
///
/// Registers the viewer (bound to `owner`, if any), forwards queued frames
/// to `sink`, feeds `stream` into the hub and unregisters on exit.
pub async fn run_session<S, R, E>(
    hub: BroadcastHub,
    owner: Option<String>,
    mut sink: S,
    mut stream: R,
) -> DisconnectReason
where
    S: Sink<String> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<InboundFrame, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let handle = hub.register(owner);
    let id = handle.id;
    let mut outbound = handle.outbound;

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = sink.send(frame.to_string()).await {
                debug!(viewer = %id, error = %e, "outbound write failed");
                return DisconnectReason::TransportError;
            }
        }
        DisconnectReason::Dropped
    });

    let inbound_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            match item {
                Ok(InboundFrame::Text(text)) => inbound_hub.handle_inbound(id, &text),
                Ok(InboundFrame::Close) => return DisconnectReason::ClientClosed,
                Ok(InboundFrame::Other) => {}
                Err(e) => {
                    debug!(viewer = %id, error = %e, "inbound read failed");
                    return DisconnectReason::TransportError;
                }
            }
        }
        DisconnectReason::ClientClosed
    });

    let reason = tokio::select! {
        result = &mut send_task => {
            recv_task.abort();
            result.unwrap_or(DisconnectReason::TransportError)
        }
        result = &mut recv_task => {
            send_task.abort();
            result.unwrap_or(DisconnectReason::TransportError)
        }
    };

    hub.unregister(id);
    info!(viewer = %id, reason = ?reason, "viewer disconnected");
    reason
}
