//! Persistent RPC channel over WebSocket.
//!
//! # Responsibilities
//! - Run every inbound call frame as its own task
//! - Write replies as they complete, each tagged with its call's id
//! - Bound in-flight calls per channel
//! - Close on idle, disconnect, or drain
//!
//! # Design Decisions
//! - A single writer task owns the socket sink; call tasks send through a queue
//! - Idle timeout and disconnect abort this channel's calls only
//! - The idle clock only runs while no call is in flight
//! - Drain stops reading, lets in-flight calls reply, then closes with 1001

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::frame::{CallFrame, ReplyFrame};
use super::registry::Registry;
use super::RpcState;
use crate::error::EdgeError;
use crate::lifecycle::shutdown::ShutdownSignal;

const OUTBOUND_QUEUE: usize = 64;

/// `GET /rpc/ws`: upgrade and run the channel.
pub async fn upgrade(
    State(state): State<RpcState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, EdgeError> {
    let ws = ws.map_err(|rejection| EdgeError::UpgradeRejected {
        status: rejection.status(),
        reason: rejection.body_text(),
    })?;

    // Upgraded sockets outlive their HTTP connection, so the channel counts itself.
    let guard = state.connections.track();
    let channel = Channel {
        registry: Arc::clone(&state.registry),
        shutdown: state.shutdown.subscribe(),
        max_inflight: state.config.max_inflight_calls,
        idle: Duration::from_secs(state.config.channel_idle_secs),
    };

    Ok(ws
        .max_message_size(state.config.max_frame_bytes)
        .on_upgrade(move |socket| async move {
            tracing::debug!(connection_id = %guard.id(), "RPC channel opened");
            channel.run(socket).await;
            tracing::debug!(connection_id = %guard.id(), "RPC channel closed");
            drop(guard);
        }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelEnd {
    Disconnected,
    Idle,
    Draining,
}

struct Channel {
    registry: Arc<Registry>,
    shutdown: ShutdownSignal,
    max_inflight: usize,
    idle: Duration,
}

impl Channel {
    async fn run(mut self, socket: WebSocket) {
        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let mut calls = JoinSet::new();
        let idle = tokio::time::sleep(self.idle);
        tokio::pin!(idle);
        let end = loop {
            tokio::select! {
                _ = self.shutdown.draining() => break ChannelEnd::Draining,
                _ = &mut idle, if calls.is_empty() => break ChannelEnd::Idle,
                inbound = stream.next() => {
                    idle.as_mut().reset(Instant::now() + self.idle);
                    match inbound {
                        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {
                            break ChannelEnd::Disconnected
                        }
                        Some(Ok(Message::Text(text))) => {
                            self.accept(text.as_bytes(), &mut calls, &tx).await;
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            self.accept(&bytes, &mut calls, &tx).await;
                        }
                        Some(Ok(_)) => {}
                    }
                }
                Some(_) = calls.join_next(), if !calls.is_empty() => {
                    if calls.is_empty() {
                        idle.as_mut().reset(Instant::now() + self.idle);
                    }
                }
            }
        };

        match end {
            ChannelEnd::Draining => {
                tracing::debug!(in_flight = calls.len(), "Draining RPC channel");
                while calls.join_next().await.is_some() {}
                let _ = tx
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "server shutting down".into(),
                    })))
                    .await;
            }
            ChannelEnd::Idle => {
                tracing::debug!(idle = ?self.idle, "RPC channel idle, closing");
                calls.abort_all();
                let _ = tx
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: "idle timeout".into(),
                    })))
                    .await;
            }
            ChannelEnd::Disconnected => calls.abort_all(),
        }

        drop(tx);
        let _ = writer.await;
    }

    /// Parse one frame and start its call, or reply with why it was refused.
    async fn accept(&self, bytes: &[u8], calls: &mut JoinSet<()>, tx: &mpsc::Sender<Message>) {
        let frame = match CallFrame::parse(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed RPC frame");
                send(tx, ReplyFrame::malformed(format!("malformed frame: {e}"))).await;
                return;
            }
        };

        while calls.try_join_next().is_some() {}
        if calls.len() >= self.max_inflight {
            send(tx, ReplyFrame::busy(frame.id, self.max_inflight)).await;
            return;
        }

        let registry = Arc::clone(&self.registry);
        let tx = tx.clone();
        calls.spawn(async move {
            let CallFrame {
                id,
                procedure,
                input,
            } = frame;
            let outcome = AssertUnwindSafe(registry.dispatch(&procedure, input))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!(procedure = %procedure, "Procedure panicked");
                    Err(EdgeError::HandlerFault(format!("{procedure} panicked")))
                });
            let reply = match outcome {
                Ok(result) => ReplyFrame::success(id, result),
                Err(e) => ReplyFrame::failure(id, &e),
            };
            send(&tx, reply).await;
        });
    }
}

async fn send(tx: &mpsc::Sender<Message>, reply: ReplyFrame) {
    let _ = tx.send(Message::Text(reply.to_json().into())).await;
}
