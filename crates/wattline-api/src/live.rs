//! Handler for `GET /live` — the websocket snapshot feed.
//!
//! Each connected client receives one JSON snapshot per monitor tick. A
//! client that cannot keep up skips the frames it missed and resumes with
//! the current one; the feed never buffers unboundedly or applies
//! backpressure to the monitor.

use axum::{
  extract::{
    State, WebSocketUpgrade,
    ws::{Message, WebSocket},
  },
  response::Response,
};
use tokio::sync::broadcast::error::RecvError;
use wattline_core::{
  event::Snapshot,
  store::{ConfigStore, EventStore},
};

use crate::AppState;

/// `GET /live`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  ws: WebSocketUpgrade,
) -> Response
where
  S: EventStore + ConfigStore + 'static,
{
  ws.on_upgrade(move |socket| serve(socket, state))
}

async fn send_snapshot(
  socket: &mut WebSocket,
  snapshot: &Snapshot,
) -> Result<(), axum::Error> {
  match serde_json::to_string(snapshot) {
    Ok(text) => socket.send(Message::Text(text.into())).await,
    Err(e) => {
      tracing::error!(error = %e, "failed to serialise snapshot");
      Ok(())
    }
  }
}

async fn serve<S>(mut socket: WebSocket, state: AppState<S>)
where
  S: EventStore + ConfigStore,
{
  let mut frames = state.live.subscribe();

  // New clients get the current picture immediately rather than waiting out
  // the rest of the polling interval.
  let initial = state.latest.borrow().clone();
  if let Some(snapshot) = initial
    && send_snapshot(&mut socket, &snapshot).await.is_err()
  {
    return;
  }

  loop {
    tokio::select! {
      frame = frames.recv() => match frame {
        Ok(snapshot) => {
          if send_snapshot(&mut socket, &snapshot).await.is_err() {
            break;
          }
        }
        Err(RecvError::Lagged(missed)) => {
          tracing::debug!(missed, "live subscriber lagged; skipping frames");
        }
        Err(RecvError::Closed) => break,
      },
      message = socket.recv() => match message {
        Some(Ok(Message::Close(_))) | None => break,
        Some(Ok(_)) => {}
        Some(Err(_)) => break,
      },
    }
  }
}
