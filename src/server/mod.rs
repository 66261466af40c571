//! WebSocket server for dashboard clients.
//!
//! The server is a pass-through: snapshots published on the
//! [`EventDispatcher`] go out to every client as text frames, and text
//! frames from clients go to the command channel untouched.

use std::fmt::Display;
use std::future::Future;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::event::{Event, EventDispatcher};

/// Path clients connect to.
pub const WEBSOCKET_PATH: &str = "/websocket";

/// Command sent on behalf of a client when it connects.
const CONNECT_COMMAND: &str = "update";

#[derive(Clone)]
struct ServerState {
    events: EventDispatcher,
    commands: mpsc::Sender<String>,
}

/// Builds the router.
pub fn router(events: EventDispatcher, commands: mpsc::Sender<String>) -> Router {
    Router::new()
        .route(WEBSOCKET_PATH, get(upgrade))
        .with_state(ServerState { events, commands })
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket: WebSocket| async move {
        let (sender, receiver) = socket.split();
        session(sender, receiver, state.events, state.commands).await;
    })
}

/// Serves clients on `listener` until `shutdown` completes.
pub async fn serve(
    listener: TcpListener,
    events: EventDispatcher,
    commands: mpsc::Sender<String>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    if let Ok(address) = listener.local_addr() {
        tracing::info!("WebSocket server listening on ws://{}{}", address, WEBSOCKET_PATH);
    }
    axum::serve(listener, router(events, commands))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Runs one client session.
async fn session<S, R, E>(
    mut sender: S,
    mut receiver: R,
    events: EventDispatcher,
    commands: mpsc::Sender<String>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: Display,
{
    // Subscribe before asking for a snapshot so the answer is not missed.
    let mut subscription = events.subscribe();
    if commands.send(CONNECT_COMMAND.to_string()).await.is_err() {
        return;
    }
    tracing::info!("client connected ({} total)", events.subscriber_count());

    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Some(Event::Snapshot(json)) => {
                    if let Err(e) = sender.send(Message::Text(json.to_string())).await {
                        tracing::debug!("failed to send snapshot: {}", e);
                        break;
                    }
                }
                Some(Event::Shutdown) | None => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("client command: {}", text);
                    if commands.send(text).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("client read error: {}", e);
                    break;
                }
            },
        }
    }

    tracing::info!("client disconnected");
}
