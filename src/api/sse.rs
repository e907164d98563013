//! Server-Sent Events support

use crate::conversation::ConversationSnapshot;
use crate::runtime::SessionEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream, starting with a full snapshot
///
/// The receiver is subscribed before the snapshot is taken, so messages
/// appended in between arrive twice. Clients drop `message` events whose
/// `index` is not above the snapshot's `last_index`.
pub fn sse_stream(
    snapshot: ConversationSnapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(init_event(&snapshot)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(session_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_event(snapshot: &ConversationSnapshot) -> Event {
    let data = json!({
        "type": "init",
        "id": snapshot.id,
        "history": snapshot.history,
        "last_index": snapshot.last_index,
        "pending": snapshot.pending
    });
    Event::default().event("init").data(data.to_string())
}

fn session_event_to_axum(event: SessionEvent) -> Event {
    let (event_type, data) = match event {
        SessionEvent::Message { index, message } => (
            "message",
            json!({
                "type": "message",
                "index": index,
                "message": message
            }),
        ),
        SessionEvent::StateChange { pending } => (
            "state_change",
            json!({
                "type": "state_change",
                "pending": pending
            }),
        ),
        SessionEvent::ReplyDone => (
            "reply_done",
            json!({
                "type": "reply_done"
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
