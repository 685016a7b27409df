//! Server-sent change feed.
//!
//! Each subscriber gets the events it is allowed to see, serialized as a
//! `change` SSE event. Clients re-fetch the affected collection rather
//! than patching local state from the payload.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::Stream;
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::events::visible_to;
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(change_feed))
}

/// GET /events — long-lived SSE stream of watched-table changes.
async fn change_feed(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    tracing::debug!(user = %user.id, role = user.role.as_str(), "change feed subscriber connected");

    let user_id = user.id;
    let role = user.role;

    let stream = BroadcastStream::new(rx).filter_map(move |ev| {
        let user_id = user_id.clone();
        async move {
            // Lagged receivers drop the missed events; the next visible
            // one still gets through.
            let ev = ev.ok()?;
            if !visible_to(&ev, &user_id, role) {
                return None;
            }
            let data = serde_json::to_string(&ev).ok()?;
            Some(Ok::<Event, Infallible>(Event::default().event("change").data(data)))
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
