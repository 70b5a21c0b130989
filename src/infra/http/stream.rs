//! Live change feed over server-sent events.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use tracing::warn;
use uuid::Uuid;

use crate::notify::Notifier;

use super::AppState;

/// Stream notification events to the client as they are published.
/// Events published before the subscription are never replayed.
pub async fn messages(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = state.notifier.subscribe();
    let guard = Unsubscribe {
        notifier: state.notifier.clone(),
        id: subscription.id(),
    };

    let stream = stream! {
        // Held for the stream's lifetime so a dropped connection
        // deregisters the subscriber.
        let _guard = guard;

        while let Some(event) = subscription.recv().await {
            match Event::default().json_data(&event) {
                Ok(sse_event) => yield Ok::<_, Infallible>(sse_event),
                Err(err) => warn!(error = %err, "failed to encode notification event"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

struct Unsubscribe {
    notifier: Arc<Notifier>,
    id: Uuid,
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.notifier.unsubscribe(self.id);
    }
}
