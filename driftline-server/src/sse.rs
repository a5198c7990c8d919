use axum::{
    extract::Path,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use driftline_collab::{Collab, Payload, SendError, Subscriber, Subscription};
use futures_util::Stream;
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    convert::Infallible,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll, Waker},
};

use crate::{context::ServerContext, errors::ServerResult, serialized::ErrorBody, Router};

/// How many events a connection may have waiting before it is dropped
const MAX_PENDING: usize = 256;

/// A push channel backed by a server sent event stream
#[derive(Default)]
struct Connection {
    pending_messages: Mutex<VecDeque<Payload>>,
    waker: Mutex<Option<Waker>>,
    closed: AtomicBool,
}

enum Feed {
    Room,
    Live,
}

struct ConnectionHandle {
    connection: Arc<Connection>,
    subscription: Subscription,
    feed: Feed,
    /// Required to unsubscribe when dropped
    collab: Arc<Collab>,
}

impl Connection {
    fn new() -> Arc<Self> {
        Default::default()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pending_messages.lock().clear();
    }
}

impl Subscriber for Connection {
    fn send(&self, payload: Payload) -> Result<(), SendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }

        {
            let mut pending_messages = self.pending_messages.lock();

            if pending_messages.len() >= MAX_PENDING {
                return Err(SendError::Full);
            }

            pending_messages.push_back(payload);
        }

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }

        Ok(())
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Registered before looking at the queue so a send in between is never missed
        *self.connection.waker.lock() = Some(cx.waker().clone());

        if let Some(payload) = self.connection.pending_messages.lock().pop_front() {
            return Poll::Ready(Some(Ok(Event::default().data(&*payload))));
        }

        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.connection.close();

        match self.feed {
            Feed::Room => self.collab.rooms.unsubscribe(&self.subscription),
            Feed::Live => self.collab.rooms.unsubscribe_live_feed(&self.subscription),
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{room}/events",
    tag = "events",
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of room events, starting with a hello snapshot"
        ),
        (status = 404, body = ErrorBody)
    )
)]
async fn room_events(
    context: ServerContext,
    Path(room_name): Path<String>,
) -> ServerResult<Sse<ConnectionHandle>> {
    let connection = Connection::new();
    let subscription = context
        .collab
        .rooms
        .subscribe(&room_name, connection.clone())?;

    let handle = ConnectionHandle {
        connection,
        subscription,
        feed: Feed::Room,
        collab: context.collab,
    };

    Ok(Sse::new(handle).keep_alive(KeepAlive::default()))
}

#[utoipa::path(
    get,
    path = "/v1/live/events",
    tag = "events",
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of live session lists, starting with a hello"
        )
    )
)]
async fn live_events(context: ServerContext) -> Sse<ConnectionHandle> {
    let connection = Connection::new();
    let subscription = context.collab.subscribe_live_feed(connection.clone());

    let handle = ConnectionHandle {
        connection,
        subscription,
        feed: Feed::Live,
        collab: context.collab,
    };

    Sse::new(handle).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new()
        .route("/rooms/:room/events", get(room_events))
        .route("/live/events", get(live_events))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_slow_connection_is_reported_full() {
        let connection = Connection::new();

        for _ in 0..MAX_PENDING {
            connection.send(Payload::from("{}")).unwrap();
        }

        assert_eq!(connection.send(Payload::from("{}")), Err(SendError::Full));
    }

    #[test]
    fn test_closed_connection_rejects_sends() {
        let connection = Connection::new();
        connection.send(Payload::from("{}")).unwrap();
        connection.close();

        assert_eq!(connection.send(Payload::from("{}")), Err(SendError::Closed));
        assert!(connection.pending_messages.lock().is_empty());
    }
}
