//! `GET /event`: server-sent events. Publishes a `server.connected` frame on
//! connect, a `server.heartbeat` frame every 30s, and forwards every bus
//! event as its `{type, properties}` wire frame (each
//! subscription gets its own bounded channel; a lagging subscriber drops
//! events rather than blocking the bus).

use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use serde_json::json;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

type Frame = Result<Event, Infallible>;
type BoxedStream = Pin<Box<dyn Stream<Item = Frame> + Send>>;

pub async fn stream_events(State(state): State<AppState>) -> Sse<impl Stream<Item = Frame>> {
    let connected: BoxedStream =
        Box::pin(stream::once(async { frame_event(json!({"type": "server.connected", "properties": {}})) }));

    let heartbeats: BoxedStream = Box::pin(
        IntervalStream::new(tokio::time::interval(HEARTBEAT_INTERVAL))
            .map(|_| frame_event(json!({"type": "server.heartbeat", "properties": {}}))),
    );

    let bus_events: BoxedStream = Box::pin(
        BroadcastStream::new(state.runtime.bus.subscribe_channel())
            .filter_map(|result| result.ok())
            .map(|event| frame_event(event.to_frame())),
    );

    let merged = connected.chain(stream::select(heartbeats, bus_events));
    Sse::new(merged).keep_alive(KeepAlive::default())
}

fn frame_event(frame: serde_json::Value) -> Result<Event, Infallible> {
    Ok(Event::default().json_data(frame).unwrap_or_else(|_| Event::default().data("{}")))
}
