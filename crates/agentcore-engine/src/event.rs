//! The event types published on the runtime's bus (SSE stream, minus the
//! transport-level `server.connected`/`server.heartbeat` frames the HTTP
//! edge adds).

use serde_json::{json, Value};

use agentcore_permission::PermissionEvent;

use crate::message::Message;
use crate::session::Session;

#[derive(Debug, Clone)]
pub enum CoreEvent {
    SessionCreated(Session),
    SessionUpdated(Session),
    SessionDeleted { session_id: String },
    SessionError { session_id: String, message: String },
    MessageUpdated(Message),
    MessageRemoved { session_id: String, message_id: String },
    /// `delta` carries the just-appended text for streaming updates; `None`
    /// on the final write of a part.
    PartUpdated { part: crate::message::Part, delta: Option<String> },
    PartRemoved { session_id: String, message_id: String, part_id: String },
    Permission(PermissionEvent),
}

impl CoreEvent {
    /// The `{type, properties}` wire frame the SSE edge publishes.
    pub fn to_frame(&self) -> Value {
        let (event_type, properties) = match self {
            CoreEvent::SessionCreated(session) => ("session.created", json!({"info": session})),
            CoreEvent::SessionUpdated(session) => ("session.updated", json!({"info": session})),
            CoreEvent::SessionDeleted { session_id } => ("session.deleted", json!({"sessionID": session_id})),
            CoreEvent::SessionError { session_id, message } => {
                ("session.error", json!({"sessionID": session_id, "message": message}))
            }
            CoreEvent::MessageUpdated(message) => ("message.updated", json!({"info": message})),
            CoreEvent::MessageRemoved { session_id, message_id } => {
                ("message.removed", json!({"sessionID": session_id, "messageID": message_id}))
            }
            CoreEvent::PartUpdated { part, delta } => ("message.part.updated", json!({"part": part, "delta": delta})),
            CoreEvent::PartRemoved { session_id, message_id, part_id } => (
                "message.part.removed",
                json!({"sessionID": session_id, "messageID": message_id, "partID": part_id}),
            ),
            CoreEvent::Permission(event) => return permission_event_frame(event),
        };
        json!({"type": event_type, "properties": properties})
    }
}

fn permission_event_frame(event: &PermissionEvent) -> Value {
    let tagged = serde_json::to_value(event).unwrap_or(Value::Null);
    let Value::Object(mut fields) = tagged else { return Value::Null };
    let event_type = fields.remove("type").unwrap_or(Value::Null);
    json!({"type": event_type, "properties": Value::Object(fields)})
}
