//! The content-addressed session/message/part store (storage
//! layout): `session/{sid}`, `message/{sid}/{mid}`, `part/{mid}/{pid}`.
//! Every mutation publishes the matching bus event.

use agentcore_bus::Bus;
use agentcore_storage::{Key, Storage};

use crate::error::EngineError;
use crate::event::CoreEvent;
use crate::message::{Message, Part};
use crate::session::{Session, SessionTime};
use crate::time::now_millis;

#[derive(Clone)]
pub struct Store {
    storage: Storage,
    bus: Bus<CoreEvent>,
}

fn session_key(id: &str) -> Key {
    Key::new(["session", id])
}

fn message_key(session_id: &str, message_id: &str) -> Key {
    Key::new(["message", session_id, message_id])
}

fn message_prefix(session_id: &str) -> Key {
    Key::new(["message", session_id])
}

fn part_key(message_id: &str, part_id: &str) -> Key {
    Key::new(["part", message_id, part_id])
}

fn part_prefix(message_id: &str) -> Key {
    Key::new(["part", message_id])
}

impl Store {
    pub fn new(storage: Storage, bus: Bus<CoreEvent>) -> Self {
        Store { storage, bus }
    }

    // ── Session ──────────────────────────────────────────────────────────

    pub fn create_session(&self, title: String, parent_id: Option<String>, permission: Option<agentcore_permission::Ruleset>) -> Session {
        let now = now_millis();
        let session = Session {
            id: agentcore_ids::generate(agentcore_ids::prefix::SESSION),
            title,
            parent_id,
            permission,
            time: SessionTime { created: now, updated: now },
        };
        self.storage.write(&session_key(&session.id), &session).expect("fresh session id cannot collide");
        self.bus.publish(CoreEvent::SessionCreated(session.clone()));
        session
    }

    pub fn get_session(&self, id: &str) -> Result<Session, EngineError> {
        self.storage.read(&session_key(id)).map_err(EngineError::not_found_from_storage)
    }

    pub fn update_session(&self, id: &str, mutate: impl FnOnce(Session) -> Session) -> Result<Session, EngineError> {
        let key = session_key(id);
        let updated = self
            .storage
            .update(&key, |mut s: Session| {
                s = mutate(s);
                s.time.updated = now_millis();
                s
            })
            .map_err(EngineError::not_found_from_storage)?;
        self.bus.publish(CoreEvent::SessionUpdated(updated.clone()));
        Ok(updated)
    }

    /// Cascading delete: every message of the session, and every part of
    /// each of those messages.
    pub fn delete_session(&self, id: &str) -> Result<(), EngineError> {
        for message_key in self.storage.list(&message_prefix(id))? {
            let message_id = message_key.segments().last().expect("message key has a leaf segment");
            for part_key in self.storage.list(&part_prefix(message_id))? {
                self.storage.remove(&part_key)?;
            }
            self.storage.remove(&message_key)?;
        }
        self.storage.remove(&session_key(id))?;
        self.bus.publish(CoreEvent::SessionDeleted { session_id: id.to_string() });
        Ok(())
    }

    pub fn list_sessions(&self) -> Result<Vec<Session>, EngineError> {
        let mut sessions = Vec::new();
        for key in self.storage.list(&Key::new(["session"]))? {
            sessions.push(self.storage.read(&key)?);
        }
        Ok(sessions)
    }

    pub fn children(&self, parent_id: &str) -> Result<Vec<Session>, EngineError> {
        Ok(self.list_sessions()?.into_iter().filter(|s| s.parent_id.as_deref() == Some(parent_id)).collect())
    }

    pub fn publish_session_error(&self, session_id: &str, message: String) {
        self.bus.publish(CoreEvent::SessionError { session_id: session_id.to_string(), message });
    }

    // ── Message ──────────────────────────────────────────────────────────

    /// Messages of a session in chronological (ascending-ID) order.
    pub fn messages(&self, session_id: &str) -> Result<Vec<Message>, EngineError> {
        let mut messages = Vec::new();
        for key in self.storage.list(&message_prefix(session_id))? {
            messages.push(self.storage.read(&key)?);
        }
        Ok(messages)
    }

    pub fn get_message(&self, session_id: &str, message_id: &str) -> Result<Message, EngineError> {
        self.storage.read(&message_key(session_id, message_id)).map_err(EngineError::not_found_from_storage)
    }

    pub fn write_message(&self, message: &Message) -> Result<(), EngineError> {
        self.storage.write(&message_key(message.session_id(), message.id()), message)?;
        self.bus.publish(CoreEvent::MessageUpdated(message.clone()));
        Ok(())
    }

    pub fn remove_message(&self, session_id: &str, message_id: &str) -> Result<(), EngineError> {
        for part_key in self.storage.list(&part_prefix(message_id))? {
            self.storage.remove(&part_key)?;
        }
        self.storage.remove(&message_key(session_id, message_id))?;
        self.bus.publish(CoreEvent::MessageRemoved {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    // ── Part ─────────────────────────────────────────────────────────────

    /// Parts of a message in ascending (generation) order.
    pub fn parts(&self, message_id: &str) -> Result<Vec<Part>, EngineError> {
        let mut parts = Vec::new();
        for key in self.storage.list(&part_prefix(message_id))? {
            parts.push(self.storage.read(&key)?);
        }
        Ok(parts)
    }

    /// Write (create or update) a part. `delta` is the just-appended text,
    /// carried on the bus event for streaming clients; pass `None` on a
    /// part's final write.
    pub fn write_part(&self, part: &Part, delta: Option<String>) -> Result<(), EngineError> {
        self.storage.write(&part_key(part.message_id(), part.id()), part)?;
        self.bus.publish(CoreEvent::PartUpdated { part: part.clone(), delta });
        Ok(())
    }

    pub fn remove_part(&self, session_id: &str, message_id: &str, part_id: &str) -> Result<(), EngineError> {
        self.storage.remove(&part_key(message_id, part_id))?;
        self.bus.publish(CoreEvent::PartRemoved {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
            part_id: part_id.to_string(),
        });
        Ok(())
    }
}
