//! Team inboxes: ordered, file-backed message queues.
//!
//! One inbox file per `(team, agent)`. Insertion order is delivery order;
//! only the addressed agent consumes (marks read).

use serde::{Deserialize, Serialize};

use crate::id::{generate_message_id, now_ms};

/// One message in an agent's inbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboxMessage {
    pub id: String,

    /// Agent or session that sent the message
    pub sender: String,

    /// Message body, opaque to huddle
    pub payload: String,

    /// Unix timestamp in milliseconds
    pub timestamp: i64,

    /// Set once the addressed agent has consumed the message
    pub read: bool,
}

impl InboxMessage {
    /// Create a new unread message.
    pub fn new(sender: &str, payload: &str) -> Self {
        Self {
            id: generate_message_id(),
            sender: sender.to_string(),
            payload: payload.to_string(),
            timestamp: now_ms(),
            read: false,
        }
    }
}

/// The persisted inbox document: a FIFO sequence of messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Inbox {
    pub messages: Vec<InboxMessage>,
}

impl Inbox {
    /// Append a message at the tail.
    pub fn push(&mut self, message: InboxMessage) {
        self.messages.push(message);
    }

    /// Messages not yet consumed, in delivery order.
    pub fn unread(&self) -> impl Iterator<Item = &InboxMessage> {
        self.messages.iter().filter(|m| !m.read)
    }

    /// Mark every message read, returning the ones that were unread.
    pub fn mark_all_read(&mut self) -> Vec<InboxMessage> {
        let mut taken = Vec::new();
        for message in &mut self.messages {
            if !message.read {
                message.read = true;
                taken.push(message.clone());
            }
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_is_unread() {
        let msg = InboxMessage::new("coordinator", "status?");
        assert_eq!(msg.sender, "coordinator");
        assert_eq!(msg.payload, "status?");
        assert!(!msg.read);
    }

    #[test]
    fn test_push_preserves_order() {
        let mut inbox = Inbox::default();
        inbox.push(InboxMessage::new("a", "first"));
        inbox.push(InboxMessage::new("a", "second"));
        inbox.push(InboxMessage::new("b", "third"));

        let payloads: Vec<&str> = inbox.messages.iter().map(|m| m.payload.as_str()).collect();
        assert_eq!(payloads, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unread_skips_read_messages() {
        let mut inbox = Inbox::default();
        let mut read_msg = InboxMessage::new("a", "old");
        read_msg.read = true;
        inbox.push(read_msg);
        inbox.push(InboxMessage::new("a", "new"));

        let unread: Vec<&str> = inbox.unread().map(|m| m.payload.as_str()).collect();
        assert_eq!(unread, vec!["new"]);
    }

    #[test]
    fn test_mark_all_read_returns_previously_unread() {
        let mut inbox = Inbox::default();
        inbox.push(InboxMessage::new("a", "one"));
        inbox.push(InboxMessage::new("a", "two"));

        let taken = inbox.mark_all_read();
        assert_eq!(taken.len(), 2);
        assert!(inbox.unread().next().is_none());

        // Second call finds nothing new
        assert!(inbox.mark_all_read().is_empty());
    }

    #[test]
    fn test_inbox_serialization_roundtrip() {
        let mut inbox = Inbox::default();
        inbox.push(InboxMessage::new("sender", "payload"));
        let json = serde_json::to_string(&inbox).unwrap();
        let restored: Inbox = serde_json::from_str(&json).unwrap();
        assert_eq!(inbox, restored);
    }
}
