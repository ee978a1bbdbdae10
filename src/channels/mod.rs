//! Chat transport adapters
//!
//! The transport hands the relay a user identifier and text per inbound
//! turn; everything conversation-shaped happens behind it.

pub mod telegram;

pub use telegram::{MediaFileRef, TelegramChannel, UpdateDedup};

/// A message received from the chat transport
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform message ID
    pub id: String,
    /// Chat this message belongs to (the conversation owner)
    pub chat_id: i64,
    /// Display name of the sender
    pub sender_name: String,
    /// Text content (caption for media messages, possibly empty)
    pub content: String,
    /// Attached photo, if any (largest available size)
    pub photo: Option<MediaFileRef>,
}

impl IncomingMessage {
    /// Whether this message is a bot command (starts with `/`)
    #[must_use]
    pub fn is_command(&self) -> bool {
        self.content.starts_with('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_detection() {
        let mut msg = IncomingMessage {
            id: "1".into(),
            chat_id: 42,
            sender_name: "Test".into(),
            content: "/start".into(),
            photo: None,
        };
        assert!(msg.is_command());

        msg.content = "hello".into();
        assert!(!msg.is_command());
    }
}
