//! Telegram channel adapter
//!
//! Long-polls getUpdates for receiving messages and uses the Bot API for
//! sending

mod api;
pub mod dedup;
pub mod polling;
pub mod types;

use reqwest::Client;
use tokio::sync::mpsc;

use super::IncomingMessage;

pub use dedup::UpdateDedup;
pub use types::MediaFileRef;

/// Telegram channel adapter
#[derive(Clone)]
pub struct TelegramChannel {
    token: String,
    client: Client,
    message_tx: Option<mpsc::Sender<IncomingMessage>>,
}

impl TelegramChannel {
    /// Create a new Telegram channel adapter
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: Client::new(),
            message_tx: None,
        }
    }

    /// Create with a message receiver for polling mode
    ///
    /// Returns the channel and a receiver for incoming messages
    #[must_use]
    pub fn with_receiver(token: String) -> (Self, mpsc::Receiver<IncomingMessage>) {
        let (tx, rx) = mpsc::channel(100);
        let channel = Self {
            token,
            client: Client::new(),
            message_tx: Some(tx),
        };
        (channel, rx)
    }
}
