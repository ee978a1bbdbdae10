//! Telegram polling mode — getUpdates loop and message conversion

use serde::Deserialize;
use tokio::sync::mpsc;

use super::dedup::UpdateDedup;
use super::types::{API_BASE, MediaFileRef};
use crate::channels::IncomingMessage;

/// Response from Telegram getUpdates API
#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    #[allow(dead_code)]
    ok: bool,
    result: Vec<PollingUpdate>,
}

/// A single update from getUpdates
#[derive(Debug, Deserialize)]
struct PollingUpdate {
    update_id: i64,
    message: Option<PollingMessage>,
}

/// Message from a polling update
#[derive(Debug, Deserialize)]
struct PollingMessage {
    message_id: i64,
    chat: PollingChat,
    from: Option<PollingUser>,
    text: Option<String>,
    caption: Option<String>,
    photo: Option<Vec<PollingPhotoSize>>,
}

/// Photo size from polling
#[derive(Debug, Deserialize)]
struct PollingPhotoSize {
    file_id: String,
}

/// Chat info from polling
#[derive(Debug, Deserialize)]
struct PollingChat {
    id: i64,
}

/// User info from polling
#[derive(Debug, Deserialize)]
struct PollingUser {
    is_bot: bool,
    first_name: String,
}

impl super::TelegramChannel {
    /// Spawn a background task that polls Telegram's getUpdates API
    ///
    /// Polls every `interval` and forwards received messages into the mpsc
    /// channel.
    pub fn start_polling(&self, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let token = self.token.clone();
        let client = self.client.clone();
        let tx = self
            .message_tx
            .clone()
            .expect("start_polling requires a message_tx (use with_receiver)");

        tokio::spawn(async move {
            polling_loop(token, client, tx, interval).await;
        })
    }
}

/// Run the polling loop (background task)
async fn polling_loop(
    token: String,
    client: reqwest::Client,
    tx: mpsc::Sender<IncomingMessage>,
    interval: std::time::Duration,
) {
    let mut offset: Option<i64> = None;
    let mut dedup = UpdateDedup::default();

    loop {
        let url = format!("{API_BASE}{token}/getUpdates");
        let mut params = serde_json::json!({
            "timeout": 30,
            "allowed_updates": ["message"],
        });
        if let Some(off) = offset {
            params["offset"] = serde_json::json!(off);
        }

        match client.post(&url).json(&params).send().await {
            Ok(resp) => {
                if let Ok(body) = resp.text().await {
                    if let Ok(updates) = serde_json::from_str::<GetUpdatesResponse>(&body) {
                        for update in &updates.result {
                            // Advance offset past this update
                            offset = Some(update.update_id + 1);

                            let key = format!("poll:{}", update.update_id);
                            if dedup.is_duplicate(&key) {
                                continue;
                            }

                            if let Some(msg) = update_to_incoming(update) {
                                if let Err(e) = tx.send(msg).await {
                                    tracing::warn!(error = %e, "failed to forward Telegram message");
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Telegram getUpdates error");
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// Convert a polling update into an `IncomingMessage`
fn update_to_incoming(update: &PollingUpdate) -> Option<IncomingMessage> {
    let msg = update.message.as_ref()?;

    // Skip bot messages
    if msg.from.as_ref().is_some_and(|u| u.is_bot) {
        return None;
    }

    // Photo: pick largest size (last in array)
    let photo = msg.photo.as_ref().and_then(|sizes| sizes.last()).map(|largest| MediaFileRef {
        file_id: largest.file_id.clone(),
        mime_type: "image/jpeg".to_string(),
    });

    let text = msg.text.clone().or_else(|| msg.caption.clone());

    // Skip messages with no text and no photo
    if text.is_none() && photo.is_none() {
        return None;
    }

    let sender_name = msg
        .from
        .as_ref()
        .map_or_else(|| "Unknown".to_string(), |u| u.first_name.clone());

    Some(IncomingMessage {
        id: msg.message_id.to_string(),
        chat_id: msg.chat.id,
        sender_name,
        content: text.unwrap_or_default(),
        photo,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_from(json: &str) -> PollingUpdate {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn text_update_converts() {
        let update = update_from(
            r#"{"update_id":1,"message":{"message_id":10,"chat":{"id":77},
               "from":{"is_bot":false,"first_name":"Ada"},"text":"hello"}}"#,
        );

        let msg = update_to_incoming(&update).unwrap();
        assert_eq!(msg.chat_id, 77);
        assert_eq!(msg.sender_name, "Ada");
        assert_eq!(msg.content, "hello");
        assert!(msg.photo.is_none());
    }

    #[test]
    fn bot_messages_are_skipped() {
        let update = update_from(
            r#"{"update_id":2,"message":{"message_id":11,"chat":{"id":77},
               "from":{"is_bot":true,"first_name":"OtherBot"},"text":"spam"}}"#,
        );

        assert!(update_to_incoming(&update).is_none());
    }

    #[test]
    fn photo_update_picks_largest_size() {
        let update = update_from(
            r#"{"update_id":3,"message":{"message_id":12,"chat":{"id":5},
               "from":{"is_bot":false,"first_name":"Ada"},
               "caption":"look at this",
               "photo":[{"file_id":"small"},{"file_id":"medium"},{"file_id":"large"}]}}"#,
        );

        let msg = update_to_incoming(&update).unwrap();
        assert_eq!(msg.content, "look at this");
        assert_eq!(msg.photo.unwrap().file_id, "large");
    }

    #[test]
    fn empty_update_is_skipped() {
        let update = update_from(
            r#"{"update_id":4,"message":{"message_id":13,"chat":{"id":5},
               "from":{"is_bot":false,"first_name":"Ada"}}}"#,
        );

        assert!(update_to_incoming(&update).is_none());
    }
}
