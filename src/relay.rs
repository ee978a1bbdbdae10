//! Message relay: the unit of work per inbound message
//!
//! Glues the transport, context builder, backend, and history store
//! together: receive → build context → call backend → persist exchange →
//! reply.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::backend::GeminiClient;
use crate::channels::{IncomingMessage, TelegramChannel};
use crate::context::ContextBuilder;
use crate::db::{HistoryRepo, StoredRole};
use crate::{Error, Result};

/// Reply for /start and /help
const GREETING: &str = "Hi! I'm a Gemini-backed assistant.\n\n\
    \u{2022} Send me text and I'll reply\n\
    \u{2022} Send a photo and I'll analyze it";

/// Prompt used when a photo arrives without a caption
const DEFAULT_PHOTO_PROMPT: &str = "What do you see in this image?";

/// User-facing notice for backend quota exhaustion
const QUOTA_NOTICE: &str =
    "\u{26a0}\u{fe0f} The AI backend is out of quota. Please try again later.";

/// Generic user-facing failure notice
const FAILURE_NOTICE: &str = "Something went wrong while generating a reply. Please try again.";

/// Message relay
pub struct Relay {
    channel: TelegramChannel,
    history: HistoryRepo,
    context: ContextBuilder,
    backend: GeminiClient,
    /// Per-user locks: messages from one user are handled one at a time so
    /// their exchanges land in causal order
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl Relay {
    /// Create a new relay
    #[must_use]
    pub fn new(
        channel: TelegramChannel,
        history: HistoryRepo,
        context: ContextBuilder,
        backend: GeminiClient,
    ) -> Self {
        Self {
            channel,
            history,
            context,
            backend,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Consume incoming messages until the transport closes
    ///
    /// Each message is handled in its own task; users are independent of
    /// each other.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<IncomingMessage>) {
        while let Some(msg) = rx.recv().await {
            let relay = Arc::clone(&self);
            tokio::spawn(async move {
                let chat_id = msg.chat_id;
                if let Err(e) = relay.handle(msg).await {
                    tracing::error!(chat_id, error = %e, "message handling failed");
                }
            });
        }

        tracing::info!("transport closed, relay stopping");
    }

    /// Handle one inbound message end to end
    async fn handle(&self, msg: IncomingMessage) -> Result<()> {
        let lock = self.user_lock(msg.chat_id).await;
        let _guard = lock.lock().await;

        tracing::debug!(
            chat_id = msg.chat_id,
            sender = %msg.sender_name,
            has_photo = msg.photo.is_some(),
            "handling message"
        );

        if msg.photo.is_some() {
            self.handle_photo(&msg).await
        } else if msg.is_command() {
            self.handle_command(&msg).await
        } else {
            self.handle_text(&msg).await
        }
    }

    /// Command flow: known commands get a canned reply, anything else is
    /// treated as chat input
    async fn handle_command(&self, msg: &IncomingMessage) -> Result<()> {
        match command_name(&msg.content) {
            "/start" | "/help" => {
                self.channel
                    .send_message(msg.chat_id, GREETING, reply_target(msg))
                    .await
            }
            _ => self.handle_text(msg).await,
        }
    }

    /// Text flow: context window → chat completion → persist → reply
    async fn handle_text(&self, msg: &IncomingMessage) -> Result<()> {
        let user_id = msg.chat_id;

        if let Err(e) = self.channel.send_chat_action(user_id, "typing").await {
            tracing::debug!(error = %e, "typing indicator failed");
        }

        let context = self.context.build_context(user_id)?;

        match self.backend.generate_reply(&context, &msg.content).await {
            Ok(answer) => {
                self.history.append_exchange(
                    user_id,
                    &[
                        (StoredRole::User, msg.content.as_str()),
                        (StoredRole::Assistant, answer.as_str()),
                    ],
                )?;
                self.channel
                    .send_message(user_id, &answer, reply_target(msg))
                    .await
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "chat completion failed");
                self.channel
                    .send_message(user_id, render_failure(&e), reply_target(msg))
                    .await
            }
        }
    }

    /// Photo flow: download → image analysis → persist → reply
    async fn handle_photo(&self, msg: &IncomingMessage) -> Result<()> {
        let user_id = msg.chat_id;
        let photo = msg
            .photo
            .as_ref()
            .ok_or_else(|| Error::Channel("photo message without file ref".to_string()))?;

        if let Err(e) = self.channel.send_chat_action(user_id, "typing").await {
            tracing::debug!(error = %e, "typing indicator failed");
        }

        let image = self.channel.download_file(&photo.file_id).await?;
        let prompt = photo_prompt(&msg.content);

        match self
            .backend
            .generate_from_image(prompt, &image, &photo.mime_type)
            .await
        {
            Ok(answer) => {
                self.history.append_exchange(
                    user_id,
                    &[
                        (StoredRole::User, photo_turn_text(prompt).as_str()),
                        (StoredRole::Assistant, answer.as_str()),
                    ],
                )?;
                self.channel
                    .send_message(user_id, &answer, reply_target(msg))
                    .await
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "image analysis failed");
                self.channel
                    .send_message(user_id, render_failure(&e), reply_target(msg))
                    .await
            }
        }
    }

    async fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(user_id).or_default())
    }
}

/// Reply-to target for a message, if its platform ID parses
fn reply_target(msg: &IncomingMessage) -> Option<i64> {
    msg.id.parse().ok()
}

/// Extract the bare command name from a command message
///
/// Groups address commands as `/start@botname`; arguments follow after
/// whitespace. Both are stripped.
fn command_name(content: &str) -> &str {
    let first = content.split_whitespace().next().unwrap_or_default();
    first.split('@').next().unwrap_or(first)
}

/// Pick the prompt for a photo message
fn photo_prompt(caption: &str) -> &str {
    if caption.trim().is_empty() {
        DEFAULT_PHOTO_PROMPT
    } else {
        caption
    }
}

/// Text representation of a photo turn for storage
///
/// No binary content persists; a photo is recorded as its prompt plus a
/// marker.
fn photo_turn_text(prompt: &str) -> String {
    format!("[photo] {prompt}")
}

/// Map a backend failure to the user-facing notice
///
/// The notice is never persisted: failed exchanges leave no turns, so the
/// history only contains real user input and real backend replies.
fn render_failure(error: &Error) -> &'static str {
    match error {
        Error::QuotaExhausted(_) => QUOTA_NOTICE,
        _ => FAILURE_NOTICE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_are_normalized() {
        assert_eq!(command_name("/start"), "/start");
        assert_eq!(command_name("/start@courier_bot"), "/start");
        assert_eq!(command_name("/help please"), "/help");
        assert_eq!(command_name(""), "");
    }

    #[test]
    fn captionless_photo_gets_default_prompt() {
        assert_eq!(photo_prompt(""), DEFAULT_PHOTO_PROMPT);
        assert_eq!(photo_prompt("   "), DEFAULT_PHOTO_PROMPT);
        assert_eq!(photo_prompt("what breed is this?"), "what breed is this?");
    }

    #[test]
    fn photo_turns_are_stored_as_text() {
        let text = photo_turn_text("what breed is this?");
        assert!(text.starts_with("[photo]"));
        assert!(text.contains("what breed is this?"));
    }

    #[test]
    fn quota_exhaustion_gets_its_own_notice() {
        let quota = Error::QuotaExhausted("RESOURCE_EXHAUSTED".to_string());
        assert_eq!(render_failure(&quota), QUOTA_NOTICE);

        let other = Error::Backend("boom".to_string());
        assert_eq!(render_failure(&other), FAILURE_NOTICE);
    }

    #[test]
    fn reply_target_parses_platform_ids() {
        let msg = IncomingMessage {
            id: "42".into(),
            chat_id: 1,
            sender_name: "Ada".into(),
            content: "hi".into(),
            photo: None,
        };
        assert_eq!(reply_target(&msg), Some(42));

        let bad = IncomingMessage { id: "x".into(), ..msg };
        assert_eq!(reply_target(&bad), None);
    }

    #[tokio::test]
    async fn user_locks_are_shared_per_user() {
        let pool = crate::db::init_memory().unwrap();
        let history = HistoryRepo::new(pool);
        let context = ContextBuilder::new(history.clone(), 10);
        let backend = GeminiClient::new("key".to_string(), "gemini-2.0-flash".to_string()).unwrap();
        let relay = Relay::new(TelegramChannel::new("tok".to_string()), history, context, backend);

        let a1 = relay.user_lock(1).await;
        let a2 = relay.user_lock(1).await;
        let b = relay.user_lock(2).await;

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
    }
}
