//! Context builder for assembling conversation context
//!
//! Translates the stored role vocabulary into the Gemini chat-history
//! vocabulary and guarantees a non-empty context for new conversations.

use crate::db::{HistoryRepo, StoredRole, Turn};
use crate::Result;

/// Marker text for the synthetic seed turn injected into empty histories
pub const SEED_TEXT: &str = "Conversation started";

/// Role vocabulary expected by the generative backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRole {
    User,
    /// Gemini's name for the assistant side of a chat history
    Model,
}

impl BackendRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// Map a stored role to the backend vocabulary
///
/// Total over both stored roles; `assistant` becomes `model`, `user` passes
/// through. Malformed stored roles never reach this function — they are
/// rejected while decoding rows.
const fn map_role(role: StoredRole) -> BackendRole {
    match role {
        StoredRole::User => BackendRole::User,
        StoredRole::Assistant => BackendRole::Model,
    }
}

/// One entry of the context window handed to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTurn {
    pub role: BackendRole,
    pub text: String,
}

/// Builds per-user context windows from the history store
#[derive(Clone)]
pub struct ContextBuilder {
    history: HistoryRepo,
    limit: usize,
}

impl ContextBuilder {
    /// Create a new context builder over a history repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(history: HistoryRepo, limit: usize) -> Self {
        Self { history, limit }
    }

    /// Build the context window for a user
    ///
    /// Returns the user's recent turns in chronological order, re-mapped to
    /// the backend vocabulary. A conversation with no history yields exactly
    /// one synthetic seed turn so the backend always receives a well-formed,
    /// non-empty context.
    ///
    /// # Errors
    ///
    /// Returns error if the history read fails or a stored turn violates the
    /// role contract
    pub fn build_context(&self, user_id: i64) -> Result<Vec<ContextTurn>> {
        let window = self.history.recent_window(user_id, self.limit)?;

        if window.is_empty() {
            tracing::debug!(user_id, "no history, seeding context");
            return Ok(vec![ContextTurn {
                role: BackendRole::Model,
                text: SEED_TEXT.to_string(),
            }]);
        }

        Ok(window.into_iter().map(to_context_turn).collect())
    }
}

fn to_context_turn(turn: Turn) -> ContextTurn {
    ContextTurn {
        role: map_role(turn.role),
        text: turn.content,
    }
}
