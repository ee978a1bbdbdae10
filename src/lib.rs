//! Courier Gateway - Telegram relay for Gemini-backed AI chat
//!
//! This library provides the core functionality for the Courier gateway:
//! - Per-user conversation history persistence
//! - Context-window construction for the generative backend
//! - Telegram transport (long polling + Bot API)
//! - Gemini chat and image analysis client
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Telegram                           │
//! │        getUpdates  │  sendMessage  │  getFile       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Courier Gateway                       │
//! │   Relay  │  Context Builder  │  History Store       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │             Gemini (generateContent)                 │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod channels;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod relay;

pub use backend::GeminiClient;
pub use channels::{IncomingMessage, TelegramChannel};
pub use config::Config;
pub use context::{BackendRole, ContextBuilder, ContextTurn, SEED_TEXT};
pub use db::{DbConn, DbPool, HistoryRepo, StoredRole, Turn};
pub use error::{Error, Result};
pub use relay::Relay;
