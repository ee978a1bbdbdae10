//! Context assembly for generative backend calls

mod builder;

pub use builder::{BackendRole, ContextBuilder, ContextTurn, SEED_TEXT};
