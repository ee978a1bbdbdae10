//! Generative backend client

mod gemini;

pub use gemini::GeminiClient;
