//! LLM: streaming Gemini adapter for the chat assistant.
//!
//! DESIGN
//! ======
//! Callers depend on the [`LlmStream`] trait, not on Gemini. Production uses
//! [`gemini::GeminiFromEnv`], which rereads `GEMINI_API_KEY` per request;
//! tests inject a scripted implementation. Upstream SSE is decoded in
//! [`sse`] into plain text fragments.

pub mod config;
pub mod gemini;
#[cfg(test)]
pub(crate) mod mock;
pub mod sse;
pub mod types;

pub use types::{Content, FragmentStream, GenerateRequest, LlmError, LlmStream, Role};
