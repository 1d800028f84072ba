//! LLM client layer.
//!
//! Speaks the OpenAI-compatible chat-completions protocol. The pipeline
//! only ever needs "send these messages, give me the text back", so the
//! surface is one provider trait with one HTTP implementation behind it.

pub mod client;

pub use client::{ChatRequest, ChatResponse, LlmProvider, Message, OpenAiClient, Usage};
