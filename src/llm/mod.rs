//! LLM integration: the parser contract and the chat-completions client

pub mod client;

pub use client::{LlmClient, LlmQueryParser};
