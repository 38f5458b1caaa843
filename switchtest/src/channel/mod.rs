//! Line-oriented session plumbing shared by all transports.
//!
//! Switch consoles are prompt-driven: a command is complete when the
//! device's prompt reappears. This module provides the output buffer
//! with tail-search prompt detection and the prompt pattern helpers.

mod buffer;
pub mod patterns;

pub use buffer::PromptBuffer;
pub use patterns::compile_prompt_pattern;
