//! LLM Provider implementations for RoomScout.
//!
//! All providers implement the `roomscout_core::Provider` trait.

pub mod anthropic;

pub use anthropic::AnthropicProvider;
