//! CLI module for BuddyRAG
//!
//! Handles command-line argument parsing and chat input.

pub mod args;
pub mod chat;

pub use args::{Args, Commands};
pub use chat::{ChatCommand, ChatInput};
