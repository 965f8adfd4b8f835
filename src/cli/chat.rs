//! Interactive chat input
//!
//! Reads lines with rustyline and splits them into slash commands and questions.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

/// A line typed at the chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Ask(String),
    /// Clear the current session's history and cache
    Reset,
    /// Switch to another session id
    Switch(String),
    /// Answer with another configured model from now on
    Model(String),
    /// List configured models
    Models,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatCommand::Empty;
        }
        if !line.starts_with('/') {
            return ChatCommand::Ask(line.to_string());
        }

        let mut parts = line.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        let argument = parts.next().map(str::trim).unwrap_or_default();

        match command {
            "/reset" => ChatCommand::Reset,
            "/session" if !argument.is_empty() => ChatCommand::Switch(argument.to_string()),
            "/model" if !argument.is_empty() => ChatCommand::Model(argument.to_string()),
            "/model" | "/models" => ChatCommand::Models,
            "/help" => ChatCommand::Help,
            "/quit" | "/exit" => ChatCommand::Quit,
            _ => ChatCommand::Unknown(line.to_string()),
        }
    }
}

/// Line editor with optional persistent history
pub struct ChatInput {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
}

impl ChatInput {
    pub fn new(history_path: Option<PathBuf>) -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        if let Some(path) = &history_path {
            if path.exists() {
                let _ = editor.load_history(path);
            }
        }

        Ok(Self { editor, history_path })
    }

    /// Read one command; Ctrl-D and Ctrl-C both end the chat
    pub fn read(&mut self, prompt: &str) -> Result<ChatCommand> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let _ = self.editor.add_history_entry(trimmed);
                }
                Ok(ChatCommand::parse(trimmed))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(ChatCommand::Quit),
            Err(err) => Err(anyhow::anyhow!("Readline error: {}", err)),
        }
    }

    pub fn save_history(&mut self) -> Result<()> {
        if let Some(path) = &self.history_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.editor.save_history(path)?;
        }
        Ok(())
    }
}

/// Default history file under the user's home directory
pub fn default_history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".buddyrag").join("chat_history"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_questions_and_commands() {
        assert_eq!(
            ChatCommand::parse("  What is the tuition fee? "),
            ChatCommand::Ask("What is the tuition fee?".to_string())
        );
        assert_eq!(ChatCommand::parse("/reset"), ChatCommand::Reset);
        assert_eq!(ChatCommand::parse("/session  s2 "), ChatCommand::Switch("s2".to_string()));
        assert_eq!(
            ChatCommand::parse("/model llama3.2:latest"),
            ChatCommand::Model("llama3.2:latest".to_string())
        );
        assert_eq!(ChatCommand::parse("/model"), ChatCommand::Models);
        assert_eq!(ChatCommand::parse("/models"), ChatCommand::Models);
        assert_eq!(ChatCommand::parse("/quit"), ChatCommand::Quit);
        assert_eq!(ChatCommand::parse("/exit"), ChatCommand::Quit);
        assert_eq!(ChatCommand::parse(""), ChatCommand::Empty);
    }

    #[test]
    fn test_parse_rejects_incomplete_commands() {
        assert_eq!(ChatCommand::parse("/session"), ChatCommand::Unknown("/session".to_string()));
        assert_eq!(ChatCommand::parse("/dance"), ChatCommand::Unknown("/dance".to_string()));
    }

    #[test]
    fn test_chat_input_saves_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history");
        let mut input = ChatInput::new(Some(path.clone())).unwrap();
        input.save_history().unwrap();
        assert!(path.exists());
    }
}
