//! Command-line argument parsing for BuddyRAG
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::errors::Result;

/// BuddyRAG - conversational question answering over a passage index
#[derive(Parser, Debug)]
#[command(name = "buddyrag")]
#[command(version)]
#[command(about = "Session-aware question answering over a handbook index", long_about = None)]
pub struct Args {
    /// Configuration file path (~/.buddyrag/config.toml by default)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON passage export to answer from
    #[arg(long, global = true)]
    pub index: Option<PathBuf>,

    /// Directory for JSONL transcripts; disabled when not set
    #[arg(long, global = true)]
    pub transcripts: Option<PathBuf>,

    /// Configured model to answer with, overriding llm.model
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Verbosity: -v (debug), -vv (trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question
    Ask {
        /// Session the question belongs to
        #[arg(long, default_value = "default")]
        session: String,

        /// User asking the question
        #[arg(long, default_value = "local")]
        user: String,

        #[arg(value_name = "QUESTION")]
        question: String,
    },

    /// Start an interactive conversation
    Chat {
        /// Session to resume; a fresh one is started when omitted
        #[arg(long)]
        session: Option<String>,

        #[arg(long, default_value = "local")]
        user: String,
    },

    /// Display the effective configuration
    Config,
}

impl Args {
    /// Load the configuration and apply command-line overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_or_create(path)?,
            None => Config::load()?,
        };

        match self.verbose {
            0 => {}
            1 => config.logging.level = "debug".to_string(),
            _ => config.logging.level = "trace".to_string(),
        }

        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Passage index path, required by the question-answering commands
    pub fn index_path(&self) -> Result<&PathBuf> {
        self.index.as_ref().ok_or_else(|| {
            crate::errors::RagError::Config("--index <FILE> is required to answer questions".to_string())
        })
    }
}
