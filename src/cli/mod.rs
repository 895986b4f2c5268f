//! CLI entry point for colloquy.

pub mod render;
pub mod tools;

use clap::{Parser, Subcommand};

use crate::types::{ChatOptions, ToolProtocol, DEFAULT_MAX_TURNS};

/// Talk to a chat model from the terminal.
#[derive(Parser, Debug)]
#[command(name = "colloquy", version, about = "Conversational tool-calling client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with a model (interactive when no prompt is given)
    Chat(ChatArgs),
    /// Show where configuration is read from and whether a key resolves
    Config,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model id (defaults to the configured model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Max tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Request full completions instead of streaming
    #[arg(long)]
    pub no_stream: bool,

    /// Offer tools through the single-call `functions` protocol
    #[arg(long)]
    pub legacy_functions: bool,

    /// Maximum request/response cycles per prompt
    #[arg(long, default_value_t = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,

    /// User prompt (positional)
    pub prompt: Option<String>,
}

impl ChatArgs {
    /// Conversation options for these arguments. `fallback_model` is used
    /// when `--model` is absent.
    pub fn chat_options(&self, fallback_model: Option<&str>) -> ChatOptions {
        let mut options = ChatOptions::builder()
            .stream(!self.no_stream)
            .max_turns(self.max_turns)
            .maybe_max_tokens(self.max_tokens)
            .protocol(if self.legacy_functions {
                ToolProtocol::LegacyFunctions
            } else {
                ToolProtocol::Tools
            })
            .build();
        if let Some(model) = self.model.as_deref().or(fallback_model) {
            options.model = model.to_string();
        }
        if let Some(t) = self.temperature {
            options.temperature = t;
        }
        options
    }
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
