//! colloquy: streaming chat orchestration with tool calling.
//!
//! Talks to any OpenAI-compatible chat completions API, reassembles streamed
//! assistant turns (text plus incrementally streamed tool calls), runs the
//! requested tools and keeps the exchange going until the model stops.
//!
//! # Quick Start
//!
//! ```no_run
//! use colloquy::prelude::*;
//! use serde_json::json;
//!
//! # async fn example() -> colloquy::Result<()> {
//! let config = ColloquyConfig::load()?;
//! let mut chat = Chat::new(&config)?;
//! chat.register_fn(
//!     "add",
//!     "Add two integers",
//!     ToolParameters::object()
//!         .integer("x", "left", true)
//!         .integer("y", "right", true)
//!         .build(),
//!     |args, _ctx| async move { Ok(json!(args.get_i64("x")? + args.get_i64("y")?)) },
//! );
//! chat.submit(["What is 1 + 2?"]).await?;
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{ColloquyError, Result};
