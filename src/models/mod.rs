//! Well-known chat model identifiers.
//!
//! Any model id accepted by the completion service can be used; these are
//! only the ones the crate refers to by name.

pub const GPT_3_5_TURBO: &str = "gpt-3.5-turbo";
pub const GPT_4: &str = "gpt-4";
pub const GPT_4_TURBO: &str = "gpt-4-turbo";
pub const GPT_4O: &str = "gpt-4o";
pub const GPT_4O_MINI: &str = "gpt-4o-mini";

/// Model used when neither options nor configuration name one.
pub const DEFAULT_MODEL: &str = GPT_4O_MINI;
