//! Core types for colloquy.

pub mod completion;
pub mod generation;
pub mod message;

pub use completion::*;
pub use generation::*;
pub use message::*;
