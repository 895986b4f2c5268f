//! Tool system for function calling.

pub mod arguments;
pub mod error;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use error::ToolFailure;
pub use registry::{RegisteredTool, ToolCallPreview, ToolRegistry, ToolRenderer};
pub use tool::{FnTool, Tool, ToolExecutionContext};
pub use types::{ParameterBuilder, ToolParameters};
