//! Tools the CLI offers the model out of the box.

use std::sync::Arc;

use chrono::{Local, Utc};
use serde_json::json;

use crate::tools::{FnTool, ToolCallPreview, ToolParameters, ToolRegistry, ToolRenderer};

/// Registry with the built-in `current_time` tool.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let renderer: ToolRenderer =
        Arc::new(|_call: &ToolCallPreview<'_>| "checking the clock".to_string());
    registry.register_with_renderer(current_time(), renderer);
    registry
}

pub fn current_time() -> FnTool {
    FnTool::new(
        "current_time",
        "Get the current date and time",
        ToolParameters::object()
            .boolean("utc", "Report UTC instead of local time", false)
            .build(),
        |args, _ctx| async move {
            let utc = args.get_bool("utc").unwrap_or(false);
            let now = if utc {
                Utc::now().to_rfc3339()
            } else {
                Local::now().to_rfc3339()
            };
            Ok(json!({ "now": now }))
        },
    )
}
