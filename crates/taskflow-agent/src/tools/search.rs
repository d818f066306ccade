//! Tool `search`: placeholder web search.
//!
//! No search backend is wired in; the tool answers with a fixed notice so
//! the model can tell the user instead of inventing results.

use async_trait::async_trait;

use super::{ParamKind, Tool, ToolArgs, ToolResult, ToolSchema};

const DEFAULT_LIMIT: i64 = 5;

pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web for a query."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("query", ParamKind::String, "Search query.")
            .optional("limit", ParamKind::Integer, "Maximum number of results.")
    }

    async fn execute(&self, args: &ToolArgs) -> ToolResult {
        let query = args.str("query").unwrap_or_default().trim();
        if query.is_empty() {
            return ToolResult::error("query must not be empty");
        }
        let limit = args.i64("limit").unwrap_or(DEFAULT_LIMIT);
        if limit < 1 {
            return ToolResult::error("limit must be at least 1");
        }
        ToolResult::success(format!(
            "No results for \"{query}\": web search is not available on this server."
        ))
    }
}
