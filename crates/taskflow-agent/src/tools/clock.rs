//! Tool `current_time`: current date and time in UTC or a fixed offset.

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};

use super::{ParamKind, Tool, ToolArgs, ToolResult, ToolSchema};

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time as RFC 3339. Optionally shift by a UTC \
         offset in minutes."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new().optional(
            "utc_offset_minutes",
            ParamKind::Integer,
            "Offset from UTC in minutes, e.g. 120 or -300.",
        )
    }

    async fn execute(&self, args: &ToolArgs) -> ToolResult {
        let now = Utc::now();
        match args.i64("utc_offset_minutes") {
            None => ToolResult::success(now.to_rfc3339()),
            Some(minutes) => {
                let offset = i32::try_from(minutes)
                    .ok()
                    .and_then(|m| m.checked_mul(60))
                    .and_then(FixedOffset::east_opt);
                match offset {
                    Some(offset) => ToolResult::success(now.with_timezone(&offset).to_rfc3339()),
                    None => ToolResult::error(format!("invalid UTC offset: {minutes} minutes")),
                }
            }
        }
    }
}
