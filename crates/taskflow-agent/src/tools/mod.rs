//! Tool system for inline tool calls.
//!
//! Defines the `Tool` trait, typed argument schemas validated at the call
//! boundary, and an immutable registry built once at startup.

pub mod cache;
pub mod calculator;
pub mod clock;
pub mod marker;
pub mod search;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use self::cache::ToolCache;

/// Result of executing a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text content returned to the model and the client.
    pub content: String,
    /// Whether the tool execution failed.
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// Payload inside a `<tool>...</tool>` marker.
///
/// Wire: `{"tool": "calculate", "arguments": {"expression": "2+2"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
}

impl ParamKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Object => value.is_object(),
        }
    }

    fn json_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
            ParamKind::Object => "object",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

/// Parameter descriptor for one tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSchema {
    pub params: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            kind,
            required: true,
            description,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            kind,
            required: false,
            description,
        });
        self
    }

    /// Check raw JSON against the schema. `null` counts as "no arguments".
    /// Unknown keys are rejected.
    pub fn validate(&self, tool: &str, raw: &Value) -> Result<ToolArgs, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason,
        };

        let map = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => return Err(invalid(format!("expected an object, got {other}"))),
        };

        for key in map.keys() {
            if !self.params.iter().any(|p| p.name == key) {
                return Err(invalid(format!("unexpected argument '{key}'")));
            }
        }

        for param in &self.params {
            match map.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(invalid(format!("missing required argument '{}'", param.name)));
                }
                Some(value) if !value.is_null() && !param.kind.accepts(value) => {
                    return Err(invalid(format!(
                        "argument '{}' must be a {}",
                        param.name, param.kind
                    )));
                }
                _ => {}
            }
        }

        Ok(ToolArgs(map))
    }

    /// JSON Schema form, used in the tool prompt.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            properties.insert(
                p.name.to_string(),
                serde_json::json!({ "type": p.kind.json_type(), "description": p.description }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        serde_json::json!({ "type": "object", "properties": properties, "required": required })
    }
}

/// Arguments that already passed [`ToolSchema::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name for this tool (e.g. "calculate").
    fn name(&self) -> &str;
    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;
    fn schema(&self) -> ToolSchema;
    /// Same arguments always give the same result, so results may be cached.
    fn deterministic(&self) -> bool {
        false
    }
    async fn execute(&self, args: &ToolArgs) -> ToolResult;
}

/// Immutable name → tool map, shared by `Arc`.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
    cache: Option<ToolCache>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Calculator, search stub and clock, with results cached for `cache_ttl`.
    pub fn builtin(cache_ttl: Duration) -> Self {
        Self::builder()
            .register(calculator::CalculatorTool)
            .register(search::SearchTool)
            .register(clock::CurrentTimeTool)
            .cache_ttl(cache_ttl)
            .build()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Validate and run a call. Deterministic tools are served from cache.
    pub async fn try_call(&self, call: &ToolCallRequest) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.tool)
            .ok_or_else(|| ToolError::UnknownTool(call.tool.clone()))?;
        let args = tool.schema().validate(&call.tool, &call.arguments)?;

        let cache = self.cache.as_ref().filter(|_| tool.deterministic());
        let key = ToolCache::key(&call.tool, &args);
        if let Some(hit) = cache.and_then(|c| c.get(&key)) {
            debug!(tool = %call.tool, "tool cache hit");
            return Ok(hit);
        }

        debug!(tool = %call.tool, "executing tool");
        let result = tool.execute(&args).await;
        if let Some(cache) = cache {
            if !result.is_error {
                cache.insert(key, result.clone());
            }
        }
        Ok(result)
    }

    /// Like [`ToolRegistry::try_call`], with boundary failures folded into an error result.
    pub async fn call(&self, call: &ToolCallRequest) -> ToolResult {
        match self.try_call(call).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    /// System prompt that teaches the model the inline marker syntax.
    pub fn prompt(&self) -> String {
        let mut out = String::from(
            "You can call tools. To call one, write exactly:\n\
             <tool>{\"tool\": \"<name>\", \"arguments\": {...}}</tool>\n\
             The result will be appended after the marker.\n\nAvailable tools:\n",
        );
        for name in &self.order {
            if let Some(tool) = self.tools.get(name) {
                out.push_str(&format!(
                    "- {}: {} Arguments: {}\n",
                    name,
                    tool.description(),
                    tool.schema().to_json_schema()
                ));
            }
        }
        out
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
    cache_ttl: Option<Duration>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl).filter(|t| !t.is_zero());
        self
    }

    /// Later registrations with the same name replace earlier ones.
    pub fn build(self) -> ToolRegistry {
        let mut tools = HashMap::new();
        let mut order = Vec::new();
        for tool in self.tools {
            let name = tool.name().to_string();
            if tools.insert(name.clone(), tool).is_none() {
                order.push(name);
            }
        }
        ToolRegistry {
            tools,
            order,
            cache: self.cache_ttl.map(ToolCache::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn schema() -> ToolSchema {
        ToolSchema::new()
            .required("expression", ParamKind::String, "expr")
            .optional("precision", ParamKind::Integer, "digits")
    }

    #[test]
    fn validate_accepts_well_typed_args() {
        let args = schema()
            .validate("calc", &json!({"expression": "1+1", "precision": 2}))
            .unwrap();
        assert_eq!(args.str("expression"), Some("1+1"));
        assert_eq!(args.i64("precision"), Some(2));
    }

    #[test]
    fn validate_rejects_bad_shapes() {
        let s = schema();
        assert!(s.validate("calc", &json!({})).is_err());
        assert!(s.validate("calc", &json!({"expression": 5})).is_err());
        assert!(s.validate("calc", &json!({"expression": "1", "precision": 1.5})).is_err());
        assert!(s.validate("calc", &json!({"expression": "1", "extra": true})).is_err());
        assert!(s.validate("calc", &json!(["1+1"])).is_err());
    }

    #[test]
    fn null_means_no_arguments() {
        let s = ToolSchema::new().optional("tz", ParamKind::String, "zone");
        assert!(s.validate("clock", &Value::Null).is_ok());
    }

    struct Counting(Arc<AtomicU32>);

    #[async_trait]
    impl Tool for Counting {
        fn name(&self) -> &str {
            "count"
        }
        fn description(&self) -> &str {
            "counts calls"
        }
        fn schema(&self) -> ToolSchema {
            ToolSchema::new().required("x", ParamKind::Number, "x")
        }
        fn deterministic(&self) -> bool {
            true
        }
        async fn execute(&self, args: &ToolArgs) -> ToolResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            ToolResult::success(format!("{}", args.f64("x").unwrap_or_default()))
        }
    }

    #[tokio::test]
    async fn deterministic_results_are_cached() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = ToolRegistry::builder()
            .register(Counting(Arc::clone(&calls)))
            .cache_ttl(Duration::from_secs(60))
            .build();

        let call = ToolCallRequest {
            tool: "count".into(),
            arguments: json!({"x": 3}),
        };
        assert_eq!(registry.call(&call).await.content, "3");
        assert_eq!(registry.call(&call).await.content, "3");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_results_do_not_accumulate() {
        let registry = ToolRegistry::builtin(Duration::from_millis(1));
        for i in 0..1000 {
            let call = ToolCallRequest {
                tool: "calculate".into(),
                arguments: json!({"expression": format!("{i} + 1")}),
            };
            assert!(!registry.call(&call).await.is_error);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        let call = ToolCallRequest {
            tool: "calculate".into(),
            arguments: json!({"expression": "2 + 2"}),
        };
        assert_eq!(registry.call(&call).await.content, "4");
        assert_eq!(registry.cache.as_ref().map(ToolCache::len), Some(1));
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_args_become_error_results() {
        let registry = ToolRegistry::builtin(Duration::from_secs(60));
        let unknown = registry
            .call(&ToolCallRequest {
                tool: "rm_rf".into(),
                arguments: Value::Null,
            })
            .await;
        assert!(unknown.is_error);
        assert!(unknown.content.contains("unknown tool"));

        let bad = registry
            .try_call(&ToolCallRequest {
                tool: "calculate".into(),
                arguments: json!({"expression": 4}),
            })
            .await;
        assert!(matches!(bad, Err(ToolError::InvalidArguments { .. })));
    }

    #[test]
    fn builtin_prompt_lists_every_tool() {
        let registry = ToolRegistry::builtin(Duration::ZERO);
        assert_eq!(registry.names(), ["calculate", "search", "current_time"]);
        let prompt = registry.prompt();
        for name in registry.names() {
            assert!(prompt.contains(name.as_str()));
        }
        assert!(prompt.contains("<tool>"));
    }
}
