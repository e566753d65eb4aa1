//! 工具参数的 JSON Schema 生成与解析
//!
//! 参数结构体派生 JsonSchema，由 schemars 生成 `parameters_schema`，拼入 prompt 的工具目录。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 返回参数结构体的 JSON Schema
pub fn args_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

/// 把 TOOL_CALL 的 args 解析为参数结构体；null 视为空对象
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, String> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| format!("Invalid args: {}", e))
}
