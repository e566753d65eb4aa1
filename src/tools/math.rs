//! math.expSum：对一组数求 Σ e^x

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolContext};

#[derive(Debug, Deserialize, JsonSchema)]
struct ExpSumArgs {
    values: Vec<f64>,
}

pub struct ExpSumTool;

#[async_trait]
impl Tool for ExpSumTool {
    fn name(&self) -> &str {
        "math.expSum"
    }

    fn description(&self) -> &str {
        "Sum of e^x over the given values."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ExpSumArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let args: ExpSumArgs = parse_args(args)?;
        let sum: f64 = args.values.iter().map(|v| v.exp()).sum();
        if !sum.is_finite() {
            return Err("result overflowed".to_string());
        }
        Ok(json!(sum))
    }
}
