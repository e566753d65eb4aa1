//! 各 Agent 的回复结构与收窄谓词
//!
//! LLM 返回的 JSON 先经 `narrow::<T>()` 收窄为具体结构，失败即拒收（Agent 随后输出 CRITIQUE）。
//! 控制字段（control / nextAgent / tool）与载荷分开解析，见 `ControlEnvelope`。
//! 结构同时派生 JsonSchema，供 prompt 注入「合法回复」的格式说明。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::ToolRequest;

/// 收窄：仅当候选值是对象且满足 T 的结构时返回 Some
pub fn narrow<T: DeserializeOwned>(candidate: &Value) -> Option<T> {
    if !candidate.is_object() {
        return None;
    }
    serde_json::from_value(candidate.clone()).ok()
}

/// 返回 T 的 JSON Schema 字符串，可拼入 prompt
pub fn schema_json<T: JsonSchema>() -> String {
    let schema = schema_for!(T);
    serde_json::to_string(&schema).unwrap_or_default()
}

/// 载荷自带的控制标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Control {
    PlanStep,
    ToolCall,
    AgentCall,
    FinalAnswer,
    Critique,
    #[serde(other)]
    Other,
}

/// TOOL_CALL 载荷中的工具描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl From<ToolSpec> for ToolRequest {
    fn from(spec: ToolSpec) -> Self {
        ToolRequest::new(spec.name, spec.args)
    }
}

/// 与载荷并列的控制字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlEnvelope {
    pub control: Option<Control>,
    pub next_agent: Option<String>,
    pub tool: Option<ToolSpec>,
}

impl ControlEnvelope {
    /// 三个字段各自解析：某个字段类型不符只让该字段缺省
    pub fn read(candidate: &Value) -> Self {
        Self {
            control: candidate
                .get("control")
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            next_agent: candidate
                .get("nextAgent")
                .and_then(Value::as_str)
                .map(str::to_string),
            tool: candidate.get("tool").and_then(narrow),
        }
    }
}

/// Router 的路由决策
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouterDecision {
    /// TASK_PLANNING / CONTENT_REQUEST / ANALYSIS_REQUEST / LEARNING_UPDATE / UNKNOWN
    pub intent: String,
    pub route_to: String,
    /// 0..1
    pub confidence: f64,
    pub rationale: String,
}

/// SMART 任务计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SmartTaskPlan {
    pub task: String,
    pub why: String,
    pub category: String,
    pub duration_minutes: f64,
    #[serde(rename = "deadlineIST", default, skip_serializing_if = "Option::is_none")]
    pub deadline_ist: Option<String>,
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentSection {
    pub heading: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CodeExample {
    pub language: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// ContentCreator 产出的笔记
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentOutput {
    pub title: String,
    pub sections: Vec<ContentSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_examples: Option<Vec<CodeExample>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisOutput {
    pub insights: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trends: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

/// 学习到的用户偏好 / 技能 / 笔记（全部可选）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LearningUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeedbackSummary {
    /// positive / neutral / negative
    pub sentiment: String,
    /// 0..1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satisfaction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InteractionPlan {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_ups: Option<Vec<String>>,
}

/// 简单对话 Agent 的决策（按 control 区分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "control", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatDecision {
    ToolCall {
        tool: ToolSpec,
    },
    FinalAnswer {
        message: String,
        #[serde(default)]
        valid: Option<bool>,
        #[serde(default)]
        violations: Vec<String>,
    },
    Critique {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        violations: Vec<String>,
    },
}

pub fn is_router_decision(candidate: &Value) -> bool {
    narrow::<RouterDecision>(candidate).is_some()
}

pub fn is_smart_task_plan(candidate: &Value) -> bool {
    narrow::<SmartTaskPlan>(candidate).is_some()
}

pub fn is_content_output(candidate: &Value) -> bool {
    narrow::<ContentOutput>(candidate).is_some()
}

pub fn is_analysis_output(candidate: &Value) -> bool {
    narrow::<AnalysisOutput>(candidate).is_some()
}

pub fn is_validation_result(candidate: &Value) -> bool {
    narrow::<ValidationResult>(candidate).is_some()
}

pub fn is_learning_update(candidate: &Value) -> bool {
    narrow::<LearningUpdate>(candidate).is_some()
}

pub fn is_feedback_summary(candidate: &Value) -> bool {
    narrow::<FeedbackSummary>(candidate).is_some()
}

pub fn is_interaction_plan(candidate: &Value) -> bool {
    narrow::<InteractionPlan>(candidate).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_router_decision_predicate() {
        let ok = json!({"intent": "TASK_PLANNING", "routeTo": "TASK_PLANNER", "confidence": 0.9, "rationale": "r"});
        assert!(is_router_decision(&ok));
        let missing = json!({"intent": "TASK_PLANNING", "routeTo": "TASK_PLANNER", "rationale": "r"});
        assert!(!is_router_decision(&missing));
        let wrong_type = json!({"intent": "X", "routeTo": 3, "confidence": 0.9, "rationale": "r"});
        assert!(!is_router_decision(&wrong_type));
    }

    #[test]
    fn test_smart_plan_predicate() {
        let ok = json!({"task": "t", "why": "w", "category": "work", "durationMinutes": 30, "steps": []});
        assert!(is_smart_task_plan(&ok));
        let bad = json!({"task": "t", "why": "w", "category": "work", "durationMinutes": "30", "steps": []});
        assert!(!is_smart_task_plan(&bad));
        assert!(!is_smart_task_plan(&json!({"task": "t", "why": "w", "category": "c", "durationMinutes": 1})));
    }

    #[test]
    fn test_other_predicates() {
        assert!(is_content_output(&json!({"title": "T", "sections": []})));
        assert!(!is_content_output(&json!({"title": "T"})));
        assert!(is_analysis_output(&json!({"insights": ["a"]})));
        assert!(!is_analysis_output(&json!({"insights": "a"})));
        assert!(is_validation_result(&json!({"ok": false, "severity": "warn"})));
        assert!(!is_validation_result(&json!({"ok": "yes"})));
        assert!(is_learning_update(&json!({})));
        assert!(!is_learning_update(&json!([])));
        assert!(is_feedback_summary(&json!({"sentiment": "positive"})));
        assert!(!is_feedback_summary(&json!({"satisfaction": 1.0})));
        assert!(is_interaction_plan(&json!({"prompt": "hi", "followUps": ["x"]})));
        assert!(!is_interaction_plan(&json!({"persona": "coach"})));
    }

    #[test]
    fn test_narrow_rejects_non_objects() {
        assert!(narrow::<LearningUpdate>(&json!(null)).is_none());
        assert!(narrow::<LearningUpdate>(&json!("x")).is_none());
    }

    #[test]
    fn test_control_envelope() {
        let env = ControlEnvelope::read(&json!({
            "control": "TOOL_CALL",
            "tool": {"name": "todos.add", "args": {"text": "x"}}
        }));
        assert_eq!(env.control, Some(Control::ToolCall));
        assert_eq!(env.tool.unwrap().name, "todos.add");

        let unknown = ControlEnvelope::read(&json!({"control": "DANCE"}));
        assert_eq!(unknown.control, Some(Control::Other));

        let broken = ControlEnvelope::read(&json!({"control": 5}));
        assert_eq!(broken, ControlEnvelope::default());
    }

    #[test]
    fn test_control_envelope_fields_are_independent() {
        let env = ControlEnvelope::read(&json!({"control": "FINAL_ANSWER", "tool": 5}));
        assert_eq!(env.control, Some(Control::FinalAnswer));
        assert!(env.tool.is_none());

        let env = ControlEnvelope::read(&json!({"control": "AGENT_CALL", "nextAgent": 3}));
        assert_eq!(env.control, Some(Control::AgentCall));
        assert!(env.next_agent.is_none());

        let env = ControlEnvelope::read(&json!({
            "control": 7,
            "nextAgent": "ANALYSIS",
            "tool": {"name": "todos.list"}
        }));
        assert!(env.control.is_none());
        assert_eq!(env.next_agent.as_deref(), Some("ANALYSIS"));
        assert_eq!(env.tool.unwrap().name, "todos.list");

        assert_eq!(ControlEnvelope::read(&json!("FINAL_ANSWER")), ControlEnvelope::default());
    }

    #[test]
    fn test_chat_decision_shapes() {
        let call: ChatDecision = serde_json::from_value(json!({
            "control": "TOOL_CALL", "tool": {"name": "todos.add", "args": {"text": "x"}}
        }))
        .unwrap();
        assert!(matches!(call, ChatDecision::ToolCall { .. }));
        let answer: ChatDecision =
            serde_json::from_value(json!({"control": "FINAL_ANSWER", "message": "hi"})).unwrap();
        assert!(matches!(answer, ChatDecision::FinalAnswer { valid: None, .. }));
    }

    #[test]
    fn test_schema_json_mentions_fields() {
        let s = schema_json::<RouterDecision>();
        assert!(s.contains("routeTo"));
    }
}
