//! Agent 输出协议：所有 Agent 与编排器共享的数据契约
//!
//! - `AgentKind`：角色标识（枚举，LLM 给出的未知名称落入 `Unknown`）
//! - `AgentInput` / `AgentContext`：每一跳的不可变输入快照，按「克隆后合并」方式推进
//! - `AgentOutput`：带标签的联合体，`nextAgent` 只可能出现在 AGENT_CALL / PLAN_STEP 上
//! - `AgentTrace` / `ToolCallTrace`：追踪记录，创建后不再修改

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::tools::ToolContext;

/// 当前毫秒时间戳（墙钟）
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Agent 角色；序列化为 `TASK_PLANNER` 这类大写名称
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentKind {
    Orchestrator,
    Router,
    TaskPlanner,
    ContentCreator,
    Analysis,
    Learning,
    Validation,
    Monitoring,
    Interaction,
    Feedback,
    SimpleChat,
    /// LLM 路由给出的、没有对应实现的名称（原样保留，用于报错）
    Unknown(String),
}

impl AgentKind {
    pub fn as_str(&self) -> &str {
        match self {
            AgentKind::Orchestrator => "ORCHESTRATOR",
            AgentKind::Router => "ROUTER",
            AgentKind::TaskPlanner => "TASK_PLANNER",
            AgentKind::ContentCreator => "CONTENT_CREATOR",
            AgentKind::Analysis => "ANALYSIS",
            AgentKind::Learning => "LEARNING",
            AgentKind::Validation => "VALIDATION",
            AgentKind::Monitoring => "MONITORING",
            AgentKind::Interaction => "INTERACTION",
            AgentKind::Feedback => "FEEDBACK",
            AgentKind::SimpleChat => "SIMPLE_CHAT",
            AgentKind::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AgentKind::Unknown(_))
    }
}

impl From<&str> for AgentKind {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ORCHESTRATOR" => AgentKind::Orchestrator,
            "ROUTER" => AgentKind::Router,
            "TASK_PLANNER" => AgentKind::TaskPlanner,
            "CONTENT_CREATOR" => AgentKind::ContentCreator,
            "ANALYSIS" => AgentKind::Analysis,
            "LEARNING" => AgentKind::Learning,
            "VALIDATION" => AgentKind::Validation,
            "MONITORING" => AgentKind::Monitoring,
            "INTERACTION" => AgentKind::Interaction,
            "FEEDBACK" => AgentKind::Feedback,
            "SIMPLE_CHAT" => AgentKind::SimpleChat,
            _ => AgentKind::Unknown(raw.to_string()),
        }
    }
}

impl From<String> for AgentKind {
    fn from(raw: String) -> Self {
        AgentKind::from(raw.as_str())
    }
}

impl From<AgentKind> for String {
    fn from(kind: AgentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对话消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// 简单对话中的一条消息（工具结果以 system 消息的形式回灌）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, text: text.into(), timestamp: None }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, text: text.into(), timestamp: None }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self { role: ChatRole::System, text: text.into(), timestamp: None }
    }
}

/// 工具执行结果（写入上下文的 `toolResult` 字段）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub result: Value,
}

/// 一次编排运行中逐跳累积的上下文
///
/// 每个流水线阶段一个可选字段，其余调用方自带的键进入 `extra`。
/// 合并按键「后写覆盖」，重复合并同一内容不会产生变化。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversation: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub executed_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentContext {
    /// 将某角色的产出写入其对应字段（如 TASK_PLANNER -> plan）
    pub fn merge(&mut self, kind: &AgentKind, content: Value) {
        let slot = match kind {
            AgentKind::Router => &mut self.route,
            AgentKind::TaskPlanner => &mut self.plan,
            AgentKind::ContentCreator => &mut self.content,
            AgentKind::Analysis => &mut self.analysis,
            AgentKind::Validation => &mut self.validation,
            AgentKind::Feedback => &mut self.feedback,
            AgentKind::Learning => &mut self.learning,
            AgentKind::Interaction => &mut self.interaction,
            AgentKind::Monitoring => &mut self.monitoring,
            AgentKind::SimpleChat => &mut self.chat,
            AgentKind::Orchestrator | AgentKind::Unknown(_) => {
                self.extra.insert(kind.as_str().to_lowercase(), content);
                return;
            }
        };
        *slot = Some(content);
    }

    /// 序列化为 JSON（供 prompt 使用）；失败时退化为空对象
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

/// Agent 输入：每次编排调用新建，之后每一跳都「克隆 + 合并」，从不原地修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInput {
    pub user_id: String,
    pub session_id: String,
    pub goal: String,
    #[serde(default)]
    pub context: AgentContext,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<AgentTrace>,
}

impl AgentInput {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        goal: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            goal: goal.into(),
            context: AgentContext::default(),
            history: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: AgentContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_history(mut self, history: Vec<AgentTrace>) -> Self {
        self.history = history;
        self
    }

    /// 返回合并了某角色产出的新输入
    pub fn merged(&self, kind: &AgentKind, content: Value) -> Self {
        let mut next = self.clone();
        next.context.merge(kind, content);
        next
    }

    /// 返回带工具结果的新输入：`toolResult` 写入上下文，并追加一条代表上一轮 TOOL_CALL 的历史
    pub fn with_tool_result(&self, name: &str, result: Value, prior: AgentTrace) -> Self {
        let mut next = self.clone();
        next.context.tool_result = Some(ToolResult {
            name: name.to_string(),
            result,
        });
        next.history.push(prior);
        next
    }

    /// 去掉历史的快照（写入追踪时使用，避免历史层层嵌套）
    pub fn snapshot(&self) -> Self {
        Self {
            history: Vec::new(),
            ..self.clone()
        }
    }

    pub fn tool_context(&self) -> ToolContext {
        ToolContext {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// TOOL_CALL 的载荷：`{"name": "...", "args": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// 控制标签（只用于日志与统计）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    PlanStep,
    ToolCall,
    AgentCall,
    FinalAnswer,
    Critique,
    NoOp,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::PlanStep => "PLAN_STEP",
            OutputKind::ToolCall => "TOOL_CALL",
            OutputKind::AgentCall => "AGENT_CALL",
            OutputKind::FinalAnswer => "FINAL_ANSWER",
            OutputKind::Critique => "CRITIQUE",
            OutputKind::NoOp => "NO_OP",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent 输出：恰好一个标签有效；`nextAgent` 只存在于 AGENT_CALL（必填）与 PLAN_STEP（可选）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentOutput {
    PlanStep {
        content: Value,
        #[serde(rename = "nextAgent", default, skip_serializing_if = "Option::is_none")]
        next_agent: Option<AgentKind>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    ToolCall {
        content: ToolRequest,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    AgentCall {
        content: Value,
        #[serde(rename = "nextAgent")]
        next_agent: AgentKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    FinalAnswer {
        content: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    Critique {
        content: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    NoOp {
        content: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
}

impl AgentOutput {
    pub fn final_answer(content: Value) -> Self {
        AgentOutput::FinalAnswer { content, summary: None }
    }

    /// CRITIQUE：内容固定为 `{"error": message}`
    pub fn critique(message: impl fmt::Display) -> Self {
        AgentOutput::Critique {
            content: json!({ "error": message.to_string() }),
            summary: None,
        }
    }

    pub fn plan_step(content: Value, next_agent: Option<AgentKind>) -> Self {
        AgentOutput::PlanStep { content, next_agent, summary: None }
    }

    pub fn agent_call(next_agent: AgentKind, content: Value) -> Self {
        AgentOutput::AgentCall { content, next_agent, summary: None }
    }

    pub fn tool_call(request: ToolRequest) -> Self {
        AgentOutput::ToolCall { content: request, summary: None }
    }

    pub fn no_op(content: Value) -> Self {
        AgentOutput::NoOp { content, summary: None }
    }

    pub fn with_summary(mut self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match &mut self {
            AgentOutput::PlanStep { summary, .. }
            | AgentOutput::ToolCall { summary, .. }
            | AgentOutput::AgentCall { summary, .. }
            | AgentOutput::FinalAnswer { summary, .. }
            | AgentOutput::Critique { summary, .. }
            | AgentOutput::NoOp { summary, .. } => *summary = text,
        }
        self
    }

    pub fn kind(&self) -> OutputKind {
        match self {
            AgentOutput::PlanStep { .. } => OutputKind::PlanStep,
            AgentOutput::ToolCall { .. } => OutputKind::ToolCall,
            AgentOutput::AgentCall { .. } => OutputKind::AgentCall,
            AgentOutput::FinalAnswer { .. } => OutputKind::FinalAnswer,
            AgentOutput::Critique { .. } => OutputKind::Critique,
            AgentOutput::NoOp { .. } => OutputKind::NoOp,
        }
    }

    /// 载荷（对编排器不透明）；TOOL_CALL 返回序列化后的请求
    pub fn content(&self) -> Value {
        match self {
            AgentOutput::ToolCall { content, .. } => {
                serde_json::to_value(content).unwrap_or(Value::Null)
            }
            AgentOutput::PlanStep { content, .. }
            | AgentOutput::AgentCall { content, .. }
            | AgentOutput::FinalAnswer { content, .. }
            | AgentOutput::Critique { content, .. }
            | AgentOutput::NoOp { content, .. } => content.clone(),
        }
    }

    pub fn summary(&self) -> Option<&str> {
        match self {
            AgentOutput::PlanStep { summary, .. }
            | AgentOutput::ToolCall { summary, .. }
            | AgentOutput::AgentCall { summary, .. }
            | AgentOutput::FinalAnswer { summary, .. }
            | AgentOutput::Critique { summary, .. }
            | AgentOutput::NoOp { summary, .. } => summary.as_deref(),
        }
    }

    pub fn next_agent(&self) -> Option<&AgentKind> {
        match self {
            AgentOutput::AgentCall { next_agent, .. } => Some(next_agent),
            AgentOutput::PlanStep { next_agent, .. } => next_agent.as_ref(),
            _ => None,
        }
    }

    pub fn is_critique(&self) -> bool {
        matches!(self, AgentOutput::Critique { .. })
    }

    /// CRITIQUE 的错误信息
    pub fn error_message(&self) -> Option<&str> {
        match self {
            AgentOutput::Critique { content, .. } => content.get("error").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// 单次工具调用的追踪
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallTrace {
    pub tool_name: String,
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at_ms: i64,
    pub ended_at_ms: i64,
}

/// 单次 Agent 调用（含其内部工具循环）的追踪，只追加、不修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTrace {
    pub agent: AgentKind,
    pub input: AgentInput,
    pub output: AgentOutput,
    pub started_at_ms: i64,
    pub ended_at_ms: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallTrace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl AgentTrace {
    /// 以当前时间为结束时间创建追踪；结束时间不早于开始时间
    pub fn new(agent: AgentKind, input: &AgentInput, output: AgentOutput, started_at_ms: i64) -> Self {
        Self {
            agent,
            input: input.snapshot(),
            output,
            started_at_ms,
            ended_at_ms: now_ms().max(started_at_ms),
            tool_calls: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCallTrace>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub fn duration_ms(&self) -> i64 {
        self.ended_at_ms - self.started_at_ms
    }
}
