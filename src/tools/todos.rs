//! 待办工具：todos.add / todos.complete / todos.list
//!
//! 待办与已完成列表分别存在 `predictedTasks` / `completedTasks`；
//! 新增时同时按关键词归类，写入 `taskCategories`（只保留最近 20 条）。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::store::JsonStore;
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolContext};

pub const PREDICTED_TASKS_KEY: &str = "predictedTasks";
pub const COMPLETED_TASKS_KEY: &str = "completedTasks";
pub const TASK_CATEGORIES_KEY: &str = "taskCategories";

const MAX_CATEGORIZED: usize = 20;

/// 关键词 -> 类别，按顺序匹配第一个命中的类别
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("mindfulness-presence", &["meditat", "breath", "mindful", "present"]),
    ("relationships-compassion", &["help", "kind", "support", "care"]),
    ("organization-responsibility", &["clean", "organiz", "plan", "schedule"]),
    ("health-wellness", &["exercise", "walk", "stretch", "water", "sleep"]),
    ("learning-growth", &["learn", "read", "study", "research"]),
    ("creativity-expression", &["write", "create", "draw", "design"]),
    ("communication", &["call", "message", "email", "reach out"]),
    ("reflection-acceptance", &["reflect", "journal", "accept", "gratitude"]),
    ("planning-goals", &["goal", "plan", "strategy", "priority"]),
    ("maintenance-care", &["fix", "maintain", "update", "backup"]),
    ("physical-activity", &["move", "activity", "physical"]),
];

const DEFAULT_CATEGORY: &str = "work-productivity";

pub fn categorize_task(task: &str) -> &'static str {
    let lower = task.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedTask {
    pub task: String,
    pub category: String,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct AddArgs {
    /// 待办内容
    text: String,
    #[serde(default)]
    thread_id: Option<String>,
}

pub struct TodoAddTool {
    store: Arc<JsonStore>,
}

impl TodoAddTool {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TodoAddTool {
    fn name(&self) -> &str {
        "todos.add"
    }

    fn description(&self) -> &str {
        "Add a todo to the user's task list. Duplicates and already completed tasks are ignored."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<AddArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let args: AddArgs = parse_args(args)?;
        let text = args.text.trim().to_string();
        if text.is_empty() {
            return Ok(json!({ "ok": true, "text": text }));
        }

        let completed: Vec<String> = self.store.get_or_default(COMPLETED_TASKS_KEY).await;
        let already_done = completed.contains(&text);
        let added = self
            .store
            .update::<Vec<String>, _, _>(PREDICTED_TASKS_KEY, |tasks| {
                if already_done || tasks.contains(&text) {
                    false
                } else {
                    tasks.push(text.clone());
                    true
                }
            })
            .await
            .map_err(|e| e.to_string())?;

        let category = categorize_task(&text);
        let entry = CategorizedTask {
            task: text.clone(),
            category: category.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.store
            .update::<Vec<CategorizedTask>, _, _>(TASK_CATEGORIES_KEY, |list| {
                list.insert(0, entry);
                list.truncate(MAX_CATEGORIZED);
            })
            .await
            .map_err(|e| e.to_string())?;

        tracing::debug!(task = %text, category, added, thread = ?args.thread_id, "todo added");
        Ok(json!({ "ok": true, "text": text, "category": category, "added": added }))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CompleteArgs {
    text: String,
}

pub struct TodoCompleteTool {
    store: Arc<JsonStore>,
}

impl TodoCompleteTool {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TodoCompleteTool {
    fn name(&self) -> &str {
        "todos.complete"
    }

    fn description(&self) -> &str {
        "Mark a todo as completed. Completing an already completed task is a no-op."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<CompleteArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let args: CompleteArgs = parse_args(args)?;
        let text = args.text;

        let newly_completed = self
            .store
            .update::<Vec<String>, _, _>(COMPLETED_TASKS_KEY, |done| {
                if done.contains(&text) {
                    false
                } else {
                    done.push(text.clone());
                    true
                }
            })
            .await;

        match newly_completed {
            Ok(true) => {
                let removed = self
                    .store
                    .update::<Vec<String>, _, _>(PREDICTED_TASKS_KEY, |tasks| {
                        tasks.retain(|t| t != &text)
                    })
                    .await;
                Ok(json!({ "ok": removed.is_ok(), "text": text }))
            }
            Ok(false) => Ok(json!({ "ok": true, "text": text, "alreadyCompleted": true })),
            Err(e) => {
                tracing::warn!(task = %text, error = %e, "todo completion not persisted");
                Ok(json!({ "ok": false, "text": text }))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
enum Status {
    Pending,
    Completed,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListArgs {
    /// 省略时返回全部（待办在前）
    #[serde(default)]
    status: Option<Status>,
}

pub struct TodoListTool {
    store: Arc<JsonStore>,
}

impl TodoListTool {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TodoListTool {
    fn name(&self) -> &str {
        "todos.list"
    }

    fn description(&self) -> &str {
        "List todos. Optional status: pending | completed."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ListArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let args: ListArgs = parse_args(args)?;
        let predicted: Vec<String> = self.store.get_or_default(PREDICTED_TASKS_KEY).await;
        let completed: Vec<String> = self.store.get_or_default(COMPLETED_TASKS_KEY).await;
        let list: Vec<String> = match args.status {
            Some(Status::Completed) => completed,
            Some(Status::Pending) => predicted
                .into_iter()
                .filter(|t| !completed.contains(t))
                .collect(),
            None => predicted.into_iter().chain(completed).collect(),
        };
        Ok(json!(list))
    }
}
