//! 笔记工具：notes.create / notes.list（按对话线程归档，存于 `agentNotes`）

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::now_ms;
use crate::store::JsonStore;
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolContext};

pub const NOTES_KEY: &str = "agentNotes";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub thread_id: String,
    pub title: String,
    pub content: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct CreateArgs {
    title: String,
    content: String,
    thread_id: String,
}

pub struct NotesCreateTool {
    store: Arc<JsonStore>,
}

impl NotesCreateTool {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for NotesCreateTool {
    fn name(&self) -> &str {
        "notes.create"
    }

    fn description(&self) -> &str {
        "Create a note in a conversation thread."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<CreateArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let args: CreateArgs = parse_args(args)?;
        let created_at = now_ms();
        let note = Note {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: args.thread_id,
            title: args.title,
            content: args.content,
            created_at,
        };
        let stored = note.clone();
        // 最新的排在最前
        self.store
            .update::<Vec<Note>, _, _>(NOTES_KEY, |notes| notes.insert(0, stored))
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_value(note).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    thread_id: String,
}

pub struct NotesListTool {
    store: Arc<JsonStore>,
}

impl NotesListTool {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for NotesListTool {
    fn name(&self) -> &str {
        "notes.list"
    }

    fn description(&self) -> &str {
        "List the notes of a conversation thread, newest first."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ListArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let args: ListArgs = parse_args(args)?;
        let notes: Vec<Note> = self.store.get_or_default(NOTES_KEY).await;
        let in_thread: Vec<Note> = notes
            .into_iter()
            .filter(|n| n.thread_id == args.thread_id)
            .collect();
        Ok(json!(in_thread))
    }
}
