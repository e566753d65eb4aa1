//! 工具箱：注册表、执行器，以及待办 / 笔记 / 画像 / 统计 / HTTP 等具体工具

pub mod activity;
pub mod executor;
pub mod http;
pub mod math;
pub mod notes;
pub mod profile;
pub mod registry;
pub mod schema;
pub mod todos;

use std::sync::Arc;

use crate::store::JsonStore;

pub use activity::ActivityByCategoryTool;
pub use executor::ToolExecutor;
pub use http::{HttpGetTool, HttpPostTool};
pub use math::ExpSumTool;
pub use notes::{Note, NotesCreateTool, NotesListTool};
pub use profile::{ProfileInsights, SaveProfileInsightsTool, UserProfile};
pub use registry::{Tool, ToolContext, ToolRegistry};
pub use todos::{categorize_task, CategorizedTask, TodoAddTool, TodoCompleteTool, TodoListTool};

/// 注册全部内置工具；存储类工具共享同一个 JsonStore
pub fn register_default_tools(registry: &mut ToolRegistry, store: Arc<JsonStore>, http_timeout_secs: u64) {
    registry.register(TodoAddTool::new(store.clone()));
    registry.register(TodoCompleteTool::new(store.clone()));
    registry.register(TodoListTool::new(store.clone()));
    registry.register(NotesCreateTool::new(store.clone()));
    registry.register(NotesListTool::new(store.clone()));
    registry.register(SaveProfileInsightsTool::new(store.clone()));
    registry.register(ActivityByCategoryTool::new(store));
    registry.register(ExpSumTool);
    registry.register(HttpGetTool::new(http_timeout_secs));
    registry.register(HttpPostTool::new(http_timeout_secs));
}
