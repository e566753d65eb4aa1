//! activityByCategory.compute：按粗粒度类别统计近期任务
//!
//! 有时间戳的归类记录（`taskCategories`）只统计窗口内的；
//! 没有任何归类记录时，退回到对全部待办 / 已完成任务按关键词计数。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::store::JsonStore;
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::todos::{CategorizedTask, COMPLETED_TASKS_KEY, PREDICTED_TASKS_KEY, TASK_CATEGORIES_KEY};
use crate::tools::{Tool, ToolContext};

fn coarse_category(task: &str) -> &'static str {
    let s = task.to_lowercase();
    if s.contains("learn") || s.contains("read") {
        "education"
    } else if s.contains("build") || s.contains("implement") {
        "work"
    } else if s.contains("exercise") || s.contains("walk") {
        "health"
    } else {
        "general"
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ActivityArgs {
    /// 统计窗口（小时）
    #[serde(default = "default_window_hours")]
    window_hours: f64,
}

fn default_window_hours() -> f64 {
    24.0
}

/// 窗口起点 = now - windowHours；超出时间可表示范围时报错
fn window_cutoff(now: DateTime<Utc>, window_hours: f64) -> Result<DateTime<Utc>, String> {
    if !(window_hours > 0.0) {
        return Err("windowHours must be positive".to_string());
    }
    let secs = window_hours * 3600.0;
    if !secs.is_finite() || secs >= i64::MAX as f64 {
        return Err("windowHours out of range".to_string());
    }
    Duration::try_seconds(secs as i64)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| "windowHours out of range".to_string())
}

pub struct ActivityByCategoryTool {
    store: Arc<JsonStore>,
}

impl ActivityByCategoryTool {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ActivityByCategoryTool {
    fn name(&self) -> &str {
        "activityByCategory.compute"
    }

    fn description(&self) -> &str {
        "Count the user's recent tasks per category within a time window."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ActivityArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let args: ActivityArgs = parse_args(args)?;
        let cutoff = window_cutoff(Utc::now(), args.window_hours)?;

        let categorized: Vec<CategorizedTask> = self.store.get_or_default(TASK_CATEGORIES_KEY).await;
        let mut stats: BTreeMap<String, u64> = BTreeMap::new();

        if categorized.is_empty() {
            let predicted: Vec<String> = self.store.get_or_default(PREDICTED_TASKS_KEY).await;
            let completed: Vec<String> = self.store.get_or_default(COMPLETED_TASKS_KEY).await;
            for task in completed.iter().chain(predicted.iter()) {
                *stats.entry(coarse_category(task).to_string()).or_insert(0) += 1;
            }
        } else {
            for entry in categorized {
                let recent = DateTime::parse_from_rfc3339(&entry.timestamp)
                    .map(|ts| ts.with_timezone(&Utc) > cutoff)
                    .unwrap_or(false);
                if recent {
                    *stats.entry(entry.category).or_insert(0) += 1;
                }
            }
        }
        Ok(json!(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_filters_old_entries() {
        let store = Arc::new(JsonStore::in_memory());
        let now = Utc::now();
        let entries = vec![
            CategorizedTask {
                task: "walk".into(),
                category: "health-wellness".into(),
                timestamp: now.to_rfc3339(),
            },
            CategorizedTask {
                task: "read".into(),
                category: "learning-growth".into(),
                timestamp: (now - Duration::hours(48)).to_rfc3339(),
            },
        ];
        store.set(TASK_CATEGORIES_KEY, &entries).await.unwrap();

        let out = ActivityByCategoryTool::new(store)
            .execute(json!({"windowHours": 24}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(out, json!({"health-wellness": 1}));
    }

    #[tokio::test]
    async fn test_falls_back_to_task_lists() {
        let store = Arc::new(JsonStore::in_memory());
        store
            .set(PREDICTED_TASKS_KEY, &vec!["learn go".to_string(), "build cli".to_string()])
            .await
            .unwrap();
        store.set(COMPLETED_TASKS_KEY, &vec!["walk".to_string()]).await.unwrap();

        let out = ActivityByCategoryTool::new(store)
            .execute(json!({}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(out, json!({"education": 1, "health": 1, "work": 1}));
    }

    #[test]
    fn test_window_cutoff_bounds() {
        let now = Utc::now();
        assert_eq!(window_cutoff(now, 2.0).unwrap(), now - Duration::hours(2));
        assert!(window_cutoff(now, 1e13).is_err());
        assert!(window_cutoff(now, f64::MAX).is_err());
        assert!(window_cutoff(now, f64::NAN).is_err());
    }

    #[tokio::test]
    async fn test_huge_window_is_error_not_panic() {
        let store = Arc::new(JsonStore::in_memory());
        let entries = vec![CategorizedTask {
            task: "walk".into(),
            category: "health-wellness".into(),
            timestamp: Utc::now().to_rfc3339(),
        }];
        store.set(TASK_CATEGORIES_KEY, &entries).await.unwrap();

        let err = ActivityByCategoryTool::new(store)
            .execute(json!({"windowHours": 1e13}), &ToolContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, "windowHours out of range");
    }

    #[tokio::test]
    async fn test_rejects_non_positive_window() {
        let tool = ActivityByCategoryTool::new(Arc::new(JsonStore::in_memory()));
        assert!(tool
            .execute(json!({"windowHours": 0}), &ToolContext::default())
            .await
            .is_err());
    }
}
