//! profile.saveInsights：保存用户画像与洞察
//!
//! 画像字段（name / profession / mood / workStyle / preferences）合并进 `userProfile`；
//! preferences 按键合并，skills / insights 去重追加到 `agentProfileInsights`。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::store::JsonStore;
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolContext};

pub const PROFILE_KEY: &str = "userProfile";
pub const PROFILE_INSIGHTS_KEY: &str = "agentProfileInsights";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileInsights {
    #[serde(default)]
    pub preferences: Map<String, Value>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
struct SaveArgs {
    #[serde(flatten)]
    profile: UserProfile,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    insights: Vec<String>,
}

fn push_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

pub struct SaveProfileInsightsTool {
    store: Arc<JsonStore>,
}

impl SaveProfileInsightsTool {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SaveProfileInsightsTool {
    fn name(&self) -> &str {
        "profile.saveInsights"
    }

    fn description(&self) -> &str {
        "Save personal info the user shared (name, profession, mood, workStyle, preferences, skills, insights)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<SaveArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let args: SaveArgs = parse_args(args)?;
        let incoming = args.profile.clone();

        let profile = self
            .store
            .update::<UserProfile, _, _>(PROFILE_KEY, |p| {
                if incoming.name.is_some() {
                    p.name = incoming.name.clone();
                }
                if incoming.profession.is_some() {
                    p.profession = incoming.profession.clone();
                }
                if incoming.mood.is_some() {
                    p.mood = incoming.mood.clone();
                }
                if incoming.work_style.is_some() {
                    p.work_style = incoming.work_style.clone();
                }
                if let Some(prefs) = &incoming.preferences {
                    p.preferences.get_or_insert_with(Map::new).extend(prefs.clone());
                }
                p.clone()
            })
            .await
            .map_err(|e| e.to_string())?;

        let insights = self
            .store
            .update::<ProfileInsights, _, _>(PROFILE_INSIGHTS_KEY, |store| {
                if let Some(prefs) = &args.profile.preferences {
                    store.preferences.extend(prefs.clone());
                }
                push_unique(&mut store.skills, &args.skills);
                push_unique(&mut store.insights, &args.insights);
                store.clone()
            })
            .await
            .map_err(|e| e.to_string())?;

        Ok(json!({
            "saved": true,
            "profile": profile,
            "insightsStore": insights,
        }))
    }
}
