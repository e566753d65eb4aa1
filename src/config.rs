//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `COMPASS__*` 覆盖（双下划线表示嵌套，
//! 如 `COMPASS__ORCHESTRATOR__MAX_HOPS=4`）。所有超时均为可选，未配置即不设上限。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub orchestrator: OrchestratorSection,
    pub tools: ToolsSection,
    pub chat: ChatSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// JSON 存储所在目录；未设置时数据只保存在内存
    pub data_dir: Option<PathBuf>,
}

/// [llm] 段：主备后端与单次调用超时
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmSection {
    #[serde(default)]
    pub primary: BackendSection,
    pub secondary: Option<BackendSection>,
    pub timeout_secs: Option<u64>,
}

/// [llm.primary] / [llm.secondary]
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    /// openai / gemini / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 保存 API Key 的环境变量名
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

/// [orchestrator] 段：两个独立的循环上限与超时
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    /// 智能体之间最多跳转次数
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    /// 单个智能体最多请求工具次数
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    /// 简单对话循环最多工具次数
    #[serde(default = "default_chat_max_tool_iterations")]
    pub chat_max_tool_iterations: usize,
    pub agent_timeout_secs: Option<u64>,
    /// 循环上限耗尽时是否改为返回 CRITIQUE（默认保持最后一次输出）
    #[serde(default)]
    pub critique_on_guard_exhaustion: bool,
}

fn default_max_hops() -> usize {
    8
}

fn default_max_tool_iterations() -> usize {
    8
}

fn default_chat_max_tool_iterations() -> usize {
    5
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            max_tool_iterations: default_max_tool_iterations(),
            chat_max_tool_iterations: default_chat_max_tool_iterations(),
            agent_timeout_secs: None,
            critique_on_guard_exhaustion: false,
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub timeout_secs: Option<u64>,
    /// http.get / http.post 的请求超时（秒）
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    15
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// [chat] 段：对话时不得违背的基本原则
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSection {
    #[serde(default = "default_base_truths")]
    pub base_truths: Vec<String>,
}

fn default_base_truths() -> Vec<String> {
    [
        "Progress compounds; ship small steps daily.",
        "Clarity beats complexity; write it down.",
        "Feedback early; iterate quickly.",
        "Focus on user value; measure impact.",
        "Default to action; perfection is a trap.",
    ]
    .map(String::from)
    .to_vec()
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            base_truths: default_base_truths(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 COMPASS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 COMPASS__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("COMPASS")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
