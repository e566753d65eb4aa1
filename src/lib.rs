//! Compass - 个人效率助手的多智能体编排核心
//!
//! 模块划分：
//! - **agents**: Agent trait 与各角色（Router / TaskPlanner / ContentCreator / ...）
//! - **assistant**: 运行时装配（存储、网关、工具、编排器）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 输出协议、错误、工具拦截、路由编排、简单对话编排
//! - **llm**: LLM 客户端抽象、后端实现与主备 JSON 网关
//! - **schemas**: LLM 载荷的结构定义与收窄
//! - **store**: JSON 键值存储
//! - **tools**: 工具注册表、执行器与内置工具
//! - **trace**: Agent 追踪汇

pub mod agents;
pub mod assistant;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod schemas;
pub mod store;
pub mod tools;
pub mod trace;

pub use assistant::{build_assistant, create_assistant, Assistant};
