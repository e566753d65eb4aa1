//! Compass 命令行入口
//!
//! ```text
//! compass goal "<goal>"           路由编排一个目标
//! compass chat "<message>"        一轮简单对话
//! compass traces                  打印已保存的追踪
//! compass clear-traces            清空追踪
//! ```
//! 全局选项 `--config <path>` 追加配置文件，`--user <id>` / `--session <id>` 指定身份。

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use compass::config::{load_config, AppConfig};
use compass::{create_assistant, observability};

/// 个人效率助手：多智能体编排
#[derive(Debug, Parser)]
#[command(name = "compass", about = "Personal productivity assistant (multi-agent orchestration)")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 追加的配置文件（覆盖 config/default.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// 会话 / 对话线程 id；缺省时随机生成
    #[arg(long, global = true)]
    session: Option<String>,
}

#[derive(Debug, Subcommand, PartialEq)]
enum Command {
    /// 经 Router 路由编排一个目标
    Goal {
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },
    /// 一轮简单对话
    Chat { message: String },
    /// 打印已保存的追踪
    Traces,
    /// 清空追踪
    ClearTraces,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.clone()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config not loaded, using defaults");
        AppConfig::default()
    });
    let assistant = create_assistant(&cfg)
        .await
        .context("Failed to create assistant")?;
    let session = cli
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    match cli.command {
        Command::Goal { words } => {
            let output = assistant.run_goal(&cli.user, &session, &words.join(" ")).await;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Chat { message } => {
            let output = assistant.chat(&cli.user, &session, &message).await;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Traces => {
            let traces = assistant.traces().await?;
            println!("{}", serde_json::to_string_pretty(&traces)?);
        }
        Command::ClearTraces => {
            assistant.clear_traces().await?;
            tracing::info!("traces cleared");
        }
    }
    Ok(())
}
