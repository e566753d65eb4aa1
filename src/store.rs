//! JSON 键值存储
//!
//! 充当浏览器扩展本地存储的替身：整库是一个 JSON 对象，按键读写。
//! 配置了路径时每次写入都落盘（先写临时文件再 rename）；未配置路径时只存在于内存。
//! 所有读改写都在同一把锁内完成，工具之间不会互相覆盖。

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;

use crate::core::AgentError;

#[derive(Debug)]
pub struct JsonStore {
    path: Option<PathBuf>,
    data: Mutex<Map<String, Value>>,
}

impl JsonStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(Map::new()),
        }
    }

    /// 打开文件存储；文件不存在时从空库开始，内容损坏时报错
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => Map::new(),
            Ok(raw) => match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => map,
                _ => {
                    return Err(AgentError::Storage(format!(
                        "{} is not a JSON object",
                        path.display()
                    )))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 读取键；缺失时返回 None
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AgentError> {
        let data = self.data.lock().await;
        match data.get(key) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    /// 读取键；缺失或类型不符时返回默认值
    pub async fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.get(key).await {
            Ok(Some(v)) => v,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!(key, error = %e, "store value unreadable, using default");
                T::default()
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AgentError> {
        let mut data = self.data.lock().await;
        data.insert(key.to_string(), serde_json::to_value(value)?);
        self.flush(&data).await
    }

    /// 在锁内完成读 -> 修改 -> 写回，返回闭包的结果
    ///
    /// 已有值无法解析为 T 时报 Storage 错误，原值保持不动
    pub async fn update<T, R, F>(&self, key: &str, f: F) -> Result<R, AgentError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        let mut data = self.data.lock().await;
        let mut current: T = match data.get(key) {
            Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
                AgentError::Storage(format!("{} holds unexpected data: {}", key, e))
            })?,
            None => T::default(),
        };
        let out = f(&mut current);
        data.insert(key.to_string(), serde_json::to_value(&current)?);
        self.flush(&data).await?;
        Ok(out)
    }

    async fn flush(&self, data: &Map<String, Value>) -> Result<(), AgentError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(data)?).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}
