use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum RgConfigError {
    #[error("failed to read config file {path:?}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse render graph config")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize render graph config")]
    Serialize(#[from] toml::ser::Error),
}

/// RenderGraph 的配置，可以从 TOML 加载，缺失的字段使用默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderGraphConfig {
    /// command pool 每次增长分配的 command buffer 数量
    pub command_chunk_size: u32,

    /// 等待 ring slot 可用的超时时间（毫秒），超时视为设备错误
    pub slot_wait_timeout_ms: u64,

    /// 是否为每个 pass 插入 debug label
    pub debug_labels: bool,

    /// 每次 execute 时是否打印执行计划
    pub print_execution_plan: bool,

    /// debug label 的颜色
    pub label_color: [f32; 4],
}

impl Default for RenderGraphConfig {
    fn default() -> Self {
        Self {
            command_chunk_size: 8,
            slot_wait_timeout_ms: 5000,
            debug_labels: true,
            print_execution_plan: false,
            label_color: [0.2, 0.6, 0.9, 1.0],
        }
    }
}

impl RenderGraphConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, RgConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// 从 TOML 文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RgConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| RgConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, RgConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    #[inline]
    pub fn slot_wait_timeout_ns(&self) -> u64 {
        self.slot_wait_timeout_ms.saturating_mul(1_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RenderGraphConfig::from_toml_str(
            r#"
            command_chunk_size = 4
            print_execution_plan = true
            "#,
        )
        .unwrap();
        assert_eq!(config.command_chunk_size, 4);
        assert!(config.print_execution_plan);
        assert_eq!(config.slot_wait_timeout_ms, 5000);
        assert!(config.debug_labels);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RenderGraphConfig {
            label_color: [1.0, 0.0, 0.0, 1.0],
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(RenderGraphConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            RenderGraphConfig::from_toml_str("command_chunk_size = \"many\""),
            Err(RgConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = RenderGraphConfig::load("/definitely/not/here/render_graph.toml").unwrap_err();
        assert!(matches!(err, RgConfigError::Io { .. }));
    }
}
