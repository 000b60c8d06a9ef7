//! 选择器配置解析
//!
//! TOML 为主，JSON 为辅。两种格式共用同一个 `SelectorProfiles` 反序列化路径，
//! 缺省字段在反序列化时取用途预设。

use contracts::{ContractError, SelectorProfiles};

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式，大小写不敏感
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// 按格式解析选择器配置集合
pub fn parse(content: &str, format: ConfigFormat) -> Result<SelectorProfiles, ContractError> {
    if content.trim().is_empty() {
        return Err(ContractError::config_parse(format!(
            "{} profile file is empty",
            format.label()
        )));
    }

    let parsed: Result<SelectorProfiles, BoxedError> = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(BoxedError::from),
        ConfigFormat::Json => serde_json::from_str(content).map_err(BoxedError::from),
    };

    parsed.map_err(|e| ContractError::ConfigParse {
        message: format!("{} parse error: {e}", format.label()),
        source: Some(e),
    })
}
