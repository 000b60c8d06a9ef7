//! SelectorConfig - 选择器配置
//!
//! 每个用途 (预览、预览切换、拍照、Bayer) 一个独立的选择器实例，
//! 各自持有自己的匹配窗口、保留数量与丢帧策略。

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 选择器用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorRole {
    /// 通用默认值 (匹配窗口 2ms)
    #[default]
    Generic,
    Preview,
    PreviewSwitching,
    Capture,
    Bayer,
}

impl SelectorRole {
    pub const ALL: [SelectorRole; 5] = [
        SelectorRole::Generic,
        SelectorRole::Preview,
        SelectorRole::PreviewSwitching,
        SelectorRole::Capture,
        SelectorRole::Bayer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SelectorRole::Generic => "generic",
            SelectorRole::Preview => "preview",
            SelectorRole::PreviewSwitching => "preview_switching",
            SelectorRole::Capture => "capture",
            SelectorRole::Bayer => "bayer",
        }
    }
}

/// 匹配算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// 顺序扫描对侧待匹配队列，未匹配的条目保留
    Basic,
    /// 逐个弹出对侧条目，扫描经过的未匹配条目被丢弃；
    /// 同时启用 bypass/switch/transition 同步类型策略
    #[default]
    SyncAware,
}

/// 选择器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(from = "RawSelectorConfig")]
pub struct SelectorConfig {
    /// 实例名 (日志、指标标签)
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    /// 用途
    pub role: SelectorRole,

    /// 时间戳匹配窗口 (ms)
    #[validate(range(min = 1, max = 60000))]
    pub calib_time_ms: u32,

    /// 已匹配队列最大长度
    #[validate(range(min = 1, max = 64))]
    pub hold_count: usize,

    /// 待匹配队列长度；0 表示根据可用缓冲区自动计算
    #[validate(range(max = 64))]
    pub prepare_hold_count: usize,

    /// 关闭时间戳迟滞丢帧
    pub prevent_drop: bool,

    /// 未找到匹配时清空双方待匹配队列
    pub flush_on_mismatch: bool,

    /// 检测到一致性错误时清空所有队列
    pub recover_on_violation: bool,

    pub match_mode: MatchMode,

    /// 丢弃条目时输出 warn 日志
    pub trace_removal: bool,

    /// 匹配成功时输出 info 日志
    pub trace_push: bool,
}

impl SelectorConfig {
    /// 指定用途的预设
    pub fn for_role(role: SelectorRole) -> Self {
        let base = Self {
            name: role.as_str().to_string(),
            role,
            calib_time_ms: 2,
            hold_count: 1,
            prepare_hold_count: 0,
            prevent_drop: false,
            flush_on_mismatch: false,
            recover_on_violation: true,
            match_mode: MatchMode::SyncAware,
            trace_removal: false,
            trace_push: false,
        };

        match role {
            SelectorRole::Generic => base,
            SelectorRole::Preview | SelectorRole::PreviewSwitching => Self {
                calib_time_ms: 15,
                trace_removal: true,
                ..base
            },
            SelectorRole::Capture => Self {
                calib_time_ms: 5000,
                prevent_drop: true,
                trace_push: true,
                ..base
            },
            SelectorRole::Bayer => Self {
                calib_time_ms: 5000,
                ..base
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn with_calib_time_ms(mut self, calib_time_ms: u32) -> Self {
        self.calib_time_ms = calib_time_ms;
        self
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::for_role(SelectorRole::Generic)
    }
}

/// 反序列化中间结构：缺省字段取用途预设
#[derive(Debug, Deserialize)]
struct RawSelectorConfig {
    name: Option<String>,
    #[serde(default)]
    role: SelectorRole,
    calib_time_ms: Option<u32>,
    hold_count: Option<usize>,
    prepare_hold_count: Option<usize>,
    prevent_drop: Option<bool>,
    flush_on_mismatch: Option<bool>,
    recover_on_violation: Option<bool>,
    match_mode: Option<MatchMode>,
    trace_removal: Option<bool>,
    trace_push: Option<bool>,
}

impl From<RawSelectorConfig> for SelectorConfig {
    fn from(raw: RawSelectorConfig) -> Self {
        let preset = SelectorConfig::for_role(raw.role);
        Self {
            name: raw.name.unwrap_or(preset.name),
            role: raw.role,
            calib_time_ms: raw.calib_time_ms.unwrap_or(preset.calib_time_ms),
            hold_count: raw.hold_count.unwrap_or(preset.hold_count),
            prepare_hold_count: raw
                .prepare_hold_count
                .unwrap_or(preset.prepare_hold_count),
            prevent_drop: raw.prevent_drop.unwrap_or(preset.prevent_drop),
            flush_on_mismatch: raw.flush_on_mismatch.unwrap_or(preset.flush_on_mismatch),
            recover_on_violation: raw
                .recover_on_violation
                .unwrap_or(preset.recover_on_violation),
            match_mode: raw.match_mode.unwrap_or(preset.match_mode),
            trace_removal: raw.trace_removal.unwrap_or(preset.trace_removal),
            trace_push: raw.trace_push.unwrap_or(preset.trace_push),
        }
    }
}

/// 选择器配置集合 - Config Loader 输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SelectorProfiles {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 选择器列表
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub selectors: Vec<SelectorConfig>,
}

impl SelectorProfiles {
    /// 内置的四个用途预设
    pub fn builtin() -> Self {
        Self {
            version: ConfigVersion::V1,
            selectors: [
                SelectorRole::Preview,
                SelectorRole::PreviewSwitching,
                SelectorRole::Capture,
                SelectorRole::Bayer,
            ]
            .into_iter()
            .map(SelectorConfig::for_role)
            .collect(),
        }
    }

    /// 按名称查找
    pub fn get(&self, name: &str) -> Option<&SelectorConfig> {
        self.selectors.iter().find(|s| s.name == name)
    }
}
