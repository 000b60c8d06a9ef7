//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (validator derive：calib_time_ms、hold_count、prepare_hold_count、name)
//! - 至少一个选择器
//! - 选择器名称唯一
//! - flush_on_mismatch 只在 sync_aware 且未开启 prevent_drop 时生效

use std::collections::HashSet;

use contracts::{ContractError, MatchMode, SelectorProfiles};
use validator::Validate;

/// 校验 SelectorProfiles 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(profiles: &SelectorProfiles) -> Result<(), ContractError> {
    validate_fields(profiles)?;
    validate_unique_names(profiles)?;
    validate_flush_policy(profiles)?;
    Ok(())
}

/// 字段范围校验
fn validate_fields(profiles: &SelectorProfiles) -> Result<(), ContractError> {
    profiles
        .validate()
        .map_err(|e| ContractError::config_validation("selectors", e.to_string()))
}

/// 校验名称唯一性
fn validate_unique_names(profiles: &SelectorProfiles) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for selector in &profiles.selectors {
        if !seen.insert(selector.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("selectors[name={}]", selector.name),
                "duplicate selector name",
            ));
        }
    }
    Ok(())
}

/// 校验清空策略组合
fn validate_flush_policy(profiles: &SelectorProfiles) -> Result<(), ContractError> {
    for selector in profiles.selectors.iter().filter(|s| s.flush_on_mismatch) {
        if selector.prevent_drop {
            return Err(ContractError::config_validation(
                format!("selectors[{}].flush_on_mismatch", selector.name),
                "flush_on_mismatch has no effect while prevent_drop is set",
            ));
        }
        if selector.match_mode != MatchMode::SyncAware {
            return Err(ContractError::config_validation(
                format!("selectors[{}].flush_on_mismatch", selector.name),
                "flush_on_mismatch requires match_mode = \"sync_aware\"",
            ));
        }
    }
    Ok(())
}
