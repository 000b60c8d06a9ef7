//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, SelectorProfiles};
use contracts::{MatchMode, SelectorRole};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Preview windows above this are almost certainly a unit mistake
const PREVIEW_WINDOW_WARN_MS: u32 = 1000;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ProfilesSummary>,
}

#[derive(Serialize)]
struct ProfilesSummary {
    version: String,
    selector_count: usize,
    selectors: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating selector profiles");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Selector profile validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match ConfigLoader::load_from_path(&args.config) {
        Ok(profiles) => {
            let warnings = collect_warnings(&profiles);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ProfilesSummary {
                    version: format!("{:?}", profiles.version),
                    selector_count: profiles.selectors.len(),
                    selectors: profiles.selectors.iter().map(|s| s.name.clone()).collect(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(profiles: &SelectorProfiles) -> Vec<String> {
    let mut warnings = Vec::new();

    for selector in &profiles.selectors {
        if selector.flush_on_mismatch && selector.match_mode == MatchMode::Basic {
            warnings.push(format!(
                "Selector '{}': flush_on_mismatch has no effect with the basic matcher",
                selector.name
            ));
        }
        if selector.flush_on_mismatch && selector.prevent_drop {
            warnings.push(format!(
                "Selector '{}': flush_on_mismatch is ignored while prevent_drop is set",
                selector.name
            ));
        }
        if matches!(
            selector.role,
            SelectorRole::Preview | SelectorRole::PreviewSwitching
        ) && selector.calib_time_ms > PREVIEW_WINDOW_WARN_MS
        {
            warnings.push(format!(
                "Selector '{}': preview matching window of {} ms pairs frames seconds apart",
                selector.name, selector.calib_time_ms
            ));
        }
        if !selector.recover_on_violation {
            warnings.push(format!(
                "Selector '{}': queues are left as-is after a consistency violation",
                selector.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Selector profiles are valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Selectors ({}): {}",
                summary.selector_count,
                summary.selectors.join(", ")
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Selector profiles are invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
