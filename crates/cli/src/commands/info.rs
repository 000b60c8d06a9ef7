//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::SelectorConfig;
use serde::Serialize;

use super::{find_profile, load_profiles};
use crate::cli::InfoArgs;

/// Profile info for JSON output
#[derive(Serialize)]
struct ProfilesInfo {
    version: String,
    source: String,
    selectors: Vec<SelectorInfo>,
}

#[derive(Serialize)]
struct SelectorInfo {
    name: String,
    role: String,
    calib_time_ms: u32,
    hold_count: usize,
    /// None = derived from pool pressure
    #[serde(skip_serializing_if = "Option::is_none")]
    prepare_hold_count: Option<usize>,
    match_mode: String,
    prevent_drop: bool,
    flush_on_mismatch: bool,
    recover_on_violation: bool,
    trace_removal: bool,
    trace_push: bool,
}

impl From<&SelectorConfig> for SelectorInfo {
    fn from(config: &SelectorConfig) -> Self {
        Self {
            name: config.name.clone(),
            role: config.role.as_str().to_string(),
            calib_time_ms: config.calib_time_ms,
            hold_count: config.hold_count,
            prepare_hold_count: (config.prepare_hold_count > 0)
                .then_some(config.prepare_hold_count),
            match_mode: format!("{:?}", config.match_mode),
            prevent_drop: config.prevent_drop,
            flush_on_mismatch: config.flush_on_mismatch,
            recover_on_violation: config.recover_on_violation,
            trace_removal: config.trace_removal,
            trace_push: config.trace_push,
        }
    }
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let profiles = load_profiles(args.config.as_deref())?;

    let selectors = match &args.profile {
        Some(name) => vec![find_profile(&profiles, name)?],
        None => profiles.selectors.clone(),
    };

    let info = ProfilesInfo {
        version: format!("{:?}", profiles.version),
        source: args
            .config
            .as_ref()
            .map_or_else(|| "built-in".to_string(), |p| p.display().to_string()),
        selectors: selectors.iter().map(SelectorInfo::from).collect(),
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize profile info")?;
        println!("{}", json);
    } else {
        print_profiles_info(&info);
    }

    Ok(())
}

fn print_profiles_info(info: &ProfilesInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                Dual Selector Profiles                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📄 Source");
    println!("   ├─ Version: {}", info.version);
    println!("   └─ Location: {}", info.source);

    println!("\n🎞  Selectors ({})", info.selectors.len());
    for (i, selector) in info.selectors.iter().enumerate() {
        let is_last = i == info.selectors.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child = if is_last { "   " } else { "│  " };

        println!("   {} {} ({})", prefix, selector.name, selector.role);
        println!(
            "   {}  ├─ Window: {} ms, matcher: {}",
            child, selector.calib_time_ms, selector.match_mode
        );
        match selector.prepare_hold_count {
            Some(n) => println!(
                "   {}  ├─ Hold: {} matched / {} pending",
                child, selector.hold_count, n
            ),
            None => println!(
                "   {}  ├─ Hold: {} matched / auto pending",
                child, selector.hold_count
            ),
        }
        println!(
            "   {}  └─ Flags: {}",
            child,
            flags(selector).unwrap_or_else(|| "none".to_string())
        );
    }
    println!();
}

fn flags(selector: &SelectorInfo) -> Option<String> {
    let flags: Vec<&str> = [
        (selector.prevent_drop, "prevent_drop"),
        (selector.flush_on_mismatch, "flush_on_mismatch"),
        (selector.recover_on_violation, "recover_on_violation"),
        (selector.trace_removal, "trace_removal"),
        (selector.trace_push, "trace_push"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();

    (!flags.is_empty()).then(|| flags.join(", "))
}
