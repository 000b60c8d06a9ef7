//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::SelectorConfig;
use std::time::Duration;
use tracing::{info, warn};

use super::{find_profile, load_profiles};
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let profiles = load_profiles(args.config.as_deref())?;
    let mut selector = find_profile(&profiles, &args.profile)?;

    // Apply CLI overrides
    if let Some(calib_time_ms) = args.calib_time_ms {
        info!(calib_time_ms, "Overriding matching window from CLI");
        selector = selector.with_calib_time_ms(calib_time_ms);
    }
    if let Some(mode) = args.match_mode {
        info!(match_mode = ?mode, "Overriding matcher from CLI");
        selector = selector.with_match_mode(mode.into());
    }

    info!(
        profile = %selector.name,
        role = selector.role.as_str(),
        calib_time_ms = selector.calib_time_ms,
        hold_count = selector.hold_count,
        "Profile resolved"
    );

    if args.dry_run {
        info!("Dry run mode - profile is valid, exiting");
        print_profile_summary(&selector, args);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        selector,
        frames: (args.frames > 0).then_some(args.frames),
        master_fps: args.fps,
        slave_fps: args.slave_fps.unwrap_or(args.fps),
        jitter_ms: args.jitter_ms,
        slave_offset_ms: args.slave_offset_ms,
        select_mode: args.select,
        pool_size: args.pool_size,
        speed: args.speed,
        standby_after: args.standby_after,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    let pipeline = Pipeline::new(pipeline_config);
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    tokio::select! {
        result = pipeline.run() => {
            let stats = result.context("Pipeline execution failed")?;
            info!(
                outputs = stats.outputs,
                pairs_matched = stats.pairs_matched,
                frames_removed = stats.frames_removed,
                duration_secs = stats.duration.as_secs_f64(),
                fps = format!("{:.2}", stats.fps()),
                "Pipeline completed successfully"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("Dual Selector finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM. A handler that cannot be installed never
/// resolves.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print the resolved profile and simulation settings for dry-run mode
fn print_profile_summary(selector: &SelectorConfig, args: &RunArgs) {
    println!("\n=== Run Summary ===\n");
    println!("Selector '{}' ({}):", selector.name, selector.role.as_str());
    println!("  Matching window: {} ms", selector.calib_time_ms);
    println!("  Matcher: {:?}", selector.match_mode);
    println!("  Hold count: {}", selector.hold_count);
    match selector.prepare_hold_count {
        0 => println!("  Prepare hold count: auto"),
        n => println!("  Prepare hold count: {}", n),
    }
    println!("  Prevent drop: {}", selector.prevent_drop);

    println!("\nCameras:");
    println!("  Master CAM0: {} fps", args.fps);
    println!(
        "  Slave CAM2: {} fps, +{} ms",
        args.slave_fps.unwrap_or(args.fps),
        args.slave_offset_ms
    );
    println!("  Jitter: ±{} ms, pool: {} buffers", args.jitter_ms, args.pool_size);
    if let Some(after) = args.standby_after {
        println!("  Slave standby after {} master frames", after);
    }
    println!();
}
