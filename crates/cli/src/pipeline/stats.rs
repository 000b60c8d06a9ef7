//! Pipeline statistics and metrics.

use std::time::Duration;

use observability::SelectorMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Selector profile name
    pub selector: String,

    /// Frames handed to `submit` by both cameras
    pub frames_submitted: u64,

    /// Submits that completed a pair
    pub pairs_matched: u64,

    /// Frames taken out by the consumer
    pub outputs: u64,

    /// Frames the selector dropped or evicted (removal notifications)
    pub frames_removed: u64,

    /// Frames the cameras skipped because their pool was empty
    pub frames_starved: u64,

    pub submit_errors: u64,
    pub select_errors: u64,

    /// Buffers not back in their pool after shutdown
    pub buffers_in_use: usize,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Selector metrics aggregator
    pub metrics: SelectorMetricsAggregator,
}

impl PipelineStats {
    /// Outputs per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.outputs as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Removed frames as a percentage of submitted frames
    pub fn removal_rate(&self) -> f64 {
        if self.frames_submitted > 0 {
            (self.frames_removed as f64 / self.frames_submitted as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                  Dual Selector Statistics                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Selector: {}", self.selector);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Frames submitted: {}", self.frames_submitted);
        println!("   ├─ Pairs matched: {}", self.pairs_matched);
        println!("   ├─ Outputs: {}", self.outputs);
        println!("   └─ Output FPS: {:.2}", self.fps());

        println!("\n🗑  Losses");
        println!(
            "   ├─ Removed by selector: {} ({:.2}%)",
            self.frames_removed,
            self.removal_rate()
        );
        println!("   ├─ Starved (pool empty): {}", self.frames_starved);
        println!(
            "   ├─ Errors: {} submit / {} select",
            self.submit_errors, self.select_errors
        );
        println!("   └─ Buffers held after shutdown: {}", self.buffers_in_use);

        println!("\n📈 Selector Metrics");
        for line in self.metrics.summary().to_string().lines().skip(1) {
            println!("   {}", line);
        }

        println!();
    }
}
