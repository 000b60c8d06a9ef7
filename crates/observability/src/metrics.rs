//! 双摄选择器指标收集模块
//!
//! 所有指标都带 `selector` 标签，区分预览、拍照等不同实例。

use contracts::{CameraId, EvictionReason, Selection, SubmitOutcome};
use metrics::{counter, gauge, histogram};
use std::collections::HashMap;

/// 记录一次提交结果
pub fn record_submit(selector: &str, camera: CameraId, outcome: SubmitOutcome) {
    counter!(
        "dual_selector_submit_total",
        "selector" => selector.to_string(),
        "camera" => camera.to_string(),
        "outcome" => outcome.label()
    )
    .increment(1);
}

/// 记录一次成功配对
///
/// `delta_ms` 为两侧帧时间戳之差的绝对值。
pub fn record_pair_matched(selector: &str, sync_id: u32, delta_ms: i64) {
    counter!("dual_selector_pairs_total", "selector" => selector.to_string()).increment(1);
    gauge!("dual_selector_last_sync_id", "selector" => selector.to_string()).set(sync_id as f64);
    histogram!("dual_selector_match_delta_ms", "selector" => selector.to_string())
        .record(delta_ms.unsigned_abs() as f64);
}

/// 记录选择结果
pub fn record_selection(selector: &str, selection: Selection) {
    counter!(
        "dual_selector_selections_total",
        "selector" => selector.to_string(),
        "selection" => selection.label()
    )
    .increment(1);
}

/// 记录被丢弃的队列条目
pub fn record_eviction(selector: &str, camera: CameraId, reason: EvictionReason) {
    counter!(
        "dual_selector_evictions_total",
        "selector" => selector.to_string(),
        "camera" => camera.to_string(),
        "reason" => reason.label()
    )
    .increment(1);
}

/// 记录队列深度
pub fn record_queue_depth(selector: &str, camera: CameraId, pending: usize, matched: usize) {
    gauge!(
        "dual_selector_pending_depth",
        "selector" => selector.to_string(),
        "camera" => camera.to_string()
    )
    .set(pending as f64);
    gauge!(
        "dual_selector_matched_depth",
        "selector" => selector.to_string(),
        "camera" => camera.to_string()
    )
    .set(matched as f64);
}

/// 记录一致性错误
pub fn record_consistency_violation(selector: &str) {
    counter!(
        "dual_selector_consistency_violations_total",
        "selector" => selector.to_string()
    )
    .increment(1);
}

/// 记录缓冲区释放失败
pub fn record_buffer_release_failure(selector: &str, camera: CameraId) {
    counter!(
        "dual_selector_buffer_release_failures_total",
        "selector" => selector.to_string(),
        "camera" => camera.to_string()
    )
    .increment(1);
}

/// 选择器指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SelectorMetricsAggregator {
    /// 提交总数
    pub total_submitted: u64,

    /// 各提交结果计数
    pub submit_outcomes: HashMap<&'static str, u64>,

    /// 各选择结果计数
    pub selections: HashMap<Selection, u64>,

    /// 各丢弃原因计数
    pub evictions: HashMap<EvictionReason, u64>,

    /// 一致性错误次数
    pub violations: u64,

    /// 配对时间差统计 (ms)
    pub match_delta_stats: RunningStats,

    /// 待匹配队列深度统计
    pub pending_depth_stats: RunningStats,
}

impl SelectorMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_submit(&mut self, outcome: SubmitOutcome) {
        self.total_submitted += 1;
        *self.submit_outcomes.entry(outcome.label()).or_insert(0) += 1;
    }

    pub fn update_match_delta(&mut self, delta_ms: i64) {
        self.match_delta_stats.push(delta_ms.unsigned_abs() as f64);
    }

    pub fn update_selection(&mut self, selection: Selection) {
        *self.selections.entry(selection).or_insert(0) += 1;
    }

    pub fn update_eviction(&mut self, reason: EvictionReason) {
        *self.evictions.entry(reason).or_insert(0) += 1;
    }

    pub fn update_pending_depth(&mut self, depth: usize) {
        self.pending_depth_stats.push(depth as f64);
    }

    pub fn update_violation(&mut self) {
        self.violations += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let matched = self.submit_outcomes.get("matched").copied().unwrap_or(0);
        let total_selected: u64 = self.selections.values().sum();
        let fused = self.selections.get(&Selection::Fused).copied().unwrap_or(0);

        MetricsSummary {
            total_submitted: self.total_submitted,
            matched_pairs: matched,
            match_rate: ratio(matched * 2, self.total_submitted),
            total_selected,
            fusion_rate: ratio(fused, total_selected),
            selections: self
                .selections
                .iter()
                .map(|(sel, count)| (sel.label(), *count))
                .collect(),
            evictions: self
                .evictions
                .iter()
                .map(|(reason, count)| (reason.label(), *count))
                .collect(),
            violations: self.violations,
            match_delta_ms: StatsSummary::from(&self.match_delta_stats),
            pending_depth: StatsSummary::from(&self.pending_depth_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64 * 100.0).min(100.0)
    } else {
        0.0
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_submitted: u64,
    pub matched_pairs: u64,
    /// 参与配对的帧占提交总数的百分比
    pub match_rate: f64,
    pub total_selected: u64,
    pub fusion_rate: f64,
    pub selections: Vec<(&'static str, u64)>,
    pub evictions: Vec<(&'static str, u64)>,
    pub violations: u64,
    pub match_delta_ms: StatsSummary,
    pub pending_depth: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dual Selector Summary ===")?;
        writeln!(f, "Submitted frames: {}", self.total_submitted)?;
        writeln!(
            f,
            "Matched pairs: {} ({:.2}% of frames paired)",
            self.matched_pairs, self.match_rate
        )?;
        writeln!(
            f,
            "Selected outputs: {} ({:.2}% fused)",
            self.total_selected, self.fusion_rate
        )?;
        writeln!(f, "Consistency violations: {}", self.violations)?;
        writeln!(f, "Match delta (ms): {}", self.match_delta_ms)?;
        writeln!(f, "Pending depth: {}", self.pending_depth)?;

        let mut selections = self.selections.clone();
        selections.sort();
        if !selections.is_empty() {
            writeln!(f, "Selections:")?;
            for (label, count) in selections {
                writeln!(f, "  {}: {}", label, count)?;
            }
        }

        let mut evictions = self.evictions.clone();
        evictions.sort();
        if !evictions.is_empty() {
            writeln!(f, "Evictions:")?;
            for (label, count) in evictions {
                writeln!(f, "  {}: {}", label, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
