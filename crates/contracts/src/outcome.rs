//! Operation outcomes reported by the selector

use serde::{Deserialize, Serialize};

/// Result of submitting one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Queued, waiting for a partner
    Pending,
    /// Paired; both sides now carry this sync id
    Matched(u32),
    /// Dropped by the hysteresis or transition rules; buffer released
    Dropped,
    /// Internal frame, nothing queued
    Ignored,
    /// Invalid or skipped frame; pending queues flushed, buffer released
    Discarded,
}

impl SubmitOutcome {
    pub fn label(self) -> &'static str {
        match self {
            SubmitOutcome::Pending => "pending",
            SubmitOutcome::Matched(_) => "matched",
            SubmitOutcome::Dropped => "dropped",
            SubmitOutcome::Ignored => "ignored",
            SubmitOutcome::Discarded => "discarded",
        }
    }
}

/// Which frame of a matched pair goes downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Master frame alone
    Master,
    /// Slave frame alone
    Slave,
    /// Master frame carrying the slave buffer on its secondary node
    Fused,
    /// Neither; the master frame comes back marked skipped
    Dropped,
}

impl Selection {
    pub fn label(self) -> &'static str {
        match self {
            Selection::Master => "master",
            Selection::Slave => "slave",
            Selection::Fused => "fused",
            Selection::Dropped => "dropped",
        }
    }
}

/// Why a queued frame left its queue without being selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Matched queue exceeded the hold count
    HoldCount,
    /// Pending queue exceeded the prepare hold count
    PrepareHoldCount,
    /// Pending entry older than a completed match
    Stale,
    /// Scanned past by the sync-aware matcher
    Unmatched,
    /// Flushed because of an invalid frame or a mismatch
    Flush,
}

impl EvictionReason {
    pub fn label(self) -> &'static str {
        match self {
            EvictionReason::HoldCount => "hold_count",
            EvictionReason::PrepareHoldCount => "prepare_hold_count",
            EvictionReason::Stale => "stale",
            EvictionReason::Unmatched => "unmatched",
            EvictionReason::Flush => "flush",
        }
    }
}
