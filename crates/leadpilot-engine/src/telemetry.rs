//! Activity feed and funnel counters.
//!
//! The feed is a bounded append-only log: one entry per status transition
//! and per dispatch decision, rejections included. Funnel counters are
//! never stored; they are recomputed from the lead collection on demand.

use chrono::{DateTime, Utc};
use leadpilot_core::types::{ChannelStatus, Lead};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

/// Oldest entries are dropped past this point.
const MAX_EVENTS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub at: DateTime<Utc>,
    /// Short machine tag, e.g. "send", "throttle_reject", "status".
    pub action: String,
    pub detail: String,
}

pub struct Telemetry {
    path: PathBuf,
    events: Mutex<Vec<TelemetryEvent>>,
}

impl Telemetry {
    pub fn open(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        let path = dir.join("telemetry.json");
        let events = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Telemetry log unreadable, starting fresh: {e}");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        Self {
            path,
            events: Mutex::new(events),
        }
    }

    /// Record one event. Persistence is best-effort; the feed is
    /// observability, never a source of truth.
    pub async fn record(&self, action: &str, detail: impl Into<String>) {
        let mut events = self.events.lock().await;
        events.push(TelemetryEvent {
            at: Utc::now(),
            action: action.to_string(),
            detail: detail.into(),
        });
        if events.len() > MAX_EVENTS {
            let excess = events.len() - MAX_EVENTS;
            events.drain(..excess);
        }
        if let Ok(json) = serde_json::to_string_pretty(&*events) {
            if let Err(e) = std::fs::write(&self.path, json) {
                warn!("Telemetry write failed: {e}");
            }
        }
    }

    /// The last N entries, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = self.events.lock().await;
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }
}

/// Funnel counters derived from the lead collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Funnel {
    pub total: usize,
    pub contacted: usize,
    pub interested: usize,
    pub converted: usize,
}

impl Funnel {
    pub fn compute(leads: &[Lead]) -> Self {
        let mut funnel = Self {
            total: leads.len(),
            ..Self::default()
        };
        for lead in leads {
            if lead.channel_status.is_contacted() {
                funnel.contacted += 1;
            }
            if lead.channel_status.is_interested() {
                funnel.interested += 1;
            }
            if lead.channel_status == ChannelStatus::DemoScheduled {
                funnel.converted += 1;
            }
        }
        funnel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadpilot_core::types::Lead;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    #[tokio::test]
    async fn test_feed_is_bounded() {
        let dir = scratch("leadpilot-telemetry-bound");
        let telemetry = Telemetry::open(&dir);
        for i in 0..(MAX_EVENTS + 20) {
            telemetry.record("status", format!("event {i}")).await;
        }
        assert_eq!(telemetry.len().await, MAX_EVENTS);
        let tail = telemetry.recent(1).await;
        assert!(tail[0].detail.ends_with(&format!("{}", MAX_EVENTS + 19)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_recent_survives_reopen() {
        let dir = scratch("leadpilot-telemetry-reopen");
        {
            let telemetry = Telemetry::open(&dir);
            telemetry.record("send", "delivered to L1").await;
        }
        let telemetry = Telemetry::open(&dir);
        let tail = telemetry.recent(10).await;
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].action, "send");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_funnel_counts() {
        let mut a = Lead::new("L1", "A", "905551112233");
        a.channel_status = ChannelStatus::Pending;
        let mut b = Lead::new("L2", "B", "905551112234");
        b.channel_status = ChannelStatus::DemoScheduled;
        let c = Lead::new("L3", "C", "905551112235");

        let funnel = Funnel::compute(&[a, b, c]);
        assert_eq!(funnel.total, 3);
        assert_eq!(funnel.contacted, 2);
        assert_eq!(funnel.interested, 1);
        assert_eq!(funnel.converted, 1);
    }
}
