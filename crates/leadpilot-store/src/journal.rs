//! Append-only send journal.
//!
//! Every transmitted message lands here exactly once. The journal is the
//! ground truth for the daily cap and for classifying a send as an initial
//! contact or a follow-up (any prior event to the same normalized number).

use crate::persist;
use leadpilot_core::error::Result;
use leadpilot_core::phone::same_number;
use leadpilot_core::types::{ChannelType, SendEvent, SendKind};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct SendJournal {
    path: PathBuf,
    events: Mutex<Vec<SendEvent>>,
}

impl SendJournal {
    pub fn open(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        let path = dir.join("send_events.json");
        let events: Vec<SendEvent> = persist::read_json_or_default(&path);
        Self {
            path,
            events: Mutex::new(events),
        }
    }

    /// Append one send event, classifying it against prior history.
    pub async fn append(
        &self,
        lead_id: &str,
        phone: &str,
        channel: ChannelType,
        text: &str,
    ) -> Result<SendEvent> {
        let mut events = self.events.lock().await;
        let kind = if events.iter().any(|e| same_number(&e.phone, phone)) {
            SendKind::FollowUp
        } else {
            SendKind::Initial
        };
        let event = SendEvent {
            lead_id: lead_id.to_string(),
            phone: phone.to_string(),
            channel,
            text: text.to_string(),
            sent_at: Utc::now(),
            kind,
        };
        events.push(event.clone());
        persist::write_json(&self.path, &*events)?;
        Ok(event)
    }

    /// Number of events recorded on the given calendar day (UTC).
    pub async fn sent_on(&self, day: DateTime<Utc>) -> u32 {
        let date = day.date_naive();
        let events = self.events.lock().await;
        events.iter().filter(|e| e.sent_at.date_naive() == date).count() as u32
    }

    /// Number of events recorded today.
    pub async fn sent_today(&self) -> u32 {
        self.sent_on(Utc::now()).await
    }

    /// The last N events, newest last. Hot paths read bounded slices,
    /// never the full history.
    pub async fn recent(&self, n: usize) -> Vec<SendEvent> {
        let events = self.events.lock().await;
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    #[tokio::test]
    async fn test_initial_then_follow_up() {
        let dir = scratch("leadpilot-journal-kind");
        let journal = SendJournal::open(&dir);

        let first = journal
            .append("L1", "905551112233", ChannelType::WhatsApp, "hello")
            .await
            .unwrap();
        assert_eq!(first.kind, SendKind::Initial);

        // Same number in a different format is still a follow-up.
        let second = journal
            .append("L1", "0555 111 22 33", ChannelType::WhatsApp, "again")
            .await
            .unwrap();
        assert_eq!(second.kind, SendKind::FollowUp);

        let other = journal
            .append("L2", "905559998877", ChannelType::WhatsApp, "hi")
            .await
            .unwrap();
        assert_eq!(other.kind, SendKind::Initial);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_sent_today_counts_only_today() {
        let dir = scratch("leadpilot-journal-today");
        let journal = SendJournal::open(&dir);
        journal
            .append("L1", "905551112233", ChannelType::WhatsApp, "a")
            .await
            .unwrap();
        journal
            .append("L2", "905559998877", ChannelType::WhatsApp, "b")
            .await
            .unwrap();
        assert_eq!(journal.sent_today().await, 2);
        assert_eq!(
            journal.sent_on(Utc::now() - chrono::Duration::days(1)).await,
            0
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_recent_is_bounded() {
        let dir = scratch("leadpilot-journal-recent");
        let journal = SendJournal::open(&dir);
        for i in 0..5 {
            journal
                .append(&format!("L{i}"), "905551112233", ChannelType::WhatsApp, "x")
                .await
                .unwrap();
        }
        let tail = journal.recent(2).await;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].lead_id, "L4");
        std::fs::remove_dir_all(&dir).ok();
    }
}
