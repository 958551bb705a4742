//! Dual-axis lead status machine.
//!
//! The two axes move independently: `PhoneStatus` tracks our outbound
//! effort, `ChannelStatus` tracks the lead's response. The machine is
//! deliberately loose — operators may set either axis directly — with two
//! enforced couplings: a dead number forces the phone axis back to NotSent
//! in the same write, and a confirmed send auto-promotes an untouched
//! channel axis to Pending.

use crate::telemetry::Telemetry;
use chrono::{Duration, Utc};
use leadpilot_core::error::Result;
use leadpilot_core::types::{
    ChannelStatus, Lead, LeadPatch, PhoneStatus, Strategy, TwoStepState,
};
use leadpilot_store::LeadStore;
use std::sync::Arc;
use tracing::info;

pub struct StatusEngine {
    store: Arc<LeadStore>,
    telemetry: Arc<Telemetry>,
}

impl StatusEngine {
    pub fn new(store: Arc<LeadStore>, telemetry: Arc<Telemetry>) -> Self {
        Self { store, telemetry }
    }

    /// A send attempt is starting: mark the phone axis Requested and restart
    /// the cooldown so a crashed attempt still spaces out the retry.
    pub async fn begin_send(&self, id: &str, cooldown_secs: u64) -> Result<Lead> {
        let patch = LeadPatch {
            phone_status: Some(PhoneStatus::Requested),
            next_eligible: Some(Some(Utc::now() + Duration::seconds(cooldown_secs as i64))),
            ..Default::default()
        };
        let lead = self.store.patch(id, &patch).await?;
        self.note(id, "phone → Requested").await;
        Ok(lead)
    }

    /// A send went out: phone axis Sent, and a channel axis still at NotSent
    /// auto-promotes to Pending (we are now waiting on them).
    pub async fn confirm_sent(&self, id: &str, cooldown_secs: u64) -> Result<Lead> {
        let current = self.store.get(id).await?;
        let mut patch = LeadPatch {
            phone_status: Some(PhoneStatus::Sent),
            next_eligible: Some(Some(Utc::now() + Duration::seconds(cooldown_secs as i64))),
            ..Default::default()
        };
        if current.channel_status == ChannelStatus::NotSent {
            patch.channel_status = Some(ChannelStatus::Pending);
        }
        let lead = self.store.patch(id, &patch).await?;
        self.note(id, "phone → Sent").await;
        Ok(lead)
    }

    /// Set the phone axis directly.
    pub async fn set_phone_status(&self, id: &str, status: PhoneStatus) -> Result<Lead> {
        let patch = LeadPatch {
            phone_status: Some(status),
            ..Default::default()
        };
        let lead = self.store.patch(id, &patch).await?;
        self.note(id, &format!("phone → {}", status.label())).await;
        Ok(lead)
    }

    /// Set the channel axis directly. NumberNotFound drags the phone axis
    /// back to NotSent inside the same patch, so no reader can see the
    /// contradictory pair (Sent, NumberNotFound).
    pub async fn set_channel_status(&self, id: &str, status: ChannelStatus) -> Result<Lead> {
        let mut patch = LeadPatch {
            channel_status: Some(status),
            ..Default::default()
        };
        if status == ChannelStatus::NumberNotFound {
            patch.phone_status = Some(PhoneStatus::NotSent);
            patch.next_eligible = Some(None);
        }
        let lead = self.store.patch(id, &patch).await?;
        self.note(id, &format!("channel → {}", status.label())).await;
        Ok(lead)
    }

    /// Return a lead to its initial state: both axes cleared, the two-step
    /// sub-state back to None, no prepared text, no cooldown.
    pub async fn reset(&self, id: &str) -> Result<Lead> {
        let patch = LeadPatch {
            phone_status: Some(PhoneStatus::Empty),
            channel_status: Some(ChannelStatus::NotSent),
            two_step: Some(TwoStepState::None),
            prepared_message: Some(None),
            next_eligible: Some(None),
            ..Default::default()
        };
        let lead = self.store.patch(id, &patch).await?;
        self.note(id, "reset to initial state").await;
        Ok(lead)
    }

    /// Switch strategy. The prepared message belongs to the old strategy,
    /// so it is cleared in the same patch; statuses are left alone.
    pub async fn set_strategy(&self, id: &str, strategy: Strategy) -> Result<Lead> {
        let patch = LeadPatch {
            strategy: Some(strategy),
            prepared_message: Some(None),
            ..Default::default()
        };
        let lead = self.store.patch(id, &patch).await?;
        self.note(id, &format!("strategy → {}", strategy.label())).await;
        Ok(lead)
    }

    async fn note(&self, id: &str, detail: &str) {
        info!("🔄 Lead {id}: {detail}");
        self.telemetry.record("status", format!("{id}: {detail}")).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    async fn engine(dir: &PathBuf) -> (StatusEngine, Arc<LeadStore>) {
        let store = Arc::new(LeadStore::open(dir));
        let telemetry = Arc::new(Telemetry::open(dir));
        store
            .create(Lead::new("L1", "Corner Cafe", "905551112233"))
            .await
            .unwrap();
        (StatusEngine::new(store.clone(), telemetry), store)
    }

    #[tokio::test]
    async fn test_number_not_found_forces_phone_axis() {
        let dir = scratch("leadpilot-status-nnf");
        let (engine, store) = engine(&dir).await;

        engine.set_phone_status("L1", PhoneStatus::Sent).await.unwrap();
        let lead = engine
            .set_channel_status("L1", ChannelStatus::NumberNotFound)
            .await
            .unwrap();
        assert_eq!(lead.channel_status, ChannelStatus::NumberNotFound);
        assert_eq!(lead.phone_status, PhoneStatus::NotSent);
        assert!(lead.next_eligible.is_none());

        // The store holds the same combined result.
        let stored = store.get("L1").await.unwrap();
        assert_eq!(stored.phone_status, PhoneStatus::NotSent);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_confirm_sent_promotes_untouched_channel_axis() {
        let dir = scratch("leadpilot-status-promote");
        let (engine, _) = engine(&dir).await;

        let lead = engine.confirm_sent("L1", 1800).await.unwrap();
        assert_eq!(lead.phone_status, PhoneStatus::Sent);
        assert_eq!(lead.channel_status, ChannelStatus::Pending);
        assert!(lead.next_eligible.is_some());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_confirm_sent_keeps_advanced_channel_axis() {
        let dir = scratch("leadpilot-status-keep");
        let (engine, _) = engine(&dir).await;

        engine
            .set_channel_status("L1", ChannelStatus::Interested)
            .await
            .unwrap();
        let lead = engine.confirm_sent("L1", 1800).await.unwrap();
        assert_eq!(lead.channel_status, ChannelStatus::Interested);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_reset_clears_both_axes_and_two_step() {
        let dir = scratch("leadpilot-status-reset");
        let (engine, store) = engine(&dir).await;

        store
            .patch(
                "L1",
                &LeadPatch {
                    two_step: Some(TwoStepState::GreetingSent),
                    prepared_message: Some(Some("hello".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        engine.confirm_sent("L1", 1800).await.unwrap();

        let lead = engine.reset("L1").await.unwrap();
        assert_eq!(lead.phone_status, PhoneStatus::Empty);
        assert_eq!(lead.channel_status, ChannelStatus::NotSent);
        assert_eq!(lead.two_step, TwoStepState::None);
        assert!(lead.prepared_message.is_none());
        assert!(lead.next_eligible.is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_strategy_change_clears_prepared_message() {
        let dir = scratch("leadpilot-status-strategy");
        let (engine, store) = engine(&dir).await;

        store
            .patch(
                "L1",
                &LeadPatch {
                    prepared_message: Some(Some("old pitch".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let lead = engine.set_strategy("L1", Strategy::C).await.unwrap();
        assert_eq!(lead.strategy, Strategy::C);
        assert!(lead.prepared_message.is_none());
        assert_eq!(lead.phone_status, PhoneStatus::Empty);
        std::fs::remove_dir_all(&dir).ok();
    }
}
