//! Human-in-the-loop approval gate.
//!
//! With manual approval on, bot-proposed messages park in the approval
//! book instead of dispatching. Resolving an approval is still an
//! attempted send, so approve and edit-approve run the same admission
//! ladder as autonomous dispatch before anything leaves the process.
//! A resolution that fails admission or delivery puts the pending entry
//! back, so the operator can retry; one that succeeds patches the lead
//! last, so a crash mid-resolution can drop a send but never replay one.

use crate::telemetry::Telemetry;
use crate::throttle::{MessageSender, check_admission};
use chrono::{Timelike, Utc};
use leadpilot_core::config::BotSettings;
use leadpilot_core::error::{LeadPilotError, Result};
use leadpilot_core::types::{
    ApprovalKind, ChannelStatus, Lead, LeadPatch, LearningExample, PendingApproval, PhoneStatus,
};
use leadpilot_store::{ApprovalBook, LeadStore, LearningLog, SendJournal};
use std::sync::Arc;
use tracing::info;

pub struct ApprovalGate {
    store: Arc<LeadStore>,
    book: Arc<ApprovalBook>,
    learning: Arc<LearningLog>,
    journal: Arc<SendJournal>,
    telemetry: Arc<Telemetry>,
    sender: Arc<dyn MessageSender>,
}

impl ApprovalGate {
    pub fn new(
        store: Arc<LeadStore>,
        book: Arc<ApprovalBook>,
        learning: Arc<LearningLog>,
        journal: Arc<SendJournal>,
        telemetry: Arc<Telemetry>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            store,
            book,
            learning,
            journal,
            telemetry,
            sender,
        }
    }

    /// Park a bot proposal for human review. The lead moves to InProcess so
    /// the autonomous loop does not pick it up again meanwhile. A proposal
    /// for a disabled direction is refused outright.
    pub async fn propose(
        &self,
        settings: &BotSettings,
        lead_id: &str,
        text: &str,
        kind: ApprovalKind,
        last_incoming: Option<String>,
    ) -> Result<PendingApproval> {
        match kind {
            ApprovalKind::Outbound if !settings.outbound_enabled => {
                return Err(LeadPilotError::Validation(
                    "outbound messaging is disabled".into(),
                ));
            }
            ApprovalKind::Reply if !settings.inbound_enabled => {
                return Err(LeadPilotError::Validation(
                    "inbound replies are disabled".into(),
                ));
            }
            _ => {}
        }

        self.store.get(lead_id).await?;
        let approval = PendingApproval::new(lead_id, text, kind, last_incoming);
        self.book.add(approval.clone()).await?;
        self.store
            .patch(
                lead_id,
                &LeadPatch {
                    phone_status: Some(PhoneStatus::InProcess),
                    ..Default::default()
                },
            )
            .await?;
        info!("📋 Lead {lead_id}: proposal awaiting approval");
        self.telemetry
            .record("approval_pending", format!("{lead_id}: {:?}", approval.kind))
            .await;
        Ok(approval)
    }

    pub async fn pending(&self) -> Vec<PendingApproval> {
        self.book.list().await
    }

    /// Approve: send the proposed text unchanged.
    pub async fn approve(&self, approval_id: &str, settings: &BotSettings) -> Result<Lead> {
        let approval = self.book.take(approval_id).await?;
        let lead = match self.deliver_guarded(settings, &approval, &approval.proposed_text).await {
            Ok(lead) => lead,
            Err(e) => {
                self.book.add(approval).await.ok();
                return Err(e);
            }
        };
        self.journal
            .append(&lead.id, &lead.phone, lead.channel, &approval.proposed_text)
            .await?;

        let lead = self
            .finish(&lead, approval.proposed_text.clone(), settings)
            .await?;
        info!("✅ Lead {}: proposal approved and sent", lead.id);
        self.telemetry
            .record("approval_approved", lead.id.clone())
            .await;
        Ok(lead)
    }

    /// Edit-and-approve: send the operator's rewrite and keep the
    /// before/after pair as a learning example.
    pub async fn edit_approve(
        &self,
        approval_id: &str,
        edited_text: &str,
        rationale: &str,
        settings: &BotSettings,
    ) -> Result<Lead> {
        let approval = self.book.take(approval_id).await?;
        let lead = match self.deliver_guarded(settings, &approval, edited_text).await {
            Ok(lead) => lead,
            Err(e) => {
                self.book.add(approval).await.ok();
                return Err(e);
            }
        };

        self.learning
            .append(LearningExample {
                input: approval
                    .last_incoming
                    .clone()
                    .unwrap_or_else(|| format!("lead: {}, city: {}", lead.name, lead.city)),
                original_text: approval.proposed_text.clone(),
                approved_text: edited_text.to_string(),
                rationale: rationale.to_string(),
                recorded_at: Utc::now(),
            })
            .await?;
        self.journal
            .append(&lead.id, &lead.phone, lead.channel, edited_text)
            .await?;

        let lead = self.finish(&lead, edited_text.to_string(), settings).await?;
        info!("✏️ Lead {}: proposal edited and sent", lead.id);
        self.telemetry
            .record("approval_edited", lead.id.clone())
            .await;
        Ok(lead)
    }

    /// Skip: nothing is sent. The lead carries an explicit no-reply marker
    /// so the loop does not re-propose it.
    pub async fn skip(&self, approval_id: &str) -> Result<Lead> {
        let approval = self.book.take(approval_id).await?;
        let lead = self
            .store
            .patch(
                &approval.lead_id,
                &LeadPatch {
                    phone_status: Some(PhoneStatus::NotSent),
                    prepared_message: Some(None),
                    service_tag: Some(Some("no_reply".into())),
                    ..Default::default()
                },
            )
            .await?;
        info!("⏭️ Lead {}: proposal skipped", lead.id);
        self.telemetry
            .record("approval_skipped", lead.id.clone())
            .await;
        Ok(lead)
    }

    /// Admission ladder + delivery for one resolution. Lock, cap, and
    /// cooldown apply to human-approved sends exactly as to autonomous
    /// ones; the business-hours window binds only the autonomous loop.
    async fn deliver_guarded(
        &self,
        settings: &BotSettings,
        approval: &PendingApproval,
        text: &str,
    ) -> Result<Lead> {
        let lead = self.store.get(&approval.lead_id).await?;

        let local_hour = chrono::Local::now().hour();
        if let Err(e) =
            check_admission(settings, &self.journal, &lead, Utc::now(), local_hour).await
        {
            self.telemetry
                .record("throttle_reject", format!("{}: {e}", lead.id))
                .await;
            return Err(e);
        }

        if let Err(e) = self.sender.deliver(&lead.phone, text).await {
            self.telemetry
                .record("send_failed", format!("{}: {e}", lead.id))
                .await;
            return Err(e);
        }
        Ok(lead)
    }

    /// Shared post-send patch: Ready marks a human-reviewed send, distinct
    /// from the automated Sent.
    async fn finish(&self, lead: &Lead, sent_text: String, settings: &BotSettings) -> Result<Lead> {
        let mut patch = LeadPatch {
            phone_status: Some(PhoneStatus::Ready),
            prepared_message: Some(Some(sent_text)),
            next_eligible: Some(Some(
                Utc::now() + chrono::Duration::seconds(settings.per_message_delay_secs as i64),
            )),
            ..Default::default()
        };
        if lead.channel_status == ChannelStatus::NotSent {
            patch.channel_status = Some(ChannelStatus::Pending);
        }
        self.store.patch(&lead.id, &patch).await
    }
}
