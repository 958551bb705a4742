//! Dispatch throttle controller.
//!
//! Every outbound send passes one admission ladder, in order: security
//! lock, daily cap, per-lead cooldown, business hours. The first three
//! reject; business hours defers. An admitted send waits a randomized
//! thinking-time jitter (cancellable on shutdown), delivers, journals the
//! event, and advances the lead in one combined patch. A rejected send
//! leaves the lead byte-for-byte untouched.

use crate::composer::Composed;
use crate::status::StatusEngine;
use crate::telemetry::Telemetry;
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use leadpilot_bridge::client::BridgeClient;
use leadpilot_core::config::{BotSettings, BusinessHours};
use leadpilot_core::error::{LeadPilotError, Result, SafetyRejection};
use leadpilot_core::phone::{clean_phone, same_number};
use leadpilot_core::types::{
    ChannelStatus, Lead, LeadPatch, MessageFlow, PhoneStatus, SendEvent, TwoStepState,
};
use leadpilot_store::{LeadStore, SendJournal};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Delivery seam between the controller and the bridge, so dispatch logic
/// is testable without a live session.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn deliver(&self, phone: &str, text: &str) -> Result<()>;

    /// Human-like presence signals before a send. Best-effort.
    async fn simulate_presence(&self, _phone: &str) {}
}

#[async_trait]
impl MessageSender for BridgeClient {
    async fn deliver(&self, phone: &str, text: &str) -> Result<()> {
        self.send_message(phone, text).await
    }

    async fn simulate_presence(&self, phone: &str) {
        self.mark_seen(phone).await;
        self.start_typing(phone).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        self.stop_typing(phone).await;
    }
}

/// Result of the admission ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Go,
    /// Outside business hours: queued until the next window opens.
    Deferred { open_hour: u32 },
}

/// Result of a full dispatch attempt.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Sent(SendEvent),
    Deferred { open_hour: u32 },
    /// Shutdown arrived during the jitter wait; nothing was sent.
    Cancelled,
}

pub struct DispatchController {
    store: Arc<LeadStore>,
    journal: Arc<SendJournal>,
    status: Arc<StatusEngine>,
    telemetry: Arc<Telemetry>,
    sender: Arc<dyn MessageSender>,
    shutdown: watch::Receiver<bool>,
    jitter_secs: (u64, u64),
}

impl DispatchController {
    pub fn new(
        store: Arc<LeadStore>,
        journal: Arc<SendJournal>,
        status: Arc<StatusEngine>,
        telemetry: Arc<Telemetry>,
        sender: Arc<dyn MessageSender>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            journal,
            status,
            telemetry,
            sender,
            shutdown,
            jitter_secs: (2, 8),
        }
    }

    /// Override the thinking-time jitter bounds. `(0, 0)` disables it.
    pub fn with_jitter(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.jitter_secs = (min_secs, max_secs);
        self
    }

    /// Run the admission ladder for one lead without side effects on it.
    pub async fn admit(
        &self,
        settings: &BotSettings,
        lead: &Lead,
        now: DateTime<Utc>,
        local_hour: u32,
    ) -> Result<Admission> {
        check_admission(settings, &self.journal, lead, now, local_hour).await
    }

    /// Dispatch one composed message to one lead.
    pub async fn dispatch(
        &self,
        settings: &BotSettings,
        lead_id: &str,
        composed: &Composed,
    ) -> Result<DispatchOutcome> {
        let lead = self.store.get(lead_id).await?;
        let local_hour = chrono::Local::now().hour();

        match self.admit(settings, &lead, Utc::now(), local_hour).await {
            Ok(Admission::Go) => {}
            Ok(Admission::Deferred { open_hour }) => {
                info!("⏸️ Lead {lead_id}: outside business hours, deferred to {open_hour}:00");
                self.telemetry
                    .record("throttle_defer", format!("{lead_id}: next window at {open_hour}:00"))
                    .await;
                return Ok(DispatchOutcome::Deferred { open_hour });
            }
            Err(e) => {
                warn!("🚫 Lead {lead_id}: dispatch refused: {e}");
                self.telemetry
                    .record("throttle_reject", format!("{lead_id}: {e}"))
                    .await;
                return Err(e);
            }
        }

        let target = if settings.test_mode {
            if settings.test_phone.is_empty() {
                return Err(LeadPilotError::Validation(
                    "test mode enabled but test_phone is empty".into(),
                ));
            }
            settings.test_phone.clone()
        } else {
            clean_phone(&lead.phone).ok_or_else(|| {
                LeadPilotError::Validation(format!("unroutable phone for lead {lead_id}: {}", lead.phone))
            })?
        };

        self.status
            .begin_send(lead_id, settings.per_message_delay_secs)
            .await?;

        if !self.jittered_wait().await {
            info!("🛑 Shutdown during jitter wait, lead {lead_id} not sent");
            return Ok(DispatchOutcome::Cancelled);
        }

        self.sender.simulate_presence(&target).await;
        if let Err(e) = self.sender.deliver(&target, &composed.text).await {
            self.telemetry
                .record("send_failed", format!("{lead_id}: {e}"))
                .await;
            return Err(e);
        }

        let event = self
            .journal
            .append(lead_id, &target, lead.channel, &composed.text)
            .await?;

        // Status advance, two-step sub-state, prepared slot, and fresh
        // cooldown land in one patch.
        let mut patch = LeadPatch {
            phone_status: Some(PhoneStatus::Sent),
            next_eligible: Some(Some(
                Utc::now() + chrono::Duration::seconds(settings.per_message_delay_secs as i64),
            )),
            ..Default::default()
        };
        if lead.channel_status == ChannelStatus::NotSent {
            patch.channel_status = Some(ChannelStatus::Pending);
        }
        if lead.flow == MessageFlow::TwoStep {
            patch.two_step = Some(composed.advance_to);
        }
        patch.prepared_message = if composed.advance_to == TwoStepState::GreetingSent {
            // The greeting went out; the slot now awaits the main message.
            Some(None)
        } else {
            Some(Some(composed.text.clone()))
        };
        self.store.patch(lead_id, &patch).await?;

        info!("📤 Lead {lead_id}: message delivered to {target}");
        self.telemetry
            .record("send", format!("{lead_id}: delivered ({:?})", event.kind))
            .await;
        Ok(DispatchOutcome::Sent(event))
    }

    /// Sleep a random thinking-time interval, or bail early on shutdown.
    /// Returns false when shutdown won.
    async fn jittered_wait(&self) -> bool {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return false;
        }
        let (min, max) = self.jitter_secs;
        if max == 0 {
            return true;
        }
        let wait = rand::thread_rng().gen_range(min..=max);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(wait)) => true,
            changed = shutdown.changed() => match changed {
                Ok(()) => !*shutdown.borrow(),
                Err(_) => false,
            },
        }
    }
}

/// The admission ladder, shared by every path that attempts a send,
/// autonomous dispatch and human approval resolutions alike. Order is
/// fixed: security lock, daily cap, per-lead cooldown, business hours.
pub async fn check_admission(
    settings: &BotSettings,
    journal: &SendJournal,
    lead: &Lead,
    now: DateTime<Utc>,
    local_hour: u32,
) -> Result<Admission> {
    if settings.security_lock
        && !settings
            .allowed_phones
            .iter()
            .any(|allowed| same_number(allowed, &lead.phone))
    {
        return Err(SafetyRejection::SecurityLock {
            phone: lead.phone.clone(),
        }
        .into());
    }

    let sent_today = journal.sent_today().await;
    if sent_today >= settings.daily_cap {
        return Err(SafetyRejection::DailyLimitExceeded {
            sent_today,
            cap: settings.daily_cap,
        }
        .into());
    }

    let remaining = lead.countdown_secs(now);
    if remaining > 0 {
        return Err(SafetyRejection::Cooldown {
            remaining_secs: remaining,
        }
        .into());
    }

    if let Some(hours) = &settings.business_hours
        && !hours.contains_hour(local_hour)
    {
        return Ok(Admission::Deferred {
            open_hour: next_open_hour(hours, local_hour),
        });
    }

    Ok(Admission::Go)
}

/// The next window opening after `hour`, wrapping to the earliest window
/// the following day.
fn next_open_hour(hours: &BusinessHours, hour: u32) -> u32 {
    hours
        .windows
        .iter()
        .map(|(start, _)| *start)
        .filter(|start| *start > hour)
        .min()
        .or_else(|| hours.windows.iter().map(|(start, _)| *start).min())
        .unwrap_or(hour)
}
