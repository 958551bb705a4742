//! Domain types for the outreach engine.
//!
//! Statuses are closed enumerations with a separate label table for
//! presentation — logic never branches on a freeform display string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which channel a lead is reachable on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    #[default]
    WhatsApp,
    CallOnly,
    Email,
    Instagram,
    Web,
    Other,
}

impl ChannelType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::WhatsApp => "WhatsApp",
            Self::CallOnly => "Call Only",
            Self::Email => "Email",
            Self::Instagram => "Instagram",
            Self::Web => "Web",
            Self::Other => "Other",
        }
    }
}

/// Phone-contact axis of the status pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhoneStatus {
    #[default]
    Empty,
    NotSent,
    Requested,
    Sent,
    InProcess,
    /// Human-reviewed and approved — kept distinct from `Sent` so audit
    /// trails can tell reviewed sends from automated ones.
    Ready,
}

impl PhoneStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Empty => "—",
            Self::NotSent => "Not Sent",
            Self::Requested => "Requested",
            Self::Sent => "Sent",
            Self::InProcess => "In Process",
            Self::Ready => "Approved",
        }
    }
}

/// Channel-reply axis of the status pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    NotSent,
    Pending,
    Accepted,
    Rejected,
    Interested,
    DemoScheduled,
    NumberNotFound,
    EmailRequested,
}

impl ChannelStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotSent => "Not Sent",
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
            Self::Interested => "Interested",
            Self::DemoScheduled => "Demo Scheduled",
            Self::NumberNotFound => "Number Not Found",
            Self::EmailRequested => "Email Requested",
        }
    }

    /// Statuses that count as "contacted" in the funnel.
    pub fn is_contacted(&self) -> bool {
        !matches!(self, Self::NotSent | Self::NumberNotFound)
    }

    /// Statuses that count as "interested" in the funnel.
    pub fn is_interested(&self) -> bool {
        matches!(self, Self::Accepted | Self::Interested | Self::DemoScheduled)
    }
}

/// Named message strategy/persona, selectable per lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Strategy {
    #[default]
    A,
    B,
    C,
    D,
    E,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::A => "A — The Visionary",
            Self::B => "B — The Neighbor",
            Self::C => "C — The Analyst",
            Self::D => "D — The Closer",
            Self::E => "E — The Optimizer",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            "E" => Some(Self::E),
            _ => None,
        }
    }
}

/// Single-shot pitch, or greeting-then-pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageFlow {
    #[default]
    Single,
    TwoStep,
}

/// Sub-state of a two-step flow. Monotonic within one flow instance;
/// only a full status reset returns it to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TwoStepState {
    #[default]
    None,
    GreetingSent,
    MainSent,
}

/// One prospective customer tracked through the funnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    /// Immutable, unique across the store.
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub city: String,
    /// Free-text review snippet used by interpolating strategies.
    #[serde(default)]
    pub last_review: String,
    #[serde(default)]
    pub channel: ChannelType,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub flow: MessageFlow,
    #[serde(default)]
    pub two_step: TwoStepState,
    #[serde(default)]
    pub phone_status: PhoneStatus,
    #[serde(default)]
    pub channel_status: ChannelStatus,
    /// Composed text for the current step. Reused verbatim until it is
    /// superseded (strategy change, or a greeting going out clears the slot
    /// for the main message).
    #[serde(default)]
    pub prepared_message: Option<String>,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    /// Free-form operator classification, e.g. "needs follow-up".
    #[serde(default)]
    pub service_tag: Option<String>,
    /// Cooldown anchor: the lead is eligible for its next send once this
    /// instant has passed. The UI countdown is derived from it on read.
    #[serde(default)]
    pub next_eligible: Option<DateTime<Utc>>,
}

impl Lead {
    /// A fresh lead in the initial status pair.
    pub fn new(id: impl Into<String>, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
            city: String::new(),
            last_review: String::new(),
            channel: ChannelType::WhatsApp,
            strategy: Strategy::A,
            flow: MessageFlow::Single,
            two_step: TwoStepState::None,
            phone_status: PhoneStatus::Empty,
            channel_status: ChannelStatus::NotSent,
            prepared_message: None,
            last_activity: None,
            service_tag: None,
            next_eligible: None,
        }
    }

    /// Seconds until this lead is eligible for its next send (0 if ready now).
    /// Derived, never stored as an authoritative clock.
    pub fn countdown_secs(&self, now: DateTime<Utc>) -> i64 {
        self.next_eligible
            .map(|t| (t - now).num_seconds().max(0))
            .unwrap_or(0)
    }
}

/// A merged partial update applied to a lead as one unit.
///
/// Cross-field forced transitions (e.g. NumberNotFound forcing the phone
/// axis to NotSent) are expressed through a single patch so a concurrent
/// reader can never observe a half-applied state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub last_review: Option<String>,
    pub channel: Option<ChannelType>,
    pub strategy: Option<Strategy>,
    pub flow: Option<MessageFlow>,
    pub two_step: Option<TwoStepState>,
    pub phone_status: Option<PhoneStatus>,
    pub channel_status: Option<ChannelStatus>,
    /// `Some(None)` clears the prepared message, `Some(Some(_))` replaces it.
    pub prepared_message: Option<Option<String>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub service_tag: Option<Option<String>>,
    pub next_eligible: Option<Option<DateTime<Utc>>>,
}

impl LeadPatch {
    /// Apply this patch to a lead, last-writer-wins per field.
    pub fn apply(&self, lead: &mut Lead) {
        if let Some(v) = &self.name {
            lead.name = v.clone();
        }
        if let Some(v) = &self.phone {
            lead.phone = v.clone();
        }
        if let Some(v) = &self.city {
            lead.city = v.clone();
        }
        if let Some(v) = &self.last_review {
            lead.last_review = v.clone();
        }
        if let Some(v) = self.channel {
            lead.channel = v;
        }
        if let Some(v) = self.strategy {
            lead.strategy = v;
        }
        if let Some(v) = self.flow {
            lead.flow = v;
        }
        if let Some(v) = self.two_step {
            lead.two_step = v;
        }
        if let Some(v) = self.phone_status {
            lead.phone_status = v;
        }
        if let Some(v) = self.channel_status {
            lead.channel_status = v;
        }
        if let Some(v) = &self.prepared_message {
            lead.prepared_message = v.clone();
        }
        if let Some(v) = self.last_activity {
            lead.last_activity = Some(v);
        }
        if let Some(v) = &self.service_tag {
            lead.service_tag = v.clone();
        }
        if let Some(v) = self.next_eligible {
            lead.next_eligible = v;
        }
    }

    pub fn is_empty(&self) -> bool {
        serde_json::to_value(self)
            .map(|v| v.as_object().is_some_and(|o| o.values().all(|x| x.is_null())))
            .unwrap_or(false)
    }
}

/// What kind of message a pending approval covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    /// A bot-proposed first/outbound message.
    Outbound,
    /// A bot-proposed reply to an incoming message.
    Reply,
}

/// Ephemeral record of a bot-proposed message awaiting human review.
/// Destroyed on resolution — a pending approval never survives its own
/// approve/edit/skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApproval {
    pub id: String,
    pub lead_id: String,
    pub proposed_text: String,
    pub kind: ApprovalKind,
    /// The incoming message being replied to, for operator context.
    #[serde(default)]
    pub last_incoming: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingApproval {
    pub fn new(
        lead_id: &str,
        proposed_text: &str,
        kind: ApprovalKind,
        last_incoming: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id: lead_id.to_string(),
            proposed_text: proposed_text.to_string(),
            kind,
            last_incoming,
            created_at: Utc::now(),
        }
    }
}

/// Durable record of a human edit to a bot proposal. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningExample {
    /// The incoming message (or lead context) the bot was responding to.
    pub input: String,
    pub original_text: String,
    pub approved_text: String,
    #[serde(default)]
    pub rationale: String,
    pub recorded_at: DateTime<Utc>,
}

/// Initial contact vs. follow-up, derived from the send journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendKind {
    Initial,
    FollowUp,
}

/// Durable append-only record of one transmitted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEvent {
    pub lead_id: String,
    pub phone: String,
    pub channel: ChannelType,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub kind: SendKind,
}
