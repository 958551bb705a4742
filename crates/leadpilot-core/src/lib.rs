//! # LeadPilot Core
//!
//! Shared foundation for the outreach engine: domain types, the settings
//! document, the error taxonomy, and phone-number normalization.
//!
//! Nothing here does IO beyond loading/saving the settings file — the store,
//! engine, and bridge crates build on these types.

pub mod config;
pub mod error;
pub mod phone;
pub mod types;

pub use config::BotSettings;
pub use error::{LeadPilotError, Result, SafetyRejection};
pub use types::{
    ApprovalKind, ChannelStatus, ChannelType, Lead, LeadPatch, LearningExample, MessageFlow,
    PendingApproval, PhoneStatus, SendEvent, SendKind, Strategy, TwoStepState,
};
