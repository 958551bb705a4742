//! LeadPilot error taxonomy.
//!
//! Four families with different handling contracts:
//! - `Validation`: rejected locally, surfaced to the caller, never logged
//!   as a telemetry event.
//! - `Safety`: a correct refusal by the throttle controller, not a failure.
//!   Logged and surfaced with the specific reason so the operator can decide
//!   to wait, override, or switch to manual send.
//! - `Dependency`: an external service is down; callers degrade to a
//!   fallback (template text, manual send link) instead of aborting.
//! - `Invariant`: fatal to the single request that hit it; the store patch
//!   is always the last step so these can never corrupt lead data.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LeadPilotError>;

/// A refusal from the dispatch throttle controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SafetyRejection {
    #[error("security lock active: {phone} is not on the allow-list")]
    SecurityLock { phone: String },

    #[error("daily send cap reached ({sent_today}/{cap})")]
    DailyLimitExceeded { sent_today: u32, cap: u32 },

    #[error("lead is cooling down: {remaining_secs}s until next eligible send")]
    Cooldown { remaining_secs: i64 },
}

#[derive(Debug, Error)]
pub enum LeadPilotError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("dispatch refused: {0}")]
    Safety(#[from] SafetyRejection),

    #[error("dependency unavailable: {0}")]
    Dependency(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LeadPilotError {
    /// Shorthand for an unknown-lead validation error.
    pub fn unknown_lead(id: &str) -> Self {
        Self::Validation(format!("unknown lead id: {id}"))
    }

    /// True when the caller should degrade to a fallback rather than fail.
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::Dependency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_rejection_messages_name_the_reason() {
        let e = SafetyRejection::DailyLimitExceeded { sent_today: 5, cap: 5 };
        assert!(e.to_string().contains("daily send cap"));
        assert!(e.to_string().contains("5/5"));

        let e = SafetyRejection::SecurityLock { phone: "905559999999".into() };
        assert!(e.to_string().contains("905559999999"));
    }

    #[test]
    fn test_degradable() {
        assert!(LeadPilotError::Dependency("bridge down".into()).is_degradable());
        assert!(!LeadPilotError::Validation("bad id".into()).is_degradable());
    }
}
