//! Outreach engine: the decision-making layer between the lead store and
//! the messaging bridge.
//!
//! - `status`: the dual-axis lead status machine.
//! - `composer`: strategy templates and the two-step message flow.
//! - `throttle`: admission checks and jittered dispatch.
//! - `approval`: the human-in-the-loop gate.
//! - `telemetry`: bounded activity feed and funnel counters.

pub mod approval;
pub mod composer;
pub mod status;
pub mod telemetry;
pub mod throttle;

pub use approval::ApprovalGate;
pub use composer::{Composed, Composer};
pub use status::StatusEngine;
pub use telemetry::{Funnel, Telemetry, TelemetryEvent};
pub use throttle::{Admission, DispatchController, DispatchOutcome, MessageSender, check_admission};
