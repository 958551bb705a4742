//! HTTP clients for external services.
//!
//! `client` talks to the local WhatsApp bridge (session lifecycle, QR
//! pairing, message delivery, presence signals). `textgen` talks to the
//! optional text generation service used to personalize outreach copy.

pub mod client;
pub mod textgen;

pub use client::{BridgeClient, SessionState};
pub use textgen::{TextGenClient, TextGenOutcome};
