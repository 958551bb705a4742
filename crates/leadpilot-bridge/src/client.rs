//! WhatsApp bridge client.
//!
//! The bridge is a sidecar process exposing a small HTTP API over the
//! device-linked WhatsApp session. All calls carry the shared API key as
//! `X-Api-Key`. Presence calls (typing, seen) are best-effort: the send
//! path never fails because an indicator did not land.

use leadpilot_core::config::BridgeConfig;
use leadpilot_core::error::{LeadPilotError, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection state of the bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session linked and ready to send.
    Connected,
    /// Bridge is up but waiting for QR pairing.
    AwaitingQr,
    /// Bridge unreachable or session dead.
    Down,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    connected: bool,
    #[serde(default)]
    qr_pending: bool,
}

#[derive(Debug, Deserialize)]
struct QrResponse {
    #[serde(default)]
    qr: String,
}

pub struct BridgeClient {
    config: BridgeConfig,
    client: reqwest::Client,
}

impl BridgeClient {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("X-Api-Key", &self.config.api_key)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("X-Api-Key", &self.config.api_key)
    }

    /// Ask the bridge to start (or resume) the WhatsApp session.
    pub async fn session_start(&self) -> Result<()> {
        let response = self
            .post("api/session/start")
            .json(&serde_json::json!({ "session": self.config.session }))
            .send()
            .await
            .map_err(|e| LeadPilotError::Dependency(format!("bridge session start failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LeadPilotError::Dependency(format!(
                "bridge session start error {status}: {text}"
            )));
        }
        debug!("📱 Bridge session start requested");
        Ok(())
    }

    /// Probe the session with a short timeout. An unreachable bridge maps
    /// to `SessionState::Down` rather than an error, so status polling
    /// stays cheap for callers.
    pub async fn session_status(&self) -> SessionState {
        let result = self
            .get("api/session/status")
            .timeout(Duration::from_secs(self.config.probe_timeout_secs))
            .send()
            .await;

        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!("Bridge status probe returned {}", r.status());
                return SessionState::Down;
            }
            Err(e) => {
                debug!("Bridge status probe failed: {e}");
                return SessionState::Down;
            }
        };

        match response.json::<StatusResponse>().await {
            Ok(s) if s.connected => SessionState::Connected,
            Ok(s) if s.qr_pending => SessionState::AwaitingQr,
            Ok(_) => SessionState::Down,
            Err(e) => {
                debug!("Bridge status body unreadable: {e}");
                SessionState::Down
            }
        }
    }

    /// Fetch the current pairing QR payload, if one is pending.
    pub async fn qr_fetch(&self) -> Result<Option<String>> {
        let response = self
            .get("api/session/qr")
            .timeout(Duration::from_secs(self.config.probe_timeout_secs))
            .send()
            .await
            .map_err(|e| LeadPilotError::Dependency(format!("bridge QR fetch failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(LeadPilotError::Dependency(format!(
                "bridge QR fetch error {}",
                response.status()
            )));
        }
        let qr: QrResponse = response
            .json()
            .await
            .map_err(|e| LeadPilotError::Dependency(format!("invalid QR response: {e}")))?;
        Ok(if qr.qr.is_empty() { None } else { Some(qr.qr) })
    }

    /// Deliver a text message. The recipient is a normalized digit string.
    pub async fn send_message(&self, phone: &str, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "session": self.config.session,
            "to": phone,
            "text": text,
        });

        let response = self
            .post("api/messages/send")
            .json(&body)
            .send()
            .await
            .map_err(|e| LeadPilotError::Dependency(format!("bridge send failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LeadPilotError::Dependency(format!(
                "bridge send error {status}: {text}"
            )));
        }
        debug!("📤 Bridge delivered message to {phone}");
        Ok(())
    }

    /// Show a typing indicator to the recipient. Best-effort.
    pub async fn start_typing(&self, phone: &str) {
        self.presence("api/presence/typing/start", phone).await;
    }

    /// Clear the typing indicator. Best-effort.
    pub async fn stop_typing(&self, phone: &str) {
        self.presence("api/presence/typing/stop", phone).await;
    }

    /// Mark the conversation as seen. Best-effort.
    pub async fn mark_seen(&self, phone: &str) {
        self.presence("api/presence/seen", phone).await;
    }

    async fn presence(&self, path: &str, phone: &str) {
        let body = serde_json::json!({
            "session": self.config.session,
            "to": phone,
        });
        if let Err(e) = self.post(path).json(&body).send().await {
            warn!("Presence call {path} failed (ignored): {e}");
        }
    }

    /// Fallback deep link for manual delivery when the bridge is down:
    /// opens the conversation with the text prefilled.
    pub fn manual_link(phone: &str, text: &str) -> String {
        let encoded: String = text
            .bytes()
            .flat_map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    vec![b as char]
                }
                _ => format!("%{b:02X}").chars().collect(),
            })
            .collect();
        format!("whatsapp://send?phone={phone}&text={encoded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_link_encodes_text() {
        let link = BridgeClient::manual_link("905551112233", "Merhaba! Nasılsınız?");
        assert!(link.starts_with("whatsapp://send?phone=905551112233&text="));
        assert!(!link.contains(' '));
        assert!(link.contains("Merhaba%21"));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = BridgeClient::new(BridgeConfig {
            base_url: "http://localhost:3000/".into(),
            ..BridgeConfig::default()
        });
        assert_eq!(
            client.url("api/session/status"),
            "http://localhost:3000/api/session/status"
        );
    }
}
