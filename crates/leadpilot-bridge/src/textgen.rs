//! Text generation client.
//!
//! Optional service that rewrites template copy into personalized outreach
//! text. Failures and timeouts are signaled as a fallback outcome so the
//! composer can downgrade to its template without treating the miss as an
//! error.

use leadpilot_core::config::TextGenConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// What the composer should use as the final text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextGenOutcome {
    /// Service produced a usable rewrite.
    Generated(String),
    /// Service disabled, unreachable, timed out, or returned junk.
    /// The caller keeps its template text.
    Fallback,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    lead_name: &'a str,
    city: &'a str,
    review_excerpt: &'a str,
    strategy: &'a str,
    draft: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: String,
}

pub struct TextGenClient {
    config: TextGenConfig,
    client: reqwest::Client,
}

impl TextGenClient {
    pub fn new(config: TextGenConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.base_url.is_empty()
    }

    /// Ask the service to rewrite `draft` for the given lead. Never errors:
    /// anything short of a non-empty rewrite is a fallback.
    pub async fn rewrite(
        &self,
        lead_name: &str,
        city: &str,
        review_excerpt: &str,
        strategy: &str,
        draft: &str,
    ) -> TextGenOutcome {
        if !self.is_enabled() {
            return TextGenOutcome::Fallback;
        }

        let url = format!("{}/generate", self.config.base_url.trim_end_matches('/'));
        let request = GenerateRequest {
            lead_name,
            city,
            review_excerpt,
            strategy,
            draft,
        };

        let result = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.config.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&request)
            .send()
            .await;

        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("Text generation returned {}, keeping template", r.status());
                return TextGenOutcome::Fallback;
            }
            Err(e) => {
                warn!("Text generation unavailable, keeping template: {e}");
                return TextGenOutcome::Fallback;
            }
        };

        match response.json::<GenerateResponse>().await {
            Ok(body) if !body.text.trim().is_empty() => {
                debug!("✨ Text generation rewrote draft for {lead_name}");
                TextGenOutcome::Generated(body.text.trim().to_string())
            }
            Ok(_) => {
                warn!("Text generation returned empty body, keeping template");
                TextGenOutcome::Fallback
            }
            Err(e) => {
                warn!("Text generation body unreadable, keeping template: {e}");
                TextGenOutcome::Fallback
            }
        }
    }
}
