//! Strategy templates and the two-step message flow.
//!
//! Composition is deterministic and idempotent: an existing prepared
//! message is returned verbatim, and templates never consult a clock or
//! RNG. The optional text-generation rewrite sits on top; when it misses,
//! the template stands and the miss is noted in the result, never raised.

use leadpilot_bridge::textgen::{TextGenClient, TextGenOutcome};
use leadpilot_core::types::{Lead, MessageFlow, Strategy, TwoStepState};
use tracing::debug;

/// The outcome of composing the next message for a lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    pub text: String,
    /// Two-step sub-state the lead should hold after this text is sent.
    pub advance_to: TwoStepState,
    /// Whether the text came from the generation service or the template.
    pub generated: bool,
}

pub struct Composer {
    textgen: TextGenClient,
}

impl Composer {
    pub fn new(textgen: TextGenClient) -> Self {
        Self { textgen }
    }

    /// Compose the next message for this lead.
    pub async fn compose(&self, lead: &Lead) -> Composed {
        if let Some(prepared) = &lead.prepared_message {
            return Composed {
                text: prepared.clone(),
                advance_to: advance_after_send(lead),
                generated: false,
            };
        }

        if lead.flow == MessageFlow::TwoStep && lead.two_step == TwoStepState::None {
            // The greeting is intentionally generic; personalization waits
            // for the main message.
            return Composed {
                text: greeting(&lead.name),
                advance_to: TwoStepState::GreetingSent,
                generated: false,
            };
        }

        let draft = template(lead);
        let advance_to = advance_after_send(lead);

        if self.textgen.is_enabled() && lead.strategy != Strategy::A {
            let strategy_code = format!("{:?}", lead.strategy);
            match self
                .textgen
                .rewrite(&lead.name, &lead.city, &sanitize_review(&lead.last_review), &strategy_code, &draft)
                .await
            {
                TextGenOutcome::Generated(text) => {
                    return Composed {
                        text,
                        advance_to,
                        generated: true,
                    };
                }
                TextGenOutcome::Fallback => {
                    debug!("Text generation unavailable for {}, using template", lead.id);
                }
            }
        }

        Composed {
            text: draft,
            advance_to,
            generated: false,
        }
    }
}

/// The two-step sub-state after the composed text goes out. Single-flow
/// leads never leave `None`, and a two-step lead that has not greeted yet
/// can only advance to GreetingSent — never straight to MainSent.
fn advance_after_send(lead: &Lead) -> TwoStepState {
    match lead.flow {
        MessageFlow::Single => TwoStepState::None,
        MessageFlow::TwoStep if lead.two_step == TwoStepState::None => TwoStepState::GreetingSent,
        MessageFlow::TwoStep => TwoStepState::MainSent,
    }
}

/// Short opener used by every two-step flow regardless of strategy.
pub fn greeting(name: &str) -> String {
    format!("Merhaba {name}! 👋 Size kısa bir konuda ulaşmak istemiştim, müsait olduğunuzda yazabilir miyim?")
}

/// The deterministic template for a lead's strategy.
pub fn template(lead: &Lead) -> String {
    let name = lead.name.trim();
    let review = sanitize_review(&lead.last_review);
    match lead.strategy {
        // Fixed pitch, no interpolation.
        Strategy::A => "Merhaba! İşletmeler için müşteri yorumlarını otomatik yanıtlayan ve \
                        yeni müşteri kazandıran bir asistan geliştiriyoruz. Kısaca tanıtmamı \
                        ister misiniz? 🚀"
            .to_string(),
        Strategy::B => format!(
            "Merhaba {name}! Mahalleden geçerken işletmenizi fark ettim ve yorumlarınıza \
             göz attım — \"{review}\" gerçekten güzel bir geri bildirim. Müşterilerinizle \
             bu bağı büyütecek bir aracımız var, kısaca bahsedebilir miyim?"
        ),
        Strategy::C => format!(
            "Merhaba {name}, son dönem yorumlarınızı inceledim. \"{review}\" gibi geri \
             bildirimler görünürlüğünüzü doğrudan etkiliyor. Yorum yönetimini otomatikleştiren \
             bir çözümle bu etkiyi ölçülebilir şekilde artırabiliriz. Detay paylaşayım mı?"
        ),
        Strategy::D => format!(
            "Merhaba {name}! \"{review}\" — bu yorumu görünce yazmak istedim. Benzer \
             işletmelerde müşteri dönüşünü belirgin şekilde artırdık. Bu hafta 10 dakikalık \
             bir görüşme ayarlayabilir miyiz?"
        ),
        Strategy::E => format!(
            "Merhaba {name}, işletmenizin yorum profiline baktım. \"{review}\" güçlü bir \
             başlangıç; yanıt hızı ve tutarlılıkla bunu çok daha ileri taşıyabilirsiniz. \
             Nasıl yaptığımızı kısaca anlatayım mı?"
        ),
    }
}

/// Strip quote characters so review excerpts nest cleanly inside the
/// template's own quoting.
pub fn sanitize_review(review: &str) -> String {
    review
        .chars()
        .filter(|c| !matches!(c, '"' | '\u{201C}' | '\u{201D}' | '\'' | '\u{2018}' | '\u{2019}'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadpilot_core::config::TextGenConfig;

    fn composer() -> Composer {
        Composer::new(TextGenClient::new(TextGenConfig::default()))
    }

    fn lead() -> Lead {
        let mut lead = Lead::new("L1", "Corner Cafe", "905551112233");
        lead.city = "Istanbul".into();
        lead.last_review = "\"Harika kahve!\"".into();
        lead
    }

    #[tokio::test]
    async fn test_strategy_a_is_fixed_and_repeatable() {
        let composer = composer();
        let lead = lead();
        let first = composer.compose(&lead).await;
        let second = composer.compose(&lead).await;
        assert_eq!(first.text, second.text);
        assert!(!first.text.contains("Corner Cafe"));
        assert!(!first.generated);
    }

    #[tokio::test]
    async fn test_prepared_message_is_returned_verbatim() {
        let composer = composer();
        let mut lead = lead();
        lead.prepared_message = Some("already composed".into());
        lead.strategy = Strategy::C;
        let composed = composer.compose(&lead).await;
        assert_eq!(composed.text, "already composed");
    }

    #[tokio::test]
    async fn test_interpolating_strategies_use_name_and_clean_review() {
        let composer = composer();
        let mut lead = lead();
        lead.strategy = Strategy::B;
        let composed = composer.compose(&lead).await;
        assert!(composed.text.contains("Corner Cafe"));
        assert!(composed.text.contains("Harika kahve!"));
        // The review's own quotes are stripped, only the template's remain.
        assert!(composed.text.contains("\"Harika kahve!\""));
    }

    #[tokio::test]
    async fn test_two_step_starts_with_greeting() {
        let composer = composer();
        let mut lead = lead();
        lead.flow = MessageFlow::TwoStep;
        lead.strategy = Strategy::D;

        let first = composer.compose(&lead).await;
        assert_eq!(first.advance_to, TwoStepState::GreetingSent);
        assert!(!first.text.contains("görüşme"));

        lead.two_step = TwoStepState::GreetingSent;
        let second = composer.compose(&lead).await;
        assert_eq!(second.advance_to, TwoStepState::MainSent);
        assert!(second.text.contains("Corner Cafe"));
    }

    #[tokio::test]
    async fn test_two_step_never_skips_greeting_even_with_prepared_text() {
        let composer = composer();
        let mut lead = lead();
        lead.flow = MessageFlow::TwoStep;
        lead.prepared_message = Some("operator draft".into());
        let composed = composer.compose(&lead).await;
        assert_eq!(composed.advance_to, TwoStepState::GreetingSent);
    }

    #[test]
    fn test_sanitize_review_strips_quotes() {
        assert_eq!(sanitize_review("  \u{201C}Çok iyi\u{201D} "), "Çok iyi");
        assert_eq!(sanitize_review("'fine'"), "fine");
    }
}
