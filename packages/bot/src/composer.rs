//! Application message generation.
//!
//! Each new offer gets a short German message written from the offer's
//! free text and the applicant's profile. Claude does the writing; a
//! canned template stands in when no API key is configured.

use anthropic_client::{AnthropicClient, Message, MessagesRequest};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use wg_gesucht_client::OfferDetail;

/// Token budget for one generated message.
const MAX_MESSAGE_TOKENS: u32 = 2000;

/// Sampling temperature. Some variety keeps repeated applications from
/// reading identical.
const MESSAGE_TEMPERATURE: f32 = 0.7;

/// Writes the contact message for an offer (trait to allow mocking).
#[async_trait]
pub trait MessageComposer: Send + Sync {
    async fn compose(&self, offer: &OfferDetail) -> Result<String>;
}

/// Claude-backed composer producing personalized German messages.
pub struct LlmComposer {
    client: AnthropicClient,
    model: String,
    applicant_profile: String,
}

impl LlmComposer {
    pub fn new(
        client: AnthropicClient,
        model: impl Into<String>,
        applicant_profile: impl Into<String>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            applicant_profile: applicant_profile.into(),
        }
    }

    fn build_prompt(description: &str, profile: &str) -> String {
        format!(
            "Du schreibst eine Nachricht für eine WG-Bewerbung auf WG-Gesucht. Deine Aufgabe \
ist es, eine lockere, authentische Nachricht zu verfassen, die zu der unten beschriebenen \
Person passt und gleichzeitig das Interesse der potenziellen Mitbewohner weckt.

WG-Anzeige:
{description}

Deine Infos:
{profile}

Schreibe eine Nachricht und beachte dabei:

1. Beginne direkt und locker, ohne formelle Anrede oder Bewerbungsfloskeln. Stelle dich kurz vor.
2. Erzähle etwas über deine Hobbys, Interessen und Erfahrungen, die dich als interessanten Mitbewohner auszeichnen.
3. Sei authentisch und natürlich, als würdest du mit Freunden schreiben. Vermeide jegliche formelle Sprache.
4. Halte die Nachricht kurz und prägnant (max. 1200 Zeichen).
5. Erwähne 1-2 Dinge, auf die du dich in der WG freuen würdest oder stelle eine konkrete Frage zur WG.
6. Schließe locker ab, ohne förmliche Grußformeln.

Wichtig:
- Keine Sätze wie \"Ich bewerbe mich hiermit...\" oder \"Ich freue mich, mich vorzustellen...\"
- Keine förmlichen Anreden oder Grußformeln
- Keine allgemeinen Aussagen über WGs oder Wohnungssuche
- Schreibe, als würdest du eine Nachricht an potenzielle neue Freunde schreiben
- Antworte nur mit der Nachricht selbst, ohne Einleitung oder Kommentar

Die Nachricht sollte sich natürlich und ungezwungen lesen. Konzentriere dich darauf, deine \
Persönlichkeit und dein Interesse an der WG-Gemeinschaft zu vermitteln, anstatt zu sehr auf \
die Details der Anzeige einzugehen."
        )
    }
}

#[async_trait]
impl MessageComposer for LlmComposer {
    async fn compose(&self, offer: &OfferDetail) -> Result<String> {
        let prompt = Self::build_prompt(&offer.description(), &self.applicant_profile);
        let request = MessagesRequest::new(&self.model, MAX_MESSAGE_TOKENS)
            .temperature(MESSAGE_TEMPERATURE)
            .message(Message::user(prompt));

        let response = self
            .client
            .messages(request)
            .await
            .context("Message generation failed")?;

        let message = response.text().trim().to_string();
        if message.is_empty() {
            bail!("Model returned an empty message");
        }
        Ok(message)
    }
}

/// Canned composer for dry runs without an API key.
pub struct TemplateComposer {
    applicant_profile: Option<String>,
}

impl TemplateComposer {
    pub fn new(applicant_profile: Option<String>) -> Self {
        Self { applicant_profile }
    }
}

#[async_trait]
impl MessageComposer for TemplateComposer {
    async fn compose(&self, offer: &OfferDetail) -> Result<String> {
        let mut message = format!(
            "Hallo! Ich habe eure Anzeige \"{}\" gesehen und hätte großes Interesse an dem \
Zimmer. Ich würde mich freuen, euch kennenzulernen. Wann würde es euch für ein kurzes \
Gespräch passen?",
            offer.offer_title
        );
        if let Some(profile) = &self.applicant_profile {
            message.push_str("\n\nKurz zu mir: ");
            message.push_str(profile.trim());
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_offer() -> OfferDetail {
        OfferDetail {
            offer_title: "Helles Zimmer in Kreuzberg".to_string(),
            url: "https://www.wg-gesucht.de/11369772.html".to_string(),
            freetext_property_description: "Das Zimmer hat einen Balkon.".to_string(),
            freetext_area_description: String::new(),
            freetext_flatshare: "Wir sind eine entspannte 3er WG.".to_string(),
            freetext_other: String::new(),
        }
    }

    #[test]
    fn test_prompt_embeds_offer_and_profile() {
        let offer = sample_offer();
        let prompt = LlmComposer::build_prompt(&offer.description(), "Ich koche gern.");

        assert!(prompt.contains("Das Zimmer hat einen Balkon."));
        assert!(prompt.contains("Wir sind eine entspannte 3er WG."));
        assert!(prompt.contains("Ich koche gern."));
        assert!(prompt.contains("max. 1200 Zeichen"));
    }

    #[tokio::test]
    async fn test_template_composer_mentions_offer_title() {
        let composer = TemplateComposer::new(Some("Ich koche gern.".to_string()));
        let message = composer.compose(&sample_offer()).await.unwrap();

        assert!(message.contains("Helles Zimmer in Kreuzberg"));
        assert!(message.contains("Ich koche gern."));
    }

    #[tokio::test]
    async fn test_template_composer_is_deterministic() {
        let composer = TemplateComposer::new(None);
        let first = composer.compose(&sample_offer()).await.unwrap();
        let second = composer.compose(&sample_offer()).await.unwrap();

        assert_eq!(first, second);
    }
}
