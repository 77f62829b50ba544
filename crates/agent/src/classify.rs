//! Intent classification: a deterministic keyword pass first, the model
//! only for messages the keywords cannot place.

use std::sync::Arc;

use async_trait::async_trait;

use parkbot_core::{Classification, DialogueTurn, Intent};

use crate::oracle::{IntentClassifier, OracleError};

const BOOKING_KEYWORDS: &[&str] = &[
    "birthday",
    "party",
    "celebrate",
    "celebration",
    "book a room",
    "book the room",
    "reserve",
    "reservation",
    "banquet",
    "turning",
    "kids party",
];

const EVENTS_KEYWORDS: &[&str] = &[
    "school trip",
    "school group",
    "class trip",
    "graduation",
    "corporate",
    "team building",
    "team-building",
    "group visit",
    "excursion",
    "field trip",
];

const GENERAL_KEYWORDS: &[&str] = &[
    "opening hours",
    "open today",
    "when do you open",
    "when do you close",
    "price",
    "prices",
    "how much",
    "ticket",
    "tickets",
    "address",
    "how to get",
    "parking",
    "age limit",
    "socks",
    "rules",
];

fn keyword_hits(text: &str, keywords: &[&str]) -> u32 {
    keywords.iter().filter(|k| text.contains(*k)).count() as u32
}

/// Scores a message against the keyword tables. More hits raise confidence,
/// capped below certainty because keywords cannot read context.
pub fn classify_by_rules(text: &str) -> Option<Classification> {
    let text = text.to_lowercase();

    let booking = keyword_hits(&text, BOOKING_KEYWORDS);
    let events = keyword_hits(&text, EVENTS_KEYWORDS);
    let general = keyword_hits(&text, GENERAL_KEYWORDS);

    if booking > 0 && booking >= events {
        let confidence = (0.7 + 0.1 * booking as f32).min(0.95);
        return Some(Classification::new(Intent::Booking, confidence));
    }
    if events > 0 {
        let confidence = (0.7 + 0.1 * events as f32).min(0.95);
        return Some(Classification::new(Intent::Events, confidence));
    }
    if general > 0 {
        let confidence = (0.6 + 0.1 * general as f32).min(0.9);
        return Some(Classification::new(Intent::General, confidence));
    }
    None
}

/// Keyword pass first, model fallback second. A model failure degrades to
/// `unknown` at low confidence so the session simply stays where it is.
pub struct ChainClassifier {
    fallback: Arc<dyn IntentClassifier>,
}

impl ChainClassifier {
    pub fn new(fallback: Arc<dyn IntentClassifier>) -> Self {
        Self { fallback }
    }
}

#[async_trait]
impl IntentClassifier for ChainClassifier {
    async fn classify(
        &self,
        text: &str,
        history: &[DialogueTurn],
    ) -> Result<Classification, OracleError> {
        if let Some(classification) = classify_by_rules(text) {
            return Ok(classification);
        }

        match self.fallback.classify(text, history).await {
            Ok(classification) => Ok(classification),
            Err(error) => {
                tracing::warn!(
                    event_name = "classifier_degraded",
                    error = %error,
                    "intent model failed; treating message as unknown"
                );
                Ok(Classification::new(Intent::Unknown, 0.3))
            }
        }
    }
}
