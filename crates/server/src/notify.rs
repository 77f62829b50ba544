//! Staff-chat notifier: every hand-off, escalation and wizard report lands
//! in one Telegram chat the park staff watches.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::warn;

use parkbot_agent::{NotifyError, StaffNotifier};
use parkbot_core::{format_phone, BookingChangeKind, LeadSummary, LostItemAnswers};

pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: SecretString,
    staff_chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString, staff_chat_id: String) -> Self {
        Self { http: reqwest::Client::new(), bot_token, staff_chat_id }
    }

    async fn send_once(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token.expose_secret()
        );
        let payload: Value = self
            .http
            .post(url)
            .json(&json!({"chat_id": self.staff_chat_id, "text": text}))
            .send()
            .await
            .map_err(|err| NotifyError::Delivery(err.to_string()))?
            .json()
            .await
            .map_err(|err| NotifyError::Delivery(err.to_string()))?;

        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            let description =
                payload.get("description").and_then(Value::as_str).unwrap_or("no description");
            return Err(NotifyError::Delivery(format!("sendMessage rejected: {description}")));
        }
        Ok(())
    }

    async fn deliver(&self, text: &str) -> Result<(), NotifyError> {
        match self.send_once(text).await {
            Ok(()) => Ok(()),
            Err(first) => {
                // One retry; the agent runtime keeps the lead unsent on failure
                // and tries again next turn.
                warn!(
                    event_name = "staff_notify_retry",
                    error = %first,
                    "staff notification failed; retrying once"
                );
                self.send_once(text).await
            }
        }
    }
}

fn push_line(out: &mut String, label: &str, value: &str) {
    out.push('\n');
    out.push_str(label);
    out.push_str(": ");
    out.push_str(value);
}

pub fn format_lead(summary: &LeadSummary) -> String {
    let mut out = format!(
        "New booking lead ({}, park {})",
        summary.channel_key, summary.park
    );

    if let Some(name) = &summary.customer_name {
        push_line(&mut out, "Customer", name);
    }
    if let Some(phone) = &summary.phone {
        push_line(&mut out, "Phone", &format_phone(phone));
    }
    match (&summary.child_name, summary.child_age) {
        (Some(name), Some(age)) => push_line(&mut out, "Child", &format!("{name}, turning {age}")),
        (Some(name), None) => push_line(&mut out, "Child", name),
        (None, Some(age)) => push_line(&mut out, "Child", &format!("turning {age}")),
        (None, None) => {}
    }
    match (&summary.event_date, &summary.event_time) {
        (Some(date), Some(time)) => push_line(&mut out, "Date", &format!("{date} at {time}")),
        (Some(date), None) => push_line(&mut out, "Date", date),
        (None, Some(time)) => push_line(&mut out, "Time", time),
        (None, None) => {}
    }
    if let Some(room) = &summary.room {
        push_line(&mut out, "Room", room);
    }
    let guests = match (summary.kids_count, summary.adults_count) {
        (Some(kids), Some(adults)) => Some(format!("{kids} kids, {adults} adults")),
        (Some(kids), None) => Some(format!("{kids} kids")),
        (None, Some(adults)) => Some(format!("{adults} adults")),
        (None, None) => None,
    };
    if let Some(guests) = guests {
        push_line(&mut out, "Guests", &guests);
    }
    if let Some(format) = &summary.format {
        push_line(&mut out, "Format", format);
    }
    if !summary.extras.is_empty() {
        push_line(&mut out, "Extras", &summary.extras.join(", "));
    }
    if !summary.missing_fields.is_empty() {
        push_line(&mut out, "Still missing", &summary.missing_fields.join(", "));
    }

    out
}

pub fn format_escalation(channel_key: &str, last_message: &str) -> String {
    format!("Visitor asked for a human ({channel_key})\nLast message: {last_message}")
}

pub fn format_booking_change(channel_key: &str, kind: BookingChangeKind, message: &str) -> String {
    format!(
        "Booking change request ({channel_key})\nKind: {}\nMessage: {message}",
        kind.as_str()
    )
}

pub fn format_lost_item(channel_key: &str, answers: &LostItemAnswers) -> String {
    let mut out = format!("Lost item report ({channel_key})");
    if let Some(visit_date) = &answers.visit_date {
        push_line(&mut out, "Visit date", visit_date);
    }
    if let Some(location) = &answers.location {
        push_line(&mut out, "Last seen", location);
    }
    if let Some(description) = &answers.description {
        push_line(&mut out, "Item", description);
    }
    if let Some(phone) = &answers.phone {
        push_line(&mut out, "Callback phone", &format_phone(phone));
    }
    out
}

pub fn format_photo_request(channel_key: &str, description: Option<&str>, phone: &str) -> String {
    let mut out = format!("Party photo request ({channel_key})");
    if let Some(description) = description {
        push_line(&mut out, "Details", description);
    }
    push_line(&mut out, "Phone", &format_phone(phone));
    out
}

pub fn format_photo_order(channel_key: &str, phone: &str) -> String {
    let mut out = format!("Photographer booking request ({channel_key})");
    push_line(&mut out, "Phone", &format_phone(phone));
    out
}

pub fn format_partnership(channel_key: &str, proposal: &str, phone: &str) -> String {
    let mut out = format!("Partnership proposal ({channel_key})");
    push_line(&mut out, "Proposal", proposal);
    push_line(&mut out, "Phone", &format_phone(phone));
    out
}

#[async_trait]
impl StaffNotifier for TelegramNotifier {
    async fn lead_ready(&self, summary: &LeadSummary) -> Result<(), NotifyError> {
        self.deliver(&format_lead(summary)).await
    }

    async fn escalation(&self, channel_key: &str, last_message: &str) -> Result<(), NotifyError> {
        self.deliver(&format_escalation(channel_key, last_message)).await
    }

    async fn booking_change(
        &self,
        channel_key: &str,
        kind: BookingChangeKind,
        message: &str,
    ) -> Result<(), NotifyError> {
        self.deliver(&format_booking_change(channel_key, kind, message)).await
    }

    async fn lost_item(
        &self,
        channel_key: &str,
        answers: &LostItemAnswers,
    ) -> Result<(), NotifyError> {
        self.deliver(&format_lost_item(channel_key, answers)).await
    }

    async fn photo_request(
        &self,
        channel_key: &str,
        description: Option<&str>,
        phone: &str,
    ) -> Result<(), NotifyError> {
        self.deliver(&format_photo_request(channel_key, description, phone)).await
    }

    async fn photo_order(&self, channel_key: &str, phone: &str) -> Result<(), NotifyError> {
        self.deliver(&format_photo_order(channel_key, phone)).await
    }

    async fn partnership(
        &self,
        channel_key: &str,
        proposal: &str,
        phone: &str,
    ) -> Result<(), NotifyError> {
        self.deliver(&format_partnership(channel_key, proposal, phone)).await
    }
}

#[cfg(test)]
mod tests {
    use parkbot_core::{
        BookingChangeKind, Channel, LeadId, LeadSummary, LostItemAnswers,
    };

    use super::{format_booking_change, format_lead, format_lost_item};

    fn summary() -> LeadSummary {
        LeadSummary {
            lead_id: LeadId(7),
            channel_key: "tg_42".to_string(),
            source: Channel::Telegram,
            park: "main".to_string(),
            customer_name: Some("Anna".to_string()),
            phone: Some("9123456789".to_string()),
            child_name: Some("Misha".to_string()),
            child_age: Some(7),
            event_date: Some("2026-09-12".to_string()),
            event_time: Some("16:00".to_string()),
            room: None,
            kids_count: Some(10),
            adults_count: Some(4),
            format: Some("standard".to_string()),
            extras: vec!["photographer".to_string(), "cake".to_string()],
            crm_deal_id: None,
            missing_fields: vec!["room"],
        }
    }

    #[test]
    fn lead_report_carries_every_known_slot() {
        let text = format_lead(&summary());

        assert!(text.starts_with("New booking lead (tg_42, park main)"));
        assert!(text.contains("Customer: Anna"));
        assert!(text.contains("Phone: +7 (912) 345-67-89"));
        assert!(text.contains("Child: Misha, turning 7"));
        assert!(text.contains("Date: 2026-09-12 at 16:00"));
        assert!(text.contains("Guests: 10 kids, 4 adults"));
        assert!(text.contains("Extras: photographer, cake"));
        assert!(text.contains("Still missing: room"));
        assert!(!text.contains("Room:"));
    }

    #[test]
    fn lead_report_omits_empty_slots() {
        let mut sparse = summary();
        sparse.customer_name = None;
        sparse.child_name = None;
        sparse.child_age = None;
        sparse.extras.clear();
        sparse.missing_fields.clear();

        let text = format_lead(&sparse);
        assert!(!text.contains("Customer:"));
        assert!(!text.contains("Child:"));
        assert!(!text.contains("Extras:"));
        assert!(!text.contains("Still missing:"));
    }

    #[test]
    fn booking_change_names_the_kind() {
        let text = format_booking_change("vk_9", BookingChangeKind::Reschedule, "move to Sunday");
        assert!(text.contains("vk_9"));
        assert!(text.contains("reschedule"));
        assert!(text.contains("move to Sunday"));
    }

    #[test]
    fn lost_item_report_formats_the_callback_phone() {
        let answers = LostItemAnswers {
            visit_date: Some("yesterday".to_string()),
            location: Some("trampoline hall".to_string()),
            description: Some("blue jacket".to_string()),
            phone: Some("9123456789".to_string()),
        };

        let text = format_lost_item("tg_42", &answers);
        assert!(text.contains("Visit date: yesterday"));
        assert!(text.contains("Last seen: trampoline hall"));
        assert!(text.contains("Item: blue jacket"));
        assert!(text.contains("Callback phone: +7 (912) 345-67-89"));
    }
}
