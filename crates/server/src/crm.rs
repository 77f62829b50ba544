//! HTTP CRM adapter. Deployments point `crm.base_url` at their pipeline
//! API; the payload shape is the generic deal contract the park's CRM
//! bridge accepts.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;

use parkbot_agent::{CrmError, CrmSync};
use parkbot_core::{format_phone, LeadSummary};

pub struct HttpCrm {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    pipeline: Option<String>,
}

impl HttpCrm {
    pub fn new(
        base_url: String,
        api_key: SecretString,
        pipeline: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| CrmError::Request(err.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), api_key, pipeline })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, CrmError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|err| CrmError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Request(format!("crm returned {status}: {body}")));
        }

        response.json().await.map_err(|err| CrmError::Malformed(err.to_string()))
    }
}

/// The deal body sent on every sync. Slots the visitor has not filled yet
/// are omitted rather than sent as nulls.
pub fn deal_payload(summary: &LeadSummary, pipeline: Option<&str>) -> Value {
    let mut deal = json!({
        "external_id": summary.channel_key,
        "source": summary.source.as_str(),
        "park": summary.park,
        "title": deal_title(summary),
    });

    if let Some(pipeline) = pipeline {
        deal["pipeline"] = json!(pipeline);
    }
    if let Some(name) = &summary.customer_name {
        deal["contact_name"] = json!(name);
    }
    if let Some(phone) = &summary.phone {
        deal["contact_phone"] = json!(format_phone(phone));
    }
    if let Some(date) = &summary.event_date {
        deal["event_date"] = json!(date);
    }
    if let Some(time) = &summary.event_time {
        deal["event_time"] = json!(time);
    }
    if let Some(room) = &summary.room {
        deal["room"] = json!(room);
    }
    if let Some(kids) = summary.kids_count {
        deal["kids_count"] = json!(kids);
    }
    if let Some(adults) = summary.adults_count {
        deal["adults_count"] = json!(adults);
    }
    if let Some(format) = &summary.format {
        deal["format"] = json!(format);
    }
    if !summary.extras.is_empty() {
        deal["extras"] = json!(summary.extras);
    }

    deal
}

fn deal_title(summary: &LeadSummary) -> String {
    match (&summary.child_name, summary.child_age) {
        (Some(name), Some(age)) => format!("Birthday: {name}, {age}"),
        (Some(name), None) => format!("Birthday: {name}"),
        _ => format!("Booking {}", summary.channel_key),
    }
}

fn deal_id_field(body: &Value) -> Option<String> {
    match body.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[async_trait]
impl CrmSync for HttpCrm {
    async fn upsert_deal(&self, summary: &LeadSummary) -> Result<Option<String>, CrmError> {
        let payload = deal_payload(summary, self.pipeline.as_deref());

        let body = match &summary.crm_deal_id {
            Some(deal_id) => self.post(&format!("/deals/{deal_id}"), &payload).await?,
            None => self.post("/deals", &payload).await?,
        };

        let deal_id = deal_id_field(&body)
            .or_else(|| summary.crm_deal_id.clone())
            .ok_or_else(|| CrmError::Malformed("deal response carried no id".to_string()))?;
        Ok(Some(deal_id))
    }

    async fn attach_note(&self, deal_id: &str, note: &str) -> Result<(), CrmError> {
        self.post(&format!("/deals/{deal_id}/notes"), &json!({"text": note})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use parkbot_core::{Channel, LeadId, LeadSummary};
    use serde_json::json;

    use super::{deal_id_field, deal_payload};

    fn summary() -> LeadSummary {
        LeadSummary {
            lead_id: LeadId(3),
            channel_key: "tg_42".to_string(),
            source: Channel::Telegram,
            park: "main".to_string(),
            customer_name: Some("Anna".to_string()),
            phone: Some("9123456789".to_string()),
            child_name: Some("Misha".to_string()),
            child_age: Some(7),
            event_date: Some("2026-09-12".to_string()),
            event_time: None,
            room: None,
            kids_count: Some(10),
            adults_count: None,
            format: None,
            extras: vec!["cake".to_string()],
            crm_deal_id: None,
            missing_fields: vec![],
        }
    }

    #[test]
    fn payload_carries_filled_slots_and_skips_empty_ones() {
        let payload = deal_payload(&summary(), Some("birthdays"));

        assert_eq!(payload["external_id"], json!("tg_42"));
        assert_eq!(payload["pipeline"], json!("birthdays"));
        assert_eq!(payload["title"], json!("Birthday: Misha, 7"));
        assert_eq!(payload["contact_phone"], json!("+7 (912) 345-67-89"));
        assert_eq!(payload["kids_count"], json!(10));
        assert_eq!(payload["extras"], json!(["cake"]));
        assert!(payload.get("room").is_none());
        assert!(payload.get("adults_count").is_none());
    }

    #[test]
    fn title_falls_back_to_the_channel_key() {
        let mut sparse = summary();
        sparse.child_name = None;
        sparse.child_age = None;

        let payload = deal_payload(&sparse, None);
        assert_eq!(payload["title"], json!("Booking tg_42"));
        assert!(payload.get("pipeline").is_none());
    }

    #[test]
    fn deal_ids_parse_from_strings_and_numbers() {
        assert_eq!(deal_id_field(&json!({"id": "deal-9"})), Some("deal-9".to_string()));
        assert_eq!(deal_id_field(&json!({"id": 42})), Some("42".to_string()));
        assert_eq!(deal_id_field(&json!({"status": "ok"})), None);
    }
}
