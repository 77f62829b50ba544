use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::client::{Channel, ClientId};
use crate::domain::phone::normalize_phone;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Booked,
    Cancelled,
    Deferred,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Booked => "booked",
            Self::Cancelled => "cancelled",
            Self::Deferred => "deferred",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "booked" => Some(Self::Booked),
            "cancelled" => Some(Self::Cancelled),
            "deferred" => Some(Self::Deferred),
            _ => None,
        }
    }

    /// Statuses that can still take slot-filling merges.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::New | Self::Contacted)
    }
}

/// One booking inquiry. For a given channel key at most one lead is an
/// active draft (open status, not yet handed to staff) at any time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub client_id: Option<ClientId>,
    pub channel_key: String,
    pub source: Channel,
    pub park: String,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub child_name: Option<String>,
    pub child_age: Option<i64>,
    pub event_date: Option<String>,
    pub event_time: Option<String>,
    pub room: Option<String>,
    pub kids_count: Option<i64>,
    pub adults_count: Option<i64>,
    pub format: Option<String>,
    pub extras: Vec<String>,
    pub status: LeadStatus,
    pub sent_to_staff: bool,
    pub crm_deal_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial struct produced by the field extractor. `None` means "the
/// extractor does not know", never "clear the stored value".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub child_name: Option<String>,
    #[serde(default)]
    pub child_age: Option<i64>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub kids_count: Option<i64>,
    #[serde(default)]
    pub adults_count: Option<i64>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub extras: Vec<String>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none()
            && self.phone.is_none()
            && self.child_name.is_none()
            && self.child_age.is_none()
            && self.event_date.is_none()
            && self.event_time.is_none()
            && self.room.is_none()
            && self.kids_count.is_none()
            && self.adults_count.is_none()
            && self.format.is_none()
            && self.extras.is_empty()
    }
}

/// Flat record handed to staff notifications and CRM sync.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub lead_id: LeadId,
    pub channel_key: String,
    pub source: Channel,
    pub park: String,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub child_name: Option<String>,
    pub child_age: Option<i64>,
    pub event_date: Option<String>,
    pub event_time: Option<String>,
    pub room: Option<String>,
    pub kids_count: Option<i64>,
    pub adults_count: Option<i64>,
    pub format: Option<String>,
    pub extras: Vec<String>,
    pub crm_deal_id: Option<String>,
    #[serde(skip_deserializing)]
    pub missing_fields: Vec<&'static str>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl Lead {
    pub fn is_active_draft(&self) -> bool {
        self.status.is_open() && !self.sent_to_staff
    }

    /// True once the stored phone normalizes to a full canonical number,
    /// which is the gate for CRM sync and the staff hand-off.
    pub fn has_valid_phone(&self) -> bool {
        self.phone.as_deref().and_then(normalize_phone).is_some()
    }

    /// Monotonic slot-filling merge: non-empty extracted values overwrite,
    /// empty ones leave the stored value alone, extras union as a set.
    /// Returns the names of fields that actually changed.
    pub fn apply_extracted(&mut self, extracted: &ExtractedFields) -> Vec<&'static str> {
        let mut changed = Vec::new();

        macro_rules! fill_text {
            ($field:ident) => {
                if let Some(value) = non_empty(&extracted.$field) {
                    if self.$field.as_deref() != Some(value.as_str()) {
                        self.$field = Some(value);
                        changed.push(stringify!($field));
                    }
                }
            };
        }
        macro_rules! fill_int {
            ($field:ident) => {
                if let Some(value) = extracted.$field {
                    if self.$field != Some(value) {
                        self.$field = Some(value);
                        changed.push(stringify!($field));
                    }
                }
            };
        }

        fill_text!(customer_name);
        fill_text!(child_name);
        fill_text!(event_date);
        fill_text!(event_time);
        fill_text!(room);
        fill_text!(format);
        fill_int!(child_age);
        fill_int!(kids_count);
        fill_int!(adults_count);

        if let Some(raw) = non_empty(&extracted.phone) {
            // Store the canonical form when the number is complete, the raw
            // digits otherwise so a later fuller mention can upgrade it.
            let value = normalize_phone(&raw).unwrap_or(raw);
            if self.phone.as_deref() != Some(value.as_str()) {
                self.phone = Some(value);
                changed.push("phone");
            }
        }

        let mut extras_changed = false;
        for extra in &extracted.extras {
            let extra = extra.trim();
            if !extra.is_empty() && !self.extras.iter().any(|e| e == extra) {
                self.extras.push(extra.to_string());
                extras_changed = true;
            }
        }
        if extras_changed {
            changed.push("extras");
        }

        changed
    }

    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        matches!(
            (self.status, next),
            (LeadStatus::New, LeadStatus::Contacted)
                | (LeadStatus::New, LeadStatus::Booked)
                | (LeadStatus::Contacted, LeadStatus::Booked)
                | (LeadStatus::New, LeadStatus::Cancelled)
                | (LeadStatus::Contacted, LeadStatus::Cancelled)
                | (LeadStatus::New, LeadStatus::Deferred)
                | (LeadStatus::Contacted, LeadStatus::Deferred)
        )
    }

    pub fn transition_to(&mut self, next: LeadStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }
        Err(DomainError::InvalidLeadTransition { from: self.status, to: next })
    }

    /// Fields the reply generator should still be steering the person
    /// toward before the inquiry is worth handing to staff.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if non_empty(&self.customer_name).is_none() {
            missing.push("customer_name");
        }
        if !self.has_valid_phone() {
            missing.push("phone");
        }
        if non_empty(&self.child_name).is_none() {
            missing.push("child_name");
        }
        if non_empty(&self.event_date).is_none() {
            missing.push("event_date");
        }
        if self.kids_count.is_none() {
            missing.push("kids_count");
        }
        missing
    }

    pub fn summary(&self) -> LeadSummary {
        LeadSummary {
            lead_id: self.id,
            channel_key: self.channel_key.clone(),
            source: self.source,
            park: self.park.clone(),
            customer_name: self.customer_name.clone(),
            phone: self.phone.clone(),
            child_name: self.child_name.clone(),
            child_age: self.child_age,
            event_date: self.event_date.clone(),
            event_time: self.event_time.clone(),
            room: self.room.clone(),
            kids_count: self.kids_count,
            adults_count: self.adults_count,
            format: self.format.clone(),
            extras: self.extras.clone(),
            crm_deal_id: self.crm_deal_id.clone(),
            missing_fields: self.missing_fields(),
        }
    }
}
