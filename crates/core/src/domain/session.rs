use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LostItemStep {
    Date,
    Location,
    Description,
    Phone,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStep {
    Phone,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnershipStep {
    Details,
    Phone,
}

/// Answers collected so far by the lost-item wizard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostItemAnswers {
    #[serde(default)]
    pub visit_date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostItemState {
    pub step: LostItemStep,
    #[serde(default)]
    pub answers: LostItemAnswers,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRequestState {
    pub step: PhotoStep,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoOrderState {
    pub step: PhotoStep,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnershipState {
    pub step: PartnershipStep,
    #[serde(default)]
    pub proposal: Option<String>,
}

/// Current conversational mode, with each guided wizard carrying its own
/// step cursor and collected answers. Primary modes hold no scratch, so
/// switching into one of them clears it by construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DialogueMode {
    Unknown,
    General,
    Booking,
    Events,
    LostItem(LostItemState),
    PhotoRequest(PhotoRequestState),
    PhotoOrder(PhotoOrderState),
    Partnership(PartnershipState),
}

impl DialogueMode {
    pub fn storage_mode(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::General => "general",
            Self::Booking => "booking",
            Self::Events => "events",
            Self::LostItem(_) => "lost_item",
            Self::PhotoRequest(_) => "photo_request",
            Self::PhotoOrder(_) => "photo_order",
            Self::Partnership(_) => "partnership",
        }
    }

    /// Wizard cursor serialized into the session's scratch column. Primary
    /// modes store an empty object.
    pub fn storage_scratch(&self) -> String {
        let value = match self {
            Self::Unknown | Self::General | Self::Booking | Self::Events => {
                serde_json::json!({})
            }
            Self::LostItem(state) => serde_json::to_value(state).unwrap_or_default(),
            Self::PhotoRequest(state) => serde_json::to_value(state).unwrap_or_default(),
            Self::PhotoOrder(state) => serde_json::to_value(state).unwrap_or_default(),
            Self::Partnership(state) => serde_json::to_value(state).unwrap_or_default(),
        };
        value.to_string()
    }

    /// Rebuilds the mode from its stored columns. A wizard mode whose
    /// scratch no longer parses is a stale session and silently resets to
    /// `Unknown` rather than trapping the person mid-wizard.
    pub fn from_storage(mode: &str, scratch: &str) -> Self {
        match mode {
            "general" => Self::General,
            "booking" => Self::Booking,
            "events" => Self::Events,
            "lost_item" => serde_json::from_str(scratch).map(Self::LostItem).unwrap_or(Self::Unknown),
            "photo_request" => {
                serde_json::from_str(scratch).map(Self::PhotoRequest).unwrap_or(Self::Unknown)
            }
            "photo_order" => {
                serde_json::from_str(scratch).map(Self::PhotoOrder).unwrap_or(Self::Unknown)
            }
            "partnership" => {
                serde_json::from_str(scratch).map(Self::Partnership).unwrap_or(Self::Unknown)
            }
            _ => Self::Unknown,
        }
    }

    pub fn is_wizard(&self) -> bool {
        matches!(
            self,
            Self::LostItem(_) | Self::PhotoRequest(_) | Self::PhotoOrder(_) | Self::Partnership(_)
        )
    }

    /// Modes in which the field extractor runs over the conversation.
    pub fn collects_slots(&self) -> bool {
        matches!(self, Self::Booking)
    }
}

/// Per-channel-identity conversational state. Never deleted, only reset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub channel_key: String,
    pub username: Option<String>,
    pub park: String,
    pub mode: DialogueMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One stored dialogue turn, consumed by the extractor and CRM notes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
