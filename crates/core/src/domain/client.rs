use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messaging surface a person reached us through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Telegram,
    Vk,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Vk => "vk",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "telegram" => Some(Self::Telegram),
            "vk" => Some(Self::Vk),
            _ => None,
        }
    }
}

/// A (platform, platform-user-id) pair. The `key()` form is what sessions
/// and leads are indexed by.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelIdentity {
    pub channel: Channel,
    pub user_id: String,
}

impl ChannelIdentity {
    pub fn new(channel: Channel, user_id: impl Into<String>) -> Self {
        Self { channel, user_id: user_id.into() }
    }

    pub fn telegram(user_id: impl Into<String>) -> Self {
        Self::new(Channel::Telegram, user_id)
    }

    pub fn vk(user_id: impl Into<String>) -> Self {
        Self::new(Channel::Vk, user_id)
    }

    pub fn key(&self) -> String {
        match self.channel {
            Channel::Telegram => format!("tg_{}", self.user_id),
            Channel::Vk => format!("vk_{}", self.user_id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub i64);

/// Profile metadata a channel adapter can see without asking the person.
/// Hints only ever fill empty fields; they never overwrite stored values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileHints {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProfileHints {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.display_name.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
    }
}

/// Canonical person record. At most one client per non-null channel
/// identifier; both identifiers present only as the result of a merge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub telegram_id: Option<String>,
    pub vk_id: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub total_leads: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn channel_id(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Telegram => self.telegram_id.as_deref(),
            Channel::Vk => self.vk_id.as_deref(),
        }
    }

    fn master_rank(&self) -> (bool, bool, bool, bool, bool) {
        (
            self.telegram_id.is_some(),
            self.vk_id.is_some(),
            self.display_name.is_some(),
            self.username.is_some(),
            self.first_name.is_some() || self.last_name.is_some(),
        )
    }
}

/// Decides which of two duplicate clients survives a merge.
///
/// Priority: telegram identifier, then vk identifier, then a
/// directly-supplied display name, then a channel username, then profile
/// first/last name, then the older record (lower id).
pub fn choose_master(a: Client, b: Client) -> (Client, Client) {
    let a_rank = a.master_rank();
    let b_rank = b.master_rank();
    if a_rank > b_rank || (a_rank == b_rank && a.id.0 <= b.id.0) {
        (a, b)
    } else {
        (b, a)
    }
}

/// One observed phone per client, deduplicated on (client, phone).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientPhone {
    pub id: i64,
    pub client_id: ClientId,
    pub phone: String,
    pub last_used_at: DateTime<Utc>,
}

/// A named child attached to a client for party planning. Identity is
/// (client, name, event date) so the same child can recur across events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientChild {
    pub id: i64,
    pub client_id: ClientId,
    pub name: String,
    pub event_date: Option<String>,
    pub age: Option<i64>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{choose_master, Channel, ChannelIdentity, Client, ClientId};

    fn bare_client(id: i64) -> Client {
        Client {
            id: ClientId(id),
            telegram_id: None,
            vk_id: None,
            username: None,
            display_name: None,
            first_name: None,
            last_name: None,
            phone: None,
            total_leads: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn channel_keys_are_prefixed_per_platform() {
        assert_eq!(ChannelIdentity::telegram("42").key(), "tg_42");
        assert_eq!(ChannelIdentity::vk("42").key(), "vk_42");
    }

    #[test]
    fn telegram_identifier_outranks_vk_identifier() {
        let mut a = bare_client(5);
        a.vk_id = Some("vk-5".to_string());
        let mut b = bare_client(9);
        b.telegram_id = Some("tg-9".to_string());

        let (master, duplicate) = choose_master(a, b);
        assert_eq!(master.id, ClientId(9));
        assert_eq!(duplicate.id, ClientId(5));
    }

    #[test]
    fn display_name_outranks_username() {
        let mut a = bare_client(3);
        a.username = Some("anna_p".to_string());
        let mut b = bare_client(8);
        b.display_name = Some("Anna".to_string());

        let (master, _) = choose_master(a, b);
        assert_eq!(master.id, ClientId(8));
    }

    #[test]
    fn older_record_wins_the_tiebreak() {
        let (master, duplicate) = choose_master(bare_client(12), bare_client(4));
        assert_eq!(master.id, ClientId(4));
        assert_eq!(duplicate.id, ClientId(12));
    }

    #[test]
    fn channel_id_reads_the_matching_field() {
        let mut c = bare_client(1);
        c.telegram_id = Some("tg-1".to_string());
        assert_eq!(c.channel_id(Channel::Telegram), Some("tg-1"));
        assert_eq!(c.channel_id(Channel::Vk), None);
    }
}
