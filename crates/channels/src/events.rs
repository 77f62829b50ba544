//! Wire-format plumbing shared by the channel adapters: update parsing
//! into channel-agnostic messages and outbound chunking.

use serde_json::Value;

use parkbot_core::{ChannelIdentity, ProfileHints};

/// Both platforms reject messages past roughly this length; longer replies
/// are sent as several messages.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// A visitor message after the platform envelope has been stripped away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub identity: ChannelIdentity,
    pub text: String,
    pub hints: ProfileHints,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundReply {
    pub identity: ChannelIdentity,
    pub text: String,
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Parses one Telegram `getUpdates` entry. Non-text updates (stickers,
/// joins, edits) are skipped.
pub fn parse_telegram_update(update: &Value) -> Option<InboundMessage> {
    let message = update.get("message")?;
    let text = string_field(message, "text")?;
    let from = message.get("from")?;
    let user_id = from.get("id")?.as_i64()?;

    let first_name = string_field(from, "first_name");
    let last_name = string_field(from, "last_name");
    let display_name = match (&first_name, &last_name) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(first), None) => Some(first.clone()),
        _ => None,
    };

    Some(InboundMessage {
        identity: ChannelIdentity::telegram(user_id.to_string()),
        text,
        hints: ProfileHints {
            username: string_field(from, "username"),
            display_name,
            first_name,
            last_name,
        },
    })
}

/// Parses one VK long-poll update. Only `message_new` carries visitor text.
pub fn parse_vk_update(update: &Value) -> Option<InboundMessage> {
    if update.get("type").and_then(Value::as_str) != Some("message_new") {
        return None;
    }
    let message = update.pointer("/object/message")?;
    let from_id = message.get("from_id")?.as_i64()?;
    // Negative ids are communities; the bot only talks to people.
    if from_id <= 0 {
        return None;
    }
    let text = string_field(message, "text")?;

    Some(InboundMessage {
        identity: ChannelIdentity::vk(from_id.to_string()),
        text,
        hints: ProfileHints::default(),
    })
}

/// Splits a long reply into platform-sized chunks, preferring newline and
/// then space boundaries so sentences survive intact.
pub fn split_message(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let chars: Vec<(usize, char)> = rest.char_indices().take(MAX_MESSAGE_CHARS + 1).collect();
        if chars.len() <= MAX_MESSAGE_CHARS {
            chunks.push(rest.to_string());
            break;
        }

        let window_end = chars[MAX_MESSAGE_CHARS].0;
        let window = &rest[..window_end];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&idx| idx > 0)
            .unwrap_or(window_end);

        chunks.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    chunks
}
