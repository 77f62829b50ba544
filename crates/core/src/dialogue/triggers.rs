//! Cheap first-pass scans over the raw message text.
//!
//! These run before the classifier oracle on every message: loyalty codes,
//! live-agent escalation, booking-change requests, and the guided-wizard
//! trigger phrases. Everything here is case-insensitive substring or regex
//! matching; anything subtler is the oracle's job.

use std::sync::OnceLock;

use regex::Regex;

use serde::{Deserialize, Serialize};

fn loyalty_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:app\s*id|my\s*id|code)\s*[:.=\-]?\s*(\d{4,6})\b")
            .expect("loyalty code pattern")
    })
}

fn phone_punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[+()]|\d{1,3}-\d{1,3}-\d{1,3}").expect("phone punctuation pattern")
    })
}

/// Extracts a loyalty-program member code from an `id/code: NNNNN` style
/// message. Messages that also carry phone-like punctuation are skipped so
/// a typed phone number is never mistaken for a code.
pub fn loyalty_code(text: &str) -> Option<String> {
    if phone_punctuation_re().is_match(text) {
        return None;
    }
    loyalty_re().captures(text).map(|caps| caps[1].to_string())
}

const ESCALATION_PHRASES: &[&str] = &[
    "talk to a human",
    "talk to a person",
    "real person",
    "live agent",
    "live operator",
    "speak to a manager",
    "talk to a manager",
    "call me back",
    "this is a complaint",
    "want to complain",
];

/// True when the person is asking for a human rather than the bot.
pub fn wants_escalation(text: &str) -> bool {
    let lowered = text.to_lowercase();
    ESCALATION_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingChangeKind {
    Reschedule,
    Guests,
    Extras,
    Cancel,
}

impl BookingChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reschedule => "reschedule",
            Self::Guests => "guests",
            Self::Extras => "extras",
            Self::Cancel => "cancel",
        }
    }
}

const BOOKING_REFERENCE: &[&str] = &["my booking", "my reservation", "our booking", "the party we booked"];

/// Detects a change request against an existing booking. Only fires when
/// the message actually references a booking, so "cancel" alone inside a
/// wizard or a fresh inquiry does not trip it.
pub fn booking_change(text: &str) -> Option<BookingChangeKind> {
    let lowered = text.to_lowercase();
    if !BOOKING_REFERENCE.iter().any(|phrase| lowered.contains(phrase)) {
        return None;
    }
    if lowered.contains("cancel") {
        return Some(BookingChangeKind::Cancel);
    }
    if ["move", "reschedule", "another date", "different date", "change the time"]
        .iter()
        .any(|p| lowered.contains(p))
    {
        return Some(BookingChangeKind::Reschedule);
    }
    if ["more kids", "fewer kids", "more guests", "fewer guests", "guest count", "number of kids"]
        .iter()
        .any(|p| lowered.contains(p))
    {
        return Some(BookingChangeKind::Guests);
    }
    if ["add ", "remove ", "animator", "cake", "photographer", "decoration"]
        .iter()
        .any(|p| lowered.contains(p))
    {
        return Some(BookingChangeKind::Extras);
    }
    None
}

const NEW_BOOKING_PHRASES: &[&str] = &[
    "new booking",
    "another booking",
    "book another",
    "book one more",
    "another party",
    "one more party",
    "second party",
    "start a new booking",
];

/// True when the visitor explicitly opens a fresh booking rather than
/// continuing the current one. Change requests against an existing booking
/// reference it ("my booking") and are caught by [`booking_change`] before
/// this scan runs.
pub fn wants_new_booking(text: &str) -> bool {
    let lowered = text.to_lowercase();
    NEW_BOOKING_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WizardKind {
    LostItem,
    PhotoRequest,
    PhotoOrder,
    Partnership,
}

const LOST_ITEM_TRIGGERS: &[&str] =
    &["lost my", "lost a", "left my", "left a", "forgot my", "lost and found", "lost item"];

const PHOTO_ORDER_TRIGGERS: &[&str] =
    &["order photos", "order the photos", "buy photos", "buy the photos", "purchase photos"];

const PHOTO_REQUEST_TRIGGERS: &[&str] =
    &["photos from", "pictures from", "send me the photos", "send the photos", "get the photos"];

const PARTNERSHIP_TRIGGERS: &[&str] = &[
    "partnership",
    "cooperation",
    "collaborate",
    "advertise with you",
    "business proposal",
    "wholesale",
];

/// Matches a guided-wizard trigger phrase. Photo-order phrasing is checked
/// before the broader photo-request phrasing since "buy photos from
/// saturday" should open the order wizard, not the request one.
pub fn wizard_trigger(text: &str) -> Option<WizardKind> {
    let lowered = text.to_lowercase();
    if LOST_ITEM_TRIGGERS.iter().any(|p| lowered.contains(p)) {
        return Some(WizardKind::LostItem);
    }
    if PHOTO_ORDER_TRIGGERS.iter().any(|p| lowered.contains(p)) {
        return Some(WizardKind::PhotoOrder);
    }
    if PHOTO_REQUEST_TRIGGERS.iter().any(|p| lowered.contains(p)) {
        return Some(WizardKind::PhotoRequest);
    }
    if PARTNERSHIP_TRIGGERS.iter().any(|p| lowered.contains(p)) {
        return Some(WizardKind::Partnership);
    }
    None
}

const EXIT_PHRASES: &[&str] =
    &["cancel", "stop", "never mind", "nevermind", "exit", "quit", "forget it", "back"];

/// Exit phrase inside a wizard: the whole message must be the phrase, so a
/// lost-item description containing the word "stop" does not abort it.
pub fn wizard_exit(text: &str) -> bool {
    let lowered = text.trim().trim_end_matches(['.', '!']).to_lowercase();
    EXIT_PHRASES.iter().any(|p| lowered == *p)
}

#[cfg(test)]
mod tests {
    use super::{
        booking_change, loyalty_code, wants_escalation, wants_new_booking, wizard_exit,
        wizard_trigger, BookingChangeKind, WizardKind,
    };

    #[test]
    fn loyalty_code_needs_keyword_and_short_number() {
        assert_eq!(loyalty_code("my id: 48213"), Some("48213".to_string()));
        assert_eq!(loyalty_code("APP ID 4821"), Some("4821".to_string()));
        assert_eq!(loyalty_code("48213"), None);
        assert_eq!(loyalty_code("code 123"), None);
    }

    #[test]
    fn phone_punctuation_suppresses_loyalty_match() {
        assert_eq!(loyalty_code("my id: +7 912 345"), None);
        assert_eq!(loyalty_code("code 345-67-89"), None);
    }

    #[test]
    fn escalation_phrases_match_case_insensitively() {
        assert!(wants_escalation("I want to Talk To A Manager now"));
        assert!(!wants_escalation("how late are you open"));
    }

    #[test]
    fn booking_change_requires_a_booking_reference() {
        assert_eq!(
            booking_change("can we move my booking to sunday"),
            Some(BookingChangeKind::Reschedule)
        );
        assert_eq!(booking_change("please cancel my reservation"), Some(BookingChangeKind::Cancel));
        assert_eq!(
            booking_change("two more kids are coming to my booking"),
            Some(BookingChangeKind::Guests)
        );
        assert_eq!(booking_change("can we move to sunday"), None);
    }

    #[test]
    fn new_booking_phrases_signal_a_restart() {
        assert!(wants_new_booking("we'd like to make a New Booking for october"));
        assert!(wants_new_booking("can we book another party, this one for our son"));
        assert!(!wants_new_booking("what time does my party start"));
        assert!(!wants_new_booking("ten kids are coming on saturday"));
    }

    #[test]
    fn wizard_triggers_prefer_order_over_request() {
        assert_eq!(wizard_trigger("I lost my jacket yesterday"), Some(WizardKind::LostItem));
        assert_eq!(
            wizard_trigger("I want to buy photos from saturday"),
            Some(WizardKind::PhotoOrder)
        );
        assert_eq!(
            wizard_trigger("can you send me the photos from the party"),
            Some(WizardKind::PhotoRequest)
        );
        assert_eq!(wizard_trigger("interested in a partnership"), Some(WizardKind::Partnership));
        assert_eq!(wizard_trigger("how much are tickets"), None);
    }

    #[test]
    fn exit_must_be_the_whole_message() {
        assert!(wizard_exit("never mind"));
        assert!(wizard_exit("Stop!"));
        assert!(!wizard_exit("the bus stop near the park"));
    }
}
