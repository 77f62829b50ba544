//! Pure per-message transition logic for the conversational modes.
//!
//! [`route_message`] covers everything decidable from the raw text alone
//! (loyalty codes, escalation, wizard triggers, wizard step input);
//! when it returns [`RouteDecision::Classify`] the caller asks the intent
//! oracle and feeds the result to [`apply_classification`]. Both functions
//! are side-effect free; the returned actions tell the orchestrator what
//! to send and whom to notify.

use serde::{Deserialize, Serialize};

use crate::dialogue::triggers::{
    self, booking_change, loyalty_code, wants_escalation, wizard_exit, BookingChangeKind,
    WizardKind,
};
use crate::domain::phone::normalize_phone;
use crate::domain::session::{
    DialogueMode, LostItemAnswers, LostItemState, LostItemStep, PartnershipState, PartnershipStep,
    PhotoOrderState, PhotoRequestState, PhotoStep,
};

/// Minimum classifier confidence to leave `general` for a slot-collecting
/// mode.
pub const GENERAL_SWITCH_CONFIDENCE: f32 = 0.7;

/// Minimum confidence to abandon an in-progress booking for `events`.
/// Stricter than the general threshold so a passing mention of another
/// topic does not drop a half-filled form.
pub const BOOKING_SWITCH_CONFIDENCE: f32 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    General,
    Booking,
    Events,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Booking => "booking",
            Self::Events => "events",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "general" => Some(Self::General),
            "booking" => Some(Self::Booking),
            "events" => Some(Self::Events),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Output of the intent oracle (or the rule-based first pass).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
}

impl Classification {
    pub fn new(intent: Intent, confidence: f32) -> Self {
        Self { intent, confidence }
    }
}

/// Which canned prompt to send next. The copy lives here so every channel
/// adapter asks the same questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WizardPrompt {
    LostItemDate,
    LostItemLocation,
    LostItemDescription,
    LostItemPhone,
    PhotoRequestPhone,
    PhotoOrderPhone,
    PartnershipDetails,
    PartnershipPhone,
    InvalidPhone,
}

impl WizardPrompt {
    pub fn text(&self) -> &'static str {
        match self {
            Self::LostItemDate => "When did you visit the park? Any day format is fine.",
            Self::LostItemLocation => {
                "Where in the park do you think you left it? (room, locker area, cafe...)"
            }
            Self::LostItemDescription => "What does the item look like?",
            Self::LostItemPhone => "Leave a phone number and we will call you as soon as we find it.",
            Self::PhotoRequestPhone => {
                "Leave a phone number and our photographer will get back to you."
            }
            Self::PhotoOrderPhone => {
                "Leave a phone number and we will send you the payment details for the photos."
            }
            Self::PartnershipDetails => {
                "Tell us briefly about your proposal and we will pass it to the right person."
            }
            Self::PartnershipPhone => "Leave a phone number so our team can reach you.",
            Self::InvalidPhone => {
                "That does not look like a complete phone number. Please send at least ten digits."
            }
        }
    }
}

/// Side effects the orchestrator must perform for a handled message.
#[derive(Clone, Debug, PartialEq)]
pub enum DialogueAction {
    AcknowledgeLoyaltyCode { code: String },
    Escalate,
    BookingChange { kind: BookingChangeKind },
    Prompt(WizardPrompt),
    WizardExited,
    SubmitLostItem(LostItemAnswers),
    SubmitPhotoRequest { description: Option<String>, phone: String },
    SubmitPhotoOrder { phone: String },
    SubmitPartnership { proposal: String, phone: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionOutcome {
    pub next: DialogueMode,
    pub actions: Vec<DialogueAction>,
}

impl TransitionOutcome {
    fn stay(mode: &DialogueMode, actions: Vec<DialogueAction>) -> Self {
        Self { next: mode.clone(), actions }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RouteDecision {
    /// The message was fully handled by text rules; do not call the oracle.
    Handled(TransitionOutcome),
    /// Nothing matched; classify intent and call [`apply_classification`].
    Classify,
}

const PARTNERSHIP_PROPOSAL_MAX_CHARS: usize = 500;

/// `known_phone` is the caller's phone on file, when identity resolution
/// already produced one; wizards that only exist to collect a phone can
/// then submit straight away.
pub fn route_message(mode: &DialogueMode, text: &str, known_phone: Option<&str>) -> RouteDecision {
    if mode.is_wizard() {
        return RouteDecision::Handled(wizard_step(mode, text));
    }

    if let Some(code) = loyalty_code(text) {
        return RouteDecision::Handled(TransitionOutcome::stay(
            mode,
            vec![DialogueAction::AcknowledgeLoyaltyCode { code }],
        ));
    }

    if wants_escalation(text) {
        return RouteDecision::Handled(TransitionOutcome::stay(mode, vec![DialogueAction::Escalate]));
    }

    if let Some(kind) = booking_change(text) {
        return RouteDecision::Handled(TransitionOutcome::stay(
            mode,
            vec![DialogueAction::BookingChange { kind }],
        ));
    }

    if let Some(kind) = triggers::wizard_trigger(text) {
        return RouteDecision::Handled(enter_wizard(kind, text, known_phone));
    }

    RouteDecision::Classify
}

fn enter_wizard(kind: WizardKind, trigger_text: &str, known_phone: Option<&str>) -> TransitionOutcome {
    match kind {
        WizardKind::LostItem => TransitionOutcome {
            next: DialogueMode::LostItem(LostItemState {
                step: LostItemStep::Date,
                answers: LostItemAnswers::default(),
            }),
            actions: vec![DialogueAction::Prompt(WizardPrompt::LostItemDate)],
        },
        WizardKind::PhotoRequest => TransitionOutcome {
            next: DialogueMode::PhotoRequest(PhotoRequestState {
                step: PhotoStep::Phone,
                description: Some(trigger_text.trim().to_string()),
            }),
            actions: vec![DialogueAction::Prompt(WizardPrompt::PhotoRequestPhone)],
        },
        // The order wizard only exists to collect a phone; a caller we
        // already know by phone submits immediately.
        WizardKind::PhotoOrder => match known_phone {
            Some(phone) => TransitionOutcome {
                next: DialogueMode::Unknown,
                actions: vec![DialogueAction::SubmitPhotoOrder { phone: phone.to_string() }],
            },
            None => TransitionOutcome {
                next: DialogueMode::PhotoOrder(PhotoOrderState { step: PhotoStep::Phone }),
                actions: vec![DialogueAction::Prompt(WizardPrompt::PhotoOrderPhone)],
            },
        },
        WizardKind::Partnership => TransitionOutcome {
            next: DialogueMode::Partnership(PartnershipState {
                step: PartnershipStep::Details,
                proposal: None,
            }),
            actions: vec![DialogueAction::Prompt(WizardPrompt::PartnershipDetails)],
        },
    }
}

fn wizard_step(mode: &DialogueMode, text: &str) -> TransitionOutcome {
    if wizard_exit(text) {
        return TransitionOutcome {
            next: DialogueMode::Unknown,
            actions: vec![DialogueAction::WizardExited],
        };
    }

    match mode {
        DialogueMode::LostItem(state) => lost_item_step(state, text),
        DialogueMode::PhotoRequest(state) => match normalize_phone(text) {
            Some(phone) => TransitionOutcome {
                next: DialogueMode::Unknown,
                actions: vec![DialogueAction::SubmitPhotoRequest {
                    description: state.description.clone(),
                    phone,
                }],
            },
            None => TransitionOutcome::stay(mode, vec![DialogueAction::Prompt(WizardPrompt::InvalidPhone)]),
        },
        DialogueMode::PhotoOrder(_) => match normalize_phone(text) {
            Some(phone) => TransitionOutcome {
                next: DialogueMode::Unknown,
                actions: vec![DialogueAction::SubmitPhotoOrder { phone }],
            },
            None => TransitionOutcome::stay(mode, vec![DialogueAction::Prompt(WizardPrompt::InvalidPhone)]),
        },
        DialogueMode::Partnership(state) => partnership_step(state, text),
        // Primary modes never reach here; route_message only calls this
        // for wizard modes.
        _ => TransitionOutcome::stay(mode, Vec::new()),
    }
}

fn lost_item_step(state: &LostItemState, text: &str) -> TransitionOutcome {
    let text = text.trim();
    let mut answers = state.answers.clone();
    match state.step {
        LostItemStep::Date => {
            answers.visit_date = Some(text.to_string());
            TransitionOutcome {
                next: DialogueMode::LostItem(LostItemState { step: LostItemStep::Location, answers }),
                actions: vec![DialogueAction::Prompt(WizardPrompt::LostItemLocation)],
            }
        }
        LostItemStep::Location => {
            answers.location = Some(text.to_string());
            TransitionOutcome {
                next: DialogueMode::LostItem(LostItemState {
                    step: LostItemStep::Description,
                    answers,
                }),
                actions: vec![DialogueAction::Prompt(WizardPrompt::LostItemDescription)],
            }
        }
        LostItemStep::Description => {
            answers.description = Some(text.to_string());
            TransitionOutcome {
                next: DialogueMode::LostItem(LostItemState { step: LostItemStep::Phone, answers }),
                actions: vec![DialogueAction::Prompt(WizardPrompt::LostItemPhone)],
            }
        }
        LostItemStep::Phone => match normalize_phone(text) {
            Some(phone) => {
                answers.phone = Some(phone);
                TransitionOutcome {
                    next: DialogueMode::Unknown,
                    actions: vec![DialogueAction::SubmitLostItem(answers)],
                }
            }
            None => TransitionOutcome {
                next: DialogueMode::LostItem(state.clone()),
                actions: vec![DialogueAction::Prompt(WizardPrompt::InvalidPhone)],
            },
        },
    }
}

fn partnership_step(state: &PartnershipState, text: &str) -> TransitionOutcome {
    match state.step {
        PartnershipStep::Details => {
            let proposal: String = text.trim().chars().take(PARTNERSHIP_PROPOSAL_MAX_CHARS).collect();
            TransitionOutcome {
                next: DialogueMode::Partnership(PartnershipState {
                    step: PartnershipStep::Phone,
                    proposal: Some(proposal),
                }),
                actions: vec![DialogueAction::Prompt(WizardPrompt::PartnershipPhone)],
            }
        }
        PartnershipStep::Phone => match normalize_phone(text) {
            Some(phone) => TransitionOutcome {
                next: DialogueMode::Unknown,
                actions: vec![DialogueAction::SubmitPartnership {
                    proposal: state.proposal.clone().unwrap_or_default(),
                    phone,
                }],
            },
            None => TransitionOutcome {
                next: DialogueMode::Partnership(state.clone()),
                actions: vec![DialogueAction::Prompt(WizardPrompt::InvalidPhone)],
            },
        },
    }
}

/// Applies a classifier verdict to a primary mode.
///
/// From `unknown` the classified intent is adopted outright. From
/// `general`, moving to a collecting mode needs `confidence >=` the
/// general threshold. From `booking`, only a high-confidence `events`
/// verdict moves; everything else keeps collecting. `events` is sticky
/// the same way `booking` is.
pub fn apply_classification(mode: &DialogueMode, classification: &Classification) -> DialogueMode {
    match mode {
        DialogueMode::Unknown => match classification.intent {
            Intent::General => DialogueMode::General,
            Intent::Booking => DialogueMode::Booking,
            Intent::Events => DialogueMode::Events,
            Intent::Unknown => DialogueMode::Unknown,
        },
        DialogueMode::General => match classification.intent {
            Intent::Booking if classification.confidence >= GENERAL_SWITCH_CONFIDENCE => {
                DialogueMode::Booking
            }
            Intent::Events if classification.confidence >= GENERAL_SWITCH_CONFIDENCE => {
                DialogueMode::Events
            }
            _ => DialogueMode::General,
        },
        DialogueMode::Booking => match classification.intent {
            Intent::Events if classification.confidence >= BOOKING_SWITCH_CONFIDENCE => {
                DialogueMode::Events
            }
            _ => DialogueMode::Booking,
        },
        DialogueMode::Events => match classification.intent {
            Intent::Booking if classification.confidence >= BOOKING_SWITCH_CONFIDENCE => {
                DialogueMode::Booking
            }
            _ => DialogueMode::Events,
        },
        // Wizard modes never consult the classifier.
        wizard => wizard.clone(),
    }
}
