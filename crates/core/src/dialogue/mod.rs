pub mod machine;
pub mod triggers;

pub use machine::{
    apply_classification, route_message, Classification, DialogueAction, Intent, RouteDecision,
    TransitionOutcome, WizardPrompt, BOOKING_SWITCH_CONFIDENCE, GENERAL_SWITCH_CONFIDENCE,
};
pub use triggers::{wants_new_booking, BookingChangeKind};
