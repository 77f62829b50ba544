pub mod config;
pub mod dialogue;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use dialogue::{
    apply_classification, route_message, wants_new_booking, BookingChangeKind, Classification,
    DialogueAction, Intent, RouteDecision, TransitionOutcome, WizardPrompt,
};
pub use domain::client::{
    choose_master, Channel, ChannelIdentity, Client, ClientChild, ClientId, ClientPhone,
    ProfileHints,
};
pub use domain::lead::{ExtractedFields, Lead, LeadId, LeadStatus, LeadSummary};
pub use domain::phone::{format_phone, normalize_phone};
pub use domain::session::{
    DialogueMode, DialogueTurn, LostItemAnswers, Session, SessionId, TurnRole,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
