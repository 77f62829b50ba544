//! The conversation loop. One entry point, `handle_message`, takes a raw
//! inbound message and drives identity resolution, dialogue routing, slot
//! extraction, CRM sync and the staff hand-off in order.
//!
//! Ordering rules the loop maintains:
//! - messages from one channel identity are processed strictly one at a time;
//! - a phone discovered mid-conversation merges client records BEFORE any
//!   notification leaves the building, so staff always see the merged view;
//! - the staff hand-off fires at most once per lead, and only after the
//!   lead (with its deal id, when CRM is on) has been persisted.

use std::sync::Arc;

use thiserror::Error;

use parkbot_core::{
    apply_classification, route_message, wants_new_booking, ChannelIdentity, Classification,
    Client, DialogueAction, DialogueMode, DialogueTurn, Intent, Lead, ProfileHints, RouteDecision,
    TurnRole,
};
use parkbot_db::repositories::{RepositoryError, SessionStore};
use parkbot_db::{IdentityEngine, IdentityError, LeadError, LeadManager};

use crate::integrations::{CrmSync, StaffNotifier};
use crate::keyed_lock::KeyedLocks;
use crate::oracle::{
    FieldExtractor, IntentClassifier, KnowledgeRetriever, ReplyContext, ReplyGenerator,
};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Lead(#[from] LeadError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A channel-agnostic inbound message. Channel adapters produce these.
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub identity: ChannelIdentity,
    pub text: String,
    pub hints: ProfileHints,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reply {
    pub texts: Vec<String>,
}

impl Reply {
    fn one(text: impl Into<String>) -> Self {
        Self { texts: vec![text.into()] }
    }
}

#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    pub park: String,
    /// Human phone offered when the bot cannot help.
    pub contact_phone: String,
    pub history_turns: u32,
}

pub struct AgentRuntime {
    identity: IdentityEngine,
    leads: LeadManager,
    sessions: Arc<dyn SessionStore>,
    classifier: Arc<dyn IntentClassifier>,
    extractor: Arc<dyn FieldExtractor>,
    replier: Arc<dyn ReplyGenerator>,
    knowledge: Arc<dyn KnowledgeRetriever>,
    notifier: Arc<dyn StaffNotifier>,
    crm: Arc<dyn CrmSync>,
    locks: KeyedLocks,
    settings: RuntimeSettings,
}

#[allow(clippy::too_many_arguments)]
impl AgentRuntime {
    pub fn new(
        identity: IdentityEngine,
        leads: LeadManager,
        sessions: Arc<dyn SessionStore>,
        classifier: Arc<dyn IntentClassifier>,
        extractor: Arc<dyn FieldExtractor>,
        replier: Arc<dyn ReplyGenerator>,
        knowledge: Arc<dyn KnowledgeRetriever>,
        notifier: Arc<dyn StaffNotifier>,
        crm: Arc<dyn CrmSync>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            identity,
            leads,
            sessions,
            classifier,
            extractor,
            replier,
            knowledge,
            notifier,
            crm,
            locks: KeyedLocks::new(),
            settings,
        }
    }

    pub async fn handle_message(&self, message: IncomingMessage) -> Result<Reply, RuntimeError> {
        let key = message.identity.key();
        let _guard = self.locks.acquire(&key).await;

        let (client, _) = self.identity.resolve(&message.identity, None, &message.hints).await?;
        let session = self
            .sessions
            .get_or_create(&key, message.hints.username.as_deref(), &self.settings.park)
            .await?;
        self.sessions.append_turn(session.id.0, TurnRole::User, &message.text).await?;

        let reply = match route_message(&session.mode, &message.text, client.phone.as_deref()) {
            RouteDecision::Handled(outcome) => {
                self.sessions.save_mode(&key, &outcome.next).await?;
                self.run_actions(&key, &message, outcome.actions).await?
            }
            RouteDecision::Classify => {
                let history =
                    self.sessions.recent_turns(session.id.0, self.settings.history_turns).await?;
                let classification = match self.classifier.classify(&message.text, &history).await {
                    Ok(classification) => classification,
                    Err(error) => {
                        tracing::warn!(
                            event_name = "classify_failed",
                            channel_key = key.as_str(),
                            error = %error,
                            "classifier unavailable; staying in current mode"
                        );
                        Classification::new(Intent::Unknown, 0.3)
                    }
                };
                let next = apply_classification(&session.mode, &classification);
                if next != session.mode {
                    tracing::info!(
                        event_name = "mode_switch",
                        channel_key = key.as_str(),
                        from = session.mode.storage_mode(),
                        to = next.storage_mode(),
                        confidence = f64::from(classification.confidence),
                        "conversation mode changed"
                    );
                    self.sessions.save_mode(&key, &next).await?;
                }

                if next.collects_slots() {
                    self.booking_turn(&client, &key, &message, &history).await?
                } else {
                    self.chat_turn(&key, &message, &history, &next).await?
                }
            }
        };

        for text in &reply.texts {
            self.sessions.append_turn(session.id.0, TurnRole::Assistant, text).await?;
        }
        Ok(reply)
    }

    /// One turn of the booking conversation: extract, merge, re-resolve
    /// identity if a phone surfaced, sync the CRM, then hand off to staff.
    async fn booking_turn(
        &self,
        client: &Client,
        key: &str,
        message: &IncomingMessage,
        history: &[DialogueTurn],
    ) -> Result<Reply, RuntimeError> {
        let fields = match self.extractor.extract(&message.text, history).await {
            Ok(fields) => fields,
            Err(error) => {
                tracing::warn!(
                    event_name = "extract_failed",
                    channel_key = key,
                    error = %error,
                    "field extractor unavailable; asking the visitor to rephrase"
                );
                return Ok(Reply::one(
                    "Sorry, I did not quite catch that. Could you tell me the date you have in \
                     mind and how many kids are coming?",
                ));
            }
        };

        // An explicit fresh booking supersedes unfinished drafts for this
        // conversation; they are deferred, not lost.
        if wants_new_booking(&message.text) {
            self.leads.defer_open_drafts(key).await?;
        }

        let draft = self
            .leads
            .get_or_create_draft(client.id, key, message.identity.channel.as_str(), &self.settings.park)
            .await?;
        let report = self.leads.merge_extracted(draft.id, &fields).await?;

        // A phone in this turn may prove two channel identities are the same
        // person. Resolve again so any merge lands before notifications.
        if fields.phone.is_some() {
            self.identity
                .resolve(&message.identity, fields.phone.as_deref(), &message.hints)
                .await?;
        }

        let mut lead = report.lead;
        if lead.has_valid_phone() {
            self.sync_crm(&mut lead, &report.changed, history).await?;
            self.hand_off(key, &lead).await?;
        }

        let context = ReplyContext {
            mode: "booking",
            park: self.settings.park.clone(),
            missing_fields: lead.missing_fields(),
            knowledge: Vec::new(),
        };
        Ok(self.generate_reply(key, &message.text, history, &context).await)
    }

    async fn chat_turn(
        &self,
        key: &str,
        message: &IncomingMessage,
        history: &[DialogueTurn],
        mode: &DialogueMode,
    ) -> Result<Reply, RuntimeError> {
        let knowledge = match self.knowledge.lookup(&message.text).await {
            Ok(facts) => facts,
            Err(error) => {
                tracing::warn!(
                    event_name = "knowledge_failed",
                    channel_key = key,
                    error = %error,
                    "knowledge lookup unavailable"
                );
                Vec::new()
            }
        };

        let context = ReplyContext {
            mode: mode.storage_mode(),
            park: self.settings.park.clone(),
            missing_fields: Vec::new(),
            knowledge,
        };
        Ok(self.generate_reply(key, &message.text, history, &context).await)
    }

    async fn generate_reply(
        &self,
        key: &str,
        text: &str,
        history: &[DialogueTurn],
        context: &ReplyContext,
    ) -> Reply {
        match self.replier.reply(text, history, context).await {
            Ok(reply) => Reply::one(reply),
            Err(error) => {
                tracing::error!(
                    event_name = "reply_failed",
                    channel_key = key,
                    error = %error,
                    "reply generator unavailable; sending the fallback"
                );
                Reply::one(format!(
                    "Sorry, something went wrong on our side. You can always reach us directly \
                     at {}.",
                    self.settings.contact_phone
                ))
            }
        }
    }

    /// Creates or refreshes the CRM deal. First sync happens as soon as the
    /// phone is valid; later syncs only when a slot actually changed. The
    /// first sync also attaches the conversation so far as a deal note.
    async fn sync_crm(
        &self,
        lead: &mut Lead,
        changed: &[&'static str],
        history: &[DialogueTurn],
    ) -> Result<(), RuntimeError> {
        if lead.crm_deal_id.is_some() && changed.is_empty() {
            return Ok(());
        }
        let first_sync = lead.crm_deal_id.is_none();
        match self.crm.upsert_deal(&lead.summary()).await {
            Ok(Some(deal_id)) => {
                if lead.crm_deal_id.as_deref() != Some(deal_id.as_str()) {
                    self.leads.set_deal_id(lead.id, &deal_id).await?;
                    lead.crm_deal_id = Some(deal_id);
                }
                if first_sync && !history.is_empty() {
                    let note = history
                        .iter()
                        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
                        .collect::<Vec<_>>()
                        .join("\n");
                    if let Err(error) = self
                        .crm
                        .attach_note(lead.crm_deal_id.as_deref().unwrap_or_default(), &note)
                        .await
                    {
                        tracing::warn!(
                            event_name = "crm_note_failed",
                            lead_id = lead.id.0,
                            error = %error,
                            "conversation note was not attached"
                        );
                    }
                }
            }
            Ok(None) => {}
            Err(error) => {
                // CRM trouble must not stall the conversation; the next
                // changed turn retries.
                tracing::warn!(
                    event_name = "crm_sync_failed",
                    lead_id = lead.id.0,
                    error = %error,
                    "deal upsert failed; will retry on next change"
                );
            }
        }
        Ok(())
    }

    /// Sends the lead to staff exactly once. The sent flag only flips after
    /// delivery succeeds, so a failed send retries on the next turn.
    async fn hand_off(&self, key: &str, lead: &Lead) -> Result<(), RuntimeError> {
        if lead.sent_to_staff {
            return Ok(());
        }
        match self.notifier.lead_ready(&lead.summary()).await {
            Ok(()) => {
                self.leads.mark_sent(lead.id).await?;
                tracing::info!(
                    event_name = "lead_handed_off",
                    lead_id = lead.id.0,
                    channel_key = key,
                    "lead delivered to staff"
                );
            }
            Err(error) => {
                tracing::error!(
                    event_name = "handoff_failed",
                    lead_id = lead.id.0,
                    channel_key = key,
                    error = %error,
                    "staff notification failed; lead stays unsent"
                );
            }
        }
        Ok(())
    }

    async fn run_actions(
        &self,
        key: &str,
        message: &IncomingMessage,
        actions: Vec<DialogueAction>,
    ) -> Result<Reply, RuntimeError> {
        let mut texts = Vec::new();
        for action in actions {
            match action {
                DialogueAction::AcknowledgeLoyaltyCode { code } => {
                    tracing::info!(
                        event_name = "loyalty_code",
                        channel_key = key,
                        code = code.as_str(),
                        "loyalty code acknowledged"
                    );
                    texts.push(format!(
                        "Got it, loyalty code {code} is noted for your visit. Anything else I \
                         can help with?"
                    ));
                }
                DialogueAction::Escalate => {
                    texts.push(self.deliver(key, "escalation", |n| async move {
                        n.escalation(key, &message.text).await
                    }, "A manager has been notified and will join this chat shortly.")
                    .await);
                }
                DialogueAction::BookingChange { kind } => {
                    texts.push(self.deliver(key, "booking_change", |n| async move {
                        n.booking_change(key, kind, &message.text).await
                    }, "I have passed your request to the bookings team; they will confirm the \
                        change with you shortly.")
                    .await);
                }
                DialogueAction::Prompt(prompt) => texts.push(prompt.text().to_string()),
                DialogueAction::WizardExited => {
                    texts.push("No problem, I have cancelled that. What else can I do for you?".to_string());
                }
                DialogueAction::SubmitLostItem(answers) => {
                    texts.push(self.deliver(key, "lost_item", |n| async move {
                        n.lost_item(key, &answers).await
                    }, "Thank you! Our staff will look for it and call you back as soon as \
                        there is news.")
                    .await);
                }
                DialogueAction::SubmitPhotoRequest { description, phone } => {
                    texts.push(self.deliver(key, "photo_request", |n| async move {
                        n.photo_request(key, description.as_deref(), &phone).await
                    }, "Thanks! Our photographer will get back to you shortly.")
                    .await);
                }
                DialogueAction::SubmitPhotoOrder { phone } => {
                    texts.push(self.deliver(key, "photo_order", |n| async move {
                        n.photo_order(key, &phone).await
                    }, "Thanks! We will send you the payment details for the photos.")
                    .await);
                }
                DialogueAction::SubmitPartnership { proposal, phone } => {
                    texts.push(self.deliver(key, "partnership", |n| async move {
                        n.partnership(key, &proposal, &phone).await
                    }, "Thank you! We will pass your proposal to the right person and get back \
                        to you.")
                    .await);
                }
            }
        }
        Ok(Reply { texts })
    }

    /// Runs one notifier call and picks the visitor-facing text: the happy
    /// confirmation on success, the apology with a human phone on failure.
    async fn deliver<'a, F, Fut>(
        &'a self,
        key: &str,
        what: &'static str,
        send: F,
        confirmation: &str,
    ) -> String
    where
        F: FnOnce(&'a dyn StaffNotifier) -> Fut,
        Fut: std::future::Future<Output = Result<(), crate::integrations::NotifyError>>,
    {
        match send(self.notifier.as_ref()).await {
            Ok(()) => confirmation.to_string(),
            Err(error) => {
                tracing::error!(
                    event_name = "notify_failed",
                    channel_key = key,
                    kind = what,
                    error = %error,
                    "staff notification failed"
                );
                format!(
                    "Sorry, I could not pass this on automatically. Please call us at {} and we \
                     will sort it out.",
                    self.settings.contact_phone
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use parkbot_core::{
        BookingChangeKind, ChannelIdentity, Classification, DialogueTurn, ExtractedFields,
        LeadSummary, LostItemAnswers, ProfileHints,
    };
    use parkbot_db::{connect_with_settings, migrations, IdentityEngine, LeadManager};
    use parkbot_db::repositories::SqlSessionStore;

    use super::{AgentRuntime, IncomingMessage, RuntimeSettings};
    use crate::classify::ChainClassifier;
    use crate::integrations::{CrmError, CrmSync, NotifyError, StaffNotifier};
    use crate::oracle::{
        FieldExtractor, IntentClassifier, NoKnowledge, OracleError, ReplyContext, ReplyGenerator,
    };

    struct RefusingModel;

    #[async_trait]
    impl IntentClassifier for RefusingModel {
        async fn classify(
            &self,
            _text: &str,
            _history: &[DialogueTurn],
        ) -> Result<Classification, OracleError> {
            Err(OracleError::Request("offline".into()))
        }
    }

    #[derive(Default)]
    struct ScriptedExtractor {
        queue: Mutex<VecDeque<ExtractedFields>>,
    }

    impl ScriptedExtractor {
        fn push(&self, fields: ExtractedFields) {
            self.queue.lock().expect("queue").push_back(fields);
        }
    }

    #[async_trait]
    impl FieldExtractor for ScriptedExtractor {
        async fn extract(
            &self,
            _text: &str,
            _history: &[DialogueTurn],
        ) -> Result<ExtractedFields, OracleError> {
            Ok(self.queue.lock().expect("queue").pop_front().unwrap_or_default())
        }
    }

    struct CannedReplier;

    #[async_trait]
    impl ReplyGenerator for CannedReplier {
        async fn reply(
            &self,
            _text: &str,
            _history: &[DialogueTurn],
            context: &ReplyContext,
        ) -> Result<String, OracleError> {
            Ok(format!("reply[{}]", context.mode))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn events(&self) -> Vec<String> {
            self.events.lock().expect("events").clone()
        }

        fn record(&self, event: String) {
            self.events.lock().expect("events").push(event);
        }
    }

    #[async_trait]
    impl StaffNotifier for RecordingNotifier {
        async fn lead_ready(&self, summary: &LeadSummary) -> Result<(), NotifyError> {
            self.record(format!("lead:{}", summary.lead_id.0));
            Ok(())
        }

        async fn escalation(&self, key: &str, _last: &str) -> Result<(), NotifyError> {
            self.record(format!("escalation:{key}"));
            Ok(())
        }

        async fn booking_change(
            &self,
            key: &str,
            kind: BookingChangeKind,
            _message: &str,
        ) -> Result<(), NotifyError> {
            self.record(format!("booking_change:{key}:{kind:?}"));
            Ok(())
        }

        async fn lost_item(
            &self,
            key: &str,
            answers: &LostItemAnswers,
        ) -> Result<(), NotifyError> {
            self.record(format!("lost_item:{key}:{}", answers.phone.clone().unwrap_or_default()));
            Ok(())
        }

        async fn photo_request(
            &self,
            key: &str,
            _description: Option<&str>,
            _phone: &str,
        ) -> Result<(), NotifyError> {
            self.record(format!("photo_request:{key}"));
            Ok(())
        }

        async fn photo_order(&self, key: &str, phone: &str) -> Result<(), NotifyError> {
            self.record(format!("photo_order:{key}:{phone}"));
            Ok(())
        }

        async fn partnership(
            &self,
            key: &str,
            _proposal: &str,
            _phone: &str,
        ) -> Result<(), NotifyError> {
            self.record(format!("partnership:{key}"));
            Ok(())
        }
    }

    struct CountingCrm {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl CrmSync for CountingCrm {
        async fn upsert_deal(&self, _summary: &LeadSummary) -> Result<Option<String>, CrmError> {
            let mut calls = self.calls.lock().expect("calls");
            *calls += 1;
            Ok(Some(format!("deal-{calls}")))
        }

        async fn attach_note(&self, _deal_id: &str, _note: &str) -> Result<(), CrmError> {
            Ok(())
        }
    }

    struct Harness {
        runtime: AgentRuntime,
        extractor: Arc<ScriptedExtractor>,
        notifier: Arc<RecordingNotifier>,
        crm: Arc<CountingCrm>,
        pool: parkbot_db::DbPool,
    }

    async fn harness() -> Harness {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let extractor = Arc::new(ScriptedExtractor::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let crm = Arc::new(CountingCrm { calls: Mutex::new(0) });

        let runtime = AgentRuntime::new(
            IdentityEngine::new(pool.clone()),
            LeadManager::new(pool.clone()),
            Arc::new(SqlSessionStore::new(pool.clone())),
            Arc::new(ChainClassifier::new(Arc::new(RefusingModel))),
            extractor.clone(),
            Arc::new(CannedReplier),
            Arc::new(NoKnowledge),
            notifier.clone(),
            crm.clone(),
            RuntimeSettings {
                park: "main".to_string(),
                contact_phone: "+7 900 000-00-00".to_string(),
                history_turns: 10,
            },
        );

        Harness { runtime, extractor, notifier, crm, pool }
    }

    fn msg(text: &str) -> IncomingMessage {
        IncomingMessage {
            identity: ChannelIdentity::telegram("42"),
            text: text.to_string(),
            hints: ProfileHints { username: Some("anna".into()), ..Default::default() },
        }
    }

    #[tokio::test]
    async fn booking_conversation_hands_off_once_the_phone_arrives() {
        let h = harness().await;

        h.extractor.push(ExtractedFields {
            child_name: Some("Masha".into()),
            child_age: Some(7),
            kids_count: Some(10),
            ..Default::default()
        });
        let reply = h
            .runtime
            .handle_message(msg("We want to celebrate a birthday party for Masha, 10 kids"))
            .await
            .expect("first turn");
        assert_eq!(reply.texts, vec!["reply[booking]".to_string()]);
        assert!(h.notifier.events().is_empty(), "no hand-off without a phone");

        h.extractor.push(ExtractedFields {
            customer_name: Some("Anna".into()),
            phone: Some("+7 912 345-67-89".into()),
            event_date: Some("2026-09-12".into()),
            ..Default::default()
        });
        h.runtime
            .handle_message(msg("I'm Anna, +7 912 345-67-89, September 12 party please"))
            .await
            .expect("second turn");

        let events = h.notifier.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("lead:"));

        let (sent, deal_id): (i64, Option<String>) =
            sqlx::query_as("SELECT sent_to_staff, crm_deal_id FROM leads")
                .fetch_one(&h.pool)
                .await
                .expect("lead row");
        assert_eq!(sent, 1);
        assert_eq!(deal_id.as_deref(), Some("deal-1"));

        // A third turn with nothing new must not notify or re-sync.
        h.extractor.push(ExtractedFields::default());
        h.runtime.handle_message(msg("great, thanks")).await.expect("third turn");
        assert_eq!(h.notifier.events().len(), 1);
        assert_eq!(*h.crm.calls.lock().expect("calls"), 1);
    }

    #[tokio::test]
    async fn crm_resyncs_when_a_slot_changes_after_the_first_sync() {
        let h = harness().await;

        h.extractor.push(ExtractedFields {
            phone: Some("+7 912 345-67-89".into()),
            kids_count: Some(8),
            ..Default::default()
        });
        h.runtime
            .handle_message(msg("birthday party, 8 kids, +7 912 345-67-89"))
            .await
            .expect("first turn");
        assert_eq!(*h.crm.calls.lock().expect("calls"), 1);

        h.extractor.push(ExtractedFields { event_date: Some("2026-10-01".into()), ..Default::default() });
        h.runtime.handle_message(msg("let's do October 1st for the party")).await.expect("second");
        assert_eq!(*h.crm.calls.lock().expect("calls"), 2);
    }

    #[tokio::test]
    async fn a_general_question_moves_to_general_without_creating_a_lead() {
        let h = harness().await;

        let reply = h
            .runtime
            .handle_message(msg("what are your opening hours on sunday?"))
            .await
            .expect("general question");
        assert_eq!(reply.texts, vec!["reply[general]".to_string()]);

        let mode: String = sqlx::query_scalar("SELECT mode FROM sessions WHERE channel_key = 'tg_42'")
            .fetch_one(&h.pool)
            .await
            .expect("mode");
        assert_eq!(mode, "general");

        let clients: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM clients").fetch_one(&h.pool).await.expect("clients");
        assert_eq!(clients, 1, "the fresh identity is still registered");

        let leads: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM leads").fetch_one(&h.pool).await.expect("leads");
        assert_eq!(leads, 0, "a general question must not open a draft");
    }

    #[tokio::test]
    async fn an_explicit_new_booking_defers_the_open_draft() {
        let h = harness().await;

        h.extractor.push(ExtractedFields { child_name: Some("Masha".into()), ..Default::default() });
        h.runtime
            .handle_message(msg("birthday party for Masha please"))
            .await
            .expect("first draft");

        h.extractor.push(ExtractedFields { child_name: Some("Dima".into()), ..Default::default() });
        h.runtime
            .handle_message(msg("actually, can we book another party, this one for Dima"))
            .await
            .expect("restart");

        let rows: Vec<(Option<String>, String)> =
            sqlx::query_as("SELECT child_name, status FROM leads ORDER BY id")
                .fetch_all(&h.pool)
                .await
                .expect("lead rows");
        assert_eq!(
            rows,
            vec![
                (Some("Masha".to_string()), "deferred".to_string()),
                (Some("Dima".to_string()), "new".to_string()),
            ],
            "the superseded draft is deferred and a fresh one opened"
        );
    }

    #[tokio::test]
    async fn photo_order_skips_the_phone_step_for_a_known_caller() {
        let h = harness().await;

        h.extractor.push(ExtractedFields {
            phone: Some("+7 912 345-67-89".into()),
            kids_count: Some(6),
            ..Default::default()
        });
        h.runtime
            .handle_message(msg("birthday party, 6 kids, +7 912 345-67-89"))
            .await
            .expect("booking turn");

        let reply = h
            .runtime
            .handle_message(msg("I want to order photos from the party"))
            .await
            .expect("photo order");
        assert!(
            reply.texts[0].contains("payment details"),
            "expected the order confirmation, got `{}`",
            reply.texts[0]
        );
        assert!(h
            .notifier
            .events()
            .contains(&"photo_order:tg_42:9123456789".to_string()));

        let mode: String = sqlx::query_scalar("SELECT mode FROM sessions WHERE channel_key = 'tg_42'")
            .fetch_one(&h.pool)
            .await
            .expect("mode");
        assert_eq!(mode, "unknown", "the wizard never opened");
    }

    #[tokio::test]
    async fn escalation_reaches_staff_without_touching_the_mode() {
        let h = harness().await;
        let reply =
            h.runtime.handle_message(msg("I want to talk to a human")).await.expect("escalate");

        assert_eq!(h.notifier.events(), vec!["escalation:tg_42".to_string()]);
        assert!(reply.texts[0].contains("manager"));

        let mode: String = sqlx::query_scalar("SELECT mode FROM sessions WHERE channel_key = 'tg_42'")
            .fetch_one(&h.pool)
            .await
            .expect("mode");
        assert_eq!(mode, "unknown");
    }

    #[tokio::test]
    async fn lost_item_wizard_runs_end_to_end() {
        let h = harness().await;

        let turns = [
            ("I lost my jacket at the park", "visit"),
            ("last Saturday", "Where"),
            ("near the trampolines", "look like"),
            ("blue kids jacket with a hood", "phone"),
        ];
        for (text, expected) in turns {
            let reply = h.runtime.handle_message(msg(text)).await.expect("wizard turn");
            assert!(
                reply.texts[0].contains(expected),
                "expected `{expected}` in `{}`",
                reply.texts[0]
            );
        }

        let reply = h.runtime.handle_message(msg("+7 912 345-67-89")).await.expect("final turn");
        assert!(reply.texts[0].contains("call you back"));
        assert_eq!(h.notifier.events(), vec!["lost_item:tg_42:9123456789".to_string()]);

        let mode: String = sqlx::query_scalar("SELECT mode FROM sessions WHERE channel_key = 'tg_42'")
            .fetch_one(&h.pool)
            .await
            .expect("mode");
        assert_eq!(mode, "unknown", "a finished wizard returns the session to unknown");
    }

    #[tokio::test]
    async fn booking_change_request_is_routed_to_the_bookings_team() {
        let h = harness().await;
        h.runtime
            .handle_message(msg("can I move my booking to next week?"))
            .await
            .expect("booking change");
        assert_eq!(
            h.notifier.events(),
            vec![format!("booking_change:tg_42:{:?}", BookingChangeKind::Reschedule)]
        );
    }
}
