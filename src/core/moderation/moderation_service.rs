// Moderation engine - the stateful core of the bot.
//
// Given a message, its classification, and the sender's subscription status,
// the engine consults/updates the per-user record and decides between
// {allow, delete-silently, delete-and-warn-once}.
//
// NO Telegram dependencies here - just pure domain logic over two ports:
// the user record store and the membership provider.

use super::content_classifier::{is_restricted, PatternSet};
use super::moderation_models::{
    AllowReason, InboundMessage, ModerationOutcome, RecheckOutcome, UserRecord, UserState,
};
use super::subscription_gate::{MembershipProvider, SubscriptionGate};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Port for persisting per-user moderation records.
///
/// The engine never caches records across invocations - each decision
/// re-reads current state, so correctness survives restarts and sharding.
/// `try_create` and `compare_and_set` must be atomic per key: they are what
/// guarantees at most one warning per user even with concurrent workers.
#[async_trait]
pub trait UserRecordStore: Send + Sync {
    /// Fetch the record for a user, if one exists.
    async fn get(&self, user_id: u64) -> Result<Option<UserRecord>, ModerationError>;

    /// Insert a fresh record in `state`. Returns `false` (and changes
    /// nothing) if a record already exists.
    async fn try_create(&self, user_id: u64, state: UserState) -> Result<bool, ModerationError>;

    /// Atomically move a record from `expected` to `new`. Returns `false`
    /// if the record is absent or no longer in `expected`.
    async fn compare_and_set(
        &self,
        user_id: u64,
        expected: UserState,
        new: UserState,
    ) -> Result<bool, ModerationError>;
}

/// The per-user moderation state machine.
pub struct ModerationEngine<S: UserRecordStore, M: MembershipProvider> {
    store: S,
    gate: SubscriptionGate<M>,
    patterns: PatternSet,
}

impl<S: UserRecordStore, M: MembershipProvider> ModerationEngine<S, M> {
    pub fn new(store: S, gate: SubscriptionGate<M>, patterns: PatternSet) -> Self {
        Self {
            store,
            gate,
            patterns,
        }
    }

    /// Decide what to do with one inbound message.
    ///
    /// Exempt users bypass moderation entirely - their messages are not even
    /// classified. For everyone else a restricted message either proves
    /// subscription (retroactive allow + exemption) or gets deleted, with a
    /// warning attached exactly once per user ever.
    pub async fn handle_message(
        &self,
        msg: &InboundMessage,
    ) -> Result<ModerationOutcome, ModerationError> {
        if !msg.chat_kind.is_moderated() {
            return Ok(ModerationOutcome::NoAction(AllowReason::UnmoderatedChat));
        }

        let record = self.store.get(msg.user_id).await?;
        if record.as_ref().map(|r| r.state) == Some(UserState::Exempt) {
            return Ok(ModerationOutcome::NoAction(AllowReason::AlreadyExempt));
        }

        if !is_restricted(msg, &self.patterns) {
            return Ok(ModerationOutcome::NoAction(AllowReason::Clean));
        }

        if self.gate.is_subscribed(msg.user_id).await {
            // The user just proved eligibility; the already-sent message is
            // retroactively allowed and no notification goes out.
            self.promote_to_exempt(msg.user_id).await?;
            tracing::info!(user_id = msg.user_id, "user proved subscription, now exempt");
            return Ok(ModerationOutcome::NoAction(AllowReason::NewlyExempt));
        }

        let warn = self.take_warning_slot(msg.user_id).await?;
        if warn {
            tracing::info!(user_id = msg.user_id, chat_id = msg.chat_id, "warning user once");
        }
        Ok(ModerationOutcome::Deleted { warn })
    }

    /// Handle an activation of the "I've subscribed" affordance. Always
    /// re-runs the gate fresh; idempotent when still unsubscribed.
    pub async fn recheck(&self, user_id: u64) -> Result<RecheckOutcome, ModerationError> {
        if self.gate.is_subscribed(user_id).await {
            self.promote_to_exempt(user_id).await?;
            tracing::info!(user_id, "re-check passed, user now exempt");
            Ok(RecheckOutcome::NowExempt)
        } else {
            Ok(RecheckOutcome::StillUnsubscribed)
        }
    }

    /// Claim the single warning for this user. Returns `true` only for the
    /// one caller that wins the atomic transition into `Warned`; a lost race
    /// means another worker already warned or exempted the user.
    async fn take_warning_slot(&self, user_id: u64) -> Result<bool, ModerationError> {
        if self.store.try_create(user_id, UserState::Warned).await? {
            return Ok(true);
        }
        self.store
            .compare_and_set(user_id, UserState::Unknown, UserState::Warned)
            .await
    }

    /// Move a user into the absorbing `Exempt` state from whichever state
    /// they are currently in. A lost race is fine - it means another worker
    /// already advanced them.
    async fn promote_to_exempt(&self, user_id: u64) -> Result<(), ModerationError> {
        if self.store.try_create(user_id, UserState::Exempt).await? {
            return Ok(());
        }
        if self
            .store
            .compare_and_set(user_id, UserState::Unknown, UserState::Exempt)
            .await?
        {
            return Ok(());
        }
        self.store
            .compare_and_set(user_id, UserState::Warned, UserState::Exempt)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::moderation_models::{AttachmentKind, ChatKind, MembershipStatus};
    use crate::core::moderation::subscription_gate::MembershipError;
    use crate::infra::moderation::InMemoryRecordStore;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct MockMembership {
        members: Arc<DashMap<(String, u64), MembershipStatus>>,
        failing: Arc<AtomicBool>,
    }

    impl MockMembership {
        fn join_all(&self, channels: &[&str], user_id: u64) {
            for ch in channels {
                self.members
                    .insert((ch.to_string(), user_id), MembershipStatus::Member);
            }
        }

        fn leave_all(&self, channels: &[&str], user_id: u64) {
            for ch in channels {
                self.members
                    .insert((ch.to_string(), user_id), MembershipStatus::Left);
            }
        }
    }

    #[async_trait]
    impl MembershipProvider for MockMembership {
        async fn get_membership(
            &self,
            channel: &str,
            user_id: u64,
        ) -> Result<MembershipStatus, MembershipError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(MembershipError::Transport("simulated outage".into()));
            }
            Ok(self
                .members
                .get(&(channel.to_string(), user_id))
                .map(|s| *s)
                .unwrap_or(MembershipStatus::Left))
        }
    }

    const CHANNELS: [&str; 2] = ["@news", "@updates"];

    struct Fixture {
        engine: ModerationEngine<InMemoryRecordStore, MockMembership>,
        store: InMemoryRecordStore,
        membership: MockMembership,
    }

    fn fixture() -> Fixture {
        let store = InMemoryRecordStore::new();
        let membership = MockMembership::default();
        let gate = SubscriptionGate::new(
            membership.clone(),
            CHANNELS.iter().map(|c| c.to_string()).collect(),
            Duration::from_millis(100),
        );
        let engine = ModerationEngine::new(store.clone(), gate, PatternSet::default());
        Fixture {
            engine,
            store,
            membership,
        }
    }

    fn restricted_message(user_id: u64, chat_kind: ChatKind) -> InboundMessage {
        InboundMessage {
            message_id: 10,
            chat_id: -100123,
            chat_kind,
            user_id,
            username: Some("promoguy".into()),
            first_name: "Promo".into(),
            text: Some("check my channel @promo".into()),
            caption: None,
            forwarded: false,
            attachments: Vec::new(),
        }
    }

    fn clean_message(user_id: u64) -> InboundMessage {
        InboundMessage {
            text: Some("hello everyone".into()),
            ..restricted_message(user_id, ChatKind::Supergroup)
        }
    }

    async fn state_of(store: &InMemoryRecordStore, user_id: u64) -> Option<UserState> {
        store.get(user_id).await.unwrap().map(|r| r.state)
    }

    #[tokio::test]
    async fn private_chats_are_never_moderated() {
        let fx = fixture();
        let outcome = fx
            .engine
            .handle_message(&restricted_message(1, ChatKind::Private))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ModerationOutcome::NoAction(AllowReason::UnmoderatedChat)
        );
        assert_eq!(state_of(&fx.store, 1).await, None);
    }

    #[tokio::test]
    async fn clean_message_touches_no_state() {
        let fx = fixture();
        let outcome = fx.engine.handle_message(&clean_message(1)).await.unwrap();

        assert_eq!(outcome, ModerationOutcome::NoAction(AllowReason::Clean));
        assert_eq!(state_of(&fx.store, 1).await, None);
    }

    #[tokio::test]
    async fn first_offense_deletes_and_warns_once() {
        let fx = fixture();
        let msg = restricted_message(1, ChatKind::Supergroup);

        let first = fx.engine.handle_message(&msg).await.unwrap();
        assert_eq!(first, ModerationOutcome::Deleted { warn: true });
        assert_eq!(state_of(&fx.store, 1).await, Some(UserState::Warned));

        // Every further offense is a silent delete.
        for _ in 0..3 {
            let next = fx.engine.handle_message(&msg).await.unwrap();
            assert_eq!(next, ModerationOutcome::Deleted { warn: false });
        }
        assert_eq!(state_of(&fx.store, 1).await, Some(UserState::Warned));
    }

    #[tokio::test]
    async fn membership_outage_fails_closed_and_still_warns() {
        let fx = fixture();
        fx.membership.failing.store(true, Ordering::SeqCst);

        let outcome = fx
            .engine
            .handle_message(&restricted_message(1, ChatKind::Supergroup))
            .await
            .unwrap();

        assert_eq!(outcome, ModerationOutcome::Deleted { warn: true });
        assert_eq!(state_of(&fx.store, 1).await, Some(UserState::Warned));
    }

    #[tokio::test]
    async fn subscriber_is_exempted_without_notification() {
        let fx = fixture();
        fx.membership.join_all(&CHANNELS, 1);

        let outcome = fx
            .engine
            .handle_message(&restricted_message(1, ChatKind::Supergroup))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ModerationOutcome::NoAction(AllowReason::NewlyExempt)
        );
        assert_eq!(state_of(&fx.store, 1).await, Some(UserState::Exempt));
    }

    #[tokio::test]
    async fn exempt_user_bypasses_moderation_even_after_unsubscribing() {
        let fx = fixture();
        fx.membership.join_all(&CHANNELS, 1);
        fx.engine
            .handle_message(&restricted_message(1, ChatKind::Supergroup))
            .await
            .unwrap();

        // Simulate the user leaving every channel afterwards. Exemption is
        // monotone and never re-validated.
        fx.membership.leave_all(&CHANNELS, 1);

        let mut msg = restricted_message(1, ChatKind::Supergroup);
        msg.attachments = vec![AttachmentKind::Photo];
        let outcome = fx.engine.handle_message(&msg).await.unwrap();

        assert_eq!(
            outcome,
            ModerationOutcome::NoAction(AllowReason::AlreadyExempt)
        );
        assert_eq!(state_of(&fx.store, 1).await, Some(UserState::Exempt));
    }

    #[tokio::test]
    async fn recheck_while_unsubscribed_is_idempotent() {
        let fx = fixture();
        fx.engine
            .handle_message(&restricted_message(1, ChatKind::Supergroup))
            .await
            .unwrap();

        let first = fx.engine.recheck(1).await.unwrap();
        let second = fx.engine.recheck(1).await.unwrap();

        assert_eq!(first, RecheckOutcome::StillUnsubscribed);
        assert_eq!(second, RecheckOutcome::StillUnsubscribed);
        assert_eq!(state_of(&fx.store, 1).await, Some(UserState::Warned));
    }

    #[tokio::test]
    async fn recheck_after_subscribing_grants_exemption() {
        let fx = fixture();
        fx.engine
            .handle_message(&restricted_message(1, ChatKind::Supergroup))
            .await
            .unwrap();

        fx.membership.join_all(&CHANNELS, 1);
        let outcome = fx.engine.recheck(1).await.unwrap();

        assert_eq!(outcome, RecheckOutcome::NowExempt);
        assert_eq!(state_of(&fx.store, 1).await, Some(UserState::Exempt));
    }

    #[tokio::test]
    async fn recheck_can_exempt_a_never_seen_user() {
        let fx = fixture();
        fx.membership.join_all(&CHANNELS, 9);

        assert_eq!(fx.engine.recheck(9).await.unwrap(), RecheckOutcome::NowExempt);
        assert_eq!(state_of(&fx.store, 9).await, Some(UserState::Exempt));
    }

    #[tokio::test]
    async fn concurrent_first_offenses_warn_at_most_once() {
        let fx = fixture();
        let engine = Arc::new(fx.engine);
        let msg = restricted_message(1, ChatKind::Supergroup);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            let msg = msg.clone();
            handles.push(tokio::spawn(
                async move { engine.handle_message(&msg).await },
            ));
        }

        let mut warnings = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                ModerationOutcome::Deleted { warn: true } => warnings += 1,
                ModerationOutcome::Deleted { warn: false } => {}
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(warnings, 1);
    }

    /// The end-to-end scenario: new user posts promo, gets warned, posts
    /// again silently deleted, subscribes via the affordance, posts freely.
    #[tokio::test]
    async fn full_lifecycle_scenario() {
        let fx = fixture();
        let msg = restricted_message(7, ChatKind::Supergroup);

        assert_eq!(
            fx.engine.handle_message(&msg).await.unwrap(),
            ModerationOutcome::Deleted { warn: true }
        );
        assert_eq!(
            fx.engine.handle_message(&msg).await.unwrap(),
            ModerationOutcome::Deleted { warn: false }
        );

        fx.membership.join_all(&CHANNELS, 7);
        assert_eq!(fx.engine.recheck(7).await.unwrap(), RecheckOutcome::NowExempt);

        assert_eq!(
            fx.engine.handle_message(&msg).await.unwrap(),
            ModerationOutcome::NoAction(AllowReason::AlreadyExempt)
        );
    }

    #[tokio::test]
    async fn warned_timestamp_survives_exemption() {
        let fx = fixture();
        let msg = restricted_message(7, ChatKind::Supergroup);
        fx.engine.handle_message(&msg).await.unwrap();

        fx.membership.join_all(&CHANNELS, 7);
        fx.engine.recheck(7).await.unwrap();

        let record = fx.store.get(7).await.unwrap().unwrap();
        assert_eq!(record.state, UserState::Exempt);
        assert!(record.warned_at.is_some());
        assert!(record.exempted_at.is_some());
    }
}
