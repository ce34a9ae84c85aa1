use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    domain::{Activity, ChatOrigin, Gender, SearchMode, UserId, Verification},
    persist::Snapshot,
    ports::{Event, Notifier},
    queues::MatchQueues,
    registry::{Registry, UserFilter},
    session::UserSession,
};

/// Headcount shown alongside search status messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchStats {
    pub verified: usize,
    pub searching: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IneligibleReason {
    Unverified,
    Banned,
}

/// Result of a match request. `AlreadySearching`/`AlreadyPaired` are
/// status reports, not errors: re-requesting is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    Paired(UserId),
    Searching(SearchStats),
    AlreadySearching(SearchStats),
    AlreadyPaired,
    Ineligible(IneligibleReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    NoPartner,
    DeliveryFailed,
}

/// Everything a moderator needs to review a conversation: the reported
/// partner plus the recent-message ring buffers of both sides. Read-only.
#[derive(Clone, Debug)]
pub struct ModReport {
    pub reporter: UserId,
    pub reported: UserId,
    pub reporter_log: Vec<(ChatOrigin, String)>,
    pub reported_log: Vec<(ChatOrigin, String)>,
}

struct EngineInner {
    registry: Registry,
    queues: MatchQueues,
}

/// The pairing and session engine.
///
/// One mutex serializes every compound mutation of registry + queues, so a
/// match request, a stop, and a ban touching the same users can never
/// partially interleave. Candidate pull and dual partner assignment happen
/// inside a single lock acquisition; all transport calls happen after the
/// guard is dropped, from outcomes computed under the lock.
pub struct PairingEngine {
    inner: Mutex<EngineInner>,
    notifier: Arc<dyn Notifier>,
}

impl PairingEngine {
    pub fn new(chat_log_capacity: usize, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Mutex::new(EngineInner {
                registry: Registry::new(chat_log_capacity),
                queues: MatchQueues::default(),
            }),
            notifier,
        }
    }

    /// Create the default session record on first contact. Idempotent.
    pub async fn ensure_session(&self, id: UserId) {
        self.inner.lock().await.registry.ensure(id);
    }

    /// Cloned snapshot of a single session, for profile display.
    pub async fn session_view(&self, id: UserId) -> UserSession {
        self.inner.lock().await.registry.ensure(id).clone()
    }

    pub async fn is_banned(&self, id: UserId) -> bool {
        self.inner.lock().await.registry.ensure(id).banned
    }

    // --- registration -----------------------------------------------------

    pub async fn begin_registration(&self, id: UserId) {
        self.inner.lock().await.registry.begin_registration(id);
    }

    pub async fn record_gender(&self, id: UserId, gender: Gender) {
        self.inner.lock().await.registry.record_gender(id, gender);
    }

    /// Final registration step; the age has been validated by the caller.
    pub async fn record_age(&self, id: UserId, age: u8) {
        self.inner.lock().await.registry.record_age(id, age);
        info!(user = id.0, age, "user verified");
    }

    /// Accept a completed verification record in one step.
    pub async fn complete_verification(&self, id: UserId, gender: Gender, age: u8) {
        self.inner
            .lock()
            .await
            .registry
            .complete_verification(id, gender, age);
    }

    /// Clear gender/age/verification back to the start of registration.
    /// Any active pairing or search is torn down first.
    pub async fn reset_profile(&self, id: UserId) {
        let former = {
            let mut guard = self.inner.lock().await;
            let former = guard.teardown(id);
            guard.registry.reset_profile(id);
            former
        };
        if let Some(p) = former {
            self.notifier.notify(p, Event::PartnerLeft).await;
        }
    }

    // --- matching ---------------------------------------------------------

    /// Atomic find-or-enroll: either binds the requester to a waiting
    /// candidate (both links set, both out of every queue, in one critical
    /// section) or enrolls the requester into the queue for `mode`.
    ///
    /// The waiting candidate is notified after the lock is released; the
    /// requester learns the outcome from the return value.
    pub async fn request_match(&self, id: UserId, mode: SearchMode) -> MatchOutcome {
        let (outcome, matched) = {
            let mut guard = self.inner.lock().await;
            let EngineInner { registry, queues } = &mut *guard;

            let session = registry.ensure(id);
            if session.banned {
                return MatchOutcome::Ineligible(IneligibleReason::Banned);
            }
            if session.verification != Verification::Verified {
                return MatchOutcome::Ineligible(IneligibleReason::Unverified);
            }

            match session.activity {
                Activity::Paired => (MatchOutcome::AlreadyPaired, None),
                Activity::Searching => {
                    (MatchOutcome::AlreadySearching(stats_of(registry)), None)
                }
                Activity::Idle => {
                    // A targeted search needs the requester's own gender to
                    // know the complement; without it, fall back to the
                    // general pool.
                    let (pool, want) = match (mode, session.gender) {
                        (SearchMode::Any, _) => (SearchMode::Any, None),
                        (SearchMode::OppositeGender, Some(g)) => {
                            (SearchMode::OppositeGender, Some(g.opposite()))
                        }
                        (SearchMode::OppositeGender, None) => (SearchMode::Any, None),
                    };

                    let reg = &*registry;
                    let candidate = queues.take_where(pool, id, |c| {
                        reg.get(c).is_some_and(|s| {
                            s.is_eligible() && want.is_none_or(|g| s.gender == Some(g))
                        })
                    });

                    match candidate {
                        Some(partner) => {
                            // The pull removed the candidate from every
                            // queue; the requester was never enqueued.
                            debug_assert!(!queues.contains(id));
                            let s = registry.ensure(id);
                            s.partner = Some(partner);
                            s.activity = Activity::Paired;
                            s.search_mode = None;
                            let p = registry.ensure(partner);
                            p.partner = Some(id);
                            p.activity = Activity::Paired;
                            p.search_mode = None;
                            debug!(user = id.0, partner = partner.0, "paired");
                            (MatchOutcome::Paired(partner), Some(partner))
                        }
                        None => {
                            let s = registry.ensure(id);
                            s.activity = Activity::Searching;
                            s.search_mode = Some(mode);
                            queues.enqueue(mode, id);
                            debug!(user = id.0, ?mode, "enqueued");
                            (MatchOutcome::Searching(stats_of(registry)), None)
                        }
                    }
                }
            }
        };

        if let Some(partner) = matched {
            self.notifier.notify(partner, Event::Matched).await;
        }
        outcome
    }

    /// Leave the current conversation and/or search. Idempotent, safe to
    /// call at any time, including concurrently with an in-flight match
    /// request for the same user (both serialize on the engine lock).
    ///
    /// Returns the former partner, if there was one.
    pub async fn stop(&self, id: UserId) -> Option<UserId> {
        let former = self.inner.lock().await.teardown(id);
        if let Some(p) = former {
            self.notifier.notify(p, Event::PartnerLeft).await;
        }
        former
    }

    // --- relay ------------------------------------------------------------

    /// Forward conversation text from `sender` to their current partner.
    ///
    /// Both ring buffers record the line (the sender's as `Own`, the
    /// partner's as `Partner`) so either side can file a report with full
    /// context. Delivery happens outside the lock; a transport failure ends
    /// the conversation.
    pub async fn relay(&self, sender: UserId, text: &str) -> RelayOutcome {
        enum Step {
            TornDown(Option<UserId>),
            Deliver(UserId),
        }

        let step = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;

            let Some(partner) = inner.registry.ensure(sender).partner else {
                return RelayOutcome::NoPartner;
            };

            let symmetric = inner
                .registry
                .get(partner)
                .is_some_and(|p| p.partner == Some(sender));
            if !symmetric {
                error!(
                    user = sender.0,
                    partner = partner.0,
                    "asymmetric partner link; resetting sessions"
                );
                inner.teardown(sender);
                Step::TornDown(None)
            } else if !inner.registry.is_eligible(sender) || !inner.registry.is_eligible(partner)
            {
                // One side lost eligibility since pairing began.
                Step::TornDown(inner.teardown(sender))
            } else {
                inner
                    .registry
                    .ensure(sender)
                    .chat_log
                    .push(ChatOrigin::Own, text);
                inner
                    .registry
                    .ensure(partner)
                    .chat_log
                    .push(ChatOrigin::Partner, text);
                Step::Deliver(partner)
            }
        };

        match step {
            Step::TornDown(former) => {
                if let Some(p) = former {
                    self.notifier.notify(p, Event::PartnerLeft).await;
                }
                RelayOutcome::DeliveryFailed
            }
            Step::Deliver(partner) => match self.notifier.deliver(partner, text).await {
                Ok(()) => RelayOutcome::Delivered,
                Err(e) => {
                    warn!(
                        user = sender.0,
                        partner = partner.0,
                        error = %e,
                        "delivery failed; ending conversation"
                    );
                    // Delivery ran outside the lock; the sender may have
                    // stopped and re-paired meanwhile. Only sever the pair
                    // that actually failed.
                    let former = self.inner.lock().await.teardown_pair(sender, partner);
                    // Best-effort: the partner just proved unreachable.
                    if let Some(p) = former {
                        self.notifier.notify(p, Event::PartnerLeft).await;
                    }
                    RelayOutcome::DeliveryFailed
                }
            },
        }
    }

    // --- moderation -------------------------------------------------------

    /// Ban: the flag is set and the user is evicted from any active pairing
    /// or queue within the same critical section.
    pub async fn ban(&self, id: UserId) {
        let former = {
            let mut guard = self.inner.lock().await;
            guard.registry.ensure(id).banned = true;
            guard.teardown(id)
        };
        info!(user = id.0, "user banned");
        if let Some(p) = former {
            self.notifier.notify(p, Event::PartnerLeft).await;
        }
    }

    /// Unban clears the flag only; a severed pairing is not restored.
    pub async fn unban(&self, id: UserId) {
        self.inner.lock().await.registry.ensure(id).banned = false;
        info!(user = id.0, "user unbanned");
    }

    /// Read-only report of the current conversation, or `None` when the
    /// user has no partner.
    pub async fn report(&self, id: UserId) -> Option<ModReport> {
        let guard = self.inner.lock().await;
        let session = guard.registry.get(id)?;
        let partner = session.partner?;
        let reported_log = guard
            .registry
            .get(partner)
            .map(|s| s.chat_log.to_vec())
            .unwrap_or_default();
        Some(ModReport {
            reporter: id,
            reported: partner,
            reporter_log: session.chat_log.to_vec(),
            reported_log,
        })
    }

    // --- queries ----------------------------------------------------------

    pub async fn online_stats(&self) -> SearchStats {
        stats_of(&self.inner.lock().await.registry)
    }

    /// Sessions currently searching, for the admin variant of `/online`.
    pub async fn searching_sessions(&self) -> Vec<UserSession> {
        let guard = self.inner.lock().await;
        let mut out: Vec<UserSession> = guard
            .registry
            .iter()
            .filter(|s| s.activity == Activity::Searching && s.is_eligible())
            .cloned()
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub async fn user_ids(&self, filter: UserFilter) -> Vec<UserId> {
        self.inner.lock().await.registry.ids_where(filter)
    }

    /// Verified, unbanned users: the audience of an admin broadcast.
    pub async fn broadcast_targets(&self) -> Vec<UserId> {
        let guard = self.inner.lock().await;
        let mut out: Vec<UserId> = guard
            .registry
            .iter()
            .filter(|s| s.is_eligible())
            .map(|s| s.id)
            .collect();
        out.sort();
        out
    }

    // --- persistence ------------------------------------------------------

    pub async fn snapshot(&self) -> Snapshot {
        let guard = self.inner.lock().await;
        Snapshot::capture(guard.registry.iter().cloned().collect())
    }

    /// Rehydrate sessions from a snapshot, re-deriving queue membership and
    /// dropping any pairing the file cannot support symmetrically.
    ///
    /// Returns the number of restored sessions.
    pub async fn restore(&self, snapshot: Snapshot) -> usize {
        let mut guard = self.inner.lock().await;
        let count = snapshot.users.len();
        for session in snapshot.users {
            guard.registry.insert(session);
        }
        guard.rebuild_queues_and_heal();
        info!(users = count, "state restored from snapshot");
        count
    }
}

impl EngineInner {
    /// Clear the user's pairing/search state and their partner's, remove
    /// both from every queue. Idempotent. Returns the former partner.
    fn teardown(&mut self, id: UserId) -> Option<UserId> {
        self.queues.remove(id);
        let session = self.registry.ensure(id);
        let former = session.partner.take();
        session.activity = Activity::Idle;
        session.search_mode = None;

        if let Some(pid) = former {
            let partner = self.registry.ensure(pid);
            if partner.partner != Some(id) {
                error!(
                    user = id.0,
                    partner = pid.0,
                    "asymmetric partner link; resetting both sessions"
                );
            }
            partner.clear_pairing();
            self.queues.remove(pid);
        }
        former
    }

    /// Teardown, but only while `id` is still paired with `partner`.
    /// A no-op (returning `None`) if the link moved on in the meantime.
    fn teardown_pair(&mut self, id: UserId, partner: UserId) -> Option<UserId> {
        if self.registry.get(id).and_then(|s| s.partner) != Some(partner) {
            return None;
        }
        self.teardown(id)
    }

    /// After a restore: queue membership follows `activity`/`search_mode`,
    /// and every pairing must be symmetric between two eligible users.
    fn rebuild_queues_and_heal(&mut self) {
        let ids: Vec<UserId> = self.registry.iter().map(|s| s.id).collect();
        for id in ids {
            let (activity, mode, partner, eligible) = {
                let s = self.registry.ensure(id);
                (s.activity, s.search_mode, s.partner, s.is_eligible())
            };
            match activity {
                Activity::Searching => match (mode, eligible) {
                    (Some(m), true) => self.queues.enqueue(m, id),
                    _ => self.registry.ensure(id).clear_pairing(),
                },
                Activity::Paired => {
                    let intact = eligible
                        && partner.is_some_and(|p| {
                            self.registry
                                .get(p)
                                .is_some_and(|ps| ps.partner == Some(id) && ps.is_eligible())
                        });
                    if !intact {
                        warn!(user = id.0, "dropping broken pairing from snapshot");
                        self.registry.ensure(id).clear_pairing();
                    }
                }
                Activity::Idle => {
                    if partner.is_some() {
                        warn!(user = id.0, "idle session held a partner link; clearing");
                        self.registry.ensure(id).clear_pairing();
                    }
                }
            }
        }
    }
}

fn stats_of(registry: &Registry) -> SearchStats {
    SearchStats {
        verified: registry.verified_count(),
        searching: registry.searching_count(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::Error;

    #[derive(Default)]
    struct RecordingNotifier {
        events: StdMutex<Vec<(UserId, Event)>>,
        delivered: StdMutex<Vec<(UserId, String)>>,
        unreachable: StdMutex<HashSet<UserId>>,
    }

    impl RecordingNotifier {
        fn events(&self) -> Vec<(UserId, Event)> {
            self.events.lock().unwrap().clone()
        }

        fn delivered(&self) -> Vec<(UserId, String)> {
            self.delivered.lock().unwrap().clone()
        }

        fn mark_unreachable(&self, id: UserId) {
            self.unreachable.lock().unwrap().insert(id);
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, user: UserId, event: Event) {
            self.events.lock().unwrap().push((user, event));
        }

        async fn deliver(&self, user: UserId, text: &str) -> crate::Result<()> {
            if self.unreachable.lock().unwrap().contains(&user) {
                return Err(Error::Transport("blocked by recipient".to_string()));
            }
            self.delivered
                .lock()
                .unwrap()
                .push((user, text.to_string()));
            Ok(())
        }
    }

    /// Delivery to `stalled` parks until `release` fires, then fails.
    /// `entered` signals that the delivery is in flight.
    struct StallingNotifier {
        events: StdMutex<Vec<(UserId, Event)>>,
        stalled: UserId,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    impl StallingNotifier {
        fn new(stalled: UserId) -> Self {
            Self {
                events: StdMutex::new(Vec::new()),
                stalled,
                entered: tokio::sync::Notify::new(),
                release: tokio::sync::Notify::new(),
            }
        }

        fn events(&self) -> Vec<(UserId, Event)> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for StallingNotifier {
        async fn notify(&self, user: UserId, event: Event) {
            self.events.lock().unwrap().push((user, event));
        }

        async fn deliver(&self, user: UserId, _text: &str) -> crate::Result<()> {
            if user == self.stalled {
                self.entered.notify_one();
                self.release.notified().await;
                return Err(Error::Transport("recipient gone".to_string()));
            }
            Ok(())
        }
    }

    fn new_engine() -> (Arc<PairingEngine>, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Arc::new(PairingEngine::new(20, notifier.clone()));
        (engine, notifier)
    }

    async fn verified(engine: &PairingEngine, id: i64, gender: Gender) -> UserId {
        let id = UserId(id);
        engine.complete_verification(id, gender, 21).await;
        id
    }

    async fn assert_symmetric_pair(engine: &PairingEngine, a: UserId, b: UserId) {
        let sa = engine.session_view(a).await;
        let sb = engine.session_view(b).await;
        assert_eq!(sa.partner, Some(b));
        assert_eq!(sb.partner, Some(a));
        assert_eq!(sa.activity, Activity::Paired);
        assert_eq!(sb.activity, Activity::Paired);
    }

    async fn assert_idle(engine: &PairingEngine, id: UserId) {
        let s = engine.session_view(id).await;
        assert_eq!(s.activity, Activity::Idle);
        assert!(s.partner.is_none());
        assert!(s.search_mode.is_none());
    }

    #[tokio::test]
    async fn second_searcher_pairs_with_first() {
        let (engine, notifier) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;

        let first = engine.request_match(a, SearchMode::Any).await;
        assert!(matches!(first, MatchOutcome::Searching(_)));
        assert_eq!(engine.session_view(a).await.activity, Activity::Searching);

        let second = engine.request_match(b, SearchMode::Any).await;
        assert_eq!(second, MatchOutcome::Paired(a));

        assert_symmetric_pair(&engine, a, b).await;
        // The waiting side observed the pairing asynchronously.
        assert_eq!(notifier.events(), vec![(a, Event::Matched)]);
        // Neither remains in any queue: a third searcher finds nobody.
        let c = verified(&engine, 3, Gender::Male).await;
        assert!(matches!(
            engine.request_match(c, SearchMode::Any).await,
            MatchOutcome::Searching(_)
        ));
    }

    #[tokio::test]
    async fn rerequesting_reports_status_without_side_effects() {
        let (engine, _) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;

        assert!(matches!(
            engine.request_match(a, SearchMode::Any).await,
            MatchOutcome::Searching(_)
        ));
        assert!(matches!(
            engine.request_match(a, SearchMode::Any).await,
            MatchOutcome::AlreadySearching(_)
        ));

        assert_eq!(
            engine.request_match(b, SearchMode::Any).await,
            MatchOutcome::Paired(a)
        );
        assert_eq!(
            engine.request_match(a, SearchMode::Any).await,
            MatchOutcome::AlreadyPaired
        );
        assert_symmetric_pair(&engine, a, b).await;
    }

    #[tokio::test]
    async fn lone_searcher_never_matches_self() {
        let (engine, notifier) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;

        assert!(matches!(
            engine.request_match(a, SearchMode::Any).await,
            MatchOutcome::Searching(_)
        ));
        assert!(matches!(
            engine.request_match(a, SearchMode::Any).await,
            MatchOutcome::AlreadySearching(_)
        ));
        assert!(notifier.events().is_empty());
        assert!(engine.session_view(a).await.partner.is_none());
    }

    #[tokio::test]
    async fn unverified_and_banned_users_cannot_search() {
        let (engine, _) = new_engine();
        let u = UserId(1);
        engine.ensure_session(u).await;
        assert_eq!(
            engine.request_match(u, SearchMode::Any).await,
            MatchOutcome::Ineligible(IneligibleReason::Unverified)
        );

        let b = verified(&engine, 2, Gender::Male).await;
        engine.ban(b).await;
        assert_eq!(
            engine.request_match(b, SearchMode::Any).await,
            MatchOutcome::Ineligible(IneligibleReason::Banned)
        );
    }

    #[tokio::test]
    async fn banned_waiting_user_is_not_a_candidate() {
        let (engine, _) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;

        engine.request_match(a, SearchMode::Any).await;
        engine.ban(a).await;

        // The queue no longer holds the banned user.
        assert!(matches!(
            engine.request_match(b, SearchMode::Any).await,
            MatchOutcome::Searching(_)
        ));
        assert_idle(&engine, a).await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_notifies_partner() {
        let (engine, notifier) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;
        engine.request_match(a, SearchMode::Any).await;
        engine.request_match(b, SearchMode::Any).await;

        assert_eq!(engine.stop(a).await, Some(b));
        assert_idle(&engine, a).await;
        assert_idle(&engine, b).await;
        assert!(notifier.events().contains(&(b, Event::PartnerLeft)));

        // Second stop: same end state, no extra notifications.
        let before = notifier.events().len();
        assert_eq!(engine.stop(a).await, None);
        assert_idle(&engine, a).await;
        assert_idle(&engine, b).await;
        assert_eq!(notifier.events().len(), before);
    }

    #[tokio::test]
    async fn stop_cancels_a_pending_search() {
        let (engine, _) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;

        engine.request_match(a, SearchMode::Any).await;
        assert_eq!(engine.stop(a).await, None);
        assert_idle(&engine, a).await;

        // The queue is empty for the next requester.
        assert!(matches!(
            engine.request_match(b, SearchMode::Any).await,
            MatchOutcome::Searching(_)
        ));
    }

    #[tokio::test]
    async fn ban_severs_an_active_pairing() {
        let (engine, notifier) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;
        engine.request_match(a, SearchMode::Any).await;
        engine.request_match(b, SearchMode::Any).await;
        assert_symmetric_pair(&engine, a, b).await;

        engine.ban(a).await;
        assert!(engine.is_banned(a).await);
        assert_idle(&engine, a).await;
        assert_idle(&engine, b).await;
        assert!(notifier.events().contains(&(b, Event::PartnerLeft)));

        // Unban restores usability only, not the old pairing.
        engine.unban(a).await;
        assert!(!engine.is_banned(a).await);
        assert_idle(&engine, a).await;
    }

    #[tokio::test]
    async fn relay_delivers_and_logs_both_sides() {
        let (engine, notifier) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;
        engine.request_match(a, SearchMode::Any).await;
        engine.request_match(b, SearchMode::Any).await;

        assert_eq!(engine.relay(a, "hi").await, RelayOutcome::Delivered);
        assert_eq!(engine.relay(b, "hello").await, RelayOutcome::Delivered);
        assert_eq!(
            notifier.delivered(),
            vec![(b, "hi".to_string()), (a, "hello".to_string())]
        );

        let log_a = engine.session_view(a).await.chat_log.to_vec();
        let log_b = engine.session_view(b).await.chat_log.to_vec();
        assert_eq!(
            log_a,
            vec![
                (ChatOrigin::Own, "hi".to_string()),
                (ChatOrigin::Partner, "hello".to_string()),
            ]
        );
        assert_eq!(
            log_b,
            vec![
                (ChatOrigin::Partner, "hi".to_string()),
                (ChatOrigin::Own, "hello".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn relay_without_partner_reports_no_partner() {
        let (engine, notifier) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        assert_eq!(engine.relay(a, "anyone?").await, RelayOutcome::NoPartner);
        assert!(notifier.delivered().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_ends_the_conversation() {
        let (engine, notifier) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;
        engine.request_match(a, SearchMode::Any).await;
        engine.request_match(b, SearchMode::Any).await;

        notifier.mark_unreachable(b);
        assert_eq!(engine.relay(a, "hi").await, RelayOutcome::DeliveryFailed);
        assert_idle(&engine, a).await;
        assert_idle(&engine, b).await;

        // The failed line still reached the ring buffers before delivery.
        assert_eq!(engine.session_view(a).await.chat_log.len(), 1);
    }

    #[tokio::test]
    async fn stale_delivery_failure_spares_a_new_pairing() {
        let notifier = Arc::new(StallingNotifier::new(UserId(2)));
        let engine = Arc::new(PairingEngine::new(20, notifier.clone()));
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;
        let d = verified(&engine, 4, Gender::Female).await;
        engine.request_match(a, SearchMode::Any).await;
        engine.request_match(b, SearchMode::Any).await;

        // Delivery to B parks inside the notifier, outside the engine lock.
        let relay = tokio::spawn({
            let engine = engine.clone();
            async move { engine.relay(a, "hi").await }
        });
        notifier.entered.notified().await;

        // While the delivery hangs, A leaves the old conversation and
        // pairs with D.
        engine.stop(a).await;
        engine.request_match(d, SearchMode::Any).await;
        assert_eq!(
            engine.request_match(a, SearchMode::Any).await,
            MatchOutcome::Paired(d)
        );

        // The old delivery now fails. It must not touch the new pairing.
        notifier.release.notify_one();
        assert_eq!(relay.await.unwrap(), RelayOutcome::DeliveryFailed);
        assert_symmetric_pair(&engine, a, d).await;
        assert!(!notifier.events().contains(&(d, Event::PartnerLeft)));
    }

    #[tokio::test]
    async fn targeted_search_only_sees_the_complementary_pool() {
        let (engine, _) = new_engine();
        let requester = verified(&engine, 1, Gender::Male).await;
        let general = verified(&engine, 2, Gender::Female).await;
        let targeted = verified(&engine, 3, Gender::Female).await;

        // One woman waits in the general pool, one in the targeted pool.
        engine.request_match(general, SearchMode::Any).await;
        engine
            .request_match(targeted, SearchMode::OppositeGender)
            .await;

        let out = engine
            .request_match(requester, SearchMode::OppositeGender)
            .await;
        assert_eq!(out, MatchOutcome::Paired(targeted));
        // The general-pool member keeps waiting.
        assert_eq!(
            engine.session_view(general).await.activity,
            Activity::Searching
        );
    }

    #[tokio::test]
    async fn targeted_search_skips_same_gender_candidates() {
        let (engine, _) = new_engine();
        let requester = verified(&engine, 1, Gender::Male).await;
        let same = verified(&engine, 2, Gender::Male).await;

        engine.request_match(same, SearchMode::OppositeGender).await;
        let out = engine
            .request_match(requester, SearchMode::OppositeGender)
            .await;
        assert!(matches!(out, MatchOutcome::Searching(_)));
        assert_eq!(
            engine.session_view(same).await.activity,
            Activity::Searching
        );
    }

    #[tokio::test]
    async fn report_carries_both_ring_buffers() {
        let (engine, _) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;
        engine.request_match(a, SearchMode::Any).await;
        engine.request_match(b, SearchMode::Any).await;
        engine.relay(a, "first").await;
        engine.relay(b, "second").await;

        let report = engine.report(a).await.expect("paired user can report");
        assert_eq!(report.reporter, a);
        assert_eq!(report.reported, b);
        assert_eq!(report.reporter_log.len(), 2);
        assert_eq!(report.reported_log.len(), 2);

        // Reporting is read-only.
        assert_symmetric_pair(&engine, a, b).await;
        assert!(engine.report(UserId(99)).await.is_none());
    }

    #[tokio::test]
    async fn reset_profile_tears_down_and_clears_verification() {
        let (engine, notifier) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;
        engine.request_match(a, SearchMode::Any).await;
        engine.request_match(b, SearchMode::Any).await;

        engine.reset_profile(a).await;
        let s = engine.session_view(a).await;
        assert_eq!(s.verification, Verification::PendingGender);
        assert!(s.gender.is_none());
        assert_idle(&engine, a).await;
        assert_idle(&engine, b).await;
        assert!(notifier.events().contains(&(b, Event::PartnerLeft)));
    }

    #[tokio::test]
    async fn online_stats_count_eligible_users() {
        let (engine, _) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let _b = verified(&engine, 2, Gender::Female).await;
        let c = verified(&engine, 3, Gender::Male).await;
        engine.ensure_session(UserId(4)).await; // unverified

        engine.request_match(a, SearchMode::Any).await;
        engine.ban(c).await;

        let stats = engine.online_stats().await;
        assert_eq!(stats.verified, 2);
        assert_eq!(stats.searching, 1);
        assert_eq!(engine.broadcast_targets().await, vec![UserId(1), UserId(2)]);
    }

    #[tokio::test]
    async fn snapshot_restore_preserves_pairings_and_queues() {
        let (engine, _) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;
        let c = verified(&engine, 3, Gender::Male).await;
        engine.request_match(a, SearchMode::Any).await;
        engine.request_match(b, SearchMode::Any).await;
        engine.relay(a, "hi").await;
        engine.request_match(c, SearchMode::Any).await;

        let snapshot = engine.snapshot().await;

        let (fresh, _) = new_engine();
        assert_eq!(fresh.restore(snapshot).await, 3);
        assert_symmetric_pair(&fresh, a, b).await;
        assert_eq!(fresh.session_view(a).await.chat_log.len(), 1);

        // The waiting user went back into a queue: a new searcher pairs
        // with them instead of enrolling.
        let d = verified(&fresh, 4, Gender::Female).await;
        assert_eq!(
            fresh.request_match(d, SearchMode::Any).await,
            MatchOutcome::Paired(c)
        );
    }

    #[tokio::test]
    async fn restore_heals_asymmetric_links() {
        let (engine, _) = new_engine();
        let a = verified(&engine, 1, Gender::Male).await;
        let b = verified(&engine, 2, Gender::Female).await;
        engine.request_match(a, SearchMode::Any).await;
        engine.request_match(b, SearchMode::Any).await;

        let mut snapshot = engine.snapshot().await;
        // Corrupt one side of the link, as a bad backup might.
        for user in &mut snapshot.users {
            if user.id == b {
                user.partner = Some(UserId(42));
            }
        }

        let (fresh, _) = new_engine();
        fresh.restore(snapshot).await;
        assert_idle(&fresh, a).await;
        assert_idle(&fresh, b).await;
    }
}
