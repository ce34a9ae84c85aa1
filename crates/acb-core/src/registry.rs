use std::collections::HashMap;

use crate::domain::{Activity, Gender, UserId, Verification};
use crate::session::UserSession;

/// Admin-panel listing filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserFilter {
    All,
    Verified,
    Unverified,
    Banned,
}

/// Single source of truth for per-user state.
///
/// Deliberately not locked: the engine wraps registry and queues together in
/// one mutex so every compound operation (match, teardown, ban) mutates both
/// atomically. Nothing outside the engine holds a registry reference.
#[derive(Debug)]
pub struct Registry {
    log_capacity: usize,
    users: HashMap<UserId, UserSession>,
}

impl Registry {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            log_capacity,
            users: HashMap::new(),
        }
    }

    /// Lazily create the default record on first contact. Idempotent.
    pub fn ensure(&mut self, id: UserId) -> &mut UserSession {
        self.users
            .entry(id)
            .or_insert_with(|| UserSession::new(id, self.log_capacity))
    }

    pub fn get(&self, id: UserId) -> Option<&UserSession> {
        self.users.get(&id)
    }

    pub fn is_eligible(&self, id: UserId) -> bool {
        self.users.get(&id).is_some_and(UserSession::is_eligible)
    }

    /// Start (or restart) the registration conversation. A no-op for users
    /// that are already verified.
    pub fn begin_registration(&mut self, id: UserId) {
        let s = self.ensure(id);
        if s.verification != Verification::Verified {
            s.verification = Verification::PendingGender;
        }
    }

    pub fn record_gender(&mut self, id: UserId, gender: Gender) {
        let s = self.ensure(id);
        s.gender = Some(gender);
        s.verification = Verification::PendingAge;
    }

    /// Final registration step: the age has already been validated by the
    /// registration flow, so this marks the record verified.
    pub fn record_age(&mut self, id: UserId, age: u8) {
        let s = self.ensure(id);
        s.age = Some(age);
        s.verification = Verification::Verified;
    }

    /// Accept a completed verification record in one step (restore paths,
    /// tests).
    pub fn complete_verification(&mut self, id: UserId, gender: Gender, age: u8) {
        let s = self.ensure(id);
        s.gender = Some(gender);
        s.age = Some(age);
        s.verification = Verification::Verified;
    }

    /// Clear gender/age/verification back to the start of registration.
    /// Pairing state must already have been torn down by the caller.
    pub fn reset_profile(&mut self, id: UserId) {
        let s = self.ensure(id);
        s.gender = None;
        s.age = None;
        s.verification = Verification::PendingGender;
    }

    pub fn verified_count(&self) -> usize {
        self.users.values().filter(|s| s.is_eligible()).count()
    }

    pub fn searching_count(&self) -> usize {
        self.users
            .values()
            .filter(|s| s.activity == Activity::Searching && s.is_eligible())
            .count()
    }

    pub fn ids_where(&self, filter: UserFilter) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self
            .users
            .values()
            .filter(|s| match filter {
                UserFilter::All => true,
                UserFilter::Verified => s.verification == Verification::Verified,
                UserFilter::Unverified => s.verification != Verification::Verified,
                UserFilter::Banned => s.banned,
            })
            .map(|s| s.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserSession> {
        self.users.values()
    }

    /// Replace a record wholesale (snapshot restore).
    pub fn insert(&mut self, session: UserSession) {
        self.users.insert(session.id, session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_is_idempotent() {
        let mut reg = Registry::new(20);
        reg.ensure(UserId(1)).banned = true;
        assert!(reg.ensure(UserId(1)).banned);
        assert_eq!(reg.ids_where(UserFilter::All).len(), 1);
    }

    #[test]
    fn registration_steps_end_verified() {
        let mut reg = Registry::new(20);
        let id = UserId(5);
        reg.begin_registration(id);
        assert_eq!(reg.get(id).unwrap().verification, Verification::PendingGender);
        reg.record_gender(id, Gender::Female);
        assert_eq!(reg.get(id).unwrap().verification, Verification::PendingAge);
        reg.record_age(id, 21);
        assert!(reg.is_eligible(id));
    }

    #[test]
    fn begin_registration_leaves_verified_users_alone() {
        let mut reg = Registry::new(20);
        let id = UserId(5);
        reg.complete_verification(id, Gender::Male, 22);
        reg.begin_registration(id);
        assert_eq!(reg.get(id).unwrap().verification, Verification::Verified);
    }

    #[test]
    fn reset_profile_clears_verification_fields() {
        let mut reg = Registry::new(20);
        let id = UserId(9);
        reg.complete_verification(id, Gender::Male, 25);
        reg.reset_profile(id);
        let s = reg.get(id).unwrap();
        assert_eq!(s.verification, Verification::PendingGender);
        assert!(s.gender.is_none());
        assert!(s.age.is_none());
        assert!(!reg.is_eligible(id));
    }

    #[test]
    fn banned_users_are_not_eligible_or_counted() {
        let mut reg = Registry::new(20);
        reg.complete_verification(UserId(1), Gender::Male, 20);
        reg.complete_verification(UserId(2), Gender::Female, 20);
        reg.ensure(UserId(2)).banned = true;
        assert_eq!(reg.verified_count(), 1);
        assert!(!reg.is_eligible(UserId(2)));
        assert_eq!(reg.ids_where(UserFilter::Banned), vec![UserId(2)]);
    }
}
