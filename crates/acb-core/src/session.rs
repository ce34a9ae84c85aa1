use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::{Activity, ChatOrigin, Gender, SearchMode, UserId, Verification};

/// Bounded log of the most recent chat lines, kept per user so a moderation
/// report carries context from either side of a conversation. Oldest entries
/// are evicted first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatLog {
    capacity: usize,
    entries: VecDeque<(ChatOrigin, String)>,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, origin: ChatOrigin, text: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((origin, text.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &(ChatOrigin, String)> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<(ChatOrigin, String)> {
        self.entries.iter().cloned().collect()
    }
}

/// Per-participant record: registration state, moderation flag, and the
/// current pairing/search state. Created lazily on first contact.
///
/// `partner` is a weak, symmetric reference: if it is `Some(p)`, then `p`'s
/// session must point back here. The engine maintains that invariant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserSession {
    pub id: UserId,
    pub verification: Verification,
    pub gender: Option<Gender>,
    pub age: Option<u8>,
    pub banned: bool,
    pub activity: Activity,
    pub search_mode: Option<SearchMode>,
    pub partner: Option<UserId>,
    pub chat_log: ChatLog,
}

impl UserSession {
    pub fn new(id: UserId, log_capacity: usize) -> Self {
        Self {
            id,
            verification: Verification::Unverified,
            gender: None,
            age: None,
            banned: false,
            activity: Activity::Idle,
            search_mode: None,
            partner: None,
            chat_log: ChatLog::new(log_capacity),
        }
    }

    /// Verified and not banned.
    pub fn is_eligible(&self) -> bool {
        self.verification == Verification::Verified && !self.banned
    }

    /// Drop any pairing/search state, back to `Idle`.
    pub fn clear_pairing(&mut self) {
        self.partner = None;
        self.search_mode = None;
        self.activity = Activity::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_idle_and_unverified() {
        let s = UserSession::new(UserId(7), 20);
        assert_eq!(s.verification, Verification::Unverified);
        assert_eq!(s.activity, Activity::Idle);
        assert!(s.partner.is_none());
        assert!(!s.is_eligible());
    }

    #[test]
    fn chat_log_evicts_oldest_at_capacity() {
        let mut log = ChatLog::new(3);
        for i in 0..5 {
            log.push(ChatOrigin::Own, format!("m{i}"));
        }
        assert_eq!(log.len(), 3);
        let texts: Vec<&str> = log.entries().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn chat_log_capacity_is_at_least_one() {
        let mut log = ChatLog::new(0);
        log.push(ChatOrigin::Partner, "hi");
        log.push(ChatOrigin::Partner, "there");
        assert_eq!(log.len(), 1);
        assert_eq!(log.to_vec()[0].1, "there");
    }
}
