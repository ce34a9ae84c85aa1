use std::collections::HashSet;

use rand::seq::IteratorRandom;

use crate::domain::{SearchMode, UserId};

/// Per-mode pools of users currently waiting for a partner.
///
/// Candidate selection is random among matching members; there is no FIFO
/// or priority guarantee. A user belongs to at most one pool at a time, and
/// `remove` always clears every pool so a stale membership cannot survive a
/// mode change.
#[derive(Debug, Default)]
pub struct MatchQueues {
    any: HashSet<UserId>,
    opposite: HashSet<UserId>,
}

impl MatchQueues {
    fn pool(&self, mode: SearchMode) -> &HashSet<UserId> {
        match mode {
            SearchMode::Any => &self.any,
            SearchMode::OppositeGender => &self.opposite,
        }
    }

    fn pool_mut(&mut self, mode: SearchMode) -> &mut HashSet<UserId> {
        match mode {
            SearchMode::Any => &mut self.any,
            SearchMode::OppositeGender => &mut self.opposite,
        }
    }

    pub fn enqueue(&mut self, mode: SearchMode, id: UserId) {
        // One pool at a time.
        self.remove(id);
        self.pool_mut(mode).insert(id);
    }

    /// Remove from every pool. Idempotent; used on stop, pairing, and ban.
    pub fn remove(&mut self, id: UserId) {
        for mode in SearchMode::ALL {
            self.pool_mut(mode).remove(&id);
        }
    }

    pub fn contains(&self, id: UserId) -> bool {
        SearchMode::ALL.iter().any(|&m| self.pool(m).contains(&id))
    }

    pub fn len(&self, mode: SearchMode) -> usize {
        self.pool(mode).len()
    }

    pub fn is_empty(&self) -> bool {
        SearchMode::ALL.iter().all(|&m| self.pool(m).is_empty())
    }

    /// Remove and return one random member of `mode`'s pool that satisfies
    /// `keep`, never the requester itself.
    ///
    /// The chosen member is removed from every pool, not just the one
    /// queried. A pull that lands on stale self-membership is discarded and
    /// retried once before giving up.
    pub fn take_where(
        &mut self,
        mode: SearchMode,
        requester: UserId,
        mut keep: impl FnMut(UserId) -> bool,
    ) -> Option<UserId> {
        for _ in 0..2 {
            let picked = {
                let mut rng = rand::thread_rng();
                self.pool(mode)
                    .iter()
                    .copied()
                    .filter(|&id| keep(id))
                    .choose(&mut rng)
            }?;
            self.remove(picked);
            if picked != requester {
                return Some(picked);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_moves_between_pools() {
        let mut q = MatchQueues::default();
        q.enqueue(SearchMode::Any, UserId(1));
        q.enqueue(SearchMode::OppositeGender, UserId(1));
        assert_eq!(q.len(SearchMode::Any), 0);
        assert_eq!(q.len(SearchMode::OppositeGender), 1);
    }

    #[test]
    fn remove_is_idempotent_and_clears_all_pools() {
        let mut q = MatchQueues::default();
        q.enqueue(SearchMode::Any, UserId(1));
        q.remove(UserId(1));
        q.remove(UserId(1));
        assert!(q.is_empty());
        assert!(!q.contains(UserId(1)));
    }

    #[test]
    fn take_never_returns_requester() {
        let mut q = MatchQueues::default();
        // Stale self-membership: the requester somehow sits in the pool.
        q.enqueue(SearchMode::Any, UserId(1));
        assert_eq!(q.take_where(SearchMode::Any, UserId(1), |_| true), None);
        // The stale entry is gone after the guarded pull.
        assert!(!q.contains(UserId(1)));
    }

    #[test]
    fn take_filters_by_predicate() {
        let mut q = MatchQueues::default();
        q.enqueue(SearchMode::Any, UserId(2));
        q.enqueue(SearchMode::Any, UserId(3));
        let got = q.take_where(SearchMode::Any, UserId(1), |id| id == UserId(3));
        assert_eq!(got, Some(UserId(3)));
        // The chosen member left every pool; the rejected one stayed.
        assert!(q.contains(UserId(2)));
        assert!(!q.contains(UserId(3)));
    }

    #[test]
    fn take_from_empty_pool_is_none() {
        let mut q = MatchQueues::default();
        assert_eq!(q.take_where(SearchMode::Any, UserId(1), |_| true), None);
    }
}
