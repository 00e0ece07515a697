//! The concurrently mutable matcher registry.
//!
//! The registry holds the main (non-temporary) matcher list, the temporary
//! matcher store and the per-group hook table. It is the only structure
//! mutated concurrently by user registration code and by the dispatch loop;
//! all mutation goes through its synchronized operations and handler code
//! never touches the containers directly. There is no ambient global
//! instance: callers construct a [`Registry`] and inject it into whatever
//! needs to register.
//!
//! # Ordering invariant
//!
//! The main list is kept priority-ordered by *insertion*, never sorted at
//! dispatch time. A new matcher is placed before every existing matcher of
//! equal or higher priority value, so lower priority values run first and —
//! among equal priorities — the matcher registered **later** runs **first**.
//! This reversed tie order mirrors the protocol's established contract and is
//! asserted by tests; do not "fix" it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::engine::matcher::{GroupId, Matcher, MatcherId, SharedMatcher};
use crate::engine::session::Hook;

/// Cross-cutting hooks owned by one group.
#[derive(Clone, Default)]
pub struct GroupHooks {
    /// Run before rule evaluation; `false` skips the matcher.
    pub pre: Vec<Hook>,
    /// Run after rules pass, before the handler chain; `false` skips.
    pub mid: Vec<Hook>,
    /// Run after the handler chain; `false` stops remaining post-hooks.
    pub post: Vec<Hook>,
}

/// The process-wide store of matchers and group hooks.
#[derive(Default)]
pub struct Registry {
    main: RwLock<Vec<SharedMatcher>>,
    temps: Mutex<HashMap<MatcherId, SharedMatcher>>,
    groups: Mutex<HashMap<GroupId, GroupHooks>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // -------------------------------------------------------------------------
    // Main list
    // -------------------------------------------------------------------------

    /// Inserts a matcher into the main list at its priority rank.
    pub fn insert(&self, matcher: Matcher) -> MatcherId {
        let id = matcher.id;
        let matcher = Arc::new(matcher);
        let mut main = self.main.write();
        let at = main.partition_point(|existing| existing.priority < matcher.priority);
        main.insert(at, matcher);
        id
    }

    /// Removes a matcher by identity from either store.
    ///
    /// Removing an unknown or already-removed id is a no-op. Safe to call
    /// from within a handler executing as part of that same matcher.
    pub fn remove(&self, id: MatcherId) {
        if self.temps.lock().remove(&id).is_some() {
            return;
        }
        self.main.write().retain(|m| m.id != id);
    }

    /// Atomically claims a temporary matcher so it can never run twice.
    ///
    /// Returns the matcher only for the first caller; concurrent dispatches
    /// racing on the same temporary matcher see `None`.
    pub fn claim_temp(&self, id: MatcherId) -> Option<SharedMatcher> {
        self.temps.lock().remove(&id)
    }

    /// Replaces a main-list matcher after applying `mutate` to a copy.
    ///
    /// The updated matcher re-enters the list at its (possibly new) priority
    /// rank, taking the newest-registration position among equal priorities.
    /// A dispatch already in progress completes with the template it
    /// snapshotted. No-op if the id is not registered.
    pub fn update<F>(&self, id: MatcherId, mutate: F)
    where
        F: FnOnce(&mut Matcher),
    {
        let mut main = self.main.write();
        let Some(pos) = main.iter().position(|m| m.id == id) else {
            return;
        };
        let mut matcher = (*main.remove(pos)).clone();
        mutate(&mut matcher);
        let at = main.partition_point(|existing| existing.priority < matcher.priority);
        main.insert(at, Arc::new(matcher));
    }

    /// Ordered snapshot of the main list, safe to iterate while the registry
    /// is mutated elsewhere.
    pub fn snapshot(&self) -> Vec<SharedMatcher> {
        self.main.read().clone()
    }

    /// Number of main-list matchers.
    pub fn len(&self) -> usize {
        self.main.read().len()
    }

    /// Whether the main list is empty.
    pub fn is_empty(&self) -> bool {
        self.main.read().is_empty()
    }

    // -------------------------------------------------------------------------
    // Temporary store
    // -------------------------------------------------------------------------

    /// Registers a temporary matcher.
    pub fn insert_temp(&self, matcher: Matcher) -> MatcherId {
        let id = matcher.id;
        self.temps.lock().insert(id, Arc::new(matcher));
        id
    }

    /// Snapshot of the temporary store, newest registration first.
    pub fn snapshot_temps(&self) -> Vec<SharedMatcher> {
        let temps = self.temps.lock();
        let mut list: Vec<SharedMatcher> = temps.values().cloned().collect();
        list.sort_by(|a, b| b.id.cmp(&a.id));
        list
    }

    /// Number of pending temporary matchers.
    pub fn temp_len(&self) -> usize {
        self.temps.lock().len()
    }

    // -------------------------------------------------------------------------
    // Groups
    // -------------------------------------------------------------------------

    /// Registers an empty hook table for a group.
    pub fn insert_group(&self, group: GroupId) {
        self.groups.lock().entry(group).or_default();
    }

    /// Appends a pre-hook to a group.
    pub fn add_pre_hook(&self, group: GroupId, hook: Hook) {
        self.groups.lock().entry(group).or_default().pre.push(hook);
    }

    /// Appends a mid-hook to a group.
    pub fn add_mid_hook(&self, group: GroupId, hook: Hook) {
        self.groups.lock().entry(group).or_default().mid.push(hook);
    }

    /// Appends a post-hook to a group.
    pub fn add_post_hook(&self, group: GroupId, hook: Hook) {
        self.groups.lock().entry(group).or_default().post.push(hook);
    }

    /// Snapshot of a group's hooks for one matcher execution.
    pub fn group_hooks(&self, group: Option<GroupId>) -> GroupHooks {
        match group {
            Some(group) => self.groups.lock().get(&group).cloned().unwrap_or_default(),
            None => GroupHooks::default(),
        }
    }

    /// Tears down a group: its hook table and every matcher it owns, in both
    /// the main list and the temporary store.
    pub fn remove_group(&self, group: GroupId) {
        self.groups.lock().remove(&group);
        self.main.write().retain(|m| m.group != Some(group));
        self.temps.lock().retain(|_, m| m.group != Some(group));
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("main", &self.main.read().len())
            .field("temps", &self.temps.lock().len())
            .field("groups", &self.groups.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rule::EventFilter;

    fn bare_matcher(priority: i32) -> Matcher {
        Matcher::new(vec![EventFilter::any().into_rule()], Vec::new()).with_priority(priority)
    }

    #[test]
    fn insertion_keeps_priority_order() {
        let registry = Registry::new();
        let a = registry.insert(bare_matcher(5));
        let b = registry.insert(bare_matcher(1));
        let c = registry.insert(bare_matcher(3));

        let order: Vec<MatcherId> = registry.snapshot().iter().map(|m| m.id).collect();
        assert_eq!(order, vec![b, c, a]);
    }

    #[test]
    fn equal_priority_is_registration_reversed() {
        let registry = Registry::new();
        let first = registry.insert(bare_matcher(1));
        let second = registry.insert(bare_matcher(1));
        let third = registry.insert(bare_matcher(1));

        let order: Vec<MatcherId> = registry.snapshot().iter().map(|m| m.id).collect();
        assert_eq!(order, vec![third, second, first]);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let registry = Registry::new();
        let id = registry.insert(bare_matcher(0));
        registry.remove(id);
        registry.remove(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn claim_temp_is_exclusive() {
        let registry = Registry::new();
        let id = registry.insert_temp(bare_matcher(0).with_temp(true));
        assert!(registry.claim_temp(id).is_some());
        assert!(registry.claim_temp(id).is_none());
    }

    #[test]
    fn update_reorders_at_new_priority() {
        let registry = Registry::new();
        let a = registry.insert(bare_matcher(1));
        let b = registry.insert(bare_matcher(2));

        registry.update(a, |m| m.priority = 3);
        let order: Vec<MatcherId> = registry.snapshot().iter().map(|m| m.id).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn remove_group_tears_down_owned_matchers() {
        let registry = Registry::new();
        let group = GroupId::next();
        registry.insert_group(group);
        registry.insert(bare_matcher(0).with_group(group));
        registry.insert_temp(bare_matcher(0).with_group(group).with_temp(true));
        let kept = registry.insert(bare_matcher(0));

        registry.remove_group(group);
        assert_eq!(registry.temp_len(), 0);
        let order: Vec<MatcherId> = registry.snapshot().iter().map(|m| m.id).collect();
        assert_eq!(order, vec![kept]);
    }
}
