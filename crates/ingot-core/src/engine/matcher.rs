//! The schedulable unit of the dispatch engine.
//!
//! A [`Matcher`] is a registry entry: an ordered rule chain (the event-type
//! filter compiled in as the first rule), an ordered handler chain, a
//! priority, the block and temporary flags and an optional owning group.
//!
//! The registered matcher is a shared, read-only *template*. Every dispatch
//! executes against a private copy of the mutable parts — the state is cloned
//! into the [`Session`](super::session::Session) and the handler chain is
//! walked by index — so concurrent dispatches of the same matcher never share
//! execution state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::rule::Rule;
use crate::engine::session::{Handler, Resume};
use crate::foundation::state::State;

/// Identity of a registered matcher, used for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatcherId(pub u64);

/// Identity of an owning group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub u64);

static NEXT_MATCHER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

impl MatcherId {
    /// Allocates a fresh matcher identity.
    pub fn next() -> Self {
        Self(NEXT_MATCHER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl GroupId {
    /// Allocates a fresh group identity.
    pub fn next() -> Self {
        Self(NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A registered (rules, handlers, priority, flags) unit evaluated per event.
#[derive(Clone)]
pub struct Matcher {
    /// Registry identity.
    pub id: MatcherId,
    /// Ordered rule chain; the event-type filter is `rules[0]`.
    pub rules: Vec<Rule>,
    /// Ordered handler chain.
    pub handlers: Vec<Handler>,
    /// Lower value runs earlier; ties resolved newest-first.
    pub priority: i32,
    /// When set, a match stops lower-priority matchers for the event.
    pub block: bool,
    /// When set, the matcher is deleted after its first successful run.
    pub temp: bool,
    /// Owning group, if any.
    pub group: Option<GroupId>,
    /// Template state cloned into every dispatch of this matcher.
    pub init_state: State,
    /// For continuation matchers: what to do with the resuming event.
    pub capture: Option<Resume>,
}

impl Matcher {
    /// Creates a matcher template.
    pub fn new(rules: Vec<Rule>, handlers: Vec<Handler>) -> Self {
        Self {
            id: MatcherId::next(),
            rules,
            handlers,
            priority: 0,
            block: false,
            temp: false,
            group: None,
            init_state: State::new(),
            capture: None,
        }
    }

    /// Builds the temporary matcher that resumes a suspended chain.
    ///
    /// `remaining` starts at the handler that suspended; `state` is the
    /// suspending session's state, which the continuation now owns. Priority,
    /// block flag and owning group are inherited from the origin.
    pub fn continuation(
        origin: &Matcher,
        session_rule: Rule,
        remaining: Vec<Handler>,
        state: State,
        resume: Resume,
    ) -> Self {
        Self {
            id: MatcherId::next(),
            rules: vec![session_rule],
            handlers: remaining,
            priority: origin.priority,
            block: origin.block,
            temp: true,
            group: origin.group,
            init_state: state,
            capture: Some(resume),
        }
    }

    /// Sets the priority (builder style).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the block flag (builder style).
    pub fn with_block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    /// Sets the temporary flag (builder style).
    pub fn with_temp(mut self, temp: bool) -> Self {
        self.temp = temp;
        self
    }

    /// Sets the owning group (builder style).
    pub fn with_group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    /// Sets the template state (builder style).
    pub fn with_state(mut self, state: State) -> Self {
        self.init_state = state;
        self
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("block", &self.block)
            .field("temp", &self.temp)
            .field("rules", &self.rules.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

pub(crate) type SharedMatcher = Arc<Matcher>;
