//! Rule predicates and the event-type filter.
//!
//! A [`Rule`] is a pure predicate over an inbound event and the dispatch's
//! mutable [`State`]; `true` continues to the next rule, `false` abandons the
//! matcher for this event. Rules run in registration order and the first
//! `false` short-circuits the remainder — the handler chain never starts.
//! Side effects written into the state (stripped command text, parsed args)
//! are observable by later rules and by the handler chain.
//!
//! The event-type filter is not special-cased in the dispatch loop: it is
//! compiled into an ordinary rule and prepended as the first entry of every
//! matcher's chain, so the same short-circuit semantics apply.

use std::collections::HashSet;
use std::sync::Arc;

use crate::foundation::event::{Event, PostType, SessionKey};
use crate::foundation::state::State;

/// A predicate gating a matcher, with optional state side effects.
pub type Rule = Arc<dyn Fn(&Event, &mut State) -> bool + Send + Sync>;

/// Wraps a closure into a [`Rule`].
pub fn rule<F>(f: F) -> Rule
where
    F: Fn(&Event, &mut State) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

// =============================================================================
// Event-type filter
// =============================================================================

/// Event-type filter over the three protocol tags.
///
/// Each component is optional; `None` matches any value at that level.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Required post type, if any.
    pub post: Option<PostType>,
    /// Required detail type, if any.
    pub detail: Option<String>,
    /// Required sub type, if any.
    pub sub: Option<String>,
}

impl EventFilter {
    /// A filter matching every event.
    pub fn any() -> Self {
        Self::default()
    }

    /// A filter on the post type only.
    pub fn post(post: PostType) -> Self {
        Self {
            post: Some(post),
            ..Self::default()
        }
    }

    /// Narrows the filter to a detail type.
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Narrows the filter to a sub type.
    pub fn sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Whether the filter accepts `event`.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(post) = self.post
            && event.post_type != post
        {
            return false;
        }
        if let Some(detail) = &self.detail
            && event.detail_type != *detail
        {
            return false;
        }
        if let Some(sub) = &self.sub
            && event.sub_type != *sub
        {
            return false;
        }
        true
    }

    /// Compiles the filter into the first rule of a matcher's chain.
    pub fn into_rule(self) -> Rule {
        rule(move |event, _| self.matches(event))
    }
}

// =============================================================================
// Built-in rules
// =============================================================================

/// Matches when the message plain text equals `text` exactly.
pub fn full_match(text: impl Into<String>) -> Rule {
    let text = text.into();
    rule(move |event, _| event.plain_text() == text)
}

/// Matches when the message plain text contains `word`.
pub fn keyword(word: impl Into<String>) -> Rule {
    let word = word.into();
    rule(move |event, _| event.plain_text().contains(word.as_str()))
}

/// Matches events sent by one of the given users.
pub fn from_user(users: impl IntoIterator<Item = i64>) -> Rule {
    let users: HashSet<i64> = users.into_iter().collect();
    rule(move |event, _| users.contains(&event.user_id))
}

/// Matches events from the same conversation scope as `key`.
///
/// This is the predicate every suspended handler chain resumes on.
pub fn same_session(key: SessionKey) -> Rule {
    rule(move |event, _| event.session_key() == key)
}

/// Matches messages starting with `prefix`, deriving `prefix` and `args`.
///
/// On match the state receives:
/// - `"prefix"` — the matched token;
/// - `"args"` — the remainder of the first text segment, trimmed of leading
///   whitespace, concatenated with the plain text of every later text
///   segment.
pub fn prefix(token: impl Into<String>) -> Rule {
    let token = token.into();
    rule(move |event, state| {
        let segments = event.message.segments();
        let Some(first) = segments.first().and_then(|s| s.as_text()) else {
            return false;
        };
        let Some(rest) = first.strip_prefix(token.as_str()) else {
            return false;
        };
        let mut args = rest.trim_start().to_string();
        for seg in &segments[1..] {
            if let Some(text) = seg.as_text() {
                args.push_str(text);
            }
        }
        state.set("prefix", token.as_str());
        state.set("args", args);
        true
    })
}

/// Matches command-style messages, deriving `command` and `args`.
///
/// The first text segment must start with `start` (e.g. `"/"`) followed by
/// one of `names`. The args derivation is identical to [`prefix`].
pub fn command(start: impl Into<String>, names: impl IntoIterator<Item = String>) -> Rule {
    let start = start.into();
    let names: Vec<String> = names.into_iter().collect();
    rule(move |event, state| {
        let segments = event.message.segments();
        let Some(first) = segments.first().and_then(|s| s.as_text()) else {
            return false;
        };
        let Some(body) = first.strip_prefix(start.as_str()) else {
            return false;
        };
        let Some(name) = names.iter().find(|name| {
            body.strip_prefix(name.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        }) else {
            return false;
        };
        let mut args = body[name.len()..].trim_start().to_string();
        for seg in &segments[1..] {
            if let Some(text) = seg.as_text() {
                args.push_str(text);
            }
        }
        state.set("command", name.as_str());
        state.set("args", args);
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::message::{Message, Segment};

    fn message_event(segments: Vec<Segment>) -> Event {
        Event {
            time: 0,
            self_id: 1,
            post_type: PostType::Message,
            detail_type: "group".into(),
            sub_type: "normal".into(),
            message_id: 1,
            user_id: 100,
            group_id: 200,
            raw_message: String::new(),
            message: Message(segments),
        }
    }

    #[test]
    fn filter_components_are_optional() {
        let event = message_event(vec![]);
        assert!(EventFilter::any().matches(&event));
        assert!(EventFilter::post(PostType::Message).matches(&event));
        assert!(
            EventFilter::post(PostType::Message)
                .detail("group")
                .matches(&event)
        );
        assert!(!EventFilter::post(PostType::Notice).matches(&event));
        assert!(
            !EventFilter::post(PostType::Message)
                .detail("private")
                .matches(&event)
        );
        assert!(
            !EventFilter::post(PostType::Message)
                .sub("anonymous")
                .matches(&event)
        );
    }

    #[test]
    fn prefix_strips_token_and_derives_args() {
        let event = message_event(vec![Segment::text("/echo   hello world")]);
        let mut state = State::new();
        assert!(prefix("/echo")(&event, &mut state));
        assert_eq!(state.get_str("prefix"), Some("/echo"));
        assert_eq!(state.get_str("args"), Some("hello world"));
    }

    #[test]
    fn prefix_concatenates_trailing_text_segments() {
        let event = message_event(vec![
            Segment::text("/echo  a"),
            Segment::at(42),
            Segment::text(" b"),
        ]);
        let mut state = State::new();
        assert!(prefix("/echo")(&event, &mut state));
        assert_eq!(state.get_str("args"), Some("a b"));
    }

    #[test]
    fn prefix_rejects_non_matching_head() {
        let event = message_event(vec![Segment::text("echo hi")]);
        let mut state = State::new();
        assert!(!prefix("/echo")(&event, &mut state));
        assert!(!state.contains("args"));
    }

    #[test]
    fn command_requires_start_and_name_boundary() {
        let mut state = State::new();
        let cmd = command("/", vec!["ban".to_string(), "kick".to_string()]);

        let event = message_event(vec![Segment::text("/ban  alice")]);
        assert!(cmd(&event, &mut state));
        assert_eq!(state.get_str("command"), Some("ban"));
        assert_eq!(state.get_str("args"), Some("alice"));

        // "bankrupt" must not match "ban".
        let event = message_event(vec![Segment::text("/bankrupt")]);
        assert!(!cmd(&event, &mut State::new()));
    }

    #[test]
    fn full_match_and_keyword() {
        let event = message_event(vec![Segment::text("复读")]);
        let mut state = State::new();
        assert!(full_match("复读")(&event, &mut state));
        assert!(!full_match("复")(&event, &mut state));
        assert!(keyword("读")(&event, &mut state));
    }

    #[test]
    fn same_session_matches_user_and_scope() {
        let event = message_event(vec![]);
        let mut state = State::new();
        assert!(same_session(event.session_key())(&event, &mut state));
        let other = SessionKey {
            user_id: 999,
            group_id: 200,
        };
        assert!(!same_session(other)(&event, &mut state));
    }
}
