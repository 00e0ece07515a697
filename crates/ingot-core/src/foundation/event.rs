//! Inbound event model.
//!
//! An [`Event`] is the immutable-after-construction value produced once per
//! inbound payload by the decoding step and read-only to the engine. It keeps
//! the three protocol type tags (post / detail / sub), the numeric
//! identifiers, the raw text of the message and the parsed segment body.
//!
//! # Decoding
//!
//! OneBot-style gateways spread the detail tag across per-category fields
//! (`message_type`, `notice_type`, `request_type`, `meta_event_type`).
//! [`Event::from_json`] collapses them into a single `detail_type` so that
//! rule chains and event filters only ever deal with one field per level.

use serde::Deserialize;
use serde_json::Value;

use super::error::DecodeError;
use super::message::Message;

/// High-level event category from the `post_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostType {
    /// Message events (private and group chat).
    Message,
    /// Notice events (recalls, member changes, pokes, ...).
    Notice,
    /// Request events (friend and group join requests).
    Request,
    /// Meta events (lifecycle, heartbeat).
    Meta,
}

impl PostType {
    /// Parses the protocol string form of a post type.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "message" => PostType::Message,
            "notice" => PostType::Notice,
            "request" => PostType::Request,
            "meta_event" | "meta" => PostType::Meta,
            _ => return None,
        })
    }

    /// Returns the protocol string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Message => "message",
            PostType::Notice => "notice",
            PostType::Request => "request",
            PostType::Meta => "meta_event",
        }
    }
}

/// Identity of the conversation a message event belongs to.
///
/// Two events share a session when they come from the same user in the same
/// scope (the same group, or both in private chat). This is the predicate a
/// suspended handler chain resumes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    /// The sending user.
    pub user_id: i64,
    /// The group scope, `0` for private chat.
    pub group_id: i64,
}

/// One inbound occurrence from the gateway.
#[derive(Debug, Clone)]
pub struct Event {
    /// Unix timestamp of the event.
    pub time: i64,
    /// The bot account this event was delivered to.
    pub self_id: i64,
    /// High-level category tag.
    pub post_type: PostType,
    /// Category-specific detail tag (e.g. `"private"`, `"group_recall"`).
    pub detail_type: String,
    /// Optional sub-type tag (e.g. `"friend"`, `"poke"`).
    pub sub_type: String,
    /// Message ID, `0` when absent.
    pub message_id: i64,
    /// Sending user, `0` when absent.
    pub user_id: i64,
    /// Group scope, `0` for private or non-group events.
    pub group_id: i64,
    /// Raw string form of the message, empty for non-message events.
    pub raw_message: String,
    /// Parsed message body.
    pub message: Message,
}

/// Raw wire shape used only during decoding.
#[derive(Deserialize)]
struct WireEvent {
    #[serde(default)]
    time: i64,
    #[serde(default)]
    self_id: i64,
    post_type: String,
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    notice_type: Option<String>,
    #[serde(default)]
    request_type: Option<String>,
    #[serde(default)]
    meta_event_type: Option<String>,
    #[serde(default)]
    sub_type: Option<String>,
    #[serde(default)]
    message_id: i64,
    #[serde(default)]
    user_id: i64,
    #[serde(default)]
    group_id: i64,
    #[serde(default)]
    raw_message: String,
    #[serde(default)]
    message: Option<Value>,
}

impl Event {
    /// Decodes a raw JSON payload into an event.
    ///
    /// Payloads without a recognized `post_type` (e.g. API responses that
    /// leaked past the transport's echo routing) are a [`DecodeError`]; the
    /// caller logs and drops them before dispatch.
    pub fn from_json(raw: &str) -> Result<Self, DecodeError> {
        let wire: WireEvent = serde_json::from_str(raw)?;
        let post_type = PostType::parse(&wire.post_type)
            .ok_or_else(|| DecodeError::UnknownPostType(wire.post_type.clone()))?;

        let detail_type = match post_type {
            PostType::Message => wire.message_type,
            PostType::Notice => wire.notice_type,
            PostType::Request => wire.request_type,
            PostType::Meta => wire.meta_event_type,
        }
        .unwrap_or_default();

        // A message body may arrive either as a segment array or as a bare
        // string; the string form becomes a single text segment.
        let message = match wire.message {
            Some(Value::String(text)) => Message::from_text(text),
            Some(value) => serde_json::from_value(value)?,
            None => Message::new(),
        };

        Ok(Self {
            time: wire.time,
            self_id: wire.self_id,
            post_type,
            detail_type,
            sub_type: wire.sub_type.unwrap_or_default(),
            message_id: wire.message_id,
            user_id: wire.user_id,
            group_id: wire.group_id,
            raw_message: wire.raw_message,
            message,
        })
    }

    /// Concatenated plain text of the message body.
    pub fn plain_text(&self) -> String {
        self.message.extract_plain_text()
    }

    /// The conversation scope this event belongs to.
    pub fn session_key(&self) -> SessionKey {
        SessionKey {
            user_id: self.user_id,
            group_id: self.group_id,
        }
    }

    /// Whether this is a message event.
    pub fn is_message(&self) -> bool {
        self.post_type == PostType::Message
    }
}
