//! Message body types for inbound events.
//!
//! An inbound message is an ordered sequence of typed [`Segment`]s, owned by
//! the [`Event`](super::event::Event) that carries it. The engine only needs
//! a compact subset of the OneBot v11 segment zoo: plain text, mentions,
//! faces, images and replies. Everything else is preserved as [`Segment::Other`]
//! so that round-tripping an unknown payload does not lose data.
//!
//! The CQ-code string codec is deliberately not part of this crate; rules and
//! handlers only ever consume the segment array form plus
//! [`Message::extract_plain_text`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single unit of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text content.
    Text(TextData),
    /// @mention of a user (or `"all"`).
    At(AtData),
    /// Emoji/face by platform ID.
    Face(FaceData),
    /// Image by file name or URL.
    Image(ImageData),
    /// Reply reference to another message.
    Reply(ReplyData),
    /// Any segment type this crate does not model explicitly.
    #[serde(untagged)]
    Other(Value),
}

/// Plain text segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    /// The text content.
    pub text: String,
}

/// @mention segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtData {
    /// Target user ID, or `"all"` for @everyone.
    pub qq: String,
}

/// Face segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceData {
    /// The face ID.
    pub id: String,
}

/// Image segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    /// Image file name, path, URL, or base64.
    pub file: String,
    /// Image URL (receive only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Reply segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyData {
    /// Message ID being replied to.
    pub id: String,
}

impl Segment {
    /// Creates a plain text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(TextData { text: text.into() })
    }

    /// Creates an @mention segment.
    pub fn at(user_id: i64) -> Self {
        Segment::At(AtData {
            qq: user_id.to_string(),
        })
    }

    /// Creates a reply segment.
    pub fn reply(id: impl Into<String>) -> Self {
        Segment::Reply(ReplyData { id: id.into() })
    }

    /// Returns the text content if this is a text segment.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(data) => Some(&data.text),
            _ => None,
        }
    }
}

/// An ordered sequence of message segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(pub Vec<Segment>);

impl Message {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message with a single text segment.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(vec![Segment::text(text)])
    }

    /// Concatenates the text content of all text segments.
    pub fn extract_plain_text(&self) -> String {
        let mut out = String::new();
        for seg in &self.0 {
            if let Some(text) = seg.as_text() {
                out.push_str(text);
            }
        }
        out
    }

    /// Returns the segments.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Returns true if the message holds no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Segment>> for Message {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_serialize() {
        let text = Segment::text("Hello");
        let json = serde_json::to_string(&text).unwrap();
        assert_eq!(json, r#"{"type":"text","data":{"text":"Hello"}}"#);

        let at = Segment::at(10001000);
        let json = serde_json::to_string(&at).unwrap();
        assert_eq!(json, r#"{"type":"at","data":{"qq":"10001000"}}"#);
    }

    #[test]
    fn segment_deserialize() {
        let json = r#"{"type":"text","data":{"text":"Hello World"}}"#;
        let segment: Segment = serde_json::from_str(json).unwrap();
        assert!(matches!(segment, Segment::Text(TextData { text }) if text == "Hello World"));

        let json = r#"{"type":"image","data":{"file":"1.jpg","url":"http://example.com/1.jpg"}}"#;
        let segment: Segment = serde_json::from_str(json).unwrap();
        assert!(
            matches!(segment, Segment::Image(ImageData { file, url: Some(_) }) if file == "1.jpg")
        );
    }

    #[test]
    fn unknown_segment_falls_back_to_other() {
        let json = r#"{"type":"record","data":{"file":"a.mp3"}}"#;
        let segment: Segment = serde_json::from_str(json).unwrap();
        assert!(matches!(segment, Segment::Other(_)));
    }

    #[test]
    fn plain_text_extraction_skips_non_text() {
        let msg = Message(vec![
            Segment::text("hello "),
            Segment::at(123),
            Segment::text("world"),
        ]);
        assert_eq!(msg.extract_plain_text(), "hello world");
    }
}
