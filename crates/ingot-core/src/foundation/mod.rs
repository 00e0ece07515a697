//! Foundation layer: event model, message body, dispatch state and errors.

pub mod error;
pub mod event;
pub mod message;
pub mod state;

pub use error::{ApiError, ApiResult, DecodeError, DecodeResult, StateError};
pub use event::{Event, PostType, SessionKey};
pub use message::{Message, Segment};
pub use state::State;
