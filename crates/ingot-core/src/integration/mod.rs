//! Integration layer: the narrow contracts toward external collaborators.

pub mod caller;

pub use caller::{ApiCaller, NullCaller};
