//! The API-calling capability handed in by the transport collaborator.
//!
//! An [`ApiCaller`] is how handlers answer the gateway. The transport is
//! responsible for correlating asynchronous responses to requests (via its
//! echo/sequence token) and for its own reconnect policy; the engine only
//! calls through the capability and reports the result. Each inbound payload
//! arrives together with the caller able to answer it.

use async_trait::async_trait;
use serde_json::Value;

use crate::foundation::error::{ApiError, ApiResult};

/// Transport capability for issuing protocol API calls.
#[async_trait]
pub trait ApiCaller: Send + Sync {
    /// Makes an API call and returns the response data.
    ///
    /// # Arguments
    /// * `action` – protocol action name (e.g. `"send_msg"`).
    /// * `params` – JSON parameters for the action.
    ///
    /// # Errors
    /// [`ApiError::NotConnected`] when the transport is closed,
    /// [`ApiError::Timeout`] when the transport's bounded wait elapses, and
    /// [`ApiError::EchoConflict`] when the transport reports a correlation
    /// token collision. The engine never retries on its own.
    async fn call(&self, action: &str, params: Value) -> ApiResult<Value>;
}

/// [`ApiCaller`] for receive-only transports.
///
/// Any attempt to call an API returns [`ApiError::NotConnected`].
pub struct NullCaller;

#[async_trait]
impl ApiCaller for NullCaller {
    async fn call(&self, _action: &str, _params: Value) -> ApiResult<Value> {
        Err(ApiError::NotConnected)
    }
}
