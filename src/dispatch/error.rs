//! Dispatcher error types

use crate::platform::PlatformError;
use std::fmt;

/// Dispatcher result type
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Dispatcher errors
///
/// Errors raised by tasks themselves never show up here; they propagate out
/// of the drain to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Configuration rejected
    InvalidConfig(String),
    /// A dispatcher is already installed on this thread
    AlreadyInstalled,
    /// The host failed to provide a primitive
    Host(PlatformError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::InvalidConfig(msg) => write!(f, "invalid dispatcher config: {}", msg),
            DispatchError::AlreadyInstalled => {
                write!(f, "a dispatcher is already installed on this thread")
            }
            DispatchError::Host(e) => write!(f, "host error: {}", e),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Host(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PlatformError> for DispatchError {
    fn from(e: PlatformError) -> Self {
        DispatchError::Host(e)
    }
}
