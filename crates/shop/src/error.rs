//! Error types for shop operations

use ipc::{ProtocolError, TransportError};
use thiserror::Error;

use crate::grammar::Shape;

#[derive(Error, Debug)]
pub enum ShopError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Reply decoded as {found:?}, expected {expected:?}")]
    UnexpectedReply { expected: Shape, found: Shape },
}

impl ShopError {
    /// The engine's own message, when the engine reported the failure
    pub fn engine_message(&self) -> Option<&str> {
        match self {
            Self::Protocol(ProtocolError::EngineError { message }) => Some(message),
            _ => None,
        }
    }

    pub fn is_engine_error(&self) -> bool {
        self.engine_message().is_some()
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
