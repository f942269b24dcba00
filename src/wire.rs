mod encoding;

use core::fmt::Debug;

use async_trait::async_trait;

pub use encoding::{decode_frame, encode_frame, JsonEncodingLayer, MAX_FRAME_LEN};

use crate::{
    messages::{ProtocolEvent, ProtocolMessage},
    sig::Identifier,
};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
    #[error("frame truncated: header announces {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("no route to {0}")]
    Unreachable(Identifier),
    #[error("transport closed: {0}")]
    Closed(String),
}

/// Raw frames, the network itself.
#[async_trait]
pub trait BytesTransport: Send + Sync + Debug {
    async fn send(&self, to: &Identifier, frame: &[u8]) -> Result<(), TransportError>;
    async fn publish(&self, subject: &str, frame: &[u8]) -> Result<(), TransportError>;
}

/// Message level view on the network used by the protocol runner.
///
/// Delivering incoming messages is up to the embedder, who hands them to
/// [crate::ProtocolRunner::handle_message].
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send(&self, msg: &ProtocolMessage) -> Result<(), TransportError>;
    async fn publish(&self, subject: &str, event: &ProtocolEvent) -> Result<(), TransportError>;
}
