use async_trait::async_trait;
use serde::Serialize;

use super::{BytesTransport, Transport, TransportError, WireError};
use crate::messages::{ProtocolEvent, ProtocolMessage};

/// Frames carry a 4 byte big endian length, so this is the hard upper bound.
pub const MAX_FRAME_LEN: usize = u32::MAX as usize;

/// JSON on top of a [BytesTransport].
#[derive(Debug)]
pub struct JsonEncodingLayer<B: BytesTransport> {
    pub bus: B,
}

impl<B: BytesTransport> JsonEncodingLayer<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

/// Length-prefixed JSON body.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>, WireError> {
    let body = serde_json::to_vec(msg)?;
    let len = u32::try_from(body.len()).map_err(|_| WireError::FrameTooLarge(body.len()))?;

    let mut buf = Vec::with_capacity(4 + body.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Inverse of [encode_frame]. Bytes behind the announced length are ignored.
pub fn decode_frame(frame: &[u8]) -> Result<ProtocolMessage, WireError> {
    let header: [u8; 4] = frame
        .get(..4)
        .and_then(|h| h.try_into().ok())
        .ok_or(WireError::Truncated {
            expected: 4,
            got: frame.len(),
        })?;
    let len = u32::from_be_bytes(header) as usize;
    let body = frame.get(4..4 + len).ok_or(WireError::Truncated {
        expected: len,
        got: frame.len() - 4,
    })?;
    Ok(serde_json::from_slice(body)?)
}

#[async_trait]
impl<B: BytesTransport> Transport for JsonEncodingLayer<B> {
    async fn send(&self, msg: &ProtocolMessage) -> Result<(), TransportError> {
        let buf = encode_frame(msg)?;
        self.bus.send(&msg.to, &buf).await
    }

    async fn publish(&self, subject: &str, event: &ProtocolEvent) -> Result<(), TransportError> {
        let buf = encode_frame(event)?;
        self.bus.publish(subject, &buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        messages::{ProcessId, ProtocolName, ProtocolParams, Seq, SetupParams, StepPayload},
        sig::{ChannelSigner, Identifier, Signer},
        Address,
    };
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        sent: Mutex<Vec<(Identifier, Vec<u8>)>>,
        published: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BytesTransport for Recorder {
        async fn send(&self, to: &Identifier, frame: &[u8]) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push((*to, frame.to_vec()));
            Ok(())
        }

        async fn publish(&self, subject: &str, _frame: &[u8]) -> Result<(), TransportError> {
            self.published.lock().unwrap().push(subject.to_string());
            Ok(())
        }
    }

    fn message() -> ProtocolMessage {
        let mut rng = StdRng::seed_from_u64(5);
        let alice = Signer::new(&mut rng).identifier();
        let bob = Signer::new(&mut rng).identifier();
        ProtocolMessage {
            process_id: ProcessId::new(),
            protocol: ProtocolName::Setup,
            params: ProtocolParams::Setup(SetupParams {
                initiator_identifier: alice,
                responder_identifier: bob,
                multisig_address: Address([0x11; 20]),
            }),
            seq: Seq::Step(1),
            to: bob,
            from: Some(alice),
            custom_data: StepPayload::DataPersisted,
        }
    }

    #[test]
    fn frame_has_length_prefix() {
        let msg = message();
        let frame = encode_frame(&msg).unwrap();
        let body = serde_json::to_vec(&msg).unwrap();
        assert_eq!(frame[..4], (body.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..], &body[..]);
        assert_eq!(decode_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn truncated_frames_are_rejected() {
        let frame = encode_frame(&message()).unwrap();
        assert!(matches!(
            decode_frame(&frame[..3]),
            Err(WireError::Truncated { expected: 4, .. })
        ));
        assert!(matches!(
            decode_frame(&frame[..frame.len() - 1]),
            Err(WireError::Truncated { .. })
        ));

        let mut garbage = 2u32.to_be_bytes().to_vec();
        garbage.extend_from_slice(b"{]");
        assert!(matches!(decode_frame(&garbage), Err(WireError::Json(_))));
    }

    #[tokio::test]
    async fn send_routes_by_recipient() {
        let layer = JsonEncodingLayer::new(Recorder::default());
        let msg = message();
        layer.send(&msg).await.unwrap();

        let sent = layer.bus.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, msg.to);
        assert_eq!(decode_frame(&sent[0].1).unwrap(), msg);
    }
}
