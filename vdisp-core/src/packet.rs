use bytes::Bytes;

use crate::error::VdispError;
use crate::header::{FrameHeader, HEADER_LENGTH};
use crate::message::MessageKind;

/// Largest payload accepted on the wire (screenshots dominate).
pub const MAX_PAYLOAD_SIZE: usize = 32 * 1024 * 1024;
pub const MAX_FRAME_SIZE: usize = HEADER_LENGTH + MAX_PAYLOAD_SIZE;

/// One header + payload unit on the wire.
#[derive(Clone)]
pub struct Packet {
    header: FrameHeader,
    payload: Bytes,
}

impl Packet {
    pub fn new(kind: MessageKind, request_id: u64, payload: Bytes) -> Result<Self, VdispError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(VdispError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let header = FrameHeader::new(kind, request_id, payload.len() as u32, checksum(&payload));
        Ok(Self { header, payload })
    }

    /// A one-way video frame; frames carry no request id.
    pub fn video_frame(frame: Bytes) -> Result<Self, VdispError> {
        Self::new(MessageKind::VideoFrame, 0, frame)
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn kind(&self) -> MessageKind {
        self.header.kind()
    }

    pub fn request_id(&self) -> u64 {
        self.header.request_id()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_LENGTH + self.payload.len()
    }

    /// Reassemble a packet from a decoded header and its payload bytes.
    pub fn from_parts(header: FrameHeader, payload: Bytes) -> Result<Self, VdispError> {
        if payload.len() != header.payload_length() {
            return Err(VdispError::InvalidPacketLength {
                expected: header.payload_length(),
                actual: payload.len(),
            });
        }
        let packet = Self { header, payload };
        if !packet.validate() {
            return Err(VdispError::ChecksumMismatch);
        }
        Ok(packet)
    }

    pub fn validate(&self) -> bool {
        self.header.checksum() == checksum(&self.payload)
    }
}

/// First four bytes of the payload's blake3 digest; zero for empty payloads.
fn checksum(payload: &[u8]) -> u32 {
    if payload.is_empty() {
        return 0;
    }
    let digest = blake3::hash(payload);
    let b = digest.as_bytes();
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("header", &self.header)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_has_zero_checksum() {
        let p = Packet::new(MessageKind::Reply, 4, Bytes::new()).unwrap();
        assert_eq!(p.header().checksum(), 0);
        assert!(p.validate());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let p = Packet::video_frame(Bytes::from_static(b"\x00\x00\x00\x01\x67")).unwrap();
        let header = p.header().clone();
        let err = Packet::from_parts(header, Bytes::from_static(b"\x00\x00\x00\x01\x68"));
        assert!(matches!(err, Err(VdispError::ChecksumMismatch)));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let p = Packet::new(MessageKind::Call, 1, Bytes::from_static(b"abc")).unwrap();
        let err = Packet::from_parts(p.header().clone(), Bytes::from_static(b"ab"));
        assert!(matches!(
            err,
            Err(VdispError::InvalidPacketLength {
                expected: 3,
                actual: 2
            })
        ));
    }
}
