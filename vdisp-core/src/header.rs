//! Fixed-size wire header preceding every vdisp frame.
//!
//! ```text
//! offset  size  field
//!      0     4  magic          "VDS0"
//!      4     4  checksum       first 4 bytes of blake3(payload), LE
//!      8     4  kind           MessageKind discriminant, LE
//!     12     8  request_id     LE
//!     20     4  payload_length LE
//! ```

use crate::error::VdispError;
use crate::message::MessageKind;

pub const MAGIC: [u8; 4] = *b"VDS0";
pub const HEADER_LENGTH: usize = 24;

pub type FrameHeaderBytes = [u8; HEADER_LENGTH];

#[derive(Clone, PartialEq, Eq)]
pub struct FrameHeader {
    checksum: u32,
    kind: MessageKind,
    request_id: u64,
    payload_length: u32,
}

impl FrameHeader {
    pub fn new(kind: MessageKind, request_id: u64, payload_length: u32, checksum: u32) -> Self {
        Self {
            checksum,
            kind,
            request_id,
            payload_length,
        }
    }

    pub fn to_bytes(&self) -> FrameHeaderBytes {
        let mut out: FrameHeaderBytes = [0; HEADER_LENGTH];
        out[0..4].copy_from_slice(&MAGIC);
        out[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        out[8..12].copy_from_slice(&(self.kind as u32).to_le_bytes());
        out[12..20].copy_from_slice(&self.request_id.to_le_bytes());
        out[20..24].copy_from_slice(&self.payload_length.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &FrameHeaderBytes) -> Result<Self, VdispError> {
        if bytes[0..4] != MAGIC {
            return Err(VdispError::InvalidMagic);
        }
        let kind = MessageKind::try_from(read_u32(bytes, 8))?;
        Ok(Self {
            checksum: read_u32(bytes, 4),
            kind,
            request_id: u64::from_le_bytes([
                bytes[12], bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18],
                bytes[19],
            ]),
            payload_length: read_u32(bytes, 20),
        })
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn payload_length(&self) -> usize {
        self.payload_length as usize
    }
}

fn read_u32(bytes: &FrameHeaderBytes, at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("kind", &self.kind)
            .field("request_id", &self.request_id)
            .field("payload_length", &self.payload_length)
            .field("checksum", &format_args!("{:#010x}", self.checksum))
            .finish()
    }
}
