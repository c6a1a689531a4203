use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::VdispError;
use crate::header::{FrameHeader, FrameHeaderBytes, HEADER_LENGTH};
use crate::packet::{MAX_PAYLOAD_SIZE, Packet};

/// Framed codec for vdisp packets over a byte stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct WireCodec;

impl Decoder for WireCodec {
    type Item = Packet;
    type Error = VdispError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LENGTH {
            return Ok(None);
        }

        let mut raw: FrameHeaderBytes = [0; HEADER_LENGTH];
        raw.copy_from_slice(&src[..HEADER_LENGTH]);
        let header = FrameHeader::from_bytes(&raw)?;

        let payload_len = header.payload_length();
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(VdispError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if src.len() < HEADER_LENGTH + payload_len {
            src.reserve(HEADER_LENGTH + payload_len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(HEADER_LENGTH + payload_len);
        let payload = frame.split_off(HEADER_LENGTH).freeze();
        Packet::from_parts(header, payload).map(Some)
    }
}

impl Encoder<Packet> for WireCodec {
    type Error = VdispError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.encoded_len());
        dst.put_slice(&item.header().to_bytes());
        dst.put_slice(item.payload());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use bytes::Bytes;

    #[test]
    fn partial_input_waits_for_more() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::new();
        let packet = Packet::new(MessageKind::Call, 9, Bytes::from_static(b"hello")).unwrap();
        codec.encode(packet, &mut buf).unwrap();

        let mut partial = buf.split_to(HEADER_LENGTH + 2);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.unsplit(buf);
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded.request_id(), 9);
        assert_eq!(decoded.payload().as_ref(), b"hello");
        assert!(partial.is_empty());
    }

    #[test]
    fn back_to_back_frames_keep_order() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::new();
        for i in 0..3u8 {
            let frame = Packet::video_frame(Bytes::from(vec![i; 4])).unwrap();
            codec.encode(frame, &mut buf).unwrap();
        }
        for i in 0..3u8 {
            let p = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(p.kind(), MessageKind::VideoFrame);
            assert_eq!(p.payload().as_ref(), &[i; 4]);
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_length_is_rejected_before_buffering() {
        let mut codec = WireCodec;
        let header = FrameHeader::new(MessageKind::Reply, 1, u32::MAX, 1);
        let mut buf = BytesMut::from(&header.to_bytes()[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(VdispError::PayloadTooLarge { .. })
        ));
    }
}
