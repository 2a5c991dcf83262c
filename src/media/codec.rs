//! Frame wire format
//!
//! Image compression proper is a client-side concern; what crosses the wire
//! is a minimal raw-frame encoding, base64'd into the JSON `data` field:
//! `[u32 width LE][u32 height LE]` followed by `width * height * 3` RGB8
//! bytes. Decode validates the header against the payload length so a
//! malformed frame is a skipped message, never a panic.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::media::frame::RawFrame;

/// Length of the dimension header preceding the pixel data
pub const HEADER_LEN: usize = 8;

/// Encode a frame into its binary wire form
pub fn encode_frame(frame: &RawFrame) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN + frame.pixels().len());
    out.put_u32_le(frame.width());
    out.put_u32_le(frame.height());
    out.extend_from_slice(frame.pixels());
    out.freeze()
}

/// Decode a binary frame, validating dimensions against the buffer
pub fn decode_frame(data: &[u8]) -> Result<RawFrame> {
    if data.len() < HEADER_LEN {
        return Err(Error::BadFrame(format!(
            "frame shorter than its {} byte header",
            HEADER_LEN
        )));
    }
    let mut header = &data[..HEADER_LEN];
    let width = header.get_u32_le();
    let height = header.get_u32_le();
    RawFrame::new(width, height, Bytes::copy_from_slice(&data[HEADER_LEN..]))
}

/// Encode a frame into the base64 `data` field of a channel payload
pub fn encode_wire(frame: &RawFrame) -> String {
    STANDARD.encode(encode_frame(frame))
}

/// Decode the base64 `data` field of a channel payload into a frame
pub fn decode_wire(data: &str) -> Result<RawFrame> {
    let raw = STANDARD
        .decode(data)
        .map_err(|e| Error::BadFrame(format!("invalid base64: {}", e)))?;
    decode_frame(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::frame::BYTES_PER_PIXEL;

    #[test]
    fn test_wire_roundtrip() {
        let frame = RawFrame::solid(3, 2, [10, 20, 30]);
        let decoded = decode_wire(&encode_wire(&frame)).unwrap();

        assert_eq!(decoded.width(), 3);
        assert_eq!(decoded.height(), 2);
        assert_eq!(decoded.pixel(2, 1), Some([10, 20, 30]));
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        let frame = RawFrame::solid(2, 2, [0, 0, 0]);
        let mut bytes = encode_frame(&frame).to_vec();
        bytes.truncate(bytes.len() - 1);

        assert!(matches!(decode_frame(&bytes), Err(Error::BadFrame(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_header() {
        assert!(matches!(decode_frame(&[1, 2, 3]), Err(Error::BadFrame(_))));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(
            decode_wire("!!not base64!!"),
            Err(Error::BadFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_absurd_dimensions() {
        let mut bytes = BytesMut::new();
        bytes.put_u32_le(1_000_000);
        bytes.put_u32_le(1_000_000);
        assert!(matches!(decode_frame(&bytes), Err(Error::BadFrame(_))));
    }

    #[test]
    fn test_header_is_little_endian() {
        let frame = RawFrame::solid(1, 1, [7, 8, 9]);
        let bytes = encode_frame(&frame);
        assert_eq!(&bytes[..HEADER_LEN], &[1, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(bytes.len(), HEADER_LEN + BYTES_PER_PIXEL);
    }
}
