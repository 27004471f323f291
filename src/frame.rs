//! WebSocket frame encoding and decoding
//!
//! Implements the RFC 6455 single-frame text subset the relay speaks:
//! inbound frames are masked text (or close) from browsers, outbound frames
//! are unmasked text fanned out to every client. Fragmentation, binary
//! payloads, and ping/pong are not part of the protocol here; FIN is
//! assumed set and not inspected.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::mask::apply_mask;
use crate::{MEDIUM_MESSAGE_THRESHOLD, SMALL_MESSAGE_THRESHOLD};

/// WebSocket opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Text frame
    Text = 0x1,
    /// Connection close
    Close = 0x8,
}

impl OpCode {
    /// Parse an opcode from the low 4 bits of the first header byte
    #[inline]
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x1 => Some(OpCode::Text),
            0x8 => Some(OpCode::Close),
            _ => None,
        }
    }
}

/// Outcome of a decode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete text message; `consumed` bytes of the buffer were used
    Text { message: String, consumed: usize },
    /// More bytes are needed; keep buffering and retry
    Incomplete,
    /// The peer requested close
    Close,
}

/// Decode one frame from the front of `buf`.
///
/// Returns [`Decoded::Incomplete`] until the buffer holds the whole frame
/// (header plus announced payload); the caller keeps its buffer and retries
/// after the next read. On [`Decoded::Text`] the caller must advance its
/// buffer by `consumed`.
///
/// Errors:
/// - [`Error::InvalidFrame`] for an opcode other than text or close
/// - [`Error::FrameTooLarge`] when the announced payload exceeds `max_payload`
/// - [`Error::InvalidUtf8`] when the unmasked payload is not UTF-8
pub fn decode(buf: &[u8], max_payload: usize) -> Result<Decoded> {
    if buf.len() < 2 {
        return Ok(Decoded::Incomplete);
    }

    let opcode = match OpCode::from_u8(buf[0] & 0x0F) {
        Some(op) => op,
        None => return Err(Error::InvalidFrame("unsupported opcode")),
    };
    if opcode == OpCode::Close {
        return Ok(Decoded::Close);
    }

    let masked = buf[1] & 0x80 != 0;
    let len_code = buf[1] & 0x7F;

    // Length tiers: 0-125 literal, 126 -> 16-bit, 127 -> 64-bit (big-endian)
    let (payload_len, mut offset) = match len_code {
        0..=125 => (len_code as u64, 2),
        126 => {
            if buf.len() < 4 {
                return Ok(Decoded::Incomplete);
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as u64, 4)
        }
        _ => {
            if buf.len() < 10 {
                return Ok(Decoded::Incomplete);
            }
            let len = u64::from_be_bytes([
                buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
            ]);
            (len, 10)
        }
    };

    if payload_len > max_payload as u64 {
        return Err(Error::FrameTooLarge);
    }
    let payload_len = payload_len as usize;

    let mask_key = if masked {
        if buf.len() < offset + 4 {
            return Ok(Decoded::Incomplete);
        }
        let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        offset += 4;
        Some(key)
    } else {
        None
    };

    if buf.len() < offset + payload_len {
        return Ok(Decoded::Incomplete);
    }

    let mut payload = buf[offset..offset + payload_len].to_vec();
    if let Some(key) = mask_key {
        apply_mask(&mut payload, key);
    }

    let message = String::from_utf8(payload).map_err(|_| Error::InvalidUtf8)?;

    Ok(Decoded::Text {
        message,
        consumed: offset + payload_len,
    })
}

/// Encode a text message as one unmasked, unfragmented frame.
///
/// Server-to-client frames are never masked, so the header is just
/// `0x81` plus the length field; the zero-length message encodes to the
/// two header bytes alone.
pub fn encode(message: &str) -> Bytes {
    let payload = message.as_bytes();
    let header_size = 2 + if payload.len() > MEDIUM_MESSAGE_THRESHOLD {
        8
    } else if payload.len() > SMALL_MESSAGE_THRESHOLD {
        2
    } else {
        0
    };

    let mut buf = BytesMut::with_capacity(header_size + payload.len());
    buf.put_u8(0x81); // FIN + Text

    if payload.len() <= SMALL_MESSAGE_THRESHOLD {
        buf.put_u8(payload.len() as u8);
    } else if payload.len() <= MEDIUM_MESSAGE_THRESHOLD {
        buf.put_u8(126);
        buf.put_u16(payload.len() as u16);
    } else {
        buf.put_u8(127);
        buf.put_u64(payload.len() as u64);
    }

    buf.put_slice(payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 16 * 1024 * 1024;

    fn decode_text(buf: &[u8]) -> (String, usize) {
        match decode(buf, MAX).unwrap() {
            Decoded::Text { message, consumed } => (message, consumed),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_small() {
        let frame = encode("clipboard contents");
        let (message, consumed) = decode_text(&frame);
        assert_eq!(message, "clipboard contents");
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn test_round_trip_multibyte_utf8() {
        let original = "日本語のテキスト 📋";
        let frame = encode(original);
        let (message, _) = decode_text(&frame);
        assert_eq!(message, original);
    }

    #[test]
    fn test_encode_zero_length() {
        let frame = encode("");
        assert_eq!(frame.as_ref(), &[0x81, 0x00]);
        let (message, consumed) = decode_text(&frame);
        assert_eq!(message, "");
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_length_tier_boundaries() {
        // 125 -> 2-byte header, 126 -> 16-bit field, 65535 -> 16-bit field,
        // 65536 -> 64-bit field
        for (len, header) in [(125usize, 2usize), (126, 4), (65535, 4), (65536, 10)] {
            let message = "a".repeat(len);
            let frame = encode(&message);
            assert_eq!(frame.len(), header + len, "payload length {}", len);

            let (decoded, consumed) = decode_text(&frame);
            assert_eq!(decoded.len(), len);
            assert_eq!(consumed, frame.len());
        }
    }

    #[test]
    fn test_tier_header_bytes() {
        let frame = encode(&"a".repeat(126));
        assert_eq!(&frame[..4], &[0x81, 126, 0x00, 0x7e]);

        let frame = encode(&"a".repeat(65536));
        assert_eq!(&frame[..2], &[0x81, 127]);
        assert_eq!(&frame[2..10], &[0, 0, 0, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_decode_masked_vector() {
        // "Hello" masked with 37 fa 21 3d (RFC 6455 example)
        let frame = [
            0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
        ];
        let (message, consumed) = decode_text(&frame);
        assert_eq!(message, "Hello");
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn test_incomplete_header_only() {
        // Announces a 5-byte masked payload but carries no mask key or payload
        assert_eq!(decode(&[0x81, 0x85], MAX).unwrap(), Decoded::Incomplete);
        // Unmasked variant, header only
        assert_eq!(decode(&[0x81, 0x05], MAX).unwrap(), Decoded::Incomplete);
        // Single byte is never enough
        assert_eq!(decode(&[0x81], MAX).unwrap(), Decoded::Incomplete);
    }

    #[test]
    fn test_incomplete_partial_payload() {
        let frame = encode("hello");
        assert_eq!(decode(&frame[..4], MAX).unwrap(), Decoded::Incomplete);
    }

    #[test]
    fn test_incomplete_extended_length_field() {
        // 16-bit length marker with only one of its two bytes present
        assert_eq!(decode(&[0x81, 126, 0x01], MAX).unwrap(), Decoded::Incomplete);
        // 64-bit marker with a truncated length field
        assert_eq!(
            decode(&[0x81, 127, 0, 0, 0, 0], MAX).unwrap(),
            Decoded::Incomplete
        );
    }

    #[test]
    fn test_close_opcode() {
        assert_eq!(decode(&[0x88, 0x00], MAX).unwrap(), Decoded::Close);
    }

    #[test]
    fn test_unsupported_opcodes_rejected() {
        for b0 in [0x82u8, 0x89, 0x8A, 0x80] {
            // binary, ping, pong, continuation
            assert!(matches!(
                decode(&[b0, 0x00], MAX),
                Err(Error::InvalidFrame(_))
            ));
        }
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let frame = [0x81, 0x02, 0xff, 0xfe];
        assert!(matches!(decode(&frame, MAX), Err(Error::InvalidUtf8)));
    }

    #[test]
    fn test_oversize_announcement_rejected() {
        // 64-bit length far beyond any practical message
        let mut frame = vec![0x81, 127];
        frame.extend_from_slice(&(1u64 << 40).to_be_bytes());
        assert!(matches!(decode(&frame, MAX), Err(Error::FrameTooLarge)));

        // Tiny limit rejects even a small frame
        let frame = encode("hello");
        assert!(matches!(decode(&frame, 4), Err(Error::FrameTooLarge)));
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let mut buf = encode("one").to_vec();
        buf.extend_from_slice(&encode("two"));

        let (message, consumed) = decode_text(&buf);
        assert_eq!(message, "one");

        let (message, _) = decode_text(&buf[consumed..]);
        assert_eq!(message, "two");
    }
}
