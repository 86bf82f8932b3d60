//! Message codec for the management protocol
//!
//! Requests and responses use the IPMB message layout:
//! ```text
//! request  = [ rsAddr ][ netFn<<2 ][ chk1 ][ rqAddr ][ rqSeq<<2 ][ cmd ][ data... ][ chk2 ]
//! response = [ rqAddr ][ netFn<<2 ][ chk1 ][ rsAddr ][ rqSeq<<2 ][ cmd ][ cc ][ data... ][ chk2 ]
//! ```
//!
//! `chk1` covers the two bytes before it, `chk2` covers everything between
//! it and `chk1`; both are two's-complement checksums. The completion code
//! (`cc`) is the first byte of a response body.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::CompletionCode;

/// Responder (controller) slave address
pub const BMC_ADDR: u8 = 0x20;

/// Requester (remote console) address
pub const REMOTE_ADDR: u8 = 0x81;

/// Sequence numbers occupy 6 bits and wrap at this modulus
pub const SEQ_MODULUS: u8 = 64;

/// Maximum message size to reject runaway length prefixes
pub const MAX_MESSAGE_SIZE: u32 = 1024;

/// Minimum length of a well-formed request (headers + checksums, no data)
const MIN_REQUEST_LEN: usize = 7;

/// Minimum length of a well-formed response (adds the completion code)
const MIN_RESPONSE_LEN: usize = 8;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("message too short: need {needed} bytes, have {available}")]
    TooShort { needed: usize, available: usize },

    #[error("header checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    HeaderChecksum { expected: u8, actual: u8 },

    #[error("payload checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    PayloadChecksum { expected: u8, actual: u8 },

    #[error("{field} out of range: {value:#04x}")]
    FieldOutOfRange { field: &'static str, value: u8 },

    #[error("sequence mismatch: sent {expected}, response carries {actual}")]
    SequenceMismatch { expected: u8, actual: u8 },

    #[error("command mismatch: sent {expected:#04x}, response answers {actual:#04x}")]
    CommandMismatch { expected: u8, actual: u8 },

    #[error("reply body too short: need {needed} bytes, have {available}")]
    ReplyTooShort { needed: usize, available: usize },

    #[error("unrecognized {field} value in reply: {value:#04x}")]
    InvalidFieldValue { field: &'static str, value: u8 },
}

/// A framed request before encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub netfn: u8,
    pub cmd: u8,
    pub seq: u8,
    pub data: Bytes,
}

/// A decoded response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub netfn: u8,
    pub cmd: u8,
    pub seq: u8,
    pub completion: CompletionCode,
    pub data: Bytes,
}

/// Two's-complement checksum: sum of covered bytes plus checksum is 0 mod 256
fn checksum(bytes: &[u8]) -> u8 {
    0u8.wrapping_sub(bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)))
}

fn check_fields(netfn: u8, seq: u8, data_len: usize) -> Result<(), CodecError> {
    // netfn and seq are both 6-bit fields, shifted past the 2-bit LUN
    if netfn >= 0x40 {
        return Err(CodecError::FieldOutOfRange {
            field: "netfn",
            value: netfn,
        });
    }
    if seq >= SEQ_MODULUS {
        return Err(CodecError::FieldOutOfRange {
            field: "sequence",
            value: seq,
        });
    }
    if data_len + MIN_RESPONSE_LEN > MAX_MESSAGE_SIZE as usize {
        return Err(CodecError::MessageTooLarge(data_len));
    }
    Ok(())
}

/// Encode a request into its wire layout
pub fn encode_request(request: &Request) -> Result<Bytes, CodecError> {
    check_fields(request.netfn, request.seq, request.data.len())?;

    let mut buf = BytesMut::with_capacity(MIN_REQUEST_LEN + request.data.len());
    buf.put_u8(BMC_ADDR);
    buf.put_u8(request.netfn << 2);
    let chk1 = checksum(&buf[..2]);
    buf.put_u8(chk1);
    buf.put_u8(REMOTE_ADDR);
    buf.put_u8(request.seq << 2);
    buf.put_u8(request.cmd);
    buf.extend_from_slice(&request.data);
    let chk2 = checksum(&buf[3..]);
    buf.put_u8(chk2);

    Ok(buf.freeze())
}

/// Encode a response into its wire layout (controller side; used by
/// simulators and tests)
pub fn encode_response(response: &Response) -> Result<Bytes, CodecError> {
    check_fields(response.netfn, response.seq, response.data.len())?;

    let mut buf = BytesMut::with_capacity(MIN_RESPONSE_LEN + response.data.len());
    buf.put_u8(REMOTE_ADDR);
    buf.put_u8(response.netfn << 2);
    let chk1 = checksum(&buf[..2]);
    buf.put_u8(chk1);
    buf.put_u8(BMC_ADDR);
    buf.put_u8(response.seq << 2);
    buf.put_u8(response.cmd);
    buf.put_u8(response.completion.0);
    buf.extend_from_slice(&response.data);
    let chk2 = checksum(&buf[3..]);
    buf.put_u8(chk2);

    Ok(buf.freeze())
}

/// Validate frame shape and both checksums, returning the body range
fn validate_frame(buf: &[u8], min_len: usize) -> Result<(), CodecError> {
    if buf.len() < min_len {
        return Err(CodecError::TooShort {
            needed: min_len,
            available: buf.len(),
        });
    }
    if buf.len() > MAX_MESSAGE_SIZE as usize {
        return Err(CodecError::MessageTooLarge(buf.len()));
    }

    let chk1 = checksum(&buf[..2]);
    if chk1 != buf[2] {
        return Err(CodecError::HeaderChecksum {
            expected: chk1,
            actual: buf[2],
        });
    }

    let chk2 = checksum(&buf[3..buf.len() - 1]);
    if chk2 != buf[buf.len() - 1] {
        return Err(CodecError::PayloadChecksum {
            expected: chk2,
            actual: buf[buf.len() - 1],
        });
    }

    Ok(())
}

/// Decode a raw request frame (controller side; used by simulators and tests)
pub fn decode_request(buf: &[u8]) -> Result<Request, CodecError> {
    validate_frame(buf, MIN_REQUEST_LEN)?;

    Ok(Request {
        netfn: buf[1] >> 2,
        seq: buf[4] >> 2,
        cmd: buf[5],
        data: Bytes::copy_from_slice(&buf[6..buf.len() - 1]),
    })
}

/// Decode a raw response frame.
///
/// Frame shape and checksums are validated first; the completion code is
/// extracted but not interpreted here. Classifying a non-success code is
/// the command client's job.
pub fn decode_response(buf: &[u8]) -> Result<Response, CodecError> {
    validate_frame(buf, MIN_RESPONSE_LEN)?;

    Ok(Response {
        netfn: buf[1] >> 2,
        seq: buf[4] >> 2,
        cmd: buf[5],
        completion: CompletionCode(buf[6]),
        data: Bytes::copy_from_slice(&buf[7..buf.len() - 1]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> Request {
        Request {
            netfn: 0x00,
            cmd: 0x04,
            seq: 11,
            data: Bytes::from_static(&[0x00, 0x01]),
        }
    }

    fn sample_response() -> Response {
        Response {
            netfn: 0x01,
            cmd: 0x01,
            seq: 11,
            completion: CompletionCode::SUCCESS,
            data: Bytes::from_static(&[0x21, 0x10, 0x40]),
        }
    }

    #[test]
    fn test_request_roundtrip() {
        let original = sample_request();
        let encoded = encode_request(&original).expect("encode failed");
        let decoded = decode_request(&encoded).expect("decode failed");
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_response_roundtrip() {
        let original = sample_response();
        let encoded = encode_response(&original).expect("encode failed");
        let decoded = decode_response(&encoded).expect("decode failed");
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_request_wire_layout() {
        let encoded = encode_request(&sample_request()).expect("encode failed");

        assert_eq!(encoded[0], BMC_ADDR);
        assert_eq!(encoded[1], 0x00 << 2);
        assert_eq!(encoded[3], REMOTE_ADDR);
        assert_eq!(encoded[4], 11 << 2);
        assert_eq!(encoded[5], 0x04);
        assert_eq!(&encoded[6..8], &[0x00, 0x01]);

        // Both checksum regions must sum to zero
        let sum1: u8 = encoded[..3].iter().fold(0u8, |a, b| a.wrapping_add(*b));
        let sum2: u8 = encoded[3..].iter().fold(0u8, |a, b| a.wrapping_add(*b));
        assert_eq!(sum1, 0);
        assert_eq!(sum2, 0);
    }

    #[test]
    fn test_completion_code_extraction() {
        let response = Response {
            completion: CompletionCode(0xC1),
            data: Bytes::new(),
            ..sample_response()
        };
        let encoded = encode_response(&response).expect("encode failed");
        let decoded = decode_response(&encoded).expect("decode failed");
        assert_eq!(decoded.completion, CompletionCode(0xC1));
        assert!(!decoded.completion.is_success());
    }

    #[test]
    fn test_decode_too_short() {
        let result = decode_response(&[0x81, 0x04, 0x7B]);
        assert!(matches!(result, Err(CodecError::TooShort { .. })));
    }

    #[test]
    fn test_decode_corrupt_header_checksum() {
        let mut encoded = encode_response(&sample_response())
            .expect("encode failed")
            .to_vec();
        encoded[2] ^= 0xFF;
        let result = decode_response(&encoded);
        assert!(matches!(result, Err(CodecError::HeaderChecksum { .. })));
    }

    #[test]
    fn test_decode_corrupt_payload_checksum() {
        let mut encoded = encode_response(&sample_response())
            .expect("encode failed")
            .to_vec();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        let result = decode_response(&encoded);
        assert!(matches!(result, Err(CodecError::PayloadChecksum { .. })));
    }

    #[test]
    fn test_sequence_out_of_range() {
        let request = Request {
            seq: SEQ_MODULUS,
            ..sample_request()
        };
        let result = encode_request(&request);
        assert!(matches!(
            result,
            Err(CodecError::FieldOutOfRange {
                field: "sequence",
                ..
            })
        ));
    }

    #[test]
    fn test_message_too_large() {
        let request = Request {
            data: Bytes::from(vec![0u8; MAX_MESSAGE_SIZE as usize + 1]),
            ..sample_request()
        };
        let result = encode_request(&request);
        assert!(matches!(result, Err(CodecError::MessageTooLarge(_))));
    }
}
