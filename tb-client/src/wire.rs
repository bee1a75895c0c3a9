//! Framing for the forwarding engine: 4-byte LE length prefix, then a fixed header and the payload.
//!
//! Request body: 16-byte cluster id | u8 operation | u16 LE user_tag | payload.
//! Reply body:   u8 status | payload.
//! Payloads are opaque; this module never looks inside them.

pub const LEN_SIZE: usize = 4;
pub const REQUEST_HEADER_SIZE: usize = 16 + 1 + 2;
pub const REPLY_HEADER_SIZE: usize = 1;

/// Decoded request frame (used by servers and tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub cluster_id: [u8; 16],
    pub operation: u8,
    pub user_tag: u16,
    pub payload: Vec<u8>,
}

/// Decoded reply frame borrowing from the read buffer. `status` is the engine's raw status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply<'a> {
    pub status: u8,
    pub payload: &'a [u8],
}

/// Error encoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("payload of {0} bytes exceeds frame limit")]
    TooLarge(usize),
}

/// Error decoding a frame (need more bytes, too large, or short header).
#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("need more bytes")]
    NeedMore,
    #[error("frame of {0} bytes exceeds limit")]
    TooLarge(usize),
    #[error("frame shorter than its header")]
    Truncated,
}

fn frame(header: &[u8], payload: &[u8], max_payload: u32) -> Result<Vec<u8>, FrameEncodeError> {
    if payload.len() > max_payload as usize {
        return Err(FrameEncodeError::TooLarge(payload.len()));
    }
    let body_len = header.len() + payload.len();
    let mut out = Vec::with_capacity(LEN_SIZE + body_len);
    out.extend_from_slice(&(body_len as u32).to_le_bytes());
    out.extend_from_slice(header);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode one request frame.
pub fn encode_request(
    cluster_id: &[u8; 16],
    operation: u8,
    user_tag: u16,
    payload: &[u8],
    max_payload: u32,
) -> Result<Vec<u8>, FrameEncodeError> {
    let mut header = [0u8; REQUEST_HEADER_SIZE];
    header[..16].copy_from_slice(cluster_id);
    header[16] = operation;
    header[17..19].copy_from_slice(&user_tag.to_le_bytes());
    frame(&header, payload, max_payload)
}

/// Encode one reply frame.
pub fn encode_reply(status: u8, payload: &[u8], max_payload: u32) -> Result<Vec<u8>, FrameEncodeError> {
    frame(&[status], payload, max_payload)
}

/// Read the body length from a length prefix, rejecting frames whose payload
/// would exceed `max_payload` once `header_size` is subtracted.
pub fn body_len(
    prefix: [u8; LEN_SIZE],
    header_size: usize,
    max_payload: u32,
) -> Result<usize, FrameDecodeError> {
    let len = u32::from_le_bytes(prefix) as usize;
    if len < header_size {
        return Err(FrameDecodeError::Truncated);
    }
    if len - header_size > max_payload as usize {
        return Err(FrameDecodeError::TooLarge(len));
    }
    Ok(len)
}

/// Split one length-prefixed body off the front of `bytes`.
fn split_body(
    bytes: &[u8],
    header_size: usize,
    max_payload: u32,
) -> Result<(&[u8], usize), FrameDecodeError> {
    if bytes.len() < LEN_SIZE {
        return Err(FrameDecodeError::NeedMore);
    }
    let len = body_len(
        [bytes[0], bytes[1], bytes[2], bytes[3]],
        header_size,
        max_payload,
    )?;
    if bytes.len() < LEN_SIZE + len {
        return Err(FrameDecodeError::NeedMore);
    }
    Ok((&bytes[LEN_SIZE..LEN_SIZE + len], LEN_SIZE + len))
}

/// Parse a reply body (without the length prefix).
pub fn parse_reply_body(body: &[u8]) -> Result<Reply<'_>, FrameDecodeError> {
    let (&status, payload) = body.split_first().ok_or(FrameDecodeError::Truncated)?;
    Ok(Reply { status, payload })
}

/// Decode one request frame from the front of `bytes`. Returns it and the bytes consumed.
pub fn decode_request(bytes: &[u8], max_payload: u32) -> Result<(Request, usize), FrameDecodeError> {
    let (body, used) = split_body(bytes, REQUEST_HEADER_SIZE, max_payload)?;
    let mut cluster_id = [0u8; 16];
    cluster_id.copy_from_slice(&body[..16]);
    let request = Request {
        cluster_id,
        operation: body[16],
        user_tag: u16::from_le_bytes([body[17], body[18]]),
        payload: body[REQUEST_HEADER_SIZE..].to_vec(),
    };
    Ok((request, used))
}

/// Decode one reply frame from the front of `bytes`. Returns it and the bytes consumed.
pub fn decode_reply(bytes: &[u8], max_payload: u32) -> Result<(Reply<'_>, usize), FrameDecodeError> {
    let (body, used) = split_body(bytes, REPLY_HEADER_SIZE, max_payload)?;
    Ok((parse_reply_body(body)?, used))
}
