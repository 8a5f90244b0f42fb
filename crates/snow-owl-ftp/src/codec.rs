//! Transfer mode framing (RFC 959 §3.4)
//!
//! `Stream` mode is a raw passthrough. `Block` mode frames payload into
//! length-prefixed records; `Compressed` mode frames payload into
//! descriptor-coded records. Encode only ever emits the literal form of a
//! Compressed descriptor, but decode must also accept the replicated-byte
//! and filler forms a peer may send.

use bytes::{BufMut, Bytes, BytesMut};

/// RFC 959 §3.4 transfer modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// No framing; bytes go straight to the data connection.
    #[default]
    Stream,
    /// Length-prefixed records, EOF flagged on the final one.
    Block,
    /// Descriptor-coded records.
    Compressed,
}

impl TransferMode {
    /// Parse the single-letter argument to the MODE command.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "S" => Some(TransferMode::Stream),
            "B" => Some(TransferMode::Block),
            "C" => Some(TransferMode::Compressed),
            _ => None,
        }
    }
}

/// Block-mode EOF descriptor flag (RFC 959 §3.4.2).
const BLOCK_EOF_FLAG: u8 = 0x40;

/// Maximum payload carried by a single Block-mode record.
const MAX_BLOCK_LEN: usize = u16::MAX as usize;

/// Maximum payload carried by a single Compressed literal descriptor (7
/// bits of length).
const MAX_LITERAL_LEN: usize = 0x7F;

/// Encode `payload` as Block-mode records. `payload` is the entire
/// artifact to send; the EOF flag rides on the last nonempty block, or on
/// a lone empty block if `payload` itself is empty.
pub fn encode_block(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::new();
    if payload.is_empty() {
        out.put_u8(BLOCK_EOF_FLAG);
        out.put_u16(0);
        return out.freeze();
    }

    let chunks: Vec<&[u8]> = payload.chunks(MAX_BLOCK_LEN).collect();
    let last_index = chunks.len() - 1;
    for (index, chunk) in chunks.into_iter().enumerate() {
        let flag = if index == last_index { BLOCK_EOF_FLAG } else { 0x00 };
        out.put_u8(flag);
        #[allow(clippy::cast_possible_truncation)]
        out.put_u16(chunk.len() as u16);
        out.extend_from_slice(chunk);
    }
    out.freeze()
}

/// Decode a complete Block-mode byte stream, ignoring all flag bits: the
/// decoder accepts any flag value but must advance exactly `3 + length`
/// bytes per record.
pub fn decode_block(mut data: &[u8]) -> crate::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    while !data.is_empty() {
        if data.len() < 3 {
            return Err(crate::Error::Protocol(
                "truncated block header".to_string(),
            ));
        }
        let len = u16::from_be_bytes([data[1], data[2]]) as usize;
        data = &data[3..];
        if data.len() < len {
            return Err(crate::Error::Protocol(
                "truncated block payload".to_string(),
            ));
        }
        out.extend_from_slice(&data[..len]);
        data = &data[len..];
    }
    Ok(out)
}

/// Encode `payload` as Compressed-mode records: each chunk of
/// up to 127 bytes gets a literal descriptor (top bit clear, value = chunk
/// length) followed by the chunk bytes. No run-length or filler descriptors
/// are ever emitted by this encoder.
pub fn encode_compressed(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::new();
    if payload.is_empty() {
        return out.freeze();
    }
    for chunk in payload.chunks(MAX_LITERAL_LEN) {
        #[allow(clippy::cast_possible_truncation)]
        let descriptor = chunk.len() as u8;
        out.put_u8(descriptor);
        out.extend_from_slice(chunk);
    }
    out.freeze()
}

/// Decode a complete Compressed-mode byte stream, classifying each
/// descriptor by its top two bits: literal, replicated-byte, or
/// filler/restart (discarded).
pub fn decode_compressed(mut data: &[u8]) -> crate::Result<Vec<u8>> {
    let mut out = Vec::new();
    while !data.is_empty() {
        let descriptor = data[0];
        data = &data[1..];

        if descriptor & 0x80 == 0 {
            let len = usize::from(descriptor & 0x7F);
            if data.len() < len {
                return Err(crate::Error::Protocol(
                    "truncated literal descriptor".to_string(),
                ));
            }
            out.extend_from_slice(&data[..len]);
            data = &data[len..];
        } else if descriptor & 0xC0 == 0x80 {
            let &byte = data
                .first()
                .ok_or_else(|| crate::Error::Protocol("truncated replicate descriptor".to_string()))?;
            let count = usize::from(descriptor & 0x3F);
            out.extend(std::iter::repeat_n(byte, count));
            data = &data[1..];
        } else {
            let len = usize::from(descriptor & 0x3F);
            if data.len() < len {
                return Err(crate::Error::Protocol(
                    "truncated filler descriptor".to_string(),
                ));
            }
            data = &data[len..];
        }
    }
    Ok(out)
}

/// Apply the session's current transfer mode to outgoing bytes.
pub fn encode(mode: TransferMode, payload: &[u8]) -> Bytes {
    match mode {
        TransferMode::Stream => Bytes::copy_from_slice(payload),
        TransferMode::Block => encode_block(payload),
        TransferMode::Compressed => encode_compressed(payload),
    }
}

/// Apply the session's current transfer mode to incoming bytes.
pub fn decode(mode: TransferMode, data: &[u8]) -> crate::Result<Vec<u8>> {
    match mode {
        TransferMode::Stream => Ok(data.to_vec()),
        TransferMode::Block => decode_block(data),
        TransferMode::Compressed => decode_compressed(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_round_trip_single_chunk() {
        let data = b"hello, ftp";
        let framed = encode_block(data);
        assert_eq!(decode_block(&framed).unwrap(), data);
    }

    #[test]
    fn block_empty_payload_emits_lone_eof_record() {
        let framed = encode_block(b"");
        assert_eq!(framed.as_ref(), [BLOCK_EOF_FLAG, 0, 0]);
        assert_eq!(decode_block(&framed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn block_eof_flag_rides_last_nonempty_block() {
        let payload = vec![0u8; MAX_BLOCK_LEN + 10];
        let framed = encode_block(&payload);
        assert_eq!(framed[0], 0x00);
        let second_header_offset = 3 + MAX_BLOCK_LEN;
        assert_eq!(framed[second_header_offset], BLOCK_EOF_FLAG);
        assert_eq!(decode_block(&framed).unwrap(), payload);
    }

    #[test]
    fn block_decode_ignores_flag_bits() {
        let mut framed = BytesMut::new();
        framed.put_u8(0xFF);
        framed.put_u16(3);
        framed.extend_from_slice(b"abc");
        assert_eq!(decode_block(&framed).unwrap(), b"abc");
    }

    #[test]
    fn block_decode_rejects_truncated_payload() {
        let mut framed = BytesMut::new();
        framed.put_u8(0x00);
        framed.put_u16(10);
        framed.extend_from_slice(b"abc");
        assert!(decode_block(&framed).is_err());
    }

    #[test]
    fn compressed_encode_emits_only_literal_descriptors() {
        let data = b"aaaaaaaaaabbbccxyz";
        let framed = encode_compressed(data);
        assert_eq!(framed[0] & 0x80, 0);
        assert_eq!(decode_compressed(&framed).unwrap(), data);
    }

    #[test]
    fn compressed_round_trip_across_chunk_boundary() {
        let data = vec![b'x'; 300];
        let framed = encode_compressed(&data);
        assert_eq!(decode_compressed(&framed).unwrap(), data);
    }

    #[test]
    fn compressed_decode_accepts_replicated_descriptor() {
        let mut framed = BytesMut::new();
        framed.put_u8(0x80 | 5); // replicate, count 5
        framed.put_u8(b'z');
        assert_eq!(decode_compressed(&framed).unwrap(), vec![b'z'; 5]);
    }

    #[test]
    fn compressed_decode_discards_filler_descriptor() {
        let mut framed = BytesMut::new();
        framed.put_u8(0xC0 | 2); // filler, 2 bytes
        framed.extend_from_slice(b"xx");
        framed.put_u8(3); // literal, length 3
        framed.extend_from_slice(b"abc");
        assert_eq!(decode_compressed(&framed).unwrap(), b"abc");
    }

    #[test]
    fn mode_from_code_is_case_insensitive() {
        assert_eq!(TransferMode::from_code("s"), Some(TransferMode::Stream));
        assert_eq!(TransferMode::from_code("B"), Some(TransferMode::Block));
        assert_eq!(TransferMode::from_code("c"), Some(TransferMode::Compressed));
        assert_eq!(TransferMode::from_code("X"), None);
    }

}
