use crate::error::CodecError;

/// The element type backing a [`PayloadKind::NumericArray`] row.
///
/// Mirrors the set of types that `bytemuck` can cast a byte slice into without
/// padding or endianness surprises on the host side; the GPU only ever sees raw
/// bytes, so this enum exists purely to let callers validate and interpret rows
/// they read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ElementKind {
    pub fn size_bytes(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }
}

/// The payload discipline a caller declared for a key when writing it.
///
/// This is metadata tracked by the row directory, not something encoded into the
/// bytes themselves: two rows with identical bytes but different [`PayloadKind`]s
/// are interpreted differently on read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// Bytes are stored and returned as-is, no interpretation.
    OpaqueBytes,
    /// Bytes are a tightly packed, host-endian array of `element` values,
    /// zero-padded up to a 4-byte multiple on write for 1- and 2-byte
    /// element kinds (always already satisfied for element sizes ≥ 4).
    NumericArray(ElementKind),
    /// Bytes are canonical JSON, padded with trailing ASCII spaces to a multiple
    /// of 4 bytes so the row can be placed at a 4-byte-aligned GPU offset.
    JsonDocument,
}

/// Validate `bytes` against `kind` and return the host-ready byte buffer that
/// should be copied onto the GPU.
///
/// For [`PayloadKind::JsonDocument`] this re-serializes `bytes` into canonical
/// form (stable key order is not guaranteed by `serde_json`, but whitespace is
/// normalized and the result is padded) so that two writes of semantically
/// identical JSON produce byte-identical rows.
pub fn encode_payload(kind: &PayloadKind, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    match kind {
        PayloadKind::OpaqueBytes => {
            let mut padded = bytes.to_vec();
            let remainder = padded.len() % 4;
            if remainder != 0 {
                padded.extend(std::iter::repeat(0u8).take(4 - remainder));
            }
            Ok(padded)
        }
        PayloadKind::NumericArray(element) => {
            let element_size = element.size_bytes();
            if bytes.len() % element_size != 0 {
                return Err(CodecError::MisalignedNumericArray {
                    len: bytes.len(),
                    element_size,
                });
            }
            let mut padded = bytes.to_vec();
            pad_to_word_boundary(&mut padded);
            Ok(padded)
        }
        PayloadKind::JsonDocument => {
            let text = std::str::from_utf8(bytes).map_err(CodecError::InvalidJsonUtf8)?;
            let value: serde_json::Value =
                serde_json::from_str(text).map_err(CodecError::InvalidJson)?;
            let mut canonical = serde_json::to_vec(&value).map_err(CodecError::InvalidJson)?;
            pad_to_word_boundary(&mut canonical);
            Ok(canonical)
        }
    }
}

/// Inverse of [`encode_payload`]: strip the trailing pad spaces a
/// [`PayloadKind::JsonDocument`] row was stored with. Other payload kinds are
/// returned unmodified, since they carry no padding of their own.
pub fn decode_payload(kind: &PayloadKind, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    match kind {
        PayloadKind::OpaqueBytes | PayloadKind::NumericArray(_) => Ok(bytes.to_vec()),
        PayloadKind::JsonDocument => {
            let trimmed = trim_trailing_pad(bytes);
            Ok(trimmed.to_vec())
        }
    }
}

/// Parse a [`PayloadKind::JsonDocument`] row back into a [`serde_json::Value`],
/// trimming the trailing pad first.
pub fn decode_json(bytes: &[u8]) -> Result<serde_json::Value, CodecError> {
    let trimmed = trim_trailing_pad(bytes);
    let text = std::str::from_utf8(trimmed).map_err(CodecError::InvalidJsonUtf8)?;
    serde_json::from_str(text).map_err(CodecError::InvalidJson)
}

fn pad_to_word_boundary(bytes: &mut Vec<u8>) {
    let remainder = bytes.len() % 4;
    if remainder != 0 {
        bytes.extend(std::iter::repeat(b' ').take(4 - remainder));
    }
}

fn trim_trailing_pad(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips_through_padding() {
        let encoded = encode_payload(&PayloadKind::JsonDocument, br#"{"a":1}"#).unwrap();
        assert_eq!(encoded.len() % 4, 0);
        let decoded = decode_json(&encoded).unwrap();
        assert_eq!(decoded, serde_json::json!({"a": 1}));
    }

    #[test]
    fn json_padding_is_idempotent_on_already_aligned_input() {
        let encoded = encode_payload(&PayloadKind::JsonDocument, br#"{"ab":12}"#).unwrap();
        assert_eq!(encoded.len() % 4, 0);
        assert_eq!(decode_json(&encoded).unwrap(), serde_json::json!({"ab": 12}));
    }

    #[test]
    fn numeric_array_of_one_byte_elements_is_zero_padded_to_a_word_boundary() {
        let bytes = vec![1u8, 2, 3, 4, 5];
        let encoded = encode_payload(&PayloadKind::NumericArray(ElementKind::U8), &bytes).unwrap();
        assert_eq!(encoded.len() % 4, 0);
        assert_eq!(encoded, vec![1, 2, 3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn numeric_array_rejects_misaligned_length() {
        let err = encode_payload(&PayloadKind::NumericArray(ElementKind::F32), &[0u8; 6])
            .unwrap_err();
        assert!(matches!(err, CodecError::MisalignedNumericArray { .. }));
    }

    #[test]
    fn opaque_bytes_pass_through_when_already_aligned() {
        let bytes = vec![1, 2, 3, 4];
        let encoded = encode_payload(&PayloadKind::OpaqueBytes, &bytes).unwrap();
        assert_eq!(encoded, bytes);
        let decoded = decode_payload(&PayloadKind::OpaqueBytes, &encoded).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn opaque_bytes_are_zero_padded_to_a_word_boundary() {
        let bytes = vec![1, 2, 3, 4, 5];
        let encoded = encode_payload(&PayloadKind::OpaqueBytes, &bytes).unwrap();
        assert_eq!(encoded.len() % 4, 0);
        assert_eq!(encoded, vec![1, 2, 3, 4, 5, 0, 0, 0]);
    }
}
