/// Errors produced while encoding or decoding a row payload. Sort-key
/// extraction never fails: a field that is missing or mistyped degrades to a
/// fallback word instead (see `sort_key::encode_field`).
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("numeric array payload length {len} is not a multiple of element size {element_size}")]
    MisalignedNumericArray { len: usize, element_size: usize },

    #[error("payload is not valid UTF-8 JSON: {0}")]
    InvalidJsonUtf8(#[source] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}
