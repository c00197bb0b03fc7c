//! Row payload encoding and JSON sort-key extraction.
//!
//! This crate knows nothing about the GPU: it turns a caller-supplied byte
//! slice into the canonical bytes a row should be stored as, and turns a JSON
//! document plus a [`SortDefinition`] into the fixed-width `u32` words a
//! bitonic-sort compute pass can compare directly.

mod error;
mod payload;
mod sort_key;

pub use error::CodecError;
pub use payload::{decode_json, decode_payload, encode_payload, ElementKind, PayloadKind};
pub use sort_key::{
    encode_sort_words, DataKind, SortDefinition, SortDirection, SortField, SortKeyCache,
};
