use gk_gpu::DeviceError;

/// The stable, language-neutral error kinds of §7.
///
/// Validation errors (`NoSuchStore`, `DuplicateStore`, ...) are returned
/// synchronously and never touch device state. `DeviceError` is fatal and
/// leaves the pending write queue intact so a caller can inspect or retry.
/// `SortBudgetExceeded` and `SingleWriteFailed` are non-fatal: they are
/// logged (via [`gk_log`]) rather than propagated from the call that
/// triggered them, and only surface here when a caller explicitly asks a
/// component to report its last outcome.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store {name:?} does not exist")]
    NoSuchStore { name: String },

    #[error("store {name:?} already exists")]
    DuplicateStore { name: String },

    #[error("store options declared a numeric array store without an element_kind")]
    MissingElementKind,

    #[error("value does not match store {store:?}'s declared payload discipline: {reason}")]
    TypeMismatch { store: String, reason: String },

    #[error("key {key:?} already has an active row in store {store:?}")]
    DuplicateKey { store: String, key: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("sort definition {definition:?} on store {store:?} exceeds the device's storage binding limit ({needed} bytes > {limit} bytes); order retained from the previous pass")]
    SortBudgetExceeded {
        store: String,
        definition: String,
        needed: u64,
        limit: u64,
    },

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("write to {store:?} failed and was retained in the pending queue: {reason}")]
    SingleWriteFailed { store: String, reason: String },

    #[error(transparent)]
    Codec(#[from] gk_codec::CodecError),
}
