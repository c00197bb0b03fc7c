use ahash::AHashMap;

/// How a [`SortField`]'s value should be interpreted before it is turned into
/// GPU-comparable words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// Lexicographic byte ordering over the first 8 bytes of the UTF-8 string.
    String,
    /// Any JSON number, compared by numeric value (not string form).
    Number,
    /// An RFC 3339 timestamp or `YYYY-MM-DD` date, compared chronologically.
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One field of a [`SortDefinition`]: a dot-separated path into the row's JSON
/// document, the type it should be read as, and the direction it sorts in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortField {
    pub path: String,
    pub kind: DataKind,
    pub direction: SortDirection,
}

/// A named, ordered list of [`SortField`]s. The store coordinator maintains one
/// GPU-resident permutation per `SortDefinition` it was asked to keep live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortDefinition {
    pub name: String,
    pub fields: Vec<SortField>,
}

impl SortDefinition {
    /// Every field contributes exactly two `u32` words to the comparison key,
    /// regardless of its [`DataKind`], so that the GPU-side comparator can walk
    /// keys of a fixed, pre-known stride.
    pub fn words_per_row(&self) -> usize {
        self.fields.len() * WORDS_PER_FIELD
    }
}

const WORDS_PER_FIELD: usize = 2;

/// Sentinel emitted for a field whose path does not resolve in a given
/// document, or whose value does not match the field's declared [`DataKind`]
/// (a [`DataKind::Number`] field holding a string, an unparseable date, …).
/// This is the pre-direction fallback word pair from §4.1: `(0, 0)` ascending,
/// which the direction bit-flip below turns into `(u32::MAX, u32::MAX)` for a
/// descending field. An ascending field therefore places rows missing (or
/// mistyped for) that field before every row that has it; descending places
/// them last.
const MISSING_FIELD_SENTINEL: (u32, u32) = (0, 0);

/// Caches string and date encodings across a flush window, since the same
/// field value (an enum-like status string, a day-granularity timestamp) tends
/// to repeat across many rows written in the same batch.
#[derive(Default, Debug)]
pub struct SortKeyCache {
    strings: AHashMap<String, (u32, u32)>,
    dates: AHashMap<String, i64>,
}

impl SortKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.strings.clear();
        self.dates.clear();
    }
}

/// Extract the GPU-comparable key words for `document` under `definition`,
/// concatenating each field's two words in field order. Never fails: a field
/// that is missing, or whose value does not match its declared [`DataKind`],
/// degrades to the fallback sentinel rather than rejecting the whole record
/// (§4.1 "emit a single fallback word" / "Non-finite or non-numeric").
pub fn encode_sort_words(
    definition: &SortDefinition,
    document: &serde_json::Value,
    cache: &mut SortKeyCache,
) -> Vec<u32> {
    let mut words = Vec::with_capacity(definition.words_per_row());
    for field in &definition.fields {
        let (hi, lo) = encode_field(field, document, cache);
        words.push(hi);
        words.push(lo);
    }
    words
}

fn encode_field(
    field: &SortField,
    document: &serde_json::Value,
    cache: &mut SortKeyCache,
) -> (u32, u32) {
    let (hi, lo) = match get_path(document, &field.path) {
        None => MISSING_FIELD_SENTINEL,
        Some(value) => match field.kind {
            DataKind::String => encode_string(value, cache),
            DataKind::Number => encode_number(value),
            DataKind::Date => encode_date(value, cache),
        },
    };
    if field.direction == SortDirection::Descending {
        (!hi, !lo)
    } else {
        (hi, lo)
    }
}

/// Resolve a dot-separated path (`"user.address.city"`) against a JSON value.
/// Array indices are not supported; a path segment that does not name an
/// object key simply fails to resolve, the same as a genuinely absent field.
fn get_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Not a string: falls back to [`MISSING_FIELD_SENTINEL`] rather than erroring
/// (§4.1 "If not a string, emit a single fallback word").
fn encode_string(value: &serde_json::Value, cache: &mut SortKeyCache) -> (u32, u32) {
    let Some(text) = value.as_str() else {
        return MISSING_FIELD_SENTINEL;
    };
    if let Some(words) = cache.strings.get(text) {
        return *words;
    }
    let mut buf = [0u8; 8];
    let bytes = text.as_bytes();
    let len = bytes.len().min(8);
    buf[..len].copy_from_slice(&bytes[..len]);
    let hi = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    let lo = u32::from_be_bytes(buf[4..8].try_into().unwrap());
    cache.strings.insert(text.to_owned(), (hi, lo));
    (hi, lo)
}

/// Not a number, or non-finite (`NaN`/`±∞`): falls back to
/// [`MISSING_FIELD_SENTINEL`] (§4.1 "Non-finite or non-numeric: single
/// fallback word").
fn encode_number(value: &serde_json::Value) -> (u32, u32) {
    match value.as_f64() {
        Some(number) if number.is_finite() => split_u64(order_preserving_f64(number)),
        _ => MISSING_FIELD_SENTINEL,
    }
}

/// Not a date string, or a string that fails to parse as RFC 3339 or
/// `YYYY-MM-DD`: falls back to [`MISSING_FIELD_SENTINEL`] (§4.1
/// "Null/unparseable: `[0,0]` asc").
fn encode_date(value: &serde_json::Value, cache: &mut SortKeyCache) -> (u32, u32) {
    let Some(text) = value.as_str() else {
        return MISSING_FIELD_SENTINEL;
    };
    let millis = if let Some(millis) = cache.dates.get(text) {
        Some(*millis)
    } else {
        let parsed = parse_date_millis(text);
        if let Some(millis) = parsed {
            cache.dates.insert(text.to_owned(), millis);
        }
        parsed
    };
    match millis {
        Some(millis) => split_u64(order_preserving_i64(millis)),
        None => MISSING_FIELD_SENTINEL,
    }
}

fn parse_date_millis(text: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| {
            date.and_hms_opt(0, 0, 0)
                .expect("midnight is always a valid time")
                .and_utc()
                .timestamp_millis()
        })
}

/// Standard order-preserving transform from IEEE-754 bits to an unsigned
/// integer: flip the sign bit for non-negative values, flip every bit for
/// negative ones. Unsigned-comparing the result reproduces the float's
/// natural ordering, which a bitonic sort over plain `u32` words cannot do on
/// the raw bit pattern (two's-complement-like sign bit sorts backwards).
fn order_preserving_f64(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits >> 63 == 0 {
        bits | (1 << 63)
    } else {
        !bits
    }
}

/// Order-preserving transform from a signed integer to an unsigned one: flip
/// the sign bit so two's-complement ordering becomes unsigned ordering.
fn order_preserving_i64(value: i64) -> u64 {
    (value as u64) ^ (1 << 63)
}

fn split_u64(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, value as u32)
}
