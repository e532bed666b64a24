use std::fmt::{Display, Formatter};

/// One step of a CBOR document, as produced by a [`Decoder`](crate::Decoder)
/// and consumed by an [`Encoder`](crate::Encoder).
///
/// The vocabulary is the same as for JSON documents, so tree builders and
/// data binders written against it do not need to know which wire format
/// they are driving. Scalar payloads are not carried in the event itself:
/// they are fetched lazily through the decoder's accessors (`text()`,
/// `binary()`, `to_i64()`, …), which lets consumers skip payloads they do
/// not care about without paying for materialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    StartArray,
    EndArray,
    StartObject,
    EndObject,
    /// An object key; the decoded name is available via `current_name()`.
    FieldName,
    /// A text string; payload via `text()` / `text_len()`.
    Text,
    /// A byte string; payload via `binary()` / `read_binary()`.
    Bytes,
    /// An integer of any width; payload via `to_i32()` / `to_i64()` /
    /// `to_big_int()`, natural width via `number_type()`.
    Int,
    /// A floating-point or decimal number; payload via `to_f32()` /
    /// `to_f64()` / `to_big_decimal()`.
    Float,
    Bool(bool),
    Null,
}

impl Event {
    /// True for `StartArray` and `StartObject`.
    pub fn is_container_start(self) -> bool {
        matches!(self, Event::StartArray | Event::StartObject)
    }

    /// True for `EndArray` and `EndObject`.
    pub fn is_container_end(self) -> bool {
        matches!(self, Event::EndArray | Event::EndObject)
    }

    /// True for every event that stands for a value (not a name and not a
    /// container end).
    pub fn is_value(self) -> bool {
        !matches!(self, Event::FieldName | Event::EndArray | Event::EndObject)
    }

    /// True for `Int` and `Float`.
    pub fn is_numeric(self) -> bool {
        matches!(self, Event::Int | Event::Float)
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::StartArray => write!(f, "start of array"),
            Event::EndArray => write!(f, "end of array"),
            Event::StartObject => write!(f, "start of object"),
            Event::EndObject => write!(f, "end of object"),
            Event::FieldName => write!(f, "field name"),
            Event::Text => write!(f, "text string"),
            Event::Bytes => write!(f, "byte string"),
            Event::Int => write!(f, "integer"),
            Event::Float => write!(f, "floating-point number"),
            Event::Bool(b) => write!(f, "boolean {}", b),
            Event::Null => write!(f, "null"),
        }
    }
}

/// The natural representation of the numeric value a decoder is positioned
/// on, i.e. the narrowest form that holds it without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberType {
    I32,
    I64,
    BigInt,
    F32,
    F64,
    BigDecimal,
}

impl Display for NumberType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NumberType::I32 => write!(f, "32-bit integer"),
            NumberType::I64 => write!(f, "64-bit integer"),
            NumberType::BigInt => write!(f, "big integer"),
            NumberType::F32 => write!(f, "single-precision float"),
            NumberType::F64 => write!(f, "double-precision float"),
            NumberType::BigDecimal => write!(f, "big decimal"),
        }
    }
}
