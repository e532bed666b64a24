use std::{
    borrow::Cow,
    fmt::{Debug, Display},
    io,
};

/// Errors that may be raised while decoding or encoding a CBOR stream
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// the input bytes do not form well-formed CBOR: invalid initial byte,
    /// invalid additional info, truncated header, stray break byte, chunk of
    /// the wrong major type, invalid UTF-8 inside a text string, or an
    /// unexpected end of input in the middle of an item
    Malformed(Cow<'static, str>),
    /// a numeric value does not fit the explicitly requested representation
    Overflow(Cow<'static, str>),
    /// an event was written that the current container does not allow,
    /// e.g. a value where a field name was expected or a duplicate name
    WriteViolation(Cow<'static, str>),
    /// the requested operation is not provided by this codec
    Unsupported(&'static str),
    /// an error bubbled up from the underlying byte stream
    Io(io::Error),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Malformed(msg) => write!(f, "malformed input: {}", msg),
            ErrorKind::Overflow(msg) => write!(f, "numeric overflow: {}", msg),
            ErrorKind::WriteViolation(msg) => write!(f, "write context violation: {}", msg),
            ErrorKind::Unsupported(msg) => write!(f, "unsupported operation: {}", msg),
            ErrorKind::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

/// Error container for codec problems
///
/// Decode errors carry the absolute stream offset at which the offending
/// byte was read; encode errors and I/O errors usually do not.
pub struct CodecError {
    kind: ErrorKind,
    offset: Option<u64>,
}

impl CodecError {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self { kind, offset: None }
    }

    pub(crate) fn malformed(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Malformed(msg.into()))
    }

    pub(crate) fn overflow(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Overflow(msg.into()))
    }

    pub(crate) fn write_violation(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::WriteViolation(msg.into()))
    }

    pub(crate) fn unsupported(msg: &'static str) -> Self {
        Self::new(ErrorKind::Unsupported(msg))
    }

    pub(crate) fn at(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The kind of problem that was encountered.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Absolute position in the byte stream where decoding failed, if known.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// True if this error stems from ill-formed input bytes.
    pub fn is_malformed(&self) -> bool {
        matches!(self.kind, ErrorKind::Malformed(_))
    }
}

impl Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.offset {
            Some(o) => write!(f, "{} at offset {}", self.kind, o),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl Debug for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        Self::new(ErrorKind::Io(e))
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
