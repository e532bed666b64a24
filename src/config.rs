/// Configuration for a [`Decoder`](crate::Decoder).
///
/// All flags have conservative defaults; use the `with_*` methods to deviate:
///
/// ```
/// use cbor_stream::DecodeOptions;
///
/// let opts = DecodeOptions::default()
///     .with_strict_duplicate_detection(true)
///     .with_intern_field_names(false);
/// ```
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Canonicalise decoded field names through the shared symbol table so
    /// that repeated names share one allocation. Default: `true`.
    pub intern_field_names: bool,
    /// Fail with a write-context violation when an object contains the same
    /// field name twice. Default: `false`.
    pub strict_duplicate_detection: bool,
    /// Drop the underlying reader when the decoder is closed or the root
    /// boundary is reached at a clean end of input. Default: `true`.
    pub auto_close_source: bool,
    /// Capacity of the owned input buffer. The buffer never grows; payloads
    /// larger than this are decoded incrementally. Default: 8000 bytes.
    pub buffer_size: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            intern_field_names: true,
            strict_duplicate_detection: false,
            auto_close_source: true,
            buffer_size: 8000,
        }
    }
}

impl DecodeOptions {
    pub fn with_intern_field_names(mut self, on: bool) -> Self {
        self.intern_field_names = on;
        self
    }

    pub fn with_strict_duplicate_detection(mut self, on: bool) -> Self {
        self.strict_duplicate_detection = on;
        self
    }

    pub fn with_auto_close_source(mut self, on: bool) -> Self {
        self.auto_close_source = on;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        // a header plus its 8-byte suffix must always fit
        self.buffer_size = size.max(16);
        self
    }
}

/// Configuration for an [`Encoder`](crate::Encoder).
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Flush and drop the underlying writer when the encoder is closed.
    /// Default: `true`.
    pub auto_close_target: bool,
    /// Forward `flush()` calls to the underlying writer in addition to
    /// draining the owned buffer. Default: `true`.
    pub flush_passed_to_stream: bool,
    /// On close, synthesize the matching end event for every still-open
    /// container instead of failing. Default: `false`.
    pub auto_close_content: bool,
    /// Capacity of the owned output buffer. Default: 8000 bytes.
    pub buffer_size: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            auto_close_target: true,
            flush_passed_to_stream: true,
            auto_close_content: false,
            buffer_size: 8000,
        }
    }
}

impl EncodeOptions {
    pub fn with_auto_close_target(mut self, on: bool) -> Self {
        self.auto_close_target = on;
        self
    }

    pub fn with_flush_passed_to_stream(mut self, on: bool) -> Self {
        self.flush_passed_to_stream = on;
        self
    }

    pub fn with_auto_close_content(mut self, on: bool) -> Self {
        self.auto_close_content = on;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(16);
        self
    }
}
