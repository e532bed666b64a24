use crate::{
    config::DecodeOptions,
    constants::*,
    context::{Container, ReadStack},
    error::{CodecError, Result},
    event::{Event, NumberType},
    io::ByteInput,
    symbols::{pack_quads, Symbols, MAX_INTERNED_LEN},
    value::{BigDecimal, BigInt},
};
use smallvec::SmallVec;
use std::{
    convert::TryFrom,
    io::{Read, Write},
    sync::Arc,
};

mod utf8;

/// State of the current event's lazy payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    /// the current event has no string/binary payload
    None,
    /// an unread text payload: definite byte length, or `None` for chunked
    PendingText(Option<u64>),
    /// an unread binary payload, same convention
    PendingBytes(Option<u64>),
    /// text payload materialised into the accumulator
    Text,
    /// binary payload materialised into the byte accumulator
    Bytes,
    /// payload was streamed out and is gone
    Drained,
}

const HAS_INT: u8 = 1;
const HAS_LONG: u8 = 2;
const HAS_BIG_INT: u8 = 4;
const HAS_FLOAT: u8 = 8;
const HAS_DOUBLE: u8 = 16;
const HAS_DECIMAL: u8 = 32;

/// Cache of numeric representations for the current event.
///
/// The natural representation is filled in when the value is decoded; the
/// other forms are computed on first request and remembered, with range
/// checks on every narrowing step.
struct Numbers {
    ntype: Option<NumberType>,
    computed: u8,
    int_v: i32,
    long_v: i64,
    float_v: f32,
    double_v: f64,
    big_v: Option<BigInt>,
    dec_v: Option<BigDecimal>,
}

// 2^63 as f64; doubles in [-2^63, 2^63) convert to i64 without saturation
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

impl Numbers {
    fn new() -> Self {
        Self {
            ntype: None,
            computed: 0,
            int_v: 0,
            long_v: 0,
            float_v: 0.0,
            double_v: 0.0,
            big_v: None,
            dec_v: None,
        }
    }

    fn reset(&mut self) {
        self.ntype = None;
        self.computed = 0;
        self.big_v = None;
        self.dec_v = None;
    }

    fn set_i64(&mut self, value: i64) {
        if let Ok(narrow) = i32::try_from(value) {
            self.ntype = Some(NumberType::I32);
            self.int_v = narrow;
            self.computed = HAS_INT | HAS_LONG;
        } else {
            self.ntype = Some(NumberType::I64);
            self.computed = HAS_LONG;
        }
        self.long_v = value;
    }

    fn set_big_int(&mut self, value: BigInt) {
        self.ntype = Some(NumberType::BigInt);
        self.computed = HAS_BIG_INT;
        self.big_v = Some(value);
    }

    fn set_f32(&mut self, value: f32) {
        self.ntype = Some(NumberType::F32);
        self.computed = HAS_FLOAT | HAS_DOUBLE;
        self.float_v = value;
        self.double_v = f64::from(value);
    }

    fn set_f64(&mut self, value: f64) {
        self.ntype = Some(NumberType::F64);
        self.computed = HAS_DOUBLE;
        self.double_v = value;
    }

    fn set_decimal(&mut self, value: BigDecimal) {
        self.ntype = Some(NumberType::BigDecimal);
        self.computed = HAS_DECIMAL;
        self.dec_v = Some(value);
    }

    fn to_i32(&mut self) -> Result<i32> {
        if self.computed & HAS_INT == 0 {
            let wide = self.to_i64()?;
            let narrow = i32::try_from(wide)
                .map_err(|_| CodecError::overflow(format!("{} does not fit a 32-bit integer", wide)))?;
            self.int_v = narrow;
            self.computed |= HAS_INT;
        }
        Ok(self.int_v)
    }

    fn to_i64(&mut self) -> Result<i64> {
        if self.computed & HAS_LONG == 0 {
            let value = if self.computed & HAS_BIG_INT != 0 {
                let big = self.big_v.as_ref().expect("flag implies value");
                big.to_i64()
                    .ok_or_else(|| CodecError::overflow(format!("{} does not fit a 64-bit integer", big)))?
            } else if self.computed & HAS_DECIMAL != 0 {
                let int = self.dec_v.as_ref().expect("flag implies value").to_big_int();
                int.to_i64()
                    .ok_or_else(|| CodecError::overflow(format!("{} does not fit a 64-bit integer", int)))?
            } else {
                let d = self.double_v;
                if d.is_finite() && d >= -TWO_POW_63 && d < TWO_POW_63 {
                    d as i64
                } else {
                    return Err(CodecError::overflow(format!(
                        "{} is outside the 64-bit integer range",
                        d
                    )));
                }
            };
            self.long_v = value;
            self.computed |= HAS_LONG;
        }
        Ok(self.long_v)
    }

    fn to_big_int(&mut self) -> Result<BigInt> {
        if self.computed & HAS_BIG_INT == 0 {
            let value = if self.computed & HAS_LONG != 0 {
                BigInt::from_i64(self.long_v)
            } else if self.computed & HAS_DECIMAL != 0 {
                self.dec_v.as_ref().expect("flag implies value").to_big_int()
            } else {
                BigDecimal::from_f64(self.double_v)
                    .ok_or_else(|| CodecError::overflow("cannot convert a non-finite float to an integer"))?
                    .to_big_int()
            };
            self.big_v = Some(value);
            self.computed |= HAS_BIG_INT;
        }
        Ok(self.big_v.clone().expect("just computed"))
    }

    fn to_f64(&mut self) -> Result<f64> {
        if self.computed & HAS_DOUBLE == 0 {
            let value = if self.computed & HAS_LONG != 0 {
                self.long_v as f64
            } else if self.computed & HAS_BIG_INT != 0 {
                self.big_v.as_ref().expect("flag implies value").to_f64()
            } else {
                self.dec_v.as_ref().expect("flag implies value").to_f64()
            };
            self.double_v = value;
            self.computed |= HAS_DOUBLE;
        }
        Ok(self.double_v)
    }

    fn to_f32(&mut self) -> Result<f32> {
        if self.computed & HAS_FLOAT == 0 {
            self.float_v = self.to_f64()? as f32;
            self.computed |= HAS_FLOAT;
        }
        Ok(self.float_v)
    }

    fn to_big_decimal(&mut self) -> Result<BigDecimal> {
        if self.computed & HAS_DECIMAL == 0 {
            let value = if self.computed & HAS_BIG_INT != 0 {
                BigDecimal::new(0, self.big_v.clone().expect("flag implies value"))
            } else if self.computed & HAS_LONG != 0 {
                BigDecimal::new(0, BigInt::from_i64(self.long_v))
            } else {
                BigDecimal::from_f64(self.double_v).ok_or_else(|| {
                    CodecError::overflow("cannot convert a non-finite float to a decimal")
                })?
            };
            self.dec_v = Some(value);
            self.computed |= HAS_DECIMAL;
        }
        Ok(self.dec_v.clone().expect("just computed"))
    }
}

/// Pull-style CBOR decoder over a byte stream.
///
/// `next_event` delivers one [`Event`] at a time; string and binary
/// payloads stay on the wire until an accessor asks for them, so skipping
/// unwanted values costs no materialisation. Field names are canonicalised
/// through a shared [`Symbols`] table.
///
/// ```
/// use cbor_stream::{Decoder, Event};
///
/// let bytes = [0x83u8, 0x01, 0x02, 0x03]; // [1, 2, 3]
/// let mut dec = Decoder::new(&bytes[..]);
/// assert_eq!(dec.next_event().unwrap(), Some(Event::StartArray));
/// assert_eq!(dec.next_event().unwrap(), Some(Event::Int));
/// assert_eq!(dec.to_i32().unwrap(), 1);
/// ```
pub struct Decoder<R> {
    input: ByteInput<R>,
    options: DecodeOptions,
    symbols: Symbols,
    context: ReadStack,
    current: Option<Event>,
    tags: SmallVec<[u64; 4]>,
    payload: Payload,
    text: String,
    bytes: Vec<u8>,
    numbers: Numbers,
    closed: bool,
}

impl<R: Read> Decoder<R> {
    pub fn new(source: R) -> Self {
        Self::with_options(source, DecodeOptions::default())
    }

    pub fn with_options(source: R, options: DecodeOptions) -> Self {
        Self::with_symbols(source, options, Symbols::new())
    }

    /// Create a decoder that canonicalises field names against a shared
    /// table, so repeated documents reuse the same name instances.
    pub fn with_symbols(source: R, options: DecodeOptions, symbols: Symbols) -> Self {
        Self {
            input: ByteInput::new(source, options.buffer_size),
            context: ReadStack::new(options.strict_duplicate_detection),
            options,
            symbols,
            current: None,
            tags: SmallVec::new(),
            payload: Payload::None,
            text: String::new(),
            bytes: Vec::new(),
            numbers: Numbers::new(),
            closed: false,
        }
    }

    /// Advance to the next event; `None` at a clean end of input.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        if self.closed {
            return Ok(None);
        }
        self.finish_pending()?;
        self.tags.clear();
        self.numbers.reset();
        self.payload = Payload::None;

        // a definite-length container that delivered its declared count
        // closes before anything else is read
        if !self.context.at_root() && !self.context.expects_more() {
            return Ok(Some(self.close_container()));
        }

        let byte = if self.context.at_root() {
            match self.input.next_or_end()? {
                Some(b) => b,
                None => {
                    self.end_of_input();
                    return Ok(None);
                }
            }
        } else {
            self.input.next()?
        };

        if byte == STOP_BYTE {
            let pos = self.input.position() - 1;
            if self.context.at_root() || self.context.has_expected_length() {
                return Err(CodecError::malformed(
                    "break byte outside an indefinite-length container",
                )
                .at(pos));
            }
            if self.context.in_object() && !self.context.expecting_name() {
                return Err(
                    CodecError::malformed("break byte between a field name and its value").at(pos)
                );
            }
            return Ok(Some(self.close_container()));
        }

        let ev = if self.context.expecting_name() {
            self.decode_name(byte)?;
            Event::FieldName
        } else {
            self.decode_value(byte)?
        };
        self.current = Some(ev);
        Ok(Some(ev))
    }

    /// The event the decoder is currently positioned on.
    pub fn current(&self) -> Option<Event> {
        self.current
    }

    /// The field name of the current object entry.
    ///
    /// Valid on the `FieldName` event itself as well as on the value (or
    /// nested container) that follows it.
    pub fn current_name(&self) -> Option<&str> {
        self.context
            .current_name()
            .or_else(|| self.context.parent_name())
            .map(|n| n.as_ref())
    }

    /// The CBOR tags recorded in front of the current value, outermost
    /// first. Tags are transparent: the tagged value itself is delivered
    /// as the event.
    pub fn current_tags(&self) -> &[u64] {
        &self.tags
    }

    /// Nesting depth: 0 at root level.
    pub fn depth(&self) -> usize {
        self.context.depth()
    }

    /// The shared symbol table handle of this decoder.
    pub fn symbols(&self) -> Symbols {
        self.symbols.clone()
    }

    /// Skip the contents of the current `StartArray`/`StartObject`,
    /// positioning the decoder on the matching end event. A no-op on any
    /// other event.
    pub fn skip_children(&mut self) -> Result<()> {
        match self.current {
            Some(Event::StartArray) | Some(Event::StartObject) => {}
            _ => return Ok(()),
        }
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_event()? {
                Some(ev) if ev.is_container_start() => depth += 1,
                Some(ev) if ev.is_container_end() => depth -= 1,
                Some(_) => {}
                None => {
                    return Err(CodecError::malformed("unexpected end of input")
                        .at(self.input.position()))
                }
            }
        }
        Ok(())
    }

    /// Release the decoder's buffers; the source is dropped when
    /// `auto_close_source` is set.
    pub fn close(&mut self) {
        self.input.close(self.options.auto_close_source);
        self.closed = true;
    }

    /// Hand all buffered-but-undecoded bytes to the caller, e.g. to resume
    /// reading the stream with a different consumer.
    pub fn release_buffered<W: Write>(&mut self, sink: &mut W) -> Result<u64> {
        self.input.release_buffered(sink)
    }

    // ---- payload accessors -------------------------------------------------

    /// The text of the current `Text` event or the name of the current
    /// `FieldName` event, materialising the payload if necessary.
    pub fn text(&mut self) -> Result<&str> {
        match self.current {
            Some(Event::Text) => {
                self.materialize_text()?;
                Ok(&self.text)
            }
            Some(Event::FieldName) => Ok(self
                .context
                .current_name()
                .map(|n| n.as_ref())
                .unwrap_or("")),
            _ => Err(CodecError::unsupported("current event carries no text")),
        }
    }

    /// Length of the current text payload in UTF-8 bytes.
    pub fn text_len(&mut self) -> Result<usize> {
        self.text().map(|t| t.len())
    }

    /// True if the current text payload is already materialised, i.e. a
    /// `text()` call will not touch the input.
    pub fn has_text_available(&self) -> bool {
        match self.current {
            Some(Event::Text) => self.payload == Payload::Text,
            Some(Event::FieldName) => true,
            _ => false,
        }
    }

    /// The bytes of the current `Bytes` event, materialising if necessary.
    pub fn binary(&mut self) -> Result<&[u8]> {
        match self.current {
            Some(Event::Bytes) => {
                self.materialize_bytes()?;
                Ok(&self.bytes)
            }
            _ => Err(CodecError::unsupported("current event carries no binary data")),
        }
    }

    /// Stream the current binary payload into `sink` without materialising
    /// it, returning the number of bytes written.
    pub fn read_binary<W: Write>(&mut self, sink: &mut W) -> Result<u64> {
        if self.current != Some(Event::Bytes) {
            return Err(CodecError::unsupported("current event carries no binary data"));
        }
        match self.payload {
            Payload::Bytes => {
                sink.write_all(&self.bytes)?;
                Ok(self.bytes.len() as u64)
            }
            Payload::PendingBytes(Some(len)) => {
                self.input.copy_to(len, sink)?;
                self.payload = Payload::Drained;
                Ok(len)
            }
            Payload::PendingBytes(None) => {
                let mut total = 0u64;
                loop {
                    let pos = self.input.position();
                    let byte = self.input.next()?;
                    if byte == STOP_BYTE {
                        break;
                    }
                    if byte >> 5 != MAJOR_BYTES {
                        return Err(CodecError::malformed(
                            "string chunk of mismatched major type",
                        )
                        .at(pos));
                    }
                    let len = self.read_uint(byte & 0x1f)?;
                    self.input.copy_to(len, sink)?;
                    total += len;
                }
                self.payload = Payload::Drained;
                Ok(total)
            }
            _ => Err(CodecError::unsupported("binary payload was already consumed")),
        }
    }

    // ---- numeric accessors -------------------------------------------------

    /// The natural representation of the current numeric value.
    pub fn number_type(&self) -> Option<NumberType> {
        self.numbers.ntype
    }

    pub fn to_i32(&mut self) -> Result<i32> {
        self.require_number()?;
        self.numbers.to_i32()
    }

    pub fn to_i64(&mut self) -> Result<i64> {
        self.require_number()?;
        self.numbers.to_i64()
    }

    pub fn to_big_int(&mut self) -> Result<BigInt> {
        self.require_number()?;
        self.numbers.to_big_int()
    }

    pub fn to_f32(&mut self) -> Result<f32> {
        self.require_number()?;
        self.numbers.to_f32()
    }

    pub fn to_f64(&mut self) -> Result<f64> {
        self.require_number()?;
        self.numbers.to_f64()
    }

    pub fn to_big_decimal(&mut self) -> Result<BigDecimal> {
        self.require_number()?;
        self.numbers.to_big_decimal()
    }

    fn require_number(&self) -> Result<()> {
        if self.numbers.ntype.is_none() {
            return Err(CodecError::unsupported("current event is not numeric"));
        }
        Ok(())
    }

    // ---- event decoding ----------------------------------------------------

    fn close_container(&mut self) -> Event {
        let ev = match self.context.leave() {
            Container::Array => Event::EndArray,
            Container::Object => Event::EndObject,
            Container::Root => unreachable!("root is never closed"),
        };
        self.current = Some(ev);
        ev
    }

    fn end_of_input(&mut self) {
        self.current = None;
        self.input.close(self.options.auto_close_source);
        self.closed = true;
    }

    fn decode_value(&mut self, first: u8) -> Result<Event> {
        let mut byte = first;
        loop {
            let major = byte >> 5;
            let info = byte & 0x1f;
            let ev = match major {
                MAJOR_POS => {
                    let v = self.read_uint(info)?;
                    self.context.note_value();
                    self.int_from_u64(v)
                }
                MAJOR_NEG => {
                    let m = self.read_uint(info)?;
                    self.context.note_value();
                    self.int_from_negative(m)
                }
                MAJOR_BYTES => {
                    let len = self.read_len(info)?;
                    self.check_len(len)?;
                    self.context.note_value();
                    self.payload = Payload::PendingBytes(len);
                    Event::Bytes
                }
                MAJOR_STR => {
                    let len = self.read_len(info)?;
                    self.check_len(len)?;
                    self.context.note_value();
                    self.payload = Payload::PendingText(len);
                    Event::Text
                }
                MAJOR_ARRAY => {
                    let len = self.read_len(info)?;
                    self.check_len(len)?;
                    self.context.note_value();
                    self.context.enter_array(len);
                    Event::StartArray
                }
                MAJOR_DICT => {
                    let len = self.read_len(info)?;
                    self.check_len(len)?;
                    self.context.note_value();
                    self.context.enter_object(len);
                    Event::StartObject
                }
                MAJOR_TAG => {
                    let tag = self.read_uint(info)?;
                    self.tags.push(tag);
                    let typed = match tag {
                        TAG_BIGNUM_POS => self.try_decode_bignum(false)?,
                        TAG_BIGNUM_NEG => self.try_decode_bignum(true)?,
                        TAG_BIGDECIMAL => self.try_decode_decimal()?,
                        _ => None,
                    };
                    match typed {
                        Some(ev) => ev,
                        None => {
                            // tags are transparent: note it, read on
                            byte = self.input.next()?;
                            continue;
                        }
                    }
                }
                MAJOR_LIT => self.decode_simple(info)?,
                _ => unreachable!("major type is three bits"),
            };
            return Ok(ev);
        }
    }

    fn decode_simple(&mut self, info: u8) -> Result<Event> {
        let ev = match info {
            LIT_FALSE => Event::Bool(false),
            LIT_TRUE => Event::Bool(true),
            LIT_NULL => Event::Null,
            LIT_FLOAT16 => {
                self.input.ensure(2)?;
                let w = self.input.window(2);
                let bits = u16::from_be_bytes([w[0], w[1]]);
                self.input.consume(2);
                self.numbers.set_f32(half::f16::from_bits(bits).to_f32());
                Event::Float
            }
            LIT_FLOAT32 => {
                self.input.ensure(4)?;
                let w = self.input.window(4);
                let bits = u32::from_be_bytes([w[0], w[1], w[2], w[3]]);
                self.input.consume(4);
                self.numbers.set_f32(f32::from_bits(bits));
                Event::Float
            }
            LIT_FLOAT64 => {
                self.input.ensure(8)?;
                let w = self.input.window(8);
                let bits = u64::from_be_bytes([w[0], w[1], w[2], w[3], w[4], w[5], w[6], w[7]]);
                self.input.consume(8);
                self.numbers.set_f64(f64::from_bits(bits));
                Event::Float
            }
            _ => {
                return Err(CodecError::malformed(format!(
                    "invalid additional info {} for major type 7",
                    info
                ))
                .at(self.input.position().saturating_sub(1)))
            }
        };
        self.context.note_value();
        Ok(ev)
    }

    fn int_from_u64(&mut self, value: u64) -> Event {
        match i64::try_from(value) {
            Ok(v) => self.numbers.set_i64(v),
            Err(_) => self.numbers.set_big_int(BigInt::from_u64(value)),
        }
        Event::Int
    }

    fn int_from_negative(&mut self, magnitude: u64) -> Event {
        // represented value is -1 - magnitude
        match i64::try_from(magnitude) {
            Ok(m) => self.numbers.set_i64(-1 - m),
            Err(_) => self
                .numbers
                .set_big_int(BigInt::from_be_bytes(true, &magnitude.to_be_bytes())),
        }
        Event::Int
    }

    /// Typed decoding for bignum tags 2/3; `None` falls back to treating
    /// the tag as transparent when the payload is not a definite byte
    /// string.
    fn try_decode_bignum(&mut self, negative: bool) -> Result<Option<Event>> {
        let byte = self.input.peek()?;
        if byte >> 5 != MAJOR_BYTES || byte & 0x1f == INDEFINITE_SIZE {
            return Ok(None);
        }
        self.input.next()?;
        let len = self.read_uint(byte & 0x1f)?;
        self.check_len(Some(len))?;
        self.bytes.clear();
        self.read_bytes_payload(len)?;
        self.numbers
            .set_big_int(BigInt::from_be_bytes(negative, &self.bytes));
        self.context.note_value();
        Ok(Some(Event::Int))
    }

    /// Typed decoding for the decimal-fraction tag 4: a 2-element array of
    /// exponent and mantissa.
    fn try_decode_decimal(&mut self) -> Result<Option<Event>> {
        if self.input.peek()? != initial(MAJOR_ARRAY, 2) {
            return Ok(None);
        }
        self.input.next()?;
        let exponent = self.decode_decimal_int("decimal fraction exponent")?;
        let scale = exponent
            .checked_neg()
            .ok_or_else(|| CodecError::overflow("decimal fraction exponent out of range"))?;
        let unscaled = self.decode_decimal_mantissa()?;
        self.numbers.set_decimal(BigDecimal::new(scale, unscaled));
        self.context.note_value();
        Ok(Some(Event::Float))
    }

    fn decode_decimal_int(&mut self, what: &'static str) -> Result<i64> {
        let pos = self.input.position();
        let byte = self.input.next()?;
        let info = byte & 0x1f;
        match byte >> 5 {
            MAJOR_POS => {
                let v = self.read_uint(info)?;
                i64::try_from(v).map_err(|_| CodecError::overflow(format!("{} out of range", what)))
            }
            MAJOR_NEG => {
                let m = self.read_uint(info)?;
                let v = i64::try_from(m)
                    .map_err(|_| CodecError::overflow(format!("{} out of range", what)))?;
                Ok(-1 - v)
            }
            _ => Err(CodecError::malformed(format!("{} must be an integer", what)).at(pos)),
        }
    }

    fn decode_decimal_mantissa(&mut self) -> Result<BigInt> {
        let pos = self.input.position();
        let byte = self.input.next()?;
        let info = byte & 0x1f;
        match byte >> 5 {
            MAJOR_POS => {
                let v = self.read_uint(info)?;
                Ok(BigInt::from_u64(v))
            }
            MAJOR_NEG => {
                let m = self.read_uint(info)?;
                Ok(BigInt::from_be_bytes(true, &m.to_be_bytes()))
            }
            MAJOR_TAG => {
                let tag = self.read_uint(info)?;
                if tag != TAG_BIGNUM_POS && tag != TAG_BIGNUM_NEG {
                    return Err(CodecError::malformed(
                        "decimal fraction mantissa must be an integer or bignum",
                    )
                    .at(pos));
                }
                let inner_pos = self.input.position();
                let inner = self.input.next()?;
                if inner >> 5 != MAJOR_BYTES || inner & 0x1f == INDEFINITE_SIZE {
                    return Err(CodecError::malformed(
                        "bignum tag must be followed by a definite byte string",
                    )
                    .at(inner_pos));
                }
                let len = self.read_uint(inner & 0x1f)?;
                self.check_len(Some(len))?;
                self.bytes.clear();
                self.read_bytes_payload(len)?;
                Ok(BigInt::from_be_bytes(tag == TAG_BIGNUM_NEG, &self.bytes))
            }
            _ => Err(CodecError::malformed(
                "decimal fraction mantissa must be an integer or bignum",
            )
            .at(pos)),
        }
    }

    // ---- field names -------------------------------------------------------

    fn decode_name(&mut self, first: u8) -> Result<()> {
        let major = first >> 5;
        let info = first & 0x1f;
        let name: Arc<str> = match major {
            // text keys are canonical; byte-string keys occur in the wild
            // and are decoded the same way
            MAJOR_STR | MAJOR_BYTES => match self.read_len(info)? {
                Some(len) => {
                    self.check_len(Some(len))?;
                    self.decode_definite_name(len)?
                }
                None => {
                    self.text.clear();
                    self.read_text_chunks(major)?;
                    Arc::from(self.text.as_str())
                }
            },
            MAJOR_POS => {
                let v = self.read_uint(info)?;
                Arc::from(v.to_string())
            }
            MAJOR_NEG => {
                let m = self.read_uint(info)?;
                Arc::from((-1 - i128::from(m)).to_string())
            }
            _ => {
                return Err(CodecError::malformed(format!(
                    "unsupported major type {} for object key",
                    major
                ))
                .at(self.input.position().saturating_sub(1)))
            }
        };
        self.context.note_name(name)
    }

    fn decode_definite_name(&mut self, len: u64) -> Result<Arc<str>> {
        let len_usize = len as usize;
        if self.options.intern_field_names && len_usize <= MAX_INTERNED_LEN && self.input.fits(len)
        {
            self.input.ensure(len_usize)?;
            let quads = pack_quads(self.input.window(len_usize));
            // a table hit avoids UTF-8 work entirely
            if let Some(name) = self.symbols.find(&quads, len_usize) {
                self.input.consume(len_usize);
                return Ok(name);
            }
            self.text.clear();
            let pos = self.input.position();
            if let Err(off) = utf8::decode_slice(self.input.window(len_usize), &mut self.text) {
                return Err(
                    CodecError::malformed("invalid UTF-8 in field name").at(pos + off as u64)
                );
            }
            self.input.consume(len_usize);
            Ok(self.symbols.intern(&quads, len_usize, &self.text))
        } else {
            self.text.clear();
            self.read_text_payload(len)?;
            Ok(Arc::from(self.text.as_str()))
        }
    }

    // ---- lazy payloads -----------------------------------------------------

    /// Skip an unconsumed lazy payload before moving to the next event.
    fn finish_pending(&mut self) -> Result<()> {
        match self.payload {
            Payload::PendingText(len) => self.skip_payload(len, MAJOR_STR)?,
            Payload::PendingBytes(len) => self.skip_payload(len, MAJOR_BYTES)?,
            _ => {}
        }
        self.payload = Payload::None;
        Ok(())
    }

    fn skip_payload(&mut self, len: Option<u64>, major: u8) -> Result<()> {
        match len {
            Some(n) => self.input.skip(n),
            None => loop {
                let pos = self.input.position();
                let byte = self.input.next()?;
                if byte == STOP_BYTE {
                    return Ok(());
                }
                if byte >> 5 != major {
                    return Err(
                        CodecError::malformed("string chunk of mismatched major type").at(pos)
                    );
                }
                let n = self.read_uint(byte & 0x1f)?;
                self.input.skip(n)?;
            },
        }
    }

    fn materialize_text(&mut self) -> Result<()> {
        match self.payload {
            Payload::Text => Ok(()),
            Payload::PendingText(len) => {
                self.text.clear();
                match len {
                    Some(n) => self.read_text_payload(n)?,
                    None => self.read_text_chunks(MAJOR_STR)?,
                }
                self.payload = Payload::Text;
                Ok(())
            }
            _ => Err(CodecError::unsupported("text payload was already consumed")),
        }
    }

    fn materialize_bytes(&mut self) -> Result<()> {
        match self.payload {
            Payload::Bytes => Ok(()),
            Payload::PendingBytes(len) => {
                self.bytes.clear();
                match len {
                    Some(n) => self.read_bytes_payload(n)?,
                    None => loop {
                        let pos = self.input.position();
                        let byte = self.input.next()?;
                        if byte == STOP_BYTE {
                            break;
                        }
                        if byte >> 5 != MAJOR_BYTES {
                            return Err(CodecError::malformed(
                                "string chunk of mismatched major type",
                            )
                            .at(pos));
                        }
                        let n = self.read_uint(byte & 0x1f)?;
                        self.read_bytes_payload(n)?;
                    },
                }
                self.payload = Payload::Bytes;
                Ok(())
            }
            _ => Err(CodecError::unsupported("binary payload was already consumed")),
        }
    }

    /// Decode a definite-length text payload into the accumulator, in place
    /// when it fits the buffer and byte-by-byte otherwise.
    fn read_text_payload(&mut self, len: u64) -> Result<()> {
        if self.input.fits(len) {
            let len = len as usize;
            self.input.ensure(len)?;
            let pos = self.input.position();
            if let Err(off) = utf8::decode_slice(self.input.window(len), &mut self.text) {
                return Err(
                    CodecError::malformed("invalid UTF-8 in text string").at(pos + off as u64)
                );
            }
            self.input.consume(len);
            Ok(())
        } else {
            self.read_text_incremental(len)
        }
    }

    fn read_text_incremental(&mut self, len: u64) -> Result<()> {
        let mut remaining = len;
        while remaining > 0 {
            let pos = self.input.position();
            let byte = self.input.next()?;
            remaining -= 1;
            if byte < 0x80 {
                self.text.push(byte as char);
                continue;
            }
            let class = utf8::class_of(byte);
            if class < 1 || class as u64 > remaining {
                return Err(CodecError::malformed("invalid UTF-8 in text string").at(pos));
            }
            let mut cp = utf8::lead_bits(byte, class);
            for _ in 0..class {
                let cont = self.input.next()?;
                remaining -= 1;
                cp = utf8::continuation(cp, cont).ok_or_else(|| {
                    CodecError::malformed("invalid UTF-8 continuation byte").at(pos)
                })?;
            }
            let ch = utf8::finish(cp, class)
                .ok_or_else(|| CodecError::malformed("invalid UTF-8 in text string").at(pos))?;
            self.text.push(ch);
        }
        Ok(())
    }

    fn read_text_chunks(&mut self, major: u8) -> Result<()> {
        loop {
            let pos = self.input.position();
            let byte = self.input.next()?;
            if byte == STOP_BYTE {
                return Ok(());
            }
            if byte >> 5 != major {
                return Err(CodecError::malformed("string chunk of mismatched major type").at(pos));
            }
            let len = self.read_uint(byte & 0x1f)?;
            self.read_text_payload(len)?;
        }
    }

    fn read_bytes_payload(&mut self, len: u64) -> Result<()> {
        if self.input.fits(len) {
            let len = len as usize;
            self.input.ensure(len)?;
            self.bytes.extend_from_slice(self.input.window(len));
            self.input.consume(len);
            Ok(())
        } else {
            self.input.read_into(len, &mut self.bytes)
        }
    }

    // ---- headers -----------------------------------------------------------

    fn read_uint(&mut self, info: u8) -> Result<u64> {
        match info {
            0..=23 => Ok(u64::from(info)),
            INFO_U8 => self.input.next().map(u64::from),
            INFO_U16 => {
                self.input.ensure(2)?;
                let w = self.input.window(2);
                let v = u64::from(u16::from_be_bytes([w[0], w[1]]));
                self.input.consume(2);
                Ok(v)
            }
            INFO_U32 => {
                self.input.ensure(4)?;
                let w = self.input.window(4);
                let v = u64::from(u32::from_be_bytes([w[0], w[1], w[2], w[3]]));
                self.input.consume(4);
                Ok(v)
            }
            INFO_U64 => {
                self.input.ensure(8)?;
                let w = self.input.window(8);
                let v = u64::from_be_bytes([w[0], w[1], w[2], w[3], w[4], w[5], w[6], w[7]]);
                self.input.consume(8);
                Ok(v)
            }
            _ => Err(CodecError::malformed(format!(
                "invalid additional-information value {}",
                info
            ))
            .at(self.input.position().saturating_sub(1))),
        }
    }

    fn read_len(&mut self, info: u8) -> Result<Option<u64>> {
        if info == INDEFINITE_SIZE {
            Ok(None)
        } else {
            self.read_uint(info).map(Some)
        }
    }

    fn check_len(&self, len: Option<u64>) -> Result<()> {
        if let Some(n) = len {
            if n > i32::MAX as u64 {
                return Err(CodecError::overflow(format!(
                    "declared length {} exceeds the supported maximum",
                    n
                )));
            }
        }
        Ok(())
    }
}
