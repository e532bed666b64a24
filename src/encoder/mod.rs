use crate::{
    config::EncodeOptions,
    constants::*,
    context::{Container, WriteStack},
    error::{CodecError, Result},
    io::ByteOutput,
    value::{BigDecimal, BigInt},
};
use std::io::Write;

mod sizer;

pub use sizer::SizingEncoder;

/// The push-style consumer half of the event vocabulary.
///
/// Both [`Encoder`] and [`SizingEncoder`] implement this, so data-binding
/// layers and event pumps can target either without knowing whether the
/// output uses indefinite- or definite-length containers.
pub trait EventSink {
    fn write_start_array(&mut self) -> Result<()>;
    fn write_end_array(&mut self) -> Result<()>;
    fn write_start_object(&mut self) -> Result<()>;
    fn write_end_object(&mut self) -> Result<()>;
    fn write_field_name(&mut self, name: &str) -> Result<()>;
    fn write_str(&mut self, value: &str) -> Result<()>;
    fn write_bytes(&mut self, value: &[u8]) -> Result<()>;
    fn write_bool(&mut self, value: bool) -> Result<()>;
    fn write_null(&mut self) -> Result<()>;
    fn write_u64(&mut self, value: u64) -> Result<()>;
    fn write_i64(&mut self, value: i64) -> Result<()>;
    fn write_f32(&mut self, value: f32) -> Result<()>;
    fn write_f64(&mut self, value: f64) -> Result<()>;
    fn write_big_int(&mut self, value: &BigInt) -> Result<()>;
    fn write_big_decimal(&mut self, value: &BigDecimal) -> Result<()>;
    /// Prefix the next value with a CBOR tag.
    fn write_tag(&mut self, tag: u64) -> Result<()>;
}

/// Push-style CBOR encoder over a byte stream.
///
/// Containers are written with indefinite-length framing (`0x9F`/`0xBF` …
/// `0xFF`) unless opened through one of the `_sized` methods; every scalar
/// header uses the narrowest possible width. Wrap the encoder in a
/// [`SizingEncoder`] to always produce definite-length containers.
///
/// ```
/// use cbor_stream::{Encoder, EventSink};
///
/// let mut out = Vec::new();
/// let mut enc = Encoder::new(&mut out);
/// enc.write_start_array().unwrap();
/// enc.write_i64(1).unwrap();
/// enc.write_i64(2).unwrap();
/// enc.write_end_array().unwrap();
/// enc.close().unwrap();
/// drop(enc);
/// assert_eq!(out, vec![0x9f, 0x01, 0x02, 0xff]);
/// ```
pub struct Encoder<W> {
    out: ByteOutput<W>,
    context: WriteStack,
    options: EncodeOptions,
    closed: bool,
}

impl<W: Write> Encoder<W> {
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, EncodeOptions::default())
    }

    pub fn with_options(sink: W, options: EncodeOptions) -> Self {
        Self {
            out: ByteOutput::new(sink, options.buffer_size),
            context: WriteStack::new(false),
            options,
            closed: false,
        }
    }

    /// Duplicate field names within one object are rejected.
    pub fn with_duplicate_detection(sink: W, options: EncodeOptions) -> Self {
        Self {
            out: ByteOutput::new(sink, options.buffer_size),
            context: WriteStack::new(true),
            options,
            closed: false,
        }
    }

    /// Binary payloads are written natively, never base64-expanded.
    pub fn supports_binary_natively(&self) -> bool {
        true
    }

    /// Indentation makes no sense on a binary wire; requests are ignored.
    pub fn supports_pretty_printing(&self) -> bool {
        false
    }

    /// Nesting depth: 0 at root level.
    pub fn depth(&self) -> usize {
        self.context.depth()
    }

    pub(crate) fn auto_close_content(&self) -> bool {
        self.options.auto_close_content
    }

    /// Open an array with a declared element count. The matching
    /// [`write_end_array`](EventSink::write_end_array) verifies the count
    /// and emits no break byte.
    pub fn write_start_array_sized(&mut self, len: u64) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("an array")?;
        self.context.enter_array(Some(len));
        self.write_header(MAJOR_ARRAY, len)
    }

    /// Open an object with a declared entry (pair) count; see
    /// [`write_start_array_sized`](Self::write_start_array_sized).
    pub fn write_start_object_sized(&mut self, len: u64) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("an object")?;
        self.context.enter_object(Some(len));
        self.write_header(MAJOR_DICT, len)
    }

    /// Raw text pass-through is not expressible in CBOR.
    pub fn write_raw(&mut self, _text: &str) -> Result<()> {
        Err(CodecError::unsupported("raw text pass-through"))
    }

    /// Drain the owned buffer; the flush reaches the underlying stream when
    /// `flush_passed_to_stream` is set.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush(self.options.flush_passed_to_stream)
    }

    /// Flush and release the encoder.
    ///
    /// With `auto_close_content` set, still-open containers are terminated
    /// first; otherwise leaving a container open is an error. The sink is
    /// dropped when `auto_close_target` is set.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.options.auto_close_content {
            while !self.context.at_root() {
                match self.context.kind() {
                    Container::Array => self.write_end_array()?,
                    Container::Object => self.write_end_object()?,
                    Container::Root => unreachable!("root is not a container"),
                }
            }
        } else if !self.context.at_root() {
            return Err(CodecError::write_violation(
                "cannot close the encoder with open containers",
            ));
        }
        self.out.flush(self.options.flush_passed_to_stream)?;
        self.out.close(self.options.auto_close_target);
        self.closed = true;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed || self.out.is_closed() {
            return Err(CodecError::write_violation("encoder is closed"));
        }
        Ok(())
    }

    /// Emit a major-type header with the minimal-width length encoding.
    fn write_header(&mut self, major: u8, value: u64) -> Result<()> {
        self.out.ensure_room(9)?;
        if value < 24 {
            self.out.write_byte(initial(major, value as u8))?;
        } else if value < 0x100 {
            self.out.write_byte(initial(major, INFO_U8))?;
            self.out.write_byte(value as u8)?;
        } else if value < 0x1_0000 {
            self.out.write_byte(initial(major, INFO_U16))?;
            self.out.write_slice(&(value as u16).to_be_bytes())?;
        } else if value < 0x1_0000_0000 {
            self.out.write_byte(initial(major, INFO_U32))?;
            self.out.write_slice(&(value as u32).to_be_bytes())?;
        } else {
            self.out.write_byte(initial(major, INFO_U64))?;
            self.out.write_slice(&value.to_be_bytes())?;
        }
        Ok(())
    }

    fn write_int_headers(&mut self, value: i64) -> Result<()> {
        if value < 0 {
            self.write_header(MAJOR_NEG, (-1 - value) as u64)
        } else {
            self.write_header(MAJOR_POS, value as u64)
        }
    }

    /// Big integers whose magnitude fits 8 bytes collapse to plain
    /// integers; larger ones go out as tag 2/3 plus their magnitude.
    fn write_big_int_value(&mut self, value: &BigInt) -> Result<()> {
        let magnitude = value.magnitude();
        if magnitude.len() <= 8 {
            let mut be = [0u8; 8];
            be[8 - magnitude.len()..].copy_from_slice(magnitude);
            let m = u64::from_be_bytes(be);
            if value.inverted() {
                self.write_header(MAJOR_NEG, m)
            } else {
                self.write_header(MAJOR_POS, m)
            }
        } else {
            let tag = if value.inverted() {
                TAG_BIGNUM_NEG
            } else {
                TAG_BIGNUM_POS
            };
            self.write_header(MAJOR_TAG, tag)?;
            self.write_header(MAJOR_BYTES, magnitude.len() as u64)?;
            self.out.write_slice(magnitude)
        }
    }
}

impl<W: Write> EventSink for Encoder<W> {
    fn write_start_array(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("an array")?;
        self.context.enter_array(None);
        self.out.ensure_room(1)?;
        self.out.write_byte(initial(MAJOR_ARRAY, INDEFINITE_SIZE))
    }

    fn write_end_array(&mut self) -> Result<()> {
        self.ensure_open()?;
        let sized = self.context.is_sized();
        self.context.leave(Container::Array)?;
        if !sized {
            self.out.ensure_room(1)?;
            self.out.write_byte(STOP_BYTE)?;
        }
        Ok(())
    }

    fn write_start_object(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("an object")?;
        self.context.enter_object(None);
        self.out.ensure_room(1)?;
        self.out.write_byte(initial(MAJOR_DICT, INDEFINITE_SIZE))
    }

    fn write_end_object(&mut self) -> Result<()> {
        self.ensure_open()?;
        let sized = self.context.is_sized();
        self.context.leave(Container::Object)?;
        if !sized {
            self.out.ensure_room(1)?;
            self.out.write_byte(STOP_BYTE)?;
        }
        Ok(())
    }

    fn write_field_name(&mut self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_name(name)?;
        self.write_header(MAJOR_STR, name.len() as u64)?;
        self.out.write_slice(name.as_bytes())
    }

    fn write_str(&mut self, value: &str) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("a string")?;
        self.write_header(MAJOR_STR, value.len() as u64)?;
        self.out.write_slice(value.as_bytes())
    }

    fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("a byte string")?;
        self.write_header(MAJOR_BYTES, value.len() as u64)?;
        self.out.write_slice(value)
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("a boolean")?;
        self.out.ensure_room(1)?;
        self.out
            .write_byte(initial(MAJOR_LIT, if value { LIT_TRUE } else { LIT_FALSE }))
    }

    fn write_null(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("a null")?;
        self.out.ensure_room(1)?;
        self.out.write_byte(initial(MAJOR_LIT, LIT_NULL))
    }

    fn write_u64(&mut self, value: u64) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("an integer")?;
        self.write_header(MAJOR_POS, value)
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("an integer")?;
        self.write_int_headers(value)
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("a float")?;
        self.out.ensure_room(5)?;
        self.out.write_byte(initial(MAJOR_LIT, LIT_FLOAT32))?;
        self.out.write_slice(&value.to_bits().to_be_bytes())
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("a float")?;
        self.out.ensure_room(9)?;
        self.out.write_byte(initial(MAJOR_LIT, LIT_FLOAT64))?;
        self.out.write_slice(&value.to_bits().to_be_bytes())
    }

    fn write_big_int(&mut self, value: &BigInt) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("an integer")?;
        self.write_big_int_value(value)
    }

    fn write_big_decimal(&mut self, value: &BigDecimal) -> Result<()> {
        self.ensure_open()?;
        self.context.verify_value("a decimal")?;
        self.write_header(MAJOR_TAG, TAG_BIGDECIMAL)?;
        self.write_header(MAJOR_ARRAY, 2)?;
        let exponent = -i128::from(value.scale());
        if exponent < 0 {
            self.write_header(MAJOR_NEG, (-1 - exponent) as u64)?;
        } else {
            self.write_header(MAJOR_POS, exponent as u64)?;
        }
        match value.unscaled().to_i64() {
            Some(v) => self.write_int_headers(v),
            None => self.write_big_int_value(value.unscaled()),
        }
    }

    fn write_tag(&mut self, tag: u64) -> Result<()> {
        self.ensure_open()?;
        self.write_header(MAJOR_TAG, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(f: impl FnOnce(&mut Encoder<&mut Vec<u8>>)) -> Vec<u8> {
        let mut out = Vec::new();
        let mut enc = Encoder::new(&mut out);
        f(&mut enc);
        enc.close().unwrap();
        drop(enc);
        out
    }

    #[test]
    fn scalar_wire_bytes() {
        assert_eq!(encoded(|e| e.write_bool(true).unwrap()), vec![0xf5]);
        assert_eq!(encoded(|e| e.write_bool(false).unwrap()), vec![0xf4]);
        assert_eq!(encoded(|e| e.write_null().unwrap()), vec![0xf6]);
        assert_eq!(encoded(|e| e.write_i64(0).unwrap()), vec![0x00]);
        assert_eq!(encoded(|e| e.write_i64(23).unwrap()), vec![0x17]);
        assert_eq!(encoded(|e| e.write_i64(24).unwrap()), vec![0x18, 0x18]);
        assert_eq!(encoded(|e| e.write_i64(-1).unwrap()), vec![0x20]);
        assert_eq!(encoded(|e| e.write_i64(-256).unwrap()), vec![0x38, 0xff]);
        assert_eq!(
            encoded(|e| e.write_i64(0xfedc).unwrap()),
            vec![0x19, 0xfe, 0xdc]
        );
        assert_eq!(
            encoded(|e| e.write_f32(1.25).unwrap()),
            vec![0xfa, 0x3f, 0xa0, 0x00, 0x00]
        );
        assert_eq!(
            encoded(|e| e.write_f64(0.75).unwrap()),
            vec![0xfb, 0x3f, 0xe8, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(encoded(|e| e.write_str("").unwrap()), vec![0x60]);
        assert_eq!(
            encoded(|e| e.write_str("abc").unwrap()),
            vec![0x63, b'a', b'b', b'c']
        );
    }

    #[test]
    fn minimal_header_widths() {
        assert_eq!(encoded(|e| e.write_u64(0xff).unwrap()), vec![0x18, 0xff]);
        assert_eq!(
            encoded(|e| e.write_u64(0x100).unwrap()),
            vec![0x19, 0x01, 0x00]
        );
        assert_eq!(
            encoded(|e| e.write_u64(0x1_0000).unwrap()),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            encoded(|e| e.write_u64(0x1_0000_0000).unwrap()),
            vec![0x1b, 0, 0, 0, 1, 0, 0, 0, 0]
        );
        // a 255-byte string needs the 1-byte length header
        let long = "x".repeat(255);
        let bytes = encoded(|e| e.write_str(&long).unwrap());
        assert_eq!(&bytes[..2], &[0x78, 0xff]);
        assert_eq!(bytes.len(), 257);
    }

    #[test]
    fn indefinite_containers_by_default() {
        assert_eq!(
            encoded(|e| {
                e.write_start_array().unwrap();
                e.write_end_array().unwrap();
            }),
            vec![0x9f, 0xff]
        );
        assert_eq!(
            encoded(|e| {
                e.write_start_object().unwrap();
                e.write_end_object().unwrap();
            }),
            vec![0xbf, 0xff]
        );
    }

    #[test]
    fn sized_containers_emit_definite_headers() {
        assert_eq!(
            encoded(|e| {
                e.write_start_array_sized(3).unwrap();
                e.write_i64(1).unwrap();
                e.write_i64(2).unwrap();
                e.write_i64(3).unwrap();
                e.write_end_array().unwrap();
            }),
            vec![0x83, 1, 2, 3]
        );

        let mut out = Vec::new();
        let mut enc = Encoder::new(&mut out);
        enc.write_start_array_sized(2).unwrap();
        enc.write_i64(1).unwrap();
        assert!(enc.write_end_array().is_err());
    }

    #[test]
    fn objects_enforce_name_value_alternation() {
        let mut out = Vec::new();
        let mut enc = Encoder::new(&mut out);
        enc.write_start_object().unwrap();
        assert!(enc.write_i64(1).is_err());
        enc.write_field_name("a").unwrap();
        assert!(enc.write_field_name("b").is_err());
        enc.write_i64(1).unwrap();
        enc.write_end_object().unwrap();
        enc.close().unwrap();
        drop(enc);
        assert_eq!(out, vec![0xbf, 0x61, b'a', 0x01, 0xff]);
    }

    #[test]
    fn duplicate_names_rejected_when_enabled() {
        let mut out = Vec::new();
        let mut enc = Encoder::with_duplicate_detection(&mut out, EncodeOptions::default());
        enc.write_start_object().unwrap();
        enc.write_field_name("a").unwrap();
        enc.write_i64(1).unwrap();
        assert!(enc.write_field_name("a").is_err());
    }

    #[test]
    fn self_describe_interop() {
        assert_eq!(
            encoded(|e| {
                e.write_tag(TAG_SELF_DESCRIBE).unwrap();
                e.write_bool(true).unwrap();
            }),
            vec![0xd9, 0xd9, 0xf7, 0xf5]
        );
    }

    #[test]
    fn bignum_framing() {
        // magnitude 1 as a bignum: tag 2 + single byte
        let one = BigInt::from_be_bytes(false, &[1]);
        assert_eq!(
            encoded(|e| {
                e.write_tag(TAG_BIGNUM_POS).unwrap();
                e.write_bytes(one.magnitude()).unwrap();
            }),
            vec![0xc2, 0x41, 0x01]
        );
        // write_big_int collapses small magnitudes to plain integers
        assert_eq!(
            encoded(|e| e.write_big_int(&BigInt::from_i64(42)).unwrap()),
            vec![0x18, 42]
        );
        assert_eq!(
            encoded(|e| e.write_big_int(&BigInt::from_i64(-42)).unwrap()),
            vec![0x38, 41]
        );
        // nine magnitude bytes force the tagged form
        let big = BigInt::from_be_bytes(false, &[1, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            encoded(|e| e.write_big_int(&big).unwrap()),
            vec![0xc2, 0x49, 1, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn big_decimal_framing() {
        // 2.5 == 4([-1, 25])
        let d = BigDecimal::new(1, BigInt::from_i64(25));
        assert_eq!(
            encoded(|e| e.write_big_decimal(&d).unwrap()),
            vec![0xc4, 0x82, 0x20, 0x18, 0x19]
        );
    }

    #[test]
    fn close_with_open_containers() {
        let mut out = Vec::new();
        let mut enc = Encoder::new(&mut out);
        enc.write_start_array().unwrap();
        assert!(enc.close().is_err());

        let mut out = Vec::new();
        let mut enc = Encoder::with_options(
            &mut out,
            EncodeOptions::default().with_auto_close_content(true),
        );
        enc.write_start_array().unwrap();
        enc.write_start_object().unwrap();
        enc.close().unwrap();
        drop(enc);
        assert_eq!(out, vec![0x9f, 0xbf, 0xff, 0xff]);
    }

    #[test]
    fn raw_text_is_unsupported() {
        let mut out = Vec::new();
        let mut enc = Encoder::new(&mut out);
        assert!(matches!(
            enc.write_raw("nope").unwrap_err().kind(),
            crate::ErrorKind::Unsupported(_)
        ));
    }

    #[test]
    fn writes_after_close_rejected() {
        let mut enc = Encoder::new(Vec::new());
        enc.close().unwrap();
        assert!(enc.write_null().is_err());
    }
}
