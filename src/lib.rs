#![doc = include_str!("../README.md")]

mod config;
pub mod constants;
mod context;
mod decoder;
mod detect;
mod encoder;
mod error;
mod event;
mod io;
mod symbols;
pub mod value;

#[cfg(test)]
mod tests;

pub use config::{DecodeOptions, EncodeOptions};
pub use decoder::Decoder;
pub use detect::{format_match, FormatMatch};
pub use encoder::{Encoder, EventSink, SizingEncoder};
pub use error::{CodecError, ErrorKind, Result};
pub use event::{Event, NumberType};
pub use symbols::{SymbolTable, Symbols};
pub use value::{BigDecimal, BigInt};

use std::io::Read;

/// Pump all remaining events of a decoder into an event sink.
///
/// Numeric values are forwarded at their natural width, so the receiving
/// encoder reproduces the promotion-relevant shape of the input; text and
/// binary payloads are materialised as they are copied. Combined with a
/// [`SizingEncoder`] this re-encodes any document with definite-length
/// containers:
///
/// ```
/// use cbor_stream::{copy_events, Decoder, Encoder, SizingEncoder};
///
/// let input = [0x9fu8, 0x01, 0x02, 0x03, 0xff]; // [_ 1, 2, 3]
/// let mut out = Vec::new();
/// let mut dec = Decoder::new(&input[..]);
/// let mut enc = SizingEncoder::new(Encoder::new(&mut out));
/// copy_events(&mut dec, &mut enc).unwrap();
/// enc.close().unwrap();
/// drop(enc);
/// assert_eq!(out, vec![0x83, 0x01, 0x02, 0x03]);
/// ```
pub fn copy_events<R: Read, S: EventSink>(decoder: &mut Decoder<R>, sink: &mut S) -> Result<()> {
    while let Some(ev) = decoder.next_event()? {
        match ev {
            Event::StartArray => sink.write_start_array()?,
            Event::EndArray => sink.write_end_array()?,
            Event::StartObject => sink.write_start_object()?,
            Event::EndObject => sink.write_end_object()?,
            Event::FieldName => sink.write_field_name(decoder.text()?)?,
            Event::Text => sink.write_str(decoder.text()?)?,
            Event::Bytes => sink.write_bytes(decoder.binary()?)?,
            Event::Int => match decoder.number_type() {
                Some(NumberType::BigInt) => sink.write_big_int(&decoder.to_big_int()?)?,
                _ => sink.write_i64(decoder.to_i64()?)?,
            },
            Event::Float => match decoder.number_type() {
                Some(NumberType::BigDecimal) => {
                    sink.write_big_decimal(&decoder.to_big_decimal()?)?
                }
                Some(NumberType::F32) => sink.write_f32(decoder.to_f32()?)?,
                _ => sink.write_f64(decoder.to_f64()?)?,
            },
            Event::Bool(b) => sink.write_bool(b)?,
            Event::Null => sink.write_null()?,
        }
    }
    Ok(())
}
