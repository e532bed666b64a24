use super::{Encoder, EventSink};
use crate::{
    context::{Container, WriteStack},
    error::{CodecError, Result},
    value::{BigDecimal, BigInt},
};
use smallvec::SmallVec;
use std::io::Write;

/// Small-string-optimised payload copy for deferred events.
type Chunk = SmallVec<[u8; 24]>;

/// One buffered encoder call, replayed once the enclosing container's
/// element count is known. Scalars live on the stack (or inline up to 24
/// bytes for strings); a closed child container becomes a single nested
/// run.
enum DeferredEvent {
    FieldName(Chunk),
    Text(Chunk),
    Bytes(Chunk),
    UInt(u64),
    Int(i64),
    Big(BigInt),
    F32(f32),
    F64(f64),
    Decimal(BigDecimal),
    Bool(bool),
    Null,
    Tag(u64),
    Array(Vec<DeferredEvent>),
    Object(Vec<DeferredEvent>),
}

impl DeferredEvent {
    /// Tags prefix their value and do not count as container elements.
    fn counts_as_element(&self) -> bool {
        !matches!(self, DeferredEvent::Tag(_))
    }
}

fn element_count(events: &[DeferredEvent]) -> u64 {
    events.iter().filter(|e| e.counts_as_element()).count() as u64
}

/// Wrapper around [`Encoder`] that produces definite-length containers.
///
/// While any container is open, events are buffered in a queue per
/// container level; when a container closes, its queue is folded into the
/// parent as a single run. Once the outermost container closes, the whole
/// tree is replayed through the underlying encoder using sized container
/// openers, which yields exactly the bytes a one-pass definite-length
/// encoder would have produced.
///
/// The price is memory proportional to the event count of the largest
/// enclosing container; root-level scalars pass straight through.
pub struct SizingEncoder<W> {
    inner: Encoder<W>,
    queues: Vec<Vec<DeferredEvent>>,
    context: WriteStack,
}

impl<W: Write> SizingEncoder<W> {
    pub fn new(inner: Encoder<W>) -> Self {
        Self {
            inner,
            queues: Vec::new(),
            context: WriteStack::new(false),
        }
    }

    /// Nesting depth: 0 at root level.
    pub fn depth(&self) -> usize {
        self.context.depth()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    /// Flush and release the underlying encoder. With `auto_close_content`
    /// set on the inner encoder's options, open containers are closed (and
    /// thereby replayed) first.
    pub fn close(&mut self) -> Result<()> {
        if self.inner.auto_close_content() {
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
        self.inner.close()
    }

    /// Recover the wrapped encoder, failing while containers are open.
    pub fn into_inner(self) -> Result<Encoder<W>> {
        if !self.queues.is_empty() {
            return Err(CodecError::write_violation(
                "cannot unwrap the sizer with open containers",
            ));
        }
        Ok(self.inner)
    }

    fn buffering(&self) -> bool {
        !self.queues.is_empty()
    }

    fn push(&mut self, event: DeferredEvent) {
        self.queues
            .last_mut()
            .expect("push is only called while buffering")
            .push(event);
    }

    /// Fold the closed container's queue into its parent, or replay it
    /// against the underlying encoder when it was the outermost one.
    fn fold(&mut self, run: DeferredEvent) -> Result<()> {
        match self.queues.last_mut() {
            Some(parent) => {
                parent.push(run);
                Ok(())
            }
            None => self.replay(&run),
        }
    }

    fn replay(&mut self, event: &DeferredEvent) -> Result<()> {
        match event {
            DeferredEvent::FieldName(name) => self.inner.write_field_name(chunk_str(name)),
            DeferredEvent::Text(text) => self.inner.write_str(chunk_str(text)),
            DeferredEvent::Bytes(bytes) => self.inner.write_bytes(bytes),
            DeferredEvent::UInt(v) => self.inner.write_u64(*v),
            DeferredEvent::Int(v) => self.inner.write_i64(*v),
            DeferredEvent::Big(v) => self.inner.write_big_int(v),
            DeferredEvent::F32(v) => self.inner.write_f32(*v),
            DeferredEvent::F64(v) => self.inner.write_f64(*v),
            DeferredEvent::Decimal(v) => self.inner.write_big_decimal(v),
            DeferredEvent::Bool(v) => self.inner.write_bool(*v),
            DeferredEvent::Null => self.inner.write_null(),
            DeferredEvent::Tag(v) => self.inner.write_tag(*v),
            DeferredEvent::Array(events) => {
                self.inner.write_start_array_sized(element_count(events))?;
                for e in events {
                    self.replay(e)?;
                }
                self.inner.write_end_array()
            }
            DeferredEvent::Object(events) => {
                self.inner
                    .write_start_object_sized(element_count(events) / 2)?;
                for e in events {
                    self.replay(e)?;
                }
                self.inner.write_end_object()
            }
        }
    }
}

/// The bytes were copied from a `&str`, so they are valid UTF-8.
fn chunk_str(chunk: &Chunk) -> &str {
    unsafe { std::str::from_utf8_unchecked(chunk) }
}

impl<W: Write> EventSink for SizingEncoder<W> {
    fn write_start_array(&mut self) -> Result<()> {
        self.context.verify_value("an array")?;
        self.context.enter_array(None);
        self.queues.push(Vec::new());
        Ok(())
    }

    fn write_end_array(&mut self) -> Result<()> {
        self.context.leave(Container::Array)?;
        let events = self.queues.pop().expect("context and queues in lockstep");
        self.fold(DeferredEvent::Array(events))
    }

    fn write_start_object(&mut self) -> Result<()> {
        self.context.verify_value("an object")?;
        self.context.enter_object(None);
        self.queues.push(Vec::new());
        Ok(())
    }

    fn write_end_object(&mut self) -> Result<()> {
        self.context.leave(Container::Object)?;
        let events = self.queues.pop().expect("context and queues in lockstep");
        self.fold(DeferredEvent::Object(events))
    }

    fn write_field_name(&mut self, name: &str) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_field_name(name);
        }
        self.context.verify_name(name)?;
        self.push(DeferredEvent::FieldName(Chunk::from_slice(name.as_bytes())));
        Ok(())
    }

    fn write_str(&mut self, value: &str) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_str(value);
        }
        self.context.verify_value("a string")?;
        self.push(DeferredEvent::Text(Chunk::from_slice(value.as_bytes())));
        Ok(())
    }

    fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_bytes(value);
        }
        self.context.verify_value("a byte string")?;
        self.push(DeferredEvent::Bytes(Chunk::from_slice(value)));
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_bool(value);
        }
        self.context.verify_value("a boolean")?;
        self.push(DeferredEvent::Bool(value));
        Ok(())
    }

    fn write_null(&mut self) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_null();
        }
        self.context.verify_value("a null")?;
        self.push(DeferredEvent::Null);
        Ok(())
    }

    fn write_u64(&mut self, value: u64) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_u64(value);
        }
        self.context.verify_value("an integer")?;
        self.push(DeferredEvent::UInt(value));
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_i64(value);
        }
        self.context.verify_value("an integer")?;
        self.push(DeferredEvent::Int(value));
        Ok(())
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_f32(value);
        }
        self.context.verify_value("a float")?;
        self.push(DeferredEvent::F32(value));
        Ok(())
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_f64(value);
        }
        self.context.verify_value("a float")?;
        self.push(DeferredEvent::F64(value));
        Ok(())
    }

    fn write_big_int(&mut self, value: &BigInt) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_big_int(value);
        }
        self.context.verify_value("an integer")?;
        self.push(DeferredEvent::Big(value.clone()));
        Ok(())
    }

    fn write_big_decimal(&mut self, value: &BigDecimal) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_big_decimal(value);
        }
        self.context.verify_value("a decimal")?;
        self.push(DeferredEvent::Decimal(value.clone()));
        Ok(())
    }

    fn write_tag(&mut self, tag: u64) -> Result<()> {
        if !self.buffering() {
            return self.inner.write_tag(tag);
        }
        self.push(DeferredEvent::Tag(tag));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncodeOptions;

    fn sized(f: impl FnOnce(&mut SizingEncoder<&mut Vec<u8>>)) -> Vec<u8> {
        let mut out = Vec::new();
        let mut enc = SizingEncoder::new(Encoder::new(&mut out));
        f(&mut enc);
        enc.close().unwrap();
        drop(enc);
        out
    }

    #[test]
    fn small_array() {
        assert_eq!(
            sized(|e| {
                e.write_start_array().unwrap();
                e.write_i64(1).unwrap();
                e.write_i64(2).unwrap();
                e.write_i64(3).unwrap();
                e.write_end_array().unwrap();
            }),
            vec![0x83, 1, 2, 3]
        );
    }

    #[test]
    fn array_of_32_elements_gets_wide_header() {
        let out = sized(|e| {
            e.write_start_array().unwrap();
            for i in 0..32 {
                e.write_i64(i).unwrap();
            }
            e.write_end_array().unwrap();
        });
        assert_eq!(&out[..2], &[0x98, 0x20]);
        assert_ne!(out[0], 0x9f);
    }

    #[test]
    fn nested_containers() {
        // {"a": [1, {"b": 2}], "c": 3}
        let out = sized(|e| {
            e.write_start_object().unwrap();
            e.write_field_name("a").unwrap();
            e.write_start_array().unwrap();
            e.write_i64(1).unwrap();
            e.write_start_object().unwrap();
            e.write_field_name("b").unwrap();
            e.write_i64(2).unwrap();
            e.write_end_object().unwrap();
            e.write_end_array().unwrap();
            e.write_field_name("c").unwrap();
            e.write_i64(3).unwrap();
            e.write_end_object().unwrap();
        });
        assert_eq!(
            out,
            vec![
                0xa2, 0x61, b'a', 0x82, 0x01, 0xa1, 0x61, b'b', 0x02, 0x61, b'c', 0x03,
            ]
        );
    }

    #[test]
    fn root_scalars_pass_through() {
        assert_eq!(sized(|e| e.write_i64(7).unwrap()), vec![0x07]);
        assert_eq!(
            sized(|e| {
                e.write_tag(crate::constants::TAG_SELF_DESCRIBE).unwrap();
                e.write_bool(true).unwrap();
            }),
            vec![0xd9, 0xd9, 0xf7, 0xf5]
        );
    }

    #[test]
    fn tags_inside_containers_do_not_count() {
        // [2(h'01')] must declare one element
        let one = BigInt::from_be_bytes(false, &[1, 0, 0, 0, 0, 0, 0, 0, 0]);
        let out = sized(|e| {
            e.write_start_array().unwrap();
            e.write_big_int(&one).unwrap();
            e.write_end_array().unwrap();
        });
        assert_eq!(out[0], 0x81);
    }

    #[test]
    fn alternation_checked_while_buffering() {
        let mut out = Vec::new();
        let mut enc = SizingEncoder::new(Encoder::new(&mut out));
        enc.write_start_object().unwrap();
        assert!(enc.write_i64(1).is_err());
        enc.write_field_name("a").unwrap();
        assert!(enc.write_field_name("b").is_err());
    }

    #[test]
    fn close_requires_balanced_containers() {
        let mut out = Vec::new();
        let mut enc = SizingEncoder::new(Encoder::new(&mut out));
        enc.write_start_array().unwrap();
        assert!(enc.close().is_err());

        let mut out = Vec::new();
        let inner = Encoder::with_options(
            &mut out,
            EncodeOptions::default().with_auto_close_content(true),
        );
        let mut enc = SizingEncoder::new(inner);
        enc.write_start_array().unwrap();
        enc.write_i64(1).unwrap();
        enc.close().unwrap();
        drop(enc);
        assert_eq!(out, vec![0x81, 0x01]);
    }
}
