use crate::error::{CodecError, Result};
use std::{collections::HashSet, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Container {
    Root,
    Array,
    Object,
}

/// One open container on the decode side.
///
/// In an object, events alternate name, value, name, value; `awaiting_value`
/// is set while the value half of a pair is outstanding. `expected` carries
/// the declared element count of a definite-length container (elements for
/// arrays, pairs for objects) and is `None` for indefinite ones.
struct ReadFrame {
    kind: Container,
    expected: Option<u64>,
    seen: u64,
    awaiting_value: bool,
    name: Option<Arc<str>>,
    dups: Option<HashSet<Arc<str>>>,
}

impl ReadFrame {
    fn new(kind: Container, expected: Option<u64>) -> Self {
        Self {
            kind,
            expected,
            seen: 0,
            awaiting_value: false,
            name: None,
            dups: None,
        }
    }
}

pub(crate) struct ReadStack {
    frames: Vec<ReadFrame>,
    detect_dups: bool,
}

impl ReadStack {
    pub fn new(detect_dups: bool) -> Self {
        Self {
            frames: vec![ReadFrame::new(Container::Root, None)],
            detect_dups,
        }
    }

    fn top(&self) -> &ReadFrame {
        self.frames.last().expect("root frame is never popped")
    }

    fn top_mut(&mut self) -> &mut ReadFrame {
        self.frames.last_mut().expect("root frame is never popped")
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn kind(&self) -> Container {
        self.top().kind
    }

    pub fn at_root(&self) -> bool {
        self.frames.len() == 1
    }

    pub fn in_object(&self) -> bool {
        self.top().kind == Container::Object
    }

    /// True while the next item must be decoded as a field name.
    pub fn expecting_name(&self) -> bool {
        self.in_object() && !self.top().awaiting_value
    }

    /// False once a definite-length container has delivered its declared
    /// count, i.e. the matching end event is due.
    pub fn expects_more(&self) -> bool {
        let top = self.top();
        match top.expected {
            Some(n) => top.seen < n,
            None => true,
        }
    }

    pub fn has_expected_length(&self) -> bool {
        self.top().expected.is_some()
    }

    pub fn enter_array(&mut self, expected: Option<u64>) {
        self.frames.push(ReadFrame::new(Container::Array, expected));
    }

    pub fn enter_object(&mut self, expected: Option<u64>) {
        self.frames.push(ReadFrame::new(Container::Object, expected));
    }

    /// Pop the current container, yielding its kind.
    pub fn leave(&mut self) -> Container {
        debug_assert!(!self.at_root());
        let frame = self.frames.pop().expect("checked by caller");
        frame.kind
    }

    /// Record the name half of an object entry.
    pub fn note_name(&mut self, name: Arc<str>) -> Result<()> {
        let detect = self.detect_dups;
        let top = self.top_mut();
        debug_assert!(top.kind == Container::Object && !top.awaiting_value);
        if detect {
            let dups = top.dups.get_or_insert_with(HashSet::new);
            if !dups.insert(name.clone()) {
                return Err(CodecError::write_violation(format!(
                    "duplicate field name \"{}\"",
                    name
                )));
            }
        }
        top.name = Some(name);
        top.awaiting_value = true;
        Ok(())
    }

    /// Record a completed value (the second half of a pair in objects).
    pub fn note_value(&mut self) {
        let top = self.top_mut();
        top.seen += 1;
        top.awaiting_value = false;
    }

    pub fn current_name(&self) -> Option<&Arc<str>> {
        self.top().name.as_ref()
    }

    /// The name of the entry a nested value belongs to, i.e. the name in
    /// the closest enclosing object frame.
    pub fn parent_name(&self) -> Option<&Arc<str>> {
        self.frames
            .iter()
            .rev()
            .skip(1)
            .find(|f| f.kind == Container::Object)
            .and_then(|f| f.name.as_ref())
    }
}

/// One open container on the encode side; same alternation rules as
/// [`ReadFrame`], but `expected` stems from a sized container opener and is
/// verified when the container is closed.
struct WriteFrame {
    kind: Container,
    expected: Option<u64>,
    seen: u64,
    awaiting_value: bool,
    dups: Option<HashSet<String>>,
}

impl WriteFrame {
    fn new(kind: Container, expected: Option<u64>) -> Self {
        Self {
            kind,
            expected,
            seen: 0,
            awaiting_value: false,
            dups: None,
        }
    }
}

pub(crate) struct WriteStack {
    frames: Vec<WriteFrame>,
    detect_dups: bool,
}

impl WriteStack {
    pub fn new(detect_dups: bool) -> Self {
        Self {
            frames: vec![WriteFrame::new(Container::Root, None)],
            detect_dups,
        }
    }

    fn top(&self) -> &WriteFrame {
        self.frames.last().expect("root frame is never popped")
    }

    fn top_mut(&mut self) -> &mut WriteFrame {
        self.frames.last_mut().expect("root frame is never popped")
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn kind(&self) -> Container {
        self.top().kind
    }

    pub fn at_root(&self) -> bool {
        self.frames.len() == 1
    }

    /// Check that a value may be written here and account for it.
    pub fn verify_value(&mut self, what: &'static str) -> Result<()> {
        let top = self.top_mut();
        if top.kind == Container::Object && !top.awaiting_value {
            return Err(CodecError::write_violation(format!(
                "cannot write {}, expecting a field name",
                what
            )));
        }
        top.seen += 1;
        top.awaiting_value = false;
        Ok(())
    }

    /// Check that a field name may be written here and account for it.
    pub fn verify_name(&mut self, name: &str) -> Result<()> {
        let detect = self.detect_dups;
        let top = self.top_mut();
        if top.kind != Container::Object {
            return Err(CodecError::write_violation(
                "field names are only valid inside objects",
            ));
        }
        if top.awaiting_value {
            return Err(CodecError::write_violation(format!(
                "cannot write field name \"{}\", expecting a value",
                name
            )));
        }
        if detect {
            let dups = top.dups.get_or_insert_with(HashSet::new);
            if !dups.insert(name.to_owned()) {
                return Err(CodecError::write_violation(format!(
                    "duplicate field name \"{}\"",
                    name
                )));
            }
        }
        top.awaiting_value = true;
        Ok(())
    }

    pub fn enter_array(&mut self, expected: Option<u64>) {
        self.frames.push(WriteFrame::new(Container::Array, expected));
    }

    pub fn enter_object(&mut self, expected: Option<u64>) {
        self.frames.push(WriteFrame::new(Container::Object, expected));
    }

    /// Close the current container, verifying kind, pair alternation and
    /// (for sized containers) the declared count.
    pub fn leave(&mut self, kind: Container) -> Result<()> {
        let top = self.top();
        if top.kind != kind {
            return Err(CodecError::write_violation(format!(
                "mismatched container end: in {:?}, got end of {:?}",
                top.kind, kind
            )));
        }
        if top.awaiting_value {
            return Err(CodecError::write_violation(
                "cannot end object, a field value is outstanding",
            ));
        }
        // `seen` counts values only (names are the other half of a pair),
        // so it equals elements for arrays and pairs for objects
        if let Some(expected) = top.expected {
            if top.seen != expected {
                return Err(CodecError::write_violation(format!(
                    "sized container declared {} entries but got {}",
                    expected, top.seen
                )));
            }
        }
        self.frames.pop();
        Ok(())
    }

    /// Whether the current container was opened with a declared size.
    pub fn is_sized(&self) -> bool {
        self.top().expected.is_some()
    }
}
