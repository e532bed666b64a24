//! Per-thread recycling of codec buffers.
//!
//! Decoders and encoders are created and dropped frequently while their
//! buffer sizes stay the same, so buffers are leased from a small
//! thread-local free list instead of hitting the allocator every time.
//! Keeping the pool thread-local also rules out cross-thread hand-off of
//! buffer contents by construction.

use std::cell::RefCell;

const MAX_POOLED: usize = 4;

thread_local! {
    static POOL: RefCell<Vec<Vec<u8>>> = RefCell::new(Vec::new());
}

pub(crate) fn lease(capacity: usize) -> Vec<u8> {
    POOL.with(|p| {
        let mut pool = p.borrow_mut();
        match pool.iter().position(|b| b.capacity() >= capacity) {
            Some(idx) => {
                let mut buf = pool.swap_remove(idx);
                buf.clear();
                buf
            }
            None => Vec::with_capacity(capacity),
        }
    })
}

pub(crate) fn give_back(mut buf: Vec<u8>) {
    buf.clear();
    POOL.with(|p| {
        let mut pool = p.borrow_mut();
        if pool.len() < MAX_POOLED {
            pool.push(buf);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_reused() {
        let mut buf = lease(100);
        buf.extend_from_slice(b"scribble");
        let ptr = buf.as_ptr();
        give_back(buf);
        let again = lease(50);
        assert_eq!(again.as_ptr(), ptr);
        assert!(again.is_empty());
    }
}
