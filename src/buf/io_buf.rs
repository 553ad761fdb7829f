use std::ops;

use super::Slice;

/// A buffer that can be the source of a write.
///
/// # Safety
///
/// The pointer returned by [`read_ptr`](IoBuf::read_ptr) must stay valid, and keep pointing at
/// the same bytes, when the buffer value is moved. Heap backed buffers satisfy this; inline
/// arrays do not, which is why `[u8; N]` is not an `IoBuf`.
pub unsafe trait IoBuf: Unpin + 'static {
    /// Pointer to the first initialized byte.
    fn read_ptr(&self) -> *const u8;

    /// Number of initialized bytes.
    ///
    /// This is what a write sends.
    fn bytes_init(&self) -> usize;

    /// Total size of the buffer, including uninitialized capacity.
    fn bytes_total(&self) -> usize;

    /// Restricts an operation to a sub-range of this buffer.
    ///
    /// # Panics
    ///
    /// Panics if the range ends past [`bytes_total`](IoBuf::bytes_total), starts past
    /// [`bytes_init`](IoBuf::bytes_init), or starts after it ends.
    fn slice(self, range: impl ops::RangeBounds<usize>) -> Slice<Self>
    where
        Self: Sized,
    {
        use ops::Bound;

        let begin = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };

        let end = match range.end_bound() {
            Bound::Included(&n) => n.checked_add(1).expect("out of range"),
            Bound::Excluded(&n) => n,
            Bound::Unbounded => self.bytes_total(),
        };

        Slice::new(self, begin, end)
    }
}

unsafe impl IoBuf for Vec<u8> {
    fn read_ptr(&self) -> *const u8 {
        self.as_ptr()
    }

    fn bytes_init(&self) -> usize {
        self.len()
    }

    fn bytes_total(&self) -> usize {
        self.capacity()
    }
}

unsafe impl IoBuf for Box<[u8]> {
    fn read_ptr(&self) -> *const u8 {
        self.as_ptr()
    }

    fn bytes_init(&self) -> usize {
        self.len()
    }

    fn bytes_total(&self) -> usize {
        self.len()
    }
}

unsafe impl IoBuf for String {
    fn read_ptr(&self) -> *const u8 {
        self.as_ptr()
    }

    fn bytes_init(&self) -> usize {
        self.len()
    }

    fn bytes_total(&self) -> usize {
        self.capacity()
    }
}

unsafe impl IoBuf for &'static [u8] {
    fn read_ptr(&self) -> *const u8 {
        self.as_ptr()
    }

    fn bytes_init(&self) -> usize {
        self.len()
    }

    fn bytes_total(&self) -> usize {
        self.len()
    }
}

unsafe impl IoBuf for &'static str {
    fn read_ptr(&self) -> *const u8 {
        self.as_ptr()
    }

    fn bytes_init(&self) -> usize {
        self.len()
    }

    fn bytes_total(&self) -> usize {
        self.len()
    }
}
