use crate::buf::IoBuf;
use std::cmp;
use std::ops;

use super::IoBufMut;

/// An owned view into a contiguous sequence of bytes.
///
/// This is similar to Rust slices (`&buf[..]`) but owns the underlying buffer. It limits a read
/// or write request to a sub-range of a buffer, which is how a request gets an explicit length.
///
/// Slices are created using [`IoBuf::slice`].
///
/// # Examples
///
/// ```
/// use readyio::buf::IoBuf;
///
/// let slice = b"hello world".to_vec().slice(..5);
/// assert_eq!(&slice[..], b"hello");
/// assert_eq!(slice.into_inner().len(), 11);
/// ```
pub struct Slice<T> {
    buf: T,
    begin: usize,
    end: usize,
}

impl<T: IoBuf> Slice<T> {
    /// Create a Slice from a buffer and range.
    ///
    /// # Panics
    ///
    /// Panics if `end` is past the buffer's total capacity, if `begin` is past its initialized
    /// bytes, or if `begin > end`.
    pub fn new(buf: T, begin: usize, end: usize) -> Slice<T> {
        assert!(end <= buf.bytes_total());
        assert!(begin <= buf.bytes_init());
        assert!(begin <= end);
        Slice { buf, begin, end }
    }
}

impl<T> Slice<T> {
    /// Offset in the underlying buffer at which this slice starts.
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// Offset in the underlying buffer at which this slice ends.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Gets a reference to the underlying buffer.
    ///
    /// This method escapes the slice's view.
    pub fn get_ref(&self) -> &T {
        &self.buf
    }

    /// Gets a mutable reference to the underlying buffer.
    ///
    /// This method escapes the slice's view.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.buf
    }

    /// Unwraps this `Slice`, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buf
    }
}

impl<T: IoBuf> ops::Deref for Slice<T> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        let buf_bytes = super::deref(&self.buf);
        let end = cmp::min(self.end, buf_bytes.len());
        &buf_bytes[cmp::min(self.begin, end)..end]
    }
}

impl<T: IoBufMut> ops::DerefMut for Slice<T> {
    fn deref_mut(&mut self) -> &mut [u8] {
        let buf_bytes = super::deref_mut(&mut self.buf);
        let end = cmp::min(self.end, buf_bytes.len());
        &mut buf_bytes[cmp::min(self.begin, end)..end]
    }
}

unsafe impl<T: IoBuf> IoBuf for Slice<T> {
    fn read_ptr(&self) -> *const u8 {
        // Safety: `begin <= bytes_init()` was checked on construction.
        unsafe { self.buf.read_ptr().add(self.begin) }
    }

    fn bytes_init(&self) -> usize {
        ops::Deref::deref(self).len()
    }

    fn bytes_total(&self) -> usize {
        self.end - self.begin
    }
}

unsafe impl<T: IoBufMut> IoBufMut for Slice<T> {
    fn write_ptr(&mut self) -> *mut u8 {
        // Safety: `begin <= end <= bytes_total()` was checked on construction.
        unsafe { self.buf.write_ptr().add(self.begin) }
    }

    unsafe fn set_init(&mut self, pos: usize) {
        self.buf.set_init(self.begin + pos);
    }
}
