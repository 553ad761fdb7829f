use super::IoBuf;

/// A buffer that can be the destination of a read.
///
/// A read fills the buffer from its start, up to [`bytes_total`](IoBuf::bytes_total) bytes, and
/// then calls [`set_init`](IoBufMut::set_init) with the number of bytes transferred.
///
/// # Safety
///
/// Same stability requirement as [`IoBuf`], for [`write_ptr`](IoBufMut::write_ptr).
pub unsafe trait IoBufMut: IoBuf {
    /// Pointer to the start of the buffer's storage.
    fn write_ptr(&mut self) -> *mut u8;

    /// Marks the first `pos` bytes as initialized.
    ///
    /// # Safety
    ///
    /// The first `pos` bytes must actually have been written.
    unsafe fn set_init(&mut self, pos: usize);
}

unsafe impl IoBufMut for Vec<u8> {
    fn write_ptr(&mut self) -> *mut u8 {
        self.as_mut_ptr()
    }

    unsafe fn set_init(&mut self, pos: usize) {
        if self.len() < pos {
            self.set_len(pos);
        }
    }
}

unsafe impl IoBufMut for Box<[u8]> {
    fn write_ptr(&mut self) -> *mut u8 {
        self.as_mut_ptr()
    }

    unsafe fn set_init(&mut self, _pos: usize) {}
}
